//! Task progress accounting.
//!
//! [`TaskProgress`] is the durable progress record of a task: a fixed numeric
//! core (`total`, `completed`, `failed`) plus a typed, job-kind-specific
//! [`ProgressDetail`]. The numeric core only ever grows and never exceeds
//! `total`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::JobKind;
use crate::scope::InfographicMode;

/// A failed unit and the human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    /// Display label of the unit, e.g. `page 12` or `cover`.
    pub unit: String,
    pub error: String,
}

/// An artifact emitted by a successful unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub unit: String,
    pub artifact_path: String,
    /// `None` for artifacts tracked outside the version table (template variants).
    #[serde(default)]
    pub version_number: Option<i32>,
}

/// Job-kind-specific progress metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressDetail {
    Descriptions {
        #[serde(default)]
        failures: Vec<UnitFailure>,
    },
    Images {
        #[serde(default)]
        artifacts: Vec<ArtifactRef>,
        #[serde(default)]
        failures: Vec<UnitFailure>,
    },
    TemplateVariants {
        #[serde(default)]
        artifacts: Vec<ArtifactRef>,
        #[serde(default)]
        failures: Vec<UnitFailure>,
    },
    Cards {
        #[serde(default)]
        artifacts: Vec<ArtifactRef>,
        #[serde(default)]
        failures: Vec<UnitFailure>,
    },
    Infographic {
        mode: InfographicMode,
        #[serde(default)]
        artifacts: Vec<ArtifactRef>,
        #[serde(default)]
        failures: Vec<UnitFailure>,
    },
    Single {
        #[serde(default)]
        artifact: Option<ArtifactRef>,
        #[serde(default)]
        failure: Option<UnitFailure>,
    },
}

impl ProgressDetail {
    /// Empty detail for a job kind. Infographic jobs carry their mode.
    pub fn for_kind(kind: JobKind, mode: Option<InfographicMode>) -> Self {
        match kind {
            JobKind::GenerateDescriptions => ProgressDetail::Descriptions {
                failures: Vec::new(),
            },
            JobKind::GenerateImages => ProgressDetail::Images {
                artifacts: Vec::new(),
                failures: Vec::new(),
            },
            JobKind::GenerateTemplateVariants => ProgressDetail::TemplateVariants {
                artifacts: Vec::new(),
                failures: Vec::new(),
            },
            JobKind::GenerateCards => ProgressDetail::Cards {
                artifacts: Vec::new(),
                failures: Vec::new(),
            },
            JobKind::GenerateInfographic => ProgressDetail::Infographic {
                mode: mode.unwrap_or_default(),
                artifacts: Vec::new(),
                failures: Vec::new(),
            },
            JobKind::GeneratePageImage
            | JobKind::EditPageImage
            | JobKind::GenerateTemplateVariant
            | JobKind::GenerateCard
            | JobKind::EditCard
            | JobKind::GenerateMaterial
            | JobKind::EditMaterial => ProgressDetail::Single {
                artifact: None,
                failure: None,
            },
        }
    }

    fn push_artifact(&mut self, artifact: ArtifactRef) {
        match self {
            ProgressDetail::Descriptions { .. } => {}
            ProgressDetail::Images { artifacts, .. }
            | ProgressDetail::TemplateVariants { artifacts, .. }
            | ProgressDetail::Cards { artifacts, .. }
            | ProgressDetail::Infographic { artifacts, .. } => artifacts.push(artifact),
            ProgressDetail::Single { artifact: slot, .. } => *slot = Some(artifact),
        }
    }

    fn push_failure(&mut self, failure: UnitFailure) {
        match self {
            ProgressDetail::Descriptions { failures }
            | ProgressDetail::Images { failures, .. }
            | ProgressDetail::TemplateVariants { failures, .. }
            | ProgressDetail::Cards { failures, .. }
            | ProgressDetail::Infographic { failures, .. } => failures.push(failure),
            ProgressDetail::Single { failure: slot, .. } => *slot = Some(failure),
        }
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> Vec<&UnitFailure> {
        match self {
            ProgressDetail::Descriptions { failures }
            | ProgressDetail::Images { failures, .. }
            | ProgressDetail::TemplateVariants { failures, .. }
            | ProgressDetail::Cards { failures, .. }
            | ProgressDetail::Infographic { failures, .. } => failures.iter().collect(),
            ProgressDetail::Single { failure, .. } => failure.iter().collect(),
        }
    }

    /// Artifacts recorded so far.
    pub fn artifacts(&self) -> Vec<&ArtifactRef> {
        match self {
            ProgressDetail::Descriptions { .. } => Vec::new(),
            ProgressDetail::Images { artifacts, .. }
            | ProgressDetail::TemplateVariants { artifacts, .. }
            | ProgressDetail::Cards { artifacts, .. }
            | ProgressDetail::Infographic { artifacts, .. } => artifacts.iter().collect(),
            ProgressDetail::Single { artifact, .. } => artifact.iter().collect(),
        }
    }
}

/// Durable progress record of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ProgressDetail>,
}

impl TaskProgress {
    /// Start accounting for `total` units. `total` cannot change afterwards.
    pub fn new(total: u32, detail: ProgressDetail) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            detail: Some(detail),
        }
    }

    /// Units finished so far, successfully or not.
    pub fn finished(&self) -> u32 {
        self.completed + self.failed
    }

    /// Whether every unit has been accounted for.
    pub fn is_finished(&self) -> bool {
        self.finished() >= self.total
    }

    fn ensure_room(&self) -> Result<(), CoreError> {
        if self.is_finished() {
            return Err(CoreError::Conflict(format!(
                "progress already accounts for all {} units",
                self.total
            )));
        }
        Ok(())
    }

    /// Count a successful unit, optionally recording its artifact.
    pub fn record_success(&mut self, artifact: Option<ArtifactRef>) -> Result<(), CoreError> {
        self.ensure_room()?;
        self.completed += 1;
        if let (Some(detail), Some(artifact)) = (self.detail.as_mut(), artifact) {
            detail.push_artifact(artifact);
        }
        Ok(())
    }

    /// Count a failed unit and record its reason.
    pub fn record_failure(&mut self, failure: UnitFailure) -> Result<(), CoreError> {
        self.ensure_room()?;
        self.failed += 1;
        if let Some(detail) = self.detail.as_mut() {
            detail.push_failure(failure);
        }
        Ok(())
    }

    /// Whether `next` is a valid successor snapshot of `self`: same total and
    /// non-decreasing counters.
    pub fn can_advance_to(&self, next: &TaskProgress) -> bool {
        next.total == self.total && next.completed >= self.completed && next.failed >= self.failed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn failure(unit: &str) -> UnitFailure {
        UnitFailure {
            unit: unit.to_string(),
            error: "provider returned no image".to_string(),
        }
    }

    fn artifact(unit: &str, version: i32) -> ArtifactRef {
        ArtifactRef {
            unit: unit.to_string(),
            artifact_path: format!("pages/{unit}/v{version}.png"),
            version_number: Some(version),
        }
    }

    #[test]
    fn counts_never_exceed_total() {
        let mut progress = TaskProgress::new(2, ProgressDetail::for_kind(JobKind::GenerateImages, None));
        progress.record_success(Some(artifact("1", 1))).unwrap();
        progress.record_failure(failure("2")).unwrap();
        assert!(progress.is_finished());
        assert_matches!(
            progress.record_success(None),
            Err(CoreError::Conflict(_))
        );
        assert_eq!(progress.finished(), 2);
    }

    #[test]
    fn detail_collects_artifacts_and_failures() {
        let mut progress = TaskProgress::new(3, ProgressDetail::for_kind(JobKind::GenerateCards, None));
        progress.record_success(Some(artifact("card 0", 1))).unwrap();
        progress.record_failure(failure("card 1")).unwrap();
        let detail = progress.detail.as_ref().unwrap();
        assert_eq!(detail.artifacts().len(), 1);
        assert_eq!(detail.failures()[0].unit, "card 1");
    }

    #[test]
    fn descriptions_detail_ignores_artifacts() {
        let mut progress =
            TaskProgress::new(1, ProgressDetail::for_kind(JobKind::GenerateDescriptions, None));
        progress.record_success(Some(artifact("1", 1))).unwrap();
        assert!(progress.detail.as_ref().unwrap().artifacts().is_empty());
        assert_eq!(progress.completed, 1);
    }

    #[test]
    fn single_detail_holds_one_slot() {
        let mut progress = TaskProgress::new(1, ProgressDetail::for_kind(JobKind::EditPageImage, None));
        progress.record_success(Some(artifact("7", 3))).unwrap();
        assert_matches!(
            progress.detail,
            Some(ProgressDetail::Single { artifact: Some(ref a), failure: None }) if a.version_number == Some(3)
        );
    }

    #[test]
    fn snapshots_are_monotonic() {
        let mut progress = TaskProgress::new(3, ProgressDetail::for_kind(JobKind::GenerateImages, None));
        let before = progress.clone();
        progress.record_failure(failure("1")).unwrap();
        assert!(before.can_advance_to(&progress));
        assert!(!progress.can_advance_to(&before));
    }

    #[test]
    fn serialized_detail_is_tagged_by_kind() {
        let progress = TaskProgress::new(
            1,
            ProgressDetail::for_kind(JobKind::GenerateInfographic, Some(InfographicMode::Series)),
        );
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["detail"]["kind"], "infographic");
        assert_eq!(json["detail"]["mode"], "series");
    }
}
