//! Job kinds, per-kind outcome policies, and worker-count clamping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lower bound for a per-task fan-out pool.
pub const MIN_FAN_OUT_WORKERS: usize = 1;

/// Upper bound for a per-task fan-out pool.
pub const MAX_FAN_OUT_WORKERS: usize = 16;

/// Default number of concurrently running tasks.
pub const DEFAULT_TASK_WORKERS: usize = 4;

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// The closed set of background job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    GenerateDescriptions,
    GenerateImages,
    GeneratePageImage,
    EditPageImage,
    GenerateTemplateVariants,
    GenerateTemplateVariant,
    GenerateCards,
    GenerateCard,
    EditCard,
    GenerateInfographic,
    GenerateMaterial,
    EditMaterial,
}

/// How a finished job's unit counts map onto a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomePolicy {
    /// No failures: completed. Mixed: partial. Nothing succeeded: failed.
    Graded,
    /// Failed only when nothing succeeded; otherwise completed.
    FailOnlyIfNoneSucceeded,
    /// Exactly one unit: completed or failed.
    Single,
}

/// Terminal outcome of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalOutcome {
    Completed,
    Partial,
    Failed,
}

/// Project-level milestone reached when a job finishes with no failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectMilestone {
    DescriptionsGenerated,
    Completed,
}

impl JobKind {
    pub const ALL: [JobKind; 12] = [
        JobKind::GenerateDescriptions,
        JobKind::GenerateImages,
        JobKind::GeneratePageImage,
        JobKind::EditPageImage,
        JobKind::GenerateTemplateVariants,
        JobKind::GenerateTemplateVariant,
        JobKind::GenerateCards,
        JobKind::GenerateCard,
        JobKind::EditCard,
        JobKind::GenerateInfographic,
        JobKind::GenerateMaterial,
        JobKind::EditMaterial,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::GenerateDescriptions => "generate_descriptions",
            JobKind::GenerateImages => "generate_images",
            JobKind::GeneratePageImage => "generate_page_image",
            JobKind::EditPageImage => "edit_page_image",
            JobKind::GenerateTemplateVariants => "generate_template_variants",
            JobKind::GenerateTemplateVariant => "generate_template_variant",
            JobKind::GenerateCards => "generate_cards",
            JobKind::GenerateCard => "generate_card",
            JobKind::EditCard => "edit_card",
            JobKind::GenerateInfographic => "generate_infographic",
            JobKind::GenerateMaterial => "generate_material",
            JobKind::EditMaterial => "edit_material",
        }
    }

    /// Outcome policy for this job kind.
    pub fn outcome_policy(self) -> OutcomePolicy {
        match self {
            JobKind::GenerateDescriptions
            | JobKind::GenerateImages
            | JobKind::GenerateTemplateVariants => OutcomePolicy::Graded,
            JobKind::GenerateCards | JobKind::GenerateInfographic => {
                OutcomePolicy::FailOnlyIfNoneSucceeded
            }
            JobKind::GeneratePageImage
            | JobKind::EditPageImage
            | JobKind::GenerateTemplateVariant
            | JobKind::GenerateCard
            | JobKind::EditCard
            | JobKind::GenerateMaterial
            | JobKind::EditMaterial => OutcomePolicy::Single,
        }
    }

    /// Milestone the owning project advances to on unambiguous success.
    pub fn project_milestone(self) -> Option<ProjectMilestone> {
        match self {
            JobKind::GenerateDescriptions => Some(ProjectMilestone::DescriptionsGenerated),
            JobKind::GenerateImages | JobKind::GenerateCards | JobKind::GenerateInfographic => {
                Some(ProjectMilestone::Completed)
            }
            _ => None,
        }
    }

    /// Whether this kind dispatches a fan-out pool.
    pub fn is_fan_out(self) -> bool {
        !matches!(self.outcome_policy(), OutcomePolicy::Single)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Outcome resolution
// ---------------------------------------------------------------------------

impl OutcomePolicy {
    /// Resolve the terminal outcome from final unit counts.
    ///
    /// A job with no failures is always completed, including the degenerate
    /// zero-unit case.
    pub fn resolve(self, completed: u32, failed: u32) -> TerminalOutcome {
        if failed == 0 {
            return TerminalOutcome::Completed;
        }
        match self {
            OutcomePolicy::Graded | OutcomePolicy::Single => {
                if completed == 0 {
                    TerminalOutcome::Failed
                } else {
                    TerminalOutcome::Partial
                }
            }
            OutcomePolicy::FailOnlyIfNoneSucceeded => {
                if completed == 0 {
                    TerminalOutcome::Failed
                } else {
                    TerminalOutcome::Completed
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker clamping
// ---------------------------------------------------------------------------

/// Size a per-task fan-out pool.
///
/// Uses `requested` (or `default` when absent), clamped to
/// [`MIN_FAN_OUT_WORKERS`]..=[`MAX_FAN_OUT_WORKERS`], and never more than
/// `unit_count` (but at least 1).
pub fn clamp_workers(requested: Option<usize>, default: usize, unit_count: usize) -> usize {
    let wanted = requested
        .unwrap_or(default)
        .clamp(MIN_FAN_OUT_WORKERS, MAX_FAN_OUT_WORKERS);
    wanted.min(unit_count.max(1))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
