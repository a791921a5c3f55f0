//! Per-project template configuration and reference-template resolution.
//!
//! A project carries one primary uploaded template (`base_path`) plus
//! optional per-page-type variants generated from it. Resolution walks a
//! fallback chain so that a unit always gets the closest available style
//! reference instead of failing outright.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::page_type::PageType;

/// Default cap on the per-type variant history list.
pub const MAX_TEMPLATE_HISTORY: usize = 10;

/// Template configuration stored on a project (`projects.template_config`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// The project's primary uploaded template, relative to the storage root.
    #[serde(default)]
    pub base_path: Option<String>,
    /// Current variant per page type.
    #[serde(default)]
    pub variants: BTreeMap<PageType, String>,
    /// Previously generated variants per page type, most recent first.
    #[serde(default)]
    pub history: BTreeMap<PageType, Vec<String>>,
}

impl TemplateConfig {
    /// Whether the project has any template image at all.
    pub fn has_any_template(&self) -> bool {
        self.base_path.is_some() || !self.variants.is_empty()
    }

    /// Record a newly generated variant: set it as current and push it onto
    /// the history for its type.
    pub fn set_variant(&mut self, page_type: PageType, path: &str, max_history: usize) {
        self.variants.insert(page_type, path.to_string());
        push_history(self, page_type, path, max_history);
    }
}

/// Resolve the reference template for a unit of type `unit_type`.
///
/// 1. `variants[unit_type]`
/// 2. `variants[content]` when `unit_type` is not already content
/// 3. the candidate is kept only if `exists` accepts it
/// 4. `base_path` if present and `exists` accepts it
/// 5. `None`
pub fn resolve<F>(
    config: &TemplateConfig,
    unit_type: PageType,
    base_path: Option<&str>,
    exists: F,
) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let candidate = config.variants.get(&unit_type).or_else(|| {
        if unit_type != PageType::Content {
            config.variants.get(&PageType::Content)
        } else {
            None
        }
    });

    if let Some(path) = candidate {
        if exists(path) {
            return Some(path.clone());
        }
    }

    base_path
        .filter(|p| !p.is_empty() && exists(p))
        .map(str::to_string)
}

/// Push `path` to the front of the history for `page_type`.
///
/// Existing occurrences of `path` and empty entries are removed first; the
/// list is truncated to `max_history` (0 means unbounded).
pub fn push_history(config: &mut TemplateConfig, page_type: PageType, path: &str, max_history: usize) {
    let items = config.history.entry(page_type).or_default();
    items.retain(|p| !p.is_empty() && p != path);
    items.insert(0, path.to_string());
    if max_history > 0 && items.len() > max_history {
        items.truncate(max_history);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(variants: &[(PageType, &str)], base: Option<&str>) -> TemplateConfig {
        TemplateConfig {
            base_path: base.map(str::to_string),
            variants: variants
                .iter()
                .map(|(t, p)| (*t, p.to_string()))
                .collect(),
            history: BTreeMap::new(),
        }
    }

    // -- Resolution --

    #[test]
    fn exact_variant_wins() {
        let cfg = config(&[(PageType::Cover, "A"), (PageType::Content, "B")], Some("C"));
        let got = resolve(&cfg, PageType::Cover, cfg.base_path.as_deref(), |_| true);
        assert_eq!(got.as_deref(), Some("A"));
    }

    #[test]
    fn missing_variant_falls_back_to_content() {
        let cfg = config(&[(PageType::Cover, "A"), (PageType::Content, "B")], Some("C"));
        let got = resolve(&cfg, PageType::Transition, cfg.base_path.as_deref(), |_| true);
        assert_eq!(got.as_deref(), Some("B"));
    }

    #[test]
    fn deleted_variant_falls_through_to_base() {
        let cfg = config(&[(PageType::Cover, "A"), (PageType::Content, "B")], Some("C"));
        let got = resolve(&cfg, PageType::Cover, cfg.base_path.as_deref(), |p| p != "A");
        assert_eq!(got.as_deref(), Some("C"));
    }

    #[test]
    fn no_content_variant_and_missing_base_is_none() {
        let cfg = config(&[(PageType::Cover, "A")], Some("C"));
        let got = resolve(&cfg, PageType::Ending, cfg.base_path.as_deref(), |p| p != "C");
        assert_eq!(got, None);
    }

    #[test]
    fn content_type_does_not_double_lookup() {
        let cfg = config(&[], None);
        assert_eq!(resolve(&cfg, PageType::Content, None, |_| true), None);
    }

    #[test]
    fn base_used_when_no_variants() {
        let cfg = config(&[], Some("base.png"));
        let got = resolve(&cfg, PageType::Ending, cfg.base_path.as_deref(), |_| true);
        assert_eq!(got.as_deref(), Some("base.png"));
    }

    // -- History --

    #[test]
    fn history_is_most_recent_first_and_deduplicated() {
        let mut cfg = TemplateConfig::default();
        push_history(&mut cfg, PageType::Cover, "v1", 10);
        push_history(&mut cfg, PageType::Cover, "v2", 10);
        push_history(&mut cfg, PageType::Cover, "v1", 10);
        assert_eq!(cfg.history[&PageType::Cover], vec!["v1", "v2"]);
    }

    #[test]
    fn history_is_capped() {
        let mut cfg = TemplateConfig::default();
        for i in 0..15 {
            push_history(&mut cfg, PageType::Content, &format!("v{i}"), MAX_TEMPLATE_HISTORY);
        }
        let items = &cfg.history[&PageType::Content];
        assert_eq!(items.len(), MAX_TEMPLATE_HISTORY);
        assert_eq!(items[0], "v14");
    }

    #[test]
    fn set_variant_updates_current_and_history() {
        let mut cfg = TemplateConfig::default();
        cfg.set_variant(PageType::Ending, "end.png", 10);
        assert_eq!(cfg.variants[&PageType::Ending], "end.png");
        assert_eq!(cfg.history[&PageType::Ending], vec!["end.png"]);
        assert!(cfg.has_any_template());
    }

    #[test]
    fn config_round_trips_through_json_with_defaults() {
        let cfg: TemplateConfig = serde_json::from_str(r#"{"variants":{"cover":"a.png"}}"#)
            .expect("config should parse");
        assert_eq!(cfg.base_path, None);
        assert_eq!(cfg.variants[&PageType::Cover], "a.png");
        assert!(cfg.history.is_empty());
    }
}
