//! Page-type classification.
//!
//! Every generation unit is classified into one of four layout roles before
//! a template is picked or a prompt is composed. Position rules dominate
//! keyword rules, and transition keywords dominate ending keywords.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Sentinel stored in `pages.page_type` when no explicit override is set.
pub const PAGE_TYPE_AUTO: &str = "auto";

/// Title keywords that mark a section break. Checked before the ending set.
pub const TRANSITION_KEYWORDS: &[&str] = &[
    "过渡", "章节", "部分", "目录", "篇章", "section", "part", "agenda", "outline", "overview",
];

/// Title keywords that mark a closing page.
pub const ENDING_KEYWORDS: &[&str] = &[
    "结尾", "总结", "致谢", "谢谢", "ending", "summary", "thanks", "q&a", "qa", "结论", "回顾",
];

// ---------------------------------------------------------------------------
// PageType
// ---------------------------------------------------------------------------

/// Layout role of a page within a generated deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Cover,
    Transition,
    Content,
    Ending,
}

impl PageType {
    /// All variants, in deck order.
    pub const ALL: [PageType; 4] = [
        PageType::Cover,
        PageType::Transition,
        PageType::Content,
        PageType::Ending,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Cover => "cover",
            PageType::Transition => "transition",
            PageType::Content => "content",
            PageType::Ending => "ending",
        }
    }

    /// Parse a stored `page_type` column value.
    ///
    /// Returns `Ok(None)` for the `auto` sentinel (and for blank values).
    pub fn parse_explicit(raw: &str) -> Result<Option<PageType>, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(PAGE_TYPE_AUTO) {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cover" => Ok(PageType::Cover),
            "transition" => Ok(PageType::Transition),
            "content" => Ok(PageType::Content),
            "ending" => Ok(PageType::Ending),
            other => Err(CoreError::Validation(format!(
                "Invalid page type '{other}'. Must be one of: auto, cover, transition, content, ending"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The attributes of a generation unit the classifier looks at.
#[derive(Debug, Clone, Copy)]
pub struct UnitTraits<'a> {
    /// 0-based position of the unit within its job.
    pub position: usize,
    /// Explicit override; `None` means `auto`.
    pub explicit_type: Option<PageType>,
    /// Title text used for keyword matching.
    pub title: &'a str,
}

/// Classify a unit into its [`PageType`].
///
/// 1. An explicit override always wins.
/// 2. Position 0 is the cover.
/// 3. The last position (when `total_units > 0`) is the ending.
/// 4. Title keywords, transition before ending.
/// 5. Otherwise content.
pub fn classify(unit: &UnitTraits<'_>, total_units: usize) -> PageType {
    if let Some(explicit) = unit.explicit_type {
        return explicit;
    }
    if unit.position == 0 {
        return PageType::Cover;
    }
    if total_units > 0 && unit.position == total_units - 1 {
        return PageType::Ending;
    }

    let title = unit.title.to_lowercase();
    if TRANSITION_KEYWORDS.iter().any(|k| title.contains(k)) {
        return PageType::Transition;
    }
    if ENDING_KEYWORDS.iter().any(|k| title.contains(k)) {
        return PageType::Ending;
    }

    PageType::Content
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
