//! Markdown image helpers used when a page description embeds images.

use std::sync::LazyLock;

use regex::Regex;

/// `![alt](url)` or `![alt](url "title")`.
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*([^)\s]+)(?:\s+"[^"]*")?\s*\)"#).expect("valid regex")
});

/// Image URLs referenced by markdown image syntax, in order of appearance,
/// without duplicates.
pub fn extract_image_urls(markdown: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for caps in IMAGE_RE.captures_iter(markdown) {
        let url = caps[1].to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Strip markdown images from `markdown`, leaving the surrounding text.
pub fn remove_markdown_images(markdown: &str) -> String {
    IMAGE_RE.replace_all(markdown, "").trim().to_string()
}

/// Append `extra` to `base`, skipping entries already present. `base` keeps
/// its order and wins on duplicates.
pub fn merge_references(base: &[String], extra: &[String]) -> Vec<String> {
    let mut merged = base.to_vec();
    for url in extra {
        if !merged.contains(url) {
            merged.push(url.clone());
        }
    }
    merged
}
