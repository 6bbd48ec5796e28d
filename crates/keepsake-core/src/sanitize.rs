//! Sanitizers for guest-supplied strings.
//!
//! File names end up inside storage keys and uploader names end up in the
//! metadata table, so neither is stored without passing through here.

use crate::constants::{FALLBACK_FILENAME, MAX_FILENAME_CHARS, MAX_UPLOADER_NAME_CHARS};
use crate::models::extension_of;
use regex::Regex;
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("HTML tag pattern is valid"));

const SEPARATORS: [char; 2] = ['/', '\\'];

/// Make a guest-supplied file name safe for use as the last storage key segment.
///
/// Parent-directory sequences are removed, path separators become `_`, leading
/// and trailing separators are stripped and the result is trimmed. Returns
/// `"file"` when nothing survives.
pub fn sanitize_filename(filename: &str) -> String {
    // Control characters go first so they cannot split a `..` pair.
    let mut name: String = filename.chars().filter(|c| !c.is_control()).collect();
    while name.contains("..") {
        name = name.replace("..", "");
    }

    let replaced: String = name
        .chars()
        .map(|c| if SEPARATORS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced
        .trim_matches(|c: char| c == '_' || c.is_whitespace())
        .to_string();

    if trimmed.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    truncate_filename(trimmed)
}

/// Keep the extension when a name has to be shortened.
fn truncate_filename(name: String) -> String {
    if name.chars().count() <= MAX_FILENAME_CHARS {
        return name;
    }

    match extension_of(&name) {
        Some(ext) if ext.chars().count() < MAX_FILENAME_CHARS / 2 => {
            let keep = MAX_FILENAME_CHARS - ext.chars().count() - 1;
            let stem: String = name.chars().take(keep).collect();
            format!("{}.{}", stem.trim_end_matches('.'), ext)
        }
        _ => name.chars().take(MAX_FILENAME_CHARS).collect(),
    }
}

/// Clean the display name a guest typed before it is persisted.
///
/// Strips HTML tags and the characters `<>"'`, trims, and caps the result at
/// 100 characters. Returns `None` when the name is absent or empty afterwards.
pub fn sanitize_uploader_name(name: Option<&str>) -> Option<String> {
    let raw = name?;
    let without_tags = HTML_TAG.replace_all(raw, "");
    let cleaned: String = without_tags
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\''))
        .collect();

    let capped: String = cleaned
        .trim()
        .chars()
        .take(MAX_UPLOADER_NAME_CHARS)
        .collect();
    let capped = capped.trim_end().to_string();

    if capped.is_empty() {
        None
    } else {
        Some(capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_neutralised() {
        let safe = sanitize_filename("../../etc/passwd");
        assert!(!safe.contains(".."));
        assert!(!safe.contains('/'));
        assert!(!safe.is_empty());
        assert_eq!(safe, "etc_passwd");
    }

    #[test]
    fn empty_name_falls_back() {
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename("   "), "file");
        assert_eq!(sanitize_filename("../.."), "file");
        assert_eq!(sanitize_filename("//"), "file");
    }

    #[test]
    fn separators_become_underscores() {
        assert_eq!(sanitize_filename("party/pics\\IMG_1.jpg"), "party_pics_IMG_1.jpg");
    }

    #[test]
    fn ordinary_names_are_untouched() {
        assert_eq!(sanitize_filename("IMG_0001.jpg"), "IMG_0001.jpg");
        assert_eq!(sanitize_filename("first dance.mov"), "first dance.mov");
    }

    #[test]
    fn odd_dot_runs_are_collapsed() {
        let safe = sanitize_filename("a....b...c.jpg");
        assert!(!safe.contains(".."));
        assert!(safe.ends_with(".jpg"));
    }

    #[test]
    fn control_characters_cannot_rejoin_dots() {
        let safe = sanitize_filename(".\u{0}./.\u{7}./etc/passwd");
        assert!(!safe.contains(".."));
        assert_eq!(safe, "etc_passwd");

        let safe = sanitize_filename(".\u{0}./x");
        assert!(!safe.contains(".."));
        assert_eq!(safe, "x");
    }

    #[test]
    fn truncation_does_not_join_dots() {
        let long = format!("{}.{}.jpeg", "x".repeat(194), "y".repeat(40));
        let safe = sanitize_filename(&long);
        assert!(!safe.contains(".."));
        assert!(safe.ends_with("x.jpeg"));
    }

    #[test]
    fn long_names_keep_extension() {
        let long = format!("{}.jpeg", "x".repeat(400));
        let safe = sanitize_filename(&long);
        assert_eq!(safe.chars().count(), MAX_FILENAME_CHARS);
        assert!(safe.ends_with(".jpeg"));
    }

    #[test]
    fn uploader_name_strips_markup() {
        assert_eq!(
            sanitize_uploader_name(Some("<b>Amy</b> \"the\" O'Neil")),
            Some("Amy the ONeil".to_string())
        );
        assert_eq!(
            sanitize_uploader_name(Some("<script>alert(1)</script>Bob")),
            Some("alert(1)Bob".to_string())
        );
    }

    #[test]
    fn uploader_name_is_trimmed_and_capped() {
        assert_eq!(sanitize_uploader_name(Some("  Amy  ")), Some("Amy".to_string()));
        let long = "a".repeat(250);
        let capped = sanitize_uploader_name(Some(&long)).unwrap();
        assert_eq!(capped.chars().count(), MAX_UPLOADER_NAME_CHARS);
    }

    #[test]
    fn empty_uploader_name_is_absent() {
        assert_eq!(sanitize_uploader_name(None), None);
        assert_eq!(sanitize_uploader_name(Some("   ")), None);
        assert_eq!(sanitize_uploader_name(Some("<i></i>")), None);
    }
}
