//! Anchor ids for headings.

use std::sync::LazyLock;

use regex::Regex;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid regex"));
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static HYPHEN_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("valid regex"));

/// Generate a URL-safe slug from the flattened text of a heading.
///
/// Lowercases, trims, drops everything outside `[a-z0-9]`, whitespace and
/// `-`, turns whitespace runs into a single hyphen and collapses hyphen runs.
/// Edge hyphens are stripped. Never fails: input with nothing usable yields
/// an empty string.
///
/// No uniqueness is enforced; two headings with the same text share a slug.
///
/// ```
/// use card_render::slugify;
///
/// assert_eq!(slugify("Section One: Overview!!"), "section-one-overview");
/// assert_eq!(slugify("  Causes -- and  Effects "), "causes-and-effects");
/// assert_eq!(slugify("!!!"), "");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept = DISALLOWED.replace_all(lowered.trim(), "");
    let hyphenated = WHITESPACE_RUN.replace_all(&kept, "-");
    let collapsed = HYPHEN_RUN.replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_slugify_simple() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn test_slugify_punctuation() {
        assert_eq!(slugify("Section One: Overview!!"), "section-one-overview");
        assert_eq!(slugify("The 1648 Treaty (Münster)"), "the-1648-treaty-mnster");
    }

    #[test]
    fn test_slugify_whitespace_and_hyphens() {
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
        assert_eq!(slugify("tabs\tand\nnewlines"), "tabs-and-newlines");
        assert_eq!(slugify("a - b"), "a-b");
        assert_eq!(slugify("-edge-"), "edge");
    }

    #[test]
    fn test_slugify_underscores_are_dropped() {
        assert_eq!(slugify("snake_case"), "snakecase");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("   "), "");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("日本語"), "");
    }

    proptest! {
        #[test]
        fn prop_slug_charset_and_shape(s in "\\PC{0,64}") {
            let slug = slugify(&s);
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }

        #[test]
        fn prop_slug_is_idempotent(s in "\\PC{0,64}") {
            let once = slugify(&s);
            prop_assert_eq!(slugify(&once), once.clone());
        }
    }
}
