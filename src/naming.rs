//! Centralized filename parsing for the `YYYY-MM-DD-slug` post convention.
//!
//! Posts and drafts carry their publication date in the filename:
//! `2024-01-02-hello-world.md`. This module splits such names into a
//! calendar date and a slug, and derives the other names the build needs
//! from them (paginated filenames, tag slugs).
//!
//! ## Display Titles
//!
//! Dashes in the slug are converted to spaces for display. This is the
//! fallback title when front matter does not set one:
//! - `2024-01-02-hello-world` → "hello world"
//! - `about` → "about"

use chrono::NaiveDate;

/// Result of parsing a dated entry stem like `2024-01-02-hello-world`.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedName {
    pub date: NaiveDate,
    /// Raw slug after the date prefix, dashes preserved.
    pub slug: String,
    /// Display title: slug with dashes converted to spaces.
    pub display_title: String,
}

/// Parse a file stem following the `YYYY-MM-DD-slug` convention.
///
/// Returns `None` when the prefix is missing, the digits do not form a real
/// calendar date, or the slug is empty:
/// - `"2024-01-02-hello"` → date=2024-01-02, slug="hello"
/// - `"2024-02-30-x"` → None (no such date)
/// - `"2024-01-02-"` → None (empty slug)
/// - `"hello"` → None
pub fn parse_dated_name(stem: &str) -> Option<DatedName> {
    let bytes = stem.as_bytes();
    if bytes.len() < 12 {
        return None;
    }
    let digits_at = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if !(digits_at(0..4) && digits_at(5..7) && digits_at(8..10)) {
        return None;
    }
    if bytes[4] != b'-' || bytes[7] != b'-' || bytes[10] != b'-' {
        return None;
    }
    let year = stem[0..4].parse().ok()?;
    let month = stem[5..7].parse().ok()?;
    let day = stem[8..10].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let slug = &stem[11..];
    if slug.is_empty() {
        return None;
    }
    Some(DatedName {
        date,
        slug: slug.to_string(),
        display_title: display_title(slug),
    })
}

/// Dashes to spaces.
pub fn display_title(name: &str) -> String {
    name.replace('-', " ")
}

/// Filename for page `page` of a paginated listing.
///
/// Page 1 keeps the listing's own filename; later pages insert the page
/// number before the extension:
/// - `("index.html", 1)` → `"index.html"`
/// - `("index.html", 3)` → `"index3.html"`
/// - `("archive", 2)` → `"archive2"`
pub fn paginated_file_name(file_name: &str, page: usize) -> String {
    if page <= 1 {
        return file_name.to_string();
    }
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}", &file_name[..dot], page, &file_name[dot..]),
        _ => format!("{file_name}{page}"),
    }
}

/// URL-safe directory name for a tag.
///
/// Lowercases and replaces whitespace and `/` with `-`:
/// - `"Rust"` → `"rust"`
/// - `"Open Source"` → `"open-source"`
pub fn slugify_tag(tag: &str) -> String {
    tag.trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '-'
            } else {
                c
            }
        })
        .collect::<String>()
        .to_lowercase()
}

/// Whether `segment` can name a single directory under the output root.
///
/// Rejects empty names, `.`, `..` (and any all-dot name) and names holding
/// a path separator.
pub fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.chars().all(|c| c == '.')
        && !segment.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dated_with_multi_word_slug() {
        let p = parse_dated_name("2024-01-02-hello-big-world").unwrap();
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(p.slug, "hello-big-world");
        assert_eq!(p.display_title, "hello big world");
    }

    #[test]
    fn dated_single_char_slug() {
        let p = parse_dated_name("2024-01-01-a").unwrap();
        assert_eq!(p.slug, "a");
    }

    #[test]
    fn missing_prefix() {
        assert_eq!(parse_dated_name("hello-world"), None);
    }

    #[test]
    fn impossible_date() {
        assert_eq!(parse_dated_name("2024-02-30-leap"), None);
        assert_eq!(parse_dated_name("2024-13-01-month"), None);
    }

    #[test]
    fn leap_day_accepted() {
        assert!(parse_dated_name("2024-02-29-leap").is_some());
    }

    #[test]
    fn empty_slug() {
        assert_eq!(parse_dated_name("2024-01-02-"), None);
    }

    #[test]
    fn short_year_rejected() {
        assert_eq!(parse_dated_name("24-01-02-hello"), None);
    }

    #[test]
    fn wrong_separator_rejected() {
        assert_eq!(parse_dated_name("2024_01_02-hello"), None);
    }

    #[test]
    fn non_ascii_stem_does_not_panic() {
        assert_eq!(parse_dated_name("été-2024-01-02"), None);
    }

    #[test]
    fn paginated_first_page_unchanged() {
        assert_eq!(paginated_file_name("index.html", 1), "index.html");
    }

    #[test]
    fn paginated_later_pages_numbered() {
        assert_eq!(paginated_file_name("index.html", 2), "index2.html");
        assert_eq!(paginated_file_name("blog.html", 12), "blog12.html");
    }

    #[test]
    fn paginated_without_extension() {
        assert_eq!(paginated_file_name("archive", 2), "archive2");
    }

    #[test]
    fn tag_slug_lowercases() {
        assert_eq!(slugify_tag("Rust"), "rust");
    }

    #[test]
    fn tag_slug_replaces_spaces_and_slashes() {
        assert_eq!(slugify_tag("Open Source"), "open-source");
        assert_eq!(slugify_tag("ci/cd"), "ci-cd");
    }

    #[test]
    fn degenerate_tag_slugs_are_not_segments() {
        for tag in ["..", ".", "   ", "", "..."] {
            assert!(!is_path_segment(&slugify_tag(tag)), "{tag:?}");
        }
        assert!(is_path_segment(&slugify_tag("c++")));
        assert!(is_path_segment(&slugify_tag("v1.2")));
        assert!(is_path_segment(&slugify_tag("../etc")));
    }

    #[test]
    fn display_title_converts_dashes() {
        assert_eq!(display_title("who-am-i"), "who am i");
    }
}
