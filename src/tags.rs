//! Tag collection over classified content.

use crate::classify::BuildTask;
use crate::naming::{is_path_segment, slugify_tag};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A tag as exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagData {
    pub name: String,
    /// Output directory name; `None` when the tag has no usable one.
    pub slug: Option<String>,
    /// First listing page for this tag; `None` when the site has no
    /// tag-listing page.
    pub url: Option<String>,
    pub count: usize,
}

/// Distinct tag names across `tasks`, sorted. Tags are case-sensitive.
pub fn aggregate<'a>(tasks: impl IntoIterator<Item = &'a BuildTask>) -> BTreeSet<String> {
    tasks.into_iter().flat_map(|t| t.tags().iter().cloned()).collect()
}

/// Tasks carrying `tag`, in input order.
pub fn tagged<'a>(tag: &str, tasks: &'a [BuildTask]) -> Vec<&'a BuildTask> {
    tasks
        .iter()
        .filter(|t| t.tags().iter().any(|x| x == tag))
        .collect()
}

/// One distinct output slug per tag.
///
/// Tags are visited in sorted order. A slug already taken by an earlier tag
/// gets a numeric suffix (`rust`, `rust-2`, ...). Tags whose slug is not a
/// usable path segment (`..`, blank) are left out of the map.
pub fn assign_slugs(tags: &BTreeSet<String>) -> BTreeMap<String, String> {
    let mut taken = HashSet::new();
    let mut slugs = BTreeMap::new();
    for tag in tags {
        let base = slugify_tag(tag);
        if !is_path_segment(&base) {
            continue;
        }
        let mut slug = base.clone();
        let mut n = 2;
        while taken.contains(&slug) {
            slug = format!("{base}-{n}");
            n += 1;
        }
        taken.insert(slug.clone());
        slugs.insert(tag.clone(), slug);
    }
    slugs
}

/// Site-wide tag list with per-tag counts.
///
/// `slugs` comes from [`assign_slugs`]; `urls` maps tag name to the URL of
/// its first listing page.
pub fn tag_data(
    tasks: &[BuildTask],
    slugs: &BTreeMap<String, String>,
    urls: &BTreeMap<String, String>,
) -> Vec<TagData> {
    aggregate(tasks)
        .into_iter()
        .map(|name| TagData {
            slug: slugs.get(&name).cloned(),
            url: urls.get(&name).cloned(),
            count: tagged(&name, tasks).len(),
            name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::content_task;

    #[test]
    fn aggregate_distinct_sorted() {
        let tasks = vec![
            content_task("a.html", &["web", "rust"]),
            content_task("b.html", &["rust"]),
            content_task("c.html", &[]),
        ];
        let tags: Vec<String> = aggregate(&tasks).into_iter().collect();
        assert_eq!(tags, vec!["rust", "web"]);
    }

    #[test]
    fn aggregate_case_sensitive() {
        let tasks = vec![content_task("a.html", &["Rust", "rust"])];
        assert_eq!(aggregate(&tasks).len(), 2);
    }

    #[test]
    fn tagged_preserves_order() {
        let tasks = vec![
            content_task("a.html", &["rust"]),
            content_task("b.html", &["web"]),
            content_task("c.html", &["rust"]),
        ];
        let hits: Vec<_> = tagged("rust", &tasks)
            .iter()
            .map(|t| t.output_segments.join("/"))
            .collect();
        assert_eq!(hits, vec!["a.html", "c.html"]);
    }

    #[test]
    fn tag_data_counts_and_urls() {
        let tasks = vec![
            content_task("a.html", &["Open Source"]),
            content_task("b.html", &["Open Source", "rust"]),
        ];
        let mut urls = BTreeMap::new();
        urls.insert("rust".to_string(), "/tag/rust/".to_string());
        let slugs = assign_slugs(&aggregate(&tasks));

        let data = tag_data(&tasks, &slugs, &urls);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].name, "Open Source");
        assert_eq!(data[0].slug.as_deref(), Some("open-source"));
        assert_eq!(data[0].count, 2);
        assert_eq!(data[0].url, None);
        assert_eq!(data[1].url.as_deref(), Some("/tag/rust/"));
    }

    #[test]
    fn slugs_distinct_for_case_variants() {
        let tags: BTreeSet<String> = ["Rust", "rust", "rust-2"].iter().map(|t| t.to_string()).collect();
        let slugs = assign_slugs(&tags);
        assert_eq!(slugs["Rust"], "rust");
        assert_eq!(slugs["rust"], "rust-2");
        assert_eq!(slugs["rust-2"], "rust-2-2");
    }

    #[test]
    fn unusable_slugs_left_out() {
        let tags: BTreeSet<String> = ["..", ".", "  ", "web"].iter().map(|t| t.to_string()).collect();
        let slugs = assign_slugs(&tags);
        assert_eq!(slugs.len(), 1);
        assert_eq!(slugs["web"], "web");

        let tasks = vec![content_task("a.html", &[".."])];
        let data = tag_data(&tasks, &assign_slugs(&aggregate(&tasks)), &BTreeMap::new());
        assert_eq!(data[0].slug, None);
        assert_eq!(data[0].count, 1);
    }
}
