//! Navigation and sidebar trees from dotted order strings.
//!
//! Pages opt into a menu with a front-matter order such as `nav: 1.2`. The
//! number of dot-separated segments is the depth: `"1"` is top level, `"1.2"`
//! is a child of `"1"`. Siblings sort lexicographically by order string.
//!
//! ```text
//! nav: 1     ──►  1
//! nav: 1.1   ──►  ├── 1.1
//! nav: 1.2   ──►  └── 1.2
//! nav: 2     ──►  2
//! ```
//!
//! A child whose parent order has no page is dropped.

use serde::Serialize;

/// A page that declared a menu order.
#[derive(Debug, Clone, PartialEq)]
pub struct NavCandidate {
    pub order: String,
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavNode {
    pub order: String,
    pub level: usize,
    pub id: String,
    pub title: String,
    pub url: String,
    pub children: Vec<NavNode>,
}

/// Sidebar entries share the navigation node shape.
pub type SidebarNode = NavNode;

/// Depth of an order string, starting at 0 for top level.
pub fn order_level(order: &str) -> usize {
    order.split('.').count().saturating_sub(1)
}

/// Build the forest of top-level nodes, each with its nested children.
pub fn build_tree(candidates: &[NavCandidate]) -> Vec<NavNode> {
    let mut sorted: Vec<&NavCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.order.cmp(&b.order));
    children_of(None, 0, &sorted)
}

fn children_of(parent: Option<&str>, level: usize, sorted: &[&NavCandidate]) -> Vec<NavNode> {
    sorted
        .iter()
        .filter(|c| order_level(&c.order) == level)
        .filter(|c| match parent {
            None => true,
            Some(p) => c
                .order
                .strip_prefix(p)
                .is_some_and(|rest| rest.starts_with('.')),
        })
        .map(|c| NavNode {
            order: c.order.clone(),
            level,
            id: c.id.clone(),
            title: c.title.clone(),
            url: c.url.clone(),
            children: children_of(Some(&c.order), level + 1, sorted),
        })
        .collect()
}
