//! CLI output formatting for planning and execution.
//!
//! # Plan Report
//!
//! The plan prints as an indented tree that mirrors the operation tree.
//! Each line shows the operation, its source, and, for creates, its output:
//!
//! ```text
//! Site /home/me/blog
//!     [create] source/ → _site/
//!         [create] source/about.md → _site/about.html
//!         [create] source/index.md → _site/index.html (page 1/2)
//!         [create] source/index.md → _site/index2.html (page 2/2)
//!         [skip] source/.cache/ (3 entries)
//!         [invalid] source/_posts/hello.md (hello.md does not start with a YYYY-MM-DD- date)
//!     [create] themes/default/ → _site/
//!     _site/
//!         [keep] _site/.git
//!         [delete] _site/old.html (unsafe)
//!
//! Plan: 6 create, 1 skip, 1 keep, 1 delete (unsafe), 1 invalid
//! ```
//!
//! Descendants of a skipped entry are folded into an entry count. Deletes are
//! marked unsafe because they remove files the build did not produce this
//! time.
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::execute::ExecutionSummary;
use crate::plan::{OpId, Operation, OperationType, Plan};
use crate::planner::ValidationError;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn display(site_root: &Path, path: &Path, is_dir: bool) -> String {
    let rel = path
        .strip_prefix(site_root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    if is_dir { format!("{rel}/") } else { rel }
}

fn subtree_size(plan: &Plan, id: OpId) -> usize {
    plan.children(id)
        .iter()
        .map(|c| 1 + subtree_size(plan, *c))
        .sum()
}

fn op_line(op: &Operation, site_root: &Path, folded: usize) -> String {
    let source = op.source().map(|s| display(site_root, s, op.is_dir));
    let target = op.target.as_deref().map(|t| display(site_root, t, op.is_dir));

    let mut line = match (op.kind, source, target) {
        (OperationType::Null, _, Some(target)) => target,
        (OperationType::CreateOverwrite, Some(source), Some(target)) => {
            format!("[create] {source} \u{2192} {target}")
        }
        (kind, Some(source), _) => format!("[{}] {source}", kind.label()),
        (kind, None, Some(target)) => format!("[{}] {target}", kind.label()),
        (kind, None, None) => format!("[{}]", kind.label()),
    };

    if let Some(pagination) = op.task.as_ref().and_then(|t| t.pagination.as_ref()) {
        let p = &pagination.paginator;
        match &p.tag {
            Some(tag) => line.push_str(&format!(" ({tag}, page {}/{})", p.page_number, p.total_pages)),
            None => line.push_str(&format!(" (page {}/{})", p.page_number, p.total_pages)),
        }
    }
    if let Some(note) = &op.note {
        line.push_str(&format!(" ({note})"));
    }
    if folded > 0 {
        line.push_str(&format!(" ({folded} entries)"));
    }
    if op.kind == OperationType::Delete {
        line.push_str(" (unsafe)");
    }
    line
}

/// Indented operation tree plus a count line.
pub fn format_plan(plan: &Plan) -> Vec<String> {
    let root_op = plan.get(plan.root());
    let site_root = root_op.source().unwrap_or(Path::new(""));
    let mut lines = vec![format!("Site {}", site_root.display())];

    let mut stack: Vec<(OpId, usize)> = plan
        .children(plan.root())
        .iter()
        .rev()
        .map(|c| (*c, 1))
        .collect();
    while let Some((id, depth)) = stack.pop() {
        let op = plan.get(id);
        if op.kind == OperationType::Skip {
            lines.push(format!("{}{}", indent(depth), op_line(op, site_root, subtree_size(plan, id))));
            continue;
        }
        lines.push(format!("{}{}", indent(depth), op_line(op, site_root, 0)));
        stack.extend(plan.children(id).iter().rev().map(|c| (*c, depth + 1)));
    }

    lines.push(String::new());
    lines.push(format_counts(plan));
    lines
}

fn format_counts(plan: &Plan) -> String {
    let counts = [
        (OperationType::CreateOverwrite, "create"),
        (OperationType::Skip, "skip"),
        (OperationType::Keep, "keep"),
        (OperationType::Delete, "delete (unsafe)"),
        (OperationType::Invalid, "invalid"),
    ];
    let parts: Vec<String> = counts
        .iter()
        .map(|(kind, label)| (plan.count(*kind), label))
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();
    if parts.is_empty() {
        "Plan: nothing to do".to_string()
    } else {
        format!("Plan: {}", parts.join(", "))
    }
}

pub fn print_plan(plan: &Plan) {
    for line in format_plan(plan) {
        println!("{line}");
    }
}

/// One line per validation problem.
pub fn format_validation_errors(errors: &[ValidationError]) -> Vec<String> {
    let mut lines = vec!["Site validation failed:".to_string()];
    lines.extend(errors.iter().map(|e| format!("    {e}")));
    lines
}

pub fn print_validation_errors(errors: &[ValidationError]) {
    for line in format_validation_errors(errors) {
        eprintln!("{line}");
    }
}

/// Totals plus each failed operation.
pub fn format_summary(summary: &ExecutionSummary, site_root: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Built {} pages, copied {} files, created {} directories",
        summary.rendered, summary.copied, summary.directories
    )];
    if summary.kept > 0 {
        lines.push(format!("Kept {} top-level entries", summary.kept));
    }
    if !summary.failures.is_empty() {
        lines.push(format!("{} operation(s) failed:", summary.failures.len()));
        for failure in &summary.failures {
            let target = failure
                .target
                .as_deref()
                .map(|t| display(site_root, t, false))
                .unwrap_or_else(|| "(no target)".to_string());
            lines.push(format!("    {target}: {}", failure.message));
        }
    }
    lines
}

pub fn print_summary(summary: &ExecutionSummary, site_root: &Path) {
    for line in format_summary(summary, site_root) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::ExecutionFailure;
    use crate::test_helpers::SiteFixture;

    #[test]
    fn plan_report_shows_tree() {
        let fx = SiteFixture::new();
        fx.source("about.md", "# About");
        fx.output("old.html", "x");

        let lines = format_plan(&fx.plan());
        assert!(lines[0].starts_with("Site "));
        assert!(lines.contains(&"    [create] source/ \u{2192} _site/".to_string()));
        assert!(lines.contains(&"        [create] source/about.md \u{2192} _site/about.html".to_string()));
        assert!(lines.contains(&"    _site/".to_string()));
        assert!(lines.contains(&"        [delete] _site/old.html (unsafe)".to_string()));
        assert_eq!(lines.last().unwrap(), "Plan: 3 create, 2 skip, 1 delete (unsafe)");
    }

    #[test]
    fn skipped_subtree_folded() {
        let fx = SiteFixture::new();
        fx.source(".cache/a", "");
        fx.source(".cache/b/c", "");

        let lines = format_plan(&fx.plan());
        assert!(lines.contains(&"        [skip] source/.cache/ (3 entries)".to_string()));
        assert!(!lines.iter().any(|l| l.contains(".cache/a")));
    }

    #[test]
    fn invalid_shows_reason() {
        let fx = SiteFixture::new();
        fx.source("_posts/hello.md", "");
        let lines = format_plan(&fx.plan());
        assert!(
            lines
                .iter()
                .any(|l| l.trim() == "[invalid] source/_posts/hello.md (hello.md does not start with a YYYY-MM-DD- date)")
        );
    }

    #[test]
    fn listing_pages_annotated() {
        let fx = SiteFixture::with_config(serde_json::json!({ "page_size": 1 }));
        fx.layout_file("list", "{{paginator.page_number}}");
        fx.source("index.md", "---\nlayout: list\n---\n");
        fx.source("_posts/2024-01-01-a.md", "");
        fx.source("_posts/2024-01-02-b.md", "");

        let lines = format_plan(&fx.plan());
        assert!(lines.iter().any(|l| l.ends_with("_site/index2.html (page 2/2)")));
    }

    #[test]
    fn validation_errors_listed() {
        let errors = vec![ValidationError {
            message: "source directory does not exist".into(),
            path: Some("/x/source".into()),
        }];
        let lines = format_validation_errors(&errors);
        assert_eq!(lines[1], "    source directory does not exist: /x/source");
    }

    #[test]
    fn summary_lists_failures() {
        let summary = ExecutionSummary {
            rendered: 2,
            copied: 1,
            directories: 3,
            failures: vec![ExecutionFailure {
                target: Some("/site/_site/a.html".into()),
                message: "layout 'x' does not exist".into(),
            }],
            ..ExecutionSummary::default()
        };
        let lines = format_summary(&summary, Path::new("/site"));
        assert_eq!(lines[0], "Built 2 pages, copied 1 files, created 3 directories");
        assert_eq!(lines[1], "1 operation(s) failed:");
        assert_eq!(lines[2], "    _site/a.html: layout 'x' does not exist");
    }
}
