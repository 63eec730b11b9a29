//! Plan execution.
//!
//! Execution is wipe-and-rebuild:
//!
//! 1. Every immediate child of the output root is removed, except those a
//!    `Keep` operation targets.
//! 2. The plan is walked depth-first. Directory operations create their
//!    directory, copy operations copy bytes, render operations convert the
//!    markdown and run it through the page's layout.
//!
//! Failing to prepare the output root aborts. A failing operation is marked
//! [`Status::Error`] and the walk continues, so one broken page does not
//! hide the rest of the site. The returned [`ExecutionSummary`] lists every
//! failure.

use crate::classify::{BuildTask, WorkKind};
use crate::config::SiteLayout;
use crate::plan::{OperationType, Plan, SiteData, Status};
use crate::render::{self, MarkdownConverter, RenderCache, RenderError, Renderer};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("failed to prepare output directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single operation failed.
#[derive(Error, Debug)]
enum OperationError {
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub target: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub directories: usize,
    pub copied: usize,
    pub rendered: usize,
    /// Top-level output entries removed by the wipe.
    pub wiped: usize,
    pub kept: usize,
    pub failures: Vec<ExecutionFailure>,
}

impl ExecutionSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Execute `plan` against the output root of `layout`.
pub fn execute(
    plan: &mut Plan,
    layout: &SiteLayout,
    renderer: &dyn Renderer,
    converter: &dyn MarkdownConverter,
) -> Result<ExecutionSummary, ExecuteError> {
    let mut summary = ExecutionSummary::default();
    prepare_output(plan, &layout.output_root, &mut summary)?;

    let mut cache = RenderCache::new(converter);
    let default_layout = layout.config.default_layout.as_str();

    for id in plan.depth_first() {
        let op = plan.get(id);
        let result = match op.kind {
            OperationType::CreateOverwrite => match &op.task {
                Some(task) => perform(task, &plan.site, default_layout, renderer, &mut cache, &mut summary),
                None => Ok(()),
            },
            _ => Ok(()),
        };
        let target = op.target.clone();
        let op = plan.get_mut(id);
        match result {
            Ok(()) => op.status = Status::Complete,
            Err(e) => {
                let message = e.to_string();
                error!(target = ?target, error = %message, "operation failed");
                op.status = Status::Error(message.clone());
                summary.failures.push(ExecutionFailure { target, message });
            }
        }
    }

    info!(
        directories = summary.directories,
        copied = summary.copied,
        rendered = summary.rendered,
        failures = summary.failures.len(),
        "build finished"
    );
    Ok(summary)
}

/// Create the output root and clear everything except kept entries.
fn prepare_output(plan: &Plan, output_root: &Path, summary: &mut ExecutionSummary) -> Result<(), ExecuteError> {
    let prepare_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ExecuteError::Prepare { path, source }
    };
    fs::create_dir_all(output_root).map_err(prepare_err(output_root))?;

    for entry in fs::read_dir(output_root).map_err(prepare_err(output_root))? {
        let entry = entry.map_err(prepare_err(output_root))?;
        let path = entry.path();
        if plan.find_target(OperationType::Keep, &path).is_some() {
            debug!(path = %path.display(), "kept");
            summary.kept += 1;
            continue;
        }
        let file_type = entry.file_type().map_err(prepare_err(&path))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(prepare_err(&path))?;
        } else {
            fs::remove_file(&path).map_err(prepare_err(&path))?;
        }
        summary.wiped += 1;
    }
    Ok(())
}

fn perform(
    task: &BuildTask,
    site: &SiteData,
    default_layout: &str,
    renderer: &dyn Renderer,
    cache: &mut RenderCache<'_>,
    summary: &mut ExecutionSummary,
) -> Result<(), OperationError> {
    let Some(target) = &task.target else {
        return Ok(());
    };

    if task.is_dir {
        create_dir(target)?;
        summary.directories += 1;
        return Ok(());
    }

    if let Some(parent) = target.parent() {
        create_dir(parent)?;
    }
    match task.work {
        WorkKind::Copy => {
            let Some(source) = &task.source else {
                return Ok(());
            };
            fs::copy(source, target).map_err(|e| OperationError::Io {
                action: "copy to",
                path: target.clone(),
                source: e,
            })?;
            summary.copied += 1;
        }
        WorkKind::Render => {
            let view = render::view_model(task, site, default_layout, cache)?;
            let html = renderer.render(task.layout_id(default_layout), &view)?;
            fs::write(target, html).map_err(|e| OperationError::Io {
                action: "write",
                path: target.clone(),
                source: e,
            })?;
            summary.rendered += 1;
        }
        WorkKind::None => {}
    }
    debug!(target = %target.display(), work = ?task.work, "wrote");
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), OperationError> {
    fs::create_dir_all(path).map_err(|source| OperationError::Io {
        action: "create directory",
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HandlebarsRenderer, PulldownConverter};
    use crate::test_helpers::{SiteFixture, find_op};

    #[test]
    fn build_renders_and_copies() {
        let fx = SiteFixture::new();
        fx.source("about.md", "---\ntitle: About\n---\n*hello*");
        fx.source("img/logo.png", "PNG");
        fx.theme("css/site.css", "body{}");

        let (plan, summary) = fx.build();
        assert!(summary.is_success(), "{:?}", summary.failures);
        assert_eq!(fx.read_output("about.html"), "<main><p><em>hello</em></p>\n</main>");
        assert_eq!(fx.read_output("img/logo.png"), "PNG");
        assert_eq!(fx.read_output("css/site.css"), "body{}");
        assert_eq!(summary.rendered, 1);
        assert_eq!(summary.copied, 2);
        assert!(plan.operations().all(|op| op.status == Status::Complete));
    }

    #[test]
    fn wipe_removes_stale_and_spares_kept() {
        let fx = SiteFixture::new();
        fx.source("a.md", "a");
        fx.output("stale.html", "old");
        fx.output("olddir/x.html", "old");
        fx.output(".git/HEAD", "ref");

        let (_, summary) = fx.build();
        let out = &fx.layout.output_root;
        assert!(!out.join("stale.html").exists());
        assert!(!out.join("olddir").exists());
        assert_eq!(fx.read_output(".git/HEAD"), "ref");
        assert_eq!(summary.kept, 1);
        assert_eq!(summary.wiped, 2);
    }

    #[test]
    fn output_root_created_when_missing() {
        let fx = SiteFixture::new();
        fx.source("a.md", "a");
        assert!(!fx.layout.output_root.exists());
        fx.build();
        assert!(fx.layout.output_root.join("a.html").is_file());
    }

    #[test]
    fn render_failure_marks_operation_and_continues() {
        let fx = SiteFixture::new();
        fx.source("a.md", "---\nlayout: bad\n---\nA");
        fx.source("b.md", "B");
        fx.layout_file("bad", "{{page.title}}");

        let mut plan = fx.plan();
        // Compile a renderer whose "bad" layout is missing.
        struct Picky(HandlebarsRenderer);
        impl Renderer for Picky {
            fn has_template(&self, id: &str) -> bool {
                id != "bad" && self.0.has_template(id)
            }
            fn render(&self, id: &str, view: &serde_json::Value) -> Result<String, RenderError> {
                if id == "bad" {
                    return Err(RenderError::MissingTemplate(id.to_string()));
                }
                self.0.render(id, view)
            }
        }
        let renderer = Picky(HandlebarsRenderer::from_dir(&fx.layout.layouts_dir).unwrap());

        let summary = execute(&mut plan, &fx.layout, &renderer, &PulldownConverter).unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].message.contains("bad"));
        assert!(matches!(find_op(&plan, "_site/a.html").status, Status::Error(_)));
        assert_eq!(find_op(&plan, "_site/b.html").status, Status::Complete);
        assert_eq!(fx.read_output("b.html"), "<main><p>B</p>\n</main>");
    }

    #[test]
    fn listing_page_renders_posts() {
        let fx = SiteFixture::with_config(serde_json::json!({ "page_size": 1 }));
        fx.layout_file(
            "list",
            "{{#each posts}}[{{title}}]{{/each}}{{#if paginator.next_url}} next={{paginator.next_url}}{{/if}}",
        );
        fx.source("index.md", "---\nlayout: list\n---\n");
        fx.source("_posts/2024-01-01-first.md", "---\ntitle: First\n---\n");
        fx.source("_posts/2024-01-02-second.md", "---\ntitle: Second\n---\n");

        let (_, summary) = fx.build();
        assert!(summary.is_success());
        assert_eq!(fx.read_output("index.html"), "[Second] next=/index2.html");
        assert_eq!(fx.read_output("index2.html"), "[First]");
        assert!(fx.layout.output_root.join("2024/01/02/second.html").is_file());
    }

    #[test]
    fn site_navigation_available_to_layouts() {
        let fx = SiteFixture::new();
        fx.layout_file(
            "menu",
            "{{#each site.navigation}}<a href=\"{{url}}\">{{title}}</a>{{/each}}",
        );
        fx.source("a.md", "---\ntitle: Home\nnav: 1\nlayout: menu\n---\n");

        fx.build();
        assert_eq!(fx.read_output("a.html"), "<a href=\"/a.html\">Home</a>");
    }
}
