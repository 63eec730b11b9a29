//! Shared test utilities for the sitewright test suite.
//!
//! Provides an on-disk site fixture plus lookup helpers that work with
//! planning data structures (`Plan`, `Operation`, `BuildTask`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fx = SiteFixture::new();
//! fx.source("about.md", "---\ntitle: About\n---\nHi");
//! fx.output("stale.html", "old");
//!
//! let plan = fx.plan();
//! assert_eq!(find_op(&plan, "_site/about.html").kind, OperationType::CreateOverwrite);
//! assert_eq!(targets_of(&plan, OperationType::Delete), vec!["_site/stale.html"]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::classify::{BuildTask, ClassificationFlags, WorkKind};
use crate::config::{CONFIG_JSON, SiteConfig, SiteLayout};
use crate::execute::{self, ExecutionSummary};
use crate::frontmatter::FrontMatter;
use crate::plan::{Operation, OperationType, Plan};
use crate::planner::{self, PlanOptions};
use crate::render::{HandlebarsRenderer, LayoutIndex, PulldownConverter};

/// Layout every fixture starts with.
pub const DEFAULT_LAYOUT: &str = "<main>{{{content}}}</main>";

// =========================================================================
// Fixture setup
// =========================================================================

/// A throwaway site: `source/`, `themes/default/_layouts/default.hbs`.
pub struct SiteFixture {
    pub tmp: TempDir,
    pub layout: SiteLayout,
}

impl SiteFixture {
    /// A minimal valid site with the default layout.
    pub fn new() -> Self {
        let fx = Self::empty();
        fs::create_dir_all(&fx.layout.source_root).unwrap();
        fx.layout_file("default", DEFAULT_LAYOUT);
        fx
    }

    /// A temp directory with no site structure at all.
    pub fn empty() -> Self {
        let tmp = TempDir::new().unwrap();
        let layout = SiteLayout::new(tmp.path(), SiteConfig::default());
        Self { tmp, layout }
    }

    /// A minimal valid site with `config` written to `site.json`.
    pub fn with_config(config: serde_json::Value) -> Self {
        let mut fx = Self::new();
        fs::write(fx.root().join(CONFIG_JSON), config.to_string()).unwrap();
        fx.layout = SiteLayout::load(fx.tmp.path()).unwrap();
        fs::create_dir_all(&fx.layout.source_root).unwrap();
        fs::create_dir_all(&fx.layout.layouts_dir).unwrap();
        if !fx.layout.layouts_dir.join("default.hbs").exists() {
            fx.layout_file("default", DEFAULT_LAYOUT);
        }
        fx
    }

    pub fn root(&self) -> &Path {
        &self.layout.site_root
    }

    /// Write `content` at `base/rel`, creating parents.
    fn write(&self, base: &Path, rel: &str, content: &str) -> PathBuf {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn source(&self, rel: &str, content: &str) -> PathBuf {
        self.write(&self.layout.source_root, rel, content)
    }

    pub fn theme(&self, rel: &str, content: &str) -> PathBuf {
        self.write(&self.layout.theme_root, rel, content)
    }

    pub fn output(&self, rel: &str, content: &str) -> PathBuf {
        self.write(&self.layout.output_root, rel, content)
    }

    /// Write a layout named `id` (`.hbs` appended).
    pub fn layout_file(&self, id: &str, content: &str) -> PathBuf {
        self.write(&self.layout.layouts_dir, &format!("{id}.hbs"), content)
    }

    pub fn layouts(&self) -> LayoutIndex {
        LayoutIndex::load(&self.layout.layouts_dir).unwrap()
    }

    pub fn plan(&self) -> Plan {
        planner::plan(&self.layout, &PlanOptions::default()).unwrap()
    }

    pub fn plan_test_mode(&self) -> Plan {
        planner::plan(&self.layout, &PlanOptions { test_mode: true }).unwrap()
    }

    /// Plan and execute one full build.
    pub fn build(&self) -> (Plan, ExecutionSummary) {
        let mut plan = self.plan();
        let renderer = HandlebarsRenderer::from_dir(&self.layout.layouts_dir).unwrap();
        let summary = execute::execute(&mut plan, &self.layout, &renderer, &PulldownConverter).unwrap();
        (plan, summary)
    }

    /// Contents of a file under the output root.
    pub fn read_output(&self, rel: &str) -> String {
        let path = self.layout.output_root.join(rel);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read output {}: {e}", path.display()))
    }
}

// =========================================================================
// Plan lookups
// =========================================================================

fn rel_target(plan_root: &Path, op: &Operation) -> Option<String> {
    op.target
        .as_deref()
        .map(|t| t.strip_prefix(plan_root).unwrap_or(t).to_string_lossy().to_string())
}

fn site_root(plan: &Plan) -> PathBuf {
    plan.get(plan.root())
        .source()
        .map(Path::to_path_buf)
        .expect("plan root has a source path")
}

/// First operation (depth-first) whose target is `rel` under the site root.
///
/// Panics with the available targets if none match.
pub fn find_op<'a>(plan: &'a Plan, rel: &str) -> &'a Operation {
    let root = site_root(plan);
    plan.operations()
        .find(|op| rel_target(&root, op).as_deref() == Some(rel))
        .unwrap_or_else(|| {
            let available: Vec<String> = plan.operations().filter_map(|op| rel_target(&root, op)).collect();
            panic!("no operation targets '{rel}'. Available: {available:?}")
        })
}

/// Sorted site-relative targets of every operation of `kind`.
pub fn targets_of(plan: &Plan, kind: OperationType) -> Vec<String> {
    let root = site_root(plan);
    let mut targets: Vec<String> = plan
        .operations()
        .filter(|op| op.kind == kind)
        .filter_map(|op| rel_target(&root, op))
        .collect();
    targets.sort();
    targets
}

// =========================================================================
// Task builders
// =========================================================================

/// A rendered content task at `rel` carrying `tags`, with no filesystem
/// backing.
pub fn content_task(rel: &str, tags: &[&str]) -> BuildTask {
    BuildTask {
        source: Some(PathBuf::from(format!("/src/{rel}"))),
        is_dir: false,
        flags: ClassificationFlags::CHILD_OF_SOURCE,
        front_matter: Some(FrontMatter {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..FrontMatter::default()
        }),
        date: None,
        title: rel.to_string(),
        output_segments: rel.split('/').map(str::to_string).collect(),
        target: Some(PathBuf::from(format!("/out/{rel}"))),
        url: format!("/{rel}"),
        id: String::new(),
        work: WorkKind::Render,
        pagination: None,
    }
}
