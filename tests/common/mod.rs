//! On-disk site fixture shared by the integration tests.

#![allow(dead_code)]

use sitewright::config::SiteLayout;
use sitewright::execute::{self, ExecutionSummary};
use sitewright::plan::{OperationType, Plan};
use sitewright::planner::{self, PlanOptions};
use sitewright::render::{HandlebarsRenderer, PulldownConverter};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct Site {
    pub tmp: TempDir,
}

impl Site {
    /// An empty source tree and a theme whose default layout wraps content.
    pub fn new() -> Self {
        let site = Self {
            tmp: TempDir::new().unwrap(),
        };
        fs::create_dir_all(site.root().join("source")).unwrap();
        site.write("themes/default/_layouts/default.hbs", "<main>{{{content}}}</main>");
        site
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn layout(&self) -> SiteLayout {
        SiteLayout::load(self.root()).unwrap()
    }

    pub fn plan(&self) -> Plan {
        planner::plan(&self.layout(), &PlanOptions::default()).unwrap()
    }

    pub fn build(&self) -> (Plan, ExecutionSummary) {
        let layout = self.layout();
        let mut plan = planner::plan(&layout, &PlanOptions::default()).unwrap();
        let renderer = HandlebarsRenderer::from_dir(&layout.layouts_dir).unwrap();
        let summary = execute::execute(&mut plan, &layout, &renderer, &PulldownConverter).unwrap();
        (plan, summary)
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).unwrap()
    }

    /// Site-relative targets of every operation of `kind`, sorted.
    pub fn targets(&self, plan: &Plan, kind: OperationType) -> Vec<String> {
        let root = self.layout().site_root;
        let mut targets: Vec<String> = plan
            .operations()
            .filter(|op| op.kind == kind)
            .filter_map(|op| op.target.as_deref())
            .map(|t| t.strip_prefix(&root).unwrap_or(t).to_string_lossy().to_string())
            .collect();
        targets.sort();
        targets
    }

    /// Every file under the output root with its contents, sorted by path.
    pub fn output_snapshot(&self) -> Vec<(String, String)> {
        let out = self.layout().output_root;
        let mut files: Vec<(String, String)> = walkdir::WalkDir::new(&out)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(&out).unwrap().to_string_lossy().to_string();
                (rel, fs::read_to_string(e.path()).unwrap())
            })
            .collect();
        files.sort();
        files
    }
}
