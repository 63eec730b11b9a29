//! Entry classification.
//!
//! Every file and directory seen during planning is classified exactly once
//! into a [`BuildTask`]: what the entry is (post, draft, tag listing, theme
//! file...), where its output goes, and what work produces that output.
//!
//! ## Rules
//!
//! Well-known directories short-circuit everything else:
//!
//! ```text
//! my-site/                     IsSiteRoot
//! ├── source/                  IsSourceRoot          → _site/
//! │   ├── _posts/              IsPostsDir            (no output of its own)
//! │   │   └── 2024-01-02-a.md  IsPost                → _site/2024/01/02/a.html
//! │   ├── _drafts/             IsDraftsDir           (skipped outside test mode)
//! │   ├── tag/                 IsTagListingDir
//! │   │   └── index.md         IsTagListing          → _site/tag/<slug>/index.html
//! │   ├── .hidden              IsSkip
//! │   └── about.md             ChildOfSource         → _site/about.html
//! └── themes/default/          IsThemeRoot           → _site/
//!     ├── _layouts/            IsSkip
//!     └── css/site.css         ChildOfTheme          → _site/css/site.css
//! ```
//!
//! Skip is inherited: every descendant of a skipped directory is skipped.
//! A post whose filename lacks a valid `YYYY-MM-DD-` prefix is
//! classified `Invalid`; it appears in the plan but never produces output.
//!
//! Markdown files are rendered through a layout, everything else is copied
//! verbatim.

use crate::config::SiteLayout;
use crate::frontmatter::{self, FrontMatter, FrontMatterError};
use crate::naming::{self, parse_dated_name};
use crate::paginate::Paginator;
use crate::render::LayoutIndex;
use crate::tree::SourceEntry;
use chrono::{Datelike, NaiveDate};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::ops::{BitOr, BitOrAssign, BitXor};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions treated as markdown content.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];
/// Template sources never copied to the output.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["hbs", "handlebars"];

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },
    #[error("{path} uses layout '{layout}', which does not exist")]
    MissingLayout { path: PathBuf, layout: String },
    #[error("{0} is outside the source and theme trees")]
    OutsideTree(PathBuf),
}

// ============================================================================
// Flags
// ============================================================================

/// Set of classification flags, combinable with `|` and `^`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClassificationFlags(u16);

impl ClassificationFlags {
    pub const NONE: Self = Self(0);
    pub const IS_SITE_ROOT: Self = Self(1 << 0);
    pub const IS_SOURCE_ROOT: Self = Self(1 << 1);
    pub const IS_THEME_ROOT: Self = Self(1 << 2);
    pub const IS_POSTS_DIR: Self = Self(1 << 3);
    pub const IS_DRAFTS_DIR: Self = Self(1 << 4);
    pub const IS_TAG_LISTING_DIR: Self = Self(1 << 5);
    pub const CHILD_OF_SOURCE: Self = Self(1 << 6);
    pub const CHILD_OF_THEME: Self = Self(1 << 7);
    pub const CHILD_OF_OUTPUT: Self = Self(1 << 8);
    pub const IS_POST: Self = Self(1 << 9);
    pub const IS_DRAFT: Self = Self(1 << 10);
    pub const IS_TAG_LISTING: Self = Self(1 << 11);
    pub const IS_SKIP: Self = Self(1 << 12);
    pub const IS_KEEP: Self = Self(1 << 13);
    pub const IS_INVALID: Self = Self(1 << 14);
    /// A page that lists posts through the paginator.
    pub const IS_LISTING: Self = Self(1 << 15);

    const NAMES: [(Self, &'static str); 16] = [
        (Self::IS_SITE_ROOT, "IsSiteRoot"),
        (Self::IS_SOURCE_ROOT, "IsSourceRoot"),
        (Self::IS_THEME_ROOT, "IsThemeRoot"),
        (Self::IS_POSTS_DIR, "IsPostsDir"),
        (Self::IS_DRAFTS_DIR, "IsDraftsDir"),
        (Self::IS_TAG_LISTING_DIR, "IsTagListingDir"),
        (Self::CHILD_OF_SOURCE, "ChildOfSource"),
        (Self::CHILD_OF_THEME, "ChildOfTheme"),
        (Self::CHILD_OF_OUTPUT, "ChildOfOutput"),
        (Self::IS_POST, "IsPost"),
        (Self::IS_DRAFT, "IsDraft"),
        (Self::IS_TAG_LISTING, "IsTagListing"),
        (Self::IS_SKIP, "IsSkip"),
        (Self::IS_KEEP, "IsKeep"),
        (Self::IS_INVALID, "IsInvalid"),
        (Self::IS_LISTING, "IsListing"),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// All flags in `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Any flag in `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_skip(self) -> bool {
        self.contains(Self::IS_SKIP)
    }

    pub const fn is_keep(self) -> bool {
        self.contains(Self::IS_KEEP)
    }

    pub const fn is_invalid(self) -> bool {
        self.contains(Self::IS_INVALID)
    }

    pub const fn is_post(self) -> bool {
        self.contains(Self::IS_POST)
    }

    pub const fn is_draft(self) -> bool {
        self.contains(Self::IS_DRAFT)
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for ClassificationFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClassificationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitXor for ClassificationFlags {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl fmt::Debug for ClassificationFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    /// Byte-for-byte copy of the source file.
    Copy,
    /// Markdown rendered through a layout.
    Render,
    /// No file work (directories, skipped entries).
    None,
}

/// The classified unit of work for one entry.
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub source: Option<PathBuf>,
    pub is_dir: bool,
    pub flags: ClassificationFlags,
    /// Present for every rendered task.
    pub front_matter: Option<FrontMatter>,
    /// Publication date of posts and drafts, from the filename.
    pub date: Option<NaiveDate>,
    pub title: String,
    /// Output path relative to the output root; empty for the root itself.
    pub output_segments: Vec<String>,
    /// Absolute output path; `None` when the entry produces nothing.
    pub target: Option<PathBuf>,
    /// Empty when `target` is `None`.
    pub url: String,
    /// Stable identifier derived from the output path. Empty when `target`
    /// is `None`.
    pub id: String,
    pub work: WorkKind,
    /// Set on expanded listing pages.
    pub pagination: Option<Pagination>,
}

/// The slice of items one listing page presents.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub paginator: Paginator,
    pub items: Vec<BuildTask>,
}

impl BuildTask {
    fn bare(entry: &SourceEntry, flags: ClassificationFlags) -> Self {
        let stem = entry.stem();
        let dated = if flags.intersects(ClassificationFlags::IS_POST | ClassificationFlags::IS_DRAFT) {
            parse_dated_name(&stem)
        } else {
            None
        };
        let title = match &dated {
            Some(d) => d.display_title.clone(),
            None if entry.is_dir => entry.name.clone(),
            None => naming::display_title(&stem),
        };
        Self {
            source: Some(entry.path.clone()),
            is_dir: entry.is_dir,
            flags,
            front_matter: None,
            date: dated.map(|d| d.date),
            title,
            output_segments: Vec::new(),
            target: None,
            url: String::new(),
            id: String::new(),
            work: WorkKind::None,
            pagination: None,
        }
    }

    /// Layout template id: front matter choice, or `default`.
    pub fn layout_id<'a>(&'a self, default: &'a str) -> &'a str {
        self.front_matter
            .as_ref()
            .and_then(|fm| fm.layout.as_deref())
            .unwrap_or(default)
    }

    pub fn tags(&self) -> &[String] {
        self.front_matter
            .as_ref()
            .map(|fm| fm.tags.as_slice())
            .unwrap_or(&[])
    }

    pub fn nav_order(&self) -> Option<&str> {
        self.front_matter.as_ref().and_then(|fm| fm.nav.as_deref())
    }

    pub fn sidebar_order(&self) -> Option<&str> {
        self.front_matter.as_ref().and_then(|fm| fm.sidebar.as_deref())
    }

    pub fn is_rendered(&self) -> bool {
        self.work == WorkKind::Render
    }

    /// Final output segment.
    pub fn file_name(&self) -> Option<&str> {
        self.output_segments.last().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    MissingDatePrefix { file_name: String },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MissingDatePrefix { file_name } => {
                write!(f, "{file_name} does not start with a YYYY-MM-DD- date")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Classification {
    Valid(BuildTask),
    Invalid { task: BuildTask, reason: InvalidReason },
}

impl Classification {
    pub fn task(&self) -> &BuildTask {
        match self {
            Classification::Valid(task) | Classification::Invalid { task, .. } => task,
        }
    }

    pub fn into_task(self) -> BuildTask {
        match self {
            Classification::Valid(task) | Classification::Invalid { task, .. } => task,
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

pub struct Classifier<'a> {
    layout: &'a SiteLayout,
    layouts: &'a LayoutIndex,
    test_mode: bool,
}

impl<'a> Classifier<'a> {
    pub fn new(layout: &'a SiteLayout, layouts: &'a LayoutIndex, test_mode: bool) -> Self {
        Self {
            layout,
            layouts,
            test_mode,
        }
    }

    pub fn url_prefix(&self) -> &str {
        self.layout.config.effective_url_prefix(self.test_mode)
    }

    /// Task for the site root itself, used by the plan's root operation.
    pub fn site_root_task(&self) -> BuildTask {
        let entry = SourceEntry {
            name: String::new(),
            path: self.layout.site_root.clone(),
            is_dir: true,
            parent: None,
            children: Vec::new(),
        };
        BuildTask::bare(&entry, ClassificationFlags::IS_SITE_ROOT)
    }

    /// Classify one entry given its parent's flags (`None` for a tree root).
    pub fn classify(
        &self,
        entry: &SourceEntry,
        parent: Option<ClassificationFlags>,
    ) -> Result<Classification, ClassifyError> {
        type F = ClassificationFlags;

        let flags = self.path_flags(entry, parent.unwrap_or_default());
        let mut task = BuildTask::bare(entry, flags);

        if flags.is_invalid() {
            return Ok(Classification::Invalid {
                task,
                reason: InvalidReason::MissingDatePrefix {
                    file_name: entry.name.clone(),
                },
            });
        }
        if flags.is_skip() || flags.intersects(F::IS_SITE_ROOT | F::IS_POSTS_DIR | F::IS_DRAFTS_DIR)
        {
            return Ok(Classification::Valid(task));
        }

        let segments = self.output_segments(entry, &task)?;
        if entry.is_dir {
            self.place(&mut task, segments);
            return Ok(Classification::Valid(task));
        }

        if is_markdown(entry) {
            let raw = fs::read_to_string(&entry.path).map_err(|source| ClassifyError::Io {
                path: entry.path.clone(),
                source,
            })?;
            let front_matter = frontmatter::parse(&raw)
                .map_err(|source| ClassifyError::FrontMatter {
                    path: entry.path.clone(),
                    source,
                })?
                .unwrap_or_default();

            let layout_id = front_matter
                .layout
                .clone()
                .unwrap_or_else(|| self.layout.config.default_layout.clone());
            if !self.layouts.contains(&layout_id) {
                return Err(ClassifyError::MissingLayout {
                    path: entry.path.clone(),
                    layout: layout_id,
                });
            }
            if (front_matter.paginate || self.layouts.uses_paginator(&layout_id))
                && !flags.contains(F::IS_TAG_LISTING)
            {
                task.flags |= F::IS_LISTING;
            }
            if let Some(title) = &front_matter.title {
                task.title = title.clone();
            }
            task.front_matter = Some(front_matter);
            task.work = WorkKind::Render;
        } else {
            task.work = WorkKind::Copy;
        }

        self.place(&mut task, segments);
        Ok(Classification::Valid(task))
    }

    /// Flags for an entry of the output tree during reconciliation.
    ///
    /// Only direct children of the output root can be kept.
    pub fn classify_output(&self, entry: &SourceEntry) -> ClassificationFlags {
        let mut flags = ClassificationFlags::NONE;
        if is_within(&entry.path, &self.layout.output_root) {
            flags |= ClassificationFlags::CHILD_OF_OUTPUT;
        }
        if entry.path.parent() == Some(self.layout.output_root.as_path())
            && self.layout.is_keep_name(&entry.name)
        {
            flags |= ClassificationFlags::IS_KEEP;
        }
        flags
    }

    /// Copy of `task` writing to `segments` instead of its own output path.
    pub fn relocate(&self, task: &BuildTask, segments: Vec<String>) -> BuildTask {
        let mut moved = task.clone();
        self.place(&mut moved, segments);
        moved
    }

    fn path_flags(&self, entry: &SourceEntry, parent: ClassificationFlags) -> ClassificationFlags {
        type F = ClassificationFlags;
        let l = self.layout;
        let path = entry.path.as_path();

        if path == l.site_root {
            return F::IS_SITE_ROOT;
        }
        if path == l.source_root {
            return F::IS_SOURCE_ROOT;
        }
        if path == l.theme_root {
            return F::IS_THEME_ROOT;
        }
        if entry.is_dir && path == l.posts_dir {
            return F::IS_POSTS_DIR | F::CHILD_OF_SOURCE;
        }
        if entry.is_dir && path == l.drafts_dir {
            let flags = F::IS_DRAFTS_DIR | F::CHILD_OF_SOURCE;
            return if self.test_mode { flags } else { flags | F::IS_SKIP };
        }

        let mut flags = F::NONE;
        if is_within(path, &l.source_root) {
            flags |= F::CHILD_OF_SOURCE;
        }
        if is_within(path, &l.theme_root) {
            flags |= F::CHILD_OF_THEME;
        }
        if is_within(path, &l.output_root) {
            flags |= F::CHILD_OF_OUTPUT;
        }

        if parent.is_skip() || entry.name.starts_with('.') || path == l.layouts_dir {
            flags |= F::IS_SKIP;
        }
        let extension = entry.extension();
        if !entry.is_dir
            && extension
                .as_deref()
                .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e))
        {
            flags |= F::IS_SKIP;
        }

        if entry.is_dir && (path == l.source_tags_dir || path == l.theme_tags_dir) {
            flags |= F::IS_TAG_LISTING_DIR;
        }
        let markdown = is_markdown(entry);
        if markdown && parent.contains(F::IS_TAG_LISTING_DIR) {
            flags |= F::IS_TAG_LISTING;
        }

        for (dir_flag, item_flag) in [(F::IS_POSTS_DIR, F::IS_POST), (F::IS_DRAFTS_DIR, F::IS_DRAFT)] {
            if !parent.contains(dir_flag) {
                continue;
            }
            if !markdown {
                flags |= F::IS_SKIP;
            } else {
                flags |= item_flag;
                if !parent.is_skip() && parse_dated_name(&entry.stem()).is_none() {
                    flags |= F::IS_INVALID | F::IS_SKIP;
                }
            }
        }

        flags
    }

    fn output_segments(
        &self,
        entry: &SourceEntry,
        task: &BuildTask,
    ) -> Result<Vec<String>, ClassifyError> {
        type F = ClassificationFlags;
        let l = self.layout;

        if let Some(date) = task.date {
            let slug = parse_dated_name(&entry.stem())
                .map(|d| d.slug)
                .unwrap_or_else(|| entry.stem());
            let mut segments = Vec::new();
            if task.flags.is_draft() {
                segments.push("drafts".to_string());
            }
            segments.push(format!("{:04}", date.year()));
            segments.push(format!("{:02}", date.month()));
            segments.push(format!("{:02}", date.day()));
            segments.push(format!("{slug}.html"));
            return Ok(segments);
        }

        let tree_root = if task.flags.intersects(F::IS_SOURCE_ROOT | F::CHILD_OF_SOURCE) {
            &l.source_root
        } else if task.flags.intersects(F::IS_THEME_ROOT | F::CHILD_OF_THEME) {
            &l.theme_root
        } else {
            return Err(ClassifyError::OutsideTree(entry.path.clone()));
        };
        let relative = entry
            .path
            .strip_prefix(tree_root)
            .map_err(|_| ClassifyError::OutsideTree(entry.path.clone()))?;
        let mut segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        if is_markdown(entry)
            && let Some(last) = segments.last_mut()
        {
            *last = format!("{}.html", entry.stem());
        }
        Ok(segments)
    }

    fn place(&self, task: &mut BuildTask, segments: Vec<String>) {
        let mut target = self.layout.output_root.clone();
        target.extend(&segments);
        task.url = output_url(&segments, task.is_dir, self.url_prefix());
        task.id = stable_id(&segments);
        task.target = Some(target);
        task.output_segments = segments;
    }
}

fn is_within(path: &Path, root: &Path) -> bool {
    path != root && path.starts_with(root)
}

fn is_markdown(entry: &SourceEntry) -> bool {
    !entry.is_dir
        && entry
            .extension()
            .as_deref()
            .is_some_and(|e| MARKDOWN_EXTENSIONS.contains(&e))
}

/// Public URL for an output path.
///
/// A trailing `index.html` maps to its directory URL:
/// - `["about.html"]` → `/about.html`
/// - `["tag", "rust", "index.html"]` → `/tag/rust/`
/// - `[]` → `/`
pub fn output_url(segments: &[String], is_dir: bool, prefix: &str) -> String {
    let mut parts: Vec<&str> = segments.iter().map(String::as_str).collect();
    let index = parts.last() == Some(&"index.html");
    if index {
        parts.pop();
    }
    let joined = parts.join("/");
    if joined.is_empty() {
        format!("{prefix}/")
    } else if index || is_dir {
        format!("{prefix}/{joined}/")
    } else {
        format!("{prefix}/{joined}")
    }
}

/// First 12 hex characters of the SHA-256 of the output-relative path.
pub fn stable_id(segments: &[String]) -> String {
    let digest = Sha256::digest(segments.join("/").as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}
