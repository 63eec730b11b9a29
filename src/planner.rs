//! Operation planning.
//!
//! Turns the source tree, the active theme, and the current output tree into
//! a [`Plan`] without touching the filesystem:
//!
//! 1. **Validate**: the site, source, theme, and layout directories exist and
//!    the output directory cannot swallow them. All problems are reported
//!    together.
//! 2. **Emit**: classify every source entry, then every theme entry, into
//!    operations that mirror the trees. A theme file whose output collides
//!    with a source file is skipped.
//! 3. **Aggregate**: build navigation, sidebar, and the newest-first post list.
//! 4. **Listings**: each post-listing page becomes one operation per page.
//! 5. **Tags**: each tag-listing page becomes one set of pages per tag.
//! 6. **Reconcile**: walk the existing output tree. Entries the plan will not
//!    recreate become `Delete`, allow-listed top-level entries become `Keep`,
//!    and directories in between become `Null` placeholders.
//! 7. **Prune**: drop placeholders with nothing beneath them.

use crate::classify::{
    BuildTask, Classification, ClassificationFlags, ClassifyError, Classifier, Pagination,
};
use crate::config::SiteLayout;
use crate::naming::paginated_file_name;
use crate::navigation::{self, NavCandidate};
use crate::paginate;
use crate::plan::{OpId, Operation, OperationType, Plan, SiteData};
use crate::render::{LayoutIndex, RenderError};
use crate::tags;
use crate::tree::{EntryId, EntryTree, TreeError};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

type F = ClassificationFlags;

/// One problem found before planning starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub path: Option<PathBuf>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", self.message, path.display()),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("site validation failed with {} problem(s)", .0.len())]
    Validation(Vec<ValidationError>),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Layouts(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Include drafts and ignore the URL prefix.
    pub test_mode: bool,
}

/// Check every precondition and report all failures together.
pub fn validate(layout: &SiteLayout) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut require_dir = |message: &str, path: &Path| {
        if !path.is_dir() {
            errors.push(ValidationError {
                message: message.to_string(),
                path: Some(path.to_path_buf()),
            });
        }
    };
    require_dir("site directory does not exist", &layout.site_root);
    require_dir("source directory does not exist", &layout.source_root);
    require_dir("theme directory does not exist", &layout.theme_root);
    require_dir("theme layout directory does not exist", &layout.layouts_dir);

    let output = &layout.output_root;
    if output == &layout.site_root {
        errors.push(ValidationError {
            message: "output directory must not be the site directory".into(),
            path: Some(output.clone()),
        });
    }
    for (name, tree) in [("source", &layout.source_root), ("theme", &layout.theme_root)] {
        if output.starts_with(tree) || tree.starts_with(output) {
            errors.push(ValidationError {
                message: format!("output directory overlaps the {name} directory"),
                path: Some(output.clone()),
            });
        }
    }
    if output.exists() && !output.is_dir() {
        errors.push(ValidationError {
            message: "output path exists and is not a directory".into(),
            path: Some(output.clone()),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Build the full plan for one cycle.
pub fn plan(layout: &SiteLayout, options: &PlanOptions) -> Result<Plan, PlanError> {
    validate(layout).map_err(PlanError::Validation)?;
    let layouts = LayoutIndex::load(&layout.layouts_dir)?;
    let classifier = Classifier::new(layout, &layouts, options.test_mode);
    let root = Operation::for_task(OperationType::Root, classifier.site_root_task());

    let mut planner = Planner {
        layout,
        classifier,
        plan: Plan::new(root),
        source_files: HashSet::new(),
        test_mode: options.test_mode,
    };
    planner.run()?;
    Ok(planner.plan)
}

struct Planner<'a> {
    layout: &'a SiteLayout,
    classifier: Classifier<'a>,
    plan: Plan,
    /// Output files claimed by source entries, for theme overrides.
    source_files: HashSet<PathBuf>,
    test_mode: bool,
}

impl Planner<'_> {
    fn run(&mut self) -> Result<(), PlanError> {
        let root = self.plan.root();
        let source = EntryTree::load(&self.layout.source_root)?;
        self.emit(&source, source.root(), None, root)?;
        let theme = EntryTree::load(&self.layout.theme_root)?;
        self.emit(&theme, theme.root(), None, root)?;

        let rendered = self.rendered_tasks();
        let mut content: Vec<BuildTask> = rendered
            .iter()
            .filter(|t| !t.flags.intersects(F::IS_LISTING | F::IS_TAG_LISTING))
            .cloned()
            .collect();
        newest_first(&mut content);
        let posts: Vec<BuildTask> = content
            .iter()
            .filter(|t| t.flags.intersects(F::IS_POST | F::IS_DRAFT))
            .cloned()
            .collect();

        let menu_pages: Vec<&BuildTask> = rendered
            .iter()
            .filter(|t| t.flags.contains(F::CHILD_OF_SOURCE) && !t.flags.contains(F::IS_TAG_LISTING))
            .collect();
        self.plan.site = SiteData {
            navigation: navigation::build_tree(&candidates(&menu_pages, BuildTask::nav_order)),
            sidebar: navigation::build_tree(&candidates(&menu_pages, BuildTask::sidebar_order)),
            tags: Vec::new(),
            data: self.layout.config.site.clone(),
            test_mode: self.test_mode,
            url_prefix: self.classifier.url_prefix().to_string(),
        };

        self.expand_post_listings(&posts);
        let tag_slugs = tags::assign_slugs(&tags::aggregate(&content));
        let tag_urls = self.expand_tag_listings(&content, &tag_slugs);
        self.plan.site.tags = tags::tag_data(&content, &tag_slugs, &tag_urls);

        self.reconcile_output()?;
        let pruned = self.plan.prune_placeholders();

        info!(
            create = self.plan.count(OperationType::CreateOverwrite),
            skip = self.plan.count(OperationType::Skip),
            keep = self.plan.count(OperationType::Keep),
            delete = self.plan.count(OperationType::Delete),
            invalid = self.plan.count(OperationType::Invalid),
            posts = posts.len(),
            pruned,
            "plan ready"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------------

    fn emit(
        &mut self,
        tree: &EntryTree,
        id: EntryId,
        parent_flags: Option<ClassificationFlags>,
        parent_op: OpId,
    ) -> Result<(), PlanError> {
        let entry = tree.get(id);
        let classification = self.classifier.classify(entry, parent_flags)?;
        let flags = classification.task().flags;
        let op = match classification {
            Classification::Invalid { task, reason } => {
                warn!(path = %entry.path.display(), %reason, "invalid entry");
                Operation::for_task(OperationType::Invalid, task).with_note(reason.to_string())
            }
            Classification::Valid(task) if task.flags.is_skip() => {
                Operation::for_task(OperationType::Skip, task)
            }
            Classification::Valid(task) => self.admit(task),
        };
        debug!(path = %entry.path.display(), ?flags, kind = ?op.kind, "classified");

        let op_id = self.plan.add_child(parent_op, op);
        for &child in tree.children(id) {
            self.emit(tree, child, Some(flags), op_id)?;
        }
        Ok(())
    }

    fn admit(&mut self, task: BuildTask) -> Operation {
        if !task.is_dir
            && let Some(target) = &task.target
        {
            if task.flags.contains(F::CHILD_OF_THEME) && self.source_files.contains(target) {
                debug!(target = %target.display(), "theme file overridden by source");
                return Operation::for_task(OperationType::Skip, task).with_note("overridden by source");
            }
            if task.flags.contains(F::CHILD_OF_SOURCE) {
                self.source_files.insert(target.clone());
            }
        }
        Operation::for_task(OperationType::CreateOverwrite, task)
    }

    fn rendered_tasks(&self) -> Vec<BuildTask> {
        self.plan
            .operations()
            .filter(|op| op.kind == OperationType::CreateOverwrite)
            .filter_map(|op| op.task.as_ref())
            .filter(|t| t.is_rendered())
            .cloned()
            .collect()
    }

    fn ops_flagged(&self, flag: ClassificationFlags) -> Vec<OpId> {
        self.plan
            .depth_first()
            .into_iter()
            .filter(|id| {
                let op = self.plan.get(*id);
                op.kind == OperationType::CreateOverwrite
                    && op.task.as_ref().is_some_and(|t| t.flags.contains(flag))
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------------

    fn expand_post_listings(&mut self, posts: &[BuildTask]) {
        for id in self.ops_flagged(F::IS_LISTING) {
            let Some(template) = self.plan.get(id).task.clone() else {
                continue;
            };
            let segments = template.output_segments.clone();
            let file = template.file_name().unwrap_or("index.html").to_string();
            let pages = self.listing_pages(&template, posts, None, |n| {
                let mut s = segments.clone();
                if let Some(last) = s.last_mut() {
                    *last = paginated_file_name(&file, n);
                }
                s
            });
            debug!(listing = %template.url, pages = pages.len(), "expanded post listing");
            self.splice(id, pages, "no posts to list");
        }
    }

    /// Returns the first page URL of every listed tag.
    ///
    /// Tags missing from `slugs` get an `Invalid` operation next to the
    /// listing instead of pages.
    fn expand_tag_listings(
        &mut self,
        content: &[BuildTask],
        slugs: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut urls = BTreeMap::new();
        let all_tags = tags::aggregate(content);

        for id in self.ops_flagged(F::IS_TAG_LISTING) {
            let Some(template) = self.plan.get(id).task.clone() else {
                continue;
            };
            let mut dirs = template.output_segments.clone();
            let file = dirs.pop().unwrap_or_else(|| "index.html".to_string());

            let mut pages = Vec::new();
            let mut unlisted = Vec::new();
            for tag in &all_tags {
                let Some(slug) = slugs.get(tag) else {
                    warn!(%tag, listing = %template.url, "tag has no usable output name");
                    unlisted.push(tag.clone());
                    continue;
                };
                let items: Vec<BuildTask> = tags::tagged(tag, content).into_iter().cloned().collect();
                let tag_pages = self.listing_pages(&template, &items, Some(tag), |n| {
                    let mut s = dirs.clone();
                    s.push(slug.clone());
                    s.push(paginated_file_name(&file, n));
                    s
                });
                if let Some(first) = tag_pages.first() {
                    urls.entry(tag.clone()).or_insert_with(|| first.url.clone());
                }
                pages.extend(tag_pages);
            }
            debug!(listing = %template.url, tags = all_tags.len(), pages = pages.len(), "expanded tag listing");
            let mut after = self.splice(id, pages, "no tags to list");
            if let Some(parent) = self.plan.parent_of(after) {
                for tag in unlisted {
                    let op = Operation::for_task(OperationType::Invalid, unplaced(&template))
                        .with_note(format!("tag '{tag}' has no usable output name"));
                    after = self.plan.insert_after(parent, after, op);
                }
            }
        }
        urls
    }

    fn listing_pages(
        &self,
        template: &BuildTask,
        items: &[BuildTask],
        tag: Option<&str>,
        segments_for: impl Fn(usize) -> Vec<String>,
    ) -> Vec<BuildTask> {
        let mut pages: Vec<BuildTask> = paginate::paginate(items, self.layout.config.page_size, tag)
            .into_iter()
            .map(|page| {
                let mut task = self
                    .classifier
                    .relocate(template, segments_for(page.paginator.page_number));
                task.pagination = Some(Pagination {
                    paginator: page.paginator,
                    items: page.items,
                });
                task
            })
            .collect();

        let urls: Vec<String> = pages.iter().map(|p| p.url.clone()).collect();
        for page in &mut pages {
            if let Some(pagination) = &mut page.pagination {
                pagination.paginator.link(&urls);
            }
        }
        pages
    }

    /// Replace the listing at `id` with its pages, in order, as siblings.
    /// Returns the last operation of the run.
    fn splice(&mut self, id: OpId, pages: Vec<BuildTask>, empty_note: &str) -> OpId {
        let parent = self.plan.parent_of(id);
        let mut pages = pages.into_iter();
        let Some(first) = pages.next() else {
            let op = self.plan.get_mut(id);
            op.kind = OperationType::Skip;
            op.note = Some(empty_note.to_string());
            return id;
        };
        self.plan
            .replace(id, Operation::for_task(OperationType::CreateOverwrite, first));
        let Some(parent) = parent else {
            return id;
        };
        let mut after = id;
        for page in pages {
            after = self
                .plan
                .insert_after(parent, after, Operation::for_task(OperationType::CreateOverwrite, page));
        }
        after
    }

    // ------------------------------------------------------------------------
    // Output reconciliation
    // ------------------------------------------------------------------------

    fn reconcile_output(&mut self) -> Result<(), PlanError> {
        let output_root = self.layout.output_root.clone();
        if !output_root.is_dir() {
            return Ok(());
        }
        let tree = EntryTree::load(&output_root)?;
        let planned = self.plan.planned_targets();
        let mut wanted_dirs: HashSet<PathBuf> = HashSet::new();
        for target in &planned {
            for ancestor in target.ancestors().skip(1) {
                if !ancestor.starts_with(&output_root) || !wanted_dirs.insert(ancestor.to_path_buf()) {
                    break;
                }
            }
        }

        let branch = self.plan.add_child(
            self.plan.root(),
            Operation::on_output(OperationType::Null, output_root, true),
        );
        for &child in tree.children(tree.root()) {
            self.reconcile(&tree, child, branch, &planned, &wanted_dirs);
        }
        Ok(())
    }

    fn reconcile(
        &mut self,
        tree: &EntryTree,
        id: EntryId,
        parent_op: OpId,
        planned: &HashSet<PathBuf>,
        wanted_dirs: &HashSet<PathBuf>,
    ) {
        let entry = tree.get(id);
        if self.classifier.classify_output(entry).is_keep() {
            self.plan.add_child(
                parent_op,
                Operation::on_output(OperationType::Keep, entry.path.clone(), entry.is_dir),
            );
            return;
        }

        let still_wanted = planned.contains(&entry.path);
        if !entry.is_dir {
            if !still_wanted {
                debug!(path = %entry.path.display(), "orphaned output file");
                self.plan.add_child(
                    parent_op,
                    Operation::on_output(OperationType::Delete, entry.path.clone(), false),
                );
            }
            return;
        }

        if !still_wanted && !wanted_dirs.contains(&entry.path) {
            debug!(path = %entry.path.display(), "orphaned output directory");
            self.plan.add_child(
                parent_op,
                Operation::on_output(OperationType::Delete, entry.path.clone(), true),
            );
            return;
        }

        let op = self.plan.add_child(
            parent_op,
            Operation::on_output(OperationType::Null, entry.path.clone(), true),
        );
        for &child in tree.children(id) {
            self.reconcile(tree, child, op, planned, wanted_dirs);
        }
    }
}

/// `task` with no output of its own.
fn unplaced(task: &BuildTask) -> BuildTask {
    BuildTask {
        target: None,
        url: String::new(),
        id: String::new(),
        output_segments: Vec::new(),
        pagination: None,
        ..task.clone()
    }
}

fn newest_first(tasks: &mut [BuildTask]) {
    tasks.sort_by(|a, b| b.date.cmp(&a.date));
}

fn candidates(pages: &[&BuildTask], order: fn(&BuildTask) -> Option<&str>) -> Vec<NavCandidate> {
    pages
        .iter()
        .filter_map(|&task| {
            order(task).map(|o| NavCandidate {
                order: o.to_string(),
                id: task.id.clone(),
                title: task.title.clone(),
                url: task.url.clone(),
            })
        })
        .collect()
}
