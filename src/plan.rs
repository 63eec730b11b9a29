//! The build plan: a tree of operations.
//!
//! Operations live in an arena owned by [`Plan`] and are addressed by
//! [`OpId`]. Each operation lists its children; there are no parent links,
//! so the plan is built top-down and walked depth-first.
//!
//! ```text
//! Root (site root)
//! ├── CreateOverwrite  source/            → _site/
//! │   ├── CreateOverwrite  about.md       → _site/about.html
//! │   └── Invalid          _posts/oops.md
//! ├── CreateOverwrite  themes/default/    → _site/
//! └── Null             _site/             (reconciliation branch)
//!     ├── Keep             _site/.git
//!     └── Delete           _site/old.html
//! ```
//!
//! `Null` placeholders exist only while the output tree is being
//! reconciled. [`Plan::prune_placeholders`] removes every `Null` whose
//! subtree holds no `Keep` or `Delete`.

use crate::classify::BuildTask;
use crate::navigation::{NavNode, SidebarNode};
use crate::tags::TagData;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Root,
    CreateOverwrite,
    Skip,
    Keep,
    Delete,
    Invalid,
    Null,
}

impl OperationType {
    pub fn label(self) -> &'static str {
        match self {
            OperationType::Root => "root",
            OperationType::CreateOverwrite => "create",
            OperationType::Skip => "skip",
            OperationType::Keep => "keep",
            OperationType::Delete => "delete",
            OperationType::Invalid => "invalid",
            OperationType::Null => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Pending,
    Complete,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationType,
    pub status: Status,
    pub task: Option<BuildTask>,
    /// Where the operation acts. For task operations this mirrors the task's
    /// output path; for reconciliation operations it is the existing entry.
    pub target: Option<PathBuf>,
    pub is_dir: bool,
    /// Why an entry is skipped or invalid.
    pub note: Option<String>,
}

impl Operation {
    pub fn for_task(kind: OperationType, task: BuildTask) -> Self {
        Self {
            kind,
            status: Status::Pending,
            target: task.target.clone(),
            is_dir: task.is_dir,
            task: Some(task),
            note: None,
        }
    }

    /// Operation on an existing output entry, with no task.
    pub fn on_output(kind: OperationType, target: PathBuf, is_dir: bool) -> Self {
        Self {
            kind,
            status: Status::Pending,
            task: None,
            target: Some(target),
            is_dir,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.task.as_ref().and_then(|t| t.source.as_deref())
    }

    /// Operations that change the output tree when executed.
    pub fn has_effect(&self) -> bool {
        matches!(self.kind, OperationType::CreateOverwrite | OperationType::Delete)
    }
}

/// Site-wide aggregates shared by every rendered page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteData {
    pub navigation: Vec<NavNode>,
    pub sidebar: Vec<SidebarNode>,
    pub tags: Vec<TagData>,
    /// The config file's free-form `site` table.
    pub data: Map<String, Value>,
    pub test_mode: bool,
    pub url_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(usize);

#[derive(Debug, Clone)]
pub struct Plan {
    ops: Vec<Operation>,
    children: Vec<Vec<OpId>>,
    pub site: SiteData,
}

impl Plan {
    pub fn new(root: Operation) -> Self {
        Self {
            ops: vec![root],
            children: vec![Vec::new()],
            site: SiteData::default(),
        }
    }

    pub fn root(&self) -> OpId {
        OpId(0)
    }

    pub fn get(&self, id: OpId) -> &Operation {
        &self.ops[id.0]
    }

    pub fn get_mut(&mut self, id: OpId) -> &mut Operation {
        &mut self.ops[id.0]
    }

    pub fn children(&self, id: OpId) -> &[OpId] {
        &self.children[id.0]
    }

    fn alloc(&mut self, op: Operation) -> OpId {
        let id = OpId(self.ops.len());
        self.ops.push(op);
        self.children.push(Vec::new());
        id
    }

    pub fn add_child(&mut self, parent: OpId, op: Operation) -> OpId {
        let id = self.alloc(op);
        self.children[parent.0].push(id);
        id
    }

    /// Insert `op` as a sibling immediately after `after` under `parent`.
    pub fn insert_after(&mut self, parent: OpId, after: OpId, op: Operation) -> OpId {
        let id = self.alloc(op);
        let siblings = &mut self.children[parent.0];
        let at = siblings
            .iter()
            .position(|c| *c == after)
            .map(|p| p + 1)
            .unwrap_or(siblings.len());
        siblings.insert(at, id);
        id
    }

    /// Swap the operation stored at `id`, keeping its children.
    pub fn replace(&mut self, id: OpId, op: Operation) -> Operation {
        std::mem::replace(&mut self.ops[id.0], op)
    }

    /// Parent of `id` among reachable operations.
    pub fn parent_of(&self, id: OpId) -> Option<OpId> {
        self.depth_first()
            .into_iter()
            .find(|p| self.children[p.0].contains(&id))
    }

    /// Reachable operations in depth-first pre-order, root first.
    pub fn depth_first(&self) -> Vec<OpId> {
        let mut order = Vec::with_capacity(self.ops.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children[id.0].iter().rev().copied());
        }
        order
    }

    /// Reachable operations with their depth below the root.
    pub fn depth_first_with_depth(&self) -> Vec<(OpId, usize)> {
        let mut order = Vec::with_capacity(self.ops.len());
        let mut stack = vec![(self.root(), 0)];
        while let Some((id, depth)) = stack.pop() {
            order.push((id, depth));
            stack.extend(self.children[id.0].iter().rev().map(|c| (*c, depth + 1)));
        }
        order
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> + '_ {
        self.depth_first().into_iter().map(|id| self.get(id))
    }

    pub fn count(&self, kind: OperationType) -> usize {
        self.operations().filter(|op| op.kind == kind).count()
    }

    /// Output paths produced by `CreateOverwrite` operations.
    pub fn planned_targets(&self) -> HashSet<PathBuf> {
        self.operations()
            .filter(|op| op.kind == OperationType::CreateOverwrite)
            .filter_map(|op| op.target.clone())
            .collect()
    }

    /// A reachable operation of `kind` targeting exactly `path`.
    pub fn find_target(&self, kind: OperationType, path: &Path) -> Option<OpId> {
        self.depth_first()
            .into_iter()
            .find(|id| self.get(*id).kind == kind && self.get(*id).target.as_deref() == Some(path))
    }

    /// Remove `Null` operations whose subtree holds no `Keep` or `Delete`.
    ///
    /// Returns how many were detached.
    pub fn prune_placeholders(&mut self) -> usize {
        let order = self.depth_first();
        let mut needed = vec![false; self.ops.len()];
        // Reverse pre-order visits children before their parents.
        for id in order.iter().rev() {
            let own = matches!(self.ops[id.0].kind, OperationType::Keep | OperationType::Delete);
            needed[id.0] = own || self.children[id.0].iter().any(|c| needed[c.0]);
        }

        let mut pruned = 0;
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let ops = &self.ops;
            let siblings = &mut self.children[id.0];
            let before = siblings.len();
            siblings.retain(|c| !(ops[c.0].kind == OperationType::Null && !needed[c.0]));
            pruned += before - siblings.len();
            stack.extend(siblings.iter().copied());
        }
        pruned
    }
}
