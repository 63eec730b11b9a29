//! Filesystem snapshots.
//!
//! An [`EntryTree`] is an immutable picture of one directory tree (source,
//! theme, or output) taken at the start of a planning cycle. Entries live in
//! an arena and refer to each other by [`EntryId`]: children are listed in
//! file-name order, and each entry knows its parent, so classification can
//! consult ancestry without holding references into the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Index of an entry inside its [`EntryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

/// One file or directory.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// Final path segment.
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub parent: Option<EntryId>,
    pub children: Vec<EntryId>,
}

impl SourceEntry {
    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    /// File name without its final extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Debug, Clone)]
pub struct EntryTree {
    entries: Vec<SourceEntry>,
}

impl EntryTree {
    /// Snapshot the tree rooted at `root`.
    ///
    /// Symlinks are followed. The root must exist and be a directory.
    pub fn load(root: &Path) -> Result<Self, TreeError> {
        if !root.is_dir() {
            return Err(TreeError::NotADirectory(root.to_path_buf()));
        }

        let mut entries: Vec<SourceEntry> = Vec::new();
        let mut dirs: HashMap<PathBuf, EntryId> = HashMap::new();

        for item in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let item = item.map_err(|source| TreeError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            let path = item.path().to_path_buf();
            let is_dir = item.file_type().is_dir();
            let parent = if item.depth() == 0 {
                None
            } else {
                path.parent().and_then(|p| dirs.get(p).copied())
            };

            let id = EntryId(entries.len());
            entries.push(SourceEntry {
                name: item.file_name().to_string_lossy().to_string(),
                path: path.clone(),
                is_dir,
                parent,
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                entries[parent.0].children.push(id);
            }
            if is_dir {
                dirs.insert(path, id);
            }
        }

        Ok(Self { entries })
    }

    pub fn root(&self) -> EntryId {
        EntryId(0)
    }

    pub fn get(&self, id: EntryId) -> &SourceEntry {
        &self.entries[id.0]
    }

    pub fn children(&self, id: EntryId) -> &[EntryId] {
        &self.entries[id.0].children
    }

    /// Ancestors of `id`, nearest first. Excludes `id` itself.
    pub fn ancestors(&self, id: EntryId) -> impl Iterator<Item = &SourceEntry> + '_ {
        std::iter::successors(self.get(id).parent, |p| self.get(*p).parent).map(|p| self.get(p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
