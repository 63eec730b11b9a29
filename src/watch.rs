//! Filesystem watching for `serve`.
//!
//! Watches the whole site root recursively and turns every relevant change
//! into a non-blocking offer on the rebuild queue. Paths inside the output
//! directory are ignored so the build's own writes do not trigger rebuilds,
//! and so are dot-prefixed paths (editor swap files, `.git`), which the
//! classifier skips anyway.

use crate::config::SiteLayout;
use crate::rebuild::{ChangeEvent, ChangeKind, Offer, RequestSender};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, trace, warn};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Keeps the underlying watcher alive. Dropping it stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Paths under any of these roots never trigger a rebuild.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    site_roots: Vec<PathBuf>,
    ignored: Vec<PathBuf>,
}

impl ChangeFilter {
    pub fn new(layout: &SiteLayout) -> Self {
        Self {
            site_roots: with_canonical(&layout.site_root),
            ignored: with_canonical(&layout.output_root),
        }
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        if self.ignored.iter().any(|root| path.starts_with(root)) {
            return false;
        }
        let relative = self
            .site_roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        !relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
    }
}

/// `path` plus its canonical form when that differs (e.g. symlinked temp dirs).
fn with_canonical(path: &Path) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    if let Ok(canonical) = path.canonicalize()
        && canonical != path
    {
        paths.push(canonical);
    }
    paths
}

/// Map a notify event kind; `None` for events that change nothing.
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Any | EventKind::Other => Some(ChangeKind::Other),
    }
}

/// Forward one notify event into the queue. Returns the number of offers made.
pub fn forward(event: &Event, filter: &ChangeFilter, sender: &RequestSender) -> usize {
    let Some(kind) = change_kind(&event.kind) else {
        return 0;
    };
    let mut offered = 0;
    for path in event.paths.iter().filter(|p| filter.is_relevant(p)) {
        let outcome = sender.offer(ChangeEvent {
            path: path.clone(),
            kind,
        });
        trace!(path = %path.display(), ?kind, ?outcome, "change offered");
        offered += 1;
        if outcome == Offer::Closed {
            break;
        }
    }
    offered
}

/// Start watching the site root.
pub fn spawn_watcher(layout: &SiteLayout, sender: RequestSender) -> Result<WatcherHandle, WatchError> {
    let filter = ChangeFilter::new(layout);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                forward(&event, &filter, &sender);
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;
    watcher.watch(&layout.site_root, RecursiveMode::Recursive)?;
    info!(root = %layout.site_root.display(), "watching for changes");
    Ok(WatcherHandle { _inner: watcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::rebuild::request_queue;
    use notify::event::{CreateKind, DataChange, RenameMode};

    fn layout() -> SiteLayout {
        SiteLayout::new(Path::new("/site"), SiteConfig::default())
    }

    #[test]
    fn output_paths_ignored() {
        let filter = ChangeFilter::new(&layout());
        assert!(!filter.is_relevant(Path::new("/site/_site/index.html")));
        assert!(filter.is_relevant(Path::new("/site/source/index.md")));
        assert!(filter.is_relevant(Path::new("/site/site.json")));
    }

    #[test]
    fn dot_paths_ignored() {
        let filter = ChangeFilter::new(&layout());
        assert!(!filter.is_relevant(Path::new("/site/source/.about.md.swp")));
        assert!(!filter.is_relevant(Path::new("/site/.git/index")));
    }

    #[test]
    fn kinds_mapped() {
        assert_eq!(change_kind(&EventKind::Create(CreateKind::File)), Some(ChangeKind::Created));
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Modified)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(ChangeKind::Renamed)
        );
        assert_eq!(change_kind(&EventKind::Access(notify::event::AccessKind::Any)), None);
    }

    #[test]
    fn forward_offers_relevant_paths_only() {
        let (tx, _queue) = request_queue();
        let filter = ChangeFilter::new(&layout());
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/_site/a.html"))
            .add_path(PathBuf::from("/site/source/a.md"));
        assert_eq!(forward(&event, &filter, &tx), 1);
    }

    #[test]
    fn forward_ignores_access_events() {
        let (tx, _queue) = request_queue();
        let filter = ChangeFilter::new(&layout());
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/site/source/a.md"));
        assert_eq!(forward(&event, &filter, &tx), 0);
    }
}
