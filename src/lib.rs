//! # Sitewright
//!
//! A static-site build engine. A site is a project directory holding a
//! source tree of markdown pages and assets, a theme with Handlebars layouts,
//! and an output directory the engine owns.
//!
//! # Architecture: Plan, Then Execute
//!
//! Every build is a whole-site cycle with two stages:
//!
//! ```text
//! 1. Plan      source/ + themes/<theme>/ + _site/  →  Plan   (pure, no writes)
//! 2. Execute   Plan                                →  _site/ (wipe-and-rebuild)
//! ```
//!
//! The plan is a tree of operations (create, skip, keep, delete, invalid)
//! mirroring the source, theme, and existing output trees. It is printed
//! before anything is written, so destructive changes can be reviewed. While
//! serving, a watcher feeds a coordinator that re-runs the full cycle after
//! each burst of changes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `site.json` / `site.toml` loading over stock defaults; derived `SiteLayout` paths |
//! | [`tree`] | Filesystem snapshot of one directory tree |
//! | [`naming`] | `YYYY-MM-DD-slug` filenames, paginated filenames, tag slugs |
//! | [`frontmatter`] | YAML front-matter parser |
//! | [`classify`] | Entry classifier: flags, build tasks, output placement |
//! | [`paginate`] | Splits listings into pages with prev/next links |
//! | [`navigation`] | Builds the navigation and sidebar trees from dotted order keys |
//! | [`tags`] | Tag aggregation across content |
//! | [`plan`] | Operation tree arena and placeholder pruning |
//! | [`planner`] | Validation and operation planning |
//! | [`render`] | Layouts, markdown conversion, template view models |
//! | [`execute`] | Plan executor |
//! | [`rebuild`] | Incremental-rebuild coordinator for `serve` |
//! | [`watch`] | Filesystem watcher feeding the coordinator |
//! | [`serve`] | Local HTTP server over the output directory |
//! | [`output`] | CLI output formatting for plans and build summaries |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Wipe-And-Rebuild Output
//!
//! The executor clears the output directory (sparing kept entries such as
//! `.git`) and writes everything again. There is no partial re-planning: the
//! plan is always derived from the full trees, so the output can never drift
//! from the source.
//!
//! ## Stable Paths, Not Stable Order
//!
//! Output files are identified by their path under the output root. Page ids
//! derive from that path, which makes them stable across rebuilds and
//! independent of discovery order.

pub mod classify;
pub mod config;
pub mod execute;
pub mod frontmatter;
pub mod logging;
pub mod naming;
pub mod navigation;
pub mod output;
pub mod paginate;
pub mod plan;
pub mod planner;
pub mod rebuild;
pub mod render;
pub mod serve;
pub mod tags;
pub mod tree;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
