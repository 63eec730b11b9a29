//! Markdown conversion and layout rendering.
//!
//! Layouts are Handlebars templates in the theme's layout directory. Each
//! file's path relative to that directory, without extension, is its id:
//!
//! ```text
//! themes/default/_layouts/
//! ├── default.hbs          → "default"
//! ├── post.hbs             → "post"
//! └── partials/head.hbs    → "partials/head"   ({{> partials/head}})
//! ```
//!
//! Every layout is also available as a partial.
//!
//! ## View Model
//!
//! A rendered page sees:
//!
//! | Key         | Content                                              |
//! |-------------|------------------------------------------------------|
//! | `page`      | Front matter plus `title`, `url`, `id`, `date`, ...  |
//! | `content`   | The page body converted to HTML (use `{{{content}}}`)|
//! | `paginator` | Listing pages only                                   |
//! | `posts`     | Listing pages only: this page's items, with content  |
//! | `site`      | Navigation, sidebar, tags, and config `site` data    |

use crate::classify::{BuildTask, TEMPLATE_EXTENSIONS};
use crate::frontmatter::{self, FrontMatterError};
use crate::plan::SiteData;
use handlebars::Handlebars;
use pulldown_cmark::{Options, Parser, html};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to scan layouts in {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("invalid front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },
    #[error("failed to compile layout '{name}': {source}")]
    Template {
        name: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },
    #[error("failed to render layout '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
    #[error("layout '{0}' does not exist")]
    MissingTemplate(String),
    #[error("task has no source file")]
    NoSource,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Seams
// ============================================================================

/// Turns a template id and a view model into output text.
pub trait Renderer {
    fn has_template(&self, template_id: &str) -> bool;
    fn render(&self, template_id: &str, view: &Value) -> Result<String, RenderError>;
}

/// Markdown to HTML.
pub trait MarkdownConverter {
    fn to_html(&self, markdown: &str) -> String;
}

/// CommonMark with tables, footnotes, strikethrough, and task lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulldownConverter;

impl MarkdownConverter for PulldownConverter {
    fn to_html(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, options));
        out
    }
}

// ============================================================================
// Layouts
// ============================================================================

struct LayoutSource {
    id: String,
    path: PathBuf,
    text: String,
}

fn read_layouts(dir: &Path) -> Result<Vec<LayoutSource>, RenderError> {
    let mut layouts = Vec::new();
    if !dir.is_dir() {
        return Ok(layouts);
    }
    for item in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let item = item.map_err(|source| RenderError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = item.path();
        let is_template = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e.as_str()));
        if !item.file_type().is_file() || !is_template {
            continue;
        }
        let Ok(relative) = path.with_extension("").strip_prefix(dir).map(Path::to_path_buf) else {
            continue;
        };
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        let text = fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        layouts.push(LayoutSource {
            id,
            path: path.to_path_buf(),
            text,
        });
    }
    Ok(layouts)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutInfo {
    pub path: PathBuf,
    /// The layout mentions `paginator`, so pages using it list posts.
    pub uses_paginator: bool,
}

/// Which layouts exist, without compiling them.
#[derive(Debug, Clone, Default)]
pub struct LayoutIndex {
    layouts: BTreeMap<String, LayoutInfo>,
}

impl LayoutIndex {
    pub fn load(dir: &Path) -> Result<Self, RenderError> {
        let layouts = read_layouts(dir)?
            .into_iter()
            .map(|l| {
                let info = LayoutInfo {
                    path: l.path,
                    uses_paginator: l.text.contains("paginator"),
                };
                (l.id, info)
            })
            .collect();
        Ok(Self { layouts })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.layouts.contains_key(id)
    }

    pub fn uses_paginator(&self, id: &str) -> bool {
        self.layouts.get(id).is_some_and(|l| l.uses_paginator)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }
}

/// Handlebars layouts loaded from a directory.
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for HandlebarsRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlebarsRenderer")
            .field("templates", &self.registry.get_templates().len())
            .finish()
    }
}

impl HandlebarsRenderer {
    pub fn from_dir(dir: &Path) -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::html_escape);
        for layout in read_layouts(dir)? {
            registry
                .register_template_string(&layout.id, &layout.text)
                .map_err(|e| RenderError::Template {
                    name: layout.id.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(Self { registry })
    }
}

impl Renderer for HandlebarsRenderer {
    fn has_template(&self, template_id: &str) -> bool {
        self.registry.has_template(template_id)
    }

    fn render(&self, template_id: &str, view: &Value) -> Result<String, RenderError> {
        if !self.has_template(template_id) {
            return Err(RenderError::MissingTemplate(template_id.to_string()));
        }
        self.registry
            .render(template_id, view)
            .map_err(|e| RenderError::Render {
                name: template_id.to_string(),
                source: Box::new(e),
            })
    }
}

// ============================================================================
// View model
// ============================================================================

/// Converted page bodies for one build cycle, keyed by source path.
///
/// A post appearing on several listing pages is converted once.
pub struct RenderCache<'c> {
    converter: &'c dyn MarkdownConverter,
    html: HashMap<PathBuf, String>,
}

impl<'c> RenderCache<'c> {
    pub fn new(converter: &'c dyn MarkdownConverter) -> Self {
        Self {
            converter,
            html: HashMap::new(),
        }
    }

    pub fn content_html(&mut self, task: &BuildTask) -> Result<String, RenderError> {
        let source = task.source.as_ref().ok_or(RenderError::NoSource)?;
        if let Some(html) = self.html.get(source) {
            return Ok(html.clone());
        }
        let raw = fs::read_to_string(source).map_err(|e| RenderError::Io {
            path: source.clone(),
            source: e,
        })?;
        let doc = frontmatter::parse_document(&raw).map_err(|e| RenderError::FrontMatter {
            path: source.clone(),
            source: e,
        })?;
        let html = self.converter.to_html(doc.body);
        self.html.insert(source.clone(), html.clone());
        Ok(html)
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// Template-facing fields of one task.
pub fn page_value(task: &BuildTask, site: &SiteData, default_layout: &str) -> Result<Value, RenderError> {
    let mut page = match &task.front_matter {
        Some(fm) => match serde_json::to_value(fm)? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    };
    let tags: Vec<Value> = task
        .tags()
        .iter()
        .map(|name| match site.tags.iter().find(|t| &t.name == name) {
            Some(tag) => json!({ "name": tag.name, "slug": tag.slug, "url": tag.url }),
            None => json!({ "name": name }),
        })
        .collect();

    page.insert("title".into(), json!(task.title));
    page.insert("url".into(), json!(task.url));
    page.insert("id".into(), json!(task.id));
    page.insert("layout".into(), json!(task.layout_id(default_layout)));
    page.insert(
        "date".into(),
        json!(task.date.map(|d| d.format("%Y-%m-%d").to_string())),
    );
    page.insert("is_post".into(), json!(task.flags.is_post()));
    page.insert("is_draft".into(), json!(task.flags.is_draft()));
    page.insert("tags".into(), Value::Array(tags));
    Ok(Value::Object(page))
}

/// Everything a layout sees when rendering `task`.
pub fn view_model(
    task: &BuildTask,
    site: &SiteData,
    default_layout: &str,
    cache: &mut RenderCache<'_>,
) -> Result<Value, RenderError> {
    let mut view = Map::new();
    view.insert("page".into(), page_value(task, site, default_layout)?);
    view.insert("content".into(), json!(cache.content_html(task)?));
    view.insert("site".into(), serde_json::to_value(site)?);

    if let Some(pagination) = &task.pagination {
        view.insert("paginator".into(), serde_json::to_value(&pagination.paginator)?);
        let mut posts = Vec::with_capacity(pagination.items.len());
        for item in &pagination.items {
            let mut summary = page_value(item, site, default_layout)?;
            if let Value::Object(map) = &mut summary {
                map.insert("content".into(), json!(cache.content_html(item)?));
            }
            posts.push(summary);
        }
        view.insert("posts".into(), Value::Array(posts));
    }

    Ok(Value::Object(view))
}
