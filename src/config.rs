//! Site configuration module.
//!
//! Handles loading, validating, and merging the site configuration file. The
//! file lives at the project root and is sparse: stock defaults are overridden
//! by whatever keys the user sets.
//!
//! ## Config File Location
//!
//! ```text
//! my-site/
//! ├── site.json              # Site config (optional; site.toml is also accepted)
//! ├── source/                # Content
//! │   ├── _posts/
//! │   └── about.md
//! ├── themes/
//! │   └── default/           # Active theme
//! │       └── _layouts/
//! └── _site/                 # Generated output
//! ```
//!
//! When both `site.json` and `site.toml` exist, `site.json` wins.
//!
//! ## Configuration Options
//!
//! ```json
//! {
//!   "source_dir": "source",
//!   "themes_dir": "themes",
//!   "theme": "default",
//!   "output_dir": "_site",
//!   "posts_dir": "_posts",
//!   "drafts_dir": "_drafts",
//!   "layouts_dir": "_layouts",
//!   "tags_dir": "tag",
//!   "page_size": 10,
//!   "keep": [".git"],
//!   "url_prefix": "",
//!   "default_layout": "default",
//!   "port": 8080,
//!   "settle_ms": 250,
//!   "site": { "title": "My Site" }
//! }
//! ```
//!
//! Unknown keys are rejected to catch typos early. The free-form `site` table is
//! handed to templates untouched.
//!
//! ## Well-Known Paths
//!
//! [`SiteLayout`] resolves the directory names above against a project root
//! once, so every classifier rule compares against the same absolute paths.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Primary config file name.
pub const CONFIG_JSON: &str = "site.json";
/// Alternative config file name, consulted when no `site.json` exists.
pub const CONFIG_TOML: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.json`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Source tree, relative to the project root.
    pub source_dir: String,
    /// Directory holding all themes, relative to the project root.
    pub themes_dir: String,
    /// Active theme name. The theme root is `themes_dir/theme`.
    pub theme: String,
    /// Output tree, relative to the project root.
    pub output_dir: String,
    /// Posts directory name, directly under the source root.
    pub posts_dir: String,
    /// Drafts directory name, directly under the source root.
    pub drafts_dir: String,
    /// Layout directory name inside the theme root.
    pub layouts_dir: String,
    /// Tag-listing directory name, directly under the source or theme root.
    pub tags_dir: String,
    /// Listing items per page.
    pub page_size: usize,
    /// Direct children of the output root that survive every rebuild.
    pub keep: Vec<String>,
    /// Path prefix for generated URLs (e.g. `/blog`). Ignored in test mode.
    pub url_prefix: String,
    /// Layout used when front matter does not name one.
    pub default_layout: String,
    /// Port for the `serve` command.
    pub port: u16,
    /// Settle delay before a queued rebuild runs, in milliseconds.
    pub settle_ms: u64,
    /// Free-form data exposed to templates as `site.data`.
    pub site: Map<String, Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source_dir: "source".to_string(),
            themes_dir: "themes".to_string(),
            theme: "default".to_string(),
            output_dir: "_site".to_string(),
            posts_dir: "_posts".to_string(),
            drafts_dir: "_drafts".to_string(),
            layouts_dir: "_layouts".to_string(),
            tags_dir: "tag".to_string(),
            page_size: 10,
            keep: vec![".git".to_string()],
            url_prefix: String::new(),
            default_layout: "default".to_string(),
            port: 8080,
            settle_ms: 250,
            site: Map::new(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Validation("page_size must be at least 1".into()));
        }
        let names = [
            ("source_dir", &self.source_dir),
            ("themes_dir", &self.themes_dir),
            ("theme", &self.theme),
            ("output_dir", &self.output_dir),
            ("posts_dir", &self.posts_dir),
            ("drafts_dir", &self.drafts_dir),
            ("layouts_dir", &self.layouts_dir),
            ("tags_dir", &self.tags_dir),
            ("default_layout", &self.default_layout),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        // Directory names inside a tree must be a single path segment so that
        // path equality against them stays meaningful.
        for (key, value) in [
            ("posts_dir", &self.posts_dir),
            ("drafts_dir", &self.drafts_dir),
            ("layouts_dir", &self.layouts_dir),
            ("tags_dir", &self.tags_dir),
        ] {
            if value.contains('/') || value.contains('\\') {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a single directory name, got {value:?}"
                )));
            }
        }
        if !self.url_prefix.is_empty()
            && (!self.url_prefix.starts_with('/') || self.url_prefix.ends_with('/'))
        {
            return Err(ConfigError::Validation(
                "url_prefix must start with '/' and must not end with '/'".into(),
            ));
        }
        Ok(())
    }

    /// Effective URL prefix: test mode serves from the root.
    pub fn effective_url_prefix(&self, test_mode: bool) -> &str {
        if test_mode { "" } else { &self.url_prefix }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a JSON object.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<Value, ConfigError> {
    Ok(serde_json::to_value(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Objects are merged key-by-key (overlay keys override base keys).
/// - Non-object values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_json(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_json(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load the config file from a project root as a raw JSON value.
///
/// Returns `Ok(None)` if neither `site.json` nor `site.toml` exists.
/// Returns `Err` if the file exists but cannot be parsed.
pub fn load_raw_config(root: &Path) -> Result<Option<Value>, ConfigError> {
    let json_path = root.join(CONFIG_JSON);
    if json_path.is_file() {
        let content = fs::read_to_string(&json_path)?;
        return Ok(Some(serde_json::from_str(&content)?));
    }
    let toml_path = root.join(CONFIG_TOML);
    if toml_path.is_file() {
        let content = fs::read_to_string(&toml_path)?;
        let value: Value = toml::from_str(&content)?;
        return Ok(Some(value));
    }
    Ok(None)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(base: Value, overlay: Option<Value>) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_json(base, ov),
        None => base,
    };
    let config: SiteConfig = serde_json::from_value(merged)?;
    config.validate()?;
    Ok(config)
}

/// Load config from the project root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

// =============================================================================
// Well-known paths
// =============================================================================

/// Absolute well-known paths for one site, derived from a [`SiteConfig`].
#[derive(Debug, Clone)]
pub struct SiteLayout {
    pub site_root: PathBuf,
    pub source_root: PathBuf,
    pub theme_root: PathBuf,
    pub output_root: PathBuf,
    pub posts_dir: PathBuf,
    pub drafts_dir: PathBuf,
    pub layouts_dir: PathBuf,
    pub source_tags_dir: PathBuf,
    pub theme_tags_dir: PathBuf,
    pub config: SiteConfig,
}

impl SiteLayout {
    pub fn new(site_root: &Path, config: SiteConfig) -> Self {
        let site_root =
            std::path::absolute(site_root).unwrap_or_else(|_| site_root.to_path_buf());
        let source_root = site_root.join(&config.source_dir);
        let theme_root = site_root.join(&config.themes_dir).join(&config.theme);
        let output_root = site_root.join(&config.output_dir);
        Self {
            posts_dir: source_root.join(&config.posts_dir),
            drafts_dir: source_root.join(&config.drafts_dir),
            layouts_dir: theme_root.join(&config.layouts_dir),
            source_tags_dir: source_root.join(&config.tags_dir),
            theme_tags_dir: theme_root.join(&config.tags_dir),
            site_root,
            source_root,
            theme_root,
            output_root,
            config,
        }
    }

    /// Load the config file under `site_root` and resolve its paths.
    pub fn load(site_root: &Path) -> Result<Self, ConfigError> {
        let config = load_config(site_root)?;
        Ok(Self::new(site_root, config))
    }

    /// Whether `name` is on the always-keep allow-list.
    pub fn is_keep_name(&self, name: &str) -> bool {
        self.config.keep.iter().any(|k| k == name)
    }

    /// `path` relative to the site root, for display.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.site_root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}
