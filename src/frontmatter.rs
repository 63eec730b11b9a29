//! YAML front matter.
//!
//! A markdown file may open with a block delimited by `---` lines:
//!
//! ```text
//! ---
//! title: Hello
//! layout: post
//! tags: [rust, web]
//! nav: 1.2
//! ---
//! Body text...
//! ```
//!
//! The closing delimiter may also be `...`. A file without an opening
//! delimiter has no front matter; the whole text is body.
//!
//! `nav` and `sidebar` are dotted order strings. Unquoted YAML numbers are
//! accepted and converted to their textual form, so `nav: 1.2` and
//! `nav: "1.2"` are equivalent. Quote orders like `"1.10"` that a number would
//! normalize away.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("front matter block is not terminated")]
    Unterminated,
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub layout: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub author_page: Option<String>,
    pub author_image: Option<String>,
    #[serde(deserialize_with = "string_list")]
    pub keywords: Vec<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub teaser_image: Option<String>,
    #[serde(deserialize_with = "order_string")]
    pub nav: Option<String>,
    #[serde(deserialize_with = "order_string")]
    pub sidebar: Option<String>,
    #[serde(deserialize_with = "string_list")]
    pub tags: Vec<String>,
    /// Marks a page as a post listing even when its layout never mentions
    /// the paginator.
    pub paginate: bool,
    /// Any other keys, passed through to templates.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Front matter plus the remaining markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    pub front_matter: Option<FrontMatter>,
    pub body: &'a str,
}

/// Split raw text into its YAML block and body.
///
/// Returns `Ok(None)` when the text does not open with a `---` line.
pub fn split(raw: &str) -> Result<Option<(&str, &str)>, FrontMatterError> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if first.trim_end() != "---" {
        return Ok(None);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Ok(Some((&text[yaml_start..offset], &text[offset + line.len()..])));
        }
        offset += line.len();
    }
    Err(FrontMatterError::Unterminated)
}

/// Parse the front matter of `raw`, or `None` when it has no block.
pub fn parse(raw: &str) -> Result<Option<FrontMatter>, FrontMatterError> {
    Ok(parse_document(raw)?.front_matter)
}

pub fn parse_document(raw: &str) -> Result<Document<'_>, FrontMatterError> {
    match split(raw)? {
        None => Ok(Document {
            front_matter: None,
            body: raw.strip_prefix('\u{feff}').unwrap_or(raw),
        }),
        Some((yaml, body)) => {
            let front_matter = if yaml.trim().is_empty() {
                FrontMatter::default()
            } else {
                serde_yaml::from_str(yaml)?
            };
            Ok(Document {
                front_matter: Some(front_matter),
                body,
            })
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn order_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Scalar>),
    One(Scalar),
}

/// A YAML list, or one comma-separated string.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items.into_iter().map(Scalar::into_text).collect(),
        Some(OneOrMany::One(item)) => item
            .into_text()
            .split(',')
            .map(str::to_string)
            .collect(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_block_returns_none() {
        assert_eq!(parse("# Hello\n\nBody").unwrap(), None);
    }

    #[test]
    fn empty_input_returns_none() {
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn basic_fields() {
        let raw = "---\ntitle: Hello\nlayout: post\nauthor: Ann\n---\nBody\n";
        let fm = parse(raw).unwrap().unwrap();
        assert_eq!(fm.title.as_deref(), Some("Hello"));
        assert_eq!(fm.layout.as_deref(), Some("post"));
        assert_eq!(fm.author.as_deref(), Some("Ann"));
        assert!(!fm.paginate);
    }

    #[test]
    fn body_follows_closing_delimiter() {
        let doc = parse_document("---\ntitle: A\n---\nline one\nline two\n").unwrap();
        assert_eq!(doc.body, "line one\nline two\n");
    }

    #[test]
    fn dots_close_block() {
        let doc = parse_document("---\ntitle: A\n...\nrest").unwrap();
        assert_eq!(doc.front_matter.unwrap().title.as_deref(), Some("A"));
        assert_eq!(doc.body, "rest");
    }

    #[test]
    fn crlf_delimiters() {
        let doc = parse_document("---\r\ntitle: A\r\n---\r\nrest").unwrap();
        assert_eq!(doc.front_matter.unwrap().title.as_deref(), Some("A"));
        assert_eq!(doc.body, "rest");
    }

    #[test]
    fn empty_block_is_default() {
        let fm = parse("---\n---\nbody").unwrap().unwrap();
        assert_eq!(fm, FrontMatter::default());
    }

    #[test]
    fn unterminated_block_is_error() {
        assert!(matches!(
            parse("---\ntitle: A\nno end"),
            Err(FrontMatterError::Unterminated)
        ));
    }

    #[test]
    fn invalid_yaml_is_error() {
        assert!(matches!(
            parse("---\ntitle: [unclosed\n---\n"),
            Err(FrontMatterError::Yaml(_))
        ));
    }

    #[test]
    fn numeric_order_becomes_string() {
        let fm = parse("---\nnav: 1.2\nsidebar: 3\n---\n").unwrap().unwrap();
        assert_eq!(fm.nav.as_deref(), Some("1.2"));
        assert_eq!(fm.sidebar.as_deref(), Some("3"));
    }

    #[test]
    fn quoted_order_preserved() {
        let fm = parse("---\nnav: \"1.10\"\n---\n").unwrap().unwrap();
        assert_eq!(fm.nav.as_deref(), Some("1.10"));
    }

    #[test]
    fn tags_as_list_or_string() {
        let list = parse("---\ntags: [rust, web]\n---\n").unwrap().unwrap();
        assert_eq!(list.tags, vec!["rust", "web"]);

        let single = parse("---\ntags: rust, web\n---\n").unwrap().unwrap();
        assert_eq!(single.tags, vec!["rust", "web"]);
    }

    #[test]
    fn keywords_list() {
        let fm = parse("---\nkeywords:\n  - a\n  - b\n---\n").unwrap().unwrap();
        assert_eq!(fm.keywords, vec!["a", "b"]);
    }

    #[test]
    fn extra_keys_kept() {
        let fm = parse("---\ntitle: A\nrating: 5\n---\n").unwrap().unwrap();
        assert_eq!(fm.extra["rating"], serde_json::json!(5));
    }

    #[test]
    fn paginate_flag() {
        let fm = parse("---\npaginate: true\n---\n").unwrap().unwrap();
        assert!(fm.paginate);
    }

    #[test]
    fn leading_bom_ignored() {
        let fm = parse("\u{feff}---\ntitle: A\n---\n").unwrap().unwrap();
        assert_eq!(fm.title.as_deref(), Some("A"));
    }
}
