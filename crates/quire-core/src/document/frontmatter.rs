//! Hybrid JSON frontmatter + Markdown codec.
//!
//! A document file looks like:
//!
//! ```text
//! ---json
//! { "version": 1, ... }
//! ---
//! # Markdown body
//! ```
//!
//! Parsing never fails: content without a marker, with malformed JSON, or
//! with a non-object JSON block is returned untouched as plain markdown.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::document::{timestamp, JsonMap};
use crate::error::QuireResult;

static FRONTMATTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A---json[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n)?(.*)\z").unwrap()
});

/// Split `content` into its frontmatter mapping and markdown body.
pub fn parse(content: &str) -> (JsonMap, String) {
    let Some(caps) = FRONTMATTER.captures(content) else {
        return (JsonMap::new(), content.to_string());
    };

    match serde_json::from_str::<Value>(&caps[1]) {
        Ok(Value::Object(data)) => (data, caps[2].to_string()),
        _ => (JsonMap::new(), content.to_string()),
    }
}

/// Render a frontmatter mapping and markdown body back into file content.
pub fn serialize(data: &JsonMap, markdown: &str) -> String {
    // A map of JSON values always serializes.
    let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
    format!("---json\n{}\n---\n{}", json, markdown)
}

/// Whether `content` starts with a frontmatter marker.
pub fn has_frontmatter(content: &str) -> bool {
    content.trim_start().starts_with("---json")
}

/// A parsed document: structured data plus free-text markdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub data: JsonMap,
    pub markdown: String,
}

impl Document {
    pub fn new(data: JsonMap, markdown: impl Into<String>) -> Self {
        Self {
            data,
            markdown: markdown.into(),
        }
    }

    /// Parse file content.
    pub fn parse(content: &str) -> Self {
        let (data, markdown) = parse(content);
        Self { data, markdown }
    }

    /// Render to file content.
    pub fn to_content(&self) -> String {
        serialize(&self.data, &self.markdown)
    }

    /// Build a document from a typed value that serializes to a JSON object.
    pub fn from_typed<T: Serialize>(value: &T, markdown: impl Into<String>) -> QuireResult<Self> {
        let data = match serde_json::to_value(value)? {
            Value::Object(map) => map,
            other => {
                let mut map = JsonMap::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Ok(Self::new(data, markdown))
    }

    /// Decode the frontmatter into a typed value.
    pub fn to_typed<T: DeserializeOwned>(&self) -> QuireResult<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }

    /// Replace the frontmatter with a typed value, keeping the markdown.
    pub fn set_typed<T: Serialize>(&mut self, value: &T) -> QuireResult<()> {
        let markdown = std::mem::take(&mut self.markdown);
        *self = Self::from_typed(value, markdown)?;
        Ok(())
    }

    /// Stamp `lastUpdated` with the current UTC time.
    pub fn touch(&mut self) {
        self.data
            .insert("lastUpdated".to_string(), Value::String(timestamp()));
    }

    /// Append a markdown block separated by a blank line.
    pub fn append_markdown(&mut self, block: &str) {
        if !self.markdown.is_empty() && !self.markdown.ends_with('\n') {
            self.markdown.push('\n');
        }
        self.markdown.push('\n');
        self.markdown.push_str(block);
        self.markdown.push('\n');
    }
}
