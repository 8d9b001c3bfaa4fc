//! Life memory: the agent's identity, boundaries, knowledge and people.
//!
//! Each life document is a frontmatter file under the life folder, addressed
//! by a logical key (`identity`, `contacts`, `people`, ...) or a relative
//! path. Missing documents read as their kind's default data.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::StoreConfig;
use crate::document::path::{self, SearchHit};
use crate::document::{DocumentRepository, WriteOutcome, WriteRequest};
use crate::error::{QuireError, QuireResult};

/// Search results inside one life document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeSearch {
    pub query: String,
    pub matches: Vec<SearchHit>,
    pub total: usize,
}

/// Result of [`LifeStore::read`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeRead {
    pub file_path: PathBuf,
    pub exists: bool,
    /// Whole frontmatter, or the value at `path` (null when unresolved).
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<LifeSearch>,
}

#[derive(Debug, Clone)]
pub struct LifeStore {
    repo: DocumentRepository,
}

impl LifeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            repo: DocumentRepository::new(root),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.life_path())
    }

    pub fn root(&self) -> &Path {
        self.repo.root()
    }

    /// Read a life document. `path` selects one field; otherwise `query`
    /// searches frontmatter and markdown.
    pub fn read(&self, file: &str, path: Option<&str>, query: Option<&str>) -> QuireResult<LifeRead> {
        if file.is_empty() {
            return Err(QuireError::missing_field("file"));
        }
        let relative = self.repo.resolve(file);
        let exists = self.repo.exists(&relative);
        let file_path = self.repo.full_path(relative);
        let doc = self.repo.load_key(file)?;
        debug!(file = %file, exists, "Read life document");

        if let Some(p) = path.filter(|p| !p.is_empty()) {
            return Ok(LifeRead {
                file_path,
                exists,
                data: path::get(&doc.data, p).cloned().unwrap_or(Value::Null),
                markdown: None,
                path: Some(p.to_string()),
                search: None,
            });
        }

        let search = query.filter(|q| !q.is_empty()).map(|q| {
            let matches = path::search(&doc.data, &doc.markdown, q);
            LifeSearch {
                query: q.to_string(),
                total: matches.len(),
                matches,
            }
        });

        Ok(LifeRead {
            file_path,
            exists,
            data: Value::Object(doc.data),
            markdown: Some(doc.markdown),
            path: None,
            search,
        })
    }

    /// Apply one write operation to a life document.
    pub fn write(&self, request: &WriteRequest) -> QuireResult<WriteOutcome> {
        self.repo.write_operation(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Operation;
    use serde_json::json;

    #[test]
    fn test_read_missing_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let life = LifeStore::new(dir.path());
        let read = life.read("patterns", None, None).unwrap();
        assert!(!read.exists);
        assert_eq!(read.data["version"], json!(1));
        assert_eq!(read.markdown.as_deref(), Some(""));
    }

    #[test]
    fn test_write_then_read_path_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let life = LifeStore::new(dir.path());

        life.write(
            &WriteRequest::new("people", Operation::Append)
                .path("people")
                .value(json!({"id": "p1", "name": "Dana Reyes", "role": "mentor"}))
                .markdown("Dana prefers mornings."),
        )
        .unwrap();

        let read = life.read("relationships", Some("people.0.name"), None).unwrap();
        assert!(read.exists);
        assert_eq!(read.data, json!("Dana Reyes"));

        let read = life.read("people", None, Some("dana")).unwrap();
        let search = read.search.unwrap();
        assert_eq!(search.total, 2);
        assert!(search.matches.contains(&SearchHit::Data {
            path: "people[0].name".to_string(),
            value: json!("Dana Reyes"),
        }));
    }

    #[test]
    fn test_unresolved_path_is_null() {
        let dir = tempfile::tempdir().unwrap();
        let life = LifeStore::new(dir.path());
        let read = life.read("identity", Some("nope.deeper"), None).unwrap();
        assert_eq!(read.data, Value::Null);
    }
}
