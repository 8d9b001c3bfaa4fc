//! Filesystem access for frontmatter documents.
//!
//! Every read-modify-write runs under a [`DocumentLock`] and every write goes
//! through a temp file renamed into place, so concurrent tools never lose an
//! update and readers never see a torn file.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::document::frontmatter::Document;
use crate::document::lock::DocumentLock;
use crate::document::path::{self, Operation};
use crate::document::schema::{self, DocumentKind};
use crate::document::JsonMap;
use crate::error::{QuireError, QuireResult};

/// Write `content` to `path` atomically, creating parent folders.
pub fn write_atomic(path: &Path, content: &str) -> QuireResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| QuireError::Io(e.error))?;
    Ok(())
}

/// Read a plain JSON file. Missing files yield `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> QuireResult<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a plain JSON file atomically (2-space indent).
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> QuireResult<()> {
    write_atomic(path, &serde_json::to_string_pretty(value)?)
}

/// Locked read-modify-write of a plain JSON file. Missing or unreadable
/// files start from `T::default()`.
pub fn update_json<T, R>(path: &Path, f: impl FnOnce(&mut T) -> QuireResult<R>) -> QuireResult<R>
where
    T: DeserializeOwned + Serialize + Default,
{
    let _lock = DocumentLock::acquire(path)?;
    let mut value = match read_json::<T>(path) {
        Ok(v) => v.unwrap_or_default(),
        Err(QuireError::Serialization(e)) => {
            warn!(path = %path.display(), error = %e, "Unreadable state file, starting fresh");
            T::default()
        }
        Err(e) => return Err(e),
    };
    let result = f(&mut value)?;
    write_json(path, &value)?;
    Ok(result)
}

fn read_document(full: &Path) -> QuireResult<Option<Document>> {
    match std::fs::read_to_string(full) {
        Ok(content) => {
            debug!(path = %full.display(), "Loaded document");
            Ok(Some(Document::parse(&content)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save_document(full: &Path, doc: &Document) -> QuireResult<()> {
    write_atomic(full, &doc.to_content())?;
    debug!(path = %full.display(), "Saved document");
    Ok(())
}

/// A single life-document write request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Logical key (`identity`, `contacts`, `notes/misc.md`).
    pub file: String,
    #[serde(default = "default_operation")]
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Markdown block appended after a blank line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

fn default_operation() -> Operation {
    Operation::Merge
}

impl WriteRequest {
    pub fn new(file: impl Into<String>, operation: Operation) -> Self {
        Self {
            file: file.into(),
            operation,
            path: None,
            value: None,
            markdown: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn markdown(mut self, markdown: impl Into<String>) -> Self {
        self.markdown = Some(markdown.into());
        self
    }
}

/// Result of a write operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub file_path: PathBuf,
    pub operation: Operation,
    pub data: JsonMap,
}

/// Resolves logical keys to files under a root folder and loads, writes and
/// mutates the documents there.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    root: PathBuf,
}

impl DocumentRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical key to its file, relative to the root. Known kinds use
    /// the current layout; other keys are taken as root-relative paths, with
    /// or without a `life/` prefix.
    pub fn resolve(&self, key: &str) -> PathBuf {
        if let Ok(kind) = key.parse::<DocumentKind>() {
            return PathBuf::from(kind.relative_path());
        }
        PathBuf::from(key.strip_prefix("life/").unwrap_or(key))
    }

    /// The on-disk location of a root-relative key.
    pub fn full_path(&self, key: impl AsRef<Path>) -> PathBuf {
        self.root.join(key)
    }

    /// Load a document by root-relative path. Missing files yield `None`.
    pub fn load(&self, key: impl AsRef<Path>) -> QuireResult<Option<Document>> {
        read_document(&self.full_path(key))
    }

    /// Load a document by logical key, falling back to the kind's default
    /// data when the file is missing or has no parseable frontmatter.
    pub fn load_key(&self, key: &str) -> QuireResult<Document> {
        let doc = self.load(self.resolve(key))?;
        Ok(Self::with_default(key, doc))
    }

    fn with_default(key: &str, doc: Option<Document>) -> Document {
        match doc {
            Some(doc) if !doc.data.is_empty() => doc,
            Some(doc) => Document::new(schema::default_data_for(key), doc.markdown),
            None => Document::new(schema::default_data_for(key), ""),
        }
    }

    /// Whether the file behind a root-relative path exists.
    pub fn exists(&self, key: impl AsRef<Path>) -> bool {
        self.full_path(key).exists()
    }

    /// Write a document atomically.
    pub fn save(&self, key: impl AsRef<Path>, doc: &Document) -> QuireResult<()> {
        save_document(&self.full_path(key), doc)
    }

    /// Locked read-modify-write. `init` supplies the document when the file
    /// is missing or has no frontmatter. The document is written back only
    /// when `f` succeeds.
    pub fn modify<R>(
        &self,
        key: impl AsRef<Path>,
        init: impl FnOnce() -> Document,
        f: impl FnOnce(&mut Document) -> QuireResult<R>,
    ) -> QuireResult<R> {
        let full = self.full_path(key);
        let _lock = DocumentLock::acquire(&full)?;

        let mut doc = match read_document(&full)? {
            Some(doc) if !doc.data.is_empty() => doc,
            Some(doc) => {
                let mut fresh = init();
                if !doc.markdown.is_empty() {
                    fresh.markdown = doc.markdown;
                }
                fresh
            }
            None => init(),
        };

        let result = f(&mut doc)?;
        save_document(&full, &doc)?;
        Ok(result)
    }

    /// Apply one path operation to a life document, append optional
    /// markdown, stamp `lastUpdated` and write it back. Validation problems
    /// are logged, never raised.
    pub fn write_operation(&self, request: &WriteRequest) -> QuireResult<WriteOutcome> {
        if request.file.is_empty() {
            return Err(QuireError::missing_field("file"));
        }
        let key = request.file.as_str();
        let relative = self.resolve(key);
        let path_str = request.path.as_deref().unwrap_or("");

        let data = self.modify(
            &relative,
            || Document::new(schema::default_data_for(key), ""),
            |doc| {
                match (request.operation, request.value.clone()) {
                    (Operation::Merge, None) => {}
                    (Operation::Set, None) => path::set(&mut doc.data, path_str, Value::Null)?,
                    (Operation::Append | Operation::Remove, _) if path_str.is_empty() => {
                        return Err(QuireError::validation(format!(
                            "{} operation requires path to array",
                            request.operation
                        )));
                    }
                    (Operation::Append | Operation::Remove, None) => {
                        return Err(QuireError::missing_field("value"));
                    }
                    (op, Some(value)) => path::apply(&mut doc.data, op, path_str, value)?,
                }

                doc.touch();
                if let Some(markdown) = request.markdown.as_deref().filter(|m| !m.is_empty()) {
                    doc.append_markdown(markdown);
                }

                for problem in schema::validate(key, &doc.data) {
                    warn!(file = key, problem = %problem, "Document failed validation");
                }
                Ok(doc.data.clone())
            },
        )?;

        info!(file = key, operation = %request.operation, "Updated document");
        Ok(WriteOutcome {
            file_path: self.full_path(relative),
            operation: request.operation,
            data,
        })
    }
}
