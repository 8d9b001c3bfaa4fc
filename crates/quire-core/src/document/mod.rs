//! Frontmatter documents: codec, path mutation, locking and the repository.

pub mod frontmatter;
pub mod lock;
pub mod path;
pub mod repository;
pub mod schema;

use chrono::{SecondsFormat, Utc};

pub use frontmatter::Document;
pub use lock::DocumentLock;
pub use path::{Operation, SearchHit};
pub use repository::{DocumentRepository, WriteOutcome, WriteRequest};
pub use schema::DocumentKind;

/// JSON object with insertion-ordered keys.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Current document schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Current UTC time, ISO-8601 with a `Z` suffix.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Short random identifier (8 hex chars).
pub fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
