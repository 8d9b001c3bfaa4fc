//! Life document kinds, their on-disk layout, defaults and lenient validation.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{Display, EnumString};

use crate::document::{JsonMap, SCHEMA_VERSION};

/// Known life document kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
    Identity,
    Boundaries,
    Patterns,
    Contacts,
    Business,
    Procedures,
    /// Also addressed by its legacy name `relationships`.
    #[strum(to_string = "people", serialize = "relationships")]
    People,
    Questions,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 8] = [
        DocumentKind::Identity,
        DocumentKind::Boundaries,
        DocumentKind::Patterns,
        DocumentKind::Contacts,
        DocumentKind::Business,
        DocumentKind::Procedures,
        DocumentKind::People,
        DocumentKind::Questions,
    ];

    /// Detect the kind from a key or path (`knowledge/contacts.md` -> Contacts).
    pub fn from_key(key: &str) -> Option<Self> {
        let base = key.rsplit('/').next().unwrap_or(key);
        let base = base.strip_suffix(".md").unwrap_or(base);
        base.parse().ok()
    }

    /// Path relative to the life root.
    pub fn relative_path(&self) -> &'static str {
        match self {
            DocumentKind::Identity => "identity.md",
            DocumentKind::Boundaries => "boundaries.md",
            DocumentKind::Patterns => "patterns.md",
            DocumentKind::Questions => "questions.md",
            DocumentKind::Contacts => "knowledge/contacts.md",
            DocumentKind::Business => "knowledge/business.md",
            DocumentKind::Procedures => "knowledge/procedures.md",
            DocumentKind::People => "relationships/people.md",
        }
    }

    /// Empty data for a fresh document of this kind.
    pub fn default_data(&self) -> JsonMap {
        let value = match self {
            DocumentKind::Identity => json!({
                "version": SCHEMA_VERSION,
                "name": "",
                "timezone": "",
                "preferences": {}
            }),
            DocumentKind::Boundaries => json!({
                "version": SCHEMA_VERSION,
                "neverDo": [],
                "alwaysDo": [],
                "escalateWhen": [],
                "limits": {}
            }),
            DocumentKind::Patterns => json!({
                "version": SCHEMA_VERSION,
                "communication": [],
                "work": [],
                "temporal": []
            }),
            DocumentKind::Contacts => json!({"version": SCHEMA_VERSION, "contacts": []}),
            DocumentKind::Business => json!({
                "version": SCHEMA_VERSION,
                "industry": "",
                "description": "",
                "services": [],
                "facts": []
            }),
            DocumentKind::Procedures => json!({"version": SCHEMA_VERSION, "procedures": []}),
            DocumentKind::People => json!({"version": SCHEMA_VERSION, "people": []}),
            DocumentKind::Questions => json!({
                "version": SCHEMA_VERSION,
                "pending": [],
                "answered": []
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => JsonMap::new(),
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        &["version"]
    }
}

/// Default data for any key; unknown kinds get a bare versioned mapping.
pub fn default_data_for(key: &str) -> JsonMap {
    match DocumentKind::from_key(key) {
        Some(kind) => kind.default_data(),
        None => {
            let mut map = JsonMap::new();
            map.insert("version".to_string(), Value::from(SCHEMA_VERSION));
            map
        }
    }
}

/// Check `data` against its kind. Returns human-readable problems; an empty
/// list means valid. Unknown kinds accept anything.
pub fn validate(key: &str, data: &JsonMap) -> Vec<String> {
    let Some(kind) = DocumentKind::from_key(key) else {
        return Vec::new();
    };

    let mut errors: Vec<String> = kind
        .required_fields()
        .iter()
        .filter(|field| !data.contains_key(**field))
        .map(|field| format!("Missing required field: {}", field))
        .collect();

    if let Some(version) = data.get("version") {
        if !(version.is_i64() || version.is_u64()) {
            errors.push("version must be an integer".to_string());
        }
    }

    errors
}
