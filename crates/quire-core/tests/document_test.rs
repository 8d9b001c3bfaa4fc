//! Integration tests for frontmatter documents and path writes.

use std::sync::Arc;

use quire_core::document::path;
use quire_core::{Document, DocumentRepository, JsonMap, Operation, WriteRequest};
use serde_json::json;

fn map(value: serde_json::Value) -> JsonMap {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

/// Rendering then parsing gives back the same data and markdown.
#[test]
fn test_document_round_trip() {
    let doc = Document::new(
        map(json!({
            "version": 1,
            "name": "Ana",
            "nested": {"tags": ["a", "b"], "score": 0.5},
        })),
        "\n# Notes\n\nLikes ---dashes--- in text.\n",
    );

    let parsed = Document::parse(&doc.to_content());
    assert_eq!(parsed, doc);

    // Key order survives the trip.
    let keys: Vec<&String> = parsed.data.keys().collect();
    assert_eq!(keys, ["version", "name", "nested"]);
}

#[test]
fn test_plain_markdown_has_no_frontmatter() {
    let doc = Document::parse("# Just text\n");
    assert!(doc.data.is_empty());
    assert_eq!(doc.markdown, "# Just text\n");
}

/// Appending a mapping whose id already exists replaces it in place.
#[test]
fn test_append_with_same_id_is_idempotent() {
    let mut data = JsonMap::new();
    let entry = json!({"id": "c1", "name": "Sam", "phone": "555"});

    path::append(&mut data, "contacts", entry.clone()).unwrap();
    path::append(&mut data, "contacts", entry.clone()).unwrap();
    assert_eq!(data["contacts"], json!([entry]));

    path::append(&mut data, "contacts", json!({"id": "c1", "name": "Samuel"})).unwrap();
    assert_eq!(data["contacts"], json!([{"id": "c1", "name": "Samuel"}]));
}

/// Removing something that is not there leaves the array untouched.
#[test]
fn test_remove_absent_is_noop() {
    let mut data = map(json!({"people": [{"id": "p1"}, {"id": "p2"}], "tags": ["x"]}));
    let before = data.clone();

    assert_eq!(path::remove(&mut data, "people", &json!({"id": "p9"})).unwrap(), 0);
    assert_eq!(path::remove(&mut data, "tags", &json!("y")).unwrap(), 0);
    assert_eq!(data, before);

    assert_eq!(path::remove(&mut data, "people", &json!({"id": "p1"})).unwrap(), 1);
    assert_eq!(data["people"], json!([{"id": "p2"}]));
}

#[test]
fn test_write_operation_persists_and_stamps() {
    let dir = tempfile::tempdir().unwrap();
    let repo = DocumentRepository::new(dir.path());

    let outcome = repo
        .write_operation(
            &WriteRequest::new("contacts", Operation::Append)
                .path("contacts")
                .value(json!({"name": "Lee", "email": "lee@example.com"}))
                .markdown("Met Lee at the meetup."),
        )
        .unwrap();
    assert!(outcome.file_path.ends_with("knowledge/contacts.md"));

    let doc = repo.load_key("contacts").unwrap();
    let contacts = doc.data["contacts"].as_array().unwrap();
    assert_eq!(contacts.len(), 1);
    assert!(contacts[0]["id"].is_string());
    assert!(doc.data.contains_key("lastUpdated"));
    assert!(doc.markdown.contains("Met Lee at the meetup."));
}

#[test]
fn test_append_without_path_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let repo = DocumentRepository::new(dir.path());

    let err = repo
        .write_operation(&WriteRequest::new("contacts", Operation::Append).value(json!("x")))
        .unwrap_err();
    assert!(err.to_string().contains("requires path to array"));
    assert!(!repo.exists(repo.resolve("contacts")));
}

/// Concurrent appends from several threads all land.
#[test]
fn test_concurrent_appends_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(DocumentRepository::new(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = Arc::clone(&repo);
            std::thread::spawn(move || {
                repo.write_operation(
                    &WriteRequest::new("questions", Operation::Append)
                        .path("pending")
                        .value(json!({"id": format!("q{}", i), "text": "why?"})),
                )
                .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let doc = repo.load_key("questions").unwrap();
    assert_eq!(doc.data["pending"].as_array().unwrap().len(), 8);
}
