//! Prospect documents stored as `<slug>.md` in the prospects folder.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::campaign::Stage;
use crate::document::{timestamp, Document, DocumentLock, DocumentRepository, JsonMap};
use crate::error::{QuireError, QuireResult};
use crate::prospect::sections::ProspectSections;

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Kebab-case a display name. Never returns an empty string.
pub fn slugify(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let stripped = NON_SLUG.replace_all(&lower, "");
    let dashed = WHITESPACE.replace_all(&stripped, "-");
    let collapsed = DASHES.replace_all(&dashed, "-");
    let slug = collapsed.trim_matches('-');
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug.to_string()
    }
}

/// Prospect frontmatter. Absent optional fields are omitted on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProspectFrontmatter {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    /// Where the prospect came from (`google_maps`, `campaign_migration`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_query: Option<String>,
    pub stage: Stage,
    pub created_at: String,
    pub updated_at: String,
    /// Fields written by other tools.
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// A prospect with its parsed body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub slug: String,
    pub frontmatter: ProspectFrontmatter,
    #[serde(flatten)]
    pub sections: ProspectSections,
}

/// Input for creating a prospect. `name` and `email` are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewProspect {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub source: Option<String>,
    pub source_query: Option<String>,
    pub stage: Option<Stage>,
    pub business_context: Option<String>,
    pub research_notes: Option<String>,
    pub personalization_hooks: Option<String>,
    /// Initial interaction history entry.
    pub interaction_history: Option<String>,
}

impl NewProspect {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }
}

/// Partial update: frontmatter fields overwrite, three sections are
/// replaced and the history entry is appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProspectUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub source: Option<String>,
    pub source_query: Option<String>,
    pub stage: Option<Stage>,
    pub business_context: Option<String>,
    pub research_notes: Option<String>,
    pub personalization_hooks: Option<String>,
    pub interaction_history_append: Option<String>,
}

/// File-backed prospect store.
#[derive(Debug, Clone)]
pub struct ProspectStore {
    dir: PathBuf,
    repo: DocumentRepository,
}

impl ProspectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            repo: DocumentRepository::new(dir.clone()),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(slug: &str) -> QuireResult<String> {
        if slug.is_empty() || slug.contains(['/', '\\']) || slug.starts_with('.') {
            return Err(QuireError::validation(format!("Invalid prospect slug '{}'", slug)));
        }
        Ok(format!("{}.md", slug))
    }

    pub fn exists(&self, slug: &str) -> bool {
        Self::file_name(slug).is_ok_and(|f| self.dir.join(f).exists())
    }

    fn unique_slug(&self, base: &str) -> String {
        let mut slug = base.to_string();
        let mut counter = 1;
        while self.dir.join(format!("{}.md", slug)).exists() {
            slug = format!("{}-{}", base, counter);
            counter += 1;
        }
        slug
    }

    /// Create a prospect under a fresh unique slug.
    pub fn create(&self, input: NewProspect) -> QuireResult<Prospect> {
        let name = input.name.trim().to_string();
        let email = input.email.trim().to_string();
        if name.is_empty() {
            return Err(QuireError::missing_field("name"));
        }
        if email.is_empty() {
            return Err(QuireError::missing_field("email"));
        }

        let now = timestamp();
        let frontmatter = ProspectFrontmatter {
            name,
            email,
            company: input.company,
            title: input.title,
            phone: input.phone,
            website: input.website,
            linkedin: input.linkedin,
            source: input.source,
            source_query: input.source_query,
            stage: input.stage.unwrap_or_default(),
            created_at: now.clone(),
            updated_at: now,
            extra: JsonMap::new(),
        };
        let sections = ProspectSections {
            business_context: input.business_context.unwrap_or_default(),
            research_notes: input.research_notes.unwrap_or_default(),
            personalization_hooks: input.personalization_hooks.unwrap_or_default(),
            interaction_history: input.interaction_history.unwrap_or_default(),
        };

        let _lock = DocumentLock::acquire_dir(&self.dir)?;
        let slug = self.unique_slug(&slugify(&frontmatter.name));
        let doc = Document::from_typed(&frontmatter, sections.render())?;
        self.repo.save(Self::file_name(&slug)?, &doc)?;

        info!(slug = %slug, "Created prospect");
        Ok(Prospect {
            slug,
            frontmatter,
            sections,
        })
    }

    /// Apply a partial update to an existing prospect.
    pub fn update(&self, slug: &str, update: ProspectUpdate) -> QuireResult<Prospect> {
        let file = Self::file_name(slug)?;
        if !self.repo.exists(&file) {
            return Err(QuireError::prospect_not_found(slug));
        }

        let prospect = self.repo.modify(&file, Document::default, |doc| {
            let mut frontmatter: ProspectFrontmatter = doc.to_typed()?;
            let mut sections = ProspectSections::parse(&doc.markdown);

            frontmatter.updated_at = timestamp();
            if let Some(name) = &update.name {
                frontmatter.name = name.clone();
            }
            if let Some(email) = &update.email {
                frontmatter.email = email.clone();
            }
            if let Some(stage) = update.stage {
                frontmatter.stage = stage;
            }
            for (field, value) in [
                (&mut frontmatter.company, &update.company),
                (&mut frontmatter.title, &update.title),
                (&mut frontmatter.phone, &update.phone),
                (&mut frontmatter.website, &update.website),
                (&mut frontmatter.linkedin, &update.linkedin),
                (&mut frontmatter.source, &update.source),
                (&mut frontmatter.source_query, &update.source_query),
            ] {
                if value.is_some() {
                    *field = value.clone();
                }
            }

            if let Some(text) = &update.business_context {
                sections.business_context = text.clone();
            }
            if let Some(text) = &update.research_notes {
                sections.research_notes = text.clone();
            }
            if let Some(text) = &update.personalization_hooks {
                sections.personalization_hooks = text.clone();
            }
            if let Some(entry) = &update.interaction_history_append {
                sections.append_history(entry);
            }

            doc.set_typed(&frontmatter)?;
            doc.markdown = sections.render();
            Ok(Prospect {
                slug: slug.to_string(),
                frontmatter,
                sections,
            })
        })?;

        info!(slug = %slug, "Updated prospect");
        Ok(prospect)
    }

    /// Set the prospect's pipeline stage.
    pub fn set_stage(&self, slug: &str, stage: Stage) -> QuireResult<Prospect> {
        self.update(
            slug,
            ProspectUpdate {
                stage: Some(stage),
                ..Default::default()
            },
        )
    }

    /// Read a prospect by slug.
    pub fn get(&self, slug: &str) -> QuireResult<Option<Prospect>> {
        let Some(doc) = self.repo.load(Self::file_name(slug)?)? else {
            return Ok(None);
        };
        Ok(Some(Prospect {
            slug: slug.to_string(),
            frontmatter: doc.to_typed()?,
            sections: ProspectSections::parse(&doc.markdown),
        }))
    }

    /// Read a prospect by slug, failing when it does not exist.
    pub fn require(&self, slug: &str) -> QuireResult<Prospect> {
        self.get(slug)?
            .ok_or_else(|| QuireError::prospect_not_found(slug))
    }

    fn slugs(&self) -> QuireResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut slugs: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        slugs.sort();
        Ok(slugs)
    }

    /// Find the prospect whose email matches, ignoring case.
    pub fn find_by_email(&self, email: &str) -> QuireResult<Option<Prospect>> {
        let wanted = email.trim().to_lowercase();
        for slug in self.slugs()? {
            match self.get(&slug) {
                Ok(Some(prospect)) if prospect.frontmatter.email.to_lowercase() == wanted => {
                    return Ok(Some(prospect));
                }
                Ok(_) => {}
                Err(e) => debug!(slug = %slug, error = %e, "Skipping unreadable prospect"),
            }
        }
        Ok(None)
    }

    /// All readable prospects, sorted by slug.
    pub fn list(&self) -> QuireResult<Vec<Prospect>> {
        let mut prospects = Vec::new();
        for slug in self.slugs()? {
            match self.get(&slug) {
                Ok(Some(prospect)) => prospects.push(prospect),
                Ok(None) => {}
                Err(e) => debug!(slug = %slug, error = %e, "Skipping unreadable prospect"),
            }
        }
        Ok(prospects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ProspectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProspectStore::new(dir.path().join("prospects"));
        (dir, store)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("John Smith"), "john-smith");
        assert_eq!(slugify("  Dr. Jane   O'Neil -- PhD "), "dr-jane-oneil-phd");
        assert_eq!(slugify("!!!"), "unknown");
        assert_eq!(slugify(""), "unknown");
    }

    #[test]
    fn test_create_requires_name_and_email() {
        let (_dir, store) = store();
        let err = store.create(NewProspect::new("", "a@b.c")).unwrap_err();
        assert!(err.to_string().contains("name"));
        let err = store.create(NewProspect::new("Ann", "  ")).unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_create_unique_slugs() {
        let (_dir, store) = store();
        let a = store.create(NewProspect::new("John Smith", "a@x.com")).unwrap();
        let b = store.create(NewProspect::new("John Smith", "b@x.com")).unwrap();
        let c = store.create(NewProspect::new("John Smith", "c@x.com")).unwrap();
        assert_eq!(a.slug, "john-smith");
        assert_eq!(b.slug, "john-smith-1");
        assert_eq!(c.slug, "john-smith-2");
    }

    #[test]
    fn test_absent_fields_omitted_on_disk() {
        let (_dir, store) = store();
        let p = store.create(NewProspect::new("Ann", "ann@x.com")).unwrap();
        let content = std::fs::read_to_string(store.dir().join(format!("{}.md", p.slug))).unwrap();
        assert!(!content.contains("\"company\""));
        assert!(content.contains("\"stage\": \"identified\""));
        assert!(content.contains("## Interaction History"));
    }

    #[test]
    fn test_update_merges_and_appends() {
        let (_dir, store) = store();
        let mut input = NewProspect::new("Ann Lee", "ann@x.com");
        input.business_context = Some("Florist".to_string());
        store.create(input).unwrap();

        store
            .update(
                "ann-lee",
                ProspectUpdate {
                    company: Some("Petals".to_string()),
                    interaction_history_append: Some("### Day 1\nCalled".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let updated = store
            .update(
                "ann-lee",
                ProspectUpdate {
                    research_notes: Some("- New store".to_string()),
                    interaction_history_append: Some("### Day 2\nEmailed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.frontmatter.company.as_deref(), Some("Petals"));
        assert_eq!(updated.sections.business_context, "Florist");
        assert_eq!(
            updated.sections.interaction_history,
            "### Day 1\nCalled\n\n### Day 2\nEmailed"
        );

        let stored = store.get("ann-lee").unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[test]
    fn test_update_missing_prospect() {
        let (_dir, store) = store();
        let err = store.update("ghost", ProspectUpdate::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_find_by_email_case_insensitive() {
        let (_dir, store) = store();
        store.create(NewProspect::new("Ann", "Ann@Example.com")).unwrap();
        store.create(NewProspect::new("Bob", "bob@example.com")).unwrap();

        let found = store.find_by_email("ANN@example.COM").unwrap().unwrap();
        assert_eq!(found.slug, "ann");
        assert!(store.find_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_list_sorted() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
        store.create(NewProspect::new("Zed", "z@x.com")).unwrap();
        store.create(NewProspect::new("Amy", "a@x.com")).unwrap();
        let slugs: Vec<String> = store.list().unwrap().into_iter().map(|p| p.slug).collect();
        assert_eq!(slugs, vec!["amy", "zed"]);
    }

    #[test]
    fn test_rejects_path_like_slug() {
        let (_dir, store) = store();
        assert!(store.get("../etc/passwd").is_err());
    }
}
