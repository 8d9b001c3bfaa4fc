//! Migration of legacy inline targets to prospect references.
//!
//! Each legacy target with an email is matched to an existing prospect by
//! email (case-insensitive) or gets a new prospect created from its inline
//! data. The targets document is then rewritten in reference format, keeping
//! target ids and touch history counts.
//!
//! A reference document that still carries inline `targets` is migrated the
//! same way, with the new references appended to the existing ones.
//!
//! Targets without an email cannot be matched to a prospect. They are
//! reported as skipped and kept under `unmigrated_targets` so nothing is
//! lost.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::{info, warn};

use crate::campaign::store::CampaignStore;
use crate::campaign::targets::{LegacyTarget, ReferenceTargets, TargetRef, TargetsDocument};
use crate::document::{timestamp, JsonMap};
use crate::error::QuireResult;
use crate::prospect::{slugify, NewProspect};

/// Source recorded on prospects created by migration.
pub const MIGRATION_SOURCE: &str = "campaign_migration";

/// Key of inline targets left in a reference document.
const INLINE_TARGETS: &str = "targets";

enum Pending {
    Done(MigrationReport),
    Targets(Vec<LegacyTarget>),
}

/// What happened to one migrated target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MigrationAction {
    /// A prospect with the same email already existed.
    FoundExisting,
    /// Dry run: a prospect would be created.
    WouldCreate,
    CreatedProspect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationDetail {
    pub name: String,
    pub email: String,
    pub action: MigrationAction,
    pub slug: String,
}

/// Outcome of a migration run.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Targets converted to references.
    pub migrated: u64,
    /// Targets left behind.
    pub skipped: u64,
    /// One message per skipped target.
    pub errors: Vec<String>,
    pub details: Vec<MigrationDetail>,
    pub message: String,
}

impl MigrationReport {
    fn finished(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Check if migration completed without errors.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

fn research_text(research: Option<&Value>) -> (String, String) {
    let Some(research) = research else {
        return (String::new(), String::new());
    };
    let summary = research
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let news = research
        .get("news")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => format!("- {}", s),
                    other => format!("- {}", other),
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    (summary, news)
}

impl CampaignStore {
    /// Convert inline targets to reference format, creating
    /// prospects as needed. A dry run reports what would happen and writes
    /// nothing.
    pub fn migrate_targets_to_prospects(
        &self,
        name: &str,
        dry_run: bool,
    ) -> QuireResult<MigrationReport> {
        let inline = match Self::pending(&self.load_targets(name)?)? {
            Pending::Done(report) => return Ok(report),
            Pending::Targets(inline) => inline,
        };
        if dry_run {
            let (report, _, _) = self.plan(&inline, true)?;
            return Ok(report);
        }

        let report = self.modify_targets(name, |targets| {
            let inline = match Self::pending(targets)? {
                Pending::Done(report) => return Ok(report),
                Pending::Targets(inline) => inline,
            };

            let (report, references, leftovers) = self.plan(&inline, false)?;
            if references.is_empty() {
                return Ok(report);
            }

            let mut migrated = match std::mem::replace(targets, TargetsDocument::new_reference()) {
                TargetsDocument::Legacy(legacy) => {
                    let mut doc = ReferenceTargets::new(Vec::new());
                    doc.extra = legacy.extra;
                    doc
                }
                TargetsDocument::Reference(mut doc) => {
                    doc.extra.remove(INLINE_TARGETS);
                    doc.version = 2;
                    doc
                }
            };
            migrated.target_references.extend(references);
            if !leftovers.is_empty() {
                migrated.extra.insert(
                    "unmigrated_targets".to_string(),
                    serde_json::to_value(&leftovers)?,
                );
            }
            *targets = TargetsDocument::Reference(migrated);
            Ok(report)
        })?;

        info!(
            campaign = %name,
            migrated = report.migrated,
            skipped = report.skipped,
            "Migrated targets to prospects"
        );
        Ok(report)
    }

    /// Inline targets still waiting for migration. A reference document only
    /// counts as migrated when it carries no `targets` key.
    fn pending(targets: &TargetsDocument) -> QuireResult<Pending> {
        let inline: Vec<LegacyTarget> = match targets {
            TargetsDocument::Legacy(doc) => doc.targets.clone(),
            TargetsDocument::Reference(doc) => match doc.extra.get(INLINE_TARGETS) {
                None => {
                    return Ok(Pending::Done(MigrationReport::finished(
                        "Campaign already uses reference format",
                    )))
                }
                Some(value) => serde_json::from_value(value.clone())?,
            },
        };
        if inline.is_empty() {
            return Ok(Pending::Done(MigrationReport::finished("No targets to migrate")));
        }
        Ok(Pending::Targets(inline))
    }

    /// Resolve every legacy target to a prospect. Returns the report, the
    /// new references and the targets that could not be migrated.
    fn plan(
        &self,
        inline: &[LegacyTarget],
        dry_run: bool,
    ) -> QuireResult<(MigrationReport, Vec<TargetRef>, Vec<LegacyTarget>)> {
        let mut report = MigrationReport::default();
        let mut references = Vec::new();
        let mut leftovers = Vec::new();

        for target in inline {
            let Some(email) = target.email.as_deref().filter(|e| !e.trim().is_empty()) else {
                report
                    .errors
                    .push(format!("Target '{}' has no email - cannot migrate", target.name));
                report.skipped += 1;
                leftovers.push(target.clone());
                continue;
            };

            let resolved = match self.prospects().find_by_email(email)? {
                Some(existing) => Ok((existing.slug, MigrationAction::FoundExisting)),
                None if dry_run => Ok((slugify(&target.name), MigrationAction::WouldCreate)),
                None => self
                    .prospects()
                    .create(Self::prospect_from_target(target, email))
                    .map(|p| (p.slug, MigrationAction::CreatedProspect)),
            };

            let (slug, action) = match resolved {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(target = %target.name, error = %e, "Target migration failed");
                    report
                        .errors
                        .push(format!("Failed to migrate '{}': {}", target.name, e));
                    report.skipped += 1;
                    leftovers.push(target.clone());
                    continue;
                }
            };

            references.push(TargetRef {
                id: target.id.clone(),
                prospect_slug: slug.clone(),
                added_at: if target.created_at.is_empty() {
                    timestamp()
                } else {
                    target.created_at.clone()
                },
                last_touch_at: target
                    .touches
                    .last()
                    .map(|t| t.sent_at.clone())
                    .filter(|s| !s.is_empty()),
                touch_count: target.touches.len() as u32,
                campaign_stage: target.stage,
                unsubscribed: target.unsubscribed,
                extra: JsonMap::new(),
            });
            report.migrated += 1;
            report.details.push(MigrationDetail {
                name: target.name.clone(),
                email: email.to_string(),
                action,
                slug,
            });
        }

        report.message = format!(
            "{} {} targets, skipped {}",
            if dry_run { "Would migrate" } else { "Migrated" },
            report.migrated,
            report.skipped
        );
        Ok((report, references, leftovers))
    }

    fn prospect_from_target(target: &LegacyTarget, email: &str) -> NewProspect {
        let (summary, news) = research_text(target.research.as_ref());
        let date: String = timestamp().chars().take(10).collect();
        NewProspect {
            name: target.name.clone(),
            email: email.to_string(),
            company: target.company.clone(),
            title: target.title.clone(),
            phone: target.phone.clone(),
            linkedin: target.linkedin.clone(),
            source: Some(MIGRATION_SOURCE.to_string()),
            stage: Some(target.stage),
            business_context: Some(summary),
            research_notes: Some(news),
            interaction_history: Some(format!(
                "### {} - Migrated from campaign\nProspect created from existing campaign target data.",
                date
            )),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::targets::{NewTarget, TouchInput};
    use crate::campaign::Stage;
    use crate::config::StoreConfig;
    use serde_json::json;

    fn store_with_campaign() -> (tempfile::TempDir, CampaignStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CampaignStore::from_config(&StoreConfig::at(dir.path()));
        store.create("Camp", &JsonMap::new()).unwrap();
        (dir, store)
    }

    fn add(store: &CampaignStore, name: &str, email: Option<&str>) -> LegacyTarget {
        store
            .add_target(
                "Camp",
                NewTarget {
                    name: Some(name.to_string()),
                    email: email.map(str::to_string),
                    company: Some("Acme".to_string()),
                    research: Some(json!({"summary": "Sells anvils", "news": ["Raised a round"]})),
                    stage: Some(Stage::Contacted),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    #[test]
    fn test_already_reference() {
        let (_dir, store) = store_with_campaign();
        let report = store.migrate_targets_to_prospects("Camp", false).unwrap();
        assert_eq!(report.migrated, 0);
        assert!(report.message.contains("already uses reference format"));
    }

    #[test]
    fn test_email_less_target_skipped() {
        let (_dir, store) = store_with_campaign();
        add(&store, "Nomail", None);

        let report = store.migrate_targets_to_prospects("Camp", false).unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, vec!["Target 'Nomail' has no email - cannot migrate"]);
        assert!(!store.load_targets("Camp").unwrap().is_reference());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (_dir, store) = store_with_campaign();
        add(&store, "Ann Lee", Some("ann@x.com"));

        let report = store.migrate_targets_to_prospects("Camp", true).unwrap();
        assert_eq!(report.migrated, 1);
        assert_eq!(report.details[0].action, MigrationAction::WouldCreate);
        assert_eq!(report.details[0].slug, "ann-lee");
        assert_eq!(report.message, "Would migrate 1 targets, skipped 0");
        assert!(store.prospects().list().unwrap().is_empty());
        assert!(!store.load_targets("Camp").unwrap().is_reference());
    }

    #[test]
    fn test_migrates_and_preserves_history() {
        let (_dir, store) = store_with_campaign();
        let ann = add(&store, "Ann Lee", Some("ann@x.com"));
        add(&store, "Nomail", None);
        store
            .record_touch("Camp", &ann.id, TouchInput::default())
            .unwrap();
        store
            .prospects()
            .create(NewProspect::new("Bob", "BOB@x.com"))
            .unwrap();
        add(&store, "Bobby", Some("bob@x.com"));

        let report = store.migrate_targets_to_prospects("Camp", false).unwrap();
        assert_eq!(report.migrated, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.details[0].action, MigrationAction::CreatedProspect);
        assert_eq!(report.details[1].action, MigrationAction::FoundExisting);
        assert_eq!(report.details[1].slug, "bob");

        let TargetsDocument::Reference(doc) = store.load_targets("Camp").unwrap() else {
            panic!("expected reference format");
        };
        let first = &doc.target_references[0];
        assert_eq!(first.id, ann.id);
        assert_eq!(first.touch_count, 1);
        assert!(first.last_touch_at.is_some());
        assert_eq!(first.campaign_stage, Stage::Contacted);
        assert_eq!(doc.extra["unmigrated_targets"][0]["name"], json!("Nomail"));

        let prospect = store.prospects().require("ann-lee").unwrap();
        assert_eq!(prospect.frontmatter.source.as_deref(), Some(MIGRATION_SOURCE));
        assert_eq!(prospect.frontmatter.stage, Stage::Contacted);
        assert_eq!(prospect.sections.business_context, "Sells anvils");
        assert_eq!(prospect.sections.research_notes, "- Raised a round");
        assert!(prospect
            .sections
            .interaction_history
            .contains("Migrated from campaign"));

        let metrics = store.metrics("Camp").unwrap();
        assert_eq!(metrics.summary.total_targets, 2);
    }
}
