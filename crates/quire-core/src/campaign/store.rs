//! Campaign folders and their five documents.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::campaign::config::{CampaignConfig, CampaignSummary};
use crate::campaign::documents::{
    CampaignFile, LogDocument, LogEvent, MetricsDocument, SequenceDocument,
};
use crate::campaign::targets::{
    LegacyTarget, LegacyTargets, NewTarget, ReferenceTargets, TargetRecord, TargetRef,
    TargetSummary, TargetUpdate, TargetView, TargetsDocument, Touch, TouchInput,
};
use crate::campaign::Stage;
use crate::config::StoreConfig;
use crate::document::{timestamp, Document, DocumentRepository, JsonMap};
use crate::error::{QuireError, QuireResult};
use crate::prospect::ProspectStore;

/// Name prefix of the folder a campaign is built in before it appears.
const STAGING_PREFIX: &str = ".staging-";

static NON_FOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());

/// Folder name for a campaign: lower-cased, every other character a dash.
pub fn campaign_slug(name: &str) -> String {
    NON_FOLDER.replace_all(&name.to_lowercase(), "-").into_owned()
}

/// File-backed campaign store.
#[derive(Debug, Clone)]
pub struct CampaignStore {
    root: PathBuf,
    repo: DocumentRepository,
    prospects: ProspectStore,
    log_capacity: usize,
}

impl CampaignStore {
    pub fn new(root: impl Into<PathBuf>, prospects: ProspectStore) -> Self {
        let root = root.into();
        Self {
            repo: DocumentRepository::new(root.clone()),
            root,
            prospects,
            log_capacity: 1000,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            config.campaigns_path(),
            ProspectStore::new(config.prospects_path()),
        )
        .with_log_capacity(config.log_capacity)
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn prospects(&self) -> &ProspectStore {
        &self.prospects
    }

    pub fn campaign_dir(&self, name: &str) -> PathBuf {
        self.root.join(campaign_slug(name))
    }

    fn existing_dir(&self, name: &str) -> QuireResult<PathBuf> {
        if name.is_empty() {
            return Err(QuireError::missing_field("campaign"));
        }
        let dir = self.campaign_dir(name);
        if !dir.is_dir() {
            return Err(QuireError::campaign_not_found(name));
        }
        Ok(dir)
    }

    /// Root-relative key of one campaign file.
    fn path(&self, name: &str, file: CampaignFile) -> QuireResult<PathBuf> {
        self.existing_dir(name)?;
        Ok(Path::new(&campaign_slug(name)).join(file.file_name()))
    }

    fn load_typed<T: DeserializeOwned + Default>(&self, path: &Path) -> QuireResult<T> {
        match self.repo.load(path)? {
            Some(doc) if !doc.data.is_empty() => doc.to_typed(),
            _ => Ok(T::default()),
        }
    }

    fn modify_typed<T, R>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut T) -> QuireResult<R>,
    ) -> QuireResult<R>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        self.repo.modify(
            path,
            Document::default,
            |doc| {
                let mut value: T = if doc.data.is_empty() {
                    T::default()
                } else {
                    doc.to_typed()?
                };
                let result = f(&mut value)?;
                doc.set_typed(&value)?;
                Ok(result)
            },
        )
    }

    /// Create a campaign folder with all five documents. Creating an existing
    /// campaign is an error.
    pub fn create(&self, name: &str, overrides: &JsonMap) -> QuireResult<CampaignConfig> {
        if name.trim().is_empty() {
            return Err(QuireError::missing_field("name"));
        }

        let mut config = CampaignConfig::new(name);
        config.apply_updates(overrides)?;

        self.create_with(name, |staged| self.write_initial_documents(staged, name, &config))?;
        Ok(config)
    }

    /// Populate a hidden staging folder and rename it into place. A failed
    /// populate leaves no campaign folder behind.
    fn create_with(
        &self,
        name: &str,
        populate: impl FnOnce(&DocumentRepository) -> QuireResult<()>,
    ) -> QuireResult<PathBuf> {
        let dir = self.campaign_dir(name);
        let already_exists = || {
            QuireError::already_exists(format!(
                "Campaign '{}' already exists at {}",
                name,
                dir.display()
            ))
        };
        if dir.exists() {
            return Err(already_exists());
        }

        std::fs::create_dir_all(&self.root)?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)?;
        populate(&DocumentRepository::new(staging.path()))?;

        match std::fs::rename(staging.path(), &dir) {
            Ok(()) => {}
            Err(_) if dir.exists() => return Err(already_exists()),
            Err(e) => return Err(e.into()),
        }
        info!(campaign = %name, folder = %dir.display(), "Created campaign");
        Ok(dir)
    }

    fn write_initial_documents(
        &self,
        repo: &DocumentRepository,
        name: &str,
        config: &CampaignConfig,
    ) -> QuireResult<()> {
        let config_body = format!("\n# {}\n\nCampaign goal: {}\n", name, config.goal);
        repo.save(
            CampaignFile::Config.file_name(),
            &Document::from_typed(config, config_body)?,
        )?;
        repo.save(
            CampaignFile::Targets.file_name(),
            &Document::new(TargetsDocument::new_reference().to_data()?, "\n# Campaign Targets\n"),
        )?;
        repo.save(
            CampaignFile::Sequence.file_name(),
            &Document::from_typed(&SequenceDocument::default(), "\n# Outreach Sequences\n")?,
        )?;
        repo.save(
            CampaignFile::Metrics.file_name(),
            &Document::from_typed(&MetricsDocument::default(), "\n# Campaign Metrics\n")?,
        )?;

        let mut log = LogDocument::default();
        log.push(
            LogEvent::new("CREATED", format!("Campaign '{}' created", name)),
            self.log_capacity,
        );
        repo.save(
            CampaignFile::Log.file_name(),
            &Document::from_typed(&log, "\n# Campaign Log\n")?,
        )
    }

    /// Apply config overrides (same rules as creation) and stamp `lastUpdated`.
    pub fn update_config(&self, name: &str, updates: &JsonMap) -> QuireResult<CampaignConfig> {
        let path = self.path(name, CampaignFile::Config)?;
        let config = self.repo.modify(&path, Document::default, |doc| {
            let mut config: CampaignConfig = doc.to_typed()?;
            config.apply_updates(updates)?;
            config.last_updated = Some(timestamp());
            doc.set_typed(&config)?;
            Ok(config)
        })?;
        info!(campaign = %name, "Updated campaign config");
        Ok(config)
    }

    /// Current targets document. Missing files read as an empty reference
    /// document.
    pub fn load_targets(&self, name: &str) -> QuireResult<TargetsDocument> {
        let path = self.path(name, CampaignFile::Targets)?;
        match self.repo.load(&path)? {
            Some(doc) if !doc.data.is_empty() => TargetsDocument::from_data(&doc.data),
            _ => Ok(TargetsDocument::new_reference()),
        }
    }

    /// Locked read-modify-write of the targets document followed by a metrics
    /// refresh.
    pub(crate) fn modify_targets<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut TargetsDocument) -> QuireResult<R>,
    ) -> QuireResult<R> {
        let path = self.path(name, CampaignFile::Targets)?;
        let result = self.repo.modify(
            &path,
            || Document::new(JsonMap::new(), ""),
            |doc| {
                let mut targets = if doc.data.is_empty() {
                    TargetsDocument::new_reference()
                } else {
                    TargetsDocument::from_data(&doc.data)?
                };
                let result = f(&mut targets)?;
                targets.touch();
                doc.data = targets.to_data()?;
                Ok(result)
            },
        )?;
        self.refresh_metrics(name)?;
        Ok(result)
    }

    fn refresh_metrics(&self, name: &str) -> QuireResult<()> {
        let path = self.path(name, CampaignFile::Metrics)?;
        self.modify_typed(&path, |metrics: &mut MetricsDocument| {
            let targets = self.load_targets(name)?;
            metrics.recompute(&targets);
            Ok(())
        })?;
        debug!(campaign = %name, "Recomputed campaign metrics");
        Ok(())
    }

    /// Add an inline target. Only legacy documents (or an empty reference
    /// document) accept inline targets.
    pub fn add_target(&self, name: &str, input: NewTarget) -> QuireResult<LegacyTarget> {
        let target = self.modify_targets(name, |targets| {
            if targets.is_reference() && !targets.is_empty() {
                return Err(QuireError::reference_targets(
                    "Campaign uses reference format - use add_target_by_prospect instead",
                ));
            }
            if let TargetsDocument::Reference(doc) = targets {
                let extra = std::mem::take(&mut doc.extra);
                *targets = TargetsDocument::Legacy(LegacyTargets {
                    version: 1,
                    last_updated: None,
                    targets: Vec::new(),
                    extra,
                });
            }
            let target = LegacyTarget::from_input(input);
            if let TargetsDocument::Legacy(doc) = targets {
                doc.targets.push(target.clone());
            }
            Ok(target)
        })?;
        info!(campaign = %name, target = %target.id, "Added inline target");
        Ok(target)
    }

    /// Add a reference target for an existing prospect. Legacy documents are
    /// replaced by a reference document holding only the new target.
    pub fn add_target_by_prospect(&self, name: &str, slug: &str) -> QuireResult<TargetRef> {
        if slug.is_empty() {
            return Err(QuireError::missing_field("prospect_slug"));
        }
        self.existing_dir(name)?;
        if !self.prospects.exists(slug) {
            return Err(QuireError::prospect_not_found(slug));
        }

        let target = self.modify_targets(name, |targets| {
            let target = TargetRef::new(slug);
            match targets {
                TargetsDocument::Reference(doc) => doc.target_references.push(target.clone()),
                TargetsDocument::Legacy(doc) => {
                    if !doc.targets.is_empty() {
                        warn!(
                            campaign = %name,
                            dropped = doc.targets.len(),
                            "Replacing legacy targets with reference format"
                        );
                    }
                    *targets =
                        TargetsDocument::Reference(ReferenceTargets::new(vec![target.clone()]));
                }
            }
            Ok(target)
        })?;
        info!(campaign = %name, prospect = %slug, target = %target.id, "Added target reference");
        Ok(target)
    }

    /// Administrative update of a target in either schema. Any stage may be
    /// set here.
    pub fn update_target(
        &self,
        name: &str,
        target_id: &str,
        update: &TargetUpdate,
    ) -> QuireResult<TargetRecord> {
        let record = self.modify_targets(name, |targets| match targets {
            TargetsDocument::Reference(doc) => doc
                .target_references
                .iter_mut()
                .find(|r| r.id == target_id)
                .map(|r| {
                    r.apply(update);
                    TargetRecord::Reference(r.clone())
                })
                .ok_or_else(|| QuireError::target_not_found(target_id)),
            TargetsDocument::Legacy(doc) => doc
                .targets
                .iter_mut()
                .find(|t| t.id == target_id)
                .map(|t| {
                    t.apply(update);
                    TargetRecord::Legacy(t.clone())
                })
                .ok_or_else(|| QuireError::target_not_found(target_id)),
        })?;
        info!(campaign = %name, target = %target_id, "Updated target");
        Ok(record)
    }

    /// Set a reference target's stage and mirror it onto its prospect. The
    /// prospect is written first; if the reference write then fails the
    /// prospect gets its previous stage back.
    pub fn update_target_stage_sync(
        &self,
        name: &str,
        target_id: &str,
        stage: Stage,
    ) -> QuireResult<TargetRef> {
        let TargetsDocument::Reference(doc) = self.load_targets(name)? else {
            return Err(QuireError::legacy_targets(
                "Campaign uses legacy format - use update_target instead",
            ));
        };
        let slug = doc
            .target_references
            .iter()
            .find(|r| r.id == target_id)
            .map(|r| r.prospect_slug.clone())
            .ok_or_else(|| QuireError::target_not_found(target_id))?;
        let previous = self.prospects.require(&slug)?.frontmatter.stage;

        self.prospects.set_stage(&slug, stage)?;

        let synced = self.modify_targets(name, |targets| {
            let TargetsDocument::Reference(doc) = targets else {
                return Err(QuireError::legacy_targets(
                    "Campaign uses legacy format - use update_target instead",
                ));
            };
            let target = doc
                .target_references
                .iter_mut()
                .find(|r| r.id == target_id && r.prospect_slug == slug)
                .ok_or_else(|| QuireError::target_not_found(target_id))?;
            target.campaign_stage = stage;
            Ok(target.clone())
        });

        let target = match synced {
            Ok(target) => target,
            Err(e) => {
                if let Err(restore) = self.prospects.set_stage(&slug, previous) {
                    warn!(
                        prospect = %slug,
                        stage = %previous,
                        error = %restore,
                        "Failed to restore prospect stage"
                    );
                }
                return Err(e);
            }
        };

        info!(
            campaign = %name,
            target = %target_id,
            prospect = %target.prospect_slug,
            stage = %stage,
            "Target stage synced to prospect"
        );
        Ok(target)
    }

    /// Record an outreach touch. Legacy targets keep the touch itself;
    /// reference targets count it and advance pre-contact stages.
    pub fn record_touch(&self, name: &str, target_id: &str, input: TouchInput) -> QuireResult<Touch> {
        let touch = self.modify_targets(name, |targets| match targets {
            TargetsDocument::Reference(doc) => {
                let target = doc
                    .target_references
                    .iter_mut()
                    .find(|r| r.id == target_id)
                    .ok_or_else(|| QuireError::target_not_found(target_id))?;
                let now = timestamp();
                target.record_touch(now.clone());
                Ok(Touch::from_input(TouchInput {
                    sent_at: Some(now),
                    status: None,
                    ..input
                }))
            }
            TargetsDocument::Legacy(doc) => {
                let target = doc
                    .targets
                    .iter_mut()
                    .find(|t| t.id == target_id)
                    .ok_or_else(|| QuireError::target_not_found(target_id))?;
                let touch = Touch::from_input(input);
                target.touches.push(touch.clone());
                Ok(touch)
            }
        })?;
        info!(campaign = %name, target = %target_id, channel = %touch.channel, "Recorded touch");
        Ok(touch)
    }

    /// Prepend an event to the campaign log.
    pub fn log_event(&self, name: &str, kind: &str, message: &str) -> QuireResult<LogEvent> {
        if kind.is_empty() {
            return Err(QuireError::missing_field("type"));
        }
        let path = self.path(name, CampaignFile::Log)?;
        let event = LogEvent::new(kind, message);
        let capacity = self.log_capacity;
        self.modify_typed(&path, |log: &mut LogDocument| {
            log.push(event.clone(), capacity);
            Ok(())
        })?;
        debug!(campaign = %name, kind = %kind, "Logged campaign event");
        Ok(event)
    }

    /// Every campaign folder that holds a config, sorted by folder name.
    pub fn list_campaigns(&self) -> QuireResult<Vec<CampaignSummary>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut folders: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir() && p.join(CampaignFile::Config.file_name()).exists())
            .filter(|p| {
                !p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'))
            })
            .collect();
        folders.sort();

        let mut campaigns = Vec::with_capacity(folders.len());
        for dir in folders {
            let folder = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let summary = match self.repo.load(Path::new(&folder).join(CampaignFile::Config.file_name())) {
                Ok(Some(doc)) => {
                    let text = |key: &str| doc.data.get(key).and_then(Value::as_str).map(str::to_string);
                    CampaignSummary {
                        name: text("name").unwrap_or_else(|| folder.clone()),
                        id: text("id"),
                        status: text("status").unwrap_or_else(|| "unknown".to_string()),
                        folder,
                    }
                }
                _ => CampaignSummary {
                    name: folder.clone(),
                    id: None,
                    status: "error".to_string(),
                    folder,
                },
            };
            campaigns.push(summary);
        }
        Ok(campaigns)
    }

    /// Raw document for one campaign file.
    pub fn read_file(&self, name: &str, file: CampaignFile) -> QuireResult<Document> {
        let path = self.path(name, file)?;
        self.repo
            .load(&path)?
            .ok_or_else(|| QuireError::file_not_found(self.repo.full_path(&path).display().to_string()))
    }

    pub fn config(&self, name: &str) -> QuireResult<CampaignConfig> {
        self.read_file(name, CampaignFile::Config)?.to_typed()
    }

    pub fn metrics(&self, name: &str) -> QuireResult<MetricsDocument> {
        let path = self.path(name, CampaignFile::Metrics)?;
        self.load_typed(&path)
    }

    pub fn log(&self, name: &str) -> QuireResult<LogDocument> {
        let path = self.path(name, CampaignFile::Log)?;
        self.load_typed(&path)
    }

    fn view(&self, targets: TargetsDocument) -> Vec<TargetView> {
        match targets {
            TargetsDocument::Legacy(doc) => doc.targets.into_iter().map(TargetView::Legacy).collect(),
            TargetsDocument::Reference(doc) => doc
                .target_references
                .into_iter()
                .map(|reference| {
                    let prospect = self.prospects.get(&reference.prospect_slug).ok().flatten();
                    TargetView::Reference {
                        reference,
                        prospect,
                    }
                })
                .collect(),
        }
    }

    /// All targets, reference targets resolved to their prospects.
    pub fn targets(&self, name: &str) -> QuireResult<Vec<TargetView>> {
        Ok(self.view(self.load_targets(name)?))
    }

    pub fn get_target(&self, name: &str, target_id: &str) -> QuireResult<TargetView> {
        self.targets(name)?
            .into_iter()
            .find(|t| t.id() == target_id)
            .ok_or_else(|| QuireError::target_not_found(target_id))
    }

    /// Targets whose name, email, company or title contains `query`.
    pub fn search_targets(&self, name: &str, query: &str) -> QuireResult<Vec<TargetView>> {
        Ok(self
            .targets(name)?
            .into_iter()
            .filter(|t| t.matches(query))
            .collect())
    }

    pub fn target_summary(&self, name: &str) -> QuireResult<TargetSummary> {
        Ok(self.load_targets(name)?.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignStatus;
    use crate::prospect::NewProspect;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, CampaignStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CampaignStore::from_config(&StoreConfig::at(dir.path()));
        (dir, store)
    }

    fn map(value: Value) -> JsonMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_campaign_slug() {
        assert_eq!(campaign_slug("Q1 Outreach!"), "q1-outreach-");
        assert_eq!(campaign_slug("spring-2026"), "spring-2026");
    }

    #[test]
    fn test_create_writes_all_files() {
        let (_dir, store) = store();
        let config = store
            .create("Q1 Outreach", &map(json!({"goal": "Book demos"})))
            .unwrap();
        assert_eq!(config.goal, "Book demos");

        let dir = store.campaign_dir("Q1 Outreach");
        for file in ["config.md", "targets.md", "sequence.md", "metrics.md", "log.md"] {
            assert!(dir.join(file).exists(), "missing {}", file);
        }

        let doc = store.read_file("Q1 Outreach", CampaignFile::Config).unwrap();
        assert_eq!(doc.markdown, "\n# Q1 Outreach\n\nCampaign goal: Book demos\n");
        assert!(store.load_targets("Q1 Outreach").unwrap().is_reference());

        let log = store.log("Q1 Outreach").unwrap();
        assert_eq!(log.events[0].kind, "CREATED");
        assert_eq!(log.events[0].message, "Campaign 'Q1 Outreach' created");
    }

    #[test]
    fn test_create_twice_fails() {
        let (_dir, store) = store();
        store.create("Dup", &JsonMap::new()).unwrap();
        let err = store.create("dup", &JsonMap::new()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_failed_create_leaves_nothing_behind() {
        let (dir, store) = store();
        let err = store
            .create_with("Half Built", |staged| {
                staged.save("config.md", &Document::new(JsonMap::new(), "# Half\n"))?;
                Err(QuireError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )))
            })
            .unwrap_err();
        assert!(matches!(err, QuireError::Io(_)));
        assert!(!store.campaign_dir("Half Built").exists());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("campaigns"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(leftovers.is_empty());
        assert!(store.list_campaigns().unwrap().is_empty());

        store.create("Half Built", &JsonMap::new()).unwrap();
        assert_eq!(store.targets("Half Built").unwrap().len(), 0);
        assert_eq!(store.list_campaigns().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_campaign() {
        let (_dir, store) = store();
        let err = store.log_event("nope", "NOTE", "x").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_config() {
        let (_dir, store) = store();
        store.create("Camp", &JsonMap::new()).unwrap();
        let config = store
            .update_config("Camp", &map(json!({"status": "active", "settings": {"auto_research": false}})))
            .unwrap();
        assert_eq!(config.status, CampaignStatus::Active);
        assert!(!config.settings.auto_research);
        assert!(config.last_updated.is_some());
        assert_eq!(store.config("Camp").unwrap(), config);
    }

    #[test]
    fn test_reference_flow_with_metrics() {
        let (_dir, store) = store();
        store.create("Camp", &JsonMap::new()).unwrap();
        let prospect = store
            .prospects()
            .create(NewProspect::new("Ann Lee", "ann@x.com"))
            .unwrap();

        let target = store.add_target_by_prospect("Camp", &prospect.slug).unwrap();
        assert_eq!(target.campaign_stage, Stage::Identified);

        store
            .record_touch("Camp", &target.id, TouchInput::default())
            .unwrap();
        let metrics = store.metrics("Camp").unwrap();
        assert_eq!(metrics.summary.total_targets, 1);
        assert_eq!(metrics.summary.emails_sent, 1);
        assert_eq!(metrics.summary.by_stage[&Stage::Contacted], 1);

        let synced = store
            .update_target_stage_sync("Camp", &target.id, Stage::Qualified)
            .unwrap();
        assert_eq!(synced.campaign_stage, Stage::Qualified);
        let prospect = store.prospects().require(&prospect.slug).unwrap();
        assert_eq!(prospect.frontmatter.stage, Stage::Qualified);

        let found = store.search_targets("Camp", "ann@").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_add_target_by_missing_prospect() {
        let (_dir, store) = store();
        store.create("Camp", &JsonMap::new()).unwrap();
        let err = store.add_target_by_prospect("Camp", "ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_legacy_flow() {
        let (_dir, store) = store();
        store.create("Camp", &JsonMap::new()).unwrap();
        let target = store
            .add_target(
                "Camp",
                NewTarget {
                    name: Some("Bo".to_string()),
                    email: Some("bo@x.com".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let touch = store
            .record_touch(
                "Camp",
                &target.id,
                TouchInput {
                    subject: Some("Hi".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(touch.channel, "email");
        assert_eq!(touch.kind, "outreach");

        let err = store
            .update_target_stage_sync("Camp", &target.id, Stage::Replied)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::SchLegacyTargets);

        let record = store
            .update_target(
                "Camp",
                &target.id,
                &TargetUpdate {
                    stage: Some(Stage::Identified),
                    company: Some("Bo Co".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let TargetRecord::Legacy(updated) = record else {
            panic!("expected legacy target");
        };
        assert_eq!(updated.company.as_deref(), Some("Bo Co"));
        assert_eq!(updated.touches.len(), 1);

        let summary = store.target_summary("Camp").unwrap();
        assert_eq!(summary.total_targets, 1);
        assert_eq!(store.metrics("Camp").unwrap().summary.emails_sent, 1);
    }

    #[test]
    fn test_unknown_target() {
        let (_dir, store) = store();
        store.create("Camp", &JsonMap::new()).unwrap();
        let err = store
            .update_target("Camp", "missing", &TargetUpdate::default())
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::NfTarget);
    }

    #[test]
    fn test_list_campaigns() {
        let (_dir, store) = store();
        assert!(store.list_campaigns().unwrap().is_empty());
        store.create("Beta", &JsonMap::new()).unwrap();
        store.create("Alpha", &map(json!({"status": "active"}))).unwrap();

        let campaigns = store.list_campaigns().unwrap();
        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[0].folder, "alpha");
        assert_eq!(campaigns[0].status, "active");
        assert_eq!(campaigns[1].name, "Beta");
    }
}
