//! Campaign targets: the legacy inline schema and the reference schema.
//!
//! Version 1 documents embed every prospect field in the target itself.
//! Version 2 documents only hold [`TargetRef`]s pointing at prospect files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::campaign::Stage;
use crate::document::{timestamp, JsonMap};
use crate::error::{QuireError, QuireResult};
use crate::prospect::Prospect;

fn default_channel() -> String {
    "email".to_string()
}

fn default_touch_type() -> String {
    "outreach".to_string()
}

fn default_touch_status() -> String {
    "sent".to_string()
}

fn default_target_name() -> String {
    "Unknown".to_string()
}

/// A recorded outreach attempt on a legacy target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touch {
    pub id: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(rename = "type", default = "default_touch_type")]
    pub kind: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub sent_at: String,
    #[serde(default = "default_touch_status")]
    pub status: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Caller input for a touch; missing fields take defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchInput {
    pub channel: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub subject: Option<String>,
    pub body_preview: Option<String>,
    pub sent_at: Option<String>,
    pub status: Option<String>,
    pub message_id: Option<String>,
}

impl Touch {
    pub fn from_input(input: TouchInput) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: input.channel.unwrap_or_else(default_channel),
            kind: input.kind.unwrap_or_else(default_touch_type),
            subject: input.subject,
            body_preview: input.body_preview,
            sent_at: input.sent_at.unwrap_or_else(timestamp),
            status: input.status.unwrap_or_else(default_touch_status),
            message_id: input.message_id,
            extra: JsonMap::new(),
        }
    }
}

/// Version 1 target with inline prospect data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTarget {
    pub id: String,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default = "default_target_name")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Free-form research, usually `{summary, news: [..]}`.
    #[serde(default)]
    pub research: Option<Value>,
    #[serde(default)]
    pub notes: Option<Value>,
    #[serde(default)]
    pub touches: Vec<Touch>,
    #[serde(default)]
    pub next_action: Option<Value>,
    #[serde(default)]
    pub unsubscribed: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub stage_changed_at: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Caller input for a new legacy target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTarget {
    pub stage: Option<Stage>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub research: Option<Value>,
    pub notes: Option<Value>,
}

impl LegacyTarget {
    pub fn from_input(input: NewTarget) -> Self {
        let now = timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stage: input.stage.unwrap_or_default(),
            name: input.name.unwrap_or_else(default_target_name),
            email: input.email,
            linkedin: input.linkedin,
            phone: input.phone,
            company: input.company,
            title: input.title,
            research: input.research,
            notes: input.notes,
            touches: Vec::new(),
            next_action: None,
            unsubscribed: false,
            created_at: now.clone(),
            stage_changed_at: Some(now),
            extra: JsonMap::new(),
        }
    }

    /// Apply the fields a legacy target accepts. A stage change stamps
    /// `stage_changed_at`. Returns whether the stage changed.
    pub fn apply(&mut self, update: &TargetUpdate) -> bool {
        let old_stage = self.stage;
        if let Some(stage) = update.stage {
            self.stage = stage;
        }
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        for (field, value) in [
            (&mut self.email, &update.email),
            (&mut self.linkedin, &update.linkedin),
            (&mut self.phone, &update.phone),
            (&mut self.company, &update.company),
            (&mut self.title, &update.title),
        ] {
            if value.is_some() {
                *field = value.clone();
            }
        }
        for (field, value) in [
            (&mut self.research, &update.research),
            (&mut self.notes, &update.notes),
            (&mut self.next_action, &update.next_action),
        ] {
            if value.is_some() {
                *field = value.clone();
            }
        }
        if let Some(unsubscribed) = update.unsubscribed {
            self.unsubscribed = unsubscribed;
        }

        let changed = self.stage != old_stage;
        if changed {
            self.stage_changed_at = Some(timestamp());
        }
        changed
    }

    /// Text searched by target queries.
    fn haystack(&self) -> String {
        [
            Some(self.name.as_str()),
            self.email.as_deref(),
            self.company.as_deref(),
            self.title.as_deref(),
        ]
        .iter()
        .map(|s| s.unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }
}

/// Version 2 target: a pointer to a prospect plus campaign-local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRef {
    pub id: String,
    pub prospect_slug: String,
    #[serde(default)]
    pub added_at: String,
    #[serde(default)]
    pub last_touch_at: Option<String>,
    #[serde(default)]
    pub touch_count: u32,
    #[serde(default)]
    pub campaign_stage: Stage,
    #[serde(default)]
    pub unsubscribed: bool,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl TargetRef {
    pub fn new(prospect_slug: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prospect_slug: prospect_slug.into(),
            added_at: timestamp(),
            last_touch_at: None,
            touch_count: 0,
            campaign_stage: Stage::Identified,
            unsubscribed: false,
            extra: JsonMap::new(),
        }
    }

    /// Apply the fields a reference target accepts.
    pub fn apply(&mut self, update: &TargetUpdate) {
        if let Some(stage) = update.campaign_stage {
            self.campaign_stage = stage;
        }
        if let Some(unsubscribed) = update.unsubscribed {
            self.unsubscribed = unsubscribed;
        }
        if update.last_touch_at.is_some() {
            self.last_touch_at = update.last_touch_at.clone();
        }
        if let Some(count) = update.touch_count {
            self.touch_count = count;
        }
    }

    /// Count a touch sent now. Pre-contact stages advance to `contacted`.
    pub fn record_touch(&mut self, at: String) {
        self.last_touch_at = Some(at);
        self.touch_count += 1;
        if self.campaign_stage.is_pre_contact() {
            self.campaign_stage = Stage::Contacted;
        }
    }
}

/// Administrative target update. Legacy targets read `stage` and the
/// contact fields; reference targets read `campaign_stage`,
/// `unsubscribed`, `last_touch_at` and `touch_count`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetUpdate {
    pub stage: Option<Stage>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub research: Option<Value>,
    pub notes: Option<Value>,
    pub next_action: Option<Value>,
    pub unsubscribed: Option<bool>,
    pub campaign_stage: Option<Stage>,
    pub last_touch_at: Option<String>,
    pub touch_count: Option<u32>,
}

/// `targets.md` frontmatter, version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTargets {
    #[serde(default = "legacy_version")]
    pub version: i64,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub targets: Vec<LegacyTarget>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

fn legacy_version() -> i64 {
    1
}

fn reference_version() -> i64 {
    2
}

/// `targets.md` frontmatter, version 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTargets {
    #[serde(default = "reference_version")]
    pub version: i64,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub target_references: Vec<TargetRef>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl ReferenceTargets {
    pub fn new(target_references: Vec<TargetRef>) -> Self {
        Self {
            version: 2,
            last_updated: Some(timestamp()),
            target_references,
            extra: JsonMap::new(),
        }
    }
}

/// Either targets schema. Detection is by the presence of
/// `target_references`.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetsDocument {
    Legacy(LegacyTargets),
    Reference(ReferenceTargets),
}

impl TargetsDocument {
    /// Empty reference document, used for new campaigns.
    pub fn new_reference() -> Self {
        TargetsDocument::Reference(ReferenceTargets::new(Vec::new()))
    }

    pub fn from_data(data: &JsonMap) -> QuireResult<Self> {
        let value = Value::Object(data.clone());
        if data.contains_key("target_references") {
            Ok(TargetsDocument::Reference(serde_json::from_value(value)?))
        } else {
            Ok(TargetsDocument::Legacy(serde_json::from_value(value)?))
        }
    }

    pub fn to_data(&self) -> QuireResult<JsonMap> {
        let value = match self {
            TargetsDocument::Legacy(doc) => serde_json::to_value(doc)?,
            TargetsDocument::Reference(doc) => serde_json::to_value(doc)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(QuireError::Internal(
                "targets document did not serialize to an object".to_string(),
            )),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TargetsDocument::Reference(_))
    }

    pub fn len(&self) -> usize {
        match self {
            TargetsDocument::Legacy(doc) => doc.targets.len(),
            TargetsDocument::Reference(doc) => doc.target_references.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn touch(&mut self) {
        let now = Some(timestamp());
        match self {
            TargetsDocument::Legacy(doc) => doc.last_updated = now,
            TargetsDocument::Reference(doc) => doc.last_updated = now,
        }
    }

    /// Target count per stage.
    pub fn by_stage(&self) -> BTreeMap<Stage, u64> {
        let mut counts = BTreeMap::new();
        let stages: Vec<Stage> = match self {
            TargetsDocument::Legacy(doc) => doc.targets.iter().map(|t| t.stage).collect(),
            TargetsDocument::Reference(doc) => doc
                .target_references
                .iter()
                .map(|r| r.campaign_stage)
                .collect(),
        };
        for stage in stages {
            *counts.entry(stage).or_insert(0) += 1;
        }
        counts
    }

    /// Emails sent: legacy documents count email touches, reference
    /// documents sum `touch_count`.
    pub fn emails_sent(&self) -> u64 {
        match self {
            TargetsDocument::Legacy(doc) => doc
                .targets
                .iter()
                .flat_map(|t| t.touches.iter())
                .filter(|touch| touch.channel == "email")
                .count() as u64,
            TargetsDocument::Reference(doc) => doc
                .target_references
                .iter()
                .map(|r| u64::from(r.touch_count))
                .sum(),
        }
    }

    pub fn summary(&self) -> TargetSummary {
        TargetSummary {
            total_targets: self.len() as u64,
            by_stage: self.by_stage(),
        }
    }
}

/// Count of targets, total and per stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub total_targets: u64,
    pub by_stage: BTreeMap<Stage, u64>,
}

/// A target as returned by updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetRecord {
    Legacy(LegacyTarget),
    Reference(TargetRef),
}

/// A target as returned by reads; reference targets carry their prospect
/// when it exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TargetView {
    Legacy(LegacyTarget),
    Reference {
        #[serde(flatten)]
        reference: TargetRef,
        prospect: Option<Prospect>,
    },
}

impl TargetView {
    pub fn id(&self) -> &str {
        match self {
            TargetView::Legacy(t) => &t.id,
            TargetView::Reference { reference, .. } => &reference.id,
        }
    }

    /// Case-insensitive match over name, email, company and title.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        match self {
            TargetView::Legacy(t) => t.haystack().contains(&needle),
            TargetView::Reference {
                reference,
                prospect,
            } => {
                let mut haystack = reference.prospect_slug.to_lowercase();
                if let Some(p) = prospect {
                    let fm = &p.frontmatter;
                    for part in [
                        Some(fm.name.as_str()),
                        Some(fm.email.as_str()),
                        fm.company.as_deref(),
                        fm.title.as_deref(),
                    ]
                    .into_iter()
                    .flatten()
                    {
                        haystack.push(' ');
                        haystack.push_str(&part.to_lowercase());
                    }
                }
                haystack.contains(&needle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> JsonMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_detects_schema() {
        let legacy = TargetsDocument::from_data(&map(json!({"version": 1, "targets": []}))).unwrap();
        assert!(!legacy.is_reference());

        let empty = TargetsDocument::from_data(&JsonMap::new()).unwrap();
        assert!(!empty.is_reference());
        assert!(empty.is_empty());

        let reference =
            TargetsDocument::from_data(&map(json!({"version": 2, "target_references": []})))
                .unwrap();
        assert!(reference.is_reference());
    }

    #[test]
    fn test_legacy_defaults_and_extras_preserved() {
        let data = map(json!({
            "version": 1,
            "custom": "kept",
            "targets": [{"id": "t1", "email": "a@b.c", "score": 7}]
        }));
        let doc = TargetsDocument::from_data(&data).unwrap();
        let TargetsDocument::Legacy(legacy) = &doc else {
            panic!("expected legacy");
        };
        assert_eq!(legacy.targets[0].name, "Unknown");
        assert_eq!(legacy.targets[0].stage, Stage::Identified);

        let out = doc.to_data().unwrap();
        assert_eq!(out["custom"], json!("kept"));
        assert_eq!(out["targets"][0]["score"], json!(7));
    }

    #[test]
    fn test_legacy_apply_stamps_stage_change() {
        let mut target = LegacyTarget::from_input(NewTarget::default());
        target.stage_changed_at = None;

        let changed = target.apply(&TargetUpdate {
            notes: Some(json!("call back")),
            ..Default::default()
        });
        assert!(!changed);
        assert!(target.stage_changed_at.is_none());

        let changed = target.apply(&TargetUpdate {
            stage: Some(Stage::Replied),
            ..Default::default()
        });
        assert!(changed);
        assert!(target.stage_changed_at.is_some());
    }

    #[test]
    fn test_reference_record_touch_advances() {
        let mut r = TargetRef::new("ann");
        r.record_touch("2026-01-01T00:00:00Z".to_string());
        assert_eq!(r.campaign_stage, Stage::Contacted);
        assert_eq!(r.touch_count, 1);

        r.campaign_stage = Stage::Qualified;
        r.record_touch("2026-01-02T00:00:00Z".to_string());
        assert_eq!(r.campaign_stage, Stage::Qualified);
        assert_eq!(r.touch_count, 2);
    }

    #[test]
    fn test_rollups() {
        let mut a = TargetRef::new("a");
        a.touch_count = 2;
        let mut b = TargetRef::new("b");
        b.touch_count = 3;
        b.campaign_stage = Stage::Replied;
        let doc = TargetsDocument::Reference(ReferenceTargets::new(vec![a, b]));

        assert_eq!(doc.emails_sent(), 5);
        let summary = doc.summary();
        assert_eq!(summary.total_targets, 2);
        assert_eq!(summary.by_stage[&Stage::Replied], 1);
        assert_eq!(
            serde_json::to_value(&summary).unwrap()["by_stage"],
            json!({"identified": 1, "replied": 1})
        );
    }

    #[test]
    fn test_target_view_matches() {
        let mut target = LegacyTarget::from_input(NewTarget::default());
        target.company = Some("Acme Widgets".to_string());
        assert!(TargetView::Legacy(target).matches("widgets"));

        let view = TargetView::Reference {
            reference: TargetRef::new("jane-doe"),
            prospect: None,
        };
        assert!(view.matches("JANE"));
        assert!(!view.matches("acme"));
    }
}
