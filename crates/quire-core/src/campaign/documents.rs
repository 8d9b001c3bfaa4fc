//! Metrics, log and sequence documents of a campaign.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::campaign::targets::TargetsDocument;
use crate::campaign::Stage;
use crate::document::{timestamp, JsonMap};

/// The five documents of a campaign folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignFile {
    Config,
    Targets,
    Sequence,
    Metrics,
    Log,
}

impl CampaignFile {
    pub fn file_name(&self) -> String {
        format!("{}.md", self)
    }
}

/// Derived rollup. Never patched directly; see [`MetricsDocument::recompute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSummary {
    pub total_targets: u64,
    pub by_stage: BTreeMap<Stage, u64>,
    pub emails_sent: u64,
    pub emails_opened: u64,
    pub replies_received: u64,
    pub meetings_booked: u64,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// `metrics.md` frontmatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsDocument {
    #[serde(default = "one")]
    pub version: i64,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub summary: MetricsSummary,
    #[serde(default)]
    pub daily: Vec<Value>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

fn one() -> i64 {
    1
}

impl Default for MetricsDocument {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: Some(timestamp()),
            summary: MetricsSummary::default(),
            daily: Vec::new(),
            extra: JsonMap::new(),
        }
    }
}

impl MetricsDocument {
    /// Rebuild the target-derived counters from the targets document.
    pub fn recompute(&mut self, targets: &TargetsDocument) {
        self.summary.total_targets = targets.len() as u64;
        self.summary.by_stage = targets.by_stage();
        self.summary.emails_sent = targets.emails_sent();
        self.last_updated = Some(timestamp());
    }
}

/// One entry in the campaign log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl LogEvent {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp(),
            kind: kind.into(),
            message: message.into(),
            extra: JsonMap::new(),
        }
    }
}

/// `log.md` frontmatter. Events are newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    #[serde(default = "one")]
    pub version: i64,
    #[serde(default)]
    pub events: Vec<LogEvent>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Default for LogDocument {
    fn default() -> Self {
        Self {
            version: 1,
            events: Vec::new(),
            extra: JsonMap::new(),
        }
    }
}

impl LogDocument {
    /// Insert `event` at the front, dropping the oldest beyond `capacity`.
    pub fn push(&mut self, event: LogEvent, capacity: usize) {
        self.events.insert(0, event);
        self.events.truncate(capacity);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInfo {
    pub name: Stage,
    pub description: String,
}

/// `sequence.md` frontmatter: the stage list plus outreach templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDocument {
    #[serde(default = "one")]
    pub version: i64,
    #[serde(default)]
    pub stages: Vec<StageInfo>,
    #[serde(default)]
    pub sequences: Vec<Value>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Default for SequenceDocument {
    fn default() -> Self {
        Self {
            version: 1,
            stages: Stage::ALL
                .iter()
                .map(|stage| StageInfo {
                    name: *stage,
                    description: stage.description().to_string(),
                })
                .collect(),
            sequences: Vec::new(),
            extra: JsonMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::targets::{LegacyTarget, LegacyTargets, NewTarget, Touch, TouchInput};

    #[test]
    fn test_campaign_file_names() {
        assert_eq!(CampaignFile::Targets.file_name(), "targets.md");
        assert_eq!("log".parse::<CampaignFile>().unwrap(), CampaignFile::Log);
    }

    #[test]
    fn test_log_capped_newest_first() {
        let mut log = LogDocument::default();
        for i in 0..1001 {
            log.push(LogEvent::new("NOTE", format!("event {}", i)), 1000);
        }
        assert_eq!(log.events.len(), 1000);
        assert_eq!(log.events[0].message, "event 1000");
        assert_eq!(log.events[999].message, "event 1");
    }

    #[test]
    fn test_recompute_legacy_counts_email_touches() {
        let mut target = LegacyTarget::from_input(NewTarget::default());
        target.touches.push(Touch::from_input(TouchInput::default()));
        target.touches.push(Touch::from_input(TouchInput {
            channel: Some("sms".to_string()),
            ..Default::default()
        }));
        let targets = TargetsDocument::Legacy(LegacyTargets {
            version: 1,
            last_updated: None,
            targets: vec![target],
            extra: JsonMap::new(),
        });

        let mut metrics = MetricsDocument::default();
        metrics.summary.meetings_booked = 4;
        metrics.recompute(&targets);
        assert_eq!(metrics.summary.total_targets, 1);
        assert_eq!(metrics.summary.emails_sent, 1);
        assert_eq!(metrics.summary.by_stage[&Stage::Identified], 1);
        assert_eq!(metrics.summary.meetings_booked, 4);
    }

    #[test]
    fn test_sequence_default_stages() {
        let seq = SequenceDocument::default();
        assert_eq!(seq.stages.len(), 8);
        assert_eq!(seq.stages[7].name, Stage::Lost);
        assert!(seq.sequences.is_empty());
    }
}
