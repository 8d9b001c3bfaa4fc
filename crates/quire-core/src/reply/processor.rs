//! Reply processing: find replies from campaign targets, classify them and
//! move targets along the pipeline.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::approval::run_command;
use crate::campaign::{campaign_slug, CampaignStore, Stage, TargetUpdate, TargetsDocument};
use crate::config::{MailConfig, StoreConfig};
use crate::document::repository::{read_json, update_json};
use crate::document::timestamp;
use crate::error::{QuireError, QuireResult};
use crate::reply::classifier::{classify, should_advance, Intent, ReplyAnalysis, Sentiment};

/// Processed message ids, inside the state folder.
pub const PROCESSED_REPLIES_FILE: &str = "processed_replies.json";

/// Most addresses put in one search query.
pub const MAX_QUERY_ADDRESSES: usize = 20;

/// Most messages requested per search.
pub const MAX_SEARCH_RESULTS: usize = 100;

static ANGLE_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>]+)>").unwrap());

/// A message returned by a mail search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailMessage {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Inbound mail collaborator.
#[async_trait]
pub trait MailSource: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> QuireResult<Vec<MailMessage>>;

    /// Full body of one message, if the source can provide it.
    async fn read_body(&self, id: &str) -> QuireResult<Option<String>>;
}

/// Mail source backed by external search/read programs.
#[derive(Debug, Clone)]
pub struct CommandMailSource {
    config: MailConfig,
    timeout: Duration,
}

impl CommandMailSource {
    pub fn new(config: MailConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// Source from the store configuration, if one is configured.
    pub fn from_config(config: &StoreConfig) -> Option<Self> {
        config.mail.clone().map(|mail| {
            Self::new(mail, Duration::from_secs(config.sender_timeout_secs))
        })
    }

    async fn call(&self, command: &crate::config::CommandSpec, input: Value) -> QuireResult<Value> {
        let stdout = tokio::time::timeout(self.timeout, run_command(command, &input))
            .await
            .map_err(|_| {
                QuireError::external_timeout(format!("Timeout running {}", command.program))
            })??;
        Ok(serde_json::from_str(stdout.trim())?)
    }
}

#[async_trait]
impl MailSource for CommandMailSource {
    async fn search(&self, query: &str, max_results: usize) -> QuireResult<Vec<MailMessage>> {
        let reply = self
            .call(
                &self.config.search,
                json!({"query": query, "max_results": max_results}),
            )
            .await?;
        let emails = reply.get("emails").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(emails)?)
    }

    async fn read_body(&self, id: &str) -> QuireResult<Option<String>> {
        let Some(read) = &self.config.read else {
            return Ok(None);
        };
        let reply = self.call(read, json!({"email_id": id})).await?;
        Ok(reply.get("body").and_then(Value::as_str).map(str::to_string))
    }
}

/// How a reply sender maps back to a campaign target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetContact {
    /// Campaign folder name.
    pub campaign: String,
    pub target_id: String,
    pub target_name: String,
    pub current_stage: Stage,
    /// Reference targets sync stages onto their prospect.
    pub reference: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyRequest {
    /// Only this campaign.
    pub campaign: Option<String>,
    pub hours_back: u32,
    pub dry_run: bool,
}

impl Default for ReplyRequest {
    fn default() -> Self {
        Self {
            campaign: None,
            hours_back: 24,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyDetail {
    pub email_id: String,
    pub from: String,
    pub target_name: String,
    pub campaign: String,
    pub subject: String,
    pub analysis: ReplyAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_updated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_stage: Option<Stage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub replies_found: usize,
    pub processed: usize,
    pub unsubscribes: usize,
    pub positive: usize,
    pub negative: usize,
    pub dry_run: bool,
    pub details: Vec<ReplyDetail>,
}

/// `state/processed_replies.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessedReplies {
    pub processed_ids: Vec<String>,
    pub last_updated: Option<String>,
}

/// Extract the bare, lower-cased address from `Name <a@b.c>`.
pub fn sender_address(from: &str) -> String {
    let lower = from.trim().to_lowercase();
    match ANGLE_ADDRESS.captures(&lower) {
        Some(caps) => caps[1].trim().to_string(),
        None => lower,
    }
}

/// Search query for replies from `addresses` in the last `hours_back` hours.
pub fn reply_query(addresses: &[&str], hours_back: u32) -> String {
    let from = addresses
        .iter()
        .map(|a| format!("from:{}", a))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("newer_than:{}h ({})", hours_back, from)
}

/// Classifies replies and applies their stage suggestions.
#[derive(Debug, Clone)]
pub struct ReplyProcessor {
    campaigns: CampaignStore,
    state_file: PathBuf,
    capacity: usize,
}

impl ReplyProcessor {
    pub fn new(campaigns: CampaignStore, state_dir: impl AsRef<Path>) -> Self {
        Self {
            campaigns,
            state_file: state_dir.as_ref().join(PROCESSED_REPLIES_FILE),
            capacity: 1000,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            capacity: config.processed_reply_capacity,
            ..Self::new(CampaignStore::from_config(config), config.state_path())
        }
    }

    /// Every target email across campaigns, keyed by lower-cased address.
    pub fn target_contacts(
        &self,
        campaign: Option<&str>,
    ) -> QuireResult<BTreeMap<String, TargetContact>> {
        let wanted = campaign.map(campaign_slug);
        let mut contacts = BTreeMap::new();

        for summary in self.campaigns.list_campaigns()? {
            if wanted.as_deref().is_some_and(|w| w != summary.folder) {
                continue;
            }
            let targets = match self.campaigns.load_targets(&summary.folder) {
                Ok(targets) => targets,
                Err(e) => {
                    debug!(campaign = %summary.folder, error = %e, "Skipping unreadable targets");
                    continue;
                }
            };

            match targets {
                TargetsDocument::Legacy(doc) => {
                    for target in doc.targets {
                        let Some(email) = target.email.filter(|e| !e.is_empty()) else {
                            continue;
                        };
                        contacts.insert(
                            email.to_lowercase(),
                            TargetContact {
                                campaign: summary.folder.clone(),
                                target_id: target.id,
                                target_name: target.name,
                                current_stage: target.stage,
                                reference: false,
                            },
                        );
                    }
                }
                TargetsDocument::Reference(doc) => {
                    for reference in doc.target_references {
                        let Ok(Some(prospect)) =
                            self.campaigns.prospects().get(&reference.prospect_slug)
                        else {
                            continue;
                        };
                        if prospect.frontmatter.email.is_empty() {
                            continue;
                        }
                        contacts.insert(
                            prospect.frontmatter.email.to_lowercase(),
                            TargetContact {
                                campaign: summary.folder.clone(),
                                target_id: reference.id,
                                target_name: prospect.frontmatter.name,
                                current_stage: reference.campaign_stage,
                                reference: true,
                            },
                        );
                    }
                }
            }
        }
        Ok(contacts)
    }

    fn processed_ids(&self) -> QuireResult<HashSet<String>> {
        let state: Option<ProcessedReplies> = match read_json(&self.state_file) {
            Ok(state) => state,
            Err(QuireError::Serialization(e)) => {
                warn!(error = %e, "Unreadable processed replies, starting fresh");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(state
            .map(|s| s.processed_ids.into_iter().collect())
            .unwrap_or_default())
    }

    fn remember(&self, ids: &[String]) -> QuireResult<()> {
        let capacity = self.capacity;
        update_json(&self.state_file, |state: &mut ProcessedReplies| {
            for id in ids {
                if !state.processed_ids.contains(id) {
                    state.processed_ids.push(id.clone());
                }
            }
            let excess = state.processed_ids.len().saturating_sub(capacity);
            state.processed_ids.drain(..excess);
            state.last_updated = Some(timestamp());
            Ok(())
        })
    }

    /// Move the target to `stage`, through the prospect for reference targets.
    fn apply_stage(&self, contact: &TargetContact, stage: Stage) -> QuireResult<()> {
        if contact.reference {
            self.campaigns
                .update_target_stage_sync(&contact.campaign, &contact.target_id, stage)?;
        } else {
            self.campaigns.update_target(
                &contact.campaign,
                &contact.target_id,
                &TargetUpdate {
                    stage: Some(stage),
                    ..Default::default()
                },
            )?;
        }
        Ok(())
    }

    fn mark_unsubscribed(&self, contact: &TargetContact) -> QuireResult<()> {
        self.campaigns.update_target(
            &contact.campaign,
            &contact.target_id,
            &TargetUpdate {
                unsubscribed: Some(true),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    /// Process recent replies. A dry run classifies without touching any
    /// target or the processed-id state.
    pub async fn process(
        &self,
        source: &dyn MailSource,
        request: &ReplyRequest,
    ) -> QuireResult<ReplyReport> {
        let mut report = ReplyReport {
            dry_run: request.dry_run,
            ..Default::default()
        };

        let mut contacts = self.target_contacts(request.campaign.as_deref())?;
        if contacts.is_empty() {
            report.message = Some("No campaign targets found".to_string());
            return Ok(report);
        }

        let addresses: Vec<&str> = contacts
            .keys()
            .take(MAX_QUERY_ADDRESSES)
            .map(String::as_str)
            .collect();
        let query = reply_query(&addresses, request.hours_back);
        let messages = source.search(&query, MAX_SEARCH_RESULTS).await?;
        report.replies_found = messages.len();
        if messages.is_empty() {
            report.message = Some("No replies found".to_string());
            return Ok(report);
        }

        let mut seen = self.processed_ids()?;
        let mut newly_processed = Vec::new();

        for message in &messages {
            if message.id.is_empty() || seen.contains(&message.id) {
                continue;
            }
            let from = sender_address(&message.from);
            let Some(contact) = contacts.get_mut(&from) else {
                continue;
            };

            let body = match source.read_body(&message.id).await {
                Ok(Some(body)) => body,
                Ok(None) => message.body.clone().unwrap_or_else(|| message.snippet.clone()),
                Err(e) => {
                    warn!(email_id = %message.id, error = %e, "Could not read reply, using snippet");
                    message.snippet.clone()
                }
            };
            let analysis = classify(&body);

            if analysis.intent == Intent::Unsubscribe {
                report.unsubscribes += 1;
            } else if analysis.sentiment == Sentiment::Positive {
                report.positive += 1;
            } else if analysis.sentiment == Sentiment::Negative {
                report.negative += 1;
            }

            let mut detail = ReplyDetail {
                email_id: message.id.clone(),
                from: from.clone(),
                target_name: contact.target_name.clone(),
                campaign: contact.campaign.clone(),
                subject: message.subject.clone(),
                analysis: analysis.clone(),
                stage_updated: None,
                new_stage: None,
            };

            if !request.dry_run {
                if let Some(stage) = analysis.suggested_stage {
                    if should_advance(contact.current_stage, stage) {
                        let applied = match self.apply_stage(contact, stage) {
                            Ok(()) => true,
                            Err(e) => {
                                warn!(
                                    campaign = %contact.campaign,
                                    target = %contact.target_id,
                                    error = %e,
                                    "Stage update from reply failed"
                                );
                                false
                            }
                        };
                        if applied {
                            contact.current_stage = stage;
                        }
                        detail.stage_updated = Some(applied);
                        detail.new_stage = applied.then_some(stage);
                    }
                }
                if analysis.intent == Intent::Unsubscribe {
                    if let Err(e) = self.mark_unsubscribed(contact) {
                        warn!(target = %contact.target_id, error = %e, "Could not mark unsubscribed");
                    }
                }
            }

            report.details.push(detail);
            report.processed += 1;
            seen.insert(message.id.clone());
            newly_processed.push(message.id.clone());
        }

        if !request.dry_run && !newly_processed.is_empty() {
            self.remember(&newly_processed)?;
        }

        info!(
            replies = report.replies_found,
            processed = report.processed,
            unsubscribes = report.unsubscribes,
            dry_run = request.dry_run,
            "Processed campaign replies"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_address() {
        assert_eq!(sender_address("Ann Lee <Ann@X.com>"), "ann@x.com");
        assert_eq!(sender_address(" BOB@x.com "), "bob@x.com");
    }

    #[test]
    fn test_reply_query() {
        assert_eq!(
            reply_query(&["a@x.com", "b@x.com"], 48),
            "newer_than:48h (from:a@x.com OR from:b@x.com)"
        );
    }

    #[test]
    fn test_remember_caps_ids() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at(dir.path());
        let mut processor = ReplyProcessor::from_config(&config);
        processor.capacity = 3;

        processor
            .remember(&["a".into(), "b".into(), "c".into()])
            .unwrap();
        processor.remember(&["c".into(), "d".into()]).unwrap();

        let ids = processor.processed_ids().unwrap();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains("a"));
        assert!(ids.contains("d"));
    }
}
