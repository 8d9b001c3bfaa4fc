//! Tool dispatch against the configured stores.

use quire_core::approval::{ApprovalQueue, SenderRegistry};
use quire_core::campaign::CampaignStore;
use quire_core::reply::{CommandMailSource, ReplyProcessor};
use quire_core::{LifeStore, QuireError, QuireResult, StoreConfig};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::tools::ToolRequest;

/// Stores shared by every tool.
pub struct Tools {
    config: StoreConfig,
    campaigns: CampaignStore,
    life: LifeStore,
    approvals: ApprovalQueue,
    senders: SenderRegistry,
}

impl Tools {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            campaigns: CampaignStore::from_config(&config),
            life: LifeStore::from_config(&config),
            approvals: ApprovalQueue::from_config(&config),
            senders: SenderRegistry::from_config(&config),
            config,
        }
    }

    /// Run one tool and return its result body.
    pub async fn call(&self, request: ToolRequest) -> QuireResult<Value> {
        match request {
            ToolRequest::LifeRead(input) => to_value(self.life.read(
                &input.file,
                input.path.as_deref(),
                input.query.as_deref(),
            )?),
            ToolRequest::LifeWrite(input) => to_value(self.life.write(&input)?),

            ToolRequest::CampaignCreate(input) => {
                let config = self.campaigns.create(&input.name, &input.config)?;
                info!(campaign = %input.name, "Campaign created");
                Ok(json!({ "campaign": config }))
            }
            ToolRequest::CampaignUpdateConfig(input) => {
                let config = self.campaigns.update_config(&input.campaign, &input.updates)?;
                Ok(json!({ "campaign": config }))
            }
            ToolRequest::CampaignList => {
                let campaigns = self.campaigns.list_campaigns()?;
                Ok(json!({ "total": campaigns.len(), "campaigns": campaigns }))
            }
            ToolRequest::CampaignRead(input) => {
                let doc = self.campaigns.read_file(&input.campaign, input.file)?;
                Ok(json!({
                    "campaign": input.campaign,
                    "file": input.file,
                    "data": doc.data,
                    "markdown": doc.markdown,
                }))
            }
            ToolRequest::CampaignTargets(input) => {
                if input.summary {
                    return to_value(self.campaigns.target_summary(&input.campaign)?);
                }
                let targets = match input.query.as_deref().filter(|q| !q.is_empty()) {
                    Some(query) => self.campaigns.search_targets(&input.campaign, query)?,
                    None => self.campaigns.targets(&input.campaign)?,
                };
                Ok(json!({ "total": targets.len(), "targets": targets }))
            }
            ToolRequest::CampaignGetTarget(input) => {
                let target = self.campaigns.get_target(&input.campaign, &input.target_id)?;
                Ok(json!({ "target": target }))
            }
            ToolRequest::CampaignAddTarget(input) => {
                let target = self.campaigns.add_target(&input.campaign, input.target)?;
                Ok(json!({ "target": target }))
            }
            ToolRequest::CampaignAddTargetByProspect(input) => {
                let target = self
                    .campaigns
                    .add_target_by_prospect(&input.campaign, &input.prospect_slug)?;
                Ok(json!({ "target": target }))
            }
            ToolRequest::CampaignUpdateTarget(input) => {
                let target =
                    self.campaigns
                        .update_target(&input.campaign, &input.target_id, &input.data)?;
                Ok(json!({ "target": target }))
            }
            ToolRequest::CampaignUpdateTargetStage(input) => {
                let target = self.campaigns.update_target_stage_sync(
                    &input.campaign,
                    &input.target_id,
                    input.stage,
                )?;
                Ok(json!({ "target": target }))
            }
            ToolRequest::CampaignRecordTouch(input) => {
                let touch = self
                    .campaigns
                    .record_touch(&input.campaign, &input.target_id, input.touch)?;
                Ok(json!({ "touch": touch }))
            }
            ToolRequest::CampaignLogEvent(input) => {
                let event = self
                    .campaigns
                    .log_event(&input.campaign, &input.kind, &input.message)?;
                Ok(json!({ "event": event }))
            }
            ToolRequest::MigrateTargetsToProspects(input) => to_value(
                self.campaigns
                    .migrate_targets_to_prospects(&input.campaign, input.dry_run)?,
            ),

            ToolRequest::ProspectCreate(input) => {
                let prospect = self.campaigns.prospects().create(input)?;
                Ok(json!({ "prospect": prospect }))
            }
            ToolRequest::ProspectUpdate(input) => {
                let prospect = self.campaigns.prospects().update(&input.slug, input.updates)?;
                Ok(json!({ "prospect": prospect }))
            }
            ToolRequest::ProspectGet(input) => {
                let prospect = self.campaigns.prospects().require(&input.slug)?;
                Ok(json!({ "prospect": prospect }))
            }
            ToolRequest::ProspectFind(input) => {
                let prospect = self.campaigns.prospects().find_by_email(&input.email)?;
                Ok(json!({ "found": prospect.is_some(), "prospect": prospect }))
            }
            ToolRequest::ProspectList => {
                let prospects = self.campaigns.prospects().list()?;
                Ok(json!({ "total": prospects.len(), "prospects": prospects }))
            }

            ToolRequest::QueueAction(input) => {
                let action = self.approvals.enqueue(input)?;
                Ok(json!({
                    "action_id": action.id,
                    "expires_at": action.expires_at,
                    "message": format!("Action queued for approval: {}", action.target_name),
                }))
            }
            ToolRequest::ApproveActions(selection) => to_value(self.approvals.approve(&selection)?),
            ToolRequest::ListPendingActions(input) => {
                let pending = self
                    .approvals
                    .list_pending(input.campaign_id.as_deref(), input.include_expired)?;
                Ok(json!({ "total": pending.len(), "pending": pending }))
            }
            ToolRequest::ExecuteApprovedActions(input) => to_value(
                self.approvals
                    .execute(&self.senders, &input.action_ids, input.dry_run)
                    .await?,
            ),

            ToolRequest::ProcessCampaignReplies(request) => {
                let source = CommandMailSource::from_config(&self.config).ok_or_else(|| {
                    QuireError::Configuration("No mail source configured".to_string())
                })?;
                let processor = ReplyProcessor::from_config(&self.config);
                to_value(processor.process(&source, &request).await?)
            }
        }
    }
}

fn to_value<T: Serialize>(value: T) -> QuireResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Wrap a tool result in the success envelope. Object results are merged;
/// anything else goes under `data`.
pub fn success(result: Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("status".to_string(), json!("success"));
    match result {
        Value::Object(map) => body.extend(map),
        other => {
            body.insert("data".to_string(), other);
        }
    }
    Value::Object(body)
}

/// Error envelope with the structured code and any suggestion.
pub fn failure(err: &QuireError) -> Value {
    let mut body = json!({
        "status": "error",
        "message": err.to_string(),
        "code": err.code().as_str(),
    });
    if let Some(suggestion) = err.suggestion() {
        body["suggestion"] = json!(suggestion);
    }
    body
}
