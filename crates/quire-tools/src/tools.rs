//! Tool request types.
//!
//! Every request is one JSON object on stdin whose `tool` field names the
//! operation; the remaining fields are that tool's input.

use quire_core::approval::{ApprovalSelection, NewAction};
use quire_core::campaign::{CampaignFile, NewTarget, Stage, TargetUpdate, TouchInput};
use quire_core::prospect::{NewProspect, ProspectUpdate};
use quire_core::reply::ReplyRequest;
use quire_core::{JsonMap, WriteRequest};
use serde::Deserialize;

/// A tool invocation.
#[derive(Debug, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    LifeRead(LifeReadInput),
    LifeWrite(WriteRequest),

    CampaignCreate(CampaignCreateInput),
    CampaignUpdateConfig(CampaignUpdateInput),
    CampaignList,
    CampaignRead(CampaignReadInput),
    CampaignTargets(CampaignTargetsInput),
    CampaignGetTarget(TargetInput),
    CampaignAddTarget(AddTargetInput),
    CampaignAddTargetByProspect(AddTargetByProspectInput),
    CampaignUpdateTarget(UpdateTargetInput),
    CampaignUpdateTargetStage(UpdateTargetStageInput),
    CampaignRecordTouch(RecordTouchInput),
    CampaignLogEvent(LogEventInput),
    MigrateTargetsToProspects(MigrateInput),

    ProspectCreate(NewProspect),
    ProspectUpdate(ProspectUpdateInput),
    ProspectGet(ProspectGetInput),
    ProspectFind(ProspectFindInput),
    ProspectList,

    QueueAction(NewAction),
    ApproveActions(ApprovalSelection),
    ListPendingActions(ListPendingInput),
    ExecuteApprovedActions(ExecuteInput),

    ProcessCampaignReplies(ReplyRequest),
}

/// Input for life_read.
#[derive(Debug, Deserialize)]
pub struct LifeReadInput {
    /// Logical key (`identity`, `contacts`, ...) or path under the life folder.
    pub file: String,
    /// Dotted path of a single field to return.
    #[serde(default)]
    pub path: Option<String>,
    /// Case-insensitive search term.
    #[serde(default)]
    pub query: Option<String>,
}

/// Input for campaign_create.
#[derive(Debug, Deserialize)]
pub struct CampaignCreateInput {
    pub name: String,
    /// Overrides for `owner_phone`, `goal`, `status`, `audience`,
    /// `channels` and `settings`.
    #[serde(default, flatten)]
    pub config: JsonMap,
}

/// Input for campaign_update_config.
#[derive(Debug, Deserialize)]
pub struct CampaignUpdateInput {
    pub campaign: String,
    #[serde(default)]
    pub updates: JsonMap,
}

/// Input for campaign_read.
#[derive(Debug, Deserialize)]
pub struct CampaignReadInput {
    pub campaign: String,
    /// `config`, `targets`, `sequence`, `metrics` or `log`.
    #[serde(default = "default_campaign_file")]
    pub file: CampaignFile,
}

fn default_campaign_file() -> CampaignFile {
    CampaignFile::Config
}

/// Input for campaign_targets.
#[derive(Debug, Deserialize)]
pub struct CampaignTargetsInput {
    pub campaign: String,
    /// Only targets matching this text.
    #[serde(default)]
    pub query: Option<String>,
    /// Return stage counts instead of targets.
    #[serde(default)]
    pub summary: bool,
}

/// Input for campaign_get_target.
#[derive(Debug, Deserialize)]
pub struct TargetInput {
    pub campaign: String,
    pub target_id: String,
}

/// Input for campaign_add_target.
#[derive(Debug, Deserialize)]
pub struct AddTargetInput {
    pub campaign: String,
    #[serde(default)]
    pub target: NewTarget,
}

/// Input for campaign_add_target_by_prospect.
#[derive(Debug, Deserialize)]
pub struct AddTargetByProspectInput {
    pub campaign: String,
    pub prospect_slug: String,
}

/// Input for campaign_update_target.
#[derive(Debug, Deserialize)]
pub struct UpdateTargetInput {
    pub campaign: String,
    pub target_id: String,
    #[serde(default)]
    pub data: TargetUpdate,
}

/// Input for campaign_update_target_stage.
#[derive(Debug, Deserialize)]
pub struct UpdateTargetStageInput {
    pub campaign: String,
    pub target_id: String,
    pub stage: Stage,
}

/// Input for campaign_record_touch.
#[derive(Debug, Deserialize)]
pub struct RecordTouchInput {
    pub campaign: String,
    pub target_id: String,
    #[serde(default)]
    pub touch: TouchInput,
}

/// Input for campaign_log_event.
#[derive(Debug, Deserialize)]
pub struct LogEventInput {
    pub campaign: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// Input for migrate_targets_to_prospects.
#[derive(Debug, Deserialize)]
pub struct MigrateInput {
    pub campaign: String,
    #[serde(default)]
    pub dry_run: bool,
}

/// Input for prospect_update.
#[derive(Debug, Deserialize)]
pub struct ProspectUpdateInput {
    pub slug: String,
    #[serde(default)]
    pub updates: ProspectUpdate,
}

/// Input for prospect_get.
#[derive(Debug, Deserialize)]
pub struct ProspectGetInput {
    pub slug: String,
}

/// Input for prospect_find.
#[derive(Debug, Deserialize)]
pub struct ProspectFindInput {
    pub email: String,
}

/// Input for list_pending_actions.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListPendingInput {
    pub campaign_id: Option<String>,
    pub include_expired: bool,
}

/// Input for execute_approved_actions.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExecuteInput {
    /// Only these actions; empty means every approved action.
    pub action_ids: Vec<String>,
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_requests() {
        let request: ToolRequest =
            serde_json::from_str(r#"{"tool": "campaign_log_event", "campaign": "Q1", "type": "NOTE"}"#)
                .unwrap();
        match request {
            ToolRequest::CampaignLogEvent(input) => {
                assert_eq!(input.kind, "NOTE");
                assert_eq!(input.message, "");
            }
            other => panic!("unexpected request: {:?}", other),
        }

        let request: ToolRequest = serde_json::from_str(r#"{"tool": "campaign_list"}"#).unwrap();
        assert!(matches!(request, ToolRequest::CampaignList));

        let request: ToolRequest = serde_json::from_str(
            r#"{"tool": "life_write", "file": "contacts", "operation": "append", "path": "contacts", "value": {"name": "Sam"}}"#,
        )
        .unwrap();
        assert!(matches!(request, ToolRequest::LifeWrite(_)));
    }

    #[test]
    fn test_campaign_create_collects_overrides() {
        let request: ToolRequest = serde_json::from_str(
            r#"{"tool": "campaign_create", "name": "Q1", "goal": "Book demos"}"#,
        )
        .unwrap();
        let ToolRequest::CampaignCreate(input) = request else {
            panic!("expected campaign_create");
        };
        assert_eq!(input.name, "Q1");
        assert_eq!(input.config["goal"], serde_json::json!("Book demos"));
        assert!(!input.config.contains_key("tool"));
    }

    #[test]
    fn test_unknown_tool_rejected() {
        assert!(serde_json::from_str::<ToolRequest>(r#"{"tool": "format_drive"}"#).is_err());
    }
}
