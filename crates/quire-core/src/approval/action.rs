//! Queued outreach actions and the approval queue document.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{Display, EnumString};

use crate::document::{timestamp, JsonMap};
use crate::error::{QuireError, QuireResult};

/// Lifecycle of a queued action. Expiry is derived from `expires_at`, not
/// stored.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    Approved,
    /// Claimed by one `execute` run while it sends.
    Executing,
    Executed,
}

/// Where an action is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Email,
    Linkedin,
    Sms,
    Call,
}

impl Route {
    /// Channel name used to look up a sender.
    pub fn channel(&self) -> &'static str {
        match self {
            Route::Email => "email",
            Route::Linkedin => "linkedin",
            Route::Sms => "sms",
            Route::Call => "call",
        }
    }
}

/// An action awaiting approval or execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    pub campaign_id: String,
    #[serde(default)]
    pub campaign_name: String,
    pub target_id: String,
    pub target_name: String,
    #[serde(default)]
    pub target_email: Option<String>,
    #[serde(default)]
    pub target_linkedin: Option<String>,
    #[serde(default)]
    pub target_phone: Option<String>,
    /// `send_email`, `send_linkedin`, `send_sms` or `call`.
    pub action_type: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub reasoning: String,
    pub queued_at: String,
    #[serde(default)]
    pub expires_at: String,
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<String>,
    /// Error from the most recent failed execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<String>,
    /// Run id of the `execute` call holding the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Caller input for [`crate::approval::ApprovalQueue::enqueue`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAction {
    pub campaign_id: String,
    pub campaign_name: String,
    pub target_id: String,
    pub target_name: String,
    pub target_email: Option<String>,
    pub target_linkedin: Option<String>,
    pub target_phone: Option<String>,
    pub action_type: String,
    /// Defaults to `action_type` without its `send_` prefix.
    pub channel: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    pub reasoning: String,
}

impl QueuedAction {
    /// Validate `input` and stamp id, queue time and expiry.
    pub fn from_input(input: NewAction, ttl: Duration) -> QuireResult<Self> {
        for (field, value) in [
            ("campaign_id", &input.campaign_id),
            ("target_id", &input.target_id),
            ("target_name", &input.target_name),
            ("action_type", &input.action_type),
            ("body", &input.body),
        ] {
            if value.is_empty() {
                return Err(QuireError::missing_field(field));
            }
        }

        let now = Utc::now();
        let channel = input
            .channel
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| input.action_type.replace("send_", ""));

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            campaign_id: input.campaign_id,
            campaign_name: input.campaign_name,
            target_id: input.target_id,
            target_name: input.target_name,
            target_email: input.target_email,
            target_linkedin: input.target_linkedin,
            target_phone: input.target_phone,
            action_type: input.action_type,
            channel,
            subject: input.subject,
            body: input.body,
            reasoning: input.reasoning,
            queued_at: format_time(now),
            expires_at: format_time(now + ttl),
            status: ActionStatus::Pending,
            approved_at: None,
            executed_at: None,
            last_error: None,
            last_attempt: None,
            claimed_by: None,
            claimed_at: None,
            extra: JsonMap::new(),
        })
    }

    /// Expiry time, if `expires_at` parses.
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Actions without a readable expiry never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires().is_some_and(|expires| expires <= now)
    }

    /// A claim older than `ttl` belongs to a run that never finished.
    /// Unreadable claim times count as stale.
    pub fn claim_is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.claimed_at
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map_or(true, |t| t.with_timezone(&Utc) + ttl <= now)
    }

    pub(crate) fn claim(&mut self, run_id: &str, now: DateTime<Utc>) {
        self.status = ActionStatus::Executing;
        self.claimed_by = Some(run_id.to_string());
        self.claimed_at = Some(format_time(now));
    }

    /// Whether `execute` may pick this action up.
    pub fn is_ready(&self, now: DateTime<Utc>, claim_ttl: Duration) -> bool {
        match self.status {
            ActionStatus::Approved => true,
            ActionStatus::Executing => self.claim_is_stale(now, claim_ttl),
            _ => false,
        }
    }

    /// Delivery route by action type, falling back to the channel.
    pub fn route(&self) -> Option<Route> {
        match (self.action_type.as_str(), self.channel.as_str()) {
            ("send_email", _) | (_, "email") => Some(Route::Email),
            ("send_linkedin", _) | (_, "linkedin") => Some(Route::Linkedin),
            ("send_sms", _) | (_, "sms") => Some(Route::Sms),
            ("call", _) | (_, "call") => Some(Route::Call),
            _ => None,
        }
    }

    /// Sender input for `route`.
    pub fn payload(&self, route: Route) -> Value {
        match route {
            Route::Email => json!({
                "to": self.target_email,
                "subject": self.subject.clone().unwrap_or_default(),
                "body": self.body,
            }),
            Route::Linkedin => json!({
                "profile_url": self.target_linkedin,
                "message": self.body,
            }),
            Route::Sms | Route::Call => json!({
                "to": self.target_phone,
                "body": self.body,
            }),
        }
    }
}

/// Approval history row, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub action_type: String,
    pub target_name: String,
    pub status: ActionStatus,
    #[serde(default)]
    pub approved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// `state/pending_approvals.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDocument {
    #[serde(default = "one")]
    pub version: i64,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub pending: Vec<QueuedAction>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

fn one() -> i64 {
    1
}

impl Default for ApprovalDocument {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: Some(timestamp()),
            pending: Vec::new(),
            history: Vec::new(),
            extra: JsonMap::new(),
        }
    }
}

/// Listing row for a pending action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSummary {
    pub id: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub target_id: String,
    pub target_name: String,
    pub target_email: Option<String>,
    pub action_type: String,
    pub channel: String,
    pub subject: Option<String>,
    pub body_preview: String,
    pub reasoning: String,
    pub queued_at: String,
    /// `2 days`, `5 hours`, `expired` or `unknown`.
    pub expires_in: String,
}

impl PendingSummary {
    pub fn from_action(action: &QueuedAction, now: DateTime<Utc>) -> Self {
        Self {
            id: action.id.clone(),
            campaign_id: action.campaign_id.clone(),
            campaign_name: action.campaign_name.clone(),
            target_id: action.target_id.clone(),
            target_name: action.target_name.clone(),
            target_email: action.target_email.clone(),
            action_type: action.action_type.clone(),
            channel: action.channel.clone(),
            subject: action.subject.clone(),
            body_preview: body_preview(&action.body),
            reasoning: action.reasoning.clone(),
            queued_at: action.queued_at.clone(),
            expires_in: action
                .expires()
                .map(|expires| expires_in(expires - now))
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// First 100 characters, with `...` when truncated.
pub fn body_preview(body: &str) -> String {
    if body.chars().count() > 100 {
        let head: String = body.chars().take(100).collect();
        format!("{}...", head)
    } else {
        body.to_string()
    }
}

/// Largest whole unit of the remaining time.
pub fn expires_in(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "expired".to_string();
    }
    let plural = |n: i64, unit: &str| format!("{} {}{}", n, unit, if n > 1 { "s" } else { "" });
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else {
        plural(remaining.num_minutes(), "minute")
    }
}

pub(crate) fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Which actions to approve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSelection {
    pub action_ids: Vec<String>,
    pub approve_all: bool,
    /// Restricts `approve_all` to one campaign.
    pub campaign_id: Option<String>,
}

impl ApprovalSelection {
    pub fn ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            action_ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn all(campaign_id: Option<String>) -> Self {
        Self {
            approve_all: true,
            campaign_id,
            ..Default::default()
        }
    }

    pub(crate) fn selects(&self, action: &QueuedAction) -> bool {
        if self.approve_all {
            self.campaign_id
                .as_deref()
                .map_or(true, |id| action.campaign_id == id)
        } else {
            self.action_ids.iter().any(|id| *id == action.id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveOutcome {
    pub approved_count: usize,
    pub approved_ids: Vec<String>,
    pub message: String,
}
