//! The approval queue: pending → approved → executing → executed.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::approval::action::{
    format_time, ActionStatus, ApprovalDocument, ApprovalSelection, ApproveOutcome, HistoryEntry,
    NewAction, PendingSummary, QueuedAction,
};
use crate::approval::sender::{SendOutcome, SendStatus, SenderRegistry};
use crate::config::StoreConfig;
use crate::document::lock::DocumentLock;
use crate::document::repository::{read_json, update_json};
use crate::document::timestamp;
use crate::error::{QuireError, QuireResult};

/// File name of the queue inside the state folder.
pub const APPROVALS_FILE: &str = "pending_approvals.json";

/// One executed (or attempted) action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub action_id: String,
    pub target_name: String,
    pub action_type: String,
    pub status: SendStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub executed: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub results: Vec<ExecutionResult>,
}

/// Approval queue stored in `state/pending_approvals.json`.
#[derive(Debug, Clone)]
pub struct ApprovalQueue {
    path: PathBuf,
    ttl: Duration,
    claim_ttl: Duration,
    history_capacity: usize,
}

impl ApprovalQueue {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(APPROVALS_FILE),
            ttl: Duration::days(3),
            claim_ttl: Duration::hours(1),
            history_capacity: 500,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            ttl: Duration::days(config.approval_ttl_days),
            history_capacity: config.history_capacity,
            ..Self::new(config.state_path())
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// How long an `executing` claim holds before another run may take it.
    pub fn with_claim_ttl(mut self, claim_ttl: Duration) -> Self {
        self.claim_ttl = claim_ttl;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modify<R>(&self, f: impl FnOnce(&mut ApprovalDocument) -> QuireResult<R>) -> QuireResult<R> {
        update_json(&self.path, |doc: &mut ApprovalDocument| {
            let result = f(doc)?;
            doc.last_updated = Some(timestamp());
            Ok(result)
        })
    }

    /// Current queue document, default when absent.
    pub fn document(&self) -> QuireResult<ApprovalDocument> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    /// Queue an action for approval.
    pub fn enqueue(&self, input: NewAction) -> QuireResult<QueuedAction> {
        let action = QueuedAction::from_input(input, self.ttl)?;
        self.modify(|doc| {
            doc.pending.push(action.clone());
            Ok(())
        })?;
        info!(
            action = %action.id,
            campaign = %action.campaign_id,
            action_type = %action.action_type,
            "Queued action for approval"
        );
        Ok(action)
    }

    /// Approve selected pending actions. Expired actions are never approved.
    pub fn approve(&self, selection: &ApprovalSelection) -> QuireResult<ApproveOutcome> {
        if selection.action_ids.is_empty() && !selection.approve_all {
            return Err(QuireError::validation_with_suggestion(
                "Must provide action_ids or set approve_all=true",
                "Pass action_ids from list_pending, or approve_all",
            ));
        }

        let capacity = self.history_capacity;
        let approved_ids = self.modify(|doc| {
            let now = Utc::now();
            let stamp = format_time(now);
            let mut approved = Vec::new();

            for action in doc.pending.iter_mut() {
                if action.status != ActionStatus::Pending
                    || action.is_expired(now)
                    || !selection.selects(action)
                {
                    continue;
                }
                action.status = ActionStatus::Approved;
                action.approved_at = Some(stamp.clone());
                doc.history.insert(
                    0,
                    HistoryEntry {
                        id: action.id.clone(),
                        action_type: action.action_type.clone(),
                        target_name: action.target_name.clone(),
                        status: ActionStatus::Approved,
                        approved_at: Some(stamp.clone()),
                        executed_at: None,
                        extra: Default::default(),
                    },
                );
                approved.push(action.id.clone());
            }

            doc.history.truncate(capacity);
            Ok(approved)
        })?;

        let count = approved_ids.len();
        info!(approved = count, "Approved actions");
        Ok(ApproveOutcome {
            approved_count: count,
            approved_ids,
            message: format!(
                "{} action{} approved for execution",
                count,
                if count == 1 { "" } else { "s" }
            ),
        })
    }

    /// Pending actions, oldest first. Expired ones are included only on
    /// request.
    pub fn list_pending(
        &self,
        campaign_id: Option<&str>,
        include_expired: bool,
    ) -> QuireResult<Vec<PendingSummary>> {
        let now = Utc::now();
        Ok(self
            .document()?
            .pending
            .iter()
            .filter(|a| a.status == ActionStatus::Pending)
            .filter(|a| include_expired || !a.is_expired(now))
            .filter(|a| campaign_id.map_or(true, |id| a.campaign_id == id))
            .map(|a| PendingSummary::from_action(a, now))
            .collect())
    }

    /// Claim the selected ready actions for `run_id` and persist the claim.
    fn claim(&self, run_id: &str, action_ids: &[String]) -> QuireResult<Vec<QueuedAction>> {
        let claim_ttl = self.claim_ttl;
        self.modify(|doc| {
            let now = Utc::now();
            let mut claimed = Vec::new();
            for action in doc.pending.iter_mut() {
                if !action.is_ready(now, claim_ttl) || !selected(action, action_ids) {
                    continue;
                }
                if action.status == ActionStatus::Executing {
                    warn!(
                        action = %action.id,
                        stale_run = action.claimed_by.as_deref().unwrap_or("unknown"),
                        "Reclaiming action from an unfinished run"
                    );
                }
                action.claim(run_id, now);
                claimed.push(action.clone());
            }
            Ok(claimed)
        })
    }

    /// Send approved actions (all, or those in `action_ids`).
    ///
    /// Under the queue lock each selected action is marked `executing` with
    /// this run's id, so overlapping runs never send the same action. Sends
    /// happen outside the lock. Successes leave the live queue and are marked
    /// executed in history; failures go back to approved with `last_error`.
    /// A claim left by a run that died is taken over once it is older than
    /// the claim TTL.
    pub async fn execute(
        &self,
        registry: &SenderRegistry,
        action_ids: &[String],
        dry_run: bool,
    ) -> QuireResult<ExecutionReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let batch: Vec<QueuedAction> = if dry_run {
            let _lock = DocumentLock::acquire(&self.path)?;
            let now = Utc::now();
            self.document()?
                .pending
                .into_iter()
                .filter(|a| a.is_ready(now, self.claim_ttl) && selected(a, action_ids))
                .collect()
        } else {
            self.claim(&run_id, action_ids)?
        };

        let mut report = ExecutionReport {
            dry_run,
            ..Default::default()
        };
        let mut outcomes: Vec<(String, SendOutcome)> = Vec::with_capacity(batch.len());

        for action in &batch {
            // A dry run never routes, so calls and unknown action types are
            // reported as would-execute too.
            let (outcome, message) = if dry_run {
                (
                    SendOutcome::success(None),
                    Some(format!(
                        "Would execute {} to {}",
                        action.action_type, action.target_name
                    )),
                )
            } else {
                (registry.dispatch(action).await, None)
            };

            if outcome.is_success() {
                report.executed += 1;
            } else {
                report.failed += 1;
            }
            report.results.push(ExecutionResult {
                action_id: action.id.clone(),
                target_name: action.target_name.clone(),
                action_type: action.action_type.clone(),
                status: outcome.status,
                message_id: outcome.message_id.clone(),
                error: outcome.error.clone(),
                message,
            });
            outcomes.push((action.id.clone(), outcome));
        }

        if !dry_run && !outcomes.is_empty() {
            self.settle(&run_id, &outcomes)?;
        }

        info!(
            run = %run_id,
            executed = report.executed,
            failed = report.failed,
            dry_run = dry_run,
            "Executed approved actions"
        );
        Ok(report)
    }

    /// Write send outcomes back for the actions `run_id` still holds.
    fn settle(&self, run_id: &str, outcomes: &[(String, SendOutcome)]) -> QuireResult<()> {
        self.modify(|doc| {
            let stamp = timestamp();
            for (id, outcome) in outcomes {
                let Some(action) = doc.pending.iter_mut().find(|a| {
                    a.id == *id
                        && a.status == ActionStatus::Executing
                        && a.claimed_by.as_deref() == Some(run_id)
                }) else {
                    warn!(action = %id, run = %run_id, "Action left the queue during execution");
                    continue;
                };

                action.claimed_by = None;
                action.claimed_at = None;
                if outcome.is_success() {
                    action.status = ActionStatus::Executed;
                    action.executed_at = Some(stamp.clone());
                    if let Some(entry) = doc.history.iter_mut().find(|h| h.id == *id) {
                        entry.status = ActionStatus::Executed;
                        entry.executed_at = Some(stamp.clone());
                    }
                } else {
                    action.status = ActionStatus::Approved;
                    action.last_error = outcome.error.clone();
                    action.last_attempt = Some(stamp.clone());
                }
            }
            doc.pending.retain(|a| a.status != ActionStatus::Executed);
            Ok(())
        })
    }
}

fn selected(action: &QueuedAction, action_ids: &[String]) -> bool {
    action_ids.is_empty() || action_ids.contains(&action.id)
}
