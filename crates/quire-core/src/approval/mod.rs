//! Human approval of outbound actions.
//!
//! Actions are queued as pending, approved by id or in bulk, and executed
//! through a [`SenderRegistry`]. Pending actions expire after a TTL and can
//! no longer be approved.

mod action;
mod queue;
mod sender;

pub use action::{
    body_preview, expires_in, ActionStatus, ApprovalDocument, ApprovalSelection, ApproveOutcome,
    HistoryEntry, NewAction, PendingSummary, QueuedAction, Route,
};
pub use queue::{ApprovalQueue, ExecutionReport, ExecutionResult, APPROVALS_FILE};
pub use sender::{ChannelSender, CommandSender, SendOutcome, SendStatus, SenderRegistry};

pub(crate) use sender::run_command;
