//! Outbound channel senders.
//!
//! Senders take a JSON payload and report `{status, message_id?, error?}`.
//! [`CommandSender`] runs an external program with the payload on stdin;
//! tests and embedders register their own [`ChannelSender`]s.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::approval::action::{QueuedAction, Route};
use crate::config::{CommandSpec, StoreConfig};
use crate::error::{QuireError, QuireResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SendStatus {
    Success,
    Failed,
}

/// Result of one send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub status: SendStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn success(message_id: Option<String>) -> Self {
        Self {
            status: SendStatus::Success,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: SendStatus::Failed,
            message_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SendStatus::Success
    }

    /// Interpret a sender's JSON reply. Anything but `status: "success"` is a
    /// failure, described by `error` or `message`.
    pub fn from_reply(reply: &Value) -> Self {
        let text = |key: &str| reply.get(key).and_then(Value::as_str).map(str::to_string);
        if reply.get("status").and_then(Value::as_str) == Some("success") {
            Self::success(text("message_id"))
        } else {
            Self::failed(
                text("error")
                    .or_else(|| text("message"))
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )
        }
    }
}

/// Delivers a payload over one channel.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, payload: &Value) -> QuireResult<SendOutcome>;
}

/// Runs an external program: JSON payload on stdin, JSON reply on stdout,
/// non-zero exit means failure.
#[derive(Debug, Clone)]
pub struct CommandSender {
    command: CommandSpec,
}

impl CommandSender {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

/// Run `command` with `input` on stdin and return its stdout.
pub(crate) async fn run_command(command: &CommandSpec, input: &Value) -> QuireResult<String> {
    let mut child = tokio::process::Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| QuireError::external(format!("failed to start {}: {}", command.program, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.to_string().as_bytes()).await?;
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(QuireError::external(if stderr.is_empty() {
            format!("{} exited with {}", command.program, output.status)
        } else {
            stderr
        }));
    }

    debug!(program = %command.program, "External command finished");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl ChannelSender for CommandSender {
    async fn send(&self, payload: &Value) -> QuireResult<SendOutcome> {
        let stdout = run_command(&self.command, payload).await?;
        let reply: Value = serde_json::from_str(stdout.trim())?;
        Ok(SendOutcome::from_reply(&reply))
    }
}

/// Senders keyed by channel, with a shared per-send timeout.
#[derive(Clone)]
pub struct SenderRegistry {
    senders: HashMap<String, Arc<dyn ChannelSender>>,
    timeout: Duration,
}

impl std::fmt::Debug for SenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut channels: Vec<&String> = self.senders.keys().collect();
        channels.sort();
        f.debug_struct("SenderRegistry")
            .field("channels", &channels)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SenderRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            senders: HashMap::new(),
            timeout,
        }
    }

    /// A [`CommandSender`] for every configured channel.
    pub fn from_config(config: &StoreConfig) -> Self {
        let mut registry = Self::new(Duration::from_secs(config.sender_timeout_secs));
        for (channel, command) in &config.senders {
            registry.register(channel.clone(), Arc::new(CommandSender::new(command.clone())));
        }
        registry
    }

    pub fn register(&mut self, channel: impl Into<String>, sender: Arc<dyn ChannelSender>) {
        self.senders.insert(channel.into(), sender);
    }

    pub fn get(&self, channel: &str) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(channel).cloned()
    }

    /// Deliver `action` through the sender for its route. Every problem,
    /// including a timeout, comes back as a failed outcome.
    pub async fn dispatch(&self, action: &QueuedAction) -> SendOutcome {
        let route = match action.route() {
            Some(Route::Call) => return SendOutcome::failed("Call execution not yet implemented"),
            Some(route) => route,
            None => {
                return SendOutcome::failed(format!("Unknown action type: {}", action.action_type))
            }
        };

        let channel = route.channel();
        let Some(sender) = self.get(channel) else {
            return SendOutcome::failed(format!("No sender configured for channel '{}'", channel));
        };

        let payload = action.payload(route);
        match tokio::time::timeout(self.timeout, sender.send(&payload)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(action = %action.id, channel = %channel, error = %e, "Send failed");
                SendOutcome::failed(e.to_string())
            }
            Err(_) => {
                warn!(action = %action.id, channel = %channel, "Send timed out");
                SendOutcome::failed(format!("Timeout sending {}", channel))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::action::NewAction;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl ChannelSender for Recorder {
        async fn send(&self, payload: &Value) -> QuireResult<SendOutcome> {
            self.seen.lock().unwrap().push(payload.clone());
            Ok(SendOutcome::success(Some("m-1".to_string())))
        }
    }

    struct Slow;

    #[async_trait]
    impl ChannelSender for Slow {
        async fn send(&self, _payload: &Value) -> QuireResult<SendOutcome> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(SendOutcome::success(None))
        }
    }

    fn action(action_type: &str) -> QueuedAction {
        QueuedAction::from_input(
            NewAction {
                campaign_id: "c".to_string(),
                target_id: "t".to_string(),
                target_name: "Ann".to_string(),
                target_phone: Some("+15550001".to_string()),
                action_type: action_type.to_string(),
                body: "Hi".to_string(),
                ..Default::default()
            },
            chrono::Duration::days(3),
        )
        .unwrap()
    }

    #[test]
    fn test_from_reply() {
        let ok = SendOutcome::from_reply(&json!({"status": "success", "message_id": "abc"}));
        assert!(ok.is_success());
        assert_eq!(ok.message_id.as_deref(), Some("abc"));

        let bad = SendOutcome::from_reply(&json!({"status": "error", "message": "quota"}));
        assert_eq!(bad.error.as_deref(), Some("quota"));

        let empty = SendOutcome::from_reply(&json!({}));
        assert_eq!(empty.error.as_deref(), Some("Unknown error"));
    }

    #[tokio::test]
    async fn test_dispatch_routes_payload() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let mut registry = SenderRegistry::new(Duration::from_secs(1));
        registry.register("sms", recorder.clone());

        let outcome = registry.dispatch(&action("send_sms")).await;
        assert!(outcome.is_success());
        assert_eq!(
            recorder.seen.lock().unwrap()[0],
            json!({"to": "+15550001", "body": "Hi"})
        );
    }

    #[tokio::test]
    async fn test_dispatch_failures() {
        let registry = SenderRegistry::new(Duration::from_secs(1));

        let call = registry.dispatch(&action("call")).await;
        assert_eq!(call.error.as_deref(), Some("Call execution not yet implemented"));

        let unknown = registry.dispatch(&action("send_fax")).await;
        assert_eq!(unknown.error.as_deref(), Some("Unknown action type: send_fax"));

        let missing = registry.dispatch(&action("send_email")).await;
        assert!(!missing.is_success());
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let mut registry = SenderRegistry::new(Duration::from_millis(20));
        registry.register("sms", Arc::new(Slow));
        let outcome = registry.dispatch(&action("send_sms")).await;
        assert_eq!(outcome.error.as_deref(), Some("Timeout sending sms"));
    }
}
