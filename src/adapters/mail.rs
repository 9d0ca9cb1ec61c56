//! Mail router adapter — delivers protocol messages via the external mail
//! CLI (spec §6: at-least-once delivery, ordering not guaranteed).
//!
//! `integration/agent_mail.rs`'s `AgentMailIntegration` models the same
//! collaborator but stubs every call out behind `// TODO: Implement via
//! MCP`. Witness has no Non-goal excusing mail delivery, so this adapter
//! finishes what that stub started, using the CLI-shell-out shape
//! `adapters/bd.rs` already establishes rather than reaching for an MCP
//! client the pack has no example of.

use super::{Collaborator, MailMessage, MailRouter};
use crate::{Result, WitnessError};
use async_trait::async_trait;
use tokio::process::Command;

pub struct CliMailRouter {
    binary: String,
    available: bool,
}

impl CliMailRouter {
    pub fn new() -> Self {
        Self::with_binary("agent-mail")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        let binary = binary.into();
        let available = std::process::Command::new(&binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        Self { binary, available }
    }
}

impl Default for CliMailRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Collaborator for CliMailRouter {
    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "agent-mail"
    }
}

#[async_trait]
impl MailRouter for CliMailRouter {
    async fn send(&self, message: MailMessage) -> Result<()> {
        let payload = serde_json::to_string(&message)
            .map_err(|e| WitnessError::Mail(format!("couldn't encode message: {}", e)))?;

        let output = Command::new(&self.binary)
            .args(["send", "--json", &payload])
            .output()
            .await
            .map_err(|e| WitnessError::Mail(format!("`{}` failed to spawn: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(WitnessError::Mail(format!(
                "delivery of {} to {} failed: {}",
                message.id,
                message.to,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}
