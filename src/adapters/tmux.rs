//! Terminal-multiplexer driver adapter — tmux-backed.
//!
//! Grounded on `integration/beads.rs`'s CLI-shell-out style (a thin
//! `Command::new(...)` wrapper per operation, availability gated on a
//! `--version` probe), generalized to tmux's `display-message -p` format
//! strings for the timestamp/activity queries spec §6 requires. The
//! teacher's own PTY layer (`daemon/session.rs`) owns its child process
//! directly via `portable-pty`; that is a different relationship than
//! observing a multiplexer session the core does not own, so it is not the
//! right grounding for this adapter (see DESIGN.md).

use super::{Collaborator, MultiplexerDriver};
use crate::{Result, WitnessError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;

/// Pane commands treated as "no agent descendant" for §4.3 Branch A's
/// `agent-dead-in-session` classification.
const SHELL_COMMANDS: &[&str] = &["bash", "zsh", "sh", "fish", "dash", "tmux"];

pub struct TmuxDriver {
    available: bool,
}

impl TmuxDriver {
    pub fn new() -> Self {
        let available = std::process::Command::new("tmux")
            .arg("-V")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        Self { available }
    }

    async fn run(&self, args: &[&str]) -> Result<(bool, String)> {
        let output = Command::new("tmux")
            .args(args)
            .output()
            .await
            .map_err(|e| WitnessError::Multiplexer(format!("tmux failed to spawn: {}", e)))?;
        Ok((
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }

    async fn display_message(&self, name: &str, format: &str) -> Result<Option<String>> {
        let (ok, stdout) = self
            .run(&["display-message", "-p", "-t", name, format])
            .await?;
        if !ok {
            return Ok(None);
        }
        Ok(Some(stdout))
    }
}

impl Default for TmuxDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Collaborator for TmuxDriver {
    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "tmux"
    }
}

fn parse_unix_seconds(value: &str) -> Option<DateTime<Utc>> {
    value.trim().parse::<i64>().ok().and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[async_trait]
impl MultiplexerDriver for TmuxDriver {
    async fn has_session(&self, name: &str) -> Result<bool> {
        let (ok, _) = self.run(&["has-session", "-t", name]).await?;
        Ok(ok)
    }

    async fn session_created_at(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let raw = self.display_message(name, "#{session_created}").await?;
        Ok(raw.and_then(|v| parse_unix_seconds(&v)))
    }

    async fn capture_pane(&self, name: &str, lines: usize) -> Result<String> {
        let start = format!("-{}", lines);
        let (ok, stdout) = self
            .run(&["capture-pane", "-p", "-t", name, "-S", &start])
            .await?;
        if !ok {
            return Err(WitnessError::Multiplexer(format!(
                "couldn't capture pane for {}",
                name
            )));
        }
        Ok(stdout)
    }

    async fn get_session_activity(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let raw = self.display_message(name, "#{session_activity}").await?;
        Ok(raw.and_then(|v| parse_unix_seconds(&v)))
    }

    async fn is_agent_alive(&self, name: &str) -> Result<bool> {
        let raw = self.display_message(name, "#{pane_current_command}").await?;
        match raw {
            Some(cmd) => Ok(!SHELL_COMMANDS.contains(&cmd.as_str())),
            // Session gone entirely is not this method's concern (callers
            // check has_session first); treat unknown as not alive.
            None => Ok(false),
        }
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<()> {
        let (ok, _) = self.run(&["send-keys", "-t", name, keys]).await?;
        if !ok {
            return Err(WitnessError::Multiplexer(format!(
                "send-keys to {} failed",
                name
            )));
        }
        Ok(())
    }

    async fn accept_prompt(&self, name: &str) -> Result<()> {
        self.send_keys(name, "Down").await?;
        self.send_keys(name, "Enter").await
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        // Killing an already-dead session is a no-op success (spec §5
        // idempotence requirement for Nuke).
        let (ok, _) = self.run(&["kill-session", "-t", name]).await?;
        if ok || !self.has_session(name).await.unwrap_or(false) {
            Ok(())
        } else {
            Err(WitnessError::Multiplexer(format!(
                "kill-session {} failed",
                name
            )))
        }
    }
}
