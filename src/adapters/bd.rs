//! Issue-tracker adapter — drives the `bd` CLI and normalizes its output.
//!
//! Grounded on `integration/beads.rs`'s `BeadsIntegration`: an availability
//! probe via `--version`, then one `std::process::Command` per operation.
//! The CLI's JSON shape is heterogeneous (spec §9 Design Notes): `show`
//! returns a singleton array, `create` returns either `{"id": "..."}` or a
//! `Created: <id>` line, and empty output / `[]` / `null` all mean "not
//! found". This adapter is the single seam that absorbs that variance.

use super::{BeadJson, BeadUpdate, Collaborator, IssueTracker};
use crate::{Result, WitnessError};
use async_trait::async_trait;
use std::process::Output;
use tokio::process::Command;

pub struct BdTracker {
    binary: String,
    available: bool,
}

impl BdTracker {
    /// Probe for the `bd` binary on the current `PATH`.
    pub fn new() -> Self {
        Self::with_binary("bd")
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

    async fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| WitnessError::Tracker(format!("`{}` failed to spawn: {}", self.binary, e)))
    }
}

impl Default for BdTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Collaborator for BdTracker {
    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "bd"
    }
}

/// Parse a `bd show --json` payload: a singleton array, `[]`, or `null` —
/// any of these meaning "not found" is treated identically.
fn parse_show_payload(stdout: &[u8]) -> Result<Option<BeadJson>> {
    let trimmed = std::str::from_utf8(stdout).unwrap_or("").trim();
    if trimmed.is_empty() || trimmed == "null" || trimmed == "[]" {
        return Ok(None);
    }
    let beads: Vec<BeadJson> = serde_json::from_str(trimmed)
        .map_err(|e| WitnessError::Tracker(format!("bad show payload: {}", e)))?;
    Ok(beads.into_iter().next())
}

/// Parse the id out of a `bd create` response: either `{"id": "..."}` or a
/// `Created: <id>` line.
fn parse_create_response(stdout: &[u8]) -> Result<String> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        if let Some(id) = value.get("id").and_then(|v| v.as_str()) {
            return Ok(id.to_string());
        }
    }

    if let Some(rest) = text.strip_prefix("Created:") {
        return Ok(rest.trim().to_string());
    }

    Err(WitnessError::Tracker(format!(
        "couldn't parse bead id out of create response: {:?}",
        text
    )))
}

#[async_trait]
impl IssueTracker for BdTracker {
    async fn show(&self, id: &str) -> Result<Option<BeadJson>> {
        let output = self.run(&["show", id, "--json"]).await?;
        if !output.status.success() {
            return Err(WitnessError::Tracker(format!(
                "bd show {} exited non-zero",
                id
            )));
        }
        parse_show_payload(&output.stdout)
    }

    async fn list(
        &self,
        status: Option<&str>,
        label: Option<&str>,
        parent: Option<&str>,
    ) -> Result<Vec<BeadJson>> {
        let mut args = vec!["list".to_string(), "--json".to_string(), "--limit=0".to_string()];
        if let Some(status) = status {
            args.push(format!("--status={}", status));
        }
        if let Some(label) = label {
            args.push("--label".to_string());
            args.push(label.to_string());
        }
        if let Some(parent) = parent {
            args.push(format!("--parent={}", parent));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(WitnessError::Tracker(format!(
                "bd list --status={} exited non-zero",
                status.unwrap_or("*")
            )));
        }
        let trimmed = String::from_utf8_lossy(&output.stdout);
        let trimmed = trimmed.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(vec![]);
        }
        serde_json::from_str(trimmed)
            .map_err(|e| WitnessError::Tracker(format!("bad list payload: {}", e)))
    }

    async fn create(
        &self,
        title: &str,
        description: &str,
        labels: &[String],
    ) -> Result<String> {
        let csv = labels.join(",");
        let output = self
            .run(&[
                "create",
                "--ephemeral",
                "--json",
                "--title",
                title,
                "--description",
                description,
                "--labels",
                &csv,
            ])
            .await?;
        if !output.status.success() {
            return Err(WitnessError::Tracker("bd create exited non-zero".into()));
        }
        parse_create_response(&output.stdout)
    }

    async fn update(&self, id: &str, patch: BeadUpdate) -> Result<()> {
        let mut args: Vec<String> = vec!["update".to_string(), id.to_string()];
        if let Some(labels) = &patch.set_labels {
            for label in labels {
                args.push(format!("--set-labels={}", label));
            }
        }
        if let Some(status) = &patch.status {
            args.push(format!("--status={}", status));
        }
        if let Some(assignee) = &patch.assignee {
            match assignee {
                Some(value) => args.push(format!("--assignee={}", value)),
                None => args.push("--assignee=".to_string()),
            }
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(WitnessError::Tracker(format!(
                "bd update {} exited non-zero",
                id
            )));
        }
        Ok(())
    }

    async fn close(&self, id: &str, reason: &str) -> Result<()> {
        let output = self.run(&["close", id, "-r", reason]).await?;
        if !output.status.success() {
            return Err(WitnessError::Tracker(format!(
                "bd close {} exited non-zero",
                id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_singleton_array() {
        let payload = br#"[{"id":"WORK-1","status":"open","description":"","labels":[]}]"#;
        let bead = parse_show_payload(payload).unwrap().unwrap();
        assert_eq!(bead.id, "WORK-1");
    }

    #[test]
    fn empty_output_is_not_found() {
        assert!(parse_show_payload(b"").unwrap().is_none());
        assert!(parse_show_payload(b"[]").unwrap().is_none());
        assert!(parse_show_payload(b"null").unwrap().is_none());
    }

    #[test]
    fn parses_json_create_response() {
        let id = parse_create_response(br#"{"id": "WISP-9"}"#).unwrap();
        assert_eq!(id, "WISP-9");
    }

    #[test]
    fn parses_created_line_response() {
        let id = parse_create_response(b"Created: WISP-9\n").unwrap();
        assert_eq!(id, "WISP-9");
    }
}
