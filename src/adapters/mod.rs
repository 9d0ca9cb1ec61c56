//! External-collaborator adapters (spec §6).
//!
//! Everything the core cannot verify on its own — multiplexer liveness,
//! issue-tracker state, git ancestry, mail delivery, rig/session naming — is
//! reached through one of the traits below. The core only ever holds a
//! `dyn` or generic reference to these traits, never a concrete adapter, so
//! tests can substitute fakes (see `test_support`).

pub mod bd;
pub mod git;
pub mod mail;
pub mod registry;
pub mod tmux;

#[cfg(test)]
pub mod test_support;

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Every adapter reports whether its backing tool is reachable, the way the
/// teacher's integrations do (`beads`/`agent-mail`/`porque` availability
/// checks surfaced by `witness status`).
pub trait Collaborator {
    fn is_available(&self) -> bool;
    fn name(&self) -> &'static str;
}

/// Raw shape of a bead as the issue tracker's CLI emits it. Fields absent
/// from a given row are defaulted rather than treated as a parse error —
/// the CLI's JSON schema is heterogeneous by design (spec §9 Design Notes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeadJson {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub agent_state: Option<String>,
    #[serde(default)]
    pub hook_bead: Option<String>,
}

impl BeadJson {
    /// Read this row as an agent bead (spec §3). Missing `agent_state` is
    /// treated as the empty string rather than an error.
    pub fn into_agent_bead(self) -> crate::model::AgentBead {
        crate::model::AgentBead {
            id: self.id,
            agent_state: self.agent_state.unwrap_or_default(),
            hook_bead: self.hook_bead,
            labels: self.labels,
            description: self.description,
        }
    }

    /// Read this row as a work bead. `None` if the status doesn't parse as
    /// one of the four known work-bead statuses.
    pub fn into_work_bead(self) -> Option<crate::model::WorkBead> {
        let status = crate::model::WorkBeadStatus::from_str(&self.status)?;
        Some(crate::model::WorkBead {
            id: self.id,
            status,
            assignee: self.assignee,
            description: self.description,
        })
    }
}

/// Patch describing what to change on `bd update <id>`.
#[derive(Debug, Clone, Default)]
pub struct BeadUpdate {
    /// Full replacement label set (the CLI requires one `--set-labels`
    /// flag per label, so callers pass the complete desired set).
    pub set_labels: Option<Vec<String>>,
    pub status: Option<String>,
    /// `Some(None)` clears the assignee; `None` leaves it untouched.
    pub assignee: Option<Option<String>>,
}

/// The issue-tracker CLI (`bd` in the spec's illustrative naming).
#[async_trait]
pub trait IssueTracker: Collaborator + Send + Sync {
    async fn show(&self, id: &str) -> Result<Option<BeadJson>>;
    /// `status=None` omits the `--status` filter entirely (spec §4.4's
    /// molecule-child walk needs every child regardless of status so it
    /// can decide for itself which ones are "non-closed").
    async fn list(
        &self,
        status: Option<&str>,
        label: Option<&str>,
        parent: Option<&str>,
    ) -> Result<Vec<BeadJson>>;
    async fn create(
        &self,
        title: &str,
        description: &str,
        labels: &[String],
    ) -> Result<String>;
    async fn update(&self, id: &str, patch: BeadUpdate) -> Result<()>;
    async fn close(&self, id: &str, reason: &str) -> Result<()>;
}

/// The terminal-multiplexer driver (spec §6). Session existence, process
/// liveness, and keystroke delivery — never reimplemented by the core.
#[async_trait]
pub trait MultiplexerDriver: Collaborator + Send + Sync {
    async fn has_session(&self, name: &str) -> Result<bool>;
    async fn session_created_at(&self, name: &str) -> Result<Option<DateTime<Utc>>>;
    async fn capture_pane(&self, name: &str, lines: usize) -> Result<String>;
    async fn get_session_activity(&self, name: &str) -> Result<Option<DateTime<Utc>>>;
    async fn is_agent_alive(&self, name: &str) -> Result<bool>;
    async fn send_keys(&self, name: &str, keys: &str) -> Result<()>;
    async fn accept_prompt(&self, name: &str) -> Result<()>;
    async fn kill_session(&self, name: &str) -> Result<()>;
}

/// The git driver (spec §6): ancestry checks against the default branch.
pub trait GitDriver: Collaborator + Send + Sync {
    fn rev(&self, worktree: &Path, rev: &str) -> Result<String>;
    fn remotes(&self, worktree: &Path) -> Result<Vec<String>>;
    fn is_ancestor(&self, worktree: &Path, sha: &str, branch: &str) -> Result<bool>;
}

/// Priority of an outbound protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

/// An outbound message handed to the mail router (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
}

/// The mail router (spec §6): at-least-once, order not guaranteed.
#[async_trait]
pub trait MailRouter: Collaborator + Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<()>;
}

/// The workspace/rig/session-name registry (spec §6), plus the external
/// "polecat nuke" destroy command the Nuke primitive (spec §4.6) invokes.
#[async_trait]
pub trait WorkspaceRegistry: Collaborator + Send + Sync {
    fn find(&self, work_dir: &Path) -> Result<PathBuf>;
    fn init_registry(&self, town_root: &Path) -> Result<()>;
    fn polecat_session_name(&self, rig_prefix: &str, polecat: &str) -> String;
    fn refinery_session_name(&self, rig_prefix: &str) -> String;
    fn stale_reason_for_times(
        &self,
        msg_ts: DateTime<Utc>,
        session_created_ts: Option<DateTime<Utc>>,
    ) -> (bool, Option<String>);

    /// Remove worktree, branch, and beads for `<rig>/<polecat>`.
    async fn destroy_polecat(&self, rig: &str, polecat: &str) -> Result<()>;
}
