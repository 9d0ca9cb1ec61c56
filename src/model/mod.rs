//! Data model for the entities the core reasons about (see spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace for a fleet of polecats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rig {
    pub name: String,
    pub root: std::path::PathBuf,
    pub session_prefix: String,
    pub default_branch: String,
}

/// A single ephemeral worker agent, identified by name within a rig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polecat {
    pub rig: String,
    pub name: String,
}

impl Polecat {
    /// Deterministic agent-bead id for this polecat (spec §3).
    pub fn agent_bead_id(&self) -> String {
        format!("{}/agents/{}", self.rig, self.name)
    }

    pub fn assignee(&self) -> String {
        format!("{}/polecats/{}", self.rig, self.name)
    }
}

/// Status of a work bead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkBeadStatus {
    Open,
    Hooked,
    InProgress,
    Closed,
}

impl WorkBeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkBeadStatus::Open => "open",
            WorkBeadStatus::Hooked => "hooked",
            WorkBeadStatus::InProgress => "in_progress",
            WorkBeadStatus::Closed => "closed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "open" => Some(WorkBeadStatus::Open),
            "hooked" => Some(WorkBeadStatus::Hooked),
            "in_progress" => Some(WorkBeadStatus::InProgress),
            "closed" => Some(WorkBeadStatus::Closed),
            _ => None,
        }
    }

    /// True for the two statuses the recovery path resets to `open` (spec §4.6).
    pub fn is_abandonable(self) -> bool {
        matches!(self, WorkBeadStatus::Hooked | WorkBeadStatus::InProgress)
    }
}

/// A unit of work tracked by the issue tracker.
#[derive(Debug, Clone)]
pub struct WorkBead {
    pub id: String,
    pub status: WorkBeadStatus,
    pub assignee: Option<String>,
    pub description: String,
}

impl WorkBead {
    /// Parse `attached_molecule: <id>` out of the description, if present.
    pub fn attached_molecule(&self) -> Option<String> {
        parse_description_field(&self.description, "attached_molecule")
    }

    /// If the assignee is `<rig>/polecats/<name>` for the given rig, return `<name>`.
    pub fn assignee_polecat(&self, rig_name: &str) -> Option<String> {
        let assignee = self.assignee.as_ref()?;
        let prefix = format!("{}/polecats/", rig_name);
        assignee.strip_prefix(&prefix).map(|s| s.to_string())
    }
}

/// Self-reported cleanliness of a polecat's worktree at orderly exit (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStatus {
    Clean,
    HasUncommitted,
    HasStash,
    HasUnpushed,
    Unknown,
}

impl CleanupStatus {
    pub fn from_str(value: &str) -> Self {
        match value.trim() {
            "clean" => CleanupStatus::Clean,
            "has_uncommitted" => CleanupStatus::HasUncommitted,
            "has_stash" => CleanupStatus::HasStash,
            "has_unpushed" => CleanupStatus::HasUnpushed,
            _ => CleanupStatus::Unknown,
        }
    }

    pub fn is_dirty(self) -> bool {
        matches!(
            self,
            CleanupStatus::HasUncommitted | CleanupStatus::HasStash | CleanupStatus::HasUnpushed
        )
    }

    /// Human-readable reason used in Block/Escalate results.
    pub fn reason(self) -> &'static str {
        match self {
            CleanupStatus::Clean => "clean",
            CleanupStatus::HasUncommitted => "uncommitted",
            CleanupStatus::HasStash => "stash",
            CleanupStatus::HasUnpushed => "unpushed",
            CleanupStatus::Unknown => "unknown",
        }
    }
}

/// A `done-intent:<exit-type>:<unix-ts>` label, parsed from an agent bead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneIntent {
    pub exit_type: String,
    pub at: DateTime<Utc>,
}

impl DoneIntent {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.at)
    }
}

/// Metadata record for a polecat, addressable by a deterministic id (spec §3).
#[derive(Debug, Clone)]
pub struct AgentBead {
    pub id: String,
    pub agent_state: String,
    pub hook_bead: Option<String>,
    pub labels: Vec<String>,
    pub description: String,
}

impl AgentBead {
    pub fn cleanup_status(&self) -> CleanupStatus {
        match parse_description_field(&self.description, "cleanup_status") {
            Some(value) => CleanupStatus::from_str(&value),
            None => CleanupStatus::Unknown,
        }
    }

    /// Parse the `done-intent:<exit-type>:<unix-ts>` label, if present.
    ///
    /// Malformed labels (bad timestamp, missing fields) are treated as absent
    /// rather than propagated as errors — a corrupt label must never block
    /// reconciliation.
    pub fn done_intent(&self) -> Option<DoneIntent> {
        for label in &self.labels {
            let rest = label.strip_prefix("done-intent:")?;
            let mut parts = rest.splitn(2, ':');
            let exit_type = parts.next()?.to_string();
            let ts_str = parts.next()?;
            let ts: i64 = ts_str.parse().ok()?;
            let at = DateTime::from_timestamp(ts, 0)?;
            return Some(DoneIntent { exit_type, at });
        }
        None
    }
}

/// State of a cleanup wisp (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WispState {
    Pending,
    MergeRequested,
    Merged,
    Escalated,
}

impl WispState {
    pub fn as_str(self) -> &'static str {
        match self {
            WispState::Pending => "pending",
            WispState::MergeRequested => "merge-requested",
            WispState::Merged => "merged",
            WispState::Escalated => "escalated",
        }
    }
}

/// An auxiliary bead tracking deferred cleanup for one polecat.
#[derive(Debug, Clone)]
pub struct CleanupWisp {
    pub id: String,
    pub polecat: String,
    pub state: WispState,
}

fn parse_description_field(description: &str, key: &str) -> Option<String> {
    for line in description.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(key) {
            if let Some(value) = rest.trim_start().strip_prefix(':') {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cleanup_status_from_description() {
        let bead = AgentBead {
            id: "agent-1".into(),
            agent_state: "done".into(),
            hook_bead: None,
            labels: vec![],
            description: "some notes\ncleanup_status: has_unpushed\nmore notes".into(),
        };
        assert_eq!(bead.cleanup_status(), CleanupStatus::HasUnpushed);
    }

    #[test]
    fn missing_cleanup_status_is_unknown() {
        let bead = AgentBead {
            id: "agent-1".into(),
            agent_state: "working".into(),
            hook_bead: None,
            labels: vec![],
            description: "nothing relevant here".into(),
        };
        assert_eq!(bead.cleanup_status(), CleanupStatus::Unknown);
    }

    #[test]
    fn parses_done_intent_label() {
        let bead = AgentBead {
            id: "agent-1".into(),
            agent_state: "done".into(),
            hook_bead: None,
            labels: vec!["done-intent:COMPLETED:1700000000".into()],
            description: String::new(),
        };
        let intent = bead.done_intent().expect("done intent present");
        assert_eq!(intent.exit_type, "COMPLETED");
    }

    #[test]
    fn malformed_done_intent_is_absent() {
        let bead = AgentBead {
            id: "agent-1".into(),
            agent_state: "done".into(),
            hook_bead: None,
            labels: vec!["done-intent:COMPLETED:not-a-timestamp".into()],
            description: String::new(),
        };
        assert!(bead.done_intent().is_none());
    }

    #[test]
    fn assignee_polecat_parses_rig_scoped_assignee() {
        let bead = WorkBead {
            id: "WORK-7".into(),
            status: WorkBeadStatus::InProgress,
            assignee: Some("townA/polecats/bravo".into()),
            description: String::new(),
        };
        assert_eq!(bead.assignee_polecat("townA"), Some("bravo".to_string()));
        assert_eq!(bead.assignee_polecat("townB"), None);
    }

    #[test]
    fn attached_molecule_parses_from_description() {
        let bead = WorkBead {
            id: "WORK-11".into(),
            status: WorkBeadStatus::Hooked,
            assignee: Some("rig/polecats/echo".into()),
            description: "attached_molecule: MOL-2\nsome other line".into(),
        };
        assert_eq!(bead.attached_molecule(), Some("MOL-2".to_string()));
    }
}
