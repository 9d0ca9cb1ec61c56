//! Workspace registry adapter — rig/polecat layout and session naming
//! (spec §6), plus the "polecat nuke" destroy command the Nuke primitive
//! (spec §4.6) shells out to.
//!
//! Grounded on `worktree/mod.rs`'s `WorktreeManager`: same `<root>/.witness`
//! layout convention and the same git2 worktree-prune-then-remove-dir
//! sequence, generalized from one repo's single `.rembrandt/agents/<id>`
//! tree to per-rig polecat worktrees and tmux-style session names.

use super::{Collaborator, WorkspaceRegistry};
use crate::{Result, WitnessError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use git2::Repository;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const REGISTRY_DIR: &str = ".witness";

pub struct FsWorkspaceRegistry {
    /// External command used to tear down a polecat's worktree/branch/beads.
    /// Kept external (spec §6: Witness never mutates the tracker's storage
    /// or the worktree tree directly beyond what this command does).
    nuke_binary: String,
}

impl FsWorkspaceRegistry {
    pub fn new() -> Self {
        Self::with_nuke_binary("polecat-nuke")
    }

    pub fn with_nuke_binary(binary: impl Into<String>) -> Self {
        Self {
            nuke_binary: binary.into(),
        }
    }

    fn registry_root(&self, town_root: &Path) -> PathBuf {
        town_root.join(REGISTRY_DIR)
    }
}

impl Default for FsWorkspaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Collaborator for FsWorkspaceRegistry {
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "workspace-registry"
    }
}

#[async_trait]
impl WorkspaceRegistry for FsWorkspaceRegistry {
    fn find(&self, work_dir: &Path) -> Result<PathBuf> {
        let mut current = Some(work_dir);
        while let Some(dir) = current {
            if dir.join(REGISTRY_DIR).is_dir() {
                return Ok(dir.to_path_buf());
            }
            current = dir.parent();
        }
        Err(WitnessError::Config(format!(
            "no {} ancestor of {}",
            REGISTRY_DIR,
            work_dir.display()
        )))
    }

    fn init_registry(&self, town_root: &Path) -> Result<()> {
        let root = self.registry_root(town_root);
        std::fs::create_dir_all(root.join("polecats"))?;
        // Fail loudly rather than silently operate against a non-repo —
        // the registry only makes sense inside a git checkout.
        Repository::open(town_root)?;
        Ok(())
    }

    fn polecat_session_name(&self, rig_prefix: &str, polecat: &str) -> String {
        format!("{}-{}", rig_prefix, polecat)
    }

    fn refinery_session_name(&self, rig_prefix: &str) -> String {
        format!("{}-refinery", rig_prefix)
    }

    fn stale_reason_for_times(
        &self,
        msg_ts: DateTime<Utc>,
        session_created_ts: Option<DateTime<Utc>>,
    ) -> (bool, Option<String>) {
        match session_created_ts {
            Some(created) if created > msg_ts => (
                true,
                Some(format!(
                    "session recreated at {} after message timestamp {}",
                    created, msg_ts
                )),
            ),
            _ => (false, None),
        }
    }

    async fn destroy_polecat(&self, rig: &str, polecat: &str) -> Result<()> {
        let output = Command::new(&self.nuke_binary)
            .args(["--rig", rig, "--polecat", polecat])
            .output()
            .await
            .map_err(|e| {
                WitnessError::Config(format!("`{}` failed to spawn: {}", self.nuke_binary, e))
            })?;

        if !output.status.success() {
            return Err(WitnessError::Config(format!(
                "destroy of {}/{} failed: {}",
                rig,
                polecat,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}
