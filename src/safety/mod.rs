//! Safety policy (spec §4.1): the single pure decision function gating
//! every destructive action.
//!
//! Grounded on the teacher's `Integration`-trait style of keeping
//! external capability behind a narrow seam (here `GitDriver`), so this
//! module stays a pure function over already-fetched facts and is
//! testable without touching a real repository.

use crate::adapters::GitDriver;
use crate::model::CleanupStatus;
use std::path::Path;

/// Outcome of `decide`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Nuke,
    Block(String),
    /// Not a policy-defined outcome name in the decision table (the table's
    /// "empty / on_main=false" and "empty / error" rows are both a refusal
    /// to destroy without being a hard block) but kept distinct from
    /// `Block` so callers can choose not to create a wisp for it if they
    /// already have one.
    Skip(String),
}

/// Result of the `on_main` ancestry check. `Unknown` covers both "HEAD
/// unreadable" and "no remote/local branch was an ancestor" — the caller
/// cannot tell the two apart from this type alone, matching the decision
/// table's treatment of `on_main=false` and `on_main=error` identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMain {
    Yes,
    No,
    Error,
}

/// `decide(polecat)` — spec §4.1's decision table, a pure function of the
/// two already-read facts.
pub fn decide(cleanup_status: CleanupStatus, on_main: OnMain) -> Decision {
    match cleanup_status {
        CleanupStatus::Clean => Decision::Nuke,
        CleanupStatus::HasUncommitted => Decision::Block("uncommitted".to_string()),
        CleanupStatus::HasStash => Decision::Block("stash".to_string()),
        CleanupStatus::HasUnpushed => Decision::Block("unpushed".to_string()),
        CleanupStatus::Unknown => match on_main {
            OnMain::Yes => Decision::Nuke,
            OnMain::No => {
                Decision::Skip("commit not on main; may have unpushed work".to_string())
            }
            OnMain::Error => Decision::Skip("couldn't verify git state".to_string()),
        },
    }
}

/// `on_main(polecat)` procedure (spec §4.1): resolve the polecat's
/// worktree, read HEAD, test ancestry against every configured remote's
/// default branch, then the local default branch. First `true` wins.
///
/// `worktree_candidates` is tried in order (new layout first, then the
/// legacy layout) and the first one that exists is used.
pub fn on_main(
    git: &dyn GitDriver,
    worktree_candidates: &[&Path],
    default_branch: &str,
) -> OnMain {
    let Some(worktree) = worktree_candidates.iter().find(|p| p.is_dir()) else {
        return OnMain::Error;
    };

    let head = match git.rev(worktree, "HEAD") {
        Ok(sha) => sha,
        Err(_) => return OnMain::Error,
    };

    let remotes = git.remotes(worktree).unwrap_or_default();
    for remote in &remotes {
        let branch_ref = format!("{}/{}", remote, default_branch);
        if let Ok(true) = git.is_ancestor(worktree, &head, &branch_ref) {
            return OnMain::Yes;
        }
    }

    match git.is_ancestor(worktree, &head, default_branch) {
        Ok(true) => OnMain::Yes,
        Ok(false) => OnMain::No,
        Err(_) => OnMain::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_always_nukes() {
        assert_eq!(decide(CleanupStatus::Clean, OnMain::No), Decision::Nuke);
        assert_eq!(decide(CleanupStatus::Clean, OnMain::Error), Decision::Nuke);
    }

    #[test]
    fn dirty_statuses_block_regardless_of_on_main() {
        assert_eq!(
            decide(CleanupStatus::HasUncommitted, OnMain::Yes),
            Decision::Block("uncommitted".to_string())
        );
        assert_eq!(
            decide(CleanupStatus::HasStash, OnMain::Yes),
            Decision::Block("stash".to_string())
        );
        assert_eq!(
            decide(CleanupStatus::HasUnpushed, OnMain::Yes),
            Decision::Block("unpushed".to_string())
        );
    }

    #[test]
    fn empty_status_falls_back_to_on_main() {
        assert_eq!(decide(CleanupStatus::Unknown, OnMain::Yes), Decision::Nuke);
        assert!(matches!(
            decide(CleanupStatus::Unknown, OnMain::No),
            Decision::Skip(_)
        ));
        assert!(matches!(
            decide(CleanupStatus::Unknown, OnMain::Error),
            Decision::Skip(_)
        ));
    }

    #[test]
    fn on_main_is_error_when_no_worktree_candidate_exists() {
        use crate::adapters::test_support::fakes::FakeGit;
        let git = FakeGit::new();
        let missing = Path::new("/nonexistent/path/for/sure");
        assert_eq!(on_main(&git, &[missing], "main"), OnMain::Error);
    }

    #[test]
    fn on_main_prefers_remote_ancestry_over_local() {
        use crate::adapters::test_support::fakes::FakeGit;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let mut git = FakeGit::new();
        git.set_head(dir.path(), "deadbeef");
        git.set_remotes(dir.path(), vec!["origin".to_string()]);
        git.set_ancestor(dir.path(), "deadbeef", "origin/main", true);

        assert_eq!(on_main(&git, &[dir.path()], "main"), OnMain::Yes);
    }
}
