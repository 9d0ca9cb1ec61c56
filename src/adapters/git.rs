//! Git driver adapter — ancestry checks backing `on_main` (spec §4.1).
//!
//! Grounded on `worktree/mod.rs` and `isolation/mod.rs`'s direct use of
//! `git2::Repository` for branch/worktree lookups; this adapter is the
//! same library used the same way, behind the `GitDriver` seam so the
//! safety policy can be tested against a fake instead.

use super::{Collaborator, GitDriver};
use crate::{Result, WitnessError};
use git2::Repository;
use std::path::Path;

pub struct Git2Driver;

impl Git2Driver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Git2Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Collaborator for Git2Driver {
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "git"
    }
}

impl GitDriver for Git2Driver {
    fn rev(&self, worktree: &Path, rev: &str) -> Result<String> {
        let repo = Repository::open(worktree)?;
        let commit = repo.revparse_single(rev)?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    fn remotes(&self, worktree: &Path) -> Result<Vec<String>> {
        let repo = Repository::open(worktree)?;
        let remotes = repo.remotes()?;
        Ok(remotes.iter().flatten().map(String::from).collect())
    }

    fn is_ancestor(&self, worktree: &Path, sha: &str, branch: &str) -> Result<bool> {
        let repo = Repository::open(worktree)?;
        let sha_oid = git2::Oid::from_str(sha)
            .map_err(|e| WitnessError::Verification(format!("bad sha {}: {}", sha, e)))?;
        let branch_commit = repo.revparse_single(branch)?.peel_to_commit()?;
        // `git_graph_descendant_of` is strict (a commit is not its own
        // descendant); ancestry here must match `git merge-base
        // --is-ancestor`'s reflexive semantics so a polecat sitting exactly
        // at the branch tip (no unique commits) is recognized as on_main.
        if branch_commit.id() == sha_oid {
            return Ok(true);
        }
        Ok(repo.graph_descendant_of(branch_commit.id(), sha_oid)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{
        branch_from_head, commit_all, init_repo_with_commit, write_file,
    };
    use tempfile::tempdir;

    #[test]
    fn head_is_ancestor_of_itself_via_main() {
        let dir = tempdir().unwrap();
        init_repo_with_commit(dir.path(), "main").unwrap();
        let driver = Git2Driver::new();
        let head = driver.rev(dir.path(), "HEAD").unwrap();
        assert!(driver.is_ancestor(dir.path(), &head, "main").unwrap());
    }

    #[test]
    fn diverged_branch_is_not_ancestor_of_main() {
        let dir = tempdir().unwrap();
        init_repo_with_commit(dir.path(), "main").unwrap();
        let driver = Git2Driver::new();

        // Diverge onto a feature branch; `main` stays at the base commit.
        branch_from_head(dir.path(), "feature").unwrap();
        write_file(dir.path(), "extra.txt", "more work");
        commit_all(dir.path(), "unpushed work").unwrap();
        let head = driver.rev(dir.path(), "HEAD").unwrap();

        assert!(!driver.is_ancestor(dir.path(), &head, "main").unwrap());
        assert!(driver.is_ancestor(dir.path(), &head, "feature").unwrap());
    }
}
