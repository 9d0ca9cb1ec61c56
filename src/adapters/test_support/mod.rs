//! Test helpers for building small git repositories.
//!
//! Wraps `git2` plumbing so adapter/safety tests elsewhere don't need to
//! import it directly — same rationale as
//! `examples/Wirasm-shards/crates/kild-git/src/test_support.rs`.

use git2::{IndexAddOption, Repository, Signature};
use std::path::Path;

pub mod fakes;

pub fn init_repo_with_commit(path: &Path, initial_branch: &str) -> Result<(), git2::Error> {
    let repo = Repository::init(path)?;
    let sig = Signature::now("Test", "test@example.com")?;
    let tree_id = {
        let mut index = repo.index()?;
        index.write_tree()?
    };
    let tree = repo.find_tree(tree_id)?;
    let commit_oid = repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])?;
    let commit = repo.find_commit(commit_oid)?;
    repo.branch(initial_branch, &commit, true)?;
    repo.set_head(&format!("refs/heads/{}", initial_branch))?;
    Ok(())
}

/// Create a new branch at the current HEAD and switch subsequent commits to it.
pub fn branch_from_head(path: &Path, name: &str) -> Result<(), git2::Error> {
    let repo = Repository::open(path)?;
    let commit = repo.head()?.peel_to_commit()?;
    repo.branch(name, &commit, false)?;
    repo.set_head(&format!("refs/heads/{}", name))?;
    Ok(())
}

pub fn write_file(path: &Path, name: &str, contents: &str) {
    std::fs::write(path.join(name), contents).expect("write test file");
}

/// Stage every file and commit onto whatever branch HEAD currently points at.
pub fn commit_all(path: &Path, message: &str) -> Result<(), git2::Error> {
    let repo = Repository::open(path)?;
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let sig = Signature::now("Test", "test@example.com")?;
    let parent = repo.head()?.peel_to_commit()?;
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;
    Ok(())
}

pub fn add_remote(path: &Path, name: &str, url: &str) -> Result<(), git2::Error> {
    let repo = Repository::open(path)?;
    repo.remote(name, url)?;
    Ok(())
}
