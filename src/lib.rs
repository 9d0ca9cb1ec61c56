//! Witness: per-rig supervisor keeping polecat worker sessions safe from
//! work-loss and resource leaks.
//!
//! Observes each polecat's session, worktree directory, and agent bead
//! against their declared states, decides the correct cleanup action
//! without losing work, and re-issues abandoned work for redispatch.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod detectors;
pub mod model;
pub mod protocol;
pub mod recovery;
pub mod safety;
pub mod witness;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WitnessError {
    #[error("issue tracker error: {0}")]
    Tracker(String),

    #[error("multiplexer error: {0}")]
    Multiplexer(String),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("mail router error: {0}")]
    Mail(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("verification error: {0}")]
    Verification(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, WitnessError>;
