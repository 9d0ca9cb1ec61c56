//! CLI command definitions (SPEC_FULL §1.5): `patrol`, `handle <file>`,
//! `status`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "witness")]
#[command(about = "Per-rig supervisor that reconciles polecat agent sessions against declared state", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the rig root (defaults to current directory)
    #[arg(short, long, global = true)]
    pub rig_root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sweep of all four detectors (zombie, stalled, orphaned
    /// beads, orphaned molecules) against the rig.
    Patrol,

    /// Feed one protocol message envelope (as JSON) to the reactive
    /// dispatcher, for manual replay or testing.
    Handle {
        /// Path to a JSON-encoded InboxEnvelope
        file: PathBuf,
    },

    /// Print adapter availability (tracker, multiplexer, mail, registry).
    Status,
}
