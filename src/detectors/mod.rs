//! Proactive detectors (spec §4.3–§4.5): periodic sweeps that complement
//! the reactive protocol handlers. Run in patrol order
//! *Zombie → Stalled → OrphanedBead → OrphanedMolecule* (spec §2).

pub mod orphan;
pub mod stalled;
pub mod zombie;

pub use orphan::{OrphanedBeadReport, OrphanedMoleculeReport};
pub use stalled::StalledReport;
pub use zombie::ZombieReport;

use crate::witness::Context;

/// List the non-hidden immediate subdirectories of `<rig>/polecats/` —
/// the filesystem-side candidate set shared by the Zombie and Stalled
/// detectors (spec §4.3, §4.5).
pub(crate) fn list_polecat_dirs(ctx: &Context<'_>) -> Vec<String> {
    let polecats_dir = ctx.rig.root.join("polecats");
    let Ok(entries) = std::fs::read_dir(&polecats_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// Bundles all four detector reports from one patrol pass (SPEC_FULL §2
/// supplement; the spec describes the reports individually but a host
/// running a patrol tick needs them aggregated).
#[derive(Debug, Default)]
pub struct PatrolReport {
    pub zombie: ZombieReport,
    pub stalled: StalledReport,
    pub orphaned_beads: OrphanedBeadReport,
    pub orphaned_molecules: OrphanedMoleculeReport,
}

/// Run the four detectors in spec order against one rig.
pub async fn run_patrol(ctx: &Context<'_>) -> PatrolReport {
    PatrolReport {
        zombie: zombie::detect(ctx).await,
        stalled: stalled::detect(ctx).await,
        orphaned_beads: orphan::detect_orphaned_beads(ctx).await,
        orphaned_molecules: orphan::detect_orphaned_molecules(ctx).await,
    }
}
