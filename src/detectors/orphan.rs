//! Orphaned Bead and Orphaned Molecule detectors (spec §4.4): beads and
//! molecules left pointing at a polecat that no longer exists on disk and
//! has no live session.

use crate::model::WorkBeadStatus;
use crate::recovery;
use crate::witness::Context;

#[derive(Debug, Clone)]
pub struct OrphanedBeadRecord {
    pub bead_id: String,
    pub polecat: String,
    pub previous_status: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct OrphanedBeadReport {
    pub scanned: usize,
    pub recovered: Vec<OrphanedBeadRecord>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OrphanedMoleculeRecord {
    pub molecule_id: String,
    pub bead_id: String,
    pub closed_children: usize,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct OrphanedMoleculeReport {
    pub scanned: usize,
    pub closed: Vec<OrphanedMoleculeRecord>,
    pub errors: Vec<String>,
}

const MOLECULE_CLOSE_REASON: &str = "parent polecat is gone; molecule orphaned";

/// Recursively close every non-closed descendant of `parent_id`, bottom-up
/// (spec §4.4 step 3, P6: "every non-closed descendant exactly once").
/// Boxed because async fns can't recurse directly.
fn close_descendants<'a>(
    ctx: &'a Context<'a>,
    parent_id: String,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = usize> + 'a>> {
    Box::pin(async move {
        let children = ctx.tracker.list(None, None, Some(&parent_id)).await.unwrap_or_default();
        let mut closed = 0;
        for child in children {
            if child.status == WorkBeadStatus::Closed.as_str() {
                continue;
            }
            closed += close_descendants(ctx, child.id.clone()).await;
            if ctx.tracker.close(&child.id, MOLECULE_CLOSE_REASON).await.is_ok() {
                closed += 1;
            }
        }
        closed
    })
}

/// True if the polecat has neither a filesystem directory nor a live
/// session — the orphan predicate shared by both detectors (spec §4.4).
async fn polecat_is_gone(ctx: &Context<'_>, polecat: &str) -> bool {
    let dir = ctx.rig.root.join("polecats").join(polecat);
    if dir.exists() {
        return false;
    }
    let session = ctx.registry.polecat_session_name(&ctx.rig.session_prefix, polecat);
    !matches!(ctx.mux.has_session(&session).await, Ok(true))
}

async fn in_progress_and_hooked(ctx: &Context<'_>) -> Vec<crate::adapters::BeadJson> {
    let mut beads = Vec::new();
    for status in [WorkBeadStatus::InProgress, WorkBeadStatus::Hooked] {
        if let Ok(found) = ctx.tracker.list(Some(status.as_str()), None, None).await {
            beads.extend(found);
        }
    }
    beads
}

/// Reset beads whose assignee names a polecat that no longer exists
/// (spec §4.4). Re-checks gone-ness immediately before acting to close
/// the TOCTOU window against a polecat that just finished starting up.
pub async fn detect_orphaned_beads(ctx: &Context<'_>) -> OrphanedBeadReport {
    let mut report = OrphanedBeadReport::default();
    let beads = in_progress_and_hooked(ctx).await;

    for json in beads {
        let Some(bead) = json.into_work_bead() else {
            continue;
        };
        let Some(polecat) = bead.assignee_polecat(&ctx.rig.name) else {
            continue;
        };
        report.scanned += 1;

        if !polecat_is_gone(ctx, &polecat).await {
            continue;
        }
        // TOCTOU: re-check immediately before mutating.
        if !polecat_is_gone(ctx, &polecat).await {
            continue;
        }

        let rig_polecat = format!("{}/polecats/{}", ctx.rig.name, polecat);
        match recovery::reset_abandoned_bead(ctx, &bead, &rig_polecat).await {
            Ok(outcome) if outcome.reset => {
                report.recovered.push(OrphanedBeadRecord {
                    bead_id: bead.id,
                    polecat,
                    previous_status: outcome.previous_status,
                    error: None,
                });
            }
            Ok(_) => {}
            Err(e) => report.errors.push(format!("{}: {}", bead.id, e)),
        }
    }

    report
}

/// Close molecules attached to orphaned beads, recursively closing their
/// children first (spec §4.4, P6). A molecule already closed, or one that
/// can't be found, is left alone rather than treated as an error.
pub async fn detect_orphaned_molecules(ctx: &Context<'_>) -> OrphanedMoleculeReport {
    let mut report = OrphanedMoleculeReport::default();
    let beads = in_progress_and_hooked(ctx).await;

    for json in beads {
        let Some(bead) = json.into_work_bead() else {
            continue;
        };
        let Some(polecat) = bead.assignee_polecat(&ctx.rig.name) else {
            continue;
        };
        let Some(molecule_id) = bead.attached_molecule() else {
            continue;
        };
        report.scanned += 1;

        if !polecat_is_gone(ctx, &polecat).await {
            continue;
        }
        if !polecat_is_gone(ctx, &polecat).await {
            continue;
        }

        let molecule = match ctx.tracker.show(&molecule_id).await {
            Ok(Some(m)) => m,
            Ok(None) => continue,
            Err(e) => {
                report.errors.push(format!("{}: {}", molecule_id, e));
                continue;
            }
        };
        if molecule.status == WorkBeadStatus::Closed.as_str() {
            continue;
        }

        let closed_children = close_descendants(ctx, molecule_id.clone()).await;

        match ctx.tracker.close(&molecule_id, MOLECULE_CLOSE_REASON).await {
            Ok(()) => {
                let rig_polecat = format!("{}/polecats/{}", ctx.rig.name, polecat);
                let _ = recovery::reset_abandoned_bead(ctx, &bead, &rig_polecat).await;
                report.closed.push(OrphanedMoleculeRecord {
                    molecule_id,
                    bead_id: bead.id,
                    closed_children,
                    error: None,
                });
            }
            Err(e) => report.errors.push(format!("{}: {}", molecule_id, e)),
        }
    }

    report
}
