//! Recovery & Notification (spec §4.6): the Nuke primitive, abandoned-bead
//! reset, escalation, peer wake, and cleanup-wisp lifecycle. Every
//! destructive path in the crate funnels through `nuke` so TOCTOU timing
//! and session-kill sequencing stay uniform, mirroring the way the
//! teacher's worktree manager centralizes its prune-then-remove sequence
//! in one method (`worktree/mod.rs::remove_worktree`) rather than letting
//! callers improvise it.

use crate::adapters::{BeadUpdate, MailMessage, Priority};
use crate::model::{CleanupWisp, WispState, WorkBead, WorkBeadStatus};
use crate::witness::Context;
use crate::Result;
use chrono::Utc;

/// Resolve a polecat's session name and destroy it: graceful interrupt,
/// a configured grace period, then force-kill, then the external destroy
/// command. Killing an already-dead session is a no-op (idempotence, §5).
pub async fn nuke(ctx: &Context<'_>, polecat: &str) -> Result<()> {
    let session = ctx
        .registry
        .polecat_session_name(&ctx.rig.session_prefix, polecat);

    if ctx.mux.has_session(&session).await? {
        // Best-effort: a graceful interrupt that the agent may ignore is
        // not worth failing the whole Nuke over.
        let _ = ctx.mux.send_keys(&session, "C-c").await;
        tokio::time::sleep(ctx.config.session_kill_grace()).await;
        ctx.mux.kill_session(&session).await?;
    }

    ctx.registry.destroy_polecat(&ctx.rig.name, polecat).await
}

/// Outcome of resetting an abandoned work bead.
#[derive(Debug, Clone)]
pub struct ResetOutcome {
    pub reset: bool,
    pub previous_status: Option<String>,
    pub mail_sent: bool,
}

/// Reset an abandoned bead to `open` with a cleared assignee, then
/// best-effort notify `deacon/` (spec §4.6). Already-open beads are
/// skipped rather than re-reset (idempotence, §5).
pub async fn reset_abandoned_bead(
    ctx: &Context<'_>,
    bead: &WorkBead,
    rig_polecat: &str,
) -> Result<ResetOutcome> {
    if !bead.status.is_abandonable() {
        return Ok(ResetOutcome {
            reset: false,
            previous_status: None,
            mail_sent: false,
        });
    }

    let previous_status = bead.status.as_str().to_string();
    ctx.tracker
        .update(
            &bead.id,
            BeadUpdate {
                status: Some(WorkBeadStatus::Open.as_str().to_string()),
                assignee: Some(None),
                ..Default::default()
            },
        )
        .await?;

    let mail_sent = ctx
        .mail
        .send(MailMessage {
            id: format!("recovered-{}-{}", bead.id, Utc::now().timestamp()),
            from: "witness".to_string(),
            to: "deacon/".to_string(),
            subject: format!("RECOVERED_BEAD {}", bead.id),
            body: format!(
                "bead={} rig/polecat={} previous-status={}",
                bead.id, rig_polecat, previous_status
            ),
            priority: Priority::High,
            message_type: "RECOVERED_BEAD".to_string(),
            timestamp: Utc::now(),
        })
        .await
        .is_ok();

    Ok(ResetOutcome {
        reset: true,
        previous_status: Some(previous_status),
        mail_sent,
    })
}

/// Full payload accompanying an urgent recovery escalation (spec §4.6).
pub struct RecoveryPayload<'a> {
    pub polecat: &'a str,
    pub cleanup_status: &'a str,
    pub branch: Option<&'a str>,
    pub issue_id: Option<&'a str>,
}

/// Post an urgent `RECOVERY_NEEDED` to `deacon/`. Best-effort: failure is
/// reported to the caller but never blocks the primary action.
pub async fn escalate_recovery(ctx: &Context<'_>, payload: RecoveryPayload<'_>) -> bool {
    ctx.mail
        .send(MailMessage {
            id: format!("recovery-{}-{}", payload.polecat, Utc::now().timestamp()),
            from: "witness".to_string(),
            to: "deacon/".to_string(),
            subject: format!("RECOVERY_NEEDED {}/{}", ctx.rig.name, payload.polecat),
            body: format!(
                "polecat={} rig={} cleanup_status={} branch={} issue_id={} detected_at={} note=force-nuke required after recovery",
                payload.polecat,
                ctx.rig.name,
                payload.cleanup_status,
                payload.branch.unwrap_or("?"),
                payload.issue_id.unwrap_or("?"),
                Utc::now(),
            ),
            priority: Priority::Urgent,
            message_type: "RECOVERY_NEEDED".to_string(),
            timestamp: Utc::now(),
        })
        .await
        .is_ok()
}

/// Fire-and-forget keystroke nudge to wake a peer session (spec §4.6). If
/// the peer isn't running, that's success — the mail already sent is the
/// source of truth, not the nudge.
pub async fn wake_peer(ctx: &Context<'_>, session_name: &str) -> bool {
    match ctx.mux.has_session(session_name).await {
        Ok(true) => ctx.mux.send_keys(session_name, "Enter").await.is_ok(),
        _ => true,
    }
}

const CLEANUP_LABEL: &str = "cleanup";

fn polecat_label(polecat: &str) -> String {
    format!("polecat:{}", polecat)
}

fn state_label(state: WispState) -> String {
    format!("state:{}", state.as_str())
}

/// Create a cleanup wisp in the given state (spec §3, §4.2).
pub async fn create_cleanup_wisp(
    ctx: &Context<'_>,
    polecat: &str,
    state: WispState,
) -> Result<String> {
    ctx.tracker
        .create(
            &format!("cleanup: {}", polecat),
            "created by witness for deferred cleanup",
            &[
                CLEANUP_LABEL.to_string(),
                polecat_label(polecat),
                state_label(state),
            ],
        )
        .await
}

/// At most one open cleanup wisp per polecat (P3). Returns the first match.
pub async fn find_open_cleanup_wisp(
    ctx: &Context<'_>,
    polecat: &str,
) -> Result<Option<CleanupWisp>> {
    let wisps = ctx.tracker.list(Some("open"), Some(CLEANUP_LABEL), None).await?;
    let want = polecat_label(polecat);
    Ok(wisps.into_iter().find(|w| w.labels.iter().any(|l| l == &want)).map(|bead| {
        let state = bead
            .labels
            .iter()
            .find_map(|l| l.strip_prefix("state:"))
            .map(parse_wisp_state)
            .unwrap_or(WispState::Pending);
        CleanupWisp {
            id: bead.id,
            polecat: polecat.to_string(),
            state,
        }
    }))
}

fn parse_wisp_state(value: &str) -> WispState {
    match value {
        "merge-requested" => WispState::MergeRequested,
        "merged" => WispState::Merged,
        "escalated" => WispState::Escalated,
        _ => WispState::Pending,
    }
}

/// Rewrite a cleanup wisp's full label set with a new state. The external
/// tracker CLI has no single "set one label" flag, so the complete desired
/// set is always sent (spec §4.6).
pub async fn transition_wisp_state(ctx: &Context<'_>, wisp_id: &str, new_state: WispState) -> Result<()> {
    let bead = ctx.tracker.show(wisp_id).await?;
    let polecat = bead
        .as_ref()
        .and_then(|b| b.labels.iter().find_map(|l| l.strip_prefix("polecat:")))
        .unwrap_or("unknown")
        .to_string();

    ctx.tracker
        .update(
            wisp_id,
            BeadUpdate {
                set_labels: Some(vec![
                    CLEANUP_LABEL.to_string(),
                    polecat_label(&polecat),
                    state_label(new_state),
                ]),
                ..Default::default()
            },
        )
        .await
}

/// Advance a swarm wisp's `started:<n>` counter by one member (SPEC_FULL
/// §2 supplement: SWARM_START creates the wisp; nothing in the core
/// advances it without this helper). Closing the wisp when the swarm
/// finishes is left to the external consumer reading `started`/`total`.
pub async fn record_swarm_member_started(ctx: &Context<'_>, swarm_wisp_id: &str) -> Result<()> {
    let bead = match ctx.tracker.show(swarm_wisp_id).await? {
        Some(bead) => bead,
        None => return Ok(()),
    };

    let mut labels = bead.labels.clone();
    let started: u64 = labels
        .iter()
        .find_map(|l| l.strip_prefix("started:"))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    labels.retain(|l| !l.starts_with("started:"));
    labels.push(format!("started:{}", started + 1));

    ctx.tracker
        .update(
            swarm_wisp_id,
            BeadUpdate {
                set_labels: Some(labels),
                ..Default::default()
            },
        )
        .await
}
