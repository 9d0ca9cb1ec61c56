//! Handlers for the six inbound protocol messages (spec §4.2). Each
//! returns a `HandlerResult`; `handled=true` means the caller must not
//! redeliver the message, even when `error` is set.

use super::{
    ExitType, HandlerResult, HelpPayload, InboxEnvelope, MergeFailedPayload, MergedPayload,
    PolecatDonePayload, SwarmStartPayload,
};
use crate::adapters::{MailMessage, Priority};
use crate::model::{CleanupStatus, Polecat, WispState};
use crate::recovery::{self, RecoveryPayload};
use crate::safety::{self, Decision, OnMain};
use crate::witness::Context;
use chrono::Utc;

fn worktree_candidates(ctx: &Context<'_>, polecat: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let new_layout = ctx.rig.root.join("polecats").join(polecat).join(&ctx.rig.name);
    let legacy = ctx.rig.root.join("polecats").join(polecat);
    (new_layout, legacy)
}

fn on_main_for(ctx: &Context<'_>, polecat: &str) -> OnMain {
    let (new_layout, legacy) = worktree_candidates(ctx, polecat);
    safety::on_main(ctx.git, &[&new_layout, &legacy], &ctx.rig.default_branch)
}

async fn current_cleanup_status(ctx: &Context<'_>, polecat: &str) -> CleanupStatus {
    let id = Polecat {
        rig: ctx.rig.name.clone(),
        name: polecat.to_string(),
    }
    .agent_bead_id();
    match ctx.tracker.show(&id).await {
        Ok(Some(bead)) => bead.into_agent_bead().cleanup_status(),
        _ => CleanupStatus::Unknown,
    }
}

async fn mail(
    ctx: &Context<'_>,
    to: &str,
    subject: impl Into<String>,
    body: impl Into<String>,
    priority: Priority,
    message_type: &str,
) -> bool {
    ctx.mail
        .send(MailMessage {
            id: format!("{}-{}", message_type.to_lowercase(), Utc::now().timestamp_nanos_opt().unwrap_or_default()),
            from: "witness".to_string(),
            to: to.to_string(),
            subject: subject.into(),
            body: body.into(),
            priority,
            message_type: message_type.to_string(),
            timestamp: Utc::now(),
        })
        .await
        .is_ok()
}

/// Create-or-escalate the usual "couldn't safely destroy" outcome for a
/// safety decision that wasn't `Nuke` (spec §4.2's "else create cleanup
/// wisp for manual intervention" for LIFECYCLE:Shutdown and the "otherwise"
/// branch of POLECAT_DONE).
async fn wisp_for_non_nuke(ctx: &Context<'_>, polecat: &str, decision: &Decision) -> Result<String, String> {
    let state = match decision {
        Decision::Block(_) => WispState::Escalated,
        _ => WispState::Pending,
    };
    recovery::create_cleanup_wisp(ctx, polecat, state).await.map_err(|e| e.to_string())
}

pub async fn handle_polecat_done(
    ctx: &Context<'_>,
    envelope: &InboxEnvelope,
    payload: &PolecatDonePayload,
) -> HandlerResult {
    let session = ctx.registry.polecat_session_name(&ctx.rig.session_prefix, &payload.polecat);
    let session_created = match ctx.mux.has_session(&session).await {
        Ok(true) => ctx.mux.session_created_at(&session).await.unwrap_or(None),
        _ => None,
    };
    if session_created.is_some() {
        let (stale, reason) = ctx
            .registry
            .stale_reason_for_times(envelope.timestamp, session_created);
        if stale {
            return HandlerResult::new(envelope, format!("ignored stale {}", reason.unwrap_or_default()));
        }
    }

    if payload.exit == ExitType::PhaseComplete {
        return HandlerResult::new(envelope, "phase-complete: session recycled, awaiting gate");
    }

    let pending_mr = payload.mr_id.is_some() || payload.exit == ExitType::Completed;
    if pending_mr {
        let wisp = recovery::create_cleanup_wisp(ctx, &payload.polecat, WispState::MergeRequested).await;
        let mut result = HandlerResult::new(envelope, "merge-requested: cleanup wisp opened");
        match &wisp {
            Ok(id) => result = result.with_wisp(id.clone()),
            Err(e) => result = result.with_error(format!("wisp creation failed: {}", e)),
        }

        let refinery_to = format!("{}/refinery/", ctx.rig.name);
        let sent = mail(
            ctx,
            &refinery_to,
            format!("MERGE_READY {}", payload.polecat),
            format!(
                "polecat={} issue_id={} branch={} mr_id={}",
                payload.polecat,
                payload.issue_id,
                payload.branch,
                payload.mr_id.as_deref().unwrap_or("?"),
            ),
            Priority::High,
            "MERGE_READY",
        )
        .await;
        result = result.with_mail_sent(sent);

        let refinery_session = ctx.registry.refinery_session_name(&ctx.rig.session_prefix);
        recovery::wake_peer(ctx, &refinery_session).await;

        return result;
    }

    let cleanup_status = current_cleanup_status(ctx, &payload.polecat).await;
    let on_main = on_main_for(ctx, &payload.polecat);
    let decision = safety::decide(cleanup_status, on_main);

    match decision {
        Decision::Nuke => match recovery::nuke(ctx, &payload.polecat).await {
            Ok(()) => HandlerResult::new(envelope, "nuked"),
            Err(e) => HandlerResult::new(envelope, "nuke-failed").with_error(e.to_string()),
        },
        other => {
            let mut result = HandlerResult::new(envelope, format!("cleanup wisp opened: {:?}", other));
            match wisp_for_non_nuke(ctx, &payload.polecat, &other).await {
                Ok(id) => result = result.with_wisp(id),
                Err(e) => result = result.with_error(e),
            }
            result
        }
    }
}

pub async fn handle_lifecycle_shutdown(ctx: &Context<'_>, envelope: &InboxEnvelope, polecat: &str) -> HandlerResult {
    let cleanup_status = current_cleanup_status(ctx, polecat).await;
    let on_main = on_main_for(ctx, polecat);
    let decision = safety::decide(cleanup_status, on_main);

    match decision {
        Decision::Nuke => match recovery::nuke(ctx, polecat).await {
            Ok(()) => HandlerResult::new(envelope, "nuked"),
            Err(e) => HandlerResult::new(envelope, "nuke-failed").with_error(e.to_string()),
        },
        other => {
            let mut result = HandlerResult::new(envelope, format!("cleanup wisp opened: {:?}", other));
            match wisp_for_non_nuke(ctx, polecat, &other).await {
                Ok(id) => result = result.with_wisp(id),
                Err(e) => result = result.with_error(e),
            }
            result
        }
    }
}

/// Whether the core can resolve a HELP request itself. No oracle for this
/// exists in the corpus this crate is grounded on, so the rule is
/// deliberately simple: two or fewer prior attempts means the agent hasn't
/// exhausted its own ideas yet, so let it keep trying; three or more means
/// it's stuck and a human should look.
fn assess_help(payload: &HelpPayload) -> bool {
    payload.tried.len() < 3
}

pub async fn handle_help(ctx: &Context<'_>, envelope: &InboxEnvelope, payload: &HelpPayload) -> HandlerResult {
    if assess_help(payload) {
        return HandlerResult::new(envelope, "can-help: no escalation needed");
    }

    let sent = mail(
        ctx,
        "deacon/",
        format!("Escalation: {} needs help", payload.agent),
        format!(
            "agent={} issue_id={} topic={} problem={} tried={}",
            payload.agent,
            payload.issue_id,
            payload.topic,
            payload.problem,
            payload.tried.join("; "),
        ),
        Priority::High,
        "HELP_ESCALATION",
    )
    .await;

    HandlerResult::new(envelope, "escalated").with_mail_sent(sent)
}

pub async fn handle_merged(ctx: &Context<'_>, envelope: &InboxEnvelope, payload: &MergedPayload) -> HandlerResult {
    let wisp = match recovery::find_open_cleanup_wisp(ctx, &payload.polecat).await {
        Ok(w) => w,
        Err(e) => return HandlerResult::new(envelope, "lookup-failed").with_error(e.to_string()),
    };
    let Some(wisp) = wisp else {
        return HandlerResult::new(envelope, "already-cleaned: no open cleanup wisp");
    };

    let on_main = on_main_for(ctx, &payload.polecat);
    if on_main == OnMain::No {
        return HandlerResult::new(envelope, "BLOCKED: possible stale merge")
            .with_error("MERGED signal may be stale, DO NOT NUKE".to_string());
    }

    let cleanup_status = current_cleanup_status(ctx, &payload.polecat).await;
    let decision = safety::decide(cleanup_status, on_main);

    match decision {
        Decision::Nuke => {
            let outcome = recovery::nuke(ctx, &payload.polecat).await;
            let _ = recovery::transition_wisp_state(ctx, &wisp.id, WispState::Merged).await;
            match outcome {
                Ok(()) => HandlerResult::new(envelope, "nuked").with_wisp(wisp.id),
                Err(e) => HandlerResult::new(envelope, "nuke-failed").with_error(e.to_string()).with_wisp(wisp.id),
            }
        }
        Decision::Block(reason) => {
            HandlerResult::new(envelope, format!("blocked: {}", reason)).with_wisp(wisp.id)
        }
        Decision::Skip(reason) => {
            HandlerResult::new(envelope, format!("skipped: {}", reason)).with_wisp(wisp.id)
        }
    }
}

pub async fn handle_merge_failed(ctx: &Context<'_>, envelope: &InboxEnvelope, payload: &MergeFailedPayload) -> HandlerResult {
    let to = format!("{}/polecats/{}", ctx.rig.name, payload.polecat);
    let sent = mail(
        ctx,
        &to,
        format!("Merge failed: {}", payload.failure_type),
        format!(
            "issue_id={} branch={} failure_type={} error={}",
            payload.issue_id, payload.branch, payload.failure_type, payload.error,
        ),
        Priority::High,
        "TASK",
    )
    .await;

    HandlerResult::new(envelope, "merge-failed-notified").with_mail_sent(sent)
}

pub async fn handle_swarm_start(ctx: &Context<'_>, envelope: &InboxEnvelope, payload: &SwarmStartPayload) -> HandlerResult {
    let labels = vec![
        format!("swarm:{}", payload.swarm_id),
        format!("total:{}", payload.total),
        "started:0".to_string(),
        format!("started_at:{}", payload.started_at.timestamp()),
    ];
    let created = ctx
        .tracker
        .create(
            &format!("swarm: {}", payload.swarm_id),
            "created by witness to track swarm progress",
            &labels,
        )
        .await;

    match created {
        Ok(id) => HandlerResult::new(envelope, "swarm wisp created").with_wisp(id),
        Err(e) => HandlerResult::new(envelope, "swarm wisp creation failed").with_error(e.to_string()),
    }
}
