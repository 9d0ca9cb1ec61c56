//! Zombie Detector (spec §4.3): scans *from* the filesystem, enumerating
//! polecat directories and classifying each against its session and
//! agent bead.

use crate::model::{CleanupWisp, Polecat, WorkBeadStatus};
use crate::recovery::{self, RecoveryPayload};
use crate::safety::{self, Decision, OnMain};
use crate::witness::Context;
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct ZombieRecord {
    pub polecat: String,
    pub classification: String,
    pub hook_bead: Option<String>,
    pub action: String,
    pub bead_recovered: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ZombieReport {
    pub checked: usize,
    pub zombies: Vec<ZombieRecord>,
    pub errors: Vec<String>,
}

pub async fn detect(ctx: &Context<'_>) -> ZombieReport {
    let mut report = ZombieReport::default();
    let names = super::list_polecat_dirs(ctx);
    report.checked = names.len();

    for name in names {
        let polecat = Polecat {
            rig: ctx.rig.name.clone(),
            name: name.clone(),
        };
        let detected_at = Utc::now();
        let session = ctx.registry.polecat_session_name(&ctx.rig.session_prefix, &name);

        let session_exists = match ctx.mux.has_session(&session).await {
            Ok(v) => v,
            Err(e) => {
                report.errors.push(format!("{}: has_session: {}", name, e));
                continue;
            }
        };

        let agent_bead = match ctx.tracker.show(&polecat.agent_bead_id()).await {
            Ok(bead) => bead.map(|b| b.into_agent_bead()),
            Err(e) => {
                report.errors.push(format!("{}: agent bead lookup: {}", name, e));
                continue;
            }
        };
        let done_intent = agent_bead.as_ref().and_then(|b| b.done_intent());
        let hook_bead = agent_bead.as_ref().and_then(|b| b.hook_bead.clone());
        let agent_state = agent_bead.as_ref().map(|b| b.agent_state.clone()).unwrap_or_default();

        let record = if session_exists {
            classify_alive(ctx, &polecat, &session, done_intent, hook_bead.as_deref()).await
        } else {
            classify_dead(ctx, &polecat, &session, detected_at, done_intent, &agent_state, hook_bead.as_deref()).await
        };

        if let Some(record) = record {
            report.zombies.push(record);
        }
    }

    report
}

async fn classify_alive(
    ctx: &Context<'_>,
    polecat: &Polecat,
    session: &str,
    done_intent: Option<crate::model::DoneIntent>,
    hook_bead: Option<&str>,
) -> Option<ZombieRecord> {
    if let Some(intent) = &done_intent {
        if intent.age(Utc::now()) > ctx.config.done_intent_stuck_threshold() {
            return Some(nuke_and_reset(ctx, polecat, "stuck-in-done", hook_bead).await);
        }
    }

    match ctx.mux.is_agent_alive(session).await {
        Ok(false) => return Some(nuke_and_reset(ctx, polecat, "agent-dead-in-session", hook_bead).await),
        Err(e) => {
            return Some(ZombieRecord {
                polecat: polecat.name.clone(),
                classification: "probe-error".to_string(),
                hook_bead: hook_bead.map(String::from),
                action: "skipped".to_string(),
                bead_recovered: false,
                error: Some(e.to_string()),
            })
        }
        Ok(true) => {}
    }

    if let Some(id) = hook_bead {
        if let Ok(Some(bead)) = ctx.tracker.show(id).await {
            if bead.status == WorkBeadStatus::Closed.as_str() {
                return Some(nuke_only(ctx, polecat, "bead-closed-still-running").await);
            }
        }
    }

    let activity = ctx.mux.get_session_activity(session).await.ok().flatten();
    if let Some(last) = activity {
        if Utc::now().signed_duration_since(last) > ctx.config.hung_session_threshold() {
            return Some(nuke_and_reset(ctx, polecat, "agent-hung", hook_bead).await);
        }
    }

    None
}

#[allow(clippy::too_many_arguments)]
async fn classify_dead(
    ctx: &Context<'_>,
    polecat: &Polecat,
    session: &str,
    detected_at: chrono::DateTime<Utc>,
    done_intent: Option<crate::model::DoneIntent>,
    agent_state: &str,
    hook_bead: Option<&str>,
) -> Option<ZombieRecord> {
    if let Some(intent) = &done_intent {
        if intent.age(Utc::now()) < ctx.config.done_intent_grace_period() {
            return None;
        }
        return Some(nuke_and_reset(ctx, polecat, "done-intent-dead", hook_bead).await);
    }

    let is_candidate = hook_bead.is_some() || matches!(agent_state, "working" | "running" | "spawning");
    if !is_candidate {
        return None;
    }

    // TOCTOU guard: re-probe before acting. Unknowable creation time is
    // treated as recreated — fail safe by skipping (spec §4.3, §9).
    if let Ok(true) = ctx.mux.has_session(session).await {
        match ctx.mux.session_created_at(session).await {
            Ok(Some(created)) if created < detected_at => {}
            _ => return None,
        }
    }

    let cleanup_status = match ctx.tracker.show(&polecat.agent_bead_id()).await {
        Ok(Some(b)) => b.into_agent_bead().cleanup_status(),
        _ => crate::model::CleanupStatus::Unknown,
    };
    let on_main = if cleanup_status == crate::model::CleanupStatus::Unknown {
        on_main_for(ctx, polecat)
    } else {
        OnMain::Error
    };

    let decision = safety::decide(cleanup_status, on_main);
    let record = match decision {
        Decision::Nuke => match recovery::nuke(ctx, &polecat.name).await {
            Ok(()) => {
                let recovered = reset_hook_bead(ctx, polecat, hook_bead).await;
                ZombieRecord {
                    polecat: polecat.name.clone(),
                    classification: "zombie".to_string(),
                    hook_bead: hook_bead.map(String::from),
                    action: "nuked".to_string(),
                    bead_recovered: recovered,
                    error: None,
                }
            }
            Err(e) => ZombieRecord {
                polecat: polecat.name.clone(),
                classification: "zombie".to_string(),
                hook_bead: hook_bead.map(String::from),
                action: "nuke-failed".to_string(),
                bead_recovered: false,
                error: Some(e.to_string()),
            },
        },
        Decision::Skip(reason) => {
            if existing_wisp(ctx, &polecat.name).await.is_some() {
                ZombieRecord {
                    polecat: polecat.name.clone(),
                    classification: "zombie".to_string(),
                    hook_bead: hook_bead.map(String::from),
                    action: "already-tracked".to_string(),
                    bead_recovered: false,
                    error: None,
                }
            } else {
                let wisp = recovery::create_cleanup_wisp(ctx, &polecat.name, crate::model::WispState::Pending).await;
                let recovered = reset_hook_bead(ctx, polecat, hook_bead).await;
                ZombieRecord {
                    polecat: polecat.name.clone(),
                    classification: "zombie".to_string(),
                    hook_bead: hook_bead.map(String::from),
                    action: format!("cleanup-wisp-created: {}", reason),
                    bead_recovered: recovered,
                    error: wisp.as_ref().err().map(|e| e.to_string()),
                }
            }
        }
        Decision::Block(reason) => {
            if existing_wisp(ctx, &polecat.name).await.is_some() {
                ZombieRecord {
                    polecat: polecat.name.clone(),
                    classification: "zombie".to_string(),
                    hook_bead: hook_bead.map(String::from),
                    action: "already-tracked".to_string(),
                    bead_recovered: false,
                    error: None,
                }
            } else {
                recovery::escalate_recovery(
                    ctx,
                    RecoveryPayload {
                        polecat: &polecat.name,
                        cleanup_status: &reason,
                        branch: None,
                        issue_id: hook_bead,
                    },
                )
                .await;
                let wisp = recovery::create_cleanup_wisp(ctx, &polecat.name, crate::model::WispState::Escalated).await;
                let recovered = reset_hook_bead(ctx, polecat, hook_bead).await;
                ZombieRecord {
                    polecat: polecat.name.clone(),
                    classification: "zombie".to_string(),
                    hook_bead: hook_bead.map(String::from),
                    action: "escalated".to_string(),
                    bead_recovered: recovered,
                    error: wisp.err().map(|e| e.to_string()),
                }
            }
        }
    };

    Some(record)
}

async fn existing_wisp(ctx: &Context<'_>, polecat: &str) -> Option<CleanupWisp> {
    recovery::find_open_cleanup_wisp(ctx, polecat).await.ok().flatten()
}

fn on_main_for(ctx: &Context<'_>, polecat: &Polecat) -> OnMain {
    let new_layout = ctx
        .rig
        .root
        .join("polecats")
        .join(&polecat.name)
        .join(&ctx.rig.name);
    let legacy = ctx.rig.root.join("polecats").join(&polecat.name);
    safety::on_main(ctx.git, &[&new_layout, &legacy], &ctx.rig.default_branch)
}

async fn nuke_and_reset(
    ctx: &Context<'_>,
    polecat: &Polecat,
    classification: &str,
    hook_bead: Option<&str>,
) -> ZombieRecord {
    match recovery::nuke(ctx, &polecat.name).await {
        Ok(()) => {
            let recovered = reset_hook_bead(ctx, polecat, hook_bead).await;
            ZombieRecord {
                polecat: polecat.name.clone(),
                classification: classification.to_string(),
                hook_bead: hook_bead.map(String::from),
                action: "nuked".to_string(),
                bead_recovered: recovered,
                error: None,
            }
        }
        Err(e) => ZombieRecord {
            polecat: polecat.name.clone(),
            classification: classification.to_string(),
            hook_bead: hook_bead.map(String::from),
            action: "nuke-failed".to_string(),
            bead_recovered: false,
            error: Some(e.to_string()),
        },
    }
}

async fn nuke_only(ctx: &Context<'_>, polecat: &Polecat, classification: &str) -> ZombieRecord {
    match recovery::nuke(ctx, &polecat.name).await {
        Ok(()) => ZombieRecord {
            polecat: polecat.name.clone(),
            classification: classification.to_string(),
            hook_bead: None,
            action: "nuked".to_string(),
            bead_recovered: false,
            error: None,
        },
        Err(e) => ZombieRecord {
            polecat: polecat.name.clone(),
            classification: classification.to_string(),
            hook_bead: None,
            action: "nuke-failed".to_string(),
            bead_recovered: false,
            error: Some(e.to_string()),
        },
    }
}

async fn reset_hook_bead(ctx: &Context<'_>, polecat: &Polecat, hook_bead: Option<&str>) -> bool {
    let Some(id) = hook_bead else { return false };
    let Ok(Some(json)) = ctx.tracker.show(id).await else {
        return false;
    };
    let Some(bead) = json.into_work_bead() else {
        return false;
    };
    recovery::reset_abandoned_bead(ctx, &bead, &polecat.assignee())
        .await
        .map(|o| o.reset)
        .unwrap_or(false)
}
