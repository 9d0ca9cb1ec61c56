//! Stalled Detector (spec §4.5): finds live sessions sitting on a known
//! interactive prompt and auto-dismisses it. No TOCTOU guard needed —
//! dismissing a prompt that isn't there is harmless.

use crate::witness::Context;

/// Fixed substrings this detector recognizes, and the known-prompt names
/// they classify as (initially only the bypass-permissions prompt, spec
/// §4.5).
const KNOWN_PROMPTS: &[(&str, &str)] = &[(
    "Bypass permissions mode",
    "bypass-permissions",
)];

#[derive(Debug, Clone)]
pub struct StalledRecord {
    pub polecat: String,
    pub prompt: String,
    pub dismissed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct StalledReport {
    pub checked: usize,
    pub stalled: Vec<StalledRecord>,
    pub errors: Vec<String>,
}

pub async fn detect(ctx: &Context<'_>) -> StalledReport {
    let mut report = StalledReport::default();
    let names = super::list_polecat_dirs(ctx);

    for name in names {
        let session = ctx.registry.polecat_session_name(&ctx.rig.session_prefix, &name);

        let alive = match ctx.mux.has_session(&session).await {
            Ok(true) => match ctx.mux.is_agent_alive(&session).await {
                Ok(v) => v,
                Err(e) => {
                    report.errors.push(format!("{}: {}", name, e));
                    continue;
                }
            },
            Ok(false) => false,
            Err(e) => {
                report.errors.push(format!("{}: {}", name, e));
                continue;
            }
        };

        if !alive {
            // Dead session or dead agent: the Zombie Detector's domain.
            continue;
        }
        report.checked += 1;

        let pane = match ctx.mux.capture_pane(&session, ctx.config.stalled_prompt_lines()).await {
            Ok(text) => text,
            Err(e) => {
                report.errors.push(format!("{}: capture_pane: {}", name, e));
                continue;
            }
        };

        if let Some((_, prompt_name)) = KNOWN_PROMPTS.iter().find(|(needle, _)| pane.contains(needle)) {
            let dismissed = ctx.mux.accept_prompt(&session).await;
            report.stalled.push(StalledRecord {
                polecat: name,
                prompt: prompt_name.to_string(),
                dismissed: dismissed.is_ok(),
                error: dismissed.err().map(|e| e.to_string()),
            });
        }
    }

    report
}
