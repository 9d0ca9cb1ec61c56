//! Core: the shared context handed to every handler and detector, and the
//! two cooperative loops that drive a rig (spec §5's "reactive loop" /
//! "patrol loop" scheduling model).

use crate::adapters::{GitDriver, IssueTracker, MailRouter, MultiplexerDriver, WorkspaceRegistry};
use crate::config::WitnessConfig;
use crate::detectors::{self, PatrolReport};
use crate::model::Rig;
use crate::protocol::{self, handlers, HandlerResult, InboxEnvelope, ProtocolMessage};

/// Everything a handler or detector needs to reach the outside world for
/// one rig. Borrowed rather than owned: the core never outlives the
/// collaborators it was constructed with, and nothing here needs to be
/// `Clone` (spec §5: "no in-memory locks across suspension points").
pub struct Context<'a> {
    pub rig: &'a Rig,
    pub config: &'a WitnessConfig,
    pub tracker: &'a dyn IssueTracker,
    pub mux: &'a dyn MultiplexerDriver,
    pub git: &'a dyn GitDriver,
    pub mail: &'a dyn MailRouter,
    pub registry: &'a dyn WorkspaceRegistry,
}

/// Parse one envelope and dispatch it to its handler (spec §4.2). A parse
/// failure is reported via `HandlerResult::unhandled` rather than
/// propagated, since the caller (the reactive loop) must still decide
/// whether to redeliver.
pub async fn dispatch(ctx: &Context<'_>, envelope: &InboxEnvelope) -> HandlerResult {
    let message = match protocol::parse_message(envelope) {
        Ok(m) => m,
        Err(e) => return HandlerResult::unhandled(envelope, e.to_string()),
    };

    match message {
        ProtocolMessage::PolecatDone(payload) => handlers::handle_polecat_done(ctx, envelope, &payload).await,
        ProtocolMessage::LifecycleShutdown { polecat } => {
            handlers::handle_lifecycle_shutdown(ctx, envelope, &polecat).await
        }
        ProtocolMessage::Help(payload) => handlers::handle_help(ctx, envelope, &payload).await,
        ProtocolMessage::Merged(payload) => handlers::handle_merged(ctx, envelope, &payload).await,
        ProtocolMessage::MergeFailed(payload) => handlers::handle_merge_failed(ctx, envelope, &payload).await,
        ProtocolMessage::SwarmStart(payload) => handlers::handle_swarm_start(ctx, envelope, &payload).await,
    }
}

/// Drain one batch of inbox envelopes serially (spec §5: "a reactive loop
/// that serially drains the inbox"). The caller supplies the batch —
/// how envelopes are read off the mail router's inbox is a transport
/// concern outside this crate's collaborator contracts.
pub async fn run_reactive_batch(ctx: &Context<'_>, envelopes: &[InboxEnvelope]) -> Vec<HandlerResult> {
    let mut results = Vec::with_capacity(envelopes.len());
    for envelope in envelopes {
        results.push(dispatch(ctx, envelope).await);
    }
    results
}

/// Run one patrol tick: the four detectors in spec order (spec §2, §5).
pub async fn run_patrol_tick(ctx: &Context<'_>) -> PatrolReport {
    detectors::run_patrol(ctx).await
}
