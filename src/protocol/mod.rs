//! Protocol messages (spec §4.2): the six inbound message shapes the core
//! reacts to, and the envelope/staleness logic shared by every handler.

pub mod handlers;

use crate::{Result, WitnessError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The at-least-once envelope a message arrives in (mirrors the outbound
/// `MailMessage` shape in `adapters::mod`, since the router is symmetric).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEnvelope {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitType {
    Completed,
    Escalated,
    Deferred,
    PhaseComplete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolecatDonePayload {
    pub polecat: String,
    pub issue_id: String,
    pub branch: String,
    #[serde(default)]
    pub mr_id: Option<String>,
    pub exit: ExitType,
    #[serde(default)]
    pub gate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelpPayload {
    pub agent: String,
    pub issue_id: String,
    pub topic: String,
    pub problem: String,
    #[serde(default)]
    pub tried: Vec<String>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergedPayload {
    pub polecat: String,
    pub issue_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeFailedPayload {
    pub polecat: String,
    pub issue_id: String,
    pub branch: String,
    pub failure_type: String,
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwarmStartPayload {
    pub swarm_id: String,
    pub total: u32,
    pub started_at: DateTime<Utc>,
}

/// The six inbound protocol messages the core understands (spec §4.2).
#[derive(Debug, Clone)]
pub enum ProtocolMessage {
    PolecatDone(PolecatDonePayload),
    LifecycleShutdown { polecat: String },
    Help(HelpPayload),
    Merged(MergedPayload),
    MergeFailed(MergeFailedPayload),
    SwarmStart(SwarmStartPayload),
}

/// Parse an envelope into one of the six known message shapes. The
/// `LIFECYCLE:Shutdown` type carries its payload in the subject (a bare
/// polecat name) rather than JSON in the body, matching how the spec
/// describes it as "extracted from the subject".
pub fn parse_message(envelope: &InboxEnvelope) -> Result<ProtocolMessage> {
    match envelope.message_type.as_str() {
        "POLECAT_DONE" => serde_json::from_str(&envelope.body)
            .map(ProtocolMessage::PolecatDone)
            .map_err(|e| WitnessError::Parse(format!("POLECAT_DONE: {}", e))),
        "LIFECYCLE:Shutdown" => {
            let polecat = envelope.subject.trim();
            if polecat.is_empty() {
                return Err(WitnessError::Parse("LIFECYCLE:Shutdown: empty subject".to_string()));
            }
            Ok(ProtocolMessage::LifecycleShutdown {
                polecat: polecat.to_string(),
            })
        }
        "HELP" => serde_json::from_str(&envelope.body)
            .map(ProtocolMessage::Help)
            .map_err(|e| WitnessError::Parse(format!("HELP: {}", e))),
        "MERGED" => serde_json::from_str(&envelope.body)
            .map(ProtocolMessage::Merged)
            .map_err(|e| WitnessError::Parse(format!("MERGED: {}", e))),
        "MERGE_FAILED" => serde_json::from_str(&envelope.body)
            .map(ProtocolMessage::MergeFailed)
            .map_err(|e| WitnessError::Parse(format!("MERGE_FAILED: {}", e))),
        "SWARM_START" => serde_json::from_str(&envelope.body)
            .map(ProtocolMessage::SwarmStart)
            .map_err(|e| WitnessError::Parse(format!("SWARM_START: {}", e))),
        other => Err(WitnessError::Parse(format!("unknown message type: {}", other))),
    }
}

/// Outcome of one handler invocation (spec §4.2).
#[derive(Debug, Clone)]
pub struct HandlerResult {
    pub message_id: String,
    pub message_type: String,
    pub handled: bool,
    pub action: String,
    pub wisp_created: Option<String>,
    pub mail_sent: bool,
    pub error: Option<String>,
}

impl HandlerResult {
    pub fn new(envelope: &InboxEnvelope, action: impl Into<String>) -> Self {
        Self {
            message_id: envelope.id.clone(),
            message_type: envelope.message_type.clone(),
            handled: true,
            action: action.into(),
            wisp_created: None,
            mail_sent: false,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_wisp(mut self, wisp_id: impl Into<String>) -> Self {
        self.wisp_created = Some(wisp_id.into());
        self
    }

    pub fn with_mail_sent(mut self, sent: bool) -> Self {
        self.mail_sent = sent;
        self
    }

    pub fn unhandled(envelope: &InboxEnvelope, error: impl Into<String>) -> Self {
        Self {
            message_id: envelope.id.clone(),
            message_type: envelope.message_type.clone(),
            handled: false,
            action: "parse-error".to_string(),
            wisp_created: None,
            mail_sent: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(message_type: &str, subject: &str, body: &str) -> InboxEnvelope {
        InboxEnvelope {
            id: "msg-1".to_string(),
            from: "acme/polecats/alpha".to_string(),
            to: "witness".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            message_type: message_type.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn parses_polecat_done() {
        let body = r#"{"polecat":"alpha","issue_id":"WORK-1","branch":"b","exit":"COMPLETED"}"#;
        let msg = parse_message(&envelope("POLECAT_DONE", "", body)).unwrap();
        assert!(matches!(msg, ProtocolMessage::PolecatDone(_)));
    }

    #[test]
    fn parses_lifecycle_shutdown_from_subject() {
        let msg = parse_message(&envelope("LIFECYCLE:Shutdown", "alpha", "")).unwrap();
        match msg {
            ProtocolMessage::LifecycleShutdown { polecat } => assert_eq!(polecat, "alpha"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        assert!(parse_message(&envelope("UNKNOWN", "", "")).is_err());
    }
}
