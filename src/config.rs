//! Witness configuration, loaded from `<rig-root>/.witness/config.toml`.
//!
//! Grounded on `kild-core`'s config types: `Option<T>` fields with an
//! accessor that supplies the default, so a partially-specified TOML file
//! and a missing one behave identically (see
//! `examples/Wirasm-shards/crates/kild-core/src/config/types.rs`).

use crate::{Result, WitnessError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the detectors and the Nuke primitive (spec §4.1, §4.3,
/// §4.6). All thresholds are per-rig (spec §9 Open Question 1: the hung
/// threshold was a global constant in the original design; here every rig
/// gets its own `WitnessConfig`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WitnessConfig {
    #[serde(default)]
    pub rig: RigConfig,

    #[serde(default)]
    witness: WitnessTuning,
}

impl WitnessConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| WitnessError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Duration of inactivity before a live session is considered hung
    /// (spec §4.3 Branch A, `agent-hung`). Default: 30 minutes.
    pub fn hung_session_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.witness.hung_session_threshold_secs.unwrap_or(30 * 60) as i64)
    }

    /// Age past which a `done-intent` on a live session is `stuck-in-done`
    /// (spec §4.3 Branch A). Default: 60 seconds.
    pub fn done_intent_stuck_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.witness.done_intent_stuck_threshold_secs.unwrap_or(60) as i64)
    }

    /// Grace period during which a dead session with a fresh `done-intent`
    /// is assumed still finishing (spec §4.3 Branch B). Default: 30 seconds.
    pub fn done_intent_grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.witness.done_intent_grace_period_secs.unwrap_or(30) as i64)
    }

    /// Lines of pane output the Stalled Detector inspects (spec §4.5).
    /// Default: 30.
    pub fn stalled_prompt_lines(&self) -> usize {
        self.witness.stalled_prompt_lines.unwrap_or(30) as usize
    }

    /// Grace period between the graceful interrupt and the force-kill in
    /// the Nuke primitive (spec §4.6). Default: 100ms.
    pub fn session_kill_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.witness.session_kill_grace_ms.unwrap_or(100))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct WitnessTuning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hung_session_threshold_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    done_intent_stuck_threshold_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    done_intent_grace_period_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stalled_prompt_lines: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_kill_grace_ms: Option<u64>,
}

/// Identity of the rig this config belongs to (spec §3's Rig entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    #[serde(default = "default_rig_name")]
    pub name: String,
    #[serde(default = "default_root")]
    pub root: std::path::PathBuf,
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            name: default_rig_name(),
            root: default_root(),
            session_prefix: default_session_prefix(),
            default_branch: default_branch(),
        }
    }
}

impl RigConfig {
    pub fn into_rig(self) -> crate::model::Rig {
        crate::model::Rig {
            name: self.name,
            root: self.root,
            session_prefix: self.session_prefix,
            default_branch: self.default_branch,
        }
    }
}

fn default_rig_name() -> String {
    "default".to_string()
}

fn default_root() -> std::path::PathBuf {
    std::path::PathBuf::from(".")
}

fn default_session_prefix() -> String {
    "rig".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let config = WitnessConfig::load(Path::new("/nonexistent/.witness/config.toml")).unwrap();
        assert_eq!(config.hung_session_threshold(), chrono::Duration::minutes(30));
        assert_eq!(config.stalled_prompt_lines(), 30);
    }

    #[test]
    fn partial_toml_overrides_only_specified_fields() {
        let toml_str = r#"
[rig]
name = "acme"

[witness]
hung_session_threshold_secs = 600
"#;
        let config: WitnessConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rig.name, "acme");
        assert_eq!(config.hung_session_threshold(), chrono::Duration::seconds(600));
        assert_eq!(config.done_intent_stuck_threshold(), chrono::Duration::seconds(60));
    }
}
