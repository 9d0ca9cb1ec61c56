//! In-memory fakes for the four external-collaborator traits (spec §6),
//! following the "single seam so tests can inject a fake" design note
//! (spec §9) and the teacher's pattern of keeping integrations behind a
//! narrow trait so nothing downstream needs a real binary on `PATH`.

use crate::adapters::{
    BeadJson, BeadUpdate, Collaborator, GitDriver, IssueTracker, MailMessage, MailRouter,
    MultiplexerDriver, WorkspaceRegistry,
};
use crate::{Result, WitnessError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory issue tracker. Beads are keyed by id; `children` models
/// `--parent=<id>` listing since `BeadJson` itself carries no parent field.
#[derive(Default)]
pub struct FakeTracker {
    beads: Mutex<HashMap<String, BeadJson>>,
    children: Mutex<HashMap<String, Vec<String>>>,
    next_id: Mutex<u64>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bead: BeadJson) {
        self.beads.lock().unwrap().insert(bead.id.clone(), bead);
    }

    pub fn set_children(&self, parent: &str, children: Vec<String>) {
        self.children.lock().unwrap().insert(parent.to_string(), children);
    }

    pub fn get(&self, id: &str) -> Option<BeadJson> {
        self.beads.lock().unwrap().get(id).cloned()
    }

    pub fn all(&self) -> Vec<BeadJson> {
        self.beads.lock().unwrap().values().cloned().collect()
    }
}

impl Collaborator for FakeTracker {
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fake-tracker"
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn show(&self, id: &str) -> Result<Option<BeadJson>> {
        Ok(self.get(id))
    }

    async fn list(
        &self,
        status: Option<&str>,
        label: Option<&str>,
        parent: Option<&str>,
    ) -> Result<Vec<BeadJson>> {
        if let Some(parent) = parent {
            let children = self.children.lock().unwrap();
            let ids = children.get(parent).cloned().unwrap_or_default();
            let beads = self.beads.lock().unwrap();
            return Ok(ids
                .iter()
                .filter_map(|id| beads.get(id).cloned())
                .filter(|b| status.is_none_or(|s| b.status == s))
                .collect());
        }

        let beads = self.beads.lock().unwrap();
        Ok(beads
            .values()
            .filter(|b| status.is_none_or(|s| b.status == s))
            .filter(|b| label.is_none_or(|l| b.labels.iter().any(|bl| bl == l)))
            .cloned()
            .collect())
    }

    async fn create(&self, title: &str, description: &str, labels: &[String]) -> Result<String> {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = format!("WISP-{}", *next);
        self.insert(BeadJson {
            id: id.clone(),
            status: "open".to_string(),
            description: format!("{}\n{}", title, description),
            labels: labels.to_vec(),
            ..Default::default()
        });
        Ok(id)
    }

    async fn update(&self, id: &str, patch: BeadUpdate) -> Result<()> {
        let mut beads = self.beads.lock().unwrap();
        let bead = beads
            .get_mut(id)
            .ok_or_else(|| WitnessError::Tracker(format!("no such bead {}", id)))?;
        if let Some(labels) = patch.set_labels {
            bead.labels = labels;
        }
        if let Some(status) = patch.status {
            bead.status = status;
        }
        if let Some(assignee) = patch.assignee {
            bead.assignee = assignee;
        }
        Ok(())
    }

    async fn close(&self, id: &str, _reason: &str) -> Result<()> {
        let mut beads = self.beads.lock().unwrap();
        let bead = beads
            .get_mut(id)
            .ok_or_else(|| WitnessError::Tracker(format!("no such bead {}", id)))?;
        bead.status = "closed".to_string();
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct SessionFixture {
    created_at: Option<DateTime<Utc>>,
    activity: Option<DateTime<Utc>>,
    agent_alive: bool,
    pane_text: String,
}

/// In-memory terminal-multiplexer. `calls` records every mutating
/// operation in order, for assertions that a nudge/kill actually happened.
#[derive(Default)]
pub struct FakeMultiplexer {
    sessions: Mutex<HashMap<String, SessionFixture>>,
    calls: Mutex<Vec<String>>,
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(&self, name: &str, created_at: DateTime<Utc>) {
        self.sessions.lock().unwrap().insert(
            name.to_string(),
            SessionFixture {
                created_at: Some(created_at),
                activity: Some(created_at),
                agent_alive: true,
                pane_text: String::new(),
            },
        );
    }

    pub fn set_agent_alive(&self, name: &str, alive: bool) {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(name) {
            s.agent_alive = alive;
        }
    }

    pub fn set_activity(&self, name: &str, at: DateTime<Utc>) {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(name) {
            s.activity = Some(at);
        }
    }

    pub fn set_pane_text(&self, name: &str, text: &str) {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(name) {
            s.pane_text = text.to_string();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Collaborator for FakeMultiplexer {
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fake-multiplexer"
    }
}

#[async_trait]
impl MultiplexerDriver for FakeMultiplexer {
    async fn has_session(&self, name: &str) -> Result<bool> {
        Ok(self.sessions.lock().unwrap().contains_key(name))
    }

    async fn session_created_at(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.sessions.lock().unwrap().get(name).and_then(|s| s.created_at))
    }

    async fn capture_pane(&self, name: &str, _lines: usize) -> Result<String> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(name)
            .map(|s| s.pane_text.clone())
            .unwrap_or_default())
    }

    async fn get_session_activity(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.sessions.lock().unwrap().get(name).and_then(|s| s.activity))
    }

    async fn is_agent_alive(&self, name: &str) -> Result<bool> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(name)
            .map(|s| s.agent_alive)
            .unwrap_or(false))
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("send_keys:{}:{}", name, keys));
        Ok(())
    }

    async fn accept_prompt(&self, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("accept_prompt:{}", name));
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("kill_session:{}", name));
        self.sessions.lock().unwrap().remove(name);
        Ok(())
    }
}

/// In-memory git driver, fixtures keyed by worktree path.
#[derive(Default)]
pub struct FakeGit {
    heads: Mutex<HashMap<PathBuf, String>>,
    remotes: Mutex<HashMap<PathBuf, Vec<String>>>,
    ancestry: Mutex<HashMap<(PathBuf, String, String), bool>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, worktree: &Path, sha: &str) {
        self.heads.lock().unwrap().insert(worktree.to_path_buf(), sha.to_string());
    }

    pub fn set_remotes(&self, worktree: &Path, remotes: Vec<String>) {
        self.remotes.lock().unwrap().insert(worktree.to_path_buf(), remotes);
    }

    pub fn set_ancestor(&self, worktree: &Path, sha: &str, branch: &str, value: bool) {
        self.ancestry
            .lock()
            .unwrap()
            .insert((worktree.to_path_buf(), sha.to_string(), branch.to_string()), value);
    }
}

impl Collaborator for FakeGit {
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fake-git"
    }
}

impl GitDriver for FakeGit {
    fn rev(&self, worktree: &Path, rev: &str) -> Result<String> {
        if rev != "HEAD" {
            return Err(WitnessError::Verification(format!("unsupported rev {}", rev)));
        }
        self.heads
            .lock()
            .unwrap()
            .get(worktree)
            .cloned()
            .ok_or_else(|| WitnessError::Verification("no HEAD fixture".to_string()))
    }

    fn remotes(&self, worktree: &Path) -> Result<Vec<String>> {
        Ok(self.remotes.lock().unwrap().get(worktree).cloned().unwrap_or_default())
    }

    fn is_ancestor(&self, worktree: &Path, sha: &str, branch: &str) -> Result<bool> {
        Ok(self
            .ancestry
            .lock()
            .unwrap()
            .get(&(worktree.to_path_buf(), sha.to_string(), branch.to_string()))
            .copied()
            .unwrap_or(false))
    }
}

/// In-memory mail router; `sent` accumulates every delivered message.
#[derive(Default)]
pub struct FakeMail {
    sent: Mutex<Vec<MailMessage>>,
}

impl FakeMail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Collaborator for FakeMail {
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fake-mail"
    }
}

#[async_trait]
impl MailRouter for FakeMail {
    async fn send(&self, message: MailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// In-memory workspace registry: fixed naming scheme, configurable
/// staleness fixtures, and a call log for `destroy_polecat`.
#[derive(Default)]
pub struct FakeRegistry {
    staleness_grace: Option<Duration>,
    destroyed: Mutex<Vec<(String, String)>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            staleness_grace: Some(Duration::seconds(5)),
            destroyed: Mutex::new(Vec::new()),
        }
    }

    pub fn destroyed(&self) -> Vec<(String, String)> {
        self.destroyed.lock().unwrap().clone()
    }
}

impl Collaborator for FakeRegistry {
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fake-registry"
    }
}

#[async_trait]
impl WorkspaceRegistry for FakeRegistry {
    fn find(&self, work_dir: &Path) -> Result<PathBuf> {
        Ok(work_dir.to_path_buf())
    }

    fn init_registry(&self, _town_root: &Path) -> Result<()> {
        Ok(())
    }

    fn polecat_session_name(&self, rig_prefix: &str, polecat: &str) -> String {
        format!("{}-{}", rig_prefix, polecat)
    }

    fn refinery_session_name(&self, rig_prefix: &str) -> String {
        format!("{}-refinery", rig_prefix)
    }

    fn stale_reason_for_times(
        &self,
        msg_ts: DateTime<Utc>,
        session_created_ts: Option<DateTime<Utc>>,
    ) -> (bool, Option<String>) {
        let grace = self.staleness_grace.unwrap_or_default();
        match session_created_ts {
            Some(created) if created > msg_ts + grace => {
                (true, Some(format!("session recreated at {}", created)))
            }
            _ => (false, None),
        }
    }

    async fn destroy_polecat(&self, rig: &str, polecat: &str) -> Result<()> {
        self.destroyed.lock().unwrap().push((rig.to_string(), polecat.to_string()));
        Ok(())
    }
}
