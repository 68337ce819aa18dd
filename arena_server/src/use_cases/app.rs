// App hooks the session runtime drives, and the registry of hostable apps.

use crate::domain::{Participant, SessionPhase};
use crate::interface_adapters::protocol::{AppMessage, ProtocolError};
use crate::use_cases::session::{SessionHandle, SessionSettings};
use crate::use_cases::types::AppOutcome;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

/// Callbacks a concrete game supplies to the generic session runtime.
///
/// Hooks run on the session task, one at a time, and return messages instead of doing I/O.
pub trait SessionApp: Send + 'static {
    type Event: Serialize + Clone + fmt::Debug + Send + 'static;

    fn on_participant_join(&mut self, participant: &Participant) -> AppOutcome<Self::Event>;

    /// `phase` is the phase at the moment the participant left.
    fn on_participant_leave(
        &mut self,
        participant: &Participant,
        phase: SessionPhase,
    ) -> AppOutcome<Self::Event>;

    /// Handles every message type the framework does not own.
    fn on_message(
        &mut self,
        message: &AppMessage,
        sender: &Participant,
        phase: SessionPhase,
        now_ms: u64,
    ) -> Result<AppOutcome<Self::Event>, ProtocolError>;

    fn on_session_start(&mut self, _now_ms: u64) -> AppOutcome<Self::Event> {
        AppOutcome::none()
    }

    /// One simulation step; only called while playing.
    fn on_tick(&mut self, dt: f32, now_ms: u64) -> AppOutcome<Self::Event>;

    /// Period of the optional app timer (auto-fire); `None` disables it.
    fn periodic_interval(&self) -> Option<Duration> {
        None
    }

    fn on_periodic(&mut self, _now_ms: u64) -> AppOutcome<Self::Event> {
        AppOutcome::none()
    }

    /// Rebuilds app state for a new round and returns it as `appData`.
    fn on_reset(&mut self, participants: &[Participant]) -> Value;

    /// Full app state as sent in `welcome` and friends.
    fn app_data(&self) -> Value;
}

/// Spawns the session task for one concrete app.
pub type LaunchFn = fn(SessionSettings, watch::Sender<bool>) -> SessionHandle;

#[derive(Clone)]
pub struct AppManifest {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub max_participants: usize,
    pub launch: LaunchFn,
}

impl fmt::Debug for AppManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppManifest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("max_participants", &self.max_participants)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppRegistryError {
    #[error("app `{0}` is already registered")]
    Duplicate(&'static str),
    #[error("unknown app `{0}`")]
    Unknown(String),
}

/// Explicitly constructed set of hostable apps, passed to whoever needs it.
#[derive(Debug, Default, Clone)]
pub struct AppRegistry {
    apps: BTreeMap<&'static str, AppManifest>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_apps() -> Self {
        Self::from_manifests([crate::use_cases::battle::manifest()])
    }

    /// Registers every manifest; a repeated id keeps the first entry and is logged.
    pub fn from_manifests(manifests: impl IntoIterator<Item = AppManifest>) -> Self {
        let mut registry = Self::new();
        for manifest in manifests {
            if let Err(e) = registry.register(manifest) {
                warn!(error = %e, "app manifest skipped");
            }
        }
        registry
    }

    pub fn register(&mut self, manifest: AppManifest) -> Result<(), AppRegistryError> {
        if self.apps.contains_key(manifest.id) {
            return Err(AppRegistryError::Duplicate(manifest.id));
        }
        self.apps.insert(manifest.id, manifest);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&AppManifest, AppRegistryError> {
        self.apps
            .get(id)
            .ok_or_else(|| AppRegistryError::Unknown(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.apps.keys().copied().collect()
    }

    /// Test harness helper.
    pub fn clear(&mut self) {
        self.apps.clear();
    }
}
