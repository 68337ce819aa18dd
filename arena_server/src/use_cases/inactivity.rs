// Inactivity monitor: decides when an idle session should shut the process down.
//
// The monitor is a plain state machine over `Instant`s; the session task drives
// `check` from its own interval timer.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityConfig {
    /// Nobody connected at all within this window after start.
    pub startup_grace: Duration,
    /// Zero connections for this long after having had some.
    pub empty_timeout: Duration,
    /// Connected but no inbound message for this long.
    pub inactivity_timeout: Duration,
    pub check_interval: Duration,
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(300),
            empty_timeout: Duration::from_secs(60),
            inactivity_timeout: Duration::from_secs(600),
            check_interval: Duration::from_secs(5),
        }
    }
}

pub type ShutdownCallback = Box<dyn FnOnce(String) + Send>;

pub struct InactivityMonitor {
    config: InactivityConfig,
    started_at: Instant,
    connections: usize,
    ever_connected: bool,
    empty_since: Option<Instant>,
    last_activity: Instant,
    on_shutdown: Option<ShutdownCallback>,
    stopped: bool,
}

impl fmt::Debug for InactivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InactivityMonitor")
            .field("config", &self.config)
            .field("connections", &self.connections)
            .field("ever_connected", &self.ever_connected)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl InactivityMonitor {
    pub fn new(config: InactivityConfig, now: Instant, on_shutdown: ShutdownCallback) -> Self {
        Self {
            config,
            started_at: now,
            connections: 0,
            ever_connected: false,
            empty_since: None,
            last_activity: now,
            on_shutdown: Some(on_shutdown),
            stopped: false,
        }
    }

    pub fn config(&self) -> &InactivityConfig {
        &self.config
    }

    pub fn connections(&self) -> usize {
        self.connections
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Counts a connect (`true`) or disconnect (`false`). The count never drops below zero.
    pub fn record_connection(&mut self, is_connect: bool, now: Instant) {
        if is_connect {
            self.connections += 1;
            self.ever_connected = true;
            self.empty_since = None;
            self.last_activity = now;
        } else {
            self.connections = self.connections.saturating_sub(1);
            if self.connections == 0 {
                self.empty_since = Some(now);
            }
        }
    }

    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Evaluates the shutdown triggers; the first match fires the callback and stops the monitor.
    ///
    /// Returns the shutdown reason when this call fired.
    pub fn check(&mut self, now: Instant) -> Option<String> {
        if self.stopped {
            return None;
        }
        let reason = self.pending_reason(now)?;
        info!(%reason, "inactivity shutdown");
        self.stopped = true;
        if let Some(callback) = self.on_shutdown.take() {
            callback(reason.clone());
        }
        Some(reason)
    }

    /// Halts checking permanently. Safe to call any number of times.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.on_shutdown = None;
    }

    fn pending_reason(&self, now: Instant) -> Option<String> {
        let config = &self.config;
        if !self.ever_connected {
            if now.saturating_duration_since(self.started_at) >= config.startup_grace {
                return Some(format!(
                    "no players connected within {}",
                    DisplayDuration(config.startup_grace)
                ));
            }
            return None;
        }

        if self.connections == 0 {
            let expired = self
                .empty_since
                .is_some_and(|since| now.saturating_duration_since(since) >= config.empty_timeout);
            if expired {
                return Some(format!(
                    "no players connected for {}",
                    DisplayDuration(config.empty_timeout)
                ));
            }
            return None;
        }

        if now.saturating_duration_since(self.last_activity) >= config.inactivity_timeout {
            return Some(format!(
                "no activity for {}",
                DisplayDuration(config.inactivity_timeout)
            ));
        }
        None
    }
}

/// Whole seconds when possible, otherwise milliseconds.
struct DisplayDuration(Duration);

impl fmt::Display for DisplayDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        if millis % 1000 == 0 {
            write!(f, "{}s", millis / 1000)
        } else {
            write!(f, "{millis}ms")
        }
    }
}
