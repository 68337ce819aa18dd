// Session runtime: the single task that owns registry, lifecycle, app state and timers.

use crate::domain::SessionPhase;
use crate::interface_adapters::protocol::ServerMessage;
use crate::use_cases::app::SessionApp;
use crate::use_cases::battle::BattleSettings;
use crate::use_cases::inactivity::{InactivityConfig, InactivityMonitor, ShutdownCallback};
use crate::use_cases::lifecycle::SessionLifecycle;
use crate::use_cases::registry::ConnectionRegistry;
use crate::use_cases::router::{deliver, route_message};
use crate::use_cases::types::{ConnectionHandle, Routed, SessionEvent, SessionStatus, Target};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, info, info_span, warn};

/// Everything needed to start one hosted session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub session_id: String,
    pub app_id: String,
    pub tick_interval: Duration,
    pub event_capacity: usize,
    pub inactivity: InactivityConfig,
    pub battle: BattleSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_id: "local".to_string(),
            app_id: crate::use_cases::battle::APP_ID.to_string(),
            tick_interval: Duration::from_millis(1000 / 60),
            event_capacity: 1024,
            inactivity: InactivityConfig::default(),
            battle: BattleSettings::default(),
        }
    }
}

/// Channels into a running session task.
#[derive(Debug)]
pub struct SessionHandle {
    pub events_tx: mpsc::Sender<SessionEvent>,
    pub status_rx: watch::Receiver<SessionStatus>,
    pub task: JoinHandle<()>,
}

pub struct SessionRuntime<A: SessionApp> {
    registry: ConnectionRegistry,
    lifecycle: SessionLifecycle,
    app: A,
    monitor: InactivityMonitor,
    started: Instant,
}

impl<A: SessionApp> SessionRuntime<A> {
    pub fn new(
        app: A,
        inactivity: InactivityConfig,
        on_shutdown: ShutdownCallback,
        now: Instant,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            lifecycle: SessionLifecycle::new(),
            app,
            monitor: InactivityMonitor::new(inactivity, now, on_shutdown),
            started: now,
        }
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.lifecycle.phase(),
            participants: self.registry.len(),
            stopped: None,
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::Connected(conn) => self.connect(conn, now),
            SessionEvent::Message { conn_id, text } => self.receive(conn_id, text.as_str(), now),
            SessionEvent::Disconnected { conn_id } => self.disconnect(conn_id, now),
        }
    }

    pub fn connect(&mut self, conn: ConnectionHandle, now: Instant) {
        let conn_id = conn.conn_id;
        let participant_id = uuid::Uuid::new_v4().to_string();
        let participant = match self.registry.admit(conn, participant_id) {
            Ok(participant) => participant,
            Err(err) => {
                warn!(conn_id, error = %err, "connection refused");
                return;
            }
        };
        info!(
            conn_id,
            participant_id = %participant.id,
            number = participant.number,
            "participant admitted"
        );

        self.lifecycle.add_participant(participant.clone());
        self.monitor.record_connection(true, now);
        let outcome = self.app.on_participant_join(&participant);

        let app_data = self.app.app_data();
        let mut messages = vec![
            Routed::session(
                Target::Sender,
                ServerMessage::Welcome {
                    participant_id: participant.id.clone(),
                    participant_number: participant.number,
                    session_phase: self.lifecycle.phase().into(),
                    app_data: app_data.clone(),
                },
            ),
            Routed::session(
                Target::Opponent,
                ServerMessage::OpponentJoined {
                    participant_id: participant.id.clone(),
                    participant_number: participant.number,
                    app_data: Some(app_data),
                },
            ),
        ];
        messages.extend(self.lifecycle.apply_outcome(outcome, &mut self.app));
        deliver(&self.registry, Some(&participant.id), &messages);
    }

    pub fn disconnect(&mut self, conn_id: u64, now: Instant) {
        // Refused connections were never admitted and have nothing to clean up.
        let Some(participant_id) = self.registry.remove(conn_id) else {
            debug!(conn_id, "disconnect for unknown connection");
            return;
        };
        let phase = self.lifecycle.phase();
        let Some(participant) = self.lifecycle.remove_participant(&participant_id) else {
            return;
        };
        self.monitor.record_connection(false, now);
        info!(conn_id, participant_id = %participant.id, %phase, "participant left");

        let outcome = self.app.on_participant_leave(&participant, phase);
        let mut messages = vec![Routed::session(
            Target::Opponent,
            ServerMessage::OpponentLeft {
                participant_id: participant.id.clone(),
            },
        )];
        messages.extend(self.lifecycle.apply_outcome(outcome, &mut self.app));
        let now_ms = self.now_ms(now);
        messages.extend(self.lifecycle.reevaluate(&mut self.app, now_ms));
        deliver(&self.registry, Some(&participant.id), &messages);
    }

    pub fn receive(&mut self, conn_id: u64, text: &str, now: Instant) {
        self.monitor.record_activity(now);
        let sender = self
            .registry
            .participant_for(conn_id)
            .and_then(|id| self.lifecycle.participant(id))
            .cloned();
        let Some(sender) = sender else {
            debug!(conn_id, "message from unadmitted connection dropped");
            return;
        };

        let now_ms = self.now_ms(now);
        let messages = route_message(text, &sender, &mut self.lifecycle, &mut self.app, now_ms);
        deliver(&self.registry, Some(&sender.id), &messages);
    }

    /// Advances the simulation; does nothing unless playing.
    pub fn tick(&mut self, dt: f32, now: Instant) {
        if self.lifecycle.phase() != SessionPhase::Playing {
            return;
        }
        let now_ms = self.now_ms(now);
        let outcome = self.app.on_tick(dt, now_ms);
        let messages = self.lifecycle.apply_outcome(outcome, &mut self.app);
        deliver(&self.registry, None, &messages);
    }

    pub fn periodic(&mut self, now: Instant) {
        if self.lifecycle.phase() != SessionPhase::Playing {
            return;
        }
        let now_ms = self.now_ms(now);
        let outcome = self.app.on_periodic(now_ms);
        let messages = self.lifecycle.apply_outcome(outcome, &mut self.app);
        deliver(&self.registry, None, &messages);
    }

    pub fn check_inactivity(&mut self, now: Instant) -> Option<String> {
        self.monitor.check(now)
    }

    pub fn inactivity_stopped(&self) -> bool {
        self.monitor.is_stopped()
    }

    /// Stops timers and closes every connection.
    pub fn shutdown(&mut self, reason: &str) {
        info!(reason, participants = self.registry.len(), "session shutting down");
        self.monitor.stop();
        self.registry.close_all("server shutting down");
    }

    fn now_ms(&self, now: Instant) -> u64 {
        u64::try_from(now.saturating_duration_since(self.started).as_millis()).unwrap_or(u64::MAX)
    }
}

/// Spawns the session task for `app` and returns its channels.
///
/// An inactivity shutdown flips `shutdown` so the whole process winds down with the session.
pub fn spawn_session<A: SessionApp>(
    app: A,
    settings: SessionSettings,
    shutdown: watch::Sender<bool>,
) -> SessionHandle {
    let (events_tx, events_rx) = mpsc::channel(settings.event_capacity);
    let (status_tx, status_rx) = watch::channel(SessionStatus::default());

    let process_shutdown = shutdown.clone();
    let on_shutdown: ShutdownCallback = Box::new(move |reason| {
        info!(%reason, "requesting process shutdown");
        process_shutdown.send_replace(true);
    });
    let runtime = SessionRuntime::new(app, settings.inactivity, on_shutdown, clock());

    let span = info_span!(
        "session",
        session_id = %settings.session_id,
        app_id = %settings.app_id
    );
    let task = tokio::spawn(
        session_task(
            runtime,
            events_rx,
            status_tx,
            shutdown.subscribe(),
            settings.tick_interval,
        )
        .instrument(span),
    );

    SessionHandle {
        events_tx,
        status_rx,
        task,
    }
}

/// Single event loop: inbound events, simulation ticks, app timer and inactivity checks
/// are all handled here, one at a time.
pub async fn session_task<A: SessionApp>(
    mut runtime: SessionRuntime<A>,
    mut events_rx: mpsc::Receiver<SessionEvent>,
    status_tx: watch::Sender<SessionStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
    tick_interval: Duration,
) {
    let mut tick = tokio::time::interval(tick_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = clock();

    let mut periodic = runtime.app().periodic_interval().map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    let check_every = runtime.monitor.config().check_interval;
    let mut inactivity =
        tokio::time::interval_at(tokio::time::Instant::now() + check_every, check_every);

    info!("session task started");
    let reason: String = loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break "server shutdown".to_string();
                }
            }
            event = events_rx.recv() => {
                match event {
                    Some(event) => runtime.handle_event(event, clock()),
                    None => break "event channel closed".to_string(),
                }
            }
            _ = tick.tick() => {
                let now = clock();
                let dt = now.saturating_duration_since(last_tick).as_secs_f32();
                last_tick = now;
                runtime.tick(dt, now);
            }
            _ = next_periodic(&mut periodic) => {
                runtime.periodic(clock());
            }
            _ = inactivity.tick(), if !runtime.inactivity_stopped() => {
                if let Some(reason) = runtime.check_inactivity(clock()) {
                    break reason;
                }
            }
        }

        status_tx.send_if_modified(|status| {
            let next = runtime.status();
            if *status == next {
                return false;
            }
            *status = next;
            true
        });
    };

    runtime.shutdown(&reason);
    status_tx.send_modify(|status| {
        status.participants = 0;
        status.stopped = Some(reason);
    });
}

// Follows tokio's clock so paused-time tests drive the monitor too.
fn clock() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn next_periodic(periodic: &mut Option<tokio::time::Interval>) {
    match periodic {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
