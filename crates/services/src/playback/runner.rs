use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use gateway::{SessionEndError, SessionGateway, SessionStartError, StartedSession};
use sim_core::Clock;
use sim_core::model::{SessionResult, SimulationId};
use sim_core::policy::Interaction;
use sim_core::time::offset;

use super::controller::PlaybackController;
use super::state::{PlaybackEvent, PlaybackSnapshot};
use crate::error::PlaybackError;

/// Channel sizing for a playback runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackConfig {
    pub command_buffer: usize,
    pub event_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            command_buffer: 32,
            event_buffer: 256,
        }
    }
}

#[derive(Debug)]
enum Command {
    Start,
    TogglePause,
    Interact(Interaction),
    End,
    Restart,
    Shutdown,
}

/// Cloneable front end to a running [`PlaybackRunner`].
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackHandle {
    /// # Errors
    ///
    /// Returns `PlaybackError::RunnerClosed` once the runner has stopped.
    pub async fn start(&self) -> Result<(), PlaybackError> {
        self.send(Command::Start).await
    }

    /// # Errors
    ///
    /// Returns `PlaybackError::RunnerClosed` once the runner has stopped.
    pub async fn toggle_pause(&self) -> Result<(), PlaybackError> {
        self.send(Command::TogglePause).await
    }

    /// # Errors
    ///
    /// Returns `PlaybackError::RunnerClosed` once the runner has stopped.
    pub async fn interact(&self, interaction: Interaction) -> Result<(), PlaybackError> {
        self.send(Command::Interact(interaction)).await
    }

    /// # Errors
    ///
    /// Returns `PlaybackError::RunnerClosed` once the runner has stopped.
    pub async fn end(&self) -> Result<(), PlaybackError> {
        self.send(Command::End).await
    }

    /// # Errors
    ///
    /// Returns `PlaybackError::RunnerClosed` once the runner has stopped.
    pub async fn restart(&self) -> Result<(), PlaybackError> {
        self.send(Command::Restart).await
    }

    /// Ask the runner to release the session and exit.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::RunnerClosed` if it already has.
    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        self.send(Command::Shutdown).await
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::RunnerClosed` if the runner stops first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&PlaybackSnapshot) -> bool,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| PlaybackError::RunnerClosed)?;
        Ok(snapshot.clone())
    }

    async fn send(&self, command: Command) -> Result<(), PlaybackError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::RunnerClosed)
    }
}

/// Owns a [`PlaybackController`] and drives it from one task.
///
/// Commands, gateway completions and timer deadlines are multiplexed in a single loop,
/// so the controller only ever sees one operation at a time.
pub struct PlaybackRunner {
    controller: PlaybackController,
    gateway: Arc<dyn SessionGateway>,
    origin: (DateTime<Utc>, Instant),
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
    pending_start: Option<JoinHandle<Result<StartedSession, SessionStartError>>>,
    pending_end: Option<JoinHandle<Result<SessionResult, SessionEndError>>>,
}

impl PlaybackRunner {
    /// Build a runner and its handle. Wall time is read from `clock` once and then
    /// carried forward on the runtime's monotonic clock.
    #[must_use]
    pub fn new(
        simulation_id: SimulationId,
        gateway: Arc<dyn SessionGateway>,
        clock: &Clock,
        config: PlaybackConfig,
    ) -> (Self, PlaybackHandle) {
        let controller = PlaybackController::new(simulation_id);
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));

        let handle = PlaybackHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx.clone(),
        };
        let runner = Self {
            controller,
            gateway,
            origin: (clock.now(), Instant::now()),
            commands: command_rx,
            snapshots: snapshot_tx,
            events: event_tx,
            pending_start: None,
            pending_end: None,
        };
        (runner, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!(simulation = %self.controller.simulation_id(), "playback runner started");
        loop {
            let deadline = self.controller.next_deadline().map(|at| self.instant_at(at));
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                outcome = join_pending(&mut self.pending_start) => {
                    self.pending_start = None;
                    self.on_started(outcome);
                }
                outcome = join_pending(&mut self.pending_end) => {
                    self.pending_end = None;
                    self.on_ended(outcome);
                }
                () = sleep_until_deadline(deadline) => {
                    let now = self.now();
                    self.controller.poll(now);
                }
            }
            self.publish();
        }

        if let Some(handle) = self.pending_start.take() {
            handle.abort();
        }
        if let Some(handle) = self.pending_end.take() {
            handle.abort();
        }
        let now = self.now();
        self.controller.abandon(now);
        self.publish();
        info!(simulation = %self.controller.simulation_id(), "playback runner stopped");
    }

    fn now(&self) -> DateTime<Utc> {
        offset(self.origin.0, self.origin.1.elapsed())
    }

    /// Runtime instant at which wall time reaches `at`, never earlier.
    fn instant_at(&self, at: DateTime<Utc>) -> Instant {
        self.origin.1 + (at - self.origin.0).to_std().unwrap_or_default()
    }

    fn handle(&mut self, command: Command) {
        let now = self.now();
        debug!(?command, "command received");
        let result = match command {
            Command::Start => self.start_session(),
            Command::TogglePause => self.controller.toggle_pause(now).map(|_| ()),
            Command::Interact(interaction) => {
                let outcome = self.controller.on_interaction(&interaction, now);
                debug!(?outcome, "interaction handled");
                Ok(())
            }
            Command::End => self.end_session(now),
            Command::Restart => self.controller.restart(),
            Command::Shutdown => Ok(()),
        };
        if let Err(err) = result {
            warn!(error = %err, "command rejected");
        }
    }

    fn start_session(&mut self) -> Result<(), PlaybackError> {
        let request = self.controller.start()?;
        let gateway = Arc::clone(&self.gateway);
        self.pending_start = Some(tokio::spawn(async move { gateway.start(&request).await }));
        Ok(())
    }

    fn end_session(&mut self, now: DateTime<Utc>) -> Result<(), PlaybackError> {
        let Some(request) = self.controller.begin_end(now)? else {
            return Ok(());
        };
        info!(
            session = %request.session_id,
            duration = request.duration_seconds,
            reached = request.reached_items,
            "ending session"
        );
        let gateway = Arc::clone(&self.gateway);
        self.pending_end = Some(tokio::spawn(async move { gateway.end(&request).await }));
        Ok(())
    }

    fn on_started(&mut self, outcome: Result<Result<StartedSession, SessionStartError>, JoinError>) {
        let now = self.now();
        let result = match outcome {
            Ok(Ok(started)) => self.controller.session_loaded(started, now),
            Ok(Err(err)) => self.controller.session_failed(&err, now),
            Err(err) => self
                .controller
                .session_failed(&SessionStartError::Unavailable(err.to_string()), now),
        };
        if let Err(err) = result {
            warn!(error = %err, "start outcome dropped");
        }
    }

    fn on_ended(&mut self, outcome: Result<Result<SessionResult, SessionEndError>, JoinError>) {
        let now = self.now();
        self.controller.poll(now);
        let outcome = outcome.unwrap_or_else(|err| Err(SessionEndError::Unavailable(err.to_string())));
        if let Err(err) = self.controller.finish_end(outcome, now) {
            debug!(error = %err, "end can be retried");
        }
    }

    fn publish(&mut self) {
        for event in self.controller.drain_events() {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        let snapshot = self.controller.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

async fn join_pending<T>(slot: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match slot.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
