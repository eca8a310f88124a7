use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use gateway::{EndRequest, SessionAssets, SessionEndError, SessionStartError, StartRequest, StartedSession};
use sim_core::ClockTimer;
use sim_core::model::{
    HotspotKind, Position, Response, SequenceItem, SequenceModel, SessionId, SessionResult,
    SimulationId, SlideId, Step, TranscriptEntry,
};
use sim_core::policy::{self, Action, Interaction, InteractionKind, InteractionState, Trigger};
use sim_core::time::offset;

use super::progress::PlaybackProgress;
use super::state::{
    FailedOperation, IgnoreReason, InteractionOutcome, PlaybackEvent, PlaybackFailure,
    PlaybackSnapshot, PlaybackState, PlaybackStatus,
};
use crate::error::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArmedKind {
    Delay,
    Timeout,
}

/// A pending advance for the current item. `due_at` is cleared while paused and
/// re-armed with the full `delay` on resume.
#[derive(Debug, Clone, Copy)]
struct ArmedAdvance {
    at: Position,
    kind: ArmedKind,
    delay: Duration,
    due_at: Option<DateTime<Utc>>,
}

struct LoadedSession {
    id: SessionId,
    model: SequenceModel,
    assets: SessionAssets,
}

/// Playback state machine for one simulation.
///
/// Every operation runs to completion; time only enters through the `now` arguments.
/// Operations that take `now` first settle ticks and armed advances due at or before
/// `now`, so work is applied strictly in arrival order.
pub struct PlaybackController {
    simulation_id: SimulationId,
    state: PlaybackState,
    timer: ClockTimer,
    session: Option<LoadedSession>,
    armed: Option<ArmedAdvance>,
    transcript: Vec<TranscriptEntry>,
    result: Option<SessionResult>,
    events: Vec<PlaybackEvent>,
}

impl PlaybackController {
    #[must_use]
    pub fn new(simulation_id: SimulationId) -> Self {
        Self {
            simulation_id,
            state: PlaybackState::default(),
            timer: ClockTimer::new(),
            session: None,
            armed: None,
            transcript: Vec::new(),
            result: None,
            events: Vec::new(),
        }
    }

    //
    // ─── READS ─────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn simulation_id(&self) -> SimulationId {
        self.simulation_id
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.state.status
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.state.position
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    #[must_use]
    pub fn model(&self) -> Option<&SequenceModel> {
        self.session.as_ref().map(|s| &s.model)
    }

    #[must_use]
    pub fn current_item(&self) -> Option<&SequenceItem> {
        self.model()?.item_at(self.state.position)
    }

    #[must_use]
    pub fn current_slide_id(&self) -> Option<SlideId> {
        self.model()?.slide(self.state.position.slide).map(|s| s.id())
    }

    /// Image for the current slide, while the session still holds its assets.
    #[must_use]
    pub fn current_slide_image(&self) -> Option<Arc<[u8]>> {
        let slide = self.current_slide_id()?;
        self.session.as_ref()?.assets.get(slide)
    }

    #[must_use]
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    #[must_use]
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> PlaybackProgress {
        let Some(model) = self.model() else {
            return PlaybackProgress::default();
        };
        PlaybackProgress {
            reached: model.ordinal(self.state.position).map_or(0, |i| i + 1),
            total: model.item_count(),
            end_of_content: self.state.end_of_content,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state.clone(),
            session_id: self.session_id(),
            slide_id: self.current_slide_id(),
            current_item: self.current_item().cloned(),
            progress: self.progress(),
            result: self.result.clone(),
            passed: self.result.as_ref().map(SessionResult::passed),
        }
    }

    /// Earliest instant at which a tick or armed advance becomes due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        if self.state.status != PlaybackStatus::Playing {
            return None;
        }
        [self.timer.next_tick_at(), self.armed.and_then(|a| a.due_at)]
            .into_iter()
            .flatten()
            .min()
    }

    /// Take the events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    //
    // ─── SESSION LIFECYCLE ─────────────────────────────────────────────────────
    //

    /// Move to `Loading` and return the request the caller should send to the gateway.
    ///
    /// Accepted from `NotStarted`, and from `Errored` as a caller-initiated retry.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidTransition` from any other status.
    pub fn start(&mut self) -> Result<StartRequest, PlaybackError> {
        match self.state.status {
            PlaybackStatus::NotStarted => {}
            PlaybackStatus::Errored => self.reset(),
            status => {
                return Err(PlaybackError::InvalidTransition {
                    operation: "start",
                    status,
                });
            }
        }
        self.state.status = PlaybackStatus::Loading;
        info!(simulation = %self.simulation_id, "loading session");
        Ok(StartRequest::new(self.simulation_id))
    }

    /// The gateway delivered the session: start the clock and enter the first item.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidTransition` unless `Loading`.
    pub fn session_loaded(
        &mut self,
        started: StartedSession,
        now: DateTime<Utc>,
    ) -> Result<(), PlaybackError> {
        self.expect_status("load session", PlaybackStatus::Loading)?;

        let first = started.model.first();
        info!(
            session = %started.session_id,
            slides = started.model.slides().len(),
            items = started.model.item_count(),
            "session loaded"
        );
        self.events.push(PlaybackEvent::Started {
            session_id: started.session_id,
        });
        self.session = Some(LoadedSession {
            id: started.session_id,
            model: started.model,
            assets: started.assets,
        });
        self.state.status = PlaybackStatus::Playing;
        self.timer = ClockTimer::new();
        self.timer.start(now);
        self.enter(first, now, true);
        Ok(())
    }

    /// The gateway could not start the session.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidTransition` unless `Loading`.
    pub fn session_failed(
        &mut self,
        err: &SessionStartError,
        now: DateTime<Utc>,
    ) -> Result<(), PlaybackError> {
        self.expect_status("fail session start", PlaybackStatus::Loading)?;
        self.fail(PlaybackFailure::from_start_error(err), now);
        Ok(())
    }

    /// Reserve the end call. Returns the request to send, or `None` when an end call is
    /// already outstanding or the session has already completed.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidTransition` unless playing, paused or completed.
    pub fn begin_end(&mut self, now: DateTime<Utc>) -> Result<Option<EndRequest>, PlaybackError> {
        self.poll(now);
        match self.state.status {
            PlaybackStatus::Playing | PlaybackStatus::Paused => {}
            PlaybackStatus::Completed => return Ok(None),
            status => {
                return Err(PlaybackError::InvalidTransition {
                    operation: "end",
                    status,
                });
            }
        }
        if self.state.ending {
            debug!("end already in progress");
            return Ok(None);
        }
        let Some(session) = &self.session else {
            return Err(PlaybackError::InvalidTransition {
                operation: "end",
                status: self.state.status,
            });
        };

        self.state.ending = true;
        Ok(Some(EndRequest {
            session_id: session.id,
            simulation_id: self.simulation_id,
            duration_seconds: self.state.elapsed_seconds,
            reached_items: session
                .model
                .ordinal(self.state.position)
                .map_or(0, |i| i + 1),
            transcript: self.transcript.clone(),
        }))
    }

    /// Apply the outcome of the end call reserved by [`Self::begin_end`].
    ///
    /// On success the clock stops and playback completes. On failure playback stays
    /// where it was and the error is handed back so the caller can offer a retry.
    ///
    /// # Errors
    ///
    /// Returns the gateway's `SessionEndError` unchanged.
    pub fn finish_end(
        &mut self,
        outcome: Result<SessionResult, SessionEndError>,
        now: DateTime<Utc>,
    ) -> Result<(), SessionEndError> {
        if !self.state.ending {
            warn!("end outcome arrived with no end in progress");
            return Ok(());
        }
        self.state.ending = false;

        match outcome {
            Ok(result) if self.state.status.is_active() => {
                self.timer.stop(now);
                self.armed = None;
                self.state.status = PlaybackStatus::Completed;
                self.state.awaiting_input = false;
                self.state.processing_guard = false;
                let passed = result.passed();
                info!(
                    passed,
                    duration = result.duration_seconds(),
                    "session completed"
                );
                self.result = Some(result);
                self.release_assets();
                self.events.push(PlaybackEvent::Completed { passed });
                Ok(())
            }
            Ok(_) => {
                warn!(status = %self.state.status, "dropping end result for inactive session");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "end session failed; session stays active");
                self.events.push(PlaybackEvent::EndFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Reset a completed session back to `NotStarted`.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidTransition` unless `Completed`.
    pub fn restart(&mut self) -> Result<(), PlaybackError> {
        self.expect_status("restart", PlaybackStatus::Completed)?;
        self.reset();
        info!(simulation = %self.simulation_id, "playback restarted");
        self.events.push(PlaybackEvent::Restarted);
        Ok(())
    }

    /// Stop the clock and release assets when the session is left behind.
    pub fn abandon(&mut self, now: DateTime<Utc>) {
        self.timer.stop(now);
        self.armed = None;
        self.release_assets();
    }

    //
    // ─── PLAYBACK ──────────────────────────────────────────────────────────────
    //

    /// Switch between `Playing` and `Paused`.
    ///
    /// Pausing freezes the clock and suspends any armed advance. Resuming re-arms that
    /// advance with its full delay, as if the item had just been entered.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidTransition` unless playing or paused.
    pub fn toggle_pause(&mut self, now: DateTime<Utc>) -> Result<PlaybackStatus, PlaybackError> {
        self.poll(now);
        match self.state.status {
            PlaybackStatus::Playing => {
                self.timer.pause(now);
                if let Some(armed) = self.armed.as_mut() {
                    armed.due_at = None;
                }
                self.state.status = PlaybackStatus::Paused;
                info!(elapsed = self.state.elapsed_seconds, "playback paused");
                self.events.push(PlaybackEvent::Paused);
            }
            PlaybackStatus::Paused => {
                self.timer.resume(now);
                if let Some(armed) = self.armed.as_mut() {
                    armed.due_at = Some(offset(now, armed.delay));
                }
                self.state.status = PlaybackStatus::Playing;
                info!(elapsed = self.state.elapsed_seconds, "playback resumed");
                self.events.push(PlaybackEvent::Resumed);
            }
            status => {
                return Err(PlaybackError::InvalidTransition {
                    operation: "toggle pause",
                    status,
                });
            }
        }
        Ok(self.state.status)
    }

    /// Apply a trainee interaction to the current item.
    pub fn on_interaction(
        &mut self,
        interaction: &Interaction,
        now: DateTime<Utc>,
    ) -> InteractionOutcome {
        self.poll(now);

        let reason = if self.state.status != PlaybackStatus::Playing {
            Some(IgnoreReason::NotPlaying)
        } else if self.state.end_of_content {
            Some(IgnoreReason::EndOfContent)
        } else if interaction.item != self.state.position {
            Some(IgnoreReason::Stale)
        } else if self.state.processing_guard {
            Some(IgnoreReason::AdvanceInFlight)
        } else {
            None
        };
        if let Some(reason) = reason {
            debug!(?reason, item = %interaction.item, "interaction dropped");
            return InteractionOutcome::Ignored(reason);
        }

        let Some(item) = self.current_item() else {
            return InteractionOutcome::Ignored(IgnoreReason::Stale);
        };
        let records_text = match item {
            SequenceItem::Message(_) => true,
            SequenceItem::Hotspot(h) => h.kind() == HotspotKind::TextField,
        };
        let action = policy::decide(
            item,
            &self.state.pending_interaction,
            Trigger::Interaction(&interaction.kind),
        );
        debug!(item = %interaction.item, ?action, "interaction applied");

        self.state.processing_guard = true;
        let advanced = self.execute(&action, &interaction.kind, records_text, now);
        InteractionOutcome::Applied { action, advanced }
    }

    /// Settle every tick and armed advance due at or before `now`, in time order.
    pub fn poll(&mut self, now: DateTime<Utc>) {
        while self.state.status == PlaybackStatus::Playing {
            let tick_at = self.timer.next_tick_at().filter(|t| *t <= now);
            let fire_at = self.armed.and_then(|a| a.due_at).filter(|t| *t <= now);
            match (tick_at, fire_at) {
                (Some(tick), Some(fire)) if fire < tick => self.fire(fire),
                (Some(_), _) => self.tick(),
                (None, Some(fire)) => self.fire(fire),
                (None, None) => break,
            }
        }
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn tick(&mut self) {
        let elapsed = self.timer.tick();
        self.state.elapsed_seconds = elapsed;
        self.events.push(PlaybackEvent::Tick {
            elapsed_seconds: elapsed,
        });
    }

    fn fire(&mut self, at: DateTime<Utc>) {
        let Some(armed) = self.armed.take() else {
            return;
        };
        if armed.at != self.state.position {
            return;
        }
        debug!(kind = ?armed.kind, item = %armed.at, "armed advance fired");
        self.advance(at);
    }

    fn execute(
        &mut self,
        action: &Action,
        kind: &InteractionKind,
        records_text: bool,
        now: DateTime<Utc>,
    ) -> bool {
        match action {
            Action::AdvanceNow => {
                if let (true, InteractionKind::Submit(text)) = (records_text, kind) {
                    self.record(Response::Submitted(text.clone()));
                    self.state.pending_interaction = InteractionState::Submitted {
                        text: text.clone(),
                    };
                }
                self.advance(now);
                true
            }
            Action::AdvanceAfterDelay(delay) => {
                // The guard stays up until the armed advance fires.
                self.state.pending_interaction = InteractionState::Checked;
                self.state.awaiting_input = false;
                self.arm(ArmedKind::Delay, *delay, now);
                false
            }
            Action::ToggleOpen => {
                let (open, selected) = match &self.state.pending_interaction {
                    InteractionState::Dropdown { open, selected } => (!open, selected.clone()),
                    _ => (true, None),
                };
                self.state.pending_interaction = InteractionState::Dropdown { open, selected };
                self.state.processing_guard = false;
                false
            }
            Action::AdvanceIfConfigured { option, advance } => {
                self.record(Response::Selected(option.clone()));
                self.state.pending_interaction = InteractionState::Dropdown {
                    open: false,
                    selected: Some(option.clone()),
                };
                if *advance {
                    self.advance(now);
                } else {
                    self.state.processing_guard = false;
                }
                *advance
            }
            Action::WaitForExactInput
            | Action::AwaitInteraction
            | Action::AutoAdvanceAfterTimeout(_)
            | Action::Ignore => {
                self.state.processing_guard = false;
                false
            }
        }
    }

    fn enter(&mut self, at: Position, now: DateTime<Utc>, slide_changed: bool) {
        let Some((slide, has_image, pending, action)) = self.session.as_ref().and_then(|s| {
            let slide = s.model.slide(at.slide)?.id();
            let item = s.model.item_at(at)?;
            let pending = InteractionState::entered(item);
            let action = policy::decide(item, &pending, Trigger::Entered);
            Some((slide, s.assets.contains(slide), pending, action))
        }) else {
            return;
        };

        if slide_changed && !has_image {
            self.fail(
                PlaybackFailure {
                    operation: FailedOperation::LoadSlideAsset { slide },
                    message: format!("no image loaded for slide {slide}"),
                },
                now,
            );
            return;
        }

        self.state.position = at;
        self.state.pending_interaction = pending;
        self.state.processing_guard = false;
        self.state.awaiting_input = false;
        self.armed = None;
        self.events.push(PlaybackEvent::ItemEntered { at });
        debug!(item = %at, ?action, "entered item");

        match action {
            Action::AdvanceAfterDelay(delay) => {
                self.state.processing_guard = true;
                self.arm(ArmedKind::Delay, delay, now);
            }
            Action::AutoAdvanceAfterTimeout(timeout) => {
                self.state.awaiting_input = true;
                self.arm(ArmedKind::Timeout, timeout, now);
            }
            Action::AdvanceNow => self.advance(now),
            other => self.state.awaiting_input = other.awaits_input(),
        }
    }

    fn advance(&mut self, now: DateTime<Utc>) {
        let from = self.state.position;
        self.armed = None;
        let Some(step) = self.model().map(|m| m.next(from)) else {
            return;
        };
        match step {
            Step::Item(to) => {
                info!(%from, %to, "advanced");
                self.events.push(PlaybackEvent::Advanced { from, to });
                self.enter(to, now, to.slide != from.slide);
            }
            Step::EndOfSequence => {
                self.state.end_of_content = true;
                self.state.awaiting_input = false;
                self.state.processing_guard = false;
                info!(%from, "end of content");
                self.events.push(PlaybackEvent::EndOfContent);
            }
        }
    }

    fn arm(&mut self, kind: ArmedKind, delay: Duration, now: DateTime<Utc>) {
        debug!(?kind, ?delay, item = %self.state.position, "advance armed");
        self.armed = Some(ArmedAdvance {
            at: self.state.position,
            kind,
            delay,
            due_at: Some(offset(now, delay)),
        });
    }

    fn record(&mut self, response: Response) {
        self.transcript.push(TranscriptEntry::new(
            self.state.position,
            self.state.elapsed_seconds,
            response,
        ));
    }

    fn fail(&mut self, failure: PlaybackFailure, now: DateTime<Utc>) {
        warn!(operation = ?failure.operation, message = %failure.message, "playback errored");
        self.timer.stop(now);
        self.armed = None;
        self.state.status = PlaybackStatus::Errored;
        self.state.awaiting_input = false;
        self.state.processing_guard = false;
        self.release_assets();
        self.events.push(PlaybackEvent::Errored {
            failure: failure.clone(),
        });
        self.state.failure = Some(failure);
    }

    fn release_assets(&mut self) {
        if let Some(session) = self.session.as_mut() {
            let bytes = session.assets.release();
            if bytes > 0 {
                debug!(session = %session.id, bytes, "released slide assets");
            }
        }
    }

    fn reset(&mut self) {
        self.release_assets();
        self.state = PlaybackState::default();
        self.timer = ClockTimer::new();
        self.session = None;
        self.armed = None;
        self.transcript.clear();
        self.result = None;
    }

    fn expect_status(
        &self,
        operation: &'static str,
        expected: PlaybackStatus,
    ) -> Result<(), PlaybackError> {
        if self.state.status == expected {
            Ok(())
        } else {
            Err(PlaybackError::InvalidTransition {
                operation,
                status: self.state.status,
            })
        }
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("simulation_id", &self.simulation_id)
            .field("state", &self.state)
            .field("session_id", &self.session_id())
            .field("armed", &self.armed)
            .field("transcript_len", &self.transcript.len())
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}
