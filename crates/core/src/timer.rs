use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::time::{millis_between, offset};

const TICK_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Wall-clock elapsed-time counter with pause/resume.
///
/// Active time is kept in milliseconds (`baseline_ms` from earlier running windows plus
/// the span since `anchor`), so a pause in the middle of a second neither drops nor
/// double-counts the partial second. One tick is due for every whole second of active
/// time not yet handed out through [`ClockTimer::tick`].
#[derive(Debug, Clone, Default)]
pub struct ClockTimer {
    status: TimerStatus,
    baseline_ms: u64,
    anchor: Option<DateTime<Utc>>,
    ticks: u64,
}

impl ClockTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> TimerStatus {
        self.status
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Seconds handed out so far.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.ticks
    }

    /// Begin counting. Returns false if the timer was already started.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TimerStatus::Idle {
            return false;
        }
        self.status = TimerStatus::Running;
        self.anchor = Some(now);
        true
    }

    /// Freeze the counter, keeping any partial second. Returns false unless running.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.fold_anchor(now);
        self.status = TimerStatus::Paused;
        true
    }

    /// Continue counting from where `pause` left off. Returns false unless paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TimerStatus::Paused {
            return false;
        }
        self.status = TimerStatus::Running;
        self.anchor = Some(now);
        true
    }

    /// Stop for good and drop the running anchor. Idempotent: returns true only the first time.
    pub fn stop(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            TimerStatus::Stopped => false,
            TimerStatus::Running => {
                self.fold_anchor(now);
                self.status = TimerStatus::Stopped;
                true
            }
            TimerStatus::Idle | TimerStatus::Paused => {
                self.status = TimerStatus::Stopped;
                true
            }
        }
    }

    /// Active milliseconds as of `now`.
    #[must_use]
    pub fn active_ms(&self, now: DateTime<Utc>) -> u64 {
        match (self.status, self.anchor) {
            (TimerStatus::Running, Some(anchor)) => self
                .baseline_ms
                .saturating_add(millis_between(anchor, now)),
            _ => self.baseline_ms,
        }
    }

    /// Number of ticks that have come due but not been taken yet.
    #[must_use]
    pub fn due_ticks(&self, now: DateTime<Utc>) -> u64 {
        if !self.is_running() {
            return 0;
        }
        (self.active_ms(now) / TICK_MS).saturating_sub(self.ticks)
    }

    /// Wall-clock instant of the next tick, or `None` while not running.
    #[must_use]
    pub fn next_tick_at(&self) -> Option<DateTime<Utc>> {
        let anchor = self.anchor.filter(|_| self.is_running())?;
        let target_ms = self.ticks.saturating_add(1).saturating_mul(TICK_MS);
        let remaining = target_ms.saturating_sub(self.baseline_ms);
        Some(offset(anchor, std::time::Duration::from_millis(remaining)))
    }

    /// Hand out one tick and return the new elapsed seconds. No-op unless running.
    pub fn tick(&mut self) -> u64 {
        if self.is_running() {
            self.ticks = self.ticks.saturating_add(1);
        }
        self.ticks
    }

    fn fold_anchor(&mut self, now: DateTime<Utc>) {
        if let Some(anchor) = self.anchor.take() {
            self.baseline_ms = self.baseline_ms.saturating_add(millis_between(anchor, now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use std::time::Duration;

    fn at(ms: u64) -> DateTime<Utc> {
        offset(fixed_now(), Duration::from_millis(ms))
    }

    fn drain(timer: &mut ClockTimer, now: DateTime<Utc>) {
        for _ in 0..timer.due_ticks(now) {
            timer.tick();
        }
    }

    #[test]
    fn ticks_once_per_second_while_running() {
        let mut timer = ClockTimer::new();
        assert!(timer.start(at(0)));
        assert_eq!(timer.due_ticks(at(999)), 0);
        assert_eq!(timer.due_ticks(at(1_000)), 1);
        assert_eq!(timer.due_ticks(at(3_200)), 3);
        drain(&mut timer, at(3_200));
        assert_eq!(timer.elapsed_seconds(), 3);
        assert_eq!(timer.next_tick_at(), Some(at(4_000)));
    }

    #[test]
    fn pause_keeps_partial_second() {
        let mut timer = ClockTimer::new();
        timer.start(at(0));
        drain(&mut timer, at(1_600));
        assert!(timer.pause(at(1_600)));
        assert_eq!(timer.due_ticks(at(60_000)), 0);
        assert_eq!(timer.next_tick_at(), None);

        assert!(timer.resume(at(10_000)));
        // 600ms were banked before the pause; 400ms more completes second two.
        assert_eq!(timer.next_tick_at(), Some(at(10_400)));
        assert_eq!(timer.due_ticks(at(10_399)), 0);
        assert_eq!(timer.due_ticks(at(10_400)), 1);
    }

    #[test]
    fn elapsed_counts_only_running_intervals() {
        let mut timer = ClockTimer::new();
        timer.start(at(0));
        timer.pause(at(2_500));
        timer.resume(at(7_000));
        timer.pause(at(8_000));
        timer.resume(at(20_000));
        drain(&mut timer, at(20_500));
        // 2.5s + 1s + 0.5s of running time.
        assert_eq!(timer.active_ms(at(20_500)), 4_000);
        assert_eq!(timer.elapsed_seconds(), 4);
    }

    #[test]
    fn stop_is_idempotent_and_freezes_ticks() {
        let mut timer = ClockTimer::new();
        timer.start(at(0));
        assert!(timer.stop(at(1_500)));
        assert!(!timer.stop(at(9_000)));
        assert_eq!(timer.status(), TimerStatus::Stopped);
        assert_eq!(timer.due_ticks(at(9_000)), 0);
        assert_eq!(timer.next_tick_at(), None);
        assert_eq!(timer.tick(), 0);
    }

    #[test]
    fn pause_and_resume_reject_wrong_states() {
        let mut timer = ClockTimer::new();
        assert!(!timer.pause(at(0)));
        assert!(!timer.resume(at(0)));
        timer.start(at(0));
        assert!(!timer.start(at(5)));
        assert!(!timer.resume(at(5)));
    }
}
