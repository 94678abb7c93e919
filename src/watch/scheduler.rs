//! Debounced update scheduling.
//!
//! The scheduler holds at most one pending update. Scheduling again before
//! the deadline restarts the delay and can only raise the severity, so a
//! burst of rebuilds collapses into one callback of the highest severity
//! seen in the burst.

use async_trait::async_trait;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Fixed coalescing window.
pub const UPDATE_DELAY: Duration = Duration::from_secs(1);

/// Severity of a pending update; ordered so escalation is `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Reload the running app only
    App,
    /// Regenerate the pipeline configuration
    Pipeline,
}

/// Time source for the scheduler.
#[async_trait(?Send)]
pub trait Clock {
    fn now(&self) -> Instant;

    /// Resolve once [`Clock::now`] has reached `deadline`.
    async fn sleep_until(&self, deadline: Instant);
}

/// Tokio's clock; honours paused test runtimes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait(?Send)]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await
    }
}

#[derive(Debug)]
struct ManualTime {
    now: Cell<Instant>,
    advanced: Notify,
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Rc<ManualTime>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self { time: Rc::new(ManualTime { now: Cell::new(Instant::now()), advanced: Notify::new() }) }
    }

    /// Move every handle of this clock forward, waking its sleepers.
    pub fn advance(&self, by: Duration) {
        self.time.now.set(self.time.now.get() + by);
        self.time.advanced.notify_waiters();
    }
}

#[async_trait(?Send)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.time.now.get()
    }

    async fn sleep_until(&self, deadline: Instant) {
        loop {
            let advanced = self.time.advanced.notified();
            if self.now() >= deadline {
                return;
            }
            advanced.await;
        }
    }
}

/// Debounced, escalation-only update timer.
#[derive(Debug)]
pub struct UpdateScheduler<C: Clock = TokioClock> {
    clock: C,
    delay: Duration,
    pending: Option<Severity>,
    deadline: Option<Instant>,
}

impl Default for UpdateScheduler<TokioClock> {
    fn default() -> Self {
        Self::new(TokioClock)
    }
}

impl<C: Clock> UpdateScheduler<C> {
    /// Create a scheduler with the standard [`UPDATE_DELAY`].
    pub fn new(clock: C) -> Self {
        Self::with_delay(clock, UPDATE_DELAY)
    }

    pub fn with_delay(clock: C, delay: Duration) -> Self {
        Self { clock, delay, pending: None, deadline: None }
    }

    /// Record an update and restart the delay.
    ///
    /// Returns the severity now pending, which never drops below one
    /// already pending.
    pub fn schedule(&mut self, severity: Severity) -> Severity {
        let pending = self.pending.map_or(severity, |current| current.max(severity));
        self.pending = Some(pending);
        self.deadline = Some(self.clock.now() + self.delay);
        pending
    }

    /// Drop the pending update, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    pub fn pending(&self) -> Option<Severity> {
        self.pending
    }

    /// When the pending update fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the pending update if its deadline has passed.
    pub fn take_due(&mut self) -> Option<Severity> {
        let deadline = self.deadline?;
        if self.clock.now() < deadline {
            return None;
        }
        self.deadline = None;
        self.pending.take()
    }

    /// Resolve when the pending update is due; never resolves with nothing pending.
    pub async fn wait_due(&self) {
        match self.deadline {
            Some(deadline) => self.clock.sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> (ManualClock, UpdateScheduler<ManualClock>) {
        let clock = ManualClock::new();
        (clock.clone(), UpdateScheduler::new(clock))
    }

    #[test]
    fn test_fires_after_delay() {
        let (clock, mut scheduler) = scheduler();
        scheduler.schedule(Severity::App);

        clock.advance(Duration::from_millis(999));
        assert_eq!(scheduler.take_due(), None);

        clock.advance(Duration::from_millis(1));
        assert_eq!(scheduler.take_due(), Some(Severity::App));
        assert_eq!(scheduler.pending(), None);
        assert_eq!(scheduler.take_due(), None);
    }

    #[test]
    fn test_reschedule_restarts_delay() {
        let (clock, mut scheduler) = scheduler();
        scheduler.schedule(Severity::App);
        clock.advance(Duration::from_millis(800));
        scheduler.schedule(Severity::App);
        clock.advance(Duration::from_millis(800));

        assert_eq!(scheduler.take_due(), None);
        clock.advance(Duration::from_millis(200));
        assert_eq!(scheduler.take_due(), Some(Severity::App));
    }

    #[test]
    fn test_escalation_only() {
        let (clock, mut scheduler) = scheduler();
        assert_eq!(scheduler.schedule(Severity::Pipeline), Severity::Pipeline);
        assert_eq!(scheduler.schedule(Severity::App), Severity::Pipeline);

        clock.advance(UPDATE_DELAY);
        assert_eq!(scheduler.take_due(), Some(Severity::Pipeline));

        assert_eq!(scheduler.schedule(Severity::App), Severity::App);
    }

    #[test]
    fn test_cancel() {
        let (clock, mut scheduler) = scheduler();
        scheduler.schedule(Severity::Pipeline);
        scheduler.cancel();
        clock.advance(UPDATE_DELAY);
        assert_eq!(scheduler.take_due(), None);
        assert_eq!(scheduler.deadline(), None);
    }

    #[tokio::test]
    async fn test_wait_due_follows_manual_clock() {
        let (clock, mut scheduler) = scheduler();
        scheduler.schedule(Severity::App);

        let waiting = scheduler.wait_due();
        let advance = async {
            tokio::task::yield_now().await;
            clock.advance(Duration::from_millis(400));
            tokio::task::yield_now().await;
            clock.advance(Duration::from_millis(600));
        };
        tokio::join!(waiting, advance);
        assert_eq!(scheduler.take_due(), Some(Severity::App));
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Pipeline > Severity::App);
    }
}
