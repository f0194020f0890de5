use crate::{
    time::SimTime,
    time_queue::{EventId, TimeQueue},
};
use anyhow::Result;
use std::{cmp, fmt, time::Duration};
use thiserror::Error;
use tracing::trace;

/// An action executed by the [`Simulator`] when its due time is reached.
///
/// The action receives the simulator (so it can read the clock and
/// schedule follow-up events) and the simulated world `W`.
pub type Action<W> = Box<dyn FnOnce(&mut Simulator<W>, &mut W) -> Result<()>>;

/// Error returned by [`Simulator::run`] and [`Simulator::step`].
#[derive(Debug, Error)]
pub enum RunError {
    /// A scheduled action returned an error. The run stops at this event,
    /// the remaining events are left in the queue untouched.
    #[error("{event} failed at {at}: {error:#}")]
    ActionFailed {
        at: SimTime,
        event: EventId,
        error: anyhow::Error,
    },
}

/// Single threaded, discrete-event scheduler with a virtual clock.
///
/// Events run in non-decreasing time order. Events due at the same time
/// run in the order they were scheduled.
///
/// ```
/// use manet_core::{Simulator, time::SimTime};
/// use std::time::Duration;
///
/// let mut sim: Simulator<Vec<&str>> = Simulator::new();
/// sim.schedule(Duration::from_secs(2), |_, log| {
///     log.push("second");
///     Ok(())
/// });
/// sim.schedule(Duration::from_secs(1), |sim, log| {
///     log.push("first");
///     sim.schedule(Duration::from_secs(5), |_, log| {
///         log.push("third");
///         Ok(())
///     });
///     Ok(())
/// });
///
/// let mut log = Vec::new();
/// sim.run(&mut log).unwrap();
///
/// assert_eq!(log, ["first", "second", "third"]);
/// assert_eq!(sim.now(), SimTime::from_secs(6));
/// ```
pub struct Simulator<W> {
    now: SimTime,

    queue: TimeQueue<Action<W>>,

    stop_at: Option<SimTime>,

    /// number of events executed so far
    executed: u64,
}

impl<W> Simulator<W> {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            queue: TimeQueue::new(),
            stop_at: None,
            executed: 0,
        }
    }

    /// Current value of the virtual clock.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    #[inline]
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Number of events still waiting to be executed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_pending(&self, event: EventId) -> bool {
        self.queue.contains(event)
    }

    /// Schedule `action` to run `delay` after the current time.
    pub fn schedule<F>(&mut self, delay: Duration, action: F) -> EventId
    where
        F: FnOnce(&mut Simulator<W>, &mut W) -> Result<()> + 'static,
    {
        let at = self.now + delay;
        self.schedule_at(at, action)
    }

    /// Schedule `action` at the current time, after every event already
    /// due now.
    pub fn schedule_now<F>(&mut self, action: F) -> EventId
    where
        F: FnOnce(&mut Simulator<W>, &mut W) -> Result<()> + 'static,
    {
        self.schedule_at(self.now, action)
    }

    /// Schedule `action` at an absolute time.
    ///
    /// A time in the past is moved to the current time: the clock never
    /// goes backward.
    pub fn schedule_at<F>(&mut self, at: SimTime, action: F) -> EventId
    where
        F: FnOnce(&mut Simulator<W>, &mut W) -> Result<()> + 'static,
    {
        let at = cmp::max(at, self.now);
        let event = self.queue.push(at, Box::new(action));
        trace!(%event, %at, "scheduled");
        event
    }

    /// Cancel a scheduled event.
    ///
    /// Returns `false` if the event was already executed or cancelled.
    pub fn cancel(&mut self, event: EventId) -> bool {
        let cancelled = self.queue.cancel(event);
        if cancelled {
            trace!(%event, "cancelled");
        }
        cancelled
    }

    /// Stop the run at the given time. Events due at exactly `at` are
    /// still executed.
    pub fn stop_at(&mut self, at: SimTime) {
        self.stop_at = Some(at);
    }

    pub fn stop_time(&self) -> Option<SimTime> {
        self.stop_at
    }

    /// Execute the next due event.
    ///
    /// Returns `false` if there was nothing left to execute before the
    /// stop time.
    pub fn step(&mut self, world: &mut W) -> Result<bool, RunError> {
        let Some(due) = self.queue.next_due() else {
            return Ok(false);
        };
        if let Some(stop) = self.stop_at
            && due > stop
        {
            return Ok(false);
        }
        let Some((event, at, action)) = self.queue.pop() else {
            return Ok(false);
        };

        debug_assert!(at >= self.now, "the virtual clock cannot go backward");
        self.now = at;
        self.executed += 1;

        trace!(%event, %at, "executing");
        action(self, world).map_err(|error| RunError::ActionFailed { at, event, error })?;

        Ok(true)
    }

    /// Run until the queue is empty or the stop time is reached.
    ///
    /// When a stop time is set, the clock ends on it even if the queue
    /// ran dry before.
    pub fn run(&mut self, world: &mut W) -> Result<(), RunError> {
        while self.step(world)? {}

        if let Some(stop) = self.stop_at
            && self.now < stop
        {
            self.now = stop;
        }

        Ok(())
    }
}

impl<W> Default for Simulator<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> fmt::Debug for Simulator<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("now", &self.now)
            .field("pending", &self.queue.len())
            .field("stop_at", &self.stop_at)
            .field("executed", &self.executed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    type Log = Vec<(SimTime, &'static str)>;

    fn record(label: &'static str) -> impl FnOnce(&mut Simulator<Log>, &mut Log) -> Result<()> {
        move |sim, log| {
            log.push((sim.now(), label));
            Ok(())
        }
    }

    #[test]
    fn empty_run() {
        let mut sim: Simulator<Log> = Simulator::new();
        let mut log = Log::new();

        sim.run(&mut log).unwrap();

        assert!(log.is_empty());
        assert_eq!(sim.now(), SimTime::ZERO);
        assert_eq!(sim.executed(), 0);
    }

    #[test]
    fn chronological_regardless_of_submission() {
        let mut sim: Simulator<Log> = Simulator::new();
        sim.schedule_at(SimTime::from_secs(32), record("c"));
        sim.schedule_at(SimTime::from_millis(31_500), record("b"));
        sim.schedule_at(SimTime::from_secs(31), record("a"));

        let mut log = Log::new();
        sim.run(&mut log).unwrap();

        assert_eq!(
            log,
            [
                (SimTime::from_secs(31), "a"),
                (SimTime::from_millis(31_500), "b"),
                (SimTime::from_secs(32), "c"),
            ]
        );
    }

    #[test]
    fn fifo_tie_break() {
        let mut sim: Simulator<Log> = Simulator::new();
        sim.schedule(Duration::from_secs(1), record("first"));
        sim.schedule(Duration::from_secs(1), record("second"));
        sim.schedule(Duration::from_secs(1), |sim, log: &mut Log| {
            log.push((sim.now(), "third"));
            // scheduled now, so after everything already due now
            sim.schedule_now(record("fourth"));
            Ok(())
        });

        let mut log = Log::new();
        sim.run(&mut log).unwrap();

        let labels: Vec<_> = log.iter().map(|(_, label)| *label).collect();
        assert_eq!(labels, ["first", "second", "third", "fourth"]);
    }

    #[test]
    fn past_is_clamped_to_now() {
        let mut sim: Simulator<Log> = Simulator::new();
        sim.schedule_at(SimTime::from_secs(5), |sim, _| {
            sim.schedule_at(SimTime::from_secs(1), record("late"));
            Ok(())
        });

        let mut log = Log::new();
        sim.run(&mut log).unwrap();

        assert_eq!(log, [(SimTime::from_secs(5), "late")]);
    }

    #[test]
    fn stop_time_is_inclusive() {
        let mut sim: Simulator<Log> = Simulator::new();
        sim.schedule_at(SimTime::from_secs(10), record("on time"));
        sim.schedule_at(SimTime::from_secs(11), record("too late"));
        sim.stop_at(SimTime::from_secs(10));

        let mut log = Log::new();
        sim.run(&mut log).unwrap();

        assert_eq!(log, [(SimTime::from_secs(10), "on time")]);
        assert_eq!(sim.pending(), 1);
        assert_eq!(sim.now(), SimTime::from_secs(10));
    }

    #[test]
    fn clock_ends_on_stop_time() {
        let mut sim: Simulator<Log> = Simulator::new();
        sim.schedule_at(SimTime::from_secs(1), record("only"));
        sim.stop_at(SimTime::from_secs(40));

        let mut log = Log::new();
        sim.run(&mut log).unwrap();

        assert_eq!(sim.now(), SimTime::from_secs(40));
    }

    #[test]
    fn cancelled_event_never_runs() {
        let mut sim: Simulator<Log> = Simulator::new();
        let event = sim.schedule(Duration::from_secs(1), record("cancelled"));
        sim.schedule(Duration::from_secs(2), record("kept"));

        assert!(sim.is_pending(event));
        assert!(sim.cancel(event));
        assert!(!sim.is_pending(event));

        let mut log = Log::new();
        sim.run(&mut log).unwrap();

        assert_eq!(log, [(SimTime::from_secs(2), "kept")]);
        assert!(!sim.cancel(event));
    }

    #[test]
    fn failing_action_stops_the_run() {
        let mut sim: Simulator<Log> = Simulator::new();
        sim.schedule(Duration::from_secs(1), record("before"));
        let failing = sim.schedule(Duration::from_secs(2), |_, _| bail!("broken action"));
        sim.schedule(Duration::from_secs(3), record("after"));

        let mut log = Log::new();
        let Err(error) = sim.run(&mut log) else {
            panic!("Expecting the run to stop on the failing action")
        };

        let RunError::ActionFailed { at, event, .. } = &error;
        assert_eq!(*at, SimTime::from_secs(2));
        assert_eq!(*event, failing);
        assert!(error.to_string().contains("broken action"));

        assert_eq!(log, [(SimTime::from_secs(1), "before")]);
        assert_eq!(sim.pending(), 1, "remaining events are left untouched");
    }
}
