//! Constant bit rate traffic source.
//!
//! A [`TrafficSource`] sends `packet_count` datagrams of `packet_size`
//! bytes, one every `interval`, starting as soon as it is activated. It
//! re-arms itself through the [`Simulator`] after every send until its
//! budget is exhausted.

use crate::{
    Simulator,
    time_queue::EventId,
    transport::{Endpoint, Transport},
};
use anyhow::Result;
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

/// Error for malformed traffic parameters. Rejected before the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: `{parameter}' {reason}")]
    InvalidConfiguration {
        parameter: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrafficError {
    #[error("Traffic source already started (state: {state})")]
    AlreadyStarted { state: SourceState },
}

/// Parameters of a [`TrafficSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficConfig {
    /// bytes of payload per packet
    pub packet_size: u64,
    /// total number of packets to send
    pub packet_count: u64,
    /// virtual time between two packets
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    Running,
    Stopped,
}

/// Handle on a self-scheduling sender.
///
/// Clones share the same state; the scheduler keeps one clone in the
/// pending send event.
///
/// ```
/// use manet_core::{Simulator, time::SimTime, traffic::*, transport::*};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Wire(Vec<SimTime>);
///
/// impl Transport for Wire {
///     fn send(&mut self, sim: &mut Simulator<Self>, _: Endpoint, _: Endpoint, _: u64) {
///         self.0.push(sim.now());
///     }
/// }
///
/// let config = TrafficConfig {
///     packet_size: 1_000,
///     packet_count: 3,
///     interval: Duration::from_secs(1),
/// };
/// let source = TrafficSource::new(
///     "10.1.1.25:49153".parse().unwrap(),
///     "10.1.1.1:80".parse().unwrap(),
///     config,
/// )
/// .unwrap();
///
/// let mut sim = Simulator::new();
/// let mut wire = Wire::default();
/// source.start(&mut sim, Duration::from_secs(30)).unwrap();
/// sim.run(&mut wire).unwrap();
///
/// assert_eq!(
///     wire.0,
///     [SimTime::from_secs(30), SimTime::from_secs(31), SimTime::from_secs(32)]
/// );
/// assert_eq!(source.state(), SourceState::Stopped);
/// ```
#[derive(Clone)]
pub struct TrafficSource {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    local: Endpoint,
    destination: Endpoint,
    packet_size: u64,
    remaining: u64,
    interval: Duration,
    state: SourceState,

    /// the next send, if armed
    pending: Option<EventId>,
    sent: u64,
}

impl TrafficConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packet_size == 0 {
            return Err(ConfigError::InvalidConfiguration {
                parameter: "packet_size",
                reason: "must be greater than zero",
            });
        }
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidConfiguration {
                parameter: "interval",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            packet_size: 1_000,
            packet_count: 1,
            interval: Duration::from_secs(1),
        }
    }
}

impl TrafficSource {
    pub fn new(
        local: Endpoint,
        destination: Endpoint,
        config: TrafficConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let inner = Inner {
            local,
            destination,
            packet_size: config.packet_size,
            remaining: config.packet_count,
            interval: config.interval,
            state: SourceState::Idle,
            pending: None,
            sent: 0,
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // the state stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SourceState {
        self.inner().state
    }

    pub fn remaining(&self) -> u64 {
        self.inner().remaining
    }

    pub fn sent(&self) -> u64 {
        self.inner().sent
    }

    pub fn local(&self) -> Endpoint {
        self.inner().local
    }

    pub fn destination(&self) -> Endpoint {
        self.inner().destination
    }

    /// Arm the source: the first packet leaves `delay` from now.
    ///
    /// A source with an empty budget goes straight to
    /// [`SourceState::Stopped`] without scheduling anything.
    pub fn start<W: Transport>(
        &self,
        sim: &mut Simulator<W>,
        delay: Duration,
    ) -> Result<(), TrafficError> {
        let mut inner = self.inner();
        if inner.state != SourceState::Idle || inner.pending.is_some() {
            return Err(TrafficError::AlreadyStarted { state: inner.state });
        }

        if inner.remaining == 0 {
            debug!(local = %inner.local, "empty traffic budget, stopped");
            inner.state = SourceState::Stopped;
            return Ok(());
        }

        let source = self.clone();
        inner.pending = Some(sim.schedule(delay, move |sim, world| source.tick(sim, world)));
        Ok(())
    }

    /// Stop before the budget is exhausted.
    ///
    /// Returns `true` if a pending send was cancelled.
    pub fn stop<W>(&self, sim: &mut Simulator<W>) -> bool {
        let mut inner = self.inner();
        let cancelled = inner.pending.take().is_some_and(|event| sim.cancel(event));
        if inner.state != SourceState::Stopped {
            debug!(local = %inner.local, sent = inner.sent, "traffic source stopped");
            inner.state = SourceState::Stopped;
        }
        cancelled
    }

    fn tick<W: Transport>(self, sim: &mut Simulator<W>, world: &mut W) -> Result<()> {
        // the guard is released before calling into the transport: a
        // receiver on the same node runs synchronously and may query us
        let (local, destination, packet_size, exhausted) = {
            let mut inner = self.inner();
            inner.pending = None;

            if inner.state == SourceState::Stopped {
                return Ok(());
            }

            inner.remaining -= 1;
            inner.sent += 1;
            let exhausted = inner.remaining == 0;
            if exhausted {
                inner.state = SourceState::Stopped;
            } else {
                inner.state = SourceState::Running;
                let source = self.clone();
                inner.pending = Some(
                    sim.schedule(inner.interval, move |sim, world| source.tick(sim, world)),
                );
            }
            debug!(
                local = %inner.local,
                destination = %inner.destination,
                size = inner.packet_size,
                remaining = inner.remaining,
                "sending packet at {}",
                sim.now()
            );

            (inner.local, inner.destination, inner.packet_size, exhausted)
        };

        world.send(sim, local, destination, packet_size);
        if exhausted {
            world.close(sim, local);
        }

        Ok(())
    }
}

impl fmt::Debug for TrafficSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner();
        f.debug_struct("TrafficSource")
            .field("local", &inner.local)
            .field("destination", &inner.destination)
            .field("packet_size", &inner.packet_size)
            .field("remaining", &inner.remaining)
            .field("interval", &inner.interval)
            .field("state", &inner.state)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}
