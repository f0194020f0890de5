//! Drop accounting.
//!
//! [`DropCounter`] totals the drop notifications published on the
//! [`TraceBus`]; [`DropReporter`] samples it on a periodic timer and once
//! more at the end of the run.

use crate::{
    Simulator,
    bus::{DropEvent, TraceBus},
    defaults::DEFAULT_REPORT_PERIOD,
    time::SimTime,
};
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tracing::info;

/// Cumulative drop totals for the whole run.
///
/// Each handler is a single atomic increment. There is no reset: values
/// are totals since the counter was created.
#[derive(Debug, Default)]
pub struct DropCounter {
    mac_tx: AtomicU64,
    phy_tx: AtomicU64,
    phy_rx: AtomicU64,
}

/// A point-in-time copy of the [`DropCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DropSnapshot {
    pub mac_tx: u64,
    pub phy_tx: u64,
    pub phy_rx: u64,
}

/// One line of the drop report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DropRecord {
    pub time: SimTime,
    pub drops: DropSnapshot,
}

impl DropCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe the three drop handlers to the trace bus.
    pub fn attach(self: &Arc<Self>, bus: &mut TraceBus) {
        for event in DropEvent::ALL {
            let counter = Arc::clone(self);
            bus.subscribe(event, move || counter.on_drop(event));
        }
    }

    pub fn on_drop(&self, event: DropEvent) {
        match event {
            DropEvent::MacTxDrop => self.on_mac_tx_drop(),
            DropEvent::PhyTxDrop => self.on_phy_tx_drop(),
            DropEvent::PhyRxDrop => self.on_phy_rx_drop(),
        }
    }

    pub fn on_mac_tx_drop(&self) {
        self.mac_tx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_phy_tx_drop(&self) {
        self.phy_tx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_phy_rx_drop(&self) {
        self.phy_rx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DropSnapshot {
        DropSnapshot {
            mac_tx: self.mac_tx.load(Ordering::Relaxed),
            phy_tx: self.phy_tx.load(Ordering::Relaxed),
            phy_rx: self.phy_rx.load(Ordering::Relaxed),
        }
    }
}

impl DropSnapshot {
    pub fn total(&self) -> u64 {
        self.mac_tx + self.phy_tx + self.phy_rx
    }

    /// `true` if no field went down compared to `previous`.
    pub fn dominates(&self, previous: &Self) -> bool {
        self.mac_tx >= previous.mac_tx
            && self.phy_tx >= previous.phy_tx
            && self.phy_rx >= previous.phy_rx
    }
}

/// Periodic sampler of a [`DropCounter`].
///
/// Cloning the reporter shares the counter and the records collected so far.
///
/// ```
/// use manet_core::{Simulator, drops::{DropCounter, DropReporter}, time::SimTime};
/// use std::time::Duration;
///
/// let counter = DropCounter::new();
/// let reporter = DropReporter::new(counter, Duration::from_secs(5));
///
/// let mut sim: Simulator<()> = Simulator::new();
/// reporter.start(&mut sim);
/// sim.stop_at(SimTime::from_secs(12));
/// sim.run(&mut ()).unwrap();
/// reporter.flush(&sim).unwrap();
///
/// // ticks at 5s and 10s, then the final flush at 12s
/// assert_eq!(reporter.records().unwrap().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct DropReporter {
    counter: Arc<DropCounter>,
    period: Duration,
    records: Arc<Mutex<Vec<DropRecord>>>,
}

impl DropReporter {
    pub fn new(counter: Arc<DropCounter>, period: Duration) -> Self {
        Self {
            counter,
            period,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_default_period(counter: Arc<DropCounter>) -> Self {
        Self::new(counter, DEFAULT_REPORT_PERIOD)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arm the periodic timer: the first report is one period from now.
    ///
    /// The reporter re-arms itself forever, the run needs a stop time.
    pub fn start<W: 'static>(&self, sim: &mut Simulator<W>) {
        let reporter = self.clone();
        sim.schedule(self.period, move |sim, _| reporter.tick(sim));
    }

    fn tick<W: 'static>(self, sim: &mut Simulator<W>) -> Result<()> {
        self.record(sim.now())?;

        let period = self.period;
        sim.schedule(period, move |sim, _| self.tick(sim));
        Ok(())
    }

    /// Final, unscheduled report at the current time of `sim`.
    pub fn flush<W>(&self, sim: &Simulator<W>) -> Result<DropRecord> {
        self.record(sim.now())
    }

    fn record(&self, time: SimTime) -> Result<DropRecord> {
        let record = DropRecord {
            time,
            drops: self.counter.snapshot(),
        };
        info!(
            target: "manet::drops",
            mac_tx = record.drops.mac_tx,
            phy_tx = record.drops.phy_tx,
            phy_rx = record.drops.phy_rx,
            "{time}"
        );

        self.records
            .lock()
            .map_err(|error| anyhow!("Failed to lock on the drop records: {error}"))?
            .push(record);
        Ok(record)
    }

    /// Every record collected so far, in time order.
    pub fn records(&self) -> Result<Vec<DropRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|error| anyhow!("Failed to lock on the drop records: {error}"))?;
        Ok(records.clone())
    }
}

impl fmt::Display for DropRecord {
    /// `<seconds> <mac_tx> <phy_tx> <phy_rx>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.time.as_secs_f64(),
            self.drops.mac_tx,
            self.drops.phy_tx,
            self.drops.phy_rx
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handlers_increment_their_own_field() {
        let counter = DropCounter::new();
        counter.on_mac_tx_drop();
        counter.on_phy_rx_drop();
        counter.on_phy_rx_drop();

        assert_eq!(
            counter.snapshot(),
            DropSnapshot {
                mac_tx: 1,
                phy_tx: 0,
                phy_rx: 2
            }
        );
    }

    #[test]
    fn total_matches_notifications_delivered() {
        let counter = DropCounter::new();
        let mut bus = TraceBus::new();
        counter.attach(&mut bus);

        let notifications = [
            DropEvent::PhyRxDrop,
            DropEvent::MacTxDrop,
            DropEvent::PhyRxDrop,
            DropEvent::PhyTxDrop,
            DropEvent::PhyRxDrop,
        ];
        let mut previous = counter.snapshot();
        for event in notifications {
            bus.notify(event);
            let current = counter.snapshot();
            assert!(current.dominates(&previous));
            previous = current;
        }

        let snapshot = counter.snapshot();
        assert_eq!(snapshot.total(), notifications.len() as u64);
        assert_eq!(snapshot.total(), bus.published());
        assert_eq!(snapshot.phy_rx, 3);
    }

    fn run_reporter(run: SimTime, period: Duration, drops_every: Duration) -> Vec<DropRecord> {
        let counter = DropCounter::new();
        let reporter = DropReporter::new(Arc::clone(&counter), period);
        let mut sim: Simulator<()> = Simulator::new();

        fn drop_loop(sim: &mut Simulator<()>, counter: Arc<DropCounter>, every: Duration) {
            sim.schedule(every, move |sim, _| {
                counter.on_phy_rx_drop();
                drop_loop(sim, counter, every);
                Ok(())
            });
        }
        drop_loop(&mut sim, counter, drops_every);

        reporter.start(&mut sim);
        sim.stop_at(run);
        sim.run(&mut ()).unwrap();
        reporter.flush(&sim).unwrap();

        reporter.records().unwrap()
    }

    #[test]
    fn tick_count_includes_final_flush() {
        let period = Duration::from_secs(5);
        for secs in [0, 4, 5, 12, 40] {
            let records = run_reporter(
                SimTime::from_secs(secs),
                period,
                Duration::from_millis(700),
            );
            assert_eq!(records.len() as u64, secs / 5 + 1, "run of {secs}s");
        }
    }

    #[test]
    fn records_are_monotonic() {
        let records = run_reporter(
            SimTime::from_secs(33),
            Duration::from_secs(5),
            Duration::from_millis(300),
        );

        assert_eq!(records.last().unwrap().time, SimTime::from_secs(33));
        for pair in records.windows(2) {
            assert!(pair[1].time >= pair[0].time);
            assert!(pair[1].drops.dominates(&pair[0].drops));
        }
        // 33s / 300ms
        assert_eq!(records.last().unwrap().drops.phy_rx, 110);
    }

    #[test]
    fn record_line() {
        let record = DropRecord {
            time: SimTime::from_secs(5),
            drops: DropSnapshot {
                mac_tx: 1,
                phy_tx: 2,
                phy_rx: 3,
            },
        };
        assert_eq!(record.to_string(), "5 1 2 3");
    }
}
