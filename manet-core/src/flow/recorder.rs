use super::{FlowId, FlowKey, FlowStats};
use serde::Serialize;
use std::{collections::BTreeSet, fmt, time::Duration};
use thiserror::Error;
use tracing::warn;

/// The `(source, destination)` pairs the report is about.
///
/// Built once, before the run. Membership is exact: both addresses must
/// match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchList(BTreeSet<FlowKey>);

/// The throughput of a flow cannot be computed: nothing was received, or
/// the last reception happened at the instant of the first transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Insufficient data to compute the throughput of flow {flow}")]
pub struct InsufficientFlowData {
    pub flow: FlowId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowStatus {
    Measured,
    /// throughput reported as `0.0`
    InsufficientData,
}

/// Report entry of a watched flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub id: FlowId,
    pub key: FlowKey,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub lost_packets: u64,
    pub mean_delay: Option<Duration>,
    pub throughput_kbps: f64,
    pub status: FlowStatus,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FlowKey) -> bool {
        self.0.insert(key)
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowKey> {
        self.0.iter()
    }
}

impl FromIterator<FlowKey> for WatchList {
    fn from_iter<I: IntoIterator<Item = FlowKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Received kilobits (1024 bits) per second, from the first
/// transmission to the last reception.
///
/// ```
/// # use manet_core::{flow::*, time::SimTime};
/// # use std::time::Duration;
/// let stats = FlowStats {
///     tx_packets: 128,
///     rx_packets: 128,
///     tx_bytes: 131_072,
///     rx_bytes: 131_072,
///     first_tx_time: SimTime::from_secs(31),
///     last_tx_time: SimTime::from_secs(34),
///     first_rx_time: Some(SimTime::from_millis(31_010)),
///     last_rx_time: Some(SimTime::from_secs(35)),
///     delay_sum: Duration::from_secs(1),
/// };
/// assert_eq!(throughput_kbps(FlowId::new(1), &stats).unwrap(), 256.0);
/// ```
pub fn throughput_kbps(id: FlowId, stats: &FlowStats) -> Result<f64, InsufficientFlowData> {
    let elapsed = stats
        .last_rx_time
        .map(|last_rx| last_rx.saturating_duration_since(stats.first_tx_time))
        .filter(|elapsed| !elapsed.is_zero())
        .ok_or(InsufficientFlowData { flow: id })?;

    Ok(stats.rx_bytes as f64 * 8.0 / elapsed.as_secs_f64() / 1024.0)
}

/// Keep the watched flows and compute their throughput.
///
/// Flows are visited in the order given, which for a
/// [`FlowMonitor`](super::FlowMonitor) is the order of first appearance.
/// A flow that `classify` does not know is skipped.
pub fn summarize<'a, I, C>(flows: I, mut classify: C, watch_list: &WatchList) -> Vec<FlowReport>
where
    I: IntoIterator<Item = (FlowId, &'a FlowStats)>,
    C: FnMut(FlowId) -> Option<FlowKey>,
{
    flows
        .into_iter()
        .filter_map(|(id, stats)| {
            let key = classify(id)?;
            if !watch_list.contains(&key) {
                return None;
            }

            let (throughput_kbps, status) = match throughput_kbps(id, stats) {
                Ok(kbps) => (kbps, FlowStatus::Measured),
                Err(error) => {
                    warn!(flow = %id, %key, "{error}");
                    (0.0, FlowStatus::InsufficientData)
                }
            };

            Some(FlowReport {
                id,
                key,
                tx_packets: stats.tx_packets,
                rx_packets: stats.rx_packets,
                lost_packets: stats.lost_packets(),
                mean_delay: stats.mean_delay(),
                throughput_kbps,
                status,
            })
        })
        .collect()
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flow ID: {}", self.id)?;
        writeln!(f, "Src Addr: {}", self.key.source)?;
        writeln!(f, "Dst Addr: {}", self.key.destination)?;
        writeln!(f, "Tx Packets: {}", self.tx_packets)?;
        writeln!(f, "Rx Packets: {}", self.rx_packets)?;
        writeln!(f, "Lost Packets: {}", self.lost_packets)?;
        if let Some(delay) = self.mean_delay {
            writeln!(f, "Mean Delay: {delay:?}")?;
        }
        match self.status {
            FlowStatus::Measured => write!(f, "Throughput: {} Kbps", self.throughput_kbps),
            FlowStatus::InsufficientData => {
                write!(f, "Throughput: {} Kbps (insufficient data)", self.throughput_kbps)
            }
        }
    }
}
