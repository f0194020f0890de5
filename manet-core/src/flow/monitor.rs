use crate::{network::Datagram, time::SimTime, transport::Endpoint};
use anyhow::{Context as _, Result};
use serde::{Serialize, Serializer};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    fs::File,
    io::{BufWriter, Write as _},
    net::Ipv4Addr,
    path::Path,
    time::Duration,
};
use tracing::debug;

/// Identifier handed out by the [`FlowMonitor`], in order of first
/// appearance. The first flow is `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FlowId(u32);

/// What a flow is classified as: its source and destination addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FlowKey {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

/// Counters of one flow, final once the run is over.
///
/// Byte counts are IP packet sizes, headers included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowStats {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub first_tx_time: SimTime,
    pub last_tx_time: SimTime,
    pub first_rx_time: Option<SimTime>,
    pub last_rx_time: Option<SimTime>,
    /// sum of the end to end delays of the received packets
    #[serde(serialize_with = "seconds")]
    pub delay_sum: Duration,
}

/// Observes every datagram entering and leaving the network.
///
/// A flow is a distinct `(source endpoint, destination endpoint)` pair.
#[derive(Debug, Default)]
pub struct FlowMonitor {
    ids: HashMap<(Endpoint, Endpoint), FlowId>,
    flows: BTreeMap<FlowId, Flow>,
}

#[derive(Debug, Serialize)]
struct Flow {
    source: Endpoint,
    destination: Endpoint,
    #[serde(flatten)]
    stats: FlowStats,
}

#[derive(Serialize)]
struct FlowDump<'a> {
    flow_id: FlowId,
    #[serde(flatten)]
    flow: &'a Flow,
}

fn seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl FlowId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl FlowStats {
    fn new(now: SimTime) -> Self {
        Self {
            tx_packets: 0,
            rx_packets: 0,
            tx_bytes: 0,
            rx_bytes: 0,
            first_tx_time: now,
            last_tx_time: now,
            first_rx_time: None,
            last_rx_time: None,
            delay_sum: Duration::ZERO,
        }
    }

    /// Packets sent but never received.
    pub fn lost_packets(&self) -> u64 {
        self.tx_packets.saturating_sub(self.rx_packets)
    }

    pub fn mean_delay(&self) -> Option<Duration> {
        let rx_packets = u32::try_from(self.rx_packets).ok().filter(|n| *n > 0)?;
        Some(self.delay_sum / rx_packets)
    }
}

impl FlowMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn flow(&mut self, now: SimTime, datagram: &Datagram) -> &mut Flow {
        let key = (datagram.source(), datagram.destination());
        let next = FlowId(self.ids.len() as u32 + 1);
        let id = *self.ids.entry(key).or_insert(next);

        self.flows.entry(id).or_insert_with(|| {
            debug!(flow = %id, source = %key.0, destination = %key.1, "new flow");
            Flow {
                source: key.0,
                destination: key.1,
                stats: FlowStats::new(now),
            }
        })
    }

    /// A datagram entered the network at its source.
    pub fn record_tx(&mut self, now: SimTime, datagram: &Datagram) {
        let stats = &mut self.flow(now, datagram).stats;
        if stats.tx_packets == 0 {
            stats.first_tx_time = now;
        }
        stats.tx_packets += 1;
        stats.tx_bytes += datagram.ip_size();
        stats.last_tx_time = now;
    }

    /// A datagram reached its destination.
    pub fn record_rx(&mut self, now: SimTime, datagram: &Datagram) {
        let stats = &mut self.flow(now, datagram).stats;
        stats.rx_packets += 1;
        stats.rx_bytes += datagram.ip_size();
        stats.first_rx_time.get_or_insert(now);
        stats.last_rx_time = Some(now);
        stats.delay_sum += now.saturating_duration_since(datagram.sent_at());
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Every flow observed so far, in order of first appearance.
    pub fn flow_stats(&self) -> impl Iterator<Item = (FlowId, &FlowStats)> {
        self.flows.iter().map(|(id, flow)| (*id, &flow.stats))
    }

    pub fn classify(&self, id: FlowId) -> Option<FlowKey> {
        self.flows.get(&id).map(|flow| FlowKey {
            source: *flow.source.ip(),
            destination: *flow.destination.ip(),
        })
    }

    /// Write every flow as a JSON array.
    pub fn write_json<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let dump: Vec<_> = self
            .flows
            .iter()
            .map(|(flow_id, flow)| FlowDump {
                flow_id: *flow_id,
                flow,
            })
            .collect();
        serde_json::to_writer_pretty(writer, &dump).context("Failed to serialize the flows")
    }

    pub fn serialize_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create `{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.write_json(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("Failed to write `{}'", path.display()))
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}
