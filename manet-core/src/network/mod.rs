//! The radio channel the traffic runs over.
//!
//! [`Channel`] places the nodes on a grid, brings a link up between any
//! two nodes within radio range and routes datagrams hop by hop along
//! static shortest-hop routes. Every discarded frame is published on the
//! [`TraceBus`] and every datagram is accounted for in the
//! [`FlowMonitor`].

mod address;
mod grid;
mod loss;
mod packet;
mod rate;
mod route;

pub use self::{
    address::AddressPlan,
    grid::{GridLayout, Position},
    loss::{LossModel, LossModelError, LossRate, LossRateError},
    packet::{Datagram, DatagramBuilder, PacketId, PacketIdGenerator},
    rate::DataRate,
    route::RoutingTable,
};
use crate::{
    Simulator,
    bus::{DropEvent, TraceBus},
    defaults::{
        DEFAULT_DATA_RATE, DEFAULT_LOSS_MODEL, DEFAULT_MAC_QUEUE_LIMIT, DEFAULT_MAX_FRAME_BYTES,
        DEFAULT_RADIO_RANGE, MAC_OVERHEAD_BYTES, PROPAGATION_SPEED,
    },
    flow::FlowMonitor,
    node::{Node, NodeId},
    time::SimTime,
    transport::{Endpoint, Transport},
};
use anyhow::{Result, ensure};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    net::Ipv4Addr,
    time::Duration,
};
use tracing::{debug, info, trace};

/// Parameters of the [`Channel`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub grid: GridLayout,
    pub num_nodes: usize,
    /// radio range in metres
    pub range: f64,
    pub data_rate: DataRate,
    /// frames a node holds before dropping at the link layer
    pub mac_queue_limit: usize,
    /// largest frame the PHY transmits, MAC overhead included
    pub max_frame_bytes: u64,
    pub loss: LossModel,
    pub seed: u64,
    pub addresses: AddressPlan,
}

/// Callback of a bound socket, invoked on every datagram it receives.
pub type Receiver = Box<dyn FnMut(SimTime, &Datagram)>;

/// The simulated world the traffic sources send into.
///
/// ```
/// use manet_core::{Simulator, network::{Channel, ChannelConfig}, transport::Transport};
/// use std::{cell::Cell, rc::Rc};
///
/// let mut channel = Channel::new(ChannelConfig::default()).unwrap();
/// let received = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&received);
/// channel.bind("10.1.1.1:80".parse().unwrap(), move |_, _| counter.set(counter.get() + 1));
///
/// let mut sim = Simulator::new();
/// channel.send(
///     &mut sim,
///     "10.1.1.25:49153".parse().unwrap(),
///     "10.1.1.1:80".parse().unwrap(),
///     1_000,
/// );
/// sim.run(&mut channel).unwrap();
///
/// assert_eq!(received.get(), 1);
/// ```
pub struct Channel {
    config: ChannelConfig,

    nodes: Vec<Node>,

    routes: RoutingTable,

    packet_id_generator: PacketIdGenerator,

    bus: TraceBus,

    monitor: FlowMonitor,

    sockets: HashMap<Endpoint, Receiver>,

    closed: HashSet<Endpoint>,

    /// Centralised RNG for all the reception losses.
    ///
    /// A single source keeps the run reproducible for a given seed.
    rng: ChaChaRng,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            grid: GridLayout::default(),
            num_nodes: 25,
            range: DEFAULT_RADIO_RANGE,
            data_rate: DEFAULT_DATA_RATE,
            mac_queue_limit: DEFAULT_MAC_QUEUE_LIMIT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            loss: DEFAULT_LOSS_MODEL,
            seed: 0,
            addresses: AddressPlan::default(),
        }
    }
}

impl Channel {
    pub fn new(config: ChannelConfig) -> Result<Self> {
        ensure!(config.num_nodes > 0, "The channel needs at least one node");
        ensure!(
            config.data_rate.bps() > 0,
            "The data rate must be greater than zero"
        );

        let nodes = (0..config.num_nodes)
            .map(|index| {
                let id = NodeId::new(index as u32);
                let address = config.addresses.address(id)?;
                Ok(Node::new(id, config.grid.position(index), address))
            })
            .collect::<Result<Vec<_>>>()?;

        let positions: Vec<_> = nodes.iter().map(Node::position).collect();
        let routes = RoutingTable::compute(&positions, config.range);

        Ok(Self {
            rng: ChaChaRng::seed_from_u64(config.seed),
            config,
            nodes,
            routes,
            packet_id_generator: PacketIdGenerator::new(),
            bus: TraceBus::new(),
            monitor: FlowMonitor::new(),
            sockets: HashMap::new(),
            closed: HashSet::new(),
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Reseed the loss RNG. Call before the run.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaChaRng::seed_from_u64(seed);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn address(&self, id: NodeId) -> Option<Ipv4Addr> {
        self.node(id).map(Node::address)
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn trace_bus_mut(&mut self) -> &mut TraceBus {
        &mut self.bus
    }

    pub fn flow_monitor(&self) -> &FlowMonitor {
        &self.monitor
    }

    /// Receive the datagrams addressed to `endpoint`.
    ///
    /// Binding an endpoint again replaces the previous callback.
    pub fn bind<F>(&mut self, endpoint: Endpoint, callback: F)
    where
        F: FnMut(SimTime, &Datagram) + 'static,
    {
        self.closed.remove(&endpoint);
        self.sockets.insert(endpoint, Box::new(callback));
    }

    fn drop_frame(&mut self, event: DropEvent, at: NodeId, datagram: &Datagram) {
        debug!(
            packet = %datagram.id(),
            node = %at,
            "{event}"
        );
        self.bus.notify(event);
    }

    /// Queue `datagram` on the transmitter of `at`, towards its
    /// destination.
    fn forward(&mut self, sim: &mut Simulator<Self>, at: NodeId, datagram: Datagram) {
        let Some(destination) = self.config.addresses.node(*datagram.destination().ip()) else {
            debug!(packet = %datagram.id(), destination = %datagram.destination(), "unknown destination, dropped");
            return;
        };
        if at == destination {
            self.deliver(sim, datagram);
            return;
        }
        let Some(next) = self.routes.next_hop(at, destination) else {
            debug!(packet = %datagram.id(), node = %at, %destination, "no route, dropped");
            return;
        };

        if self.nodes[at.index()].queued() >= self.config.mac_queue_limit {
            self.drop_frame(DropEvent::MacTxDrop, at, &datagram);
            return;
        }

        let frame = datagram.ip_size() + MAC_OVERHEAD_BYTES;
        if frame > self.config.max_frame_bytes {
            self.drop_frame(DropEvent::PhyTxDrop, at, &datagram);
            return;
        }

        let airtime = self.config.data_rate.airtime(frame);
        let tx_end = self.nodes[at.index()].enqueue(sim.now(), airtime);
        let distance = self.nodes[at.index()]
            .position()
            .distance(&self.nodes[next.index()].position());
        let propagation = Duration::from_secs_f64(distance / PROPAGATION_SPEED);

        trace!(packet = %datagram.id(), from = %at, to = %next, %tx_end, "frame queued");

        sim.schedule_at(tx_end, move |sim, channel: &mut Channel| {
            channel.nodes[at.index()].dequeue();
            sim.schedule(propagation, move |sim, channel: &mut Channel| {
                channel.receive(sim, next, datagram);
                Ok(())
            });
            Ok(())
        });
    }

    /// A frame reached the radio of `at`.
    fn receive(&mut self, sim: &mut Simulator<Self>, at: NodeId, datagram: Datagram) {
        if self.config.loss.is_lost(&mut self.rng) {
            self.drop_frame(DropEvent::PhyRxDrop, at, &datagram);
            return;
        }
        self.forward(sim, at, datagram);
    }

    fn deliver(&mut self, sim: &mut Simulator<Self>, datagram: Datagram) {
        let now = sim.now();
        self.monitor.record_rx(now, &datagram);

        match self.sockets.get_mut(&datagram.destination()) {
            Some(callback) => {
                info!(
                    packet = %datagram.id(),
                    source = %datagram.source(),
                    "Received one packet at {now}"
                );
                callback(now, &datagram);
            }
            None => debug!(
                packet = %datagram.id(),
                destination = %datagram.destination(),
                "no socket bound"
            ),
        }
    }
}

impl Transport for Channel {
    fn send(
        &mut self,
        sim: &mut Simulator<Self>,
        source: Endpoint,
        destination: Endpoint,
        payload_size: u64,
    ) {
        if self.closed.contains(&source) {
            debug!(%source, "send on a closed socket ignored");
            return;
        }
        let Some(origin) = self.config.addresses.node(*source.ip()) else {
            debug!(%source, "unknown source address, dropped");
            return;
        };
        if origin.index() >= self.nodes.len() {
            debug!(%source, "source is not a node of the grid, dropped");
            return;
        }

        let datagram = match Datagram::builder(&self.packet_id_generator)
            .source(source)
            .destination(destination)
            .payload_size(payload_size)
            .sent_at(sim.now())
            .build()
        {
            Ok(datagram) => datagram,
            Err(error) => {
                debug!(%source, %destination, "{error:#}");
                return;
            }
        };

        self.monitor.record_tx(sim.now(), &datagram);
        self.forward(sim, origin, datagram);
    }

    fn close(&mut self, _sim: &mut Simulator<Self>, local: Endpoint) {
        debug!(%local, "socket closed");
        self.sockets.remove(&local);
        self.closed.insert(local);
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.config)
            .field("nodes", &self.nodes.len())
            .field("sockets", &self.sockets.len())
            .field("bus", &self.bus)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}
