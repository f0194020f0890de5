use crate::{ScenarioConfig, config::invalid};
use manet_core::{
    RunError, Simulator,
    defaults::DEFAULT_SINK_PORT,
    drops::{DropCounter, DropRecord, DropReporter},
    flow::{FlowKey, FlowReport, WatchList},
    network::Channel,
    node::NodeId,
    time::SimTime,
    traffic::{ConfigError, TrafficError, TrafficSource},
    transport::Endpoint,
};
use std::{cell::Cell, fmt, net::Ipv4Addr, rc::Rc};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{role} node {node} is not in the grid ({num_nodes} nodes)")]
    UnknownNode {
        role: &'static str,
        node: NodeId,
        num_nodes: usize,
    },

    #[error("Failed to build the channel")]
    Channel(#[source] anyhow::Error),

    #[error(transparent)]
    Traffic(#[from] TrafficError),

    #[error("Simulation failed")]
    Run(#[from] RunError),

    #[error("Failed to produce the report")]
    Report(#[source] anyhow::Error),
}

/// A grid scenario ready to run: the channel is built, the sink is bound
/// and the sources and the drop reporter are armed.
pub struct Scenario {
    config: ScenarioConfig,
    sim: Simulator<Channel>,
    channel: Channel,
    reporter: DropReporter,
    sources: Vec<TrafficSource>,
    watch_list: WatchList,
    received: Rc<Cell<u64>>,
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// the periodic drop records, then the final one
    pub drops: Vec<DropRecord>,
    /// the watched flows, in order of first appearance
    pub flows: Vec<FlowReport>,
    /// datagrams received by the sink
    pub received: u64,
    pub ended_at: SimTime,
    pub events: u64,
}

impl Scenario {
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        config.validate()?;

        let mut channel = Channel::new(config.channel()).map_err(ScenarioError::Channel)?;
        let mut sim = Simulator::new();

        let counter = DropCounter::new();
        counter.attach(channel.trace_bus_mut());
        let reporter = DropReporter::new(counter, config.report_period);

        let sink_address = address(&channel, "sink", config.sink, config.num_nodes)?;
        let sink = Endpoint::new(sink_address, DEFAULT_SINK_PORT);
        let received = Rc::new(Cell::new(0));
        let count = Rc::clone(&received);
        channel.bind(sink, move |_, _| count.set(count.get() + 1));

        let mut sources = Vec::with_capacity(config.sources.len());
        let mut watch_list = WatchList::new();
        for (index, node) in config.sources.iter().copied().enumerate() {
            let source_address = address(&channel, "source", node, config.num_nodes)?;
            let port = config
                .port_of(index)
                .ok_or_else(|| invalid("sources", "too many sources for the ephemeral port range"))?;
            let local = Endpoint::new(source_address, port);

            let source = TrafficSource::new(local, sink, config.traffic())?;
            let start = config
                .start_of(index)
                .ok_or_else(|| invalid("start", "the last source starts beyond the clock"))?;
            source.start(&mut sim, start)?;
            debug!(%node, %local, %sink, ?start, "source armed");

            watch_list.insert(FlowKey {
                source: source_address,
                destination: sink_address,
            });
            sources.push(source);
        }

        reporter.start(&mut sim);
        sim.stop_at(SimTime::ZERO + config.duration);

        Ok(Self {
            config,
            sim,
            channel,
            reporter,
            sources,
            watch_list,
            received,
        })
    }

    /// Build and run in one go.
    pub fn run(config: ScenarioConfig) -> Result<Outcome, ScenarioError> {
        Self::new(config)?.execute()
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn sources(&self) -> &[TrafficSource] {
        &self.sources
    }

    pub fn execute(mut self) -> Result<Outcome, ScenarioError> {
        info!(
            nodes = self.config.num_nodes,
            sources = self.sources.len(),
            duration = ?self.config.duration,
            "starting run"
        );
        self.sim.run(&mut self.channel)?;

        self.reporter
            .flush(&self.sim)
            .map_err(ScenarioError::Report)?;
        let drops = self.reporter.records().map_err(ScenarioError::Report)?;
        let flows = self.channel.flow_monitor().summarize(&self.watch_list);

        if let Some(path) = &self.config.flow_monitor_file {
            self.channel
                .flow_monitor()
                .serialize_to_file(path)
                .map_err(ScenarioError::Report)?;
            info!(path = %path.display(), "flow monitor written");
        }

        Ok(Outcome {
            drops,
            flows,
            received: self.received.get(),
            ended_at: self.sim.now(),
            events: self.sim.executed(),
        })
    }
}

fn address(
    channel: &Channel,
    role: &'static str,
    node: NodeId,
    num_nodes: usize,
) -> Result<Ipv4Addr, ScenarioError> {
    channel.address(node).ok_or(ScenarioError::UnknownNode {
        role,
        node,
        num_nodes,
    })
}

impl fmt::Display for Outcome {
    /// One line per drop record, then one block per watched flow.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.drops {
            writeln!(f, "{record}")?;
        }
        for flow in &self.flows {
            writeln!(f)?;
            writeln!(f, "{flow}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("config", &self.config)
            .field("sim", &self.sim)
            .field("sources", &self.sources)
            .field("watch_list", &self.watch_list)
            .finish_non_exhaustive()
    }
}
