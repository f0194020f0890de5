use anyhow::{Context as _, Result};
use clap::Parser;
use manet::{DataRate, LossModel, NodeId, Scenario, ScenarioConfig};
use manet_core::{defaults::DEFAULT_RADIO_RANGE, time::Duration};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "manet",
    about = "UDP traffic over a grid of ad-hoc wireless nodes, with drop and flow reports"
)]
struct Args {
    /// PHY data rate, `DsssRate1Mbps` or `1mbps` style
    #[arg(long, default_value = "DsssRate1Mbps")]
    phy_mode: DataRate,
    /// distance between grid neighbours, in metres
    #[arg(long, default_value_t = 500.0)]
    distance: f64,
    /// radio range, in metres
    #[arg(long, default_value_t = DEFAULT_RADIO_RANGE)]
    range: f64,
    /// payload bytes per packet
    #[arg(long, default_value_t = 1_000)]
    packet_size: u64,
    /// packets sent by every source
    #[arg(long, default_value_t = 1)]
    num_packets: u64,
    /// time between two packets of a source
    #[arg(long, default_value = "1s")]
    interval: Duration,
    #[arg(long, default_value_t = 25)]
    num_nodes: usize,
    /// nodes on a row of the grid
    #[arg(long, default_value_t = 5)]
    grid_width: usize,
    #[arg(long, default_value = "0")]
    sink_node: NodeId,
    /// repeat the option for more sources
    #[arg(long = "source-node", default_value = "24")]
    source_nodes: Vec<NodeId>,
    /// activation time of the first source
    #[arg(long, default_value = "31s")]
    start: Duration,
    /// delay between the activation of two sources
    #[arg(long, default_value = "500ms")]
    stagger: Duration,
    /// simulated time of the run
    #[arg(long, default_value = "40s")]
    duration: Duration,
    /// period of the drop report
    #[arg(long, default_value = "5s")]
    report_period: Duration,
    /// reception loss, `none` or a percentage such as `5%`
    #[arg(long, default_value = "none")]
    loss: LossModel,
    /// seed of the loss draws
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// write the per-flow statistics to this JSON file
    #[arg(long)]
    flow_monitor: Option<PathBuf>,
    /// log every packet
    #[arg(long)]
    verbose: bool,
    /// log every frame of the channel and every scheduler step
    #[arg(long)]
    tracing: bool,
}

impl Args {
    fn filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let mut directives = String::from(if self.verbose { "debug" } else { "info" });
        if self.tracing {
            directives.push_str(",manet_core::network=trace,manet_core::scheduler=trace");
        }
        EnvFilter::new(directives)
    }

    fn config(self) -> ScenarioConfig {
        ScenarioConfig {
            phy_mode: self.phy_mode,
            distance: self.distance,
            range: self.range,
            packet_size: self.packet_size,
            num_packets: self.num_packets,
            interval: self.interval.into_duration(),
            num_nodes: self.num_nodes,
            grid_width: self.grid_width,
            sink: self.sink_node,
            sources: self.source_nodes,
            start: self.start.into_duration(),
            stagger: self.stagger.into_duration(),
            duration: self.duration.into_duration(),
            report_period: self.report_period.into_duration(),
            loss: self.loss,
            seed: self.seed,
            flow_monitor_file: self.flow_monitor,
            ..ScenarioConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(args.filter())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let outcome = Scenario::run(args.config()).context("Scenario failed")?;
    print!("{outcome}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn command() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let config = Args::parse_from(["manet"]).config();
        assert_eq!(config, ScenarioConfig::default());
    }

    #[test]
    fn repeated_sources() {
        let args = Args::parse_from([
            "manet",
            "--source-node",
            "24",
            "--source-node",
            "20",
            "--interval",
            "250ms",
            "--phy-mode",
            "DsssRate11Mbps",
        ]);
        let config = args.config();

        assert_eq!(config.sources, [NodeId::new(24), NodeId::new(20)]);
        assert_eq!(config.interval, std::time::Duration::from_millis(250));
        assert_eq!(config.phy_mode, DataRate::from_bps(11_000_000));
    }

    #[test]
    fn malformed_arguments() {
        assert!(Args::try_parse_from(["manet", "--phy-mode", "fast"]).is_err());
        assert!(Args::try_parse_from(["manet", "--loss", "5"]).is_err());
        assert!(Args::try_parse_from(["manet", "--sink-node", "-1"]).is_err());
    }

    #[test]
    fn start_times_beyond_the_clock_are_rejected() {
        let config = Args::parse_from([
            "manet",
            "--start",
            "10000000000000000000.0",
            "--stagger",
            "10000000000000000000.0",
            "--source-node",
            "24",
            "--source-node",
            "20",
        ])
        .config();

        assert!(config.validate().is_err());
    }
}
