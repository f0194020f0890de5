use crate::ScenarioError;
use manet_core::{
    defaults::{
        DEFAULT_DATA_RATE, DEFAULT_GRID_SPACING, DEFAULT_GRID_WIDTH, DEFAULT_LOSS_MODEL,
        DEFAULT_MAC_QUEUE_LIMIT, DEFAULT_RADIO_RANGE, DEFAULT_REPORT_PERIOD,
    },
    network::{ChannelConfig, DataRate, GridLayout, LossModel},
    node::NodeId,
    traffic::{ConfigError, TrafficConfig},
};
use std::{path::PathBuf, time::Duration};

/// First ephemeral UDP port, the sources bind from there.
const FIRST_SOURCE_PORT: u16 = 49_153;

/// Everything that describes a run of the grid scenario.
///
/// The defaults send a single 1000 bytes datagram from the far corner of
/// a 5×5 grid (node 24) to the sink (node 0), 31 seconds into a 40
/// seconds run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub phy_mode: DataRate,
    /// spacing between grid neighbours, in metres
    pub distance: f64,
    /// radio range, in metres
    pub range: f64,
    pub packet_size: u64,
    pub num_packets: u64,
    pub interval: Duration,
    pub num_nodes: usize,
    pub grid_width: usize,
    pub sink: NodeId,
    pub sources: Vec<NodeId>,
    /// activation time of the first source
    pub start: Duration,
    /// delay between the activation of two consecutive sources
    pub stagger: Duration,
    pub duration: Duration,
    pub report_period: Duration,
    pub mac_queue_limit: usize,
    pub loss: LossModel,
    pub seed: u64,
    /// where to write the per-flow statistics, as JSON
    pub flow_monitor_file: Option<PathBuf>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            phy_mode: DEFAULT_DATA_RATE,
            distance: DEFAULT_GRID_SPACING,
            range: DEFAULT_RADIO_RANGE,
            packet_size: 1_000,
            num_packets: 1,
            interval: Duration::from_secs(1),
            num_nodes: 25,
            grid_width: DEFAULT_GRID_WIDTH,
            sink: NodeId::ZERO,
            sources: vec![NodeId::new(24)],
            start: Duration::from_secs(31),
            stagger: Duration::from_millis(500),
            duration: Duration::from_secs(40),
            report_period: DEFAULT_REPORT_PERIOD,
            mac_queue_limit: DEFAULT_MAC_QUEUE_LIMIT,
            loss: DEFAULT_LOSS_MODEL,
            seed: 0,
            flow_monitor_file: None,
        }
    }
}

impl ScenarioConfig {
    pub fn traffic(&self) -> TrafficConfig {
        TrafficConfig {
            packet_size: self.packet_size,
            packet_count: self.num_packets,
            interval: self.interval,
        }
    }

    pub fn channel(&self) -> ChannelConfig {
        ChannelConfig {
            grid: GridLayout::new(self.grid_width, self.distance),
            num_nodes: self.num_nodes,
            range: self.range,
            data_rate: self.phy_mode,
            mac_queue_limit: self.mac_queue_limit,
            loss: self.loss,
            seed: self.seed,
            ..ChannelConfig::default()
        }
    }

    /// Activation delay of the `index`-th source, `None` on overflow.
    pub fn start_of(&self, index: usize) -> Option<Duration> {
        let offset = self.stagger.checked_mul(u32::try_from(index).ok()?)?;
        self.start.checked_add(offset)
    }

    /// Local UDP port of the `index`-th source, `None` once the
    /// ephemeral range is exhausted.
    pub fn port_of(&self, index: usize) -> Option<u16> {
        FIRST_SOURCE_PORT.checked_add(u16::try_from(index).ok()?)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.traffic().validate()?;

        if self.num_nodes == 0 {
            return Err(invalid("num_nodes", "must be greater than zero"));
        }
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(invalid("distance", "must be a positive number of metres"));
        }
        if !(self.range.is_finite() && self.range >= 0.0) {
            return Err(invalid("range", "must be a positive number of metres"));
        }
        if self.report_period.is_zero() {
            return Err(invalid("report_period", "must be greater than zero"));
        }
        if let Some(last) = self.sources.len().checked_sub(1) {
            if self.port_of(last).is_none() {
                return Err(invalid("sources", "too many sources for the ephemeral port range"));
            }
            // the activation delays grow with the index
            if self.stagger.checked_mul(last as u32).is_none() {
                return Err(invalid("stagger", "the last source starts beyond the clock"));
            }
            if self.start_of(last).is_none() {
                return Err(invalid("start", "the last source starts beyond the clock"));
            }
        }

        self.check_node("sink", self.sink)?;
        for source in &self.sources {
            self.check_node("source", *source)?;
        }

        Ok(())
    }

    fn check_node(&self, role: &'static str, node: NodeId) -> Result<(), ScenarioError> {
        if node.index() >= self.num_nodes {
            return Err(ScenarioError::UnknownNode {
                role,
                node,
                num_nodes: self.num_nodes,
            });
        }
        Ok(())
    }
}

pub(crate) fn invalid(parameter: &'static str, reason: &'static str) -> ScenarioError {
    ScenarioError::Config(ConfigError::InvalidConfiguration { parameter, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScenarioConfig::default();
        config.validate().unwrap();

        assert_eq!(config.phy_mode.to_string(), "1mbps");
        assert_eq!(config.channel().grid.position(24).x, 2_000.0);
    }

    #[test]
    fn sources_are_staggered() {
        let config = ScenarioConfig::default();

        assert_eq!(config.start_of(0), Some(Duration::from_secs(31)));
        assert_eq!(config.start_of(1), Some(Duration::from_millis(31_500)));
        assert_eq!(config.start_of(2), Some(Duration::from_secs(32)));
    }

    #[test]
    fn start_beyond_the_clock() {
        let config = ScenarioConfig {
            start: Duration::from_secs(10_000_000_000_000_000_000),
            stagger: Duration::from_secs(10_000_000_000_000_000_000),
            sources: vec![NodeId::new(24), NodeId::new(20)],
            ..ScenarioConfig::default()
        };
        assert_eq!(config.start_of(1), None);
        assert!(matches!(
            config.validate(),
            Err(ScenarioError::Config(ConfigError::InvalidConfiguration {
                parameter: "start",
                ..
            }))
        ));

        let config = ScenarioConfig {
            stagger: Duration::MAX,
            sources: vec![NodeId::new(24), NodeId::new(20), NodeId::new(12)],
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScenarioError::Config(ConfigError::InvalidConfiguration {
                parameter: "stagger",
                ..
            }))
        ));
    }

    #[test]
    fn source_ports() {
        let config = ScenarioConfig::default();
        assert_eq!(config.port_of(0), Some(49_153));
        assert_eq!(config.port_of(16_382), Some(u16::MAX));
        assert_eq!(config.port_of(16_383), None);

        let config = ScenarioConfig {
            sources: vec![NodeId::new(24); 16_384],
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScenarioError::Config(ConfigError::InvalidConfiguration {
                parameter: "sources",
                ..
            }))
        ));

        let config = ScenarioConfig {
            sources: vec![NodeId::new(24); 16_383],
            stagger: Duration::ZERO,
            ..ScenarioConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn invalid_traffic() {
        let config = ScenarioConfig {
            packet_size: 0,
            ..ScenarioConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ScenarioError::Config(ConfigError::InvalidConfiguration {
                parameter: "packet_size",
                ..
            }))
        ));
    }

    #[test]
    fn zero_interval() {
        let config = ScenarioConfig {
            interval: Duration::ZERO,
            ..ScenarioConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nodes_out_of_the_grid() {
        let config = ScenarioConfig {
            sources: vec![NodeId::new(25)],
            ..ScenarioConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert_eq!(error.to_string(), "source node 25 is not in the grid (25 nodes)");

        let config = ScenarioConfig {
            sink: NodeId::new(30),
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScenarioError::UnknownNode { role: "sink", .. })
        ));
    }

    #[test]
    fn invalid_distance() {
        let config = ScenarioConfig {
            distance: -1.0,
            ..ScenarioConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
