use crate::network::{DataRate, LossModel};
use std::time::Duration;

/// Default period of the [`DropReporter`].
///
/// [`DropReporter`]: crate::drops::DropReporter
pub const DEFAULT_REPORT_PERIOD: Duration = Duration::from_secs(5);

/// Default PHY data rate: 802.11b DSSS at 1 Mbps.
///
/// ```
/// # use manet_core::defaults::*;
/// assert_eq!(DEFAULT_DATA_RATE.to_string(), "1mbps");
/// ```
pub const DEFAULT_DATA_RATE: DataRate = DataRate::from_bps(1_000_000);

/// Default spacing between two neighbours of the grid, in metres.
pub const DEFAULT_GRID_SPACING: f64 = 500.0;

/// Default number of nodes on a row of the grid.
pub const DEFAULT_GRID_WIDTH: usize = 5;

/// Default radio range in metres.
///
/// With the default spacing only the direct horizontal and vertical
/// neighbours are reachable, diagonals (≈707m) are not.
pub const DEFAULT_RADIO_RANGE: f64 = 550.0;

/// Speed of the radio signal used for the propagation delay, in m/s.
pub const PROPAGATION_SPEED: f64 = 299_792_458.0;

/// Number of frames a node can hold in its transmit queue before the
/// link layer starts dropping.
pub const DEFAULT_MAC_QUEUE_LIMIT: usize = 500;

/// Largest frame the PHY accepts, in bytes (802.11 MSDU + MAC header).
pub const DEFAULT_MAX_FRAME_BYTES: u64 = 2_346;

/// MAC header and FCS added to every frame, in bytes.
pub const MAC_OVERHEAD_BYTES: u64 = 36;

/// IPv4 + UDP headers, in bytes. Counted by the flow monitor.
pub const IP_UDP_HEADER_BYTES: u64 = 28;

/// Default reception loss: none.
pub const DEFAULT_LOSS_MODEL: LossModel = LossModel::None;

/// UDP port of the sink.
pub const DEFAULT_SINK_PORT: u16 = 80;
