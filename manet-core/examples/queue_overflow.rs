use anyhow::{Context as _, Result};
use indicatif::ProgressBar;
use manet_core::{
    Simulator,
    drops::DropCounter,
    network::{Channel, ChannelConfig},
    traffic::{TrafficConfig, TrafficSource},
};
use std::time::Duration;

const BURST: u64 = 2_000;

/// this example was used to check how the link layer behaves when a
/// node is asked to send faster than its data rate allows.
///
/// At 1 Mbps a 1000 bytes datagram takes ~8.5ms on the air, sending one
/// every millisecond fills the transmit queue of the source until it
/// overflows: from then on most datagrams show as a `MacTxDrop`.
///
/// Nothing is dropped further down the route: once out of the source,
/// frames are spaced by their airtime and the next hops keep up.
fn main() -> Result<()> {
    let mut channel = Channel::new(ChannelConfig::default())?;
    let counter = DropCounter::new();
    counter.attach(channel.trace_bus_mut());

    let mut sim = Simulator::new();
    let source = TrafficSource::new(
        "10.1.1.25:49153".parse()?,
        "10.1.1.1:80".parse()?,
        TrafficConfig {
            packet_size: 1_000,
            packet_count: BURST,
            interval: Duration::from_millis(1),
        },
    )?;
    source.start(&mut sim, Duration::ZERO)?;

    let pb = ProgressBar::new(BURST);
    while sim.step(&mut channel).context("Simulation failed")? {
        pb.set_position(source.sent());
    }
    pb.finish_with_message("All sent");

    let drops = counter.snapshot();
    let (_, flow) = channel
        .flow_monitor()
        .flow_stats()
        .next()
        .context("Expecting one flow")?;

    println!("ended at {}", sim.now());
    println!("sent {} received {}", flow.tx_packets, flow.rx_packets);
    println!(
        "mac_tx {} phy_tx {} phy_rx {}",
        drops.mac_tx, drops.phy_tx, drops.phy_rx
    );

    Ok(())
}
