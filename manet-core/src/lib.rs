/*!
# Ad-hoc grid traffic engine

Discrete-event core of the grid simulation: a virtual clock and its
scheduler ([`Simulator`]), constant bit rate [`TrafficSource`]s, drop
accounting ([`DropCounter`], [`DropReporter`]) and per-flow statistics
([`flow`]).

The radio [`Channel`] is deliberately simple: it routes datagrams hop by
hop over a grid and reports what it discards on the [`TraceBus`].

```
use manet_core::{
    Simulator,
    drops::{DropCounter, DropReporter},
    network::{Channel, ChannelConfig},
    time::SimTime,
    traffic::{TrafficConfig, TrafficSource},
};
use std::time::Duration;

let mut channel = Channel::new(ChannelConfig::default()).unwrap();
let counter = DropCounter::new();
counter.attach(channel.trace_bus_mut());

let mut sim = Simulator::new();
let reporter = DropReporter::with_default_period(counter);
reporter.start(&mut sim);

let source = TrafficSource::new(
    "10.1.1.25:49153".parse().unwrap(),
    "10.1.1.1:80".parse().unwrap(),
    TrafficConfig::default(),
)
.unwrap();
source.start(&mut sim, Duration::from_secs(31)).unwrap();

sim.stop_at(SimTime::from_secs(40));
sim.run(&mut channel).unwrap();
reporter.flush(&sim).unwrap();

assert_eq!(reporter.records().unwrap().len(), 9);
assert_eq!(channel.flow_monitor().len(), 1);
```

[`TrafficSource`]: traffic::TrafficSource
[`DropCounter`]: drops::DropCounter
[`DropReporter`]: drops::DropReporter
[`Channel`]: network::Channel
[`TraceBus`]: bus::TraceBus
*/

pub mod bus;
pub mod defaults;
pub mod drops;
pub mod flow;
pub mod network;
pub mod node;
mod scheduler;
pub mod time;
mod time_queue;
pub mod traffic;
pub mod transport;

pub use self::{
    scheduler::{Action, RunError, Simulator},
    time_queue::{EventId, TimeQueue},
};
