/*!
# Ad-hoc grid scenario

UDP traffic over a grid of ad-hoc wireless nodes: every source sends to
the sink through the multi-hop [`Channel`], link layer and PHY drops are
reported every few seconds and the watched flows are summarised at the
end of the run.

```
use manet::{Scenario, ScenarioConfig};

let outcome = Scenario::run(ScenarioConfig::default()).unwrap();

// 8 periodic records (5s to 40s) and the final one
assert_eq!(outcome.drops.len(), 9);
assert_eq!(outcome.received, 1);
assert_eq!(outcome.flows[0].rx_packets, 1);
```
*/

mod config;
mod scenario;

// convenient re-export of `manet_core` objects
pub use manet_core::{
    RunError, Simulator,
    drops::{DropRecord, DropSnapshot},
    flow::{FlowId, FlowKey, FlowReport, FlowStatus},
    network::{Channel, DataRate, LossModel},
    node::NodeId,
    time::SimTime,
};

pub use self::{
    config::ScenarioConfig,
    scenario::{Outcome, Scenario, ScenarioError},
};
