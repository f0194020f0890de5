//! Per-flow statistics.
//!
//! The [`FlowMonitor`] counts what every flow sent and received during
//! the run. Once the run is over, [`summarize`] keeps the flows of the
//! [`WatchList`] and computes their throughput.

mod monitor;
mod recorder;

pub use self::{
    monitor::{FlowId, FlowKey, FlowMonitor, FlowStats},
    recorder::{FlowReport, FlowStatus, InsufficientFlowData, WatchList, summarize, throughput_kbps},
};

impl FlowMonitor {
    /// [`summarize`] the flows observed by this monitor.
    pub fn summarize(&self, watch_list: &WatchList) -> Vec<FlowReport> {
        summarize(self.flow_stats(), |id| self.classify(id), watch_list)
    }
}
