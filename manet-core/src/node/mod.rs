mod id;

pub use self::id::NodeId;
use crate::{network::Position, time::SimTime};
use std::net::Ipv4Addr;

/// A radio node of the grid.
///
/// Only tracks what the channel needs to serialise transmissions: when
/// the transmitter is free again and how many frames wait for it.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    position: Position,
    address: Ipv4Addr,

    /// time at which the last queued frame finishes transmitting
    busy_until: SimTime,

    /// frames accepted by the link layer but not yet on the air
    queued: usize,
}

impl Node {
    pub(crate) fn new(id: NodeId, position: Position, address: Ipv4Addr) -> Self {
        Self {
            id,
            position,
            address,
            busy_until: SimTime::ZERO,
            queued: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    #[inline]
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Number of frames waiting for the transmitter.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Reserve the transmitter for `airtime`, starting no earlier than `now`.
    ///
    /// Returns the time the frame is completely on the air.
    pub(crate) fn enqueue(&mut self, now: SimTime, airtime: std::time::Duration) -> SimTime {
        let start = std::cmp::max(now, self.busy_until);
        self.busy_until = start + airtime;
        self.queued += 1;
        self.busy_until
    }

    /// A frame left the transmitter.
    pub(crate) fn dequeue(&mut self) {
        self.queued = self.queued.saturating_sub(1);
    }
}
