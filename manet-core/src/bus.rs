//! Trace bus: named drop notifications from the lower layers.
//!
//! The channel publishes a [`DropEvent`] every time it discards a packet.
//! Any number of zero-argument handlers can subscribe to each event; they
//! are invoked synchronously, in subscription order, on the scheduler
//! thread.

use anyhow::bail;
use serde::Serialize;
use std::{collections::HashMap, fmt, str::FromStr};

/// The three places a packet can be discarded before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DropEvent {
    /// dropped by the link layer before transmission (queue overflow)
    MacTxDrop,
    /// dropped by the physical layer while transmitting
    PhyTxDrop,
    /// dropped by the physical layer while receiving
    PhyRxDrop,
}

type Handler = Box<dyn FnMut()>;

#[derive(Default)]
pub struct TraceBus {
    subscribers: HashMap<DropEvent, Vec<Handler>>,

    /// number of notifications published so far
    published: u64,
}

impl DropEvent {
    pub const ALL: [Self; 3] = [Self::MacTxDrop, Self::PhyTxDrop, Self::PhyRxDrop];

    pub const fn name(self) -> &'static str {
        match self {
            Self::MacTxDrop => "MacTxDrop",
            Self::PhyTxDrop => "PhyTxDrop",
            Self::PhyRxDrop => "PhyRxDrop",
        }
    }
}

impl TraceBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, event: DropEvent, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.subscribers
            .entry(event)
            .or_default()
            .push(Box::new(handler));
    }

    /// Deliver `event` to every subscriber.
    pub fn notify(&mut self, event: DropEvent) {
        self.published += 1;
        if let Some(handlers) = self.subscribers.get_mut(&event) {
            for handler in handlers.iter_mut() {
                handler();
            }
        }
    }

    pub fn subscribers(&self, event: DropEvent) -> usize {
        self.subscribers.get(&event).map_or(0, Vec::len)
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl fmt::Debug for TraceBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for event in DropEvent::ALL {
            map.entry(&event, &self.subscribers(event));
        }
        map.finish()
    }
}

impl fmt::Display for DropEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DropEvent {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(event) = Self::ALL.into_iter().find(|event| event.name() == s) else {
            bail!("Unknown drop event `{s}', expecting MacTxDrop, PhyTxDrop or PhyRxDrop")
        };
        Ok(event)
    }
}
