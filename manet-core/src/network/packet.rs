use crate::{defaults::IP_UDP_HEADER_BYTES, time::SimTime, transport::Endpoint};
use anyhow::{Result, bail};
use serde::Serialize;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// a generator for monotonically increasing **unique** [`PacketId`]
#[derive(Debug, Clone, Default)]
pub struct PacketIdGenerator(Arc<AtomicU64>);

/// # [`Datagram`] Identifier
///
/// Unique for the whole run, assigned when the datagram is handed to the
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PacketId(u64);

/// # A UDP datagram in flight
///
/// Only the size of the payload is simulated, not its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    id: PacketId,
    source: Endpoint,
    destination: Endpoint,
    payload_size: u64,
    sent_at: SimTime,
}

pub struct DatagramBuilder<'a> {
    generator: &'a PacketIdGenerator,
    source: Option<Endpoint>,
    destination: Option<Endpoint>,
    payload_size: u64,
    sent_at: SimTime,
}

impl PacketIdGenerator {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }

    /// generate a new unique identifier
    pub fn generate(&self) -> PacketId {
        let id = self.0.fetch_add(1, Ordering::SeqCst);

        debug_assert!(
            id != 0,
            "The generator wrapped around after `u64::MAX` identifiers"
        );

        PacketId(id)
    }
}

impl<'a> DatagramBuilder<'a> {
    pub fn new(generator: &'a PacketIdGenerator) -> Self {
        Self {
            generator,
            source: None,
            destination: None,
            payload_size: 0,
            sent_at: SimTime::ZERO,
        }
    }

    pub fn source(mut self, source: Endpoint) -> Self {
        self.source = Some(source);
        self
    }

    pub fn destination(mut self, destination: Endpoint) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn payload_size(mut self, payload_size: u64) -> Self {
        self.payload_size = payload_size;
        self
    }

    pub fn sent_at(mut self, sent_at: SimTime) -> Self {
        self.sent_at = sent_at;
        self
    }

    pub fn build(self) -> Result<Datagram> {
        let Some(source) = self.source else {
            bail!("Missing sender information (`source')")
        };
        let Some(destination) = self.destination else {
            bail!("Missing recipient information (`destination')")
        };

        Ok(Datagram {
            id: self.generator.generate(),
            source,
            destination,
            payload_size: self.payload_size,
            sent_at: self.sent_at,
        })
    }
}

impl Datagram {
    pub fn builder(generator: &PacketIdGenerator) -> DatagramBuilder<'_> {
        DatagramBuilder::new(generator)
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn source(&self) -> Endpoint {
        self.source
    }

    pub fn destination(&self) -> Endpoint {
        self.destination
    }

    pub fn payload_size(&self) -> u64 {
        self.payload_size
    }

    /// Size of the IP packet: payload plus IPv4 and UDP headers.
    pub fn ip_size(&self) -> u64 {
        self.payload_size + IP_UDP_HEADER_BYTES
    }

    pub fn sent_at(&self) -> SimTime {
        self.sent_at
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(s: &str) -> Endpoint {
        s.parse().unwrap()
    }

    #[test]
    fn packet_id_display() {
        let generator = PacketIdGenerator::new();
        let id = generator.generate();

        assert_eq!(id, PacketId(1));
        assert_eq!(id.to_string(), "0x0000000000000001");
        assert_eq!(generator.generate(), PacketId(2));
    }

    #[test]
    fn generator_clones_share_the_sequence() {
        let generator = PacketIdGenerator::new();
        let clone = generator.clone();

        assert_eq!(generator.generate(), PacketId(1));
        assert_eq!(clone.generate(), PacketId(2));
    }

    #[test]
    fn builder_missing_source() {
        let Err(error) = Datagram::builder(&PacketIdGenerator::new()).build() else {
            panic!("Expecting an error because missing the `source'")
        };

        assert_eq!(error.to_string(), "Missing sender information (`source')");
    }

    #[test]
    fn builder_missing_destination() {
        let Err(error) = Datagram::builder(&PacketIdGenerator::new())
            .source(endpoint("10.1.1.25:49153"))
            .build()
        else {
            panic!("Expecting an error because missing the `destination'")
        };

        assert_eq!(
            error.to_string(),
            "Missing recipient information (`destination')"
        );
    }

    #[test]
    fn ip_size_counts_headers() {
        let datagram = Datagram::builder(&PacketIdGenerator::new())
            .source(endpoint("10.1.1.25:49153"))
            .destination(endpoint("10.1.1.1:80"))
            .payload_size(1_000)
            .sent_at(SimTime::from_secs(31))
            .build()
            .unwrap();

        assert_eq!(datagram.payload_size(), 1_000);
        assert_eq!(datagram.ip_size(), 1_028);
        assert_eq!(datagram.sent_at(), SimTime::from_secs(31));
    }
}
