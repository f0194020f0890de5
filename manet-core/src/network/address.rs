use crate::node::NodeId;
use anyhow::{Context as _, Result, anyhow, ensure};
use std::{fmt, net::Ipv4Addr, str::FromStr};

/// IPv4 network from which node addresses are allocated.
///
/// Node `i` gets the `i + 1`-th host address of the network, the network
/// address itself is never handed out.
///
/// ```
/// # use manet_core::{network::AddressPlan, node::NodeId};
/// # use std::net::Ipv4Addr;
/// let plan: AddressPlan = "10.1.1.0/24".parse().unwrap();
/// assert_eq!(plan.address(NodeId::new(0)).unwrap(), Ipv4Addr::new(10, 1, 1, 1));
/// assert_eq!(plan.address(NodeId::new(24)).unwrap(), Ipv4Addr::new(10, 1, 1, 25));
/// assert_eq!(plan.node(Ipv4Addr::new(10, 1, 1, 25)), Some(NodeId::new(24)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPlan {
    network: u32,
    prefix: u8,
}

impl AddressPlan {
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self> {
        ensure!(prefix <= 30, "Prefix /{prefix} leaves no room for hosts");
        let mask = Self::mask(prefix);
        let network = u32::from(network);
        ensure!(
            network & !mask == 0,
            "{} is not a /{prefix} network address",
            Ipv4Addr::from(network)
        );
        Ok(Self { network, prefix })
    }

    fn mask(prefix: u8) -> u32 {
        u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
    }

    /// Number of host addresses (network and broadcast excluded).
    pub fn capacity(&self) -> u64 {
        (1u64 << (32 - u32::from(self.prefix))) - 2
    }

    pub fn address(&self, node: NodeId) -> Result<Ipv4Addr> {
        let host = node.index() as u64 + 1;
        ensure!(
            host <= self.capacity(),
            "Node {node} does not fit in {plan} ({hosts} hosts)",
            plan = self,
            hosts = self.capacity()
        );
        Ok(Ipv4Addr::from(self.network + host as u32))
    }

    /// Reverse lookup of [`AddressPlan::address`].
    pub fn node(&self, address: Ipv4Addr) -> Option<NodeId> {
        let host = u32::from(address).checked_sub(self.network)?;
        if host == 0 || u64::from(host) > self.capacity() {
            return None;
        }
        Some(NodeId::new(host - 1))
    }
}

impl Default for AddressPlan {
    fn default() -> Self {
        Self {
            network: u32::from(Ipv4Addr::new(10, 1, 1, 0)),
            prefix: 24,
        }
    }
}

impl fmt::Display for AddressPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.network), self.prefix)
    }
}

impl FromStr for AddressPlan {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (network, prefix) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("Expecting `<network>/<prefix>', got `{s}'"))?;
        let network: Ipv4Addr = network
            .parse()
            .with_context(|| format!("Invalid network address `{network}'"))?;
        let prefix: u8 = prefix
            .parse()
            .with_context(|| format!("Invalid prefix length `{prefix}'"))?;
        Self::new(network, prefix)
    }
}
