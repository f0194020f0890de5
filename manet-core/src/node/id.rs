use anyhow::anyhow;
use serde::Serialize;
use std::{fmt, str};

/// Index of a node in the grid, starting at `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub const ZERO: Self = NodeId::new(0);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl str::FromStr for NodeId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|error| anyhow!("{error}"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", NodeId(24)), "24")
    }

    #[test]
    fn parse() {
        assert_eq!("24".parse::<NodeId>().unwrap(), NodeId(24));
        assert!("-1".parse::<NodeId>().is_err());
    }

    #[test]
    fn index() {
        assert_eq!(NodeId::new(7).index(), 7);
    }
}
