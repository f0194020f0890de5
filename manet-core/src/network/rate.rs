use anyhow::{bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr, time::Duration};

/// PHY data rate in bits per second.
///
/// Units are decimal, as radio rates are: `1mbps` is `1_000_000` bits
/// per second. The 802.11 mode names are understood too.
///
/// ```
/// # use manet_core::network::DataRate;
/// # use std::time::Duration;
/// let rate: DataRate = "DsssRate1Mbps".parse().unwrap();
/// assert_eq!(rate, DataRate::from_bps(1_000_000));
///
/// // 1000 bytes take 8ms at 1 Mbps
/// assert_eq!(rate.airtime(1_000), Duration::from_millis(8));
///
/// let rate: DataRate = "DsssRate5_5Mbps".parse().unwrap();
/// assert_eq!(rate.to_string(), "5500kbps");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate(u64);

const K: u64 = 1_000;
const M: u64 = 1_000 * K;
const G: u64 = 1_000 * M;

impl DataRate {
    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    #[inline]
    pub const fn bps(self) -> u64 {
        self.0
    }

    /// Time needed to put `bytes` on the air.
    ///
    /// A rate of `0` never completes: returns [`Duration::MAX`].
    pub fn airtime(self, bytes: u64) -> Duration {
        if self.0 == 0 {
            return Duration::MAX;
        }
        let nanos = u128::from(bytes) * 8 * 1_000_000_000 / u128::from(self.0);
        Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64)
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;
        if v >= G && v % G == 0 {
            write!(f, "{}gbps", v / G)
        } else if v >= M && v % M == 0 {
            write!(f, "{}mbps", v / M)
        } else if v >= K && v % K == 0 {
            write!(f, "{}kbps", v / K)
        } else {
            write!(f, "{v}bps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum RateToken {
    #[token("bps")]
    Bps,
    #[token("kbps")]
    Kbps,
    #[token("mbps")]
    Mbps,
    #[token("gbps")]
    Gbps,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}

impl FromStr for DataRate {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = ["dsssrate", "ofdmrate", "erpofdmrate"]
            .iter()
            .find_map(|prefix| normalized.strip_prefix(prefix))
            .map(|mode| mode.replace('_', "."))
            .unwrap_or(normalized);

        let mut lex = Lexer::<'_, RateToken>::new(&normalized);

        let Some(Ok(RateToken::Value)) = lex.next() else {
            bail!("Expecting to parse a number in `{s}'")
        };
        let number: f64 = lex.slice().parse()?;
        let Some(Ok(token)) = lex.next() else {
            bail!("Expecting to parse a unit in `{s}'")
        };
        let unit = match token {
            RateToken::Bps => 1,
            RateToken::Kbps => K,
            RateToken::Mbps => M,
            RateToken::Gbps => G,
            RateToken::Value => bail!("Expecting to parse a unit (bps, kbps, ...)"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a data rate"
        );

        let bps = (number * unit as f64).round();
        ensure!(bps >= 1.0, "Data rate `{s}' must be at least 1bps");
        ensure!(bps < u64::MAX as f64, "Data rate `{s}' is too large");

        Ok(Self(bps as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rate() {
        macro_rules! assert_rate {
            ($string:literal == $value:expr) => {
                assert_eq!(
                    $string.parse::<DataRate>().unwrap(),
                    DataRate::from_bps($value)
                );
            };
        }

        assert_rate!("42bps" == 42);
        assert_rate!("42kbps" == 42_000);
        assert_rate!("1mbps" == 1_000_000);
        assert_rate!("1 Mbps" == 1_000_000);
        assert_rate!("5.5mbps" == 5_500_000);
        assert_rate!("DsssRate11Mbps" == 11_000_000);
        assert_rate!("OfdmRate54Mbps" == 54_000_000);
        assert_rate!("1gbps" == 1_000_000_000);
    }

    #[test]
    fn print_rate() {
        assert_eq!(DataRate::from_bps(1_000_000).to_string(), "1mbps");
        assert_eq!(DataRate::from_bps(11_000_000).to_string(), "11mbps");
        assert_eq!(DataRate::from_bps(2_000_000_000).to_string(), "2gbps");
        assert_eq!(DataRate::from_bps(1_500).to_string(), "1500bps");
        assert_eq!(DataRate::from_bps(0).to_string(), "0bps");
    }

    #[test]
    fn parse_invalid_strings() {
        assert!("42".parse::<DataRate>().is_err());
        assert!("mbps".parse::<DataRate>().is_err());
        assert!("".parse::<DataRate>().is_err());
        assert!("0mbps".parse::<DataRate>().is_err());
        assert!("1mbps extra".parse::<DataRate>().is_err());
    }

    #[test]
    fn airtime() {
        let rate = DataRate::from_bps(1_000_000);
        assert_eq!(rate.airtime(0), Duration::ZERO);
        assert_eq!(rate.airtime(1), Duration::from_micros(8));
        assert_eq!(rate.airtime(1_064), Duration::from_micros(8_512));
        assert_eq!(DataRate::from_bps(0).airtime(1), Duration::MAX);
    }
}
