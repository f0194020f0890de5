use rand_core::Rng;
use std::{fmt, str::FromStr};

/// Reception loss applied to every hop.
///
/// This stands in for the propagation loss model of a real radio
/// channel: a frame that reaches the receiver is decoded or not, with the
/// given probability.
///
/// ```
/// use manet_core::network::LossModel;
///
/// let lossy: LossModel = "5%".parse().unwrap();
/// assert_eq!(lossy, LossModel::rate(0.05).unwrap());
/// assert_eq!(lossy.to_string(), "5%");
///
/// assert_eq!("none".parse::<LossModel>().unwrap(), LossModel::None);
/// assert_eq!("0%".parse::<LossModel>().unwrap(), LossModel::None);
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub enum LossModel {
    /// every frame in range is received
    #[default]
    None,
    /// every frame is lost with the given probability
    Rate(LossRate),
}

/// Probability in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LossRate(f64);

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("loss rate must be in [0.0, 1.0], got {0}")]
pub struct LossRateError(f64);

#[derive(Debug, Clone, thiserror::Error)]
pub enum LossModelError {
    #[error("expected `none' or a percentage such as `5%'")]
    Malformed,
    #[error("{0}")]
    OutOfRange(#[from] LossRateError),
}

impl LossModel {
    pub fn rate(rate: f64) -> Result<Self, LossRateError> {
        LossRate::new(rate).map(Self::Rate)
    }

    /// Draw whether the frame is lost.
    ///
    /// All the randomness comes from `rng`, so that a seeded channel
    /// replays the same losses.
    pub fn is_lost<R: Rng>(&self, rng: &mut R) -> bool {
        match self {
            Self::None => false,
            Self::Rate(LossRate(rate)) => {
                let sample = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
                sample < *rate
            }
        }
    }
}

impl LossRate {
    pub fn new(rate: f64) -> Result<Self, LossRateError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(LossRateError(rate));
        }
        Ok(Self(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for LossModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("0%"),
            Self::Rate(LossRate(rate)) => {
                let pct = rate * 100.0;
                if pct.fract() == 0.0 {
                    write!(f, "{}%", pct as u64)
                } else {
                    write!(f, "{pct:.2}%")
                }
            }
        }
    }
}

impl FromStr for LossModel {
    type Err = LossModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }
        let pct: f64 = s
            .strip_suffix('%')
            .ok_or(LossModelError::Malformed)?
            .trim()
            .parse()
            .map_err(|_| LossModelError::Malformed)?;
        if pct == 0.0 {
            return Ok(Self::None);
        }
        Ok(Self::rate(pct / 100.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaChaRng;
    use rand_core::SeedableRng as _;

    fn rng() -> ChaChaRng {
        ChaChaRng::seed_from_u64(7)
    }

    #[test]
    fn none_never_loses() {
        let mut rng = rng();
        assert!((0..1_000).all(|_| !LossModel::None.is_lost(&mut rng)));
    }

    #[test]
    fn certain_loss() {
        let mut rng = rng();
        let model = LossModel::rate(1.0).unwrap();
        assert!((0..1_000).all(|_| model.is_lost(&mut rng)));
    }

    #[test]
    fn approximate_rate() {
        let mut rng = rng();
        let model = LossModel::rate(0.25).unwrap();
        let lost = (0..10_000).filter(|_| model.is_lost(&mut rng)).count();
        assert!((2_200..2_800).contains(&lost), "lost {lost} out of 10000");
    }

    #[test]
    fn seeded_draws_replay() {
        let model = LossModel::rate(0.5).unwrap();
        let draw = |mut rng: ChaChaRng| (0..64).map(|_| model.is_lost(&mut rng)).collect::<Vec<_>>();
        assert_eq!(draw(rng()), draw(rng()));
    }

    #[test]
    fn parse() {
        assert_eq!("12.5%".parse::<LossModel>().unwrap().to_string(), "12.50%");
        assert_eq!("100%".parse::<LossModel>().unwrap(), LossModel::rate(1.0).unwrap());
        assert!(matches!("5".parse::<LossModel>(), Err(LossModelError::Malformed)));
        assert!(matches!("x%".parse::<LossModel>(), Err(LossModelError::Malformed)));
        assert!(matches!("150%".parse::<LossModel>(), Err(LossModelError::OutOfRange(_))));
        assert!(LossModel::rate(f64::NAN).is_err());
    }
}
