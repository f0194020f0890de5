//! Virtual time.
//!
//! [`SimTime`] is a point on the simulation clock, counted from the start
//! of the run. It only moves when the [`Simulator`] executes an event.
//!
//! [`Duration`] is a human friendly wrapper around [`std::time::Duration`]
//! used for configuration values (`"1s"`, `"500ms"`, `"1.5s"`, `"1m 30s"`).
//!
//! [`Simulator`]: crate::Simulator

use anyhow::{Result, anyhow, bail, ensure};
use logos::{Lexer, Logos};
use serde::Serialize;
use std::{
    fmt,
    ops::{Add, Sub},
    str::FromStr,
    time,
};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point on the virtual clock.
///
/// Stored as nanoseconds since the start of the run.
///
/// ```
/// # use manet_core::time::SimTime;
/// # use std::time::Duration;
/// let start = SimTime::from_secs(31);
/// let next = start + Duration::from_millis(500);
/// assert_eq!(next.as_secs_f64(), 31.5);
/// assert_eq!(next - start, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "f64")]
pub struct SimTime(u64);

impl SimTime {
    /// The start of the run.
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * NANOS_PER_SEC)
    }

    /// Create a time from fractional seconds.
    ///
    /// Negative and non finite values are clamped to [`SimTime::ZERO`].
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        time::Duration::try_from_secs_f64(secs).map_or(Self(u64::MAX), |duration| Self::ZERO + duration)
    }

    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// Elapsed virtual time since the start of the run.
    #[inline]
    pub fn since_start(self) -> time::Duration {
        time::Duration::from_nanos(self.0)
    }

    /// Returns `None` if the result does not fit on the clock.
    pub fn checked_add(self, duration: time::Duration) -> Option<Self> {
        let nanos = u64::try_from(duration.as_nanos()).ok()?;
        self.0.checked_add(nanos).map(Self)
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is later than `self`.
    pub fn saturating_duration_since(self, earlier: Self) -> time::Duration {
        time::Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<time::Duration> for SimTime {
    type Output = Self;

    /// Saturates at the end of the clock.
    fn add(self, rhs: time::Duration) -> Self::Output {
        self.checked_add(rhs).unwrap_or(Self(u64::MAX))
    }
}

impl Sub for SimTime {
    type Output = time::Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_duration_since(rhs)
    }
}

impl From<SimTime> for f64 {
    fn from(value: SimTime) -> Self {
        value.as_secs_f64()
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}s", self.as_secs_f64())
    }
}

/// A configuration duration, parsed from a human readable string.
///
/// A bare number is read as seconds.
///
/// ```
/// # use manet_core::time::Duration;
/// let interval: Duration = "1s 500ms".parse().unwrap();
/// assert_eq!(interval.into_duration().as_millis(), 1_500);
///
/// let interval: Duration = "2.5".parse().unwrap();
/// assert_eq!(interval.into_duration().as_millis(), 2_500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(time::Duration);

impl Duration {
    pub const fn new(dur: time::Duration) -> Self {
        Self(dur)
    }

    #[inline]
    pub fn into_duration(self) -> time::Duration {
        self.0
    }
}

impl From<Duration> for time::Duration {
    fn from(value: Duration) -> Self {
        value.into_duration()
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <time::Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

impl FromStr for Duration {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(secs) = s.trim().parse::<f64>() {
            ensure!(
                secs.is_finite() && secs >= 0.0,
                "Duration must be a positive number of seconds, got {s}"
            );
            return scale(s.trim(), NANOS_PER_SEC).map(Self);
        }

        let mut lex = Lexer::new(s);

        let mut durations = Vec::new();

        while let Some(next) = lex.next() {
            let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

            ensure!(
                number == Token::Value,
                "Expecting duration to starts with number. Cannot parse {s}"
            );
            let value = lex.slice();

            let Some(Ok(measure)) = lex.next() else {
                bail!("Expecting a measure, failed to parse: {s}")
            };
            let nanos_per_unit = match measure {
                Token::NanoSeconds => 1,
                Token::MicroSeconds => 1_000,
                Token::MilliSeconds => 1_000_000,
                Token::Seconds => NANOS_PER_SEC,
                Token::Minutes => 60 * NANOS_PER_SEC,
                Token::Value => bail!("Failed to parse `{s}', expecting a measure."),
            };
            durations.push(scale(value, nanos_per_unit)?);
        }

        ensure!(!durations.is_empty(), "Cannot parse an empty duration");

        Ok(Self(durations.into_iter().sum()))
    }
}

fn scale(value: &str, nanos_per_unit: u64) -> Result<time::Duration> {
    if value.contains('.') {
        let number: f64 = value.parse()?;
        let secs = number * nanos_per_unit as f64 / NANOS_PER_SEC as f64;
        return time::Duration::try_from_secs_f64(secs)
            .map_err(|error| anyhow!("Duration `{value}' is out of range: {error}"));
    }

    let number: u64 = value.parse()?;
    let nanos = number
        .checked_mul(nanos_per_unit)
        .ok_or_else(|| anyhow!("Duration `{value}' is too large"))?;
    Ok(time::Duration::from_nanos(nanos))
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logos_lexer() {
        let mut lex = Token::lexer("1.5ms");

        assert_eq!(lex.next(), Some(Ok(Token::Value)));
        assert_eq!(lex.slice(), "1.5");

        assert_eq!(lex.next(), Some(Ok(Token::MilliSeconds)));
        assert_eq!(lex.span(), 3..5);
    }

    #[test]
    fn parse() {
        let Duration(duration) = "123ms".parse().unwrap();
        assert_eq!(duration.as_millis(), 123);

        let Duration(duration) = "1s 2000ms 3000000us".parse().unwrap();
        assert_eq!(duration.as_secs(), 6);

        let Duration(duration) = "1.5s".parse().unwrap();
        assert_eq!(duration.as_millis(), 1_500);

        let Duration(duration) = "1m".parse().unwrap();
        assert_eq!(duration.as_secs(), 60);
    }

    #[test]
    fn parse_bare_seconds() {
        let Duration(duration) = "1.0".parse().unwrap();
        assert_eq!(duration.as_secs(), 1);

        assert!("-1".parse::<Duration>().is_err());
    }

    #[test]
    fn parse_invalid() {
        assert!("".parse::<Duration>().is_err());
        assert!("ms".parse::<Duration>().is_err());
        assert!("12 ms ms".parse::<Duration>().is_err());
        assert!("12 hours".parse::<Duration>().is_err());
    }

    #[test]
    fn sim_time_arithmetic() {
        let t = SimTime::from_secs(31) + time::Duration::from_millis(500);
        assert_eq!(t, SimTime::from_millis(31_500));
        assert_eq!(t - SimTime::from_secs(31), time::Duration::from_millis(500));
        assert_eq!(SimTime::from_secs(1) - t, time::Duration::ZERO);
    }

    #[test]
    fn sim_time_saturates() {
        let end = SimTime::from_nanos(u64::MAX);
        assert_eq!(end + time::Duration::from_secs(1), end);
        assert!(end.checked_add(time::Duration::from_nanos(1)).is_none());
    }

    #[test]
    fn sim_time_from_secs_f64() {
        assert_eq!(SimTime::from_secs_f64(31.5), SimTime::from_millis(31_500));
        assert_eq!(SimTime::from_secs_f64(-3.0), SimTime::ZERO);
        assert_eq!(SimTime::from_secs_f64(f64::NAN), SimTime::ZERO);
    }

    #[test]
    fn sim_time_display() {
        assert_eq!(SimTime::from_millis(31_500).to_string(), "+31.5s");
        assert_eq!(SimTime::ZERO.to_string(), "+0s");
    }
}
