use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock instant in microseconds since the Unix epoch.
///
/// Rendered as fixed-point seconds with six fractional digits, the same
/// text in file names and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimestampError(String);

impl fmt::Display for ParseTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid timestamp '{}'", self.0)
    }
}

impl std::error::Error for ParseTimestampError {}

impl FromStr for Timestamp {
    type Err = ParseTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimestampError(s.to_owned());
        let (secs, frac) = s.split_once('.').ok_or_else(err)?;
        if frac.len() != 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let secs: u64 = secs.parse().map_err(|_| err())?;
        let micros: u64 = frac.parse().map_err(|_| err())?;
        secs.checked_mul(1_000_000)
            .and_then(|s| s.checked_add(micros))
            .map(Self)
            .ok_or_else(err)
    }
}

/// Source of wall-clock time for the timestamp gate
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Timestamp(since_epoch.as_micros() as u64)
    }
}

/// Hand-driven clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            micros: AtomicU64::new(start.0),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.micros.store(at.0, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.micros.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_six_fraction_digits() {
        assert_eq!(Timestamp::from_micros(1_713_087_123_004_512).to_string(), "1713087123.004512");
        assert_eq!(Timestamp::from_micros(7).to_string(), "0.000007");
    }

    #[test]
    fn test_parse_matches_display() {
        let ts = Timestamp::from_micros(1_713_087_123_000_001);
        let parsed: Timestamp = ts.to_string().parse().expect("parse should succeed");
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_parse_rejects_other_precisions() {
        assert!("1713087123.0045".parse::<Timestamp>().is_err());
        assert!("1713087123".parse::<Timestamp>().is_err());
        assert!("abc.000000".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(Timestamp::from_micros(1_000_000));
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Timestamp::from_micros(1_250_000));
    }

    #[test]
    fn test_system_clock_is_after_epoch() {
        assert!(SystemClock.now().as_micros() > 0);
    }
}
