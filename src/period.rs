//! Human-friendly durations for throttling policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// A span of time expressed as days, hours, minutes and seconds.
///
/// Policies only ever use the normalized total (`as_seconds`). Two periods
/// compare equal when they cover the same number of seconds, so
/// `Period { minutes: 1, seconds: 30, .. }` equals `Period { seconds: 90, .. }`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Period {
    #[serde(default)]
    pub days: u64,
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
}

impl Period {
    /// Decompose a number of seconds, carrying into larger units.
    pub fn from_seconds(total: u64) -> Self {
        Self {
            days: total / DAY,
            hours: (total % DAY) / HOUR,
            minutes: (total % HOUR) / MINUTE,
            seconds: total % MINUTE,
        }
    }

    pub fn as_seconds(&self) -> u64 {
        self.days
            .saturating_mul(DAY)
            .saturating_add(self.hours.saturating_mul(HOUR))
            .saturating_add(self.minutes.saturating_mul(MINUTE))
            .saturating_add(self.seconds)
    }

    /// The same span with every unit within its natural range.
    pub fn normalized(&self) -> Self {
        Self::from_seconds(self.as_seconds())
    }
}

impl PartialEq for Period {
    fn eq(&self, other: &Self) -> bool {
        self.as_seconds() == other.as_seconds()
    }
}

impl Eq for Period {}

impl Hash for Period {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_seconds().hash(state);
    }
}

impl From<u64> for Period {
    fn from(seconds: u64) -> Self {
        Self::from_seconds(seconds)
    }
}

impl From<Duration> for Period {
    fn from(duration: Duration) -> Self {
        Self::from_seconds(duration.as_secs())
    }
}

impl From<Period> for Duration {
    fn from(period: Period) -> Self {
        Duration::from_secs(period.as_seconds())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.normalized();
        let mut parts = Vec::with_capacity(4);
        for (value, unit) in [(p.days, "d"), (p.hours, "h"), (p.minutes, "m"), (p.seconds, "s")] {
            if value > 0 {
                parts.push(format!("{}{}", value, unit));
            }
        }
        if parts.is_empty() {
            return write!(f, "0s");
        }
        write!(f, "{}", parts.join(" "))
    }
}
