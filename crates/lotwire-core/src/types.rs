//! Core identifier and time types for LotWire
//!
//! Identifiers are thin newtypes over strings so the engine never confuses
//! a recipient with a category or a channel name. Time flows through the
//! [`TimeSource`] trait so every component can be driven by a fixed clock
//! in tests.

use serde::{Deserialize, Serialize};
use std::fmt;

// ----------------------------------------------------------------------------
// Identifiers
// ----------------------------------------------------------------------------

/// Identifier of a notification recipient (the marketplace user id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification category (e.g. "listing", "buyer-request", "message")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category(String);

impl Category {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a subscription channel, unique within one session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Priority
// ----------------------------------------------------------------------------

/// Delivery urgency of a raw event
///
/// High-priority events skip the batch window and break through quiet
/// hours; everything else is coalesced and policy-filtered normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

// ----------------------------------------------------------------------------
// Timestamps
// ----------------------------------------------------------------------------

/// Milliseconds since the UNIX epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn saturating_sub(&self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

// ----------------------------------------------------------------------------
// Time of Day
// ----------------------------------------------------------------------------

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Minutes since midnight, used for quiet-hours windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Build from hour/minute, wrapping values out of range
    pub fn from_hm(hour: u8, minute: u8) -> Self {
        Self((hour as u16 * 60 + minute as u16) % MINUTES_PER_DAY)
    }

    /// Parse an "HH:MM" string, as stored in user preferences
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.split_once(':')?;
        let hour: u8 = h.parse().ok()?;
        let minute: u8 = m.parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self::from_hm(hour, minute))
    }

    /// Time of day of a timestamp, in the timestamp's own clock domain
    pub fn from_timestamp(ts: Timestamp) -> Self {
        let minutes_since_epoch = ts.as_millis() / 60_000;
        Self((minutes_since_epoch % MINUTES_PER_DAY as u64) as u16)
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Trait for providing timestamps
///
/// Implementations should provide monotonic timestamps when possible;
/// tests inject a fixed source to pin quiet-hours evaluation.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Standard library implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_parse() {
        assert_eq!(TimeOfDay::parse("22:00"), Some(TimeOfDay::from_hm(22, 0)));
        assert_eq!(TimeOfDay::parse("08:30"), Some(TimeOfDay::from_hm(8, 30)));
        assert_eq!(TimeOfDay::parse("24:00"), None);
        assert_eq!(TimeOfDay::parse("12:60"), None);
        assert_eq!(TimeOfDay::parse("noon"), None);
    }

    #[test]
    fn test_time_of_day_from_timestamp() {
        // 1970-01-01 23:00
        let ts = Timestamp::new(23 * 3600 * 1000);
        assert_eq!(TimeOfDay::from_timestamp(ts), TimeOfDay::from_hm(23, 0));

        // Wraps across days
        let ts = Timestamp::new((24 + 7) * 3600 * 1000 + 15 * 60 * 1000);
        assert_eq!(TimeOfDay::from_timestamp(ts), TimeOfDay::from_hm(7, 15));
    }

    #[test]
    fn test_timestamp_saturating_sub() {
        let a = Timestamp::new(5_000);
        let b = Timestamp::new(2_000);
        assert_eq!(a.saturating_sub(b), 3_000);
        assert_eq!(b.saturating_sub(a), 0);
    }

    #[test]
    fn test_identifier_display() {
        assert_eq!(UserId::new("u1").to_string(), "u1");
        assert_eq!(Category::new("listing").as_str(), "listing");
        assert_eq!(ChannelName::new("orders-u1").to_string(), "orders-u1");
    }
}
