//! User Delivery Preferences
//!
//! Per-user delivery settings: which delivery channels are enabled, which
//! categories are muted, and an optional quiet-hours window. The policy
//! decisions themselves (what a muted category or an active window means
//! for a given deliverable) live in the runtime dispatcher; this module
//! only models the data and the window arithmetic.

use crate::types::{Category, TimeOfDay};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ----------------------------------------------------------------------------
// Delivery Channels
// ----------------------------------------------------------------------------

/// A way a notification can reach the user, beyond the in-app list
///
/// The in-app notification center entry is unconditional and therefore
/// not a channel here: mutes and quiet hours suppress popups and sounds,
/// never the list itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    /// Email digest, acted on by outer layers, stored here for parity
    /// with the backend preference shape
    Email,
    /// OS-level popup
    SystemPopup,
    /// Audible alert
    Sound,
}

// ----------------------------------------------------------------------------
// Quiet Hours
// ----------------------------------------------------------------------------

/// A daily do-not-disturb window, possibly spanning midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl QuietHours {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Whether `now` falls inside the window
    ///
    /// A window whose start is later than its end spans midnight
    /// (22:00-08:00 covers 23:00 and 07:00 but not 12:00). Start and end
    /// are both inclusive. A zero-length window matches only its single
    /// minute.
    pub fn contains(&self, now: TimeOfDay) -> bool {
        if self.start <= self.end {
            self.start <= now && now <= self.end
        } else {
            now >= self.start || now <= self.end
        }
    }
}

// ----------------------------------------------------------------------------
// Preferences
// ----------------------------------------------------------------------------

/// One user's notification delivery preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Delivery channels the user has enabled
    pub enabled_channels: HashSet<DeliveryChannel>,
    /// Categories the user never wants popups or sounds for
    pub muted_categories: HashSet<Category>,
    /// Optional daily do-not-disturb window
    pub quiet_hours: Option<QuietHours>,
}

impl Default for NotificationPreferences {
    /// Everything on, nothing muted, no quiet hours
    ///
    /// Also the fallback when the preferences store is unavailable:
    /// failing open means a store outage never silences notifications.
    fn default() -> Self {
        Self {
            enabled_channels: [
                DeliveryChannel::Email,
                DeliveryChannel::SystemPopup,
                DeliveryChannel::Sound,
            ]
            .into_iter()
            .collect(),
            muted_categories: HashSet::new(),
            quiet_hours: None,
        }
    }
}

impl NotificationPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_enabled(&self, channel: DeliveryChannel) -> bool {
        self.enabled_channels.contains(&channel)
    }

    pub fn is_muted(&self, category: &Category) -> bool {
        self.muted_categories.contains(category)
    }

    /// Whether quiet hours are configured and active at `now`
    pub fn in_quiet_hours(&self, now: TimeOfDay) -> bool {
        self.quiet_hours.map(|qh| qh.contains(now)).unwrap_or(false)
    }

    // Builder-style helpers, mostly used by tests and demos

    pub fn without_channel(mut self, channel: DeliveryChannel) -> Self {
        self.enabled_channels.remove(&channel);
        self
    }

    pub fn with_muted(mut self, category: Category) -> Self {
        self.muted_categories.insert(category);
        self
    }

    pub fn with_quiet_hours(mut self, start: TimeOfDay, end: TimeOfDay) -> Self {
        self.quiet_hours = Some(QuietHours::new(start, end));
        self
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tod(h: u8, m: u8) -> TimeOfDay {
        TimeOfDay::from_hm(h, m)
    }

    #[test]
    fn test_same_day_window() {
        let qh = QuietHours::new(tod(9, 0), tod(17, 0));
        assert!(qh.contains(tod(9, 0)));
        assert!(qh.contains(tod(12, 0)));
        assert!(qh.contains(tod(17, 0)));
        assert!(!qh.contains(tod(8, 59)));
        assert!(!qh.contains(tod(17, 1)));
        assert!(!qh.contains(tod(23, 0)));
    }

    #[test]
    fn test_overnight_window() {
        let qh = QuietHours::new(tod(22, 0), tod(8, 0));
        assert!(qh.contains(tod(23, 0)));
        assert!(qh.contains(tod(0, 0)));
        assert!(qh.contains(tod(7, 59)));
        assert!(qh.contains(tod(22, 0)));
        assert!(qh.contains(tod(8, 0)));
        assert!(!qh.contains(tod(12, 0)));
        assert!(!qh.contains(tod(21, 59)));
        assert!(!qh.contains(tod(8, 1)));
    }

    #[test]
    fn test_zero_length_window() {
        let qh = QuietHours::new(tod(3, 30), tod(3, 30));
        assert!(qh.contains(tod(3, 30)));
        assert!(!qh.contains(tod(3, 31)));
        assert!(!qh.contains(tod(3, 29)));
    }

    #[test]
    fn test_default_preferences() {
        let prefs = NotificationPreferences::default();
        assert!(prefs.channel_enabled(DeliveryChannel::Email));
        assert!(prefs.channel_enabled(DeliveryChannel::SystemPopup));
        assert!(prefs.channel_enabled(DeliveryChannel::Sound));
        assert!(!prefs.is_muted(&Category::new("listing")));
        assert!(!prefs.in_quiet_hours(tod(3, 0)));
    }

    #[test]
    fn test_builder_helpers() {
        let prefs = NotificationPreferences::new()
            .without_channel(DeliveryChannel::Sound)
            .with_muted(Category::new("promo"))
            .with_quiet_hours(tod(22, 0), tod(8, 0));

        assert!(!prefs.channel_enabled(DeliveryChannel::Sound));
        assert!(prefs.channel_enabled(DeliveryChannel::SystemPopup));
        assert!(prefs.is_muted(&Category::new("promo")));
        assert!(prefs.in_quiet_hours(tod(23, 0)));
        assert!(!prefs.in_quiet_hours(tod(12, 0)));
    }
}
