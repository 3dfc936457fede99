//! Centralized Configuration Management
//!
//! All tunables of the notification engine live here: reconnection
//! backoff, the batch window, and channel buffer sizes, consolidated into
//! a master [`LotwireConfig`] with validation and a testing preset.

use core::time::Duration;

// ----------------------------------------------------------------------------
// Reconnect Configuration
// ----------------------------------------------------------------------------

/// Configuration for connection recovery and exponential backoff
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt
    pub base_delay: Duration,
    /// Cap on the exponential backoff delay
    pub max_delay: Duration,
    /// Attempts before the connection settles into a terminal error
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for a given attempt: `min(base * 2^attempt, max)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = base_ms
            .saturating_mul(factor)
            .min(self.max_delay.as_millis() as u64);
        Duration::from_millis(delay_ms)
    }

    /// Create configuration optimized for testing (fast retries)
    pub fn testing() -> Self {
        Self {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(80),
            max_attempts: 5,
        }
    }
}

// ----------------------------------------------------------------------------
// Batch Configuration
// ----------------------------------------------------------------------------

/// Configuration for the notification batch window
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BatchConfig {
    /// How long arriving events for the same key are coalesced before a
    /// single notification is produced
    pub batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(1000),
        }
    }
}

impl BatchConfig {
    /// Create configuration optimized for testing (short window)
    pub fn testing() -> Self {
        Self {
            batch_delay: Duration::from_millis(40),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the engine's internal channels
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelConfig {
    /// Buffer for raw transport events (bursty)
    pub event_buffer_size: usize,
    /// Buffer for deliverables queued toward the dispatcher
    pub dispatch_buffer_size: usize,
    /// Buffer for app events toward the UI layer
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 128,   // change streams can be bursty
            dispatch_buffer_size: 64, // deliverables drain quickly
            app_event_buffer_size: 64,
        }
    }
}

impl ChannelConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            event_buffer_size: 100,
            dispatch_buffer_size: 100,
            app_event_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Master configuration for one notification session
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LotwireConfig {
    /// Connection recovery configuration
    pub reconnect: ReconnectConfig,
    /// Batch window configuration
    pub batch: BatchConfig,
    /// Channel buffer configuration
    pub channels: ChannelConfig,
}

impl LotwireConfig {
    /// Create new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            reconnect: ReconnectConfig::testing(),
            batch: BatchConfig::testing(),
            channels: ChannelConfig::testing(),
        }
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> core::result::Result<(), String> {
        if self.reconnect.max_attempts == 0 {
            return Err("Max reconnect attempts cannot be zero".into());
        }
        if self.reconnect.base_delay > self.reconnect.max_delay {
            return Err("Base reconnect delay cannot exceed max delay".into());
        }
        if self.reconnect.base_delay.is_zero() {
            return Err("Base reconnect delay cannot be zero".into());
        }
        if self.batch.batch_delay.is_zero() {
            return Err("Batch delay cannot be zero".into());
        }
        if self.channels.event_buffer_size == 0 {
            return Err("Event buffer size cannot be zero".into());
        }
        if self.channels.dispatch_buffer_size == 0 {
            return Err("Dispatch buffer size cannot be zero".into());
        }
        if self.channels.app_event_buffer_size == 0 {
            return Err("App event buffer size cannot be zero".into());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
