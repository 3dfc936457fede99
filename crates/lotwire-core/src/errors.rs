//! Error types for the LotWire notification engine
//!
//! Per-concern error enums (transport, store, sink, state machine) are
//! unified into [`LotwireError`]. Only `DuplicateChannel` and misuse after
//! `cleanup()` surface synchronously to callers; transport and preference
//! failures are handled inside the engine per the recovery policy.

use crate::types::ChannelName;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Transport-level failures on the change-stream connection
///
/// All variants are recoverable: they drive the reconnect state machine
/// rather than propagating to `subscribe`/`enqueue` callers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open channel {channel}: {reason}")]
    OpenFailed { channel: String, reason: String },
    #[error("Connection dropped: {reason}")]
    Dropped { reason: String },
    #[error("Transport timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("Transport shut down: {reason}")]
    Shutdown { reason: String },
}

/// Failures of the external notification record store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("Notification record not found: {id}")]
    NotFound { id: String },
    #[error("Store write failed: {reason}")]
    WriteFailed { reason: String },
}

/// Failures of the UI/OS notification sink
///
/// Swallowed per deliverable: one denied popup never aborts a batch.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("System notification permission denied")]
    PermissionDenied,
    #[error("Failed to show notification: {reason}")]
    ShowFailed { reason: String },
    #[error("Failed to play sound {key}: {reason}")]
    SoundFailed { key: String, reason: String },
}

/// Errors from the connection state machine
#[derive(Debug, Clone, thiserror::Error)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state} on event {event}: {reason}")]
    InvalidTransition {
        from_state: String,
        event: String,
        reason: String,
    },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the LotWire engine
#[derive(Debug, thiserror::Error)]
pub enum LotwireError {
    /// A channel with this name is already registered (programmer error,
    /// reported synchronously, never retried)
    #[error("Channel {name} is already subscribed")]
    DuplicateChannel { name: ChannelName },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Reconnection gave up after exhausting the attempt budget; the
    /// session must be reconstructed to retry deliberately
    #[error("Reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// Preferences could not be loaded; the dispatcher falls back to
    /// defaults instead of surfacing this from `dispatch`
    #[error("Preferences unavailable: {reason}")]
    PreferencesUnavailable { reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Delivery sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateTransitionError),

    /// Internal channel plumbing failure
    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Operation attempted after `cleanup()`
    #[error("Session is closed")]
    SessionClosed,
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl LotwireError {
    /// Create a duplicate-channel error
    pub fn duplicate_channel(name: ChannelName) -> Self {
        LotwireError::DuplicateChannel { name }
    }

    /// Create an internal channel plumbing error
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        LotwireError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        LotwireError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a transport open-failed error
    pub fn open_failed<C: Into<String>, R: Into<String>>(channel: C, reason: R) -> Self {
        LotwireError::Transport(TransportError::OpenFailed {
            channel: channel.into(),
            reason: reason.into(),
        })
    }

    /// Create a preferences-unavailable error
    pub fn preferences_unavailable<T: Into<String>>(reason: T) -> Self {
        LotwireError::PreferencesUnavailable {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, LotwireError>;
pub type LotwireResult<T> = Result<T>;
