//! Channel Plumbing
//!
//! Typed channel aliases and creation helpers for the engine's internal
//! communication: raw transport events into the manager, deliverables
//! toward the dispatcher, app events toward the UI, and a watch channel
//! carrying the coarse connection status.

use crate::config::ChannelConfig;
use crate::event::{ChannelEvent, Deliverable, RawEvent};
use crate::state::ConnectionStatus;
use crate::types::{ChannelName, UserId};
use std::fmt;

// ----------------------------------------------------------------------------
// App Events
// ----------------------------------------------------------------------------

/// Events surfaced to the embedding application (UI layer)
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A deliverable passed the in-app policy gate; render it in the
    /// notification center
    NotificationArrived { recipient: UserId, deliverable: Deliverable },
    /// The unread counter changed for a user
    UnreadCountChanged { recipient: UserId, count: u64 },
    /// The connection settled into a terminal error; show a passive
    /// disconnected indicator
    ConnectionLost { reason: String },
    /// A raw event was received on a channel with no registered callback
    /// (late delivery after unsubscribe); informational only
    OrphanEvent { channel: ChannelName },
}

// ----------------------------------------------------------------------------
// Channel Type Aliases
// ----------------------------------------------------------------------------

pub type RawEventSender = tokio::sync::mpsc::Sender<ChannelEvent>;
pub type RawEventReceiver = tokio::sync::mpsc::Receiver<ChannelEvent>;
pub type DispatchSender = tokio::sync::mpsc::Sender<(UserId, Deliverable)>;
pub type DispatchReceiver = tokio::sync::mpsc::Receiver<(UserId, Deliverable)>;
pub type AppEventSender = tokio::sync::mpsc::Sender<AppEvent>;
pub type AppEventReceiver = tokio::sync::mpsc::Receiver<AppEvent>;
pub type StatusSender = tokio::sync::watch::Sender<ConnectionStatus>;
pub type StatusReceiver = tokio::sync::watch::Receiver<ConnectionStatus>;

/// Callback invoked for every raw event on a subscribed channel
///
/// Must not block: heavy work belongs on the far side of a channel send.
pub type EventCallback = std::sync::Arc<dyn Fn(RawEvent) + Send + Sync>;

// ----------------------------------------------------------------------------
// Channel Errors
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub enum ChannelError {
    ChannelFull,
    ChannelClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ChannelFull => write!(f, "Channel buffer is full"),
            ChannelError::ChannelClosed => write!(f, "Channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded raw event channel (Transport -> ConnectionManager)
pub fn create_raw_event_channel(config: &ChannelConfig) -> (RawEventSender, RawEventReceiver) {
    tokio::sync::mpsc::channel(config.event_buffer_size)
}

/// Create bounded dispatch channel (BatchQueue -> Dispatcher)
pub fn create_dispatch_channel(config: &ChannelConfig) -> (DispatchSender, DispatchReceiver) {
    tokio::sync::mpsc::channel(config.dispatch_buffer_size)
}

/// Create bounded app event channel (Engine -> UI)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    tokio::sync::mpsc::channel(config.app_event_buffer_size)
}

/// Create the connection status watch channel (Engine -> UI)
///
/// Watch semantics fit status: late subscribers see the latest value and
/// intermediate flaps may be skipped.
pub fn create_status_channel() -> (StatusSender, StatusReceiver) {
    tokio::sync::watch::channel(ConnectionStatus::Connecting)
}

// ----------------------------------------------------------------------------
// Non-blocking Send Utilities
// ----------------------------------------------------------------------------

/// Non-blocking send for callers that must never stall (UI callbacks,
/// transport pumps)
pub trait NonBlockingSend<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl NonBlockingSend<AppEvent> for AppEventSender {
    fn try_send_non_blocking(&self, event: AppEvent) -> Result<(), ChannelError> {
        self.try_send(event).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}

impl NonBlockingSend<ChannelEvent> for RawEventSender {
    fn try_send_non_blocking(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        self.try_send(event).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Priority, Timestamp};

    fn sample_event() -> ChannelEvent {
        ChannelEvent {
            channel: ChannelName::new("listings"),
            event: RawEvent::new(
                UserId::new("u1"),
                Category::new("listing"),
                "t",
                "b",
                Timestamp::new(0),
            )
            .with_priority(Priority::Normal),
        }
    }

    #[tokio::test]
    async fn test_non_blocking_send_reports_full() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ChannelEvent>(1);
        tx.try_send_non_blocking(sample_event()).unwrap();
        match tx.try_send_non_blocking(sample_event()) {
            Err(ChannelError::ChannelFull) => {}
            other => panic!("Expected ChannelFull, got {:?}", other.map(|_| ())),
        }

        rx.recv().await.unwrap();
        tx.try_send_non_blocking(sample_event()).unwrap();
    }

    #[tokio::test]
    async fn test_non_blocking_send_reports_closed() {
        let (tx, rx) = create_app_event_channel(&ChannelConfig::testing());
        drop(rx);
        match tx.try_send_non_blocking(AppEvent::ConnectionLost {
            reason: "gone".into(),
        }) {
            Err(ChannelError::ChannelClosed) => {}
            other => panic!("Expected ChannelClosed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_status_channel_initial_value() {
        let (_tx, rx) = create_status_channel();
        assert_eq!(*rx.borrow(), crate::state::ConnectionStatus::Connecting);
    }
}
