//! Collaborator Traits
//!
//! The engine's seams to the outside world: the change-stream transport,
//! the durable notification store, the preferences store, and the UI/OS
//! delivery sink. Production wires real backends behind these; tests wire
//! in-memory fakes.

use async_trait::async_trait;

use crate::channel::RawEventSender;
use crate::errors::{SinkError, StoreError, TransportError};
use crate::event::{Deliverable, NotificationRecord, ResourceFilter};
use crate::preferences::NotificationPreferences;
use crate::types::{ChannelName, UserId};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Change-Stream Transport
// ----------------------------------------------------------------------------

/// Signals a transport emits about the health of the underlying connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// All open channels acknowledged by the backend
    Up,
    /// The connection failed or dropped
    Down { reason: String },
}

/// Unified interface to the realtime change-stream backend
///
/// One transport carries all of a session's channels. Events for an open
/// channel are tagged with the channel name and pushed into the sender
/// supplied to [`open_channel`](ChangeStreamTransport::open_channel);
/// connection health flows through the watch channel from
/// [`signals`](ChangeStreamTransport::signals).
#[async_trait]
pub trait ChangeStreamTransport: Send + Sync {
    /// Open a named channel for the given resource filter
    ///
    /// Returns once the backend has acknowledged the subscription.
    async fn open_channel(
        &self,
        name: &ChannelName,
        filter: &ResourceFilter,
        events: RawEventSender,
    ) -> Result<(), TransportError>;

    /// Close a previously opened channel
    ///
    /// Closing an unknown channel is a no-op.
    async fn close_channel(&self, name: &ChannelName) -> Result<(), TransportError>;

    /// Watch stream of connection health signals
    fn signals(&self) -> tokio::sync::watch::Receiver<TransportSignal>;
}

// ----------------------------------------------------------------------------
// Notification Store
// ----------------------------------------------------------------------------

/// Durable store for in-app notification records
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new notification record
    async fn create(&self, record: NotificationRecord) -> Result<(), StoreError>;

    /// Mark a stored notification as read
    async fn mark_read(&self, id: Uuid) -> Result<(), StoreError>;

    /// Count of unread notifications for a user
    async fn unread_count(&self, recipient: &UserId) -> Result<u64, StoreError>;
}

// ----------------------------------------------------------------------------
// Preferences Store
// ----------------------------------------------------------------------------

/// Source of per-user delivery preferences
///
/// The dispatcher treats any error from `get` as "fall back to defaults";
/// implementations should still report real failures so they get logged.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn get(&self, user: &UserId) -> Result<NotificationPreferences, StoreError>;

    async fn update(
        &self,
        user: &UserId,
        preferences: NotificationPreferences,
    ) -> Result<(), StoreError>;
}

// ----------------------------------------------------------------------------
// Notification Sink
// ----------------------------------------------------------------------------

/// Outward delivery surface: OS popups and sounds
///
/// Sink failures are per-deliverable and swallowed after logging; a denied
/// popup permission never aborts dispatch.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Show an OS-level notification popup
    async fn show(&self, deliverable: &Deliverable) -> Result<(), SinkError>;

    /// Play the alert sound associated with a category
    async fn play_sound(&self, key: &str) -> Result<(), SinkError>;
}
