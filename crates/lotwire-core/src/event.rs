//! Event and Deliverable Types
//!
//! The typed payloads flowing through the engine: raw change-stream events
//! in, deliverables out, plus the persistence shape handed to the
//! notification store.

use crate::types::{Category, ChannelName, Priority, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Resource Filter
// ----------------------------------------------------------------------------

/// Which change-stream rows a channel subscribes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    /// Backend table or collection name
    pub table: String,
    /// Which mutation kinds to receive
    pub event_kind: EventKind,
    /// Optional backend-side predicate, forwarded verbatim
    pub predicate: Option<String>,
}

impl ResourceFilter {
    pub fn new<S: Into<String>>(table: S, event_kind: EventKind) -> Self {
        Self {
            table: table.into(),
            event_kind,
            predicate: None,
        }
    }

    pub fn with_predicate<S: Into<String>>(mut self, predicate: S) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

/// Mutation kinds a filter can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Insert,
    Update,
    Delete,
    All,
}

// ----------------------------------------------------------------------------
// Raw Events
// ----------------------------------------------------------------------------

/// A single change-stream event, as handed to channel callbacks
///
/// Ephemeral: produced by the transport, consumed by the batch queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub recipient: UserId,
    pub category: Category,
    pub title: String,
    pub body: String,
    /// Backend row payload, opaque to the engine
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub occurred_at: Timestamp,
}

impl RawEvent {
    pub fn new(
        recipient: UserId,
        category: Category,
        title: impl Into<String>,
        body: impl Into<String>,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            recipient,
            category,
            title: title.into(),
            body: body.into(),
            payload: serde_json::Value::Null,
            priority: Priority::Normal,
            occurred_at,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// A raw event tagged with the channel that produced it
///
/// Transports tag events so the manager can route them to the right
/// registered callback after reconnects and unsubscribes.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub channel: ChannelName,
    pub event: RawEvent,
}

// ----------------------------------------------------------------------------
// Deliverables
// ----------------------------------------------------------------------------

/// Whether a deliverable carries one event or a coalesced batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliverableKind {
    Single,
    Batch,
}

/// The final notification payload handed to the UI/OS sink
///
/// Ownership passes to the sink on construction; the engine keeps nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub kind: DeliverableKind,
    pub title: String,
    pub body: String,
    /// Stable dedup/replace key for the OS notification layer
    pub tag: String,
    pub category: Category,
    pub priority: Priority,
    /// Expansion data; batches retain constituents under "notifications"
    pub data: serde_json::Value,
}

impl Deliverable {
    /// Deliverable for a lone event, carrying the event's own title/body
    pub fn single(event: &RawEvent, tag: impl Into<String>) -> Self {
        Self {
            kind: DeliverableKind::Single,
            title: event.title.clone(),
            body: event.body.clone(),
            tag: tag.into(),
            category: event.category.clone(),
            priority: event.priority,
            data: serde_json::json!({ "payload": event.payload }),
        }
    }

    /// Aggregate deliverable summarizing a burst for one (user, category)
    ///
    /// Constituent events are retained under `data.notifications` so the
    /// UI can expand the summary. Batches are Normal priority: any
    /// high-priority constituent already broke through on the fast path.
    pub fn batch(recipient: &UserId, category: &Category, events: &[RawEvent]) -> Self {
        let notifications: Vec<_> = events
            .iter()
            .map(|e| serde_json::to_value(e).unwrap_or(serde_json::Value::Null))
            .collect();
        Self {
            kind: DeliverableKind::Batch,
            title: format!("{} updates", category),
            body: format!("{} new {} notifications", events.len(), category),
            tag: format!("{}:{}", category, recipient),
            category: category.clone(),
            priority: Priority::Normal,
            data: serde_json::json!({ "notifications": notifications }),
        }
    }

    /// Number of constituent notifications (1 for singles)
    pub fn notification_count(&self) -> usize {
        match self.kind {
            DeliverableKind::Single => 1,
            DeliverableKind::Batch => self
                .data
                .get("notifications")
                .and_then(|n| n.as_array())
                .map(|a| a.len())
                .unwrap_or(0),
        }
    }
}

// ----------------------------------------------------------------------------
// Notification Records
// ----------------------------------------------------------------------------

/// The durable shape handed to the external notification store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient: UserId,
    pub category: Category,
    pub title: String,
    pub body: String,
    pub created_at: Timestamp,
    pub read: bool,
}

impl NotificationRecord {
    /// Build the record persisted for a dispatched deliverable
    pub fn from_deliverable(deliverable: &Deliverable, recipient: &UserId, now: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.clone(),
            category: deliverable.category.clone(),
            title: deliverable.title.clone(),
            body: deliverable.body.clone(),
            created_at: now,
            read: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
