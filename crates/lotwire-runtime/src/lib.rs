//! LotWire Runtime Engine
//!
//! This crate contains the engine behind LotWire's realtime notifications:
//! - `ConnectionManager`: subscription channels and backoff-driven recovery
//! - `BatchQueue`: per-(recipient, category) coalescing with a shared window
//! - `DeliveryPolicyDispatcher`: preference and quiet-hours policy
//! - `NotificationSession`: the per-session object wiring them together
//!
//! `lotwire-core` provides the stable type and trait definitions; this is
//! the orchestration layer an application embeds.

pub mod managers;
mod session;

pub use managers::{
    BatchQueue, ConnectionManager, DeliveryPolicyDispatcher, DispatchOutcome, SuppressReason,
};
pub use session::{NotificationSession, SessionBuilder};

// Re-export core types for convenience
pub use lotwire_core::{
    AppEvent, AppEventReceiver, Category, ChangeStreamTransport, ChannelName, ConnectionStatus,
    Deliverable, DeliverableKind, EventCallback, EventKind, LotwireConfig, LotwireError,
    LotwireResult, NotificationPreferences, NotificationRecord, NotificationSink,
    NotificationStore, PreferencesStore, Priority, RawEvent, ResourceFilter, StatusReceiver,
    TimeSource, Timestamp, TransportSignal, UserId,
};
