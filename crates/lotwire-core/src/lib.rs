//! LotWire Core
//!
//! Foundational types for the LotWire realtime notification engine:
//! identifiers and time sources, configuration, the connection state
//! machine, user delivery preferences, channel plumbing, and the traits
//! the runtime's collaborators implement. The engine itself (connection
//! management, batching, policy dispatch) lives in `lotwire-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod event;
pub mod preferences;
pub mod state;
pub mod traits;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    create_app_event_channel, create_dispatch_channel, create_raw_event_channel,
    create_status_channel, AppEvent, AppEventReceiver, AppEventSender, ChannelError,
    DispatchReceiver, DispatchSender, EventCallback, NonBlockingSend, RawEventReceiver,
    RawEventSender, StatusReceiver, StatusSender,
};
pub use config::{BatchConfig, ChannelConfig, LotwireConfig, ReconnectConfig};
pub use errors::{
    LotwireError, LotwireResult, Result, SinkError, StateTransitionError, StoreError,
    TransportError,
};
pub use event::{
    ChannelEvent, Deliverable, DeliverableKind, EventKind, NotificationRecord, RawEvent,
    ResourceFilter,
};
pub use preferences::{DeliveryChannel, NotificationPreferences, QuietHours};
pub use state::{ConnectionEvent, ConnectionState, ConnectionStatus};
pub use traits::{
    ChangeStreamTransport, NotificationSink, NotificationStore, PreferencesStore, TransportSignal,
};
pub use types::{
    Category, ChannelName, Priority, SystemTimeSource, TimeOfDay, TimeSource, Timestamp, UserId,
};
