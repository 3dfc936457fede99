//! Notification Session
//!
//! One [`NotificationSession`] per signed-in user session. It wires the
//! engine together: transport events flow through the ConnectionManager's
//! callbacks into the BatchQueue, flushed deliverables cross the dispatch
//! channel to the DeliveryPolicyDispatcher's task, and the results surface
//! as app events, popups, sounds, and stored records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use lotwire_core::{
    create_app_event_channel, create_dispatch_channel, create_status_channel, AppEventReceiver,
    Category, ChangeStreamTransport, ChannelName, EventCallback, EventKind, LotwireConfig,
    LotwireError, NotificationSink, NotificationStore, PreferencesStore, RawEvent, ResourceFilter,
    Result, StatusReceiver, SystemTimeSource, TimeSource, UserId,
};

use crate::managers::{lock, BatchQueue, ConnectionManager, DeliveryPolicyDispatcher};

// ----------------------------------------------------------------------------
// Session Builder
// ----------------------------------------------------------------------------

/// Builder for [`NotificationSession`]
///
/// Collaborators are required; configuration and time source default to
/// production values.
pub struct SessionBuilder {
    config: LotwireConfig,
    time_source: Arc<dyn TimeSource>,
    transport: Option<Arc<dyn ChangeStreamTransport>>,
    store: Option<Arc<dyn NotificationStore>>,
    preferences: Option<Arc<dyn PreferencesStore>>,
    sink: Option<Arc<dyn NotificationSink>>,
    sounds: Vec<(Category, String)>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: LotwireConfig::default(),
            time_source: Arc::new(SystemTimeSource::new()),
            transport: None,
            store: None,
            preferences: None,
            sink: None,
            sounds: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: LotwireConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn ChangeStreamTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn NotificationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_preferences(mut self, preferences: Arc<dyn PreferencesStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Map a category to a specific notification sound
    pub fn with_sound(mut self, category: Category, key: impl Into<String>) -> Self {
        self.sounds.push((category, key.into()));
        self
    }

    /// Validate and assemble the session, starting its background tasks
    pub fn build(self) -> Result<NotificationSession> {
        self.config
            .validate()
            .map_err(LotwireError::config_error)?;

        let transport = self
            .transport
            .ok_or_else(|| LotwireError::config_error("transport is required"))?;
        let store = self
            .store
            .ok_or_else(|| LotwireError::config_error("notification store is required"))?;
        let preferences = self
            .preferences
            .ok_or_else(|| LotwireError::config_error("preferences store is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| LotwireError::config_error("notification sink is required"))?;

        let (app_tx, app_rx) = create_app_event_channel(&self.config.channels);
        let (dispatch_tx, dispatch_rx) = create_dispatch_channel(&self.config.channels);
        let (status_tx, status_rx) = create_status_channel();

        let mut dispatcher = DeliveryPolicyDispatcher::new(
            preferences,
            Arc::clone(&store),
            sink,
            Arc::clone(&self.time_source),
            app_tx.clone(),
        );
        for (category, key) in self.sounds {
            dispatcher = dispatcher.with_sound(category, key);
        }
        let dispatcher_task = tokio::spawn(dispatcher.run(dispatch_rx));

        let batch = Arc::new(BatchQueue::new(self.config.batch.clone(), dispatch_tx));
        let connection = ConnectionManager::new(
            transport,
            self.config.reconnect.clone(),
            &self.config.channels,
            self.time_source,
            status_tx,
            app_tx,
        );

        info!("notification session started");
        Ok(NotificationSession {
            connection,
            batch,
            dispatcher_task: Mutex::new(Some(dispatcher_task)),
            app_rx: Mutex::new(Some(app_rx)),
            status_rx,
            store,
            closed: AtomicBool::new(false),
        })
    }
}

// ----------------------------------------------------------------------------
// Notification Session
// ----------------------------------------------------------------------------

/// The assembled notification engine for one user session
pub struct NotificationSession {
    connection: ConnectionManager,
    batch: Arc<BatchQueue>,
    dispatcher_task: Mutex<Option<JoinHandle<()>>>,
    app_rx: Mutex<Option<AppEventReceiver>>,
    status_rx: StatusReceiver,
    store: Arc<dyn NotificationStore>,
    closed: AtomicBool,
}

impl NotificationSession {
    /// Open a named subscription channel with a caller-supplied callback
    pub async fn subscribe(
        &self,
        name: ChannelName,
        filter: ResourceFilter,
        callback: EventCallback,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LotwireError::SessionClosed);
        }
        self.connection.subscribe(name, filter, callback).await
    }

    /// Open the user's own notification channel, feeding the batch queue
    ///
    /// Convenience for the common case: every insert on the user's
    /// notification feed lands in the coalescing pipeline.
    pub async fn subscribe_notifications(&self, user: &UserId) -> Result<ChannelName> {
        let name = ChannelName::new(format!("notifications:{}", user));
        let filter = ResourceFilter::new("notifications", EventKind::Insert)
            .with_predicate(format!("recipient = '{}'", user));

        let batch = Arc::clone(&self.batch);
        let callback: EventCallback = Arc::new(move |event: RawEvent| batch.enqueue(event));

        self.subscribe(name.clone(), filter, callback).await?;
        Ok(name)
    }

    /// Close a subscription channel
    pub async fn unsubscribe(&self, name: &ChannelName) -> Result<()> {
        self.connection.unsubscribe(name).await
    }

    /// Queue a locally generated event into the batching pipeline
    pub fn enqueue(&self, event: RawEvent) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LotwireError::SessionClosed);
        }
        self.batch.enqueue(event);
        Ok(())
    }

    /// Take the app event receiver (once); the UI layer consumes it
    pub fn take_app_event_receiver(&self) -> Option<AppEventReceiver> {
        lock(&self.app_rx).take()
    }

    /// Watch the coarse connection status
    pub fn connection_status(&self) -> StatusReceiver {
        self.status_rx.clone()
    }

    /// Mark a stored notification as read
    pub async fn mark_read(&self, id: Uuid) -> Result<()> {
        self.store.mark_read(id).await?;
        Ok(())
    }

    /// Unread notification count for a user
    pub async fn unread_count(&self, user: &UserId) -> Result<u64> {
        Ok(self.store.unread_count(user).await?)
    }

    /// Tear the session down: connection, batch window, dispatcher task
    ///
    /// Idempotent; afterwards `subscribe` and `enqueue` return
    /// [`LotwireError::SessionClosed`].
    pub async fn cleanup(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.connection.cleanup().await;
        self.batch.close();
        if let Some(handle) = lock(&self.dispatcher_task).take() {
            handle.abort();
        }
        info!("notification session cleaned up");
    }
}
