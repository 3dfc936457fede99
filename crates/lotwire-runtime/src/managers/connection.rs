//! Connection management for the LotWire runtime
//!
//! The ConnectionManager owns the session's named subscription channels:
//! it opens them on the transport, routes their events to registered
//! callbacks, and recovers all of them with exponential backoff when the
//! transport drops. Lifecycle decisions are delegated to the
//! [`ConnectionState`] machine; this module only feeds it events and acts
//! on the resulting status.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::lock;

use lotwire_core::{
    create_raw_event_channel, AppEvent, AppEventSender, ChangeStreamTransport, ChannelName,
    ConnectionEvent, ConnectionState, ConnectionStatus, EventCallback, LotwireError,
    NonBlockingSend, RawEventSender, ReconnectConfig, ResourceFilter, Result, StatusSender,
    TimeSource, TransportSignal,
};

// ----------------------------------------------------------------------------
// Channel Registration
// ----------------------------------------------------------------------------

/// One registered subscription channel
///
/// Registration order is preserved so recovery reopens channels in the
/// order the application subscribed them.
#[derive(Clone)]
struct ChannelRegistration {
    name: ChannelName,
    filter: ResourceFilter,
}

// ----------------------------------------------------------------------------
// Shared Core
// ----------------------------------------------------------------------------

/// State shared between the manager handle and its background tasks
struct ManagerCore {
    transport: Arc<dyn ChangeStreamTransport>,
    reconnect: ReconnectConfig,
    time_source: Arc<dyn TimeSource>,
    /// Always `Some` outside of an in-flight transition
    state: Mutex<Option<ConnectionState>>,
    registrations: Mutex<Vec<ChannelRegistration>>,
    callbacks: Mutex<HashMap<ChannelName, EventCallback>>,
    raw_tx: RawEventSender,
    status_tx: StatusSender,
    app_tx: AppEventSender,
    /// In-flight recovery loop, at most one at a time
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    /// Reconnect attempts consumed since the last successful subscribe.
    /// Reset only on re-entry to Subscribed, so extra drop signals landing
    /// mid-recovery cannot grant a fresh budget.
    attempts_used: AtomicU32,
}

impl ManagerCore {
    /// Feed one event to the state machine and publish the new status
    ///
    /// Invalid transitions are logged and leave the state untouched.
    fn apply(&self, event: ConnectionEvent) -> ConnectionStatus {
        let mut guard = lock(&self.state);
        let current = match guard.take() {
            Some(state) => state,
            None => return ConnectionStatus::Closed,
        };
        let snapshot = current.clone();
        let from_name = current.state_name();

        match current.transition(event, self.time_source.now()) {
            Ok(next) => {
                if next.state_name() != from_name {
                    debug!(from = from_name, to = next.state_name(), "connection transition");
                }
                *guard = Some(next);
            }
            Err(e) => {
                warn!(error = %e, "ignoring invalid connection transition");
                *guard = Some(snapshot);
            }
        }

        let status = guard
            .as_ref()
            .map(|s| s.status())
            .unwrap_or(ConnectionStatus::Closed);
        drop(guard);

        if status == ConnectionStatus::Subscribed {
            self.attempts_used.store(0, Ordering::SeqCst);
        }
        let _ = self.status_tx.send(status);
        status
    }

    fn status(&self) -> ConnectionStatus {
        lock(&self.state)
            .as_ref()
            .map(|s| s.status())
            .unwrap_or(ConnectionStatus::Closed)
    }

    fn is_recoverable_error(&self) -> bool {
        match lock(&self.state).as_ref() {
            Some(state) => state.status() == ConnectionStatus::Error && !state.is_terminal(),
            None => false,
        }
    }

    /// Reopen every registered channel in registration order
    async fn reopen_all(&self) -> Result<()> {
        let snapshot: Vec<ChannelRegistration> = lock(&self.registrations).clone();
        for registration in snapshot {
            self.transport
                .open_channel(&registration.name, &registration.filter, self.raw_tx.clone())
                .await?;
            debug!(channel = %registration.name, "channel reopened");
        }
        Ok(())
    }

    /// Run the backoff-driven recovery loop after a drop
    ///
    /// One attempt per iteration: schedule, wait, reconnect, and either
    /// settle back into Subscribed or fall through to the next attempt.
    /// Attempts draw on the shared counter, so a loop that replaces an
    /// aborted one continues the budget instead of restarting it.
    /// Exhausting the budget is terminal for this session.
    async fn run_reconnect_loop(self: Arc<Self>) {
        loop {
            if !self.is_recoverable_error() {
                debug!("abandoning recovery, connection no longer in recoverable error");
                return;
            }

            let attempt = self.attempts_used.fetch_add(1, Ordering::SeqCst);
            if attempt >= self.reconnect.max_attempts {
                break;
            }

            let delay = self.reconnect.delay_for_attempt(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            self.apply(ConnectionEvent::RetryScheduled { attempt, delay });
            tokio::time::sleep(delay).await;

            if self.status() != ConnectionStatus::Reconnecting {
                return;
            }
            self.apply(ConnectionEvent::RetryStarted);

            match self.reopen_all().await {
                Ok(()) => {
                    let status = self.apply(ConnectionEvent::TransportAck);
                    if status == ConnectionStatus::Subscribed {
                        info!(attempt, "connection recovered, all channels resubscribed");
                        return;
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "reconnect attempt failed");
                    self.apply(ConnectionEvent::TransportDropped {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let attempts = self.reconnect.max_attempts;
        warn!(attempts, "reconnect attempts exhausted, giving up");
        self.apply(ConnectionEvent::RetriesExhausted { attempts });
        let _ = self.app_tx.try_send_non_blocking(AppEvent::ConnectionLost {
            reason: LotwireError::ReconnectExhausted { attempts }.to_string(),
        });
    }

    /// Begin recovery for a freshly observed drop
    ///
    /// Only called once the state has settled into a recoverable error.
    /// Any previous loop is superseded: it either already finished, or it
    /// belongs to an earlier drop and must not swallow this one. The
    /// replacement continues from the shared attempt counter, so
    /// superseding never refreshes the budget.
    fn maybe_start_reconnect(self: &Arc<Self>) {
        let mut guard = lock(&self.reconnect_task);
        if !self.is_recoverable_error() {
            return;
        }
        if let Some(old) = guard.take() {
            old.abort();
        }
        let core = Arc::clone(self);
        *guard = Some(tokio::spawn(core.run_reconnect_loop()));
    }
}

// ----------------------------------------------------------------------------
// Connection Manager
// ----------------------------------------------------------------------------

/// Manages the session's subscription channels and their recovery
pub struct ConnectionManager {
    core: Arc<ManagerCore>,
    /// Routes raw transport events to registered callbacks
    router_task: Mutex<Option<JoinHandle<()>>>,
    /// Watches the transport's health signals
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Create a manager and start its router and monitor tasks
    pub fn new(
        transport: Arc<dyn ChangeStreamTransport>,
        reconnect: ReconnectConfig,
        channels: &lotwire_core::ChannelConfig,
        time_source: Arc<dyn TimeSource>,
        status_tx: StatusSender,
        app_tx: AppEventSender,
    ) -> Self {
        let (raw_tx, mut raw_rx) = create_raw_event_channel(channels);

        let core = Arc::new(ManagerCore {
            transport,
            reconnect,
            time_source: Arc::clone(&time_source),
            state: Mutex::new(Some(ConnectionState::new_connecting(time_source.now()))),
            registrations: Mutex::new(Vec::new()),
            callbacks: Mutex::new(HashMap::new()),
            raw_tx,
            status_tx,
            app_tx,
            reconnect_task: Mutex::new(None),
            attempts_used: AtomicU32::new(0),
        });

        let router_core = Arc::clone(&core);
        let router_task = tokio::spawn(async move {
            while let Some(channel_event) = raw_rx.recv().await {
                let callback = lock(&router_core.callbacks)
                    .get(&channel_event.channel)
                    .cloned();
                match callback {
                    Some(callback) => callback(channel_event.event),
                    None => {
                        debug!(channel = %channel_event.channel, "event for unregistered channel");
                        let _ = router_core
                            .app_tx
                            .try_send_non_blocking(AppEvent::OrphanEvent {
                                channel: channel_event.channel,
                            });
                    }
                }
            }
        });

        let monitor_core = Arc::clone(&core);
        let mut signals = monitor_core.transport.signals();
        let monitor_task = tokio::spawn(async move {
            while signals.changed().await.is_ok() {
                let signal = signals.borrow_and_update().clone();
                if let TransportSignal::Down { reason } = signal {
                    warn!(reason = %reason, "transport reported connection down");
                    monitor_core.apply(ConnectionEvent::TransportDropped { reason });
                    monitor_core.maybe_start_reconnect();
                }
            }
        });

        Self {
            core,
            router_task: Mutex::new(Some(router_task)),
            monitor_task: Mutex::new(Some(monitor_task)),
        }
    }

    /// Register and open a named subscription channel
    ///
    /// Duplicate names are rejected synchronously. Transport failures are
    /// not surfaced here: the channel stays registered and recovery brings
    /// it up with the rest.
    pub async fn subscribe(
        &self,
        name: ChannelName,
        filter: ResourceFilter,
        callback: EventCallback,
    ) -> Result<()> {
        let status = self.core.status();
        if status == ConnectionStatus::Closed
            || (status == ConnectionStatus::Error && !self.core.is_recoverable_error())
        {
            return Err(LotwireError::SessionClosed);
        }

        {
            let mut registrations = lock(&self.core.registrations);
            if registrations.iter().any(|r| r.name == name) {
                return Err(LotwireError::duplicate_channel(name));
            }
            registrations.push(ChannelRegistration {
                name: name.clone(),
                filter: filter.clone(),
            });
        }
        lock(&self.core.callbacks).insert(name.clone(), callback);

        // While recovery is in flight, the loop will open this channel
        // along with the others
        if !matches!(status, ConnectionStatus::Connecting | ConnectionStatus::Subscribed) {
            debug!(channel = %name, "registered while disconnected, deferring open");
            return Ok(());
        }

        match self
            .core
            .transport
            .open_channel(&name, &filter, self.core.raw_tx.clone())
            .await
        {
            Ok(()) => {
                info!(channel = %name, "channel subscribed");
                self.core.apply(ConnectionEvent::TransportAck);
                Ok(())
            }
            Err(e) => {
                warn!(channel = %name, error = %e, "channel open failed, starting recovery");
                self.core.apply(ConnectionEvent::TransportDropped {
                    reason: e.to_string(),
                });
                self.core.maybe_start_reconnect();
                Ok(())
            }
        }
    }

    /// Close and forget a subscription channel
    ///
    /// Unknown names are a no-op. Events already in flight for the channel
    /// surface as orphan app events rather than reaching the old callback.
    pub async fn unsubscribe(&self, name: &ChannelName) -> Result<()> {
        let existed = {
            let mut registrations = lock(&self.core.registrations);
            let before = registrations.len();
            registrations.retain(|r| r.name != *name);
            registrations.len() != before
        };
        lock(&self.core.callbacks).remove(name);

        if !existed {
            return Ok(());
        }

        if let Err(e) = self.core.transport.close_channel(name).await {
            warn!(channel = %name, error = %e, "channel close failed");
        }
        info!(channel = %name, "channel unsubscribed");
        Ok(())
    }

    /// Names of currently registered channels, in registration order
    pub fn subscribed_channels(&self) -> Vec<ChannelName> {
        lock(&self.core.registrations)
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    /// Current coarse connection status
    pub fn status(&self) -> ConnectionStatus {
        self.core.status()
    }

    /// Tear the connection down
    ///
    /// Idempotent: cancels recovery, stops the router and monitor, and
    /// closes every open channel best-effort.
    pub async fn cleanup(&self) {
        if self.core.status() == ConnectionStatus::Closed {
            return;
        }
        self.core.apply(ConnectionEvent::Close);

        if let Some(handle) = lock(&self.core.reconnect_task).take() {
            handle.abort();
        }
        if let Some(handle) = lock(&self.monitor_task).take() {
            handle.abort();
        }

        let registrations: Vec<ChannelRegistration> =
            std::mem::take(&mut *lock(&self.core.registrations));
        lock(&self.core.callbacks).clear();
        for registration in registrations {
            if let Err(e) = self.core.transport.close_channel(&registration.name).await {
                debug!(channel = %registration.name, error = %e, "close during cleanup failed");
            }
        }

        if let Some(handle) = lock(&self.router_task).take() {
            handle.abort();
        }
        info!("connection manager cleaned up");
    }
}
