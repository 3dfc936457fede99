//! Delivery policy for the LotWire runtime
//!
//! The dispatcher is the last gate before anything reaches the user: it
//! loads delivery preferences, persists the in-app record, always emits the
//! in-app event, and then decides whether the deliverable also earns a
//! system popup and a sound. Preference and store failures degrade
//! gracefully; delivery never silently disappears because a lookup failed.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use lotwire_core::{
    AppEvent, AppEventSender, Category, Deliverable, DeliveryChannel, DispatchReceiver,
    NonBlockingSend, NotificationPreferences, NotificationRecord, NotificationSink,
    NotificationStore, PreferencesStore, Priority, TimeOfDay, TimeSource, UserId,
};

// ----------------------------------------------------------------------------
// Dispatch Outcome
// ----------------------------------------------------------------------------

/// Why popup and sound were withheld for a deliverable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    MutedCategory,
    QuietHours,
}

/// What one dispatch actually produced
///
/// The in-app event always fires; only the out-of-band surfaces vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub popup: bool,
    pub sound: bool,
    pub suppressed: Option<SuppressReason>,
}

// ----------------------------------------------------------------------------
// Delivery Policy Dispatcher
// ----------------------------------------------------------------------------

/// Applies per-user delivery preferences to flushed deliverables
pub struct DeliveryPolicyDispatcher {
    preferences: Arc<dyn PreferencesStore>,
    store: Arc<dyn NotificationStore>,
    sink: Arc<dyn NotificationSink>,
    time_source: Arc<dyn TimeSource>,
    app_tx: AppEventSender,
    /// Category to sound-key mapping; unmapped categories use the default
    sounds: HashMap<Category, String>,
    default_sound: String,
}

impl DeliveryPolicyDispatcher {
    pub fn new(
        preferences: Arc<dyn PreferencesStore>,
        store: Arc<dyn NotificationStore>,
        sink: Arc<dyn NotificationSink>,
        time_source: Arc<dyn TimeSource>,
        app_tx: AppEventSender,
    ) -> Self {
        Self {
            preferences,
            store,
            sink,
            time_source,
            app_tx,
            sounds: HashMap::new(),
            default_sound: "notification-default".to_string(),
        }
    }

    /// Map a category to a specific sound key
    pub fn with_sound(mut self, category: Category, key: impl Into<String>) -> Self {
        self.sounds.insert(category, key.into());
        self
    }

    /// Deliver one deliverable to its recipient, applying policy
    pub async fn dispatch(&self, recipient: &UserId, deliverable: Deliverable) -> DispatchOutcome {
        let prefs = match self.preferences.get(recipient).await {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "preferences unavailable, using defaults");
                NotificationPreferences::default()
            }
        };

        self.persist(recipient, &deliverable).await;

        // The in-app list stays accurate regardless of mutes and quiet
        // hours; only popup and sound are policy-gated. The dispatcher
        // runs on its own task, so waiting for buffer space here is
        // backpressure, not a stall.
        if self
            .app_tx
            .send(AppEvent::NotificationArrived {
                recipient: recipient.clone(),
                deliverable: deliverable.clone(),
            })
            .await
            .is_err()
        {
            warn!(recipient = %recipient, "app event channel closed, in-app notification dropped");
        }

        if prefs.is_muted(&deliverable.category) {
            debug!(recipient = %recipient, category = %deliverable.category, "category muted");
            return DispatchOutcome {
                popup: false,
                sound: false,
                suppressed: Some(SuppressReason::MutedCategory),
            };
        }

        let now = TimeOfDay::from_timestamp(self.time_source.now());
        if prefs.in_quiet_hours(now) && deliverable.priority != Priority::High {
            debug!(recipient = %recipient, now = %now, "quiet hours active");
            return DispatchOutcome {
                popup: false,
                sound: false,
                suppressed: Some(SuppressReason::QuietHours),
            };
        }

        let mut popup = false;
        if prefs.channel_enabled(DeliveryChannel::SystemPopup) {
            match self.sink.show(&deliverable).await {
                Ok(()) => popup = true,
                Err(e) => warn!(error = %e, "system popup failed"),
            }
        }

        let mut sound = false;
        if prefs.channel_enabled(DeliveryChannel::Sound) {
            let key = self
                .sounds
                .get(&deliverable.category)
                .map(String::as_str)
                .unwrap_or(&self.default_sound);
            match self.sink.play_sound(key).await {
                Ok(()) => sound = true,
                Err(e) => warn!(key, error = %e, "notification sound failed"),
            }
        }

        DispatchOutcome {
            popup,
            sound,
            suppressed: None,
        }
    }

    /// Persist the record and refresh the unread counter
    ///
    /// Store failures are logged, never raised: an unavailable store must
    /// not stop popups and sounds.
    async fn persist(&self, recipient: &UserId, deliverable: &Deliverable) {
        let record =
            NotificationRecord::from_deliverable(deliverable, recipient, self.time_source.now());
        if let Err(e) = self.store.create(record).await {
            warn!(recipient = %recipient, error = %e, "failed to persist notification record");
            return;
        }

        match self.store.unread_count(recipient).await {
            Ok(count) => {
                let update = AppEvent::UnreadCountChanged {
                    recipient: recipient.clone(),
                    count,
                };
                if let Err(e) = self.app_tx.try_send_non_blocking(update) {
                    warn!(recipient = %recipient, error = %e, "unread count update dropped");
                }
            }
            Err(e) => warn!(recipient = %recipient, error = %e, "unread count unavailable"),
        }
    }

    /// Consume the dispatch channel until it closes
    ///
    /// Runs on its own task so preference and store I/O never blocks
    /// enqueue or flush.
    pub async fn run(self, mut dispatch_rx: DispatchReceiver) {
        while let Some((recipient, deliverable)) = dispatch_rx.recv().await {
            self.dispatch(&recipient, deliverable).await;
        }
        debug!("dispatch channel closed, dispatcher stopping");
    }
}
