//! Connection State Machine
//!
//! Linear state machine for the session's logical connection to the
//! change-stream backend. States are consumed on transition, so an invalid
//! edge is a caught error instead of silently corrupted state. The
//! transition table is the single place connection lifecycle logic lives;
//! the ConnectionManager only feeds it events and timestamps.

use crate::errors::StateTransitionError;
use crate::types::Timestamp;
use core::time::Duration;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Connection State Types
// ----------------------------------------------------------------------------

/// Connection lifecycle state, one instance per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Opening channels, waiting for the transport to acknowledge
    Connecting(ConnectingState),
    /// All registered channels are live
    Subscribed(SubscribedState),
    /// Transport failure; terminal once the attempt budget is exhausted
    Error(ErrorState),
    /// A reconnect attempt is scheduled
    Reconnecting(ReconnectingState),
    /// Session torn down; the manager must be reconstructed to reconnect
    Closed(ClosedState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectingState {
    pub started_at: Timestamp,
    /// The reconnect attempt this connect resumes from, `None` on the
    /// session's first connect
    pub resume_attempt: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribedState {
    pub since: Timestamp,
    /// 1-based retry attempt that restored the connection, 0 on the
    /// session's first connect
    pub recovered_on_attempt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorState {
    pub reason: String,
    pub failed_at: Timestamp,
    /// Terminal errors schedule no further retries
    pub terminal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectingState {
    /// 0-based attempt about to run
    pub attempt: u32,
    pub delay: Duration,
    pub scheduled_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedState {
    pub closed_at: Timestamp,
}

// ----------------------------------------------------------------------------
// State Transition Events
// ----------------------------------------------------------------------------

/// Events that trigger state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// Transport acknowledged all channel subscriptions
    TransportAck,
    /// The transport reported a failure or drop
    TransportDropped { reason: String },
    /// A reconnect attempt has been scheduled after a backoff delay
    RetryScheduled { attempt: u32, delay: Duration },
    /// The scheduled reconnect attempt is starting
    RetryStarted,
    /// The attempt budget is exhausted; settle into a terminal error
    RetriesExhausted { attempts: u32 },
    /// Explicit session teardown
    Close,
}

// ----------------------------------------------------------------------------
// UI-facing Status
// ----------------------------------------------------------------------------

/// Coarse connection status surfaced to the UI layer (watch channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connecting,
    Subscribed,
    Reconnecting,
    /// Persistent failure; render as a passive disconnected indicator
    Error,
    Closed,
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl ConnectionState {
    /// Initial state for a session that is opening its first channel
    pub fn new_connecting(now: Timestamp) -> Self {
        ConnectionState::Connecting(ConnectingState {
            started_at: now,
            resume_attempt: None,
        })
    }

    /// Get current state name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            ConnectionState::Connecting(_) => "Connecting",
            ConnectionState::Subscribed(_) => "Subscribed",
            ConnectionState::Error(_) => "Error",
            ConnectionState::Reconnecting(_) => "Reconnecting",
            ConnectionState::Closed(_) => "Closed",
        }
    }

    /// Coarse status for UI consumption
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Connecting(_) => ConnectionStatus::Connecting,
            ConnectionState::Subscribed(_) => ConnectionStatus::Subscribed,
            ConnectionState::Error(_) => ConnectionStatus::Error,
            ConnectionState::Reconnecting(_) => ConnectionStatus::Reconnecting,
            ConnectionState::Closed(_) => ConnectionStatus::Closed,
        }
    }

    /// Whether this state schedules no further automatic work
    pub fn is_terminal(&self) -> bool {
        match self {
            ConnectionState::Closed(_) => true,
            ConnectionState::Error(s) => s.terminal,
            _ => false,
        }
    }

    /// Process an event and transition to a new state (consumes self)
    pub fn transition(
        self,
        event: ConnectionEvent,
        now: Timestamp,
    ) -> Result<ConnectionState, StateTransitionError> {
        let from_state = self.state_name();

        let new_state = match (self, event) {
            // From Connecting
            (ConnectionState::Connecting(state), ConnectionEvent::TransportAck) => {
                ConnectionState::Subscribed(SubscribedState {
                    since: now,
                    recovered_on_attempt: state.resume_attempt.map(|a| a + 1).unwrap_or(0),
                })
            }
            (ConnectionState::Connecting(_), ConnectionEvent::TransportDropped { reason }) => {
                ConnectionState::Error(ErrorState {
                    reason,
                    failed_at: now,
                    terminal: false,
                })
            }

            // From Subscribed
            (ConnectionState::Subscribed(_), ConnectionEvent::TransportDropped { reason }) => {
                ConnectionState::Error(ErrorState {
                    reason,
                    failed_at: now,
                    terminal: false,
                })
            }
            // Re-acks while already subscribed are harmless
            (ConnectionState::Subscribed(state), ConnectionEvent::TransportAck) => {
                ConnectionState::Subscribed(state)
            }

            // From Error (recoverable)
            (ConnectionState::Error(state), ConnectionEvent::RetryScheduled { attempt, delay })
                if !state.terminal =>
            {
                ConnectionState::Reconnecting(ReconnectingState {
                    attempt,
                    delay,
                    scheduled_at: now,
                })
            }
            (ConnectionState::Error(state), ConnectionEvent::RetriesExhausted { .. })
                if !state.terminal =>
            {
                ConnectionState::Error(ErrorState {
                    terminal: true,
                    ..state
                })
            }

            // From Reconnecting
            (ConnectionState::Reconnecting(state), ConnectionEvent::RetryStarted) => {
                ConnectionState::Connecting(ConnectingState {
                    started_at: now,
                    resume_attempt: Some(state.attempt),
                })
            }
            // An ack arriving while still Reconnecting (transport recovered
            // on its own) re-enters Subscribed directly
            (ConnectionState::Reconnecting(state), ConnectionEvent::TransportAck) => {
                ConnectionState::Subscribed(SubscribedState {
                    since: now,
                    recovered_on_attempt: state.attempt + 1,
                })
            }

            // Universal teardown; idempotent from Closed
            (_, ConnectionEvent::Close) => {
                ConnectionState::Closed(ClosedState { closed_at: now })
            }

            // Invalid transitions
            (_state, event) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: from_state.to_string(),
                    event: format!("{:?}", event),
                    reason: format!("Event not valid for state {}", from_state),
                });
            }
        };

        Ok(new_state)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
