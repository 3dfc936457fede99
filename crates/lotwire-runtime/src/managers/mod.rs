//! Manager Components
//!
//! The three engine components, one per concern:
//! - `connection`: channel subscriptions and backoff-driven recovery
//! - `batch`: per-key coalescing behind the shared batch window
//! - `dispatch`: preference and quiet-hours policy at the delivery edge

pub mod batch;
pub mod connection;
pub mod dispatch;

pub use batch::BatchQueue;
pub use connection::ConnectionManager;
pub use dispatch::{DeliveryPolicyDispatcher, DispatchOutcome, SuppressReason};

/// Lock a mutex, recovering from poisoning
///
/// Engine state stays consistent under panics in unrelated holders; locks
/// are never held across await points.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
