//! Subscriber registry: ordered fan-out of envelopes to listeners.
//!
//! The registry is an ordered *multiset* of handles. Registering the same handle
//! twice delivers every envelope to it twice; [`SubscriberRegistry::remove`] drops
//! every occurrence. Identity is pointer identity of the shared listener, so clones
//! of one [`ListenerHandle`] are the same subscriber.
//!
//! Delivery iterates a snapshot of the handles taken when delivery starts. A
//! listener may add or remove handles (including itself) from inside its callback;
//! the change applies from the next envelope on.

use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{error, trace};

use crate::types::Envelope;

/// Receives every envelope delivered while it is registered.
pub trait Listener: Send + Sync + 'static {
    fn on_envelope(&self, envelope: &Envelope);
}

impl<F> Listener for F
where
    F: Fn(&Envelope) + Send + Sync + 'static,
{
    fn on_envelope(&self, envelope: &Envelope) {
        self(envelope)
    }
}

/// Shared reference to a registered listener.
#[derive(Clone)]
pub struct ListenerHandle {
    listener: Arc<dyn Listener>,
}

impl ListenerHandle {
    pub fn new<L: Listener>(listener: L) -> Self {
        Self { listener: Arc::new(listener) }
    }

    /// Wrap an already shared listener; the caller keeps its own `Arc`.
    pub fn from_arc(listener: Arc<dyn Listener>) -> Self {
        Self { listener }
    }

    fn identity(&self) -> *const () {
        Arc::as_ptr(&self.listener) as *const ()
    }

    fn invoke(&self, envelope: &Envelope) {
        self.listener.on_envelope(envelope);
    }
}

impl PartialEq for ListenerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ListenerHandle {}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenerHandle").field(&self.identity()).finish()
    }
}

/// Outcome of one [`SubscriberRegistry::deliver`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    /// Handles that returned normally.
    pub delivered: usize,
    /// Handles that panicked.
    pub failed: usize,
}

/// Ordered collection of listener handles.
#[derive(Default)]
pub struct SubscriberRegistry {
    handles: Mutex<Vec<ListenerHandle>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handle`. Duplicates are kept.
    pub fn add(&self, handle: ListenerHandle) {
        let mut handles = self.handles.lock();
        handles.push(handle);
        trace!(listeners = handles.len(), "Listener added");
    }

    /// Remove every occurrence of `handle`. Returns how many were removed.
    pub fn remove(&self, handle: &ListenerHandle) -> usize {
        let mut handles = self.handles.lock();
        let before = handles.len();
        handles.retain(|h| h != handle);
        let removed = before - handles.len();
        trace!(removed, listeners = handles.len(), "Listener removed");
        removed
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Call every handle present now, in registration order.
    ///
    /// A panicking handle is logged and skipped; the remaining handles still
    /// receive the envelope.
    pub fn deliver(&self, envelope: &Envelope) -> DeliveryReport {
        let snapshot: Vec<ListenerHandle> = self.handles.lock().clone();
        let mut report = DeliveryReport::default();

        for (index, handle) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handle.invoke(envelope))) {
                Ok(()) => report.delivered += 1,
                Err(panic) => {
                    report.failed += 1;
                    error!(listener = index, panic = panic_message(panic.as_ref()), "Listener panicked during delivery");
                }
            }
        }

        report
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry").field("listeners", &self.len()).finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
