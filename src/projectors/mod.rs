//! Derived view projectors
//!
//! A [`Projector`] turns the envelope stream into one presentation-ready view.
//! Projectors are plain state machines: [`Projector::apply`] folds an envelope
//! into the view and reports whether anything changed. They never touch the
//! connection and keep their last value while the feed is reconnecting.
//!
//! [`MountedView`] connects a projector to a [`SubscriberRegistry`] and publishes
//! every change on a watch channel, so the presentation layer can read the latest
//! view, await the next one, or consume a (throttled) stream.
//!
//! ## Example
//!
//! ```rust
//! use trafficwatch::projectors::{Projector, VehicleTypeProjector};
//! use trafficwatch::types::Envelope;
//!
//! let mut projector = VehicleTypeProjector::new();
//! let envelope = Envelope::decode(
//!     br#"{"stats":{"ActiveVehicleCounts":{"Car":5,"Bus":0,"Truck":2},"TotalActiveVehicles":9}}"#,
//! )
//! .unwrap();
//!
//! assert!(projector.apply(&envelope));
//! assert_eq!(projector.view().total_active_vehicles, 9);
//! ```

mod directional;
mod frame;
mod vehicle;

pub use directional::{DirectionalFlowProjector, DirectionalFlowView, FlowRow};
pub use frame::{FrameProjector, FrameView, ImageDecoder, JpegDecoder, PixelSurface};
pub use vehicle::{VehicleTypeProjector, VehicleTypeView};

use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::registry::{Listener, ListenerHandle, SubscriberRegistry};
use crate::stream::ThrottleExt;
use crate::types::{Envelope, UpdateRate};

/// Folds envelopes into a view.
pub trait Projector: Send + 'static {
    type View: Clone + Send + Sync + 'static;

    /// Apply one envelope. Returns `true` when the view changed.
    fn apply(&mut self, envelope: &Envelope) -> bool;

    /// The current view.
    fn view(&self) -> &Self::View;
}

/// Registry listener that drives a projector and publishes its view.
struct ProjectorListener<P: Projector> {
    projector: Mutex<P>,
    published: watch::Sender<P::View>,
}

impl<P: Projector> Listener for ProjectorListener<P> {
    fn on_envelope(&self, envelope: &Envelope) {
        let mut projector = self.projector.lock();
        if projector.apply(envelope) {
            self.published.send_replace(projector.view().clone());
        }
    }
}

/// A projector registered with a subscriber registry.
///
/// Dropping the view (or calling [`unmount`](Self::unmount)) removes its listener.
pub struct MountedView<P: Projector> {
    registry: Arc<SubscriberRegistry>,
    handle: Option<ListenerHandle>,
    view: watch::Receiver<P::View>,
}

impl<P: Projector> MountedView<P> {
    /// Register `projector` with `registry`.
    pub fn mount(registry: Arc<SubscriberRegistry>, projector: P) -> Self {
        let (published, view) = watch::channel(projector.view().clone());
        let handle = ListenerHandle::new(ProjectorListener { projector: Mutex::new(projector), published });
        registry.add(handle.clone());
        debug!(projector = std::any::type_name::<P>(), "Projector mounted");

        Self { registry, handle: Some(handle), view }
    }

    /// Latest published view.
    pub fn current(&self) -> P::View {
        self.view.borrow().clone()
    }

    /// Wait for the next change and return it.
    ///
    /// Returns `None` only if the projector is gone.
    pub async fn changed(&mut self) -> Option<P::View> {
        self.view.changed().await.ok()?;
        Some(self.view.borrow_and_update().clone())
    }

    /// Stream of views, starting with the current one.
    ///
    /// With [`UpdateRate::Max`] intermediate views are skipped so that at most
    /// that many per second are emitted; the most recent view always wins.
    pub fn updates(&self, rate: UpdateRate) -> BoxStream<'static, P::View> {
        let views = WatchStream::new(self.view.clone());
        match rate.interval() {
            Some(period) => views.throttle(period).boxed(),
            None => views.boxed(),
        }
    }

    /// Listener handle registered for this view.
    pub fn handle(&self) -> Option<&ListenerHandle> {
        self.handle.as_ref()
    }

    /// Unregister the projector.
    pub fn unmount(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.registry.remove(&handle);
            debug!(projector = std::any::type_name::<P>(), "Projector unmounted");
        }
    }
}

impl<P: Projector> Drop for MountedView<P> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<P: Projector> fmt::Debug for MountedView<P>
where
    P::View: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedView")
            .field("mounted", &self.handle.is_some())
            .field("view", &*self.view.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stats(body: &str) -> Envelope {
        Envelope::decode(format!(r#"{{"stats":{}}}"#, body).as_bytes()).unwrap()
    }

    #[test]
    fn mounted_view_publishes_changes() {
        let registry = Arc::new(SubscriberRegistry::new());
        let view = MountedView::mount(Arc::clone(&registry), VehicleTypeProjector::new());
        assert_eq!(registry.len(), 1);
        assert_eq!(view.current().total_active_vehicles, 0);

        registry.deliver(&stats(r#"{"TotalActiveVehicles":12}"#));
        assert_eq!(view.current().total_active_vehicles, 12);

        // Frame-only envelopes leave the statistics view alone.
        registry.deliver(&Envelope::decode(br#"{"frame":"AQID"}"#).unwrap());
        assert_eq!(view.current().total_active_vehicles, 12);
    }

    #[test]
    fn dropping_view_unregisters() {
        let registry = Arc::new(SubscriberRegistry::new());
        let first = MountedView::mount(Arc::clone(&registry), VehicleTypeProjector::new());
        let second = MountedView::mount(Arc::clone(&registry), VehicleTypeProjector::new());
        assert_eq!(registry.len(), 2);

        drop(first);
        assert_eq!(registry.len(), 1);
        second.unmount();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn changed_resolves_on_next_publish() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut view = MountedView::mount(Arc::clone(&registry), VehicleTypeProjector::new());

        let deliver = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry.deliver(&stats(r#"{"TotalVehicles":3}"#));
            })
        };

        let next = tokio::time::timeout(Duration::from_secs(1), view.changed()).await.unwrap();
        assert_eq!(next.map(|v| v.total_active_vehicles), Some(3));
        deliver.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_updates_keep_latest() {
        let registry = Arc::new(SubscriberRegistry::new());
        let view = MountedView::mount(Arc::clone(&registry), VehicleTypeProjector::new());
        let mut updates = view.updates(UpdateRate::Max(10));

        assert_eq!(updates.next().await.map(|v| v.total_active_vehicles), Some(0));

        for total in 1..=5 {
            registry.deliver(&stats(&format!(r#"{{"TotalVehicles":{}}}"#, total)));
        }

        assert_eq!(updates.next().await.map(|v| v.total_active_vehicles), Some(5));
    }
}
