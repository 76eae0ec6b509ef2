//! Dashboard composition root
//!
//! Builds the single shared [`ConnectionManager`], mounts the three standard
//! panels on it and starts the connection. Presentation code receives the
//! [`Dashboard`] (or clones of its manager) instead of reaching for a global.

use std::time::Duration;
use tracing::info;

use crate::config::FeedConfig;
use crate::connection::ConnectionManager;
use crate::projectors::{
    DirectionalFlowProjector, DirectionalFlowView, FrameProjector, FrameView, ImageDecoder, JpegDecoder,
    MountedView, VehicleTypeProjector, VehicleTypeView,
};
use crate::transport::Transport;
use crate::transports::WebSocketTransport;
use crate::types::{ConnectionState, RegionSet};
use crate::Result;

/// The standard dashboard: one connection, three mounted panels.
pub struct Dashboard<T: Transport, D: ImageDecoder = JpegDecoder> {
    manager: ConnectionManager<T>,
    vehicles: Option<MountedView<VehicleTypeProjector>>,
    flow: Option<MountedView<DirectionalFlowProjector>>,
    frames: Option<MountedView<FrameProjector<D>>>,
}

impl Dashboard<WebSocketTransport> {
    /// Connect to the configured WebSocket endpoint with the JPEG decoder.
    pub fn connect(config: &FeedConfig) -> Result<Self> {
        let manager = ConnectionManager::websocket(config)?;
        Ok(Self::start(manager, config.region_set, FrameProjector::new()))
    }
}

impl<T: Transport> Dashboard<T> {
    /// Start a dashboard over any transport with the JPEG decoder.
    pub fn with_transport(transport: T, reconnect_delay: Duration, regions: RegionSet) -> Self {
        Self::start(ConnectionManager::new(transport, reconnect_delay), regions, FrameProjector::new())
    }
}

impl<T: Transport, D: ImageDecoder> Dashboard<T, D> {
    /// Mount the vehicle panel, the directional-flow table and the frame view
    /// (in that order) on `manager`, then connect.
    pub fn start(manager: ConnectionManager<T>, regions: RegionSet, frames: FrameProjector<D>) -> Self {
        let vehicles = manager.mount(VehicleTypeProjector::new());
        let flow = manager.mount(DirectionalFlowProjector::new(regions));
        let frames = manager.mount(frames);
        info!(endpoint = %manager.endpoint(), ?regions, "Dashboard started");

        manager.connect();
        Self { manager, vehicles: Some(vehicles), flow: Some(flow), frames: Some(frames) }
    }

    pub fn manager(&self) -> &ConnectionManager<T> {
        &self.manager
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn vehicles(&self) -> Option<&MountedView<VehicleTypeProjector>> {
        self.vehicles.as_ref()
    }

    pub fn flow(&self) -> Option<&MountedView<DirectionalFlowProjector>> {
        self.flow.as_ref()
    }

    pub fn frames(&self) -> Option<&MountedView<FrameProjector<D>>> {
        self.frames.as_ref()
    }

    /// Current vehicle panel, or the empty panel after shutdown.
    pub fn vehicle_view(&self) -> VehicleTypeView {
        self.vehicles.as_ref().map(MountedView::current).unwrap_or_default()
    }

    pub fn flow_view(&self) -> Option<DirectionalFlowView> {
        self.flow.as_ref().map(MountedView::current)
    }

    pub fn frame_view(&self) -> FrameView {
        self.frames.as_ref().map(MountedView::current).unwrap_or_default()
    }

    /// Close the connection and unmount every panel.
    pub fn shutdown(&mut self) {
        self.manager.close();
        if let Some(view) = self.vehicles.take() {
            view.unmount();
        }
        if let Some(view) = self.flow.take() {
            view.unmount();
        }
        if let Some(view) = self.frames.take() {
            view.unmount();
        }
        info!(endpoint = %self.manager.endpoint(), "Dashboard shut down");
    }
}
