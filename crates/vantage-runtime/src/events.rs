use crate::{Graphics, GraphicsError};
use vantage_3d::EnvironmentData;
use vantage_gltf::GltfAsset;
use vantage_loader::{LoadEvent, LoadSink};
use winit::event_loop::EventLoopProxy;

/// Everything that reaches the event loop from outside it.
pub enum ViewerEvent {
    GraphicsReady(Box<Graphics>),
    GraphicsFailed(GraphicsError),
    Environment(LoadEvent<EnvironmentData>),
    Model(LoadEvent<GltfAsset>),
}

/// Forwards load events of one asset kind into the event loop.
pub struct EventSink<T> {
    proxy: EventLoopProxy<ViewerEvent>,
    wrap: fn(LoadEvent<T>) -> ViewerEvent,
}

impl<T> EventSink<T> {
    pub fn new(proxy: EventLoopProxy<ViewerEvent>, wrap: fn(LoadEvent<T>) -> ViewerEvent) -> Self {
        Self { proxy, wrap }
    }
}

impl EventSink<EnvironmentData> {
    pub fn environment(proxy: EventLoopProxy<ViewerEvent>) -> Self {
        Self::new(proxy, ViewerEvent::Environment)
    }
}

impl EventSink<GltfAsset> {
    pub fn model(proxy: EventLoopProxy<ViewerEvent>) -> Self {
        Self::new(proxy, ViewerEvent::Model)
    }
}

impl<T> Clone for EventSink<T> {
    fn clone(&self) -> Self {
        Self {
            proxy: self.proxy.clone(),
            wrap: self.wrap,
        }
    }
}

impl<T> LoadSink<T> for EventSink<T> {
    fn emit(&self, event: LoadEvent<T>) {
        if self.proxy.send_event((self.wrap)(event)).is_err() {
            log::debug!("event loop closed; dropping load event");
        }
    }
}
