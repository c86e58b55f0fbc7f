mod events;
mod frame;
mod lifecycle;

pub use events::{EventSink, ViewerEvent};
pub use frame::{CancelToken, Frame, FrameClock, FrameLoop, FramePacer, MAX_FRAME_DELTA};
pub use lifecycle::{
    AssetPaths, GltfDecoder, HdrDecoder, StartedLoads, apply_load_event, attach_environment,
    attach_model, item_percent, start_loads,
};

pub use vantage_3d::{OutputEncoding, RenderSettings, ToneMapping};
pub use vantage_camera::{CameraSettings, ControlSettings};
pub use vantage_loader::{LoadingManager, ProgressUpdate};
pub use vantage_scene::Color;

use std::sync::Arc;

use thiserror::Error;
use winit::{dpi::PhysicalSize, event::WindowEvent, event_loop::EventLoopProxy, window::Window};

use wgpu::{
    CommandEncoderDescriptor, Device, ExperimentalFeatures, Features, Instance, Limits, MemoryHints,
    PowerPreference, Queue, RequestAdapterOptions, Surface, SurfaceConfiguration, SurfaceError,
    Texture, TextureFormat, TextureView, TextureViewDescriptor,
};

use vantage_3d::{
    EnvironmentData, EnvironmentMap, EnvironmentMapping, HDR_FORMAT, Model, Renderer3D,
    ViewerScene,
};
use vantage_camera::{FirstPersonControls, PerspectiveCamera, update_camera_buffer};
use vantage_gltf::GltfAsset;
use vantage_loader::LoadEvent;

pub type RcWindow = Arc<Window>;

#[derive(Error, Debug)]
pub enum GraphicsError {
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to get device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface is not supported by the adapter")]
    UnsupportedSurface,
}

/// Startup values for the scene, camera, controls and output.
#[derive(Debug, Clone)]
pub struct ViewerSettings {
    pub background: Color,
    pub camera: CameraSettings,
    pub controls: ControlSettings,
    pub render: RenderSettings,
}

pub const DEFAULT_BACKGROUND: u32 = 0xaaaaaa;

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            background: Color::from_hex(DEFAULT_BACKGROUND),
            camera: CameraSettings::default(),
            controls: ControlSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

/// Surface size for a window size. Surfaces cannot be zero sized, so a
/// minimised window keeps a 1x1 surface.
pub fn surface_extent(size: PhysicalSize<u32>) -> (u32, u32) {
    (size.width.max(1), size.height.max(1))
}

/// Offscreen HDR colour target the scene pass draws into.
pub struct Viewport {
    pub color: Texture,
    pub color_view: TextureView,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_hdr"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&TextureViewDescriptor::default());

        Self {
            color,
            color_view,
            width,
            height,
        }
    }

    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        *self = Viewport::new(device, width, height);
    }
}

/// Builds the scene, camera, surface and controls, then hands the result to
/// the event loop as a [`ViewerEvent`].
pub async fn create_graphics(
    window: RcWindow,
    settings: ViewerSettings,
    proxy: EventLoopProxy<ViewerEvent>,
) {
    let event = match init_graphics(window, settings).await {
        Ok(gfx) => ViewerEvent::GraphicsReady(Box::new(gfx)),
        Err(err) => ViewerEvent::GraphicsFailed(err),
    };
    if proxy.send_event(event).is_err() {
        log::warn!("event loop closed before graphics were ready");
    }
}

async fn init_graphics(
    window: RcWindow,
    settings: ViewerSettings,
) -> Result<Graphics, GraphicsError> {
    let scene = ViewerScene::new(settings.background);

    let (width, height) = surface_extent(window.inner_size());
    let camera = PerspectiveCamera::new(&settings.camera, width, height);

    let instance = Instance::default();
    let surface = instance.create_surface(Arc::clone(&window))?;

    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        })
        .await?;
    log::info!("using adapter {:?}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: Features::empty(),
            required_limits: Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
            memory_hints: MemoryHints::Performance,
            trace: Default::default(),
            experimental_features: ExperimentalFeatures::disabled(),
        })
        .await?;

    let mut surface_config = surface
        .get_default_config(&adapter, width, height)
        .ok_or(GraphicsError::UnsupportedSurface)?;
    let caps = surface.get_capabilities(&adapter);
    if let Some(format) = settings.render.pick_surface_format(&caps.formats) {
        surface_config.format = format;
    }
    surface.configure(&device, &surface_config);
    log::debug!(
        "surface {}x{} {:?}, tone mapping {:?}",
        width,
        height,
        surface_config.format,
        settings.render.tone_mapping
    );

    let viewport = Viewport::new(&device, width, height);
    let renderer = Renderer3D::new(
        &device,
        &queue,
        surface_config.format,
        viewport.width,
        viewport.height,
        &viewport.color_view,
        settings.render,
    );

    let controls = FirstPersonControls::new(settings.controls, &camera, width, height);
    update_camera_buffer(&queue, &renderer.camera_buf, &camera);

    Ok(Graphics {
        window,
        surface,
        surface_config,
        device,
        queue,
        viewport,
        renderer,
        camera,
        controls,
        scene,
    })
}

pub struct Graphics {
    window: RcWindow,
    pub viewport: Viewport,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    device: Device,
    queue: Queue,
    renderer: Renderer3D,
    camera: PerspectiveCamera,
    controls: FirstPersonControls,
    scene: ViewerScene,
}

impl Graphics {
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        (self.surface_config.width, self.surface_config.height) = surface_extent(new_size);
        self.surface.configure(&self.device, &self.surface_config);
        self.viewport
            .resize(&self.device, self.surface_config.width, self.surface_config.height);
        self.renderer.resize(
            &self.device,
            self.viewport.width,
            self.viewport.height,
            &self.viewport.color_view,
        );

        self.camera.set_viewport(self.viewport.width, self.viewport.height);
        self.controls.handle_resize(self.viewport.width, self.viewport.height);
        update_camera_buffer(&self.queue, &self.renderer.camera_buf, &self.camera);
    }

    /// Advances the controls by `dt`, renders the scene and lets `overlay`
    /// add its passes on top of the tone-mapped surface.
    ///
    /// Lost or outdated surfaces are reconfigured and the frame skipped; only
    /// running out of memory is returned as an error.
    pub fn draw<F>(&mut self, dt: f32, overlay: F) -> Result<(), SurfaceError>
    where
        F: FnOnce(&mut Self, &TextureView, &mut wgpu::CommandEncoder),
    {
        self.controls.update(&mut self.camera, dt);
        update_camera_buffer(&self.queue, &self.renderer.camera_buf, &self.camera);

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                return Ok(());
            }
            Err(SurfaceError::OutOfMemory) => return Err(SurfaceError::OutOfMemory),
            Err(err) => {
                log::warn!("skipping frame: {err}");
                return Ok(());
            }
        };

        let swap_view = frame.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        self.renderer.render(
            &self.queue,
            &mut encoder,
            &self.scene,
            &self.viewport.color_view,
            &swap_view,
        );
        overlay(self, &swap_view, &mut encoder);
        self.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        self.controls.handle_window_event(event);
    }

    pub fn handle_environment_event(
        &mut self,
        manager: &mut LoadingManager,
        event: LoadEvent<EnvironmentData>,
    ) -> ProgressUpdate {
        let (device, queue, layouts) = (&self.device, &self.queue, &self.renderer.layouts);
        let scene = &mut self.scene;
        apply_load_event(manager, event, |result| {
            let result = result.map(|mut data| {
                log::info!("environment decoded: {}x{}", data.width, data.height);
                data.mapping = EnvironmentMapping::EquirectangularReflection;
                EnvironmentMap::upload(device, queue, layouts, data)
            });
            attach_environment(scene, result)
        })
    }

    pub fn handle_model_event(
        &mut self,
        manager: &mut LoadingManager,
        event: LoadEvent<GltfAsset>,
    ) -> ProgressUpdate {
        if let LoadEvent::Progress { loaded, total, .. } = &event {
            if let Some(percent) = item_percent(*loaded, *total) {
                log::info!("model {percent:.0}% loaded");
            }
        }
        let (device, queue, layouts) = (&self.device, &self.queue, &self.renderer.layouts);
        let scene = &mut self.scene;
        apply_load_event(manager, event, |result| {
            let result = result.map(|asset| {
                log::info!(
                    "model decoded: {} meshes, {} triangles, {} scenes, {} cameras, {} animations",
                    asset.model.meshes.len(),
                    asset.model.triangle_count(),
                    asset.scene_count,
                    asset.camera_count,
                    asset.animation_count
                );
                Model::upload(device, queue, layouts, &asset.model)
            });
            attach_model(scene, result)
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn surface_config(&self) -> &SurfaceConfiguration {
        &self.surface_config
    }

    pub fn surface_format(&self) -> TextureFormat {
        self.surface_config.format
    }

    pub fn scene(&self) -> &ViewerScene {
        &self.scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_extent_follows_window_and_clamps_zero() {
        assert_eq!(surface_extent(PhysicalSize::new(1280, 720)), (1280, 720));
        assert_eq!(surface_extent(PhysicalSize::new(0, 480)), (1, 480));
        assert_eq!(surface_extent(PhysicalSize::new(640, 0)), (640, 1));
        assert_eq!(surface_extent(PhysicalSize::new(0, 0)), (1, 1));
    }

    #[test]
    fn camera_follows_resized_surface() {
        let (w, h) = surface_extent(PhysicalSize::new(1280, 720));
        let mut camera = PerspectiveCamera::new(&CameraSettings::default(), w, h);

        let (w, h) = surface_extent(PhysicalSize::new(800, 0));
        camera.set_viewport(w, h);
        assert_eq!((w, h), (800, 1));
        assert_eq!(camera.aspect, 800.0);
        let fov = CameraSettings::default().fov_y_deg.to_radians();
        let expected = glam::Mat4::perspective_rh(fov, 800.0, 0.01, 1000.0);
        assert_eq!(camera.projection_matrix(), expected);
    }
}
