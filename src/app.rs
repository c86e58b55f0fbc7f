use crate::config::Config;
use crate::overlay::ProgressOverlay;
use vantage_runtime::{
    EventSink, FrameLoop, FramePacer, Graphics, LoadingManager, ProgressUpdate, RcWindow,
    ViewerEvent, create_graphics, start_loads,
};
use web_time::Instant;
use winit::{
    application::ApplicationHandler,
    event::{StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

enum State {
    Init(Option<EventLoopProxy<ViewerEvent>>),
    Ready(Box<ReadyState>),
    Stopped,
}

struct ReadyState {
    gfx: Box<Graphics>,
    /// Dropped for good once every load has settled.
    overlay: Option<ProgressOverlay>,
}

pub struct App {
    state: State,
    config: Config,
    proxy: EventLoopProxy<ViewerEvent>,
    loads: LoadingManager,
    frames: FrameLoop,
    pacer: FramePacer,
}

impl App {
    pub fn new(event_loop: &EventLoop<ViewerEvent>, config: Config) -> Self {
        let frames = FrameLoop::new();
        let loads = LoadingManager::new();
        let pacer = FramePacer::new(config.window.max_fps);
        Self {
            state: State::Init(Some(event_loop.create_proxy())),
            proxy: event_loop.create_proxy(),
            config,
            loads,
            frames,
            pacer,
        }
    }

    fn window_attributes(&self) -> winit::window::WindowAttributes {
        let attrs = Window::default_attributes().with_title(self.config.window.title.as_str());

        #[cfg(not(target_arch = "wasm32"))]
        let attrs = attrs.with_inner_size(winit::dpi::LogicalSize::new(
            self.config.window.width,
            self.config.window.height,
        ));

        #[cfg(target_arch = "wasm32")]
        let attrs = {
            use winit::platform::web::WindowAttributesExtWebSys;
            attrs.with_append(true)
        };

        attrs
    }

    fn graphics_ready(&mut self, gfx: Box<Graphics>) {
        let overlay = ProgressOverlay::new(&gfx);

        let assets = self.config.asset_paths();
        let started = start_loads(
            &mut self.loads,
            &assets,
            EventSink::environment(self.proxy.clone()),
            EventSink::model(self.proxy.clone()),
        );
        log::debug!("started loads {started:?}");

        gfx.request_redraw();
        self.state = State::Ready(Box::new(ReadyState {
            gfx,
            overlay: Some(overlay),
        }));
    }

    fn progressed(ready: &mut ReadyState, update: ProgressUpdate) {
        if update.completed {
            log::info!("loading finished, scene has {} models", ready.gfx.scene().child_count());
            ready.overlay = None;
        }
    }

    /// Cancels the frame loop and leaves the event loop right away, without
    /// waiting for another redraw.
    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        let frames = self.frames.stop();
        log::info!("render loop stopped after {frames} frames");
        self.state = State::Stopped;
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(frame) = self.frames.begin_frame() else {
            self.stop(event_loop);
            return;
        };
        let State::Ready(ready) = &mut self.state else {
            return;
        };
        let ReadyState { gfx, overlay } = ready.as_mut();

        let percent = self.loads.percent();
        let prepared = overlay.as_mut().map(|o| o.prepare(gfx.window(), percent));
        let result = gfx.draw(frame.dt, |gfx, target, encoder| {
            if let (Some(overlay), Some(prepared)) = (overlay.as_mut(), prepared) {
                overlay.paint(gfx, target, encoder, prepared);
            }
        });

        if let Err(err) = result {
            log::error!("cannot render any more frames: {err}");
            self.stop(event_loop);
            return;
        }
        if self.pacer.after_frame(Instant::now()) {
            gfx.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let State::Init(proxy) = &mut self.state {
            if let Some(proxy) = proxy.take() {
                let window: RcWindow = match event_loop.create_window(self.window_attributes()) {
                    Ok(window) => std::sync::Arc::new(window),
                    Err(err) => {
                        log::error!("failed to create window: {err}");
                        self.state = State::Stopped;
                        event_loop.exit();
                        return;
                    }
                };
                let settings = self.config.viewer_settings();

                #[cfg(not(target_arch = "wasm32"))]
                pollster::block_on(create_graphics(window, settings, proxy));

                #[cfg(target_arch = "wasm32")]
                {
                    fill_page(&window);
                    wasm_bindgen_futures::spawn_local(create_graphics(window, settings, proxy));
                }
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::GraphicsReady(gfx) => self.graphics_ready(gfx),
            ViewerEvent::GraphicsFailed(err) => {
                log::error!("graphics initialisation failed: {err}");
                self.state = State::Stopped;
                event_loop.exit();
            }
            ViewerEvent::Environment(load) => {
                if let State::Ready(ready) = &mut self.state {
                    let update = ready.gfx.handle_environment_event(&mut self.loads, load);
                    Self::progressed(ready, update);
                }
            }
            ViewerEvent::Model(load) => {
                if let State::Ready(ready) = &mut self.state {
                    let update = ready.gfx.handle_model_event(&mut self.loads, load);
                    Self::progressed(ready, update);
                }
            }
        }
    }

    fn new_events(&mut self, _event_loop: &ActiveEventLoop, _cause: StartCause) {
        if self.pacer.poll(Instant::now()) {
            if let State::Ready(ready) = &self.state {
                ready.gfx.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::Resized(size) => {
                if let State::Ready(ready) = &mut self.state {
                    ready.gfx.resize(size);
                    ready.gfx.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::CloseRequested => self.stop(event_loop),
            other => {
                if let State::Ready(ready) = &mut self.state {
                    let consumed = match ready.overlay.as_mut() {
                        Some(overlay) => {
                            overlay.on_window_event(ready.gfx.window(), &other).consumed
                        }
                        None => false,
                    };
                    if !consumed {
                        ready.gfx.handle_window_event(&other);
                    }
                }
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(self.pacer.control_flow());
    }
}

/// Stretches the appended canvas over the page so browser resizes reach the
/// viewer as `Resized` events.
#[cfg(target_arch = "wasm32")]
fn fill_page(window: &Window) {
    use winit::platform::web::WindowExtWebSys;

    let Some(canvas) = window.canvas() else {
        return;
    };
    let style = canvas.style();
    for (property, value) in [("display", "block"), ("width", "100%"), ("height", "100%")] {
        if let Err(err) = style.set_property(property, value) {
            log::warn!("could not style canvas: {err:?}");
        }
    }
}
