use vantage_runtime::Graphics;
use winit::{event::WindowEvent, window::Window};

/// egui output for one frame, produced before the GPU work starts.
pub struct PreparedOverlay {
    textures_delta: egui::TexturesDelta,
    paint_jobs: Vec<egui::ClippedPrimitive>,
    pixels_per_point: f32,
}

/// Centred loading bar drawn over the tone-mapped frame.
pub struct ProgressOverlay {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl ProgressOverlay {
    pub fn new(gfx: &Graphics) -> Self {
        let ctx = egui::Context::default();
        let viewport_id = ctx.viewport_id();
        let state =
            egui_winit::State::new(ctx.clone(), viewport_id, gfx.window(), None, None, None);
        let renderer = egui_wgpu::Renderer::new(
            gfx.device(),
            gfx.surface_format(),
            egui_wgpu::RendererOptions::default(),
        );
        Self { ctx, state, renderer }
    }

    pub fn on_window_event(
        &mut self,
        window: &Window,
        event: &WindowEvent,
    ) -> egui_winit::EventResponse {
        self.state.on_window_event(window, event)
    }

    pub fn prepare(&mut self, window: &Window, percent: f32) -> PreparedOverlay {
        let raw_input = self.state.take_egui_input(window);
        let full_output = self.ctx.run(raw_input, |ctx| {
            egui::Area::new(egui::Id::new("load_progress"))
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .interactable(false)
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.set_width(320.0);
                        ui.label("Loading assets");
                        ui.add(egui::ProgressBar::new(percent / 100.0).show_percentage());
                    });
                });
        });

        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = full_output;
        self.state.handle_platform_output(window, platform_output);
        let paint_jobs = self.ctx.tessellate(shapes, pixels_per_point);

        PreparedOverlay {
            textures_delta,
            paint_jobs,
            pixels_per_point,
        }
    }

    pub fn paint(
        &mut self,
        gfx: &Graphics,
        target: &wgpu::TextureView,
        encoder: &mut wgpu::CommandEncoder,
        prepared: PreparedOverlay,
    ) {
        let PreparedOverlay {
            textures_delta,
            paint_jobs,
            pixels_per_point,
        } = prepared;

        for (id, image_delta) in &textures_delta.set {
            self.renderer
                .update_texture(gfx.device(), gfx.queue(), *id, image_delta);
        }

        let (width, height) = gfx.viewport_size();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point,
        };
        self.renderer.update_buffers(
            gfx.device(),
            gfx.queue(),
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        let rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("progress_overlay_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let mut rpass = rpass.forget_lifetime();
        self.renderer
            .render(&mut rpass, &paint_jobs, &screen_descriptor);
        drop(rpass);

        for id in &textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
