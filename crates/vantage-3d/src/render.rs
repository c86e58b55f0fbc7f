use crate::depth::create_depth;
use crate::environment::EnvironmentMap;
use crate::model::Model;
use crate::pipeline::{Layouts, create_bind_group_layouts, create_pipeline};
use crate::tonemap::{HDR_FORMAT, RenderSettings, ToneMapPass, background_clear};
use vantage_scene::Scene;
use wgpu::*;

pub type ViewerScene = Scene<Model, EnvironmentMap>;

pub struct Renderer3D {
    pub render_pipeline: RenderPipeline,
    pub depth_view: TextureView,
    pub depth_tex: Texture,
    pub camera_bg: BindGroup,
    pub camera_buf: Buffer,
    pub layouts: Layouts,
    fallback_env: EnvironmentMap,
    tonemap: ToneMapPass,
}

impl Renderer3D {
    pub fn new(
        device: &Device,
        queue: &Queue,
        surface_format: TextureFormat,
        width: u32,
        height: u32,
        hdr_view: &TextureView,
        settings: RenderSettings,
    ) -> Self {
        let layouts = create_bind_group_layouts(device);
        let (depth_view, depth_tex) = create_depth(device, width, height);
        let (render_pipeline, camera_bg, camera_buf) =
            create_pipeline(device, HDR_FORMAT, &layouts);
        let fallback_env = EnvironmentMap::placeholder(device, queue, &layouts);
        let tonemap = ToneMapPass::new(device, surface_format, hdr_view, &settings);

        Self {
            render_pipeline,
            depth_view,
            depth_tex,
            camera_bg,
            camera_buf,
            layouts,
            fallback_env,
            tonemap,
        }
    }

    pub fn resize(&mut self, device: &Device, width: u32, height: u32, hdr_view: &TextureView) {
        let (dv, dt) = create_depth(device, width, height);
        self.depth_view = dv;
        self.depth_tex = dt;
        self.tonemap.rebind(device, hdr_view);
    }

    /// Draws whatever the scene currently holds into `hdr_view`, then tone
    /// maps it into `target_view`. Missing models or environment are fine.
    pub fn render(
        &self,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        scene: &ViewerScene,
        hdr_view: &TextureView,
        target_view: &TextureView,
    ) {
        for instance in scene.models() {
            instance.model.write_transform(queue, instance.transform);
        }
        let env = scene.environment().map(|e| e.as_ref()).unwrap_or(&self.fallback_env);

        {
            let mut r_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: hdr_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(background_clear(scene.background().to_linear())),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            r_pass.set_pipeline(&self.render_pipeline);
            r_pass.set_bind_group(0, &self.camera_bg, &[]);
            r_pass.set_bind_group(3, &env.bind_group, &[]);

            for instance in scene.models() {
                let model = &instance.model;
                r_pass.set_bind_group(1, &model.xform_bg, &[]);
                for mesh in &model.meshes {
                    r_pass.set_bind_group(2, &model.material_for(mesh).bind_group, &[]);
                    r_pass.set_vertex_buffer(0, mesh.vbuf.slice(..));
                    r_pass.set_index_buffer(mesh.ibuf.slice(..), IndexFormat::Uint32);
                    r_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }

        self.tonemap.render(encoder, target_view);
    }
}
