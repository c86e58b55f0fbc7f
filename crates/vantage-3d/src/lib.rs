pub mod data;
pub mod depth;
pub mod environment;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod tonemap;

pub use data::{EnvironmentData, EnvironmentMapping, MaterialData, MeshData, ModelData, TextureData};
pub use depth::{DEPTH_FORMAT, create_depth};
pub use environment::EnvironmentMap;
pub use model::{GpuMesh, Material, Model, Vertex, create_model_ubo};
pub use pipeline::{CameraUniform, Layouts, create_bind_group_layouts, create_pipeline};
pub use render::{Renderer3D, ViewerScene};
pub use tonemap::{HDR_FORMAT, OutputEncoding, RenderSettings, ToneMapPass, ToneMapping};
