use glam::Mat4;
use std::sync::Arc;
use vantage_3d::EnvironmentData;
use vantage_gltf::{GltfAsset, decode_gltf, external_refs};
use vantage_hdr::decode_hdr;
use vantage_loader::{
    AssetSource, Decode, Dependency, LoadError, LoadEvent, LoadId, LoadSink, LoadingManager,
    MaybeSend, ProgressUpdate, Resources, spawn_load,
};
use vantage_scene::Scene;

/// Where the two viewer assets come from.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPaths {
    /// Directory natively, base URL on the web.
    pub root: String,
    pub environment: String,
    pub model: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            root: "assets".into(),
            environment: "MR_INT-006_LoftIndustrialWindow_Griffintown.hdr".into(),
            model: "mars_one_mission_-_base/scene.gltf".into(),
        }
    }
}

impl AssetPaths {
    pub fn source(&self) -> AssetSource {
        AssetSource::new(self.root.as_str())
    }
}

/// Radiance `.hdr` environments.
#[derive(Debug, Clone, Copy, Default)]
pub struct HdrDecoder;

impl Decode for HdrDecoder {
    type Output = EnvironmentData;

    fn decode(&self, bytes: Vec<u8>, _: Resources) -> anyhow::Result<EnvironmentData> {
        decode_hdr(&bytes)
    }
}

/// glTF models. External buffers and images are fetched through the same
/// source as the model, next to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfDecoder;

impl Decode for GltfDecoder {
    type Output = GltfAsset;

    fn dependencies(&self, bytes: &[u8]) -> anyhow::Result<Vec<Dependency>> {
        let refs = external_refs(bytes)?;
        Ok(refs
            .into_iter()
            .map(|r| Dependency {
                uri: r.uri,
                size_hint: r.byte_length,
            })
            .collect())
    }

    fn decode(&self, bytes: Vec<u8>, resources: Resources) -> anyhow::Result<GltfAsset> {
        decode_gltf(&bytes, &resources)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedLoads {
    pub environment: LoadId,
    pub model: LoadId,
}

/// Registers both loads with the tracker, then starts them. Neither waits on
/// the other.
pub fn start_loads<E, M>(
    manager: &mut LoadingManager,
    assets: &AssetPaths,
    environment_sink: E,
    model_sink: M,
) -> StartedLoads
where
    E: LoadSink<EnvironmentData> + Clone + MaybeSend + 'static,
    M: LoadSink<GltfAsset> + Clone + MaybeSend + 'static,
{
    let started = StartedLoads {
        environment: manager.register(assets.environment.as_str()),
        model: manager.register(assets.model.as_str()),
    };
    log::info!(
        "loading environment {} and model {} from {}",
        assets.environment,
        assets.model,
        assets.root
    );

    spawn_load(
        started.environment,
        assets.environment.clone(),
        assets.source(),
        environment_sink,
        HdrDecoder,
    );
    spawn_load(
        started.model,
        assets.model.clone(),
        assets.source(),
        model_sink,
        GltfDecoder,
    );
    started
}

/// Feeds one load event into the tracker. A finished result goes to `attach`,
/// which reports whether it succeeded.
pub fn apply_load_event<T>(
    manager: &mut LoadingManager,
    event: LoadEvent<T>,
    attach: impl FnOnce(Result<T, LoadError>) -> bool,
) -> ProgressUpdate {
    let update = match event {
        LoadEvent::Progress { id, loaded, total } => manager.on_progress(id, loaded, total),
        LoadEvent::Finished { id, result } => {
            let succeeded = attach(result);
            manager.on_finished(id, succeeded)
        }
    };
    if update.completed {
        log::info!(
            "all assets settled: {} of {} loaded",
            manager.items_total() - manager.items_failed(),
            manager.items_total()
        );
    }
    update
}

/// Percentage of a single item, when its size is known.
pub fn item_percent(loaded: u64, total: Option<u64>) -> Option<f32> {
    total
        .filter(|t| *t > 0)
        .map(|t| (loaded.min(t) as f64 / t as f64 * 100.0) as f32)
}

/// Adds a loaded model as one new child of the scene. Failures are logged
/// and leave the scene as it was.
pub fn attach_model<M, E>(scene: &mut Scene<M, E>, result: Result<M, LoadError>) -> bool {
    match result {
        Ok(model) => {
            scene.add_model(Arc::new(model), Mat4::IDENTITY);
            true
        }
        Err(err) => {
            log::error!("model failed to load: {err}");
            false
        }
    }
}

/// Sets the scene environment. A failure keeps the plain background.
pub fn attach_environment<M, E>(scene: &mut Scene<M, E>, result: Result<E, LoadError>) -> bool {
    match result {
        Ok(environment) => {
            scene.set_environment(Arc::new(environment));
            true
        }
        Err(err) => {
            log::warn!("environment failed to load, keeping background colour: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_scene::Color;

    type TestScene = Scene<&'static str, u32>;

    fn scene() -> TestScene {
        Scene::new(Color::from_hex(0xaaaaaa))
    }

    fn not_found(url: &str) -> LoadError {
        LoadError::NotFound(url.into())
    }

    #[test]
    fn model_success_adds_exactly_one_child() {
        let mut scene = scene();
        assert!(attach_model(&mut scene, Ok("mars base")));
        assert_eq!(scene.child_count(), 1);
        assert_eq!(*scene.models()[0].model, "mars base");
    }

    #[test]
    fn model_failure_leaves_scene_unchanged() {
        let mut scene = scene();
        attach_model(&mut scene, Ok("first"));
        assert!(!attach_model(&mut scene, Err(not_found("scene.gltf"))));
        assert_eq!(scene.child_count(), 1);
        assert!(scene.environment().is_none());
    }

    #[test]
    fn environment_failure_is_not_fatal() {
        let mut scene = scene();
        assert!(!attach_environment(&mut scene, Err(not_found("env.hdr"))));
        assert!(scene.environment().is_none());
        assert!(attach_environment(&mut scene, Ok(7)));
        assert_eq!(scene.environment().map(|e| **e), Some(7));
        assert_eq!(scene.child_count(), 0);
    }

    #[test]
    fn completion_waits_for_both_loads_in_any_order() {
        let mut manager = LoadingManager::new();
        let env = manager.register("env.hdr");
        let model = manager.register("scene.gltf");
        let mut scene = scene();

        let progress = LoadEvent::<&'static str>::Progress {
            id: model,
            loaded: 40,
            total: Some(100),
        };
        let up = apply_load_event(&mut manager, progress, |_| unreachable!());
        assert_eq!(up.percent, 40.0);

        let finished = LoadEvent::Finished {
            id: model,
            result: Err(not_found("scene.gltf")),
        };
        let up = apply_load_event(&mut manager, finished, |r| attach_model(&mut scene, r));
        assert!(!up.completed);
        assert_eq!(scene.child_count(), 0);

        let finished = LoadEvent::Finished { id: env, result: Ok(1u32) };
        let up = apply_load_event(&mut manager, finished, |r| attach_environment(&mut scene, r));
        assert!(up.completed);
        assert_eq!(up.percent, 100.0);
        assert!(scene.environment().is_some());
    }

    #[test]
    fn item_percent_needs_a_total() {
        assert_eq!(item_percent(5, None), None);
        assert_eq!(item_percent(5, Some(0)), None);
        assert_eq!(item_percent(25, Some(100)), Some(25.0));
        assert_eq!(item_percent(200, Some(100)), Some(100.0));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn start_loads_registers_both_and_reports_each() {
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("env.hdr"), b"not an hdr").unwrap();
        let assets = AssetPaths {
            root: dir.path().to_string_lossy().into_owned(),
            environment: "env.hdr".into(),
            model: "missing/scene.gltf".into(),
        };

        let mut manager = LoadingManager::new();
        let (env_tx, env_rx) = mpsc::channel();
        let (model_tx, model_rx) = mpsc::channel();
        let started = start_loads(&mut manager, &assets, env_tx, model_tx);
        assert_eq!(manager.items_total(), 2);
        assert_ne!(started.environment, started.model);

        let mut scene = scene();
        loop {
            let event = env_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            let done = matches!(event, LoadEvent::Finished { .. });
            apply_load_event(&mut manager, event, |r| {
                assert!(matches!(r, Err(LoadError::Decode { .. })));
                false
            });
            if done {
                break;
            }
        }
        let event = model_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let up = apply_load_event(&mut manager, event, |r| {
            assert!(matches!(r, Err(LoadError::NotFound(_))));
            attach_model(&mut scene, r.map(|_| "unused"))
        });
        assert!(up.completed);
        assert_eq!(scene.child_count(), 0);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn model_buffers_load_through_the_tracker() {
        use std::sync::mpsc;
        use std::time::Duration;

        // one triangle at the start of a 1 MiB buffer
        const BIN_LEN: usize = 1024 * 1024;
        let mut bin = Vec::with_capacity(BIN_LEN);
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin.resize(BIN_LEN, 0);

        let gltf = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }}] }}],
  "buffers": [{{ "byteLength": {BIN_LEN}, "uri": "scene.bin" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#
        );

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("m")).unwrap();
        std::fs::write(dir.path().join("m/scene.gltf"), &gltf).unwrap();
        std::fs::write(dir.path().join("m/scene.bin"), &bin).unwrap();
        let assets = AssetPaths {
            root: dir.path().to_string_lossy().into_owned(),
            environment: "missing.hdr".into(),
            model: "m/scene.gltf".into(),
        };

        let mut manager = LoadingManager::new();
        let (env_tx, _env_rx) = mpsc::channel();
        let (model_tx, model_rx) = mpsc::channel();
        let started = start_loads(&mut manager, &assets, env_tx, model_tx);

        let mut largest_total = 0;
        let mut scene = Scene::<GltfAsset, u32>::new(Color::from_hex(0xaaaaaa));
        loop {
            let event = model_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(event.id(), started.model);
            if let LoadEvent::Progress { total: Some(total), .. } = &event {
                largest_total = largest_total.max(*total);
            }
            let done = matches!(event, LoadEvent::Finished { .. });
            apply_load_event(&mut manager, event, |r| attach_model(&mut scene, r));
            if done {
                break;
            }
        }

        assert_eq!(largest_total, (gltf.len() + BIN_LEN) as u64);
        assert_eq!(scene.child_count(), 1);
        assert_eq!(scene.models()[0].model.model.triangle_count(), 1);
        assert_eq!(manager.items_failed(), 0);
    }
}
