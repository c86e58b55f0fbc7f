//! Viewer configuration read from an optional TOML file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vantage_runtime::{
    AssetPaths, CameraSettings, Color, ControlSettings, DEFAULT_BACKGROUND, OutputEncoding,
    RenderSettings, ToneMapping, ViewerSettings,
};

pub const CONFIG_FILE: &str = "vantage.toml";
pub const CONFIG_ENV: &str = "VANTAGE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub render: RenderConfig,
    pub assets: AssetsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// Logical size of a native window. The web canvas follows the page.
    pub width: u32,
    pub height: u32,
    /// Redraw cap; unset means one frame per display refresh.
    pub max_fps: Option<u32>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vantage".into(),
            width: 1280,
            height: 720,
            max_fps: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// sRGB background as `0xRRGGBB`.
    pub background: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub look_at: Option<[f32; 3]>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let camera = CameraSettings::default();
        Self {
            fov: camera.fov_y_deg,
            near: camera.near,
            far: camera.far,
            position: camera.position.to_array(),
            look_at: camera.look_at.map(|p| p.to_array()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub movement_speed: f32,
    pub look_speed: f32,
    pub look_vertical: bool,
    pub active_look: bool,
    pub auto_forward: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        let controls = ControlSettings::default();
        Self {
            movement_speed: controls.movement_speed,
            look_speed: controls.look_speed,
            look_vertical: controls.look_vertical,
            active_look: controls.active_look,
            auto_forward: controls.auto_forward,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMappingConfig {
    None,
    Linear,
    #[default]
    AcesFilmic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingConfig {
    Linear,
    #[default]
    Srgb,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub tone_mapping: ToneMappingConfig,
    pub exposure: f32,
    pub output_encoding: EncodingConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tone_mapping: ToneMappingConfig::default(),
            exposure: RenderSettings::default().exposure,
            output_encoding: EncodingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub root: String,
    pub environment: String,
    pub model: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        let paths = AssetPaths::default();
        Self {
            root: paths.root,
            environment: paths.environment,
            model: paths.model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn,vantage=info".into(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reads `path`. A missing file is `Ok(None)`.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml_str(&text).map(Some).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `$VANTAGE_CONFIG`, or `vantage.toml` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    pub fn viewer_settings(&self) -> ViewerSettings {
        let position = self.camera.position.into();
        ViewerSettings {
            background: Color::from_hex(self.scene.background),
            camera: CameraSettings {
                fov_y_deg: self.camera.fov,
                near: self.camera.near,
                far: self.camera.far,
                position,
                look_at: self.camera.look_at.map(Into::into),
            },
            controls: ControlSettings {
                movement_speed: self.controls.movement_speed,
                look_speed: self.controls.look_speed,
                look_vertical: self.controls.look_vertical,
                active_look: self.controls.active_look,
                auto_forward: self.controls.auto_forward,
            },
            render: RenderSettings {
                tone_mapping: match self.render.tone_mapping {
                    ToneMappingConfig::None => ToneMapping::None,
                    ToneMappingConfig::Linear => ToneMapping::Linear,
                    ToneMappingConfig::AcesFilmic => ToneMapping::AcesFilmic,
                },
                exposure: self.render.exposure,
                output_encoding: match self.render.output_encoding {
                    EncodingConfig::Linear => OutputEncoding::Linear,
                    EncodingConfig::Srgb => OutputEncoding::Srgb,
                },
            },
        }
    }

    pub fn asset_paths(&self) -> AssetPaths {
        AssetPaths {
            root: self.assets.root.clone(),
            environment: self.assets.environment.clone(),
            model: self.assets.model.clone(),
        }
    }
}
