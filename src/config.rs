use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Config file looked up in the working directory when `LEAFSCAN_CONFIG`
/// is not set.
pub const DEFAULT_CONFIG_FILE: &str = "leafscan.json";

// ---------------------------------------------------------------------------
// Application configuration
// ---------------------------------------------------------------------------

/// Startup settings. Every field has a default, so an empty `{}` is valid.
///
/// ```json
/// {
///   "model_path": "model/leaf_disease.onnx",
///   "camera_command": ["fswebcam", "--no-banner", "--jpeg", "90", "-"],
///   "window_size": [960.0, 720.0]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// ONNX classifier with a `[1, 256, 256, 3]` input and five outputs.
    pub model_path: PathBuf,
    /// Program and arguments that write one photo to stdout.
    pub camera_command: Vec<String>,
    pub window_size: [f32; 2],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model/leaf_disease.onnx"),
            camera_command: Vec::new(),
            window_size: [960.0, 720.0],
        }
    }
}

impl AppConfig {
    /// Defaults, then the config file (if any), then environment overrides.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var_os("LEAFSCAN_CONFIG").map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(
            std::env::var("LEAFSCAN_MODEL").ok(),
            std::env::var("LEAFSCAN_CAMERA").ok(),
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing config JSON")
    }

    /// `camera` is split on whitespace into program and arguments.
    fn apply_overrides(&mut self, model: Option<String>, camera: Option<String>) {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model_path = PathBuf::from(model);
        }
        if let Some(camera) = camera {
            self.camera_command = camera.split_whitespace().map(str::to_string).collect();
        }
    }
}
