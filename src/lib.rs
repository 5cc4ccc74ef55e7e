pub mod capture;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod sync;

use std::path::{Path, PathBuf};
use std::time::Duration;

use arc_swap::ArcSwap;
use capture::{DepthTreatment, ImageType, Resolution};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use error::{CaptureError, Result, StorageError};
use pipeline::{ColorSync, DepthSync};
use storage::DatasetLayout;

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// Environment variable prefix for overrides, e.g. `RGBD_SYNC__INTERVAL_MS=100`
const ENV_PREFIX: &str = "RGBD";

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub sync: SyncConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub color: ColorStreamConfig,
    pub depth: DepthStreamConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStreamConfig {
    pub image_type: ImageType,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthStreamConfig {
    pub resolution: Resolution,
    pub near_mode: bool,
    pub treatment: DepthTreatment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Minimum spacing between issued timestamps
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub root: PathBuf,
    pub color_dir: String,
    pub depth_dir: String,
    /// Color directory named in association records
    pub association_color_dir: String,
    pub associations: String,
    pub depth_log: String,
    pub rgb_timestamps: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tick of each stream's polling loop
    pub poll_interval_ms: u64,
}

impl Default for ColorStreamConfig {
    fn default() -> Self {
        Self {
            image_type: ImageType::Color,
            resolution: Resolution::Res1280x960,
        }
    }
}

impl Default for DepthStreamConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::Res640x480,
            near_mode: false,
            treatment: DepthTreatment::ClampUnreliable,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { interval_ms: 200 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        let layout = DatasetLayout::new(".");
        Self {
            root: layout.root,
            color_dir: layout.color_dir,
            depth_dir: layout.depth_dir,
            association_color_dir: layout.association_color_dir,
            associations: layout.associations,
            depth_log: layout.depth_log,
            rgb_timestamps: layout.rgb_timestamps,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // 30fps sensor, polled twice per frame period
            poll_interval_ms: 15,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl OutputConfig {
    pub fn layout(&self) -> DatasetLayout {
        DatasetLayout {
            root: self.root.clone(),
            color_dir: self.color_dir.clone(),
            depth_dir: self.depth_dir.clone(),
            association_color_dir: self.association_color_dir.clone(),
            associations: self.associations.clone(),
            depth_log: self.depth_log.clone(),
            rgb_timestamps: self.rgb_timestamps.clone(),
        }
    }
}

impl Config {
    /// Layer compiled defaults, an optional TOML file and `RGBD_*`
    /// environment variables, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(CaptureError::InvalidConfig(msg)) };

        if self.sync.interval_ms == 0 {
            return invalid("sync.interval_ms must be positive".into());
        }
        if self.pipeline.poll_interval_ms == 0 {
            return invalid("pipeline.poll_interval_ms must be positive".into());
        }
        let color = &self.capture.color;
        if !ColorSync::supports_image_type(color.image_type) {
            return invalid(format!("{:?} is not a color image type", color.image_type));
        }
        if !ColorSync::supports_resolution(color.resolution) {
            return invalid(format!("color stream does not support {:?}", color.resolution));
        }
        if !DepthSync::supports_resolution(self.capture.depth.resolution) {
            return invalid(format!(
                "depth stream does not support {:?}",
                self.capture.depth.resolution
            ));
        }
        let output = &self.output;
        if output.color_dir.is_empty()
            || output.depth_dir.is_empty()
            || output.association_color_dir.is_empty()
        {
            return invalid("output directories must be named".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Environment overrides are process-wide; loads must not interleave
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.sync.interval(), Duration::from_millis(200));
        assert_eq!(config.capture.color.resolution, Resolution::Res1280x960);
        assert_eq!(config.output.layout(), DatasetLayout::new("."));
    }

    #[test]
    fn test_load_without_file_matches_defaults() {
        let _env = ENV_LOCK.lock().expect("env lock");
        let config = Config::load(None).expect("load should succeed");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_toml_overrides() {
        let _env = ENV_LOCK.lock().expect("env lock");
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        writeln!(
            file,
            r#"
[sync]
interval_ms = 100

[capture.color]
image_type = "RawBayer"
resolution = "640x480"

[capture.depth]
near_mode = true
treatment = "ZeroUnreliable"
"#
        )
        .expect("write config");

        let config = Config::load(Some(file.path())).expect("load should succeed");
        assert_eq!(config.sync.interval_ms, 100);
        assert_eq!(config.capture.color.image_type, ImageType::RawBayer);
        assert_eq!(config.capture.color.resolution, Resolution::Res640x480);
        assert!(config.capture.depth.near_mode);
        assert_eq!(config.capture.depth.treatment, DepthTreatment::ZeroUnreliable);
        assert_eq!(config.capture.depth.resolution, Resolution::Res640x480);
    }

    #[test]
    fn test_env_overrides_use_single_underscore_prefix() {
        let _env = ENV_LOCK.lock().expect("env lock");
        std::env::set_var("RGBD_SYNC__INTERVAL_MS", "100");
        std::env::set_var("RGBD_OUTPUT__ASSOCIATION_COLOR_DIR", "color");
        let loaded = Config::load(None);
        std::env::remove_var("RGBD_SYNC__INTERVAL_MS");
        std::env::remove_var("RGBD_OUTPUT__ASSOCIATION_COLOR_DIR");

        let config = loaded.expect("load should succeed");
        assert_eq!(config.sync.interval_ms, 100);
        assert_eq!(config.output.association_color_dir, "color");
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_unsupported_color_resolution_rejected() {
        let mut config = Config::default();
        config.capture.color.resolution = Resolution::Res80x60;
        assert!(matches!(
            config.validate(),
            Err(CaptureError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.sync.interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
