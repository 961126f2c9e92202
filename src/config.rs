//! Startup configuration
//!
//! Loaded once before any camera opens; never reloaded.
//!
//! Sources, later wins:
//! 1. Compiled defaults
//! 2. TOML file (`--config <path>`, else `./camrec.toml` if present)
//! 3. Environment variables (`CAMREC_*`)
//! 4. Command-line flags
//!
//! # Example Config
//!
//! ```toml
//! output_dir = "/srv/recordings"
//! frame_rate = 30
//! codec = "MJPG"
//! container = "avi"
//! warmup_ms = 2000
//! # font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"
//!
//! [resolution]
//! width = 1920
//! height = 1080
//!
//! [rotation]
//! enabled = true
//! interval_secs = 1800
//!
//! [[camera]]
//! label = 1
//! device = 0
//!
//! [[camera]]
//! label = 2
//! device = 2
//! ```

use crate::capture::traits::{CaptureHints, FourCc, Resolution};
use crate::recorder::writer::SegmentSpec;
use crate::utils::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local config file picked up when no `--config` is given
pub const LOCAL_CONFIG_FILE: &str = "camrec.toml";

/// One camera: label shown in overlays and paths, and its device index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEntry {
    pub label: u32,
    pub device: u32,
}

impl std::str::FromStr for CameraEntry {
    type Err = String;

    /// Parses `LABEL=DEVICE`, e.g. `1=0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, device) = s
            .split_once('=')
            .ok_or_else(|| format!("expected LABEL=DEVICE, got {s:?}"))?;
        let label = label
            .trim()
            .parse()
            .map_err(|_| format!("invalid camera label {label:?}"))?;
        let device = device
            .trim()
            .parse()
            .map_err(|_| format!("invalid device index {device:?}"))?;
        Ok(CameraEntry { label, device })
    }
}

/// Segment rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 1800,
        }
    }
}

impl RotationConfig {
    /// Interval after which a segment is rotated, if rotation is on
    pub fn interval(&self) -> Option<Duration> {
        self.enabled.then(|| Duration::from_secs(self.interval_secs))
    }
}

/// Complete recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    #[serde(rename = "camera")]
    pub cameras: Vec<CameraEntry>,
    pub resolution: Resolution,
    pub frame_rate: u32,
    pub codec: FourCc,
    /// Container file extension, identical for every segment
    pub container: String,
    pub output_dir: PathBuf,
    pub rotation: RotationConfig,
    /// Delay after opening each camera before frames are trusted
    pub warmup_ms: u64,
    /// TrueType font for overlays; the bundled font when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            cameras: vec![
                CameraEntry { label: 1, device: 0 },
                CameraEntry { label: 2, device: 2 },
            ],
            resolution: Resolution::new(1920, 1080),
            frame_rate: 30,
            codec: FourCc::MJPG,
            container: "avi".to_string(),
            output_dir: PathBuf::from("savedrecordings"),
            rotation: RotationConfig::default(),
            warmup_ms: 2000,
            font_path: None,
        }
    }
}

/// Per-camera view of the configuration, immutable after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    pub label: u32,
    pub device_index: u32,
    pub resolution: Resolution,
    pub frame_rate: u32,
    pub codec: FourCc,
}

impl CameraConfig {
    pub fn hints(&self) -> CaptureHints {
        CaptureHints {
            resolution: self.resolution,
            frame_rate: self.frame_rate,
            codec: self.codec,
        }
    }

    /// Segment parameters for what the device actually delivers
    pub fn segment_spec(&self, resolution: Resolution, frame_rate: u32) -> SegmentSpec {
        SegmentSpec {
            codec: self.codec,
            frame_rate,
            resolution,
        }
    }
}

impl RecorderConfig {
    /// Load defaults, then the config file if any, then env overrides.
    ///
    /// An explicit `config_path` must exist; the local file is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = Path::new(LOCAL_CONFIG_FILE);
                if local.exists() {
                    Self::from_file(local)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!("Loaded config file {}", path.display());
        Self::from_toml_str(&contents, path)
    }

    /// Parse config from TOML; missing keys keep their defaults
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `CAMREC_OUTPUT_DIR`, `CAMREC_ROTATION_SECS` and `CAMREC_WARMUP_MS`
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var("CAMREC_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(secs) = var("CAMREC_ROTATION_SECS") {
            self.rotation.interval_secs = secs.parse().map_err(|_| {
                ConfigError::Invalid(format!("CAMREC_ROTATION_SECS is not a number: {secs:?}"))
            })?;
        }
        if let Some(ms) = var("CAMREC_WARMUP_MS") {
            self.warmup_ms = ms.parse().map_err(|_| {
                ConfigError::Invalid(format!("CAMREC_WARMUP_MS is not a number: {ms:?}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cameras.is_empty() {
            return Err(ConfigError::Invalid("no cameras configured".to_string()));
        }
        let mut labels = BTreeSet::new();
        for camera in &self.cameras {
            if camera.label == 0 {
                return Err(ConfigError::Invalid("camera labels start at 1".to_string()));
            }
            if !labels.insert(camera.label) {
                return Err(ConfigError::Invalid(format!(
                    "camera label {} configured twice",
                    camera.label
                )));
            }
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "resolution {} is empty",
                self.resolution
            )));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame rate must be positive".to_string()));
        }
        if self.rotation.enabled && self.rotation.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "rotation interval must be at least one second".to_string(),
            ));
        }
        if self.container.is_empty() || self.container.contains(['/', '.']) {
            return Err(ConfigError::Invalid(format!(
                "container extension {:?} is not valid",
                self.container
            )));
        }
        Ok(())
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    /// Per-camera configs, ordered by label
    pub fn camera_configs(&self) -> Vec<CameraConfig> {
        let mut cameras: Vec<CameraConfig> = self
            .cameras
            .iter()
            .map(|entry| CameraConfig {
                label: entry.label,
                device_index: entry.device,
                resolution: self.resolution,
                frame_rate: self.frame_rate,
                codec: self.codec,
            })
            .collect();
        cameras.sort_by_key(|c| c.label);
        cameras
    }

    /// Serialize config to TOML string
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|e| format!("# serialization error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_two_camera_rig() {
        let config = RecorderConfig::default();
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[1], CameraEntry { label: 2, device: 2 });
        assert_eq!(config.resolution, Resolution::new(1920, 1080));
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.codec.as_str(), "MJPG");
        assert_eq!(config.rotation.interval(), Some(Duration::from_secs(1800)));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            output_dir = "/srv/rec"

            [rotation]
            interval_secs = 60

            [[camera]]
            label = 3
            device = 4
        "#;
        let config = RecorderConfig::from_toml_str(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/rec"));
        assert_eq!(config.rotation.interval_secs, 60);
        assert!(config.rotation.enabled);
        assert_eq!(config.cameras, vec![CameraEntry { label: 3, device: 4 }]);
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.font_path, None);
    }

    #[test]
    fn test_font_path_round_trips_through_toml() {
        let config = RecorderConfig::from_toml_str(
            "font_path = \"/opt/fonts/mono.ttf\"",
            Path::new("font.toml"),
        )
        .unwrap();
        assert_eq!(config.font_path, Some(PathBuf::from("/opt/fonts/mono.ttf")));
        assert!(config.to_toml().contains("font_path"));
        assert!(!RecorderConfig::default().to_toml().contains("font_path"));
    }

    #[test]
    fn test_bad_codec_is_parse_error() {
        let err = RecorderConfig::from_toml_str("codec = \"MJPEG\"", Path::new("x.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RecorderConfig::default();
        config
            .apply_env(|key| match key {
                "CAMREC_OUTPUT_DIR" => Some("/mnt/usb".to_string()),
                "CAMREC_ROTATION_SECS" => Some("5".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/mnt/usb"));
        assert_eq!(config.rotation.interval_secs, 5);
        assert_eq!(config.warmup_ms, 2000);

        let err = config
            .apply_env(|key| (key == "CAMREC_ROTATION_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_zero_interval() {
        let mut config = RecorderConfig::default();
        config.cameras.push(CameraEntry { label: 1, device: 5 });
        assert!(config.validate().is_err());

        let mut config = RecorderConfig::default();
        config.rotation.interval_secs = 0;
        assert!(config.validate().is_err());
        config.rotation.enabled = false;
        config.validate().unwrap();
    }

    #[test]
    fn test_camera_entry_from_str() {
        let entry: CameraEntry = "2=4".parse().unwrap();
        assert_eq!(entry, CameraEntry { label: 2, device: 4 });
        assert!("2".parse::<CameraEntry>().is_err());
        assert!("a=1".parse::<CameraEntry>().is_err());
    }

    #[test]
    fn test_camera_configs_sorted_by_label() {
        let mut config = RecorderConfig::default();
        config.cameras = vec![
            CameraEntry { label: 2, device: 2 },
            CameraEntry { label: 1, device: 0 },
        ];
        let labels: Vec<u32> = config.camera_configs().iter().map(|c| c.label).collect();
        assert_eq!(labels, vec![1, 2]);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let err = RecorderConfig::load(Some(Path::new("/nonexistent/camrec.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
