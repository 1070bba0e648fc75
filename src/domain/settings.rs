use crate::domain::filter::{DEFAULT_ALPHA, DEFAULT_DEADZONE};
use crate::domain::imu::DEFAULT_CALIBRATION_SAMPLES;
use crate::domain::integrator::DEFAULT_SENSITIVITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "airmouse".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Tuning of the motion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// EMA coefficient, higher = less lag, more noise
    pub alpha: f32,
    /// deg/s below which an axis is forced to zero
    pub deadzone: f32,
    /// Negative inverts the axis direction
    pub sensitivity: f32,
    pub calibration_samples: u32,
    pub calibration_settle_ms: u64,
    /// ~60Hz
    pub update_interval_ms: u64,
    pub yield_interval_ms: u64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            deadzone: DEFAULT_DEADZONE,
            sensitivity: DEFAULT_SENSITIVITY,
            calibration_samples: DEFAULT_CALIBRATION_SAMPLES,
            calibration_settle_ms: 5,
            update_interval_ms: 16,
            yield_interval_ms: 1,
        }
    }
}

impl MotionSettings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.yield_interval_ms)
    }

    pub fn calibration_settle(&self) -> Duration {
        Duration::from_millis(self.calibration_settle_ms)
    }
}

/// Identity advertised by the HID service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub name: String,
    pub manufacturer: String,
    pub battery_level: u8,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: "Air Mouse".to_string(),
            manufacturer: "Espressif".to_string(),
            battery_level: 90,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub motion: MotionSettings,

    #[serde(default)]
    pub device: DeviceSettings,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Settings {
    /// Silently pull out-of-range values back into range
    pub fn sanitized(mut self) -> Self {
        let m = &mut self.motion;

        // alpha must lie in (0, 1)
        if !(m.alpha > 0.0 && m.alpha < 1.0) {
            warn!("alpha {} out of range, using {}", m.alpha, DEFAULT_ALPHA);
            m.alpha = DEFAULT_ALPHA;
        }
        if m.deadzone.is_nan() || m.deadzone < 0.0 {
            m.deadzone = 0.0;
        }
        if !m.sensitivity.is_finite() {
            m.sensitivity = DEFAULT_SENSITIVITY;
        }
        m.calibration_samples = m.calibration_samples.max(1);
        m.update_interval_ms = m.update_interval_ms.max(1);
        m.yield_interval_ms = m.yield_interval_ms.max(1);

        self.device.battery_level = self.device.battery_level.min(100);
        self
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load from an explicit file, falling back to defaults
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings: settings.sanitized(),
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("AirMouse");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
