//! Configuration loading using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. built-in defaults (a BMX160 at 128 Hz, 128-sample windows, int8 model input)
//! 2. `config/imu_daq.toml` (or an explicit path)
//! 3. environment variables prefixed with `IMU_DAQ_`, sections split on `__`
//!
//! # Example
//! ```no_run
//! use imu_daq::config::DaqConfig;
//!
//! let config = DaqConfig::load()?;
//! config.validate()?;
//! println!("window: {} samples", config.window.samples);
//! # Ok::<(), imu_daq::error::DaqError>(())
//! ```

use crate::data::iir_filter::{FilterCoefficients, FilterDesign};
use crate::data::orientation::{RemapOp, SensorVariant};
use crate::data::pipeline::{PipelineConfig, SignalPipeline, TensorFormat};
use crate::error::{AppResult, DaqError};
use crate::hardware::mock::Motion;
use crate::hardware::IMU_AXES;
use crate::inference::classify::{Classifier, DEFAULT_MIN_CONFIDENCE};
use crate::inference::mock::GESTURE_LABELS;
use crate::logging::OutputFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/imu_daq.toml";

/// Prefix of overriding environment variables.
pub const ENV_PREFIX: &str = "IMU_DAQ_";

/// Largest accepted `window.samples`.
pub const MAX_WINDOW_SAMPLES: usize = 1 << 16;

/// Largest accepted `window.buffer_windows`.
pub const MAX_BUFFER_WINDOWS: usize = 64;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaqConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Sensor and sampling settings
    pub sensor: SensorConfig,
    /// Window geometry
    pub window: WindowConfig,
    /// Low-pass filter design
    pub filter: FilterDesign,
    /// Orientation remap
    pub orientation: OrientationConfig,
    /// Inference input and output formats
    pub model: ModelConfig,
    /// Classification threshold and labels
    pub classifier: ClassifierConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "imu_daq".to_string(),
            log_level: "info".to_string(),
            log_format: OutputFormat::Pretty,
        }
    }
}

/// What to do when the sensor fails to deliver a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Stop acquisition on the first sensor error.
    #[default]
    Abort,
    /// Drop the tick and keep sampling.
    SkipTick,
}

/// Sensor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Mount variant, selects the orientation preset
    pub variant: SensorVariant,
    /// Tick rate in Hz
    pub sample_rate_hz: f64,
    /// Lower bound of the raw sensor range
    pub range_min: f32,
    /// Upper bound of the raw sensor range
    pub range_max: f32,
    /// Sensor error handling
    pub fault_policy: FaultPolicy,
    /// Mock sensor noise seed
    pub seed: u64,
    /// Mock sensor motion
    pub motion: Motion,
    /// Mock sensor noise amplitude in raw units
    pub noise: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            variant: SensorVariant::default(),
            sample_rate_hz: 128.0,
            range_min: f32::from(i16::MIN),
            range_max: -f32::from(i16::MIN),
            fault_policy: FaultPolicy::default(),
            seed: 0,
            motion: Motion::default(),
            noise: 64.0,
        }
    }
}

/// Window geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Samples per window
    pub samples: usize,
    /// Ring buffer capacity in windows (at least 2)
    pub buffer_windows: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            samples: 128,
            buffer_windows: 2,
        }
    }
}

/// Orientation configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Ignore the sensor variant preset
    pub disable_preset: bool,
    /// Steps applied after the preset
    pub extra: Vec<RemapOp>,
}

/// Inference engine formats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Input slot format
    pub input: TensorFormat,
    /// Output vector format
    pub output: TensorFormat,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input: TensorFormat::Int8 { q: 7 },
            output: TensorFormat::Float32,
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Top probability must exceed this to count as a detection
    pub min_confidence: f32,
    /// Class labels in model output order
    pub labels: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            labels: GESTURE_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DaqConfig {
    /// Load configuration from `config/imu_daq.toml` and environment variables
    ///
    /// Environment variables override the file with prefix IMU_DAQ_
    /// Example: IMU_DAQ_WINDOW__SAMPLES=64
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file leaves the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Figment::from(Serialized::defaults(DaqConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let rate = self.sensor.sample_rate_hz;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(DaqError::Configuration(format!(
                "Invalid sample_rate_hz {rate}. Must be positive"
            )));
        }

        let (lo, hi) = (self.sensor.range_min, self.sensor.range_max);
        if !lo.is_finite() || !hi.is_finite() || hi <= lo {
            return Err(DaqError::Configuration(format!(
                "Invalid sensor range [{lo}, {hi}]. range_max must exceed range_min"
            )));
        }

        let samples = self.window.samples;
        if !(1..=MAX_WINDOW_SAMPLES).contains(&samples) {
            return Err(DaqError::Configuration(format!(
                "Invalid window samples {samples}. Must be within [1, {MAX_WINDOW_SAMPLES}]"
            )));
        }
        let windows = self.window.buffer_windows;
        if !(2..=MAX_BUFFER_WINDOWS).contains(&windows) {
            return Err(DaqError::Configuration(format!(
                "Invalid buffer_windows {windows}. Must be within [2, {MAX_BUFFER_WINDOWS}]"
            )));
        }
        self.ring_capacity()?;

        let c = self.classifier.min_confidence;
        if !(0.0..=1.0).contains(&c) {
            return Err(DaqError::Configuration(format!(
                "Invalid min_confidence {c}. Must be within [0, 1]"
            )));
        }

        for (name, format) in [("input", self.model.input), ("output", self.model.output)] {
            format
                .qformat()
                .map_err(|e| DaqError::Configuration(format!("Invalid model {name}: {e}")))?;
        }

        // Coefficient checks and the remap channel range.
        self.pipeline_config()
            .and_then(|p| {
                SignalPipeline::new(p)?;
                Ok(())
            })
            .map_err(|e| match e {
                DaqError::Configuration(_) => e,
                other => DaqError::Configuration(other.to_string()),
            })
    }

    /// Ring buffer capacity in samples.
    pub fn ring_capacity(&self) -> AppResult<usize> {
        self.window
            .samples
            .checked_mul(self.window.buffer_windows)
            .ok_or_else(|| {
                DaqError::Configuration(format!(
                    "Ring of {} windows of {} samples overflows usize",
                    self.window.buffer_windows, self.window.samples
                ))
            })
    }

    /// The full remap sequence: variant preset, then extra steps.
    pub fn remap_ops(&self) -> Vec<RemapOp> {
        let mut ops = if self.orientation.disable_preset {
            Vec::new()
        } else {
            self.sensor.variant.remap_ops()
        };
        ops.extend_from_slice(&self.orientation.extra);
        ops
    }

    /// Build the signal pipeline parameters.
    pub fn pipeline_config(&self) -> AppResult<PipelineConfig> {
        let filter = FilterCoefficients::from_design(&self.filter, self.sensor.sample_rate_hz as f32)?;
        Ok(PipelineConfig {
            channels: IMU_AXES,
            window_len: self.window.samples,
            filter,
            sensor_min: self.sensor.range_min,
            sensor_max: self.sensor.range_max,
            remap: self.remap_ops(),
            output: self.model.input,
        })
    }

    /// Build the classifier.
    pub fn classifier(&self) -> AppResult<Classifier> {
        Classifier::new(self.classifier.min_confidence, self.classifier.labels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::iir_filter::FilterType;
    use crate::data::orientation::Axis;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_toml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = DaqConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ring_capacity().unwrap(), 256);
        assert_eq!(config.model.input, TensorFormat::Int8 { q: 7 });
        assert_eq!(config.classifier.labels.len(), 4);
    }

    #[test]
    #[serial]
    fn test_missing_file_gives_defaults() {
        let config = DaqConfig::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config, DaqConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_from_toml() {
        let file = write_toml(
            r#"
            [sensor]
            variant = "bmi160"
            sample_rate_hz = 100.0
            fault_policy = "skip_tick"

            [window]
            samples = 64

            [filter]
            kind = "biquad"
            filter_type = "lowpass"
            cutoff_hz = 20.0

            [orientation]
            extra = [{ negate = "accel_x" }]

            [model]
            input = { dtype = "int16", q = 12 }
            "#,
        );
        let config = DaqConfig::load_from(file.path()).unwrap();
        assert_eq!(config.sensor.variant, SensorVariant::Bmi160);
        assert_eq!(config.sensor.fault_policy, FaultPolicy::SkipTick);
        assert_eq!(config.window.samples, 64);
        assert_eq!(config.window.buffer_windows, 2);
        assert_eq!(
            config.filter,
            FilterDesign::Biquad {
                filter_type: FilterType::Lowpass,
                cutoff_hz: 20.0,
                q_factor: None
            }
        );
        assert_eq!(config.model.input, TensorFormat::Int16 { q: 12 });

        let ops = config.remap_ops();
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[4], RemapOp::Negate(Axis::AccelX));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_toml("[window]\nsamples = 64\n");
        std::env::set_var("IMU_DAQ_WINDOW__SAMPLES", "32");
        std::env::set_var("IMU_DAQ_APPLICATION__LOG_LEVEL", "debug");
        let config = DaqConfig::load_from(file.path());
        std::env::remove_var("IMU_DAQ_WINDOW__SAMPLES");
        std::env::remove_var("IMU_DAQ_APPLICATION__LOG_LEVEL");

        let config = config.unwrap();
        assert_eq!(config.window.samples, 32);
        assert_eq!(config.application.log_level, "debug");
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = DaqConfig::default();
        config.application.log_level = "invalid".to_string();
        assert!(matches!(
            config.validate(),
            Err(DaqError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_geometry() {
        let mut config = DaqConfig::default();
        config.window.buffer_windows = 1;
        assert!(config.validate().is_err());

        let mut config = DaqConfig::default();
        config.window.samples = 0;
        assert!(config.validate().is_err());

        let mut config = DaqConfig::default();
        config.sensor.range_min = 10.0;
        config.sensor.range_max = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_window_rejected() {
        for samples in [usize::MAX / 4, usize::MAX, MAX_WINDOW_SAMPLES + 1] {
            let mut config = DaqConfig::default();
            config.window.samples = samples;
            assert!(matches!(
                config.validate(),
                Err(DaqError::Configuration(_))
            ));
        }

        let mut config = DaqConfig::default();
        config.window.buffer_windows = usize::MAX / 2;
        assert!(matches!(
            config.validate(),
            Err(DaqError::Configuration(_))
        ));
        assert!(config.ring_capacity().is_err());

        let mut config = DaqConfig::default();
        config.window.samples = MAX_WINDOW_SAMPLES;
        config.window.buffer_windows = MAX_BUFFER_WINDOWS;
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_oversized_window_from_env_rejected() {
        std::env::set_var("IMU_DAQ_WINDOW__SAMPLES", (usize::MAX / 4).to_string());
        let config = DaqConfig::load_from("does/not/exist.toml");
        std::env::remove_var("IMU_DAQ_WINDOW__SAMPLES");

        let config = config.unwrap();
        assert_eq!(config.window.samples, usize::MAX / 4);
        assert!(matches!(
            config.validate(),
            Err(DaqError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_filter_and_format() {
        let mut config = DaqConfig::default();
        config.filter = FilterDesign::Custom {
            b: vec![0.1; 11],
            a: vec![1.0; 11],
        };
        assert!(matches!(
            config.validate(),
            Err(DaqError::Configuration(_))
        ));

        let mut config = DaqConfig::default();
        config.model.input = TensorFormat::Int8 { q: 9 };
        assert!(config.validate().is_err());

        let mut config = DaqConfig::default();
        config.classifier.min_confidence = 1.2;
        assert!(config.validate().is_err());
    }
}
