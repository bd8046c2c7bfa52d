//! The per-window signal-conditioning pipeline.
//!
//! Every window goes through the same fixed sequence:
//!
//! 1. widen `i16` samples to `f32` (no scaling)
//! 2. per-channel IIR filter, state carried across windows
//! 3. min-max normalization into `[-1, +1]`
//! 4. orientation remap (may be the identity)
//! 5. quantization into the inference input format (skipped for `Float32`)
//!
//! # Example
//! ```
//! use imu_daq::data::iir_filter::{FilterCoefficients, FilterDesign};
//! use imu_daq::data::pipeline::{PipelineConfig, SignalPipeline, TensorFormat};
//!
//! let config = PipelineConfig {
//!     channels: 6,
//!     window_len: 128,
//!     filter: FilterCoefficients::from_design(&FilterDesign::Butterworth3, 128.0).unwrap(),
//!     sensor_min: -32768.0,
//!     sensor_max: 32768.0,
//!     remap: Vec::new(),
//!     output: TensorFormat::Int8 { q: 7 },
//! };
//! let mut pipeline = SignalPipeline::new(config).unwrap();
//! let mut out = pipeline.allocate_output().unwrap();
//! pipeline.process(&vec![0i16; 128 * 6], &mut out).unwrap();
//! assert_eq!(out.len(), 128 * 6);
//! ```
use crate::data::iir_filter::{FilterBank, FilterCoefficients};
use crate::data::normalize::MinMaxNormalizer;
use crate::data::orientation::{AxisRemap, RemapOp};
use crate::data::quantize::QFormat;
use crate::data::WindowStage;
use crate::error::DaqError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of an inference input (or output) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "dtype", rename_all = "snake_case")]
pub enum TensorFormat {
    /// 32-bit floats, no quantization.
    Float32,
    /// 8-bit codes with `q` fraction bits.
    Int8 {
        /// Fraction bits.
        q: u8,
    },
    /// 16-bit codes with `q` fraction bits.
    Int16 {
        /// Fraction bits.
        q: u8,
    },
}

impl Default for TensorFormat {
    fn default() -> Self {
        TensorFormat::Float32
    }
}

impl fmt::Display for TensorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorFormat::Float32 => write!(f, "float32"),
            TensorFormat::Int8 { q } => write!(f, "int8 (q{q})"),
            TensorFormat::Int16 { q } => write!(f, "int16 (q{q})"),
        }
    }
}

impl TensorFormat {
    /// The Q-format of a fixed-point tensor, `None` for floats.
    pub fn qformat(&self) -> Result<Option<QFormat>, DaqError> {
        match *self {
            TensorFormat::Float32 => Ok(None),
            TensorFormat::Int8 { q } => QFormat::new::<i8>(q).map(Some),
            TensorFormat::Int16 { q } => QFormat::new::<i16>(q).map(Some),
        }
    }
}

/// A window in the exact representation an inference engine consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionedWindow {
    /// Floating-point input.
    Float32(Vec<f32>),
    /// 8-bit fixed-point input.
    Int8 {
        /// Quantized values, sample-major.
        codes: Vec<i8>,
        /// Scale the codes were produced with.
        format: QFormat,
    },
    /// 16-bit fixed-point input.
    Int16 {
        /// Quantized values, sample-major.
        codes: Vec<i16>,
        /// Scale the codes were produced with.
        format: QFormat,
    },
}

impl ConditionedWindow {
    /// A zero-filled window of `len` elements in `format`.
    pub fn zeroed(format: TensorFormat, len: usize) -> Result<Self, DaqError> {
        Ok(match format {
            TensorFormat::Float32 => ConditionedWindow::Float32(vec![0.0; len]),
            TensorFormat::Int8 { q } => ConditionedWindow::Int8 {
                codes: vec![0; len],
                format: QFormat::new::<i8>(q)?,
            },
            TensorFormat::Int16 { q } => ConditionedWindow::Int16 {
                codes: vec![0; len],
                format: QFormat::new::<i16>(q)?,
            },
        })
    }

    /// The format of this window.
    pub fn format(&self) -> TensorFormat {
        match self {
            ConditionedWindow::Float32(_) => TensorFormat::Float32,
            ConditionedWindow::Int8 { format, .. } => TensorFormat::Int8 { q: format.q() },
            ConditionedWindow::Int16 { format, .. } => TensorFormat::Int16 { q: format.q() },
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ConditionedWindow::Float32(values) => values.len(),
            ConditionedWindow::Int8 { codes, .. } => codes.len(),
            ConditionedWindow::Int16 { codes, .. } => codes.len(),
        }
    }

    /// Whether the window has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The float values, if this is a float window.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            ConditionedWindow::Float32(values) => Some(values),
            _ => None,
        }
    }

    /// Value of element `index`, dequantized for fixed-point windows.
    pub fn value(&self, index: usize) -> Option<f32> {
        match self {
            ConditionedWindow::Float32(values) => values.get(index).copied(),
            ConditionedWindow::Int8 { codes, format } => {
                codes.get(index).map(|&c| format.dequantize(c))
            }
            ConditionedWindow::Int16 { codes, format } => {
                codes.get(index).map(|&c| format.dequantize(c))
            }
        }
    }
}

/// Construction parameters for [`SignalPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Axes per sample.
    pub channels: usize,
    /// Samples per window.
    pub window_len: usize,
    /// IIR coefficients shared by every channel.
    pub filter: FilterCoefficients,
    /// Lower bound of the sensor range.
    pub sensor_min: f32,
    /// Upper bound of the sensor range.
    pub sensor_max: f32,
    /// Orientation remap steps, applied in order.
    pub remap: Vec<RemapOp>,
    /// Format of the inference input slot.
    pub output: TensorFormat,
}

/// Stateful conditioning pipeline owned by the window consumer.
pub struct SignalPipeline {
    channels: usize,
    window_len: usize,
    filter: FilterBank,
    normalizer: MinMaxNormalizer,
    remap: AxisRemap,
    output: TensorFormat,
    qformat: Option<QFormat>,
    scratch: Vec<f32>,
}

impl SignalPipeline {
    /// Build the pipeline with zeroed filter state.
    ///
    /// # Errors
    /// `BadArgument` for a zero window or channel count, an invalid range, a
    /// remap referencing missing channels, or a `q` too large for the code type.
    pub fn new(config: PipelineConfig) -> Result<Self, DaqError> {
        if config.window_len == 0 {
            return Err(DaqError::BadArgument("window length is zero".into()));
        }
        let elements = config.window_len.checked_mul(config.channels).ok_or_else(|| {
            DaqError::BadArgument(format!(
                "window of {} samples x {} channels overflows usize",
                config.window_len, config.channels
            ))
        })?;
        let filter = FilterBank::new(config.filter, config.channels)?;
        let normalizer = MinMaxNormalizer::new(config.sensor_min, config.sensor_max)?;
        let remap = AxisRemap::new(config.remap, config.channels)?;
        let qformat = config.output.qformat()?;

        Ok(Self {
            channels: config.channels,
            window_len: config.window_len,
            filter,
            normalizer,
            remap,
            output: config.output,
            qformat,
            scratch: vec![0.0; elements],
        })
    }

    /// Axes per sample.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples per window.
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Elements per window (`window_len * channels`).
    pub fn window_elements(&self) -> usize {
        self.scratch.len()
    }

    /// Format of the produced windows.
    pub fn output_format(&self) -> TensorFormat {
        self.output
    }

    /// The per-channel filters, e.g. to inspect carried state.
    pub fn filter_bank(&self) -> &FilterBank {
        &self.filter
    }

    /// A correctly sized output window to pass to [`SignalPipeline::process`].
    pub fn allocate_output(&self) -> Result<ConditionedWindow, DaqError> {
        ConditionedWindow::zeroed(self.output, self.window_elements())
    }

    /// Run the floating-point stages (1–4) and return the conditioned floats.
    pub fn condition(&mut self, raw: &[i16]) -> Result<&[f32], DaqError> {
        if raw.len() != self.scratch.len() {
            return Err(DaqError::BadArgument(format!(
                "window has {} elements, pipeline expects {}",
                raw.len(),
                self.scratch.len()
            )));
        }

        widen(raw, &mut self.scratch);
        let stages: [&mut dyn WindowStage; 3] =
            [&mut self.filter, &mut self.normalizer, &mut self.remap];
        for stage in stages {
            stage.apply(&mut self.scratch);
        }
        Ok(&self.scratch)
    }

    /// Condition one raw window into `out`, quantizing when the output is fixed-point.
    pub fn process(&mut self, raw: &[i16], out: &mut ConditionedWindow) -> Result<(), DaqError> {
        if out.format() != self.output || out.len() != self.scratch.len() {
            return Err(DaqError::BadArgument(format!(
                "output slot is {} x {}, pipeline produces {} x {}",
                out.format(),
                out.len(),
                self.output,
                self.scratch.len()
            )));
        }

        self.condition(raw)?;
        match out {
            ConditionedWindow::Float32(values) => values.copy_from_slice(&self.scratch),
            ConditionedWindow::Int8 { codes, .. } => {
                if let Some(fmt) = self.qformat {
                    fmt.quantize_slice(&self.scratch, codes);
                }
            }
            ConditionedWindow::Int16 { codes, .. } => {
                if let Some(fmt) = self.qformat {
                    fmt.quantize_slice(&self.scratch, codes);
                }
            }
        }
        Ok(())
    }
}

/// Convert integer samples to floats one-to-one.
pub fn widen(raw: &[i16], out: &mut [f32]) {
    for (dst, &src) in out.iter_mut().zip(raw) {
        *dst = f32::from(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::iir_filter::FilterDesign;
    use crate::data::orientation::SensorVariant;

    fn passthrough() -> FilterCoefficients {
        FilterCoefficients::new(&[1.0], &[1.0]).unwrap()
    }

    fn config(output: TensorFormat) -> PipelineConfig {
        PipelineConfig {
            channels: 6,
            window_len: 4,
            filter: passthrough(),
            sensor_min: -32768.0,
            sensor_max: 32768.0,
            remap: Vec::new(),
            output,
        }
    }

    #[test]
    fn test_float_output_without_filtering() {
        let mut pipeline = SignalPipeline::new(config(TensorFormat::Float32)).unwrap();
        let mut out = pipeline.allocate_output().unwrap();
        let mut raw = vec![0i16; 24];
        raw[0] = 16384;
        raw[1] = -16384;
        raw[2] = i16::MIN;
        pipeline.process(&raw, &mut out).unwrap();

        let values = out.as_f32().unwrap();
        assert_eq!(&values[..4], &[0.5, -0.5, -1.0, 0.0]);
    }

    #[test]
    fn test_int8_output() {
        let mut pipeline = SignalPipeline::new(config(TensorFormat::Int8 { q: 7 })).unwrap();
        let mut out = pipeline.allocate_output().unwrap();
        let mut raw = vec![0i16; 24];
        raw[0] = 16384;
        raw[1] = -16384;
        pipeline.process(&raw, &mut out).unwrap();

        match out {
            ConditionedWindow::Int8 { codes, format } => {
                assert_eq!(format.q(), 7);
                assert_eq!(&codes[..3], &[64, -64, 0]);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_remap_runs_after_normalization() {
        let mut cfg = config(TensorFormat::Float32);
        cfg.remap = SensorVariant::Bmi160.remap_ops();
        let mut pipeline = SignalPipeline::new(cfg).unwrap();
        let mut raw = vec![0i16; 24];
        raw[..6].copy_from_slice(&[8192, 16384, 16384, 0, 0, 0]);
        let values = pipeline.condition(&raw).unwrap();
        assert_eq!(&values[..3], &[0.5, 0.25, -0.5]);
    }

    #[test]
    fn test_wrong_window_length() {
        let mut pipeline = SignalPipeline::new(config(TensorFormat::Float32)).unwrap();
        let mut out = pipeline.allocate_output().unwrap();
        assert!(matches!(
            pipeline.process(&[0i16; 23], &mut out),
            Err(DaqError::BadArgument(_))
        ));
    }

    #[test]
    fn test_mismatched_output_slot() {
        let mut pipeline = SignalPipeline::new(config(TensorFormat::Int16 { q: 15 })).unwrap();
        let mut out = ConditionedWindow::zeroed(TensorFormat::Int8 { q: 7 }, 24).unwrap();
        assert!(pipeline.process(&[0i16; 24], &mut out).is_err());
    }

    #[test]
    fn test_invalid_construction() {
        let mut cfg = config(TensorFormat::Int8 { q: 9 });
        assert!(SignalPipeline::new(cfg.clone()).is_err());
        cfg.output = TensorFormat::Float32;
        cfg.window_len = 0;
        assert!(SignalPipeline::new(cfg.clone()).is_err());
        cfg.window_len = 4;
        cfg.channels = 0;
        assert!(SignalPipeline::new(cfg).is_err());
    }

    #[test]
    fn test_oversized_window_rejected() {
        let mut cfg = config(TensorFormat::Float32);
        cfg.window_len = usize::MAX / 4;
        assert!(matches!(
            SignalPipeline::new(cfg),
            Err(DaqError::BadArgument(_))
        ));
    }

    #[test]
    fn test_filter_state_carries_across_windows() {
        let coeffs = FilterCoefficients::from_design(&FilterDesign::Butterworth3, 128.0).unwrap();
        let mut cfg = config(TensorFormat::Float32);
        cfg.filter = coeffs;

        let raw: Vec<i16> = (0..48).map(|i| (i * 500) as i16).collect();

        let mut split = SignalPipeline::new(cfg.clone()).unwrap();
        let mut joined = Vec::new();
        joined.extend_from_slice(split.condition(&raw[..24]).unwrap());
        joined.extend_from_slice(split.condition(&raw[24..]).unwrap());

        let mut long_cfg = cfg;
        long_cfg.window_len = 8;
        let mut whole = SignalPipeline::new(long_cfg).unwrap();
        assert_eq!(whole.condition(&raw).unwrap(), joined.as_slice());
    }
}
