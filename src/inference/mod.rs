//! Inference collaborator abstraction.
//!
//! An engine declares the exact shape and dtype of its input slot. The window
//! consumer feeds it one conditioned window at a time, runs it, and reads back
//! the per-class result vector.
//!
//! # Contract
//! - `input_format` and `input_shape` are fixed for the engine's lifetime
//! - `run` may block for a bounded compute time
//! - `output` reflects the most recent successful `run`
pub mod classify;
pub mod mock;

pub use crate::data::pipeline::{ConditionedWindow, TensorFormat};

use crate::data::quantize::QFormat;
use crate::error::InferenceError;

/// Borrowed view of an engine's result vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelOutput<'a> {
    /// Floating-point probabilities.
    Float32(&'a [f32]),
    /// 8-bit fixed-point probabilities.
    Int8 {
        /// Quantized probabilities.
        codes: &'a [i8],
        /// Output scale.
        format: QFormat,
    },
    /// 16-bit fixed-point probabilities.
    Int16 {
        /// Quantized probabilities.
        codes: &'a [i16],
        /// Output scale.
        format: QFormat,
    },
}

impl ModelOutput<'_> {
    /// Number of classes.
    pub fn len(&self) -> usize {
        match self {
            ModelOutput::Float32(values) => values.len(),
            ModelOutput::Int8 { codes, .. } => codes.len(),
            ModelOutput::Int16 { codes, .. } => codes.len(),
        }
    }

    /// Whether the output is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the dequantized probabilities into `out`, resizing it.
    pub fn dequantize_into(&self, out: &mut Vec<f32>) {
        out.clear();
        match *self {
            ModelOutput::Float32(values) => out.extend_from_slice(values),
            ModelOutput::Int8 { codes, format } => {
                out.extend(codes.iter().map(|&c| format.dequantize(c)));
            }
            ModelOutput::Int16 { codes, format } => {
                out.extend(codes.iter().map(|&c| format.dequantize(c)));
            }
        }
    }
}

/// Capability: classify one conditioned window.
pub trait InferenceEngine: Send {
    /// Dtype of the input slot.
    fn input_format(&self) -> TensorFormat;

    /// `(samples, channels)` of the input slot.
    fn input_shape(&self) -> (usize, usize);

    /// Run the model on one window.
    fn run(&mut self, input: &ConditionedWindow) -> Result<(), InferenceError>;

    /// Result vector of the last run.
    fn output(&self) -> ModelOutput<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dequantize_fixed_output() {
        let format = QFormat::new::<i16>(15).unwrap();
        let codes = [16384i16, 8192, 0];
        let output = ModelOutput::Int16 {
            codes: &codes,
            format,
        };
        let mut probs = vec![9.0; 8];
        output.dequantize_into(&mut probs);
        assert_eq!(probs, vec![0.5, 0.25, 0.0]);
        assert_eq!(output.len(), 3);
    }
}
