//! Deterministic stand-in for the gesture model.
//!
//! Scores each class with a fixed linear rule over the mean absolute value of
//! three channels (accel X, accel Y, gyro Z) and converts the scores to
//! probabilities with a softmax. The rule separates the motions produced by
//! [`MockImu`](crate::hardware::mock::MockImu) well enough to drive the whole
//! application without a trained network.
use crate::data::pipeline::{ConditionedWindow, TensorFormat};
use crate::data::quantize::QFormat;
use crate::error::InferenceError;
use crate::inference::{InferenceEngine, ModelOutput};

/// Class labels in output order.
pub const GESTURE_LABELS: [&str; 4] = ["circle", "side_to_side", "square", "none"];

const ACCEL_X: usize = 0;
const ACCEL_Y: usize = 1;
const GYRO_Z: usize = 5;

enum OutputBuffer {
    Float32(Vec<f32>),
    Int8(Vec<i8>, QFormat),
    Int16(Vec<i16>, QFormat),
}

/// Mock gesture classifier over `(window_len, channels)` windows.
pub struct MockGestureModel {
    input: TensorFormat,
    window_len: usize,
    channels: usize,
    elements: usize,
    probabilities: [f32; GESTURE_LABELS.len()],
    output: OutputBuffer,
    runs: u64,
}

impl MockGestureModel {
    /// Create a model expecting windows of `window_len` samples by `channels` axes.
    ///
    /// # Errors
    /// `InputMismatch` if there are fewer than six channels or `q` is out of range.
    pub fn new(
        input: TensorFormat,
        window_len: usize,
        channels: usize,
    ) -> Result<Self, InferenceError> {
        if channels <= GYRO_Z {
            return Err(InferenceError::InputMismatch(format!(
                "gesture model needs at least {} channels, got {channels}",
                GYRO_Z + 1
            )));
        }
        input
            .qformat()
            .map_err(|e| InferenceError::InputMismatch(e.to_string()))?;
        let elements = window_len.checked_mul(channels).ok_or_else(|| {
            InferenceError::InputMismatch(format!(
                "window of {window_len} samples x {channels} channels overflows usize"
            ))
        })?;
        Ok(Self {
            input,
            window_len,
            channels,
            elements,
            probabilities: [0.0; GESTURE_LABELS.len()],
            output: OutputBuffer::Float32(vec![0.0; GESTURE_LABELS.len()]),
            runs: 0,
        })
    }

    /// Report results in `format` instead of floats.
    ///
    /// # Errors
    /// `InputMismatch` if `q` is out of range for the code type.
    pub fn with_output_format(mut self, format: TensorFormat) -> Result<Self, InferenceError> {
        let classes = GESTURE_LABELS.len();
        self.output = match format
            .qformat()
            .map_err(|e| InferenceError::InputMismatch(e.to_string()))?
        {
            None => OutputBuffer::Float32(vec![0.0; classes]),
            Some(q) => match format {
                TensorFormat::Int8 { .. } => OutputBuffer::Int8(vec![0; classes], q),
                _ => OutputBuffer::Int16(vec![0; classes], q),
            },
        };
        Ok(self)
    }

    /// Windows classified so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    fn mean_abs(&self, input: &ConditionedWindow, channel: usize) -> f32 {
        let total: f32 = (0..self.window_len)
            .filter_map(|i| input.value(i * self.channels + channel))
            .map(f32::abs)
            .sum();
        total / self.window_len.max(1) as f32
    }
}

fn softmax(logits: &[f32], out: &mut [f32]) {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for (dst, &l) in out.iter_mut().zip(logits) {
        *dst = (l - max).exp();
        sum += *dst;
    }
    for p in out.iter_mut() {
        *p /= sum;
    }
}

impl InferenceEngine for MockGestureModel {
    fn input_format(&self) -> TensorFormat {
        self.input
    }

    fn input_shape(&self) -> (usize, usize) {
        (self.window_len, self.channels)
    }

    fn run(&mut self, input: &ConditionedWindow) -> Result<(), InferenceError> {
        if input.format() != self.input {
            return Err(InferenceError::InputMismatch(format!(
                "expected {} input, got {}",
                self.input,
                input.format()
            )));
        }
        if input.len() != self.elements {
            return Err(InferenceError::InputMismatch(format!(
                "expected {} elements, got {}",
                self.elements,
                input.len()
            )));
        }

        let x = self.mean_abs(input, ACCEL_X);
        let y = self.mean_abs(input, ACCEL_Y);
        let gz = self.mean_abs(input, GYRO_Z);
        let logits = [
            40.0 * gz,
            30.0 * (x - y),
            30.0 * x.min(y) - 40.0 * gz,
            3.0 - 30.0 * (x + y),
        ];
        softmax(&logits, &mut self.probabilities);

        match &mut self.output {
            OutputBuffer::Float32(values) => values.copy_from_slice(&self.probabilities),
            OutputBuffer::Int8(codes, q) => q.quantize_slice(&self.probabilities, codes),
            OutputBuffer::Int16(codes, q) => q.quantize_slice(&self.probabilities, codes),
        }
        self.runs += 1;
        Ok(())
    }

    fn output(&self) -> ModelOutput<'_> {
        match &self.output {
            OutputBuffer::Float32(values) => ModelOutput::Float32(values),
            OutputBuffer::Int8(codes, format) => ModelOutput::Int8 {
                codes,
                format: *format,
            },
            OutputBuffer::Int16(codes, format) => ModelOutput::Int16 {
                codes,
                format: *format,
            },
        }
    }
}
