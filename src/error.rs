//! Custom error types for the acquisition system.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate.
//! Using the `thiserror` crate, it gives one consistent way to report everything
//! from construction-time misconfiguration to timing-budget violations on the
//! real-time path.
//!
//! ## Error Hierarchy
//!
//! `DaqError` consolidates several error sources:
//!
//! - **`BadArgument`**: construction-time misconfiguration (zero-size pool, zero item
//!   size, filter order above the tap capacity, ...). Fatal at startup, never retried.
//! - **`RingBuffer`**: admission failures from the SPSC ring buffer. In steady state
//!   these never happen; when they do, the producer/consumer timing budget was
//!   violated and samples would otherwise be dropped or duplicated.
//! - **`Sensor`**: transport errors from the sensor collaborator. Whether these abort
//!   acquisition or just skip a tick is an application decision (`FaultPolicy`).
//! - **`ConsumerLagging`** / **`Desync`**: explicit checks of the producer/consumer
//!   counting discipline.
//! - **`Config`** / **`Configuration`**: parse errors from `figment` and semantic
//!   validation errors respectively.
//!
//! The leaf errors (`RingBufferError`, `SensorError`) are `Copy` and carry no heap
//! data so they can be produced from the non-allocating acquisition path.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Admission and argument failures reported by the ring buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
    /// Storage or item geometry cannot form a valid buffer.
    #[error("invalid ring buffer argument: {0}")]
    BadArgument(&'static str),

    /// Not enough free items for the requested write. Nothing was written.
    #[error("ring buffer overflow: requested {requested} items, {available} free")]
    Overflow {
        /// Items the caller tried to write.
        requested: usize,
        /// Free items at the time of the call.
        available: usize,
    },

    /// Not enough stored items for the requested read. Nothing was consumed.
    #[error("ring buffer underflow: requested {requested} items, {available} stored")]
    Underflow {
        /// Items the caller tried to read.
        requested: usize,
        /// Stored items at the time of the call.
        available: usize,
    },
}

/// Errors raised by a sensor collaborator while reading one sample.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus-level failure with a driver specific code.
    #[error("sensor transport error (code {code})")]
    Transport {
        /// Driver specific status code.
        code: i32,
    },

    /// The sample was not ready within the tick period.
    #[error("sensor read timed out")]
    Timeout,

    /// The device is no longer reachable.
    #[error("sensor disconnected")]
    Disconnected,
}

/// Errors raised by the inference collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// The input slot did not match the declared format.
    #[error("input does not match declared format: {0}")]
    InputMismatch(String),

    /// The engine failed while running.
    #[error("inference failed: {0}")]
    Failed(String),
}

/// Primary error type for the crate.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Construction-time misconfiguration.
    #[error("Bad argument: {0}")]
    BadArgument(String),

    /// Ring buffer admission failure.
    #[error("Ring buffer error: {0}")]
    RingBuffer(#[from] RingBufferError),

    /// Sensor read failure for one tick.
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Consumer missed window {window}: previous readiness signal still pending")]
    /// A window completed while the previous one was still unconsumed.
    ConsumerLagging {
        /// Sequence number of the window that completed.
        window: u64,
    },

    /// The consumer was woken without a full window buffered.
    #[error("Producer/consumer desynchronized: window needs {required} samples, {available} buffered")]
    Desync {
        /// Samples per window.
        required: usize,
        /// Samples buffered when the window was drained.
        available: usize,
    },

    /// Pipeline output and engine input disagree on format or shape.
    #[error("Format mismatch: pipeline produces {pipeline}, engine expects {engine}")]
    FormatMismatch {
        /// What the pipeline produces.
        pipeline: String,
        /// What the engine declares.
        engine: String,
    },

    /// Inference engine failure.
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but is semantically invalid.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}

impl DaqError {
    /// Whether the error must stop acquisition regardless of the fault policy.
    ///
    /// Sensor transport errors are the only recoverable class; everything else
    /// signals misconfiguration or a broken timing budget.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DaqError::Sensor(_))
    }
}
