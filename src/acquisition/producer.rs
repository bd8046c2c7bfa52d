//! Interrupt-context producer: one sensor sample per timer tick.
use crate::acquisition::signal::ReadySignal;
use crate::data::ring_buffer::Producer;
use crate::error::DaqError;
use crate::hardware::SampleSource;
use std::sync::Arc;

/// Result of a successful tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sample stored, window still filling.
    Sampling {
        /// Samples of the current window written so far (`1..W`).
        fill: usize,
    },
    /// Sample stored and it completed a window; the consumer was signalled.
    WindowReady {
        /// 1-based number of the completed window.
        sequence: u64,
    },
}

/// Per-tick acquisition state machine.
///
/// Runs to completion on every tick, never blocks and never allocates:
///
/// 1. claim the vacant ring slot (`Overflow` if the buffer is full)
/// 2. read one sample from the sensor straight into that slot
/// 3. commit the slot and advance the window fill counter
/// 4. when the counter reaches the window length, reset it and raise the
///    readiness signal
///
/// A sensor error skips the tick: nothing is committed and the fill counter is
/// unchanged. The error is returned so the caller can apply its fault policy.
pub struct AcquisitionLoop<S> {
    source: S,
    producer: Producer<i16>,
    ready: Arc<ReadySignal>,
    window_len: usize,
    fill: usize,
    windows: u64,
    samples: u64,
}

impl<S: SampleSource> AcquisitionLoop<S> {
    /// Wire a sensor to the write half of a sample ring buffer.
    ///
    /// # Errors
    /// `BadArgument` if the window length is zero, the ring item size differs
    /// from the sensor axis count, or the ring cannot hold two windows.
    pub fn new(
        source: S,
        producer: Producer<i16>,
        ready: Arc<ReadySignal>,
        window_len: usize,
    ) -> Result<Self, DaqError> {
        if window_len == 0 {
            return Err(DaqError::BadArgument("window length is zero".into()));
        }
        if producer.item_size() != source.axes() {
            return Err(DaqError::BadArgument(format!(
                "ring items hold {} values, sensor produces {} axes",
                producer.item_size(),
                source.axes()
            )));
        }
        if producer.capacity() / 2 < window_len {
            return Err(DaqError::BadArgument(format!(
                "ring capacity {} cannot hold two windows of {window_len} samples",
                producer.capacity()
            )));
        }

        Ok(Self {
            source,
            producer,
            ready,
            window_len,
            fill: 0,
            windows: 0,
            samples: 0,
        })
    }

    /// Handle one timer tick.
    pub fn on_tick(&mut self) -> Result<TickOutcome, DaqError> {
        let slot = self.producer.vacant_slot()?;
        self.source.read_sample(slot)?;
        self.producer.write_reserve(1)?;
        self.samples += 1;

        self.fill += 1;
        if self.fill < self.window_len {
            return Ok(TickOutcome::Sampling { fill: self.fill });
        }

        self.fill = 0;
        self.windows += 1;
        if self.ready.set() {
            return Err(DaqError::ConsumerLagging {
                window: self.windows,
            });
        }
        Ok(TickOutcome::WindowReady {
            sequence: self.windows,
        })
    }

    /// Samples of the current window written so far.
    pub fn window_fill(&self) -> usize {
        self.fill
    }

    /// Windows completed since start.
    pub fn windows_completed(&self) -> u64 {
        self.windows
    }

    /// Samples committed since start.
    pub fn samples_written(&self) -> u64 {
        self.samples
    }

    /// Samples per window.
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Items currently buffered.
    pub fn buffered(&self) -> usize {
        self.producer.count()
    }

    /// Whether the ring buffer has no free slot left.
    pub fn is_buffer_full(&self) -> bool {
        self.producer.is_full()
    }

    /// The sensor, e.g. to inspect a mock.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the sensor between ticks.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}
