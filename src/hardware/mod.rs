//! Sensor collaborator abstraction.
//!
//! The acquisition loop only needs one capability from a sensor: read exactly
//! one sample, quickly, without blocking past the tick period. Transport setup
//! (bus, output data rate, range) happens before the source is handed over.
//!
//! # Contract
//! - `read_sample` fills `out` with one value per axis at native resolution
//! - It is called from the interrupt-context tick and must not allocate
//! - On error, the contents of `out` are unspecified and will be discarded
pub mod mock;

use crate::error::SensorError;

/// Axes of a standard 6-axis IMU sample (accelerometer + gyroscope).
pub const IMU_AXES: usize = 6;

/// Capability: produce one inertial sample per call.
pub trait SampleSource: Send {
    /// Number of axes in every sample.
    fn axes(&self) -> usize;

    /// Read one sample into `out` (`out.len() == self.axes()`).
    fn read_sample(&mut self, out: &mut [i16]) -> Result<(), SensorError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn axes(&self) -> usize {
        (**self).axes()
    }

    fn read_sample(&mut self, out: &mut [i16]) -> Result<(), SensorError> {
        (**self).read_sample(out)
    }
}
