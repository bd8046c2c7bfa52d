//! Min-max normalization into `[-1, +1]`.
use crate::data::WindowStage;
use crate::error::DaqError;

/// Upper bound of normalized output.
pub const NORMALIZED_MAX: f32 = 1.0;
/// Lower bound of normalized output.
pub const NORMALIZED_MIN: f32 = -1.0;

/// Clamp-and-scale normalizer for a declared sensor range.
///
/// Values at or above `sensor_max` map to `+1`, values at or below
/// `sensor_min` map to `-1`, and everything in between is mapped linearly with
/// `1 - (sensor_max - v) * 2 / (sensor_max - sensor_min)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxNormalizer {
    sensor_min: f32,
    sensor_max: f32,
    scaler: f32,
}

impl MinMaxNormalizer {
    /// Create a normalizer for `[sensor_min, sensor_max]`.
    ///
    /// # Errors
    /// `BadArgument` unless both bounds are finite and `sensor_max > sensor_min`.
    pub fn new(sensor_min: f32, sensor_max: f32) -> Result<Self, DaqError> {
        if !sensor_min.is_finite() || !sensor_max.is_finite() || sensor_max <= sensor_min {
            return Err(DaqError::BadArgument(format!(
                "invalid normalization range [{sensor_min}, {sensor_max}]"
            )));
        }
        Ok(Self {
            sensor_min,
            sensor_max,
            scaler: (NORMALIZED_MAX - NORMALIZED_MIN) / (sensor_max - sensor_min),
        })
    }

    /// Normalize a single value.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        if value >= self.sensor_max {
            NORMALIZED_MAX
        } else if value <= self.sensor_min {
            NORMALIZED_MIN
        } else {
            NORMALIZED_MAX - (self.sensor_max - value) * self.scaler
        }
    }

    /// Lower bound of the declared range.
    pub fn sensor_min(&self) -> f32 {
        self.sensor_min
    }

    /// Upper bound of the declared range.
    pub fn sensor_max(&self) -> f32 {
        self.sensor_max
    }
}

impl WindowStage for MinMaxNormalizer {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn apply(&mut self, window: &mut [f32]) {
        for value in window.iter_mut() {
            *value = self.normalize(*value);
        }
    }
}
