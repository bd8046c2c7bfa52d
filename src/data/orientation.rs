//! Axis remapping for physically rotated sensor mounts.
//!
//! A remap is an ordered list of channel swaps and sign flips applied to every
//! sample of a window. It moves values around but never changes magnitudes.
use crate::data::WindowStage;
use crate::error::DaqError;
use serde::{Deserialize, Serialize};

/// Named channel of a 6-axis IMU sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Accelerometer X
    AccelX,
    /// Accelerometer Y
    AccelY,
    /// Accelerometer Z
    AccelZ,
    /// Gyroscope X
    GyroX,
    /// Gyroscope Y
    GyroY,
    /// Gyroscope Z
    GyroZ,
}

impl Axis {
    /// Position of the axis inside a sample.
    pub fn index(self) -> usize {
        match self {
            Axis::AccelX => 0,
            Axis::AccelY => 1,
            Axis::AccelZ => 2,
            Axis::GyroX => 3,
            Axis::GyroY => 4,
            Axis::GyroZ => 5,
        }
    }
}

/// One remap step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemapOp {
    /// Exchange two channels.
    Swap(Axis, Axis),
    /// Flip the sign of a channel.
    Negate(Axis),
}

/// Known sensor mounts with a fixed remap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorVariant {
    /// Reference orientation, no remap.
    #[default]
    Bmx160,
    /// Rotated mount: negate Z, then swap X/Y, on both the accelerometer and gyroscope.
    Bmi160,
}

impl SensorVariant {
    /// The remap steps that bring this mount to the reference orientation.
    pub fn remap_ops(self) -> Vec<RemapOp> {
        match self {
            SensorVariant::Bmx160 => Vec::new(),
            SensorVariant::Bmi160 => vec![
                RemapOp::Negate(Axis::AccelZ),
                RemapOp::Swap(Axis::AccelX, Axis::AccelY),
                RemapOp::Negate(Axis::GyroZ),
                RemapOp::Swap(Axis::GyroX, Axis::GyroY),
            ],
        }
    }
}

/// Validated remap for windows with a fixed channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisRemap {
    ops: Vec<RemapOp>,
    channels: usize,
}

impl AxisRemap {
    /// Build a remap, checking every referenced axis exists.
    pub fn new(ops: Vec<RemapOp>, channels: usize) -> Result<Self, DaqError> {
        for op in &ops {
            let highest = match *op {
                RemapOp::Swap(a, b) => a.index().max(b.index()),
                RemapOp::Negate(a) => a.index(),
            };
            if highest >= channels {
                return Err(DaqError::BadArgument(format!(
                    "remap {op:?} references channel {highest} of a {channels}-channel sample"
                )));
            }
        }
        Ok(Self { ops, channels })
    }

    /// A remap that leaves every sample unchanged.
    pub fn identity(channels: usize) -> Self {
        Self {
            ops: Vec::new(),
            channels,
        }
    }

    /// Whether applying the remap is a no-op.
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// The remap steps, in application order.
    pub fn ops(&self) -> &[RemapOp] {
        &self.ops
    }
}

impl WindowStage for AxisRemap {
    fn name(&self) -> &'static str {
        "orientation"
    }

    fn apply(&mut self, window: &mut [f32]) {
        if self.ops.is_empty() {
            return;
        }
        for frame in window.chunks_exact_mut(self.channels) {
            for op in &self.ops {
                match *op {
                    RemapOp::Swap(a, b) => frame.swap(a.index(), b.index()),
                    RemapOp::Negate(a) => frame[a.index()] = -frame[a.index()],
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi160_preset() {
        let mut remap = AxisRemap::new(SensorVariant::Bmi160.remap_ops(), 6).unwrap();
        let mut window = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, -1.0, -2.0, -3.0, -4.0, -5.0, -6.0];
        remap.apply(&mut window);
        assert_eq!(
            window,
            [2.0, 1.0, -3.0, 5.0, 4.0, -6.0, -2.0, -1.0, 3.0, -5.0, -4.0, 6.0]
        );
    }

    #[test]
    fn test_identity() {
        let mut remap = AxisRemap::new(SensorVariant::Bmx160.remap_ops(), 6).unwrap();
        assert!(remap.is_identity());
        let mut window = [0.25f32; 12];
        remap.apply(&mut window);
        assert_eq!(window, [0.25f32; 12]);
    }

    #[test]
    fn test_axis_out_of_range() {
        let err = AxisRemap::new(vec![RemapOp::Negate(Axis::GyroX)], 3).unwrap_err();
        assert!(matches!(err, DaqError::BadArgument(_)));
        assert!(AxisRemap::new(vec![RemapOp::Swap(Axis::AccelX, Axis::AccelZ)], 3).is_ok());
    }

    #[test]
    fn test_negate_twice_restores() {
        let ops = vec![RemapOp::Negate(Axis::AccelY), RemapOp::Negate(Axis::AccelY)];
        let mut remap = AxisRemap::new(ops, 3).unwrap();
        let mut window = [0.5, -0.75, 1.0];
        remap.apply(&mut window);
        assert_eq!(window, [0.5, -0.75, 1.0]);
    }
}
