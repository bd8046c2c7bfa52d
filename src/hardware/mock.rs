//! Mock Sensor Implementations
//!
//! Provides simulated IMUs for testing without physical hardware. Both mocks
//! are allocation-free per read so they can run on the tick path.
//!
//! # Available Mocks
//!
//! - `MockImu` - Synthetic gesture motion plus seeded noise, with optional fault injection
//! - `CountingImu` - Strictly increasing values, for ordering and gap checks

use crate::error::SensorError;
use crate::hardware::{SampleSource, IMU_AXES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Raw reading for 1 g at the ±2 g accelerometer range.
const ONE_G: f32 = 16384.0;

// =============================================================================
// MockImu - Simulated 6-axis IMU
// =============================================================================

/// Motion pattern the mock IMU simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    /// Board at rest, gravity on Z.
    #[default]
    Idle,
    /// Circular motion in the X/Y plane.
    Circle,
    /// Back-and-forth along X.
    SideToSide,
    /// Four straight strokes tracing a square.
    Square,
}

/// Mock 6-axis IMU with deterministic output.
///
/// Simulates:
/// - a configurable gesture with a one second period
/// - seeded uniform noise on every axis
/// - a transport fault every `n` reads when requested
///
/// # Example
///
/// ```
/// use imu_daq::hardware::mock::{MockImu, Motion};
/// use imu_daq::hardware::SampleSource;
///
/// let mut imu = MockImu::new(7).with_motion(Motion::Circle);
/// let mut sample = [0i16; 6];
/// imu.read_sample(&mut sample).unwrap();
/// ```
pub struct MockImu {
    rng: StdRng,
    motion: Motion,
    period_samples: u32,
    noise: f32,
    fault_every: Option<u64>,
    reads: u64,
}

impl MockImu {
    /// Create a mock IMU at rest with the given noise seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            motion: Motion::Idle,
            period_samples: 128,
            noise: 64.0,
            fault_every: None,
            reads: 0,
        }
    }

    /// Simulate a different motion.
    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    /// Length of one gesture cycle in samples.
    pub fn with_period(mut self, period_samples: u32) -> Self {
        self.period_samples = period_samples.max(1);
        self
    }

    /// Peak amplitude of the added noise, in raw units.
    pub fn with_noise(mut self, noise: f32) -> Self {
        self.noise = noise.abs();
        self
    }

    /// Fail every `n`-th read with a transport error.
    pub fn with_fault_every(mut self, n: u64) -> Self {
        self.fault_every = (n > 0).then_some(n);
        self
    }

    /// Change the simulated motion in place.
    pub fn set_motion(&mut self, motion: Motion) {
        self.motion = motion;
    }

    /// Total reads attempted, including failed ones.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    fn signal(&self, phase: f32) -> [f32; IMU_AXES] {
        let amp = 0.5 * ONE_G;
        match self.motion {
            Motion::Idle => [0.0, 0.0, ONE_G, 0.0, 0.0, 0.0],
            Motion::Circle => [
                amp * (TAU * phase).sin(),
                amp * (TAU * phase).cos(),
                ONE_G,
                0.0,
                0.0,
                4000.0,
            ],
            Motion::SideToSide => [
                amp * (TAU * phase).sin(),
                0.0,
                ONE_G,
                0.0,
                0.0,
                2000.0 * (TAU * phase).cos(),
            ],
            Motion::Square => {
                let (x, y) = match (phase * 4.0) as u32 {
                    0 => (amp, 0.0),
                    1 => (0.0, amp),
                    2 => (-amp, 0.0),
                    _ => (0.0, -amp),
                };
                [x, y, ONE_G, 0.0, 0.0, 0.0]
            }
        }
    }
}

impl SampleSource for MockImu {
    fn axes(&self) -> usize {
        IMU_AXES
    }

    fn read_sample(&mut self, out: &mut [i16]) -> Result<(), SensorError> {
        self.reads += 1;
        if let Some(n) = self.fault_every {
            if self.reads % n == 0 {
                return Err(SensorError::Transport { code: -1 });
            }
        }

        let step = (self.reads - 1) % u64::from(self.period_samples);
        let phase = step as f32 / self.period_samples as f32;
        let clean = self.signal(phase);
        for (dst, value) in out.iter_mut().zip(clean) {
            let noisy = if self.noise > 0.0 {
                value + self.rng.gen_range(-self.noise..=self.noise)
            } else {
                value
            };
            *dst = noisy.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        }
        Ok(())
    }
}

// =============================================================================
// CountingImu - Ordering check source
// =============================================================================

/// Emits `sample_index * axes + axis` (wrapping) on every axis.
///
/// Any reordering, gap or duplicate in the acquisition path shows up as a
/// break in the sequence.
pub struct CountingImu {
    axes: usize,
    next: i16,
}

impl CountingImu {
    /// Create a counting source with `axes` channels.
    pub fn new(axes: usize) -> Self {
        Self { axes, next: 0 }
    }

    /// Value the next read starts with.
    pub fn next_value(&self) -> i16 {
        self.next
    }
}

impl SampleSource for CountingImu {
    fn axes(&self) -> usize {
        self.axes
    }

    fn read_sample(&mut self, out: &mut [i16]) -> Result<(), SensorError> {
        for dst in out.iter_mut() {
            *dst = self.next;
            self.next = self.next.wrapping_add(1);
        }
        Ok(())
    }
}
