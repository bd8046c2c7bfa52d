//! Direct-form IIR (Infinite Impulse Response) filtering, one state per channel.
use crate::data::WindowStage;
use crate::error::DaqError;
use biquad::{Coefficients, ToHertz, Q_BUTTERWORTH_F32};
use serde::{Deserialize, Serialize};

/// Fixed tap-history capacity. A filter of order `n` needs `n + 1` taps.
pub const MAX_FILTER_TAPS: usize = 10;

/// Numerator coefficients of the 3rd-order Butterworth low-pass used by default.
pub const BUTTERWORTH3_B: [f32; 4] = [0.01809893, 0.0542968, 0.0542968, 0.01809893];

/// Denominator coefficients of the 3rd-order Butterworth low-pass used by default.
pub const BUTTERWORTH3_A: [f32; 4] = [1.0, -1.76004188, 1.18289326, -0.27805992];

/// The type of second-order section to design.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// A low-pass filter allows frequencies below the cutoff frequency to pass through.
    Lowpass,
    /// A high-pass filter allows frequencies above the cutoff frequency to pass through.
    Highpass,
    /// A band-pass filter allows frequencies within a certain range to pass through.
    Bandpass,
    /// A band-stop (or notch) filter rejects frequencies within a certain range.
    Bandstop,
}

/// Where the filter coefficients come from.
///
/// # Example Configuration (`.toml`)
///
/// ```toml
/// [filter]
/// kind = "biquad"
/// filter_type = "lowpass"
/// cutoff_hz = 10.0
/// q_factor = 0.707  # Optional quality factor
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterDesign {
    /// 3rd-order Butterworth low-pass at 0.1 of the sample rate.
    Butterworth3,
    /// Explicit coefficient arrays. `a[0]` is treated as 1.
    Custom {
        /// Feed-forward coefficients `b[0..=n]`.
        b: Vec<f32>,
        /// Feedback coefficients `a[0..=n]`.
        a: Vec<f32>,
    },
    /// A second-order section designed for the sensor sample rate.
    Biquad {
        /// The type of filter to apply.
        filter_type: FilterType,
        /// The cutoff or center frequency of the filter in Hz.
        cutoff_hz: f32,
        /// The quality factor. Defaults to the Butterworth value when absent.
        #[serde(default)]
        q_factor: Option<f32>,
    },
}

impl Default for FilterDesign {
    fn default() -> Self {
        FilterDesign::Butterworth3
    }
}

/// Coefficient arrays for a filter of a given order, stored in fixed arrays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCoefficients {
    b: [f32; MAX_FILTER_TAPS],
    a: [f32; MAX_FILTER_TAPS],
    order: usize,
}

impl FilterCoefficients {
    /// Build coefficients from `b[0..=n]` and `a[0..=n]`.
    ///
    /// `a[0]` is ignored and stored as 1; `b` is taken as given.
    ///
    /// # Errors
    /// `BadArgument` if the arrays are empty, differ in length, or need more
    /// than [`MAX_FILTER_TAPS`] taps.
    pub fn new(b: &[f32], a: &[f32]) -> Result<Self, DaqError> {
        if b.is_empty() || b.len() != a.len() {
            return Err(DaqError::BadArgument(format!(
                "filter needs equal, non-empty coefficient arrays (b: {}, a: {})",
                b.len(),
                a.len()
            )));
        }
        if b.len() > MAX_FILTER_TAPS {
            return Err(DaqError::BadArgument(format!(
                "filter order {} exceeds tap capacity (max order {})",
                b.len() - 1,
                MAX_FILTER_TAPS - 1
            )));
        }

        let mut coeffs = Self {
            b: [0.0; MAX_FILTER_TAPS],
            a: [0.0; MAX_FILTER_TAPS],
            order: b.len() - 1,
        };
        coeffs.b[..b.len()].copy_from_slice(b);
        coeffs.a[..a.len()].copy_from_slice(a);
        coeffs.a[0] = 1.0;
        Ok(coeffs)
    }

    /// Resolve a [`FilterDesign`] for the given sample rate.
    pub fn from_design(design: &FilterDesign, sample_rate_hz: f32) -> Result<Self, DaqError> {
        match design {
            FilterDesign::Butterworth3 => Self::new(&BUTTERWORTH3_B, &BUTTERWORTH3_A),
            FilterDesign::Custom { b, a } => Self::new(b, a),
            FilterDesign::Biquad {
                filter_type,
                cutoff_hz,
                q_factor,
            } => {
                let section = design_biquad(*filter_type, sample_rate_hz, *cutoff_hz, *q_factor)?;
                Self::new(
                    &[section.b0, section.b1, section.b2],
                    &[1.0, section.a1, section.a2],
                )
            }
        }
    }

    /// The filter order `n`.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Feed-forward coefficients `b[0..=n]`.
    pub fn b(&self) -> &[f32] {
        &self.b[..=self.order]
    }

    /// Feedback coefficients `a[0..=n]`.
    pub fn a(&self) -> &[f32] {
        &self.a[..=self.order]
    }
}

fn design_biquad(
    filter_type: FilterType,
    fs: f32,
    f0: f32,
    q: Option<f32>,
) -> Result<Coefficients<f32>, DaqError> {
    let q = q.unwrap_or(Q_BUTTERWORTH_F32);
    let kind = match filter_type {
        FilterType::Lowpass => biquad::Type::LowPass,
        FilterType::Highpass => biquad::Type::HighPass,
        FilterType::Bandpass => biquad::Type::BandPass,
        FilterType::Bandstop => biquad::Type::Notch,
    };
    Coefficients::<f32>::from_params(kind, fs.hz(), f0.hz(), q).map_err(|e| {
        DaqError::BadArgument(format!(
            "cannot design {filter_type:?} filter at {f0} Hz for {fs} Hz sampling: {e:?}"
        ))
    })
}

/// Input and output tap history of one channel.
///
/// `x[0]`/`y[0]` hold the newest values. Zeroed on construction and never reset
/// afterwards, so the filter runs continuously across window boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    x: [f32; MAX_FILTER_TAPS],
    y: [f32; MAX_FILTER_TAPS],
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            x: [0.0; MAX_FILTER_TAPS],
            y: [0.0; MAX_FILTER_TAPS],
        }
    }
}

/// A single-channel direct-form IIR filter.
#[derive(Debug, Clone)]
pub struct IirFilter {
    coeffs: FilterCoefficients,
    state: FilterState,
}

impl IirFilter {
    /// Create a filter with zeroed state.
    pub fn new(coeffs: FilterCoefficients) -> Self {
        Self {
            coeffs,
            state: FilterState::default(),
        }
    }

    /// Filter one sample and advance the tap history.
    ///
    /// `y[0] = b[0]*x[0] + sum_{j=1..n} (b[j]*x[j] - a[j]*y[j])`
    #[inline]
    pub fn run(&mut self, input: f32) -> f32 {
        let n = self.coeffs.order;
        let b = &self.coeffs.b;
        let a = &self.coeffs.a;
        let st = &mut self.state;

        st.x[0] = input;
        let mut out = b[0] * st.x[0];
        for j in 1..=n {
            out += b[j] * st.x[j];
            out -= a[j] * st.y[j];
        }
        st.y[0] = out;

        // Oldest taps fall off the end.
        for j in (0..n).rev() {
            st.x[j + 1] = st.x[j];
            st.y[j + 1] = st.y[j];
        }
        out
    }

    /// Current tap history.
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// The coefficients this filter runs with.
    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coeffs
    }
}

/// One independent [`IirFilter`] per channel of an interleaved window.
#[derive(Debug, Clone)]
pub struct FilterBank {
    filters: Vec<IirFilter>,
}

impl FilterBank {
    /// Create `channels` filters sharing the same coefficients.
    pub fn new(coeffs: FilterCoefficients, channels: usize) -> Result<Self, DaqError> {
        if channels == 0 {
            return Err(DaqError::BadArgument("filter bank needs at least one channel".into()));
        }
        Ok(Self {
            filters: vec![IirFilter::new(coeffs); channels],
        })
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.filters.len()
    }

    /// Filter of one channel.
    pub fn channel(&self, index: usize) -> Option<&IirFilter> {
        self.filters.get(index)
    }
}

impl WindowStage for FilterBank {
    fn name(&self) -> &'static str {
        "iir_filter"
    }

    fn apply(&mut self, window: &mut [f32]) {
        for frame in window.chunks_exact_mut(self.filters.len()) {
            for (value, filter) in frame.iter_mut().zip(self.filters.iter_mut()) {
                *value = filter.run(*value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn butterworth() -> FilterCoefficients {
        FilterCoefficients::from_design(&FilterDesign::Butterworth3, 128.0).unwrap()
    }

    #[test]
    fn test_butterworth_creation() {
        let coeffs = butterworth();
        assert_eq!(coeffs.order(), 3);
        assert_eq!(coeffs.b(), &BUTTERWORTH3_B);
        assert_eq!(coeffs.a(), &BUTTERWORTH3_A);
    }

    #[test]
    fn test_order_exceeding_capacity() {
        let b = [0.1f32; MAX_FILTER_TAPS + 1];
        let a = [0.1f32; MAX_FILTER_TAPS + 1];
        assert!(matches!(
            FilterCoefficients::new(&b, &a),
            Err(DaqError::BadArgument(_))
        ));
        // Highest supported order fits exactly.
        assert!(FilterCoefficients::new(&b[..MAX_FILTER_TAPS], &a[..MAX_FILTER_TAPS]).is_ok());
    }

    #[test]
    fn test_mismatched_lengths() {
        assert!(FilterCoefficients::new(&[1.0, 0.5], &[1.0]).is_err());
        assert!(FilterCoefficients::new(&[], &[]).is_err());
    }

    #[test]
    fn test_a0_is_implicit() {
        let coeffs = FilterCoefficients::new(&[0.5, 0.5], &[3.0, 0.0]).unwrap();
        assert_eq!(coeffs.a()[0], 1.0);
    }

    #[test]
    fn test_a0_does_not_scale_output() {
        for a0 in [0.0, 2.0, -4.0] {
            let mut filter = IirFilter::new(FilterCoefficients::new(&[2.0], &[a0]).unwrap());
            assert_eq!(filter.run(1.0), 2.0);
            assert_eq!(filter.run(3.0), 6.0);
        }
    }

    #[test]
    fn test_impulse_response() {
        // y[k] = 0.5 x[k] + 0.5 x[k-1] - (-0.5) y[k-1]
        let coeffs = FilterCoefficients::new(&[0.5, 0.5], &[1.0, -0.5]).unwrap();
        let mut filter = IirFilter::new(coeffs);
        let out: Vec<f32> = [1.0, 0.0, 0.0, 0.0].iter().map(|&x| filter.run(x)).collect();
        assert_eq!(out, vec![0.5, 0.75, 0.375, 0.1875]);
    }

    #[test]
    fn test_dc_gain_of_lowpass() {
        let mut filter = IirFilter::new(butterworth());
        let mut last = 0.0;
        for _ in 0..2000 {
            last = filter.run(1000.0);
        }
        assert!((last - 1000.0).abs() < 1.0, "settled at {last}");
    }

    #[test]
    fn test_biquad_design() {
        let design = FilterDesign::Biquad {
            filter_type: FilterType::Lowpass,
            cutoff_hz: 10.0,
            q_factor: None,
        };
        let coeffs = FilterCoefficients::from_design(&design, 128.0).unwrap();
        assert_eq!(coeffs.order(), 2);
    }

    #[test]
    fn test_invalid_biquad_params() {
        // f0 > fs / 2
        let design = FilterDesign::Biquad {
            filter_type: FilterType::Lowpass,
            cutoff_hz: 100.0,
            q_factor: None,
        };
        assert!(FilterCoefficients::from_design(&design, 128.0).is_err());
    }

    #[test]
    fn test_bank_channels_are_independent() {
        let mut bank = FilterBank::new(butterworth(), 2).unwrap();
        let mut reference = IirFilter::new(butterworth());

        // Channel 0 gets a ramp, channel 1 stays at zero.
        let mut window: Vec<f32> = (0..16).flat_map(|i| [i as f32, 0.0]).collect();
        bank.apply(&mut window);

        for (i, frame) in window.chunks_exact(2).enumerate() {
            assert_eq!(frame[0], reference.run(i as f32));
            assert_eq!(frame[1], 0.0);
        }
    }
}
