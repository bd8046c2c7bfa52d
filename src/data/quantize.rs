//! Float to fixed-point conversion in a declared Q-format.
//!
//! A Q-format with `q` fraction bits maps a value `v` to the integer code
//! `round(v * 2^q)` and back with `code / 2^q`. Rounding is half away from
//! zero: a `+0.5` bias for non-negative values and `-0.5` for negative ones,
//! followed by truncation. Codes saturate at the bounds of the code type.
use crate::error::DaqError;
use serde::{Deserialize, Serialize};

/// Integer code types an inference input slot may use.
pub trait FixedPointCode: Copy + Default + Send + 'static {
    /// Number of value bits, i.e. the largest usable `q`.
    const VALUE_BITS: u8;

    /// Convert a biased, already-scaled value. Truncates toward zero and saturates.
    fn from_scaled(biased: f32) -> Self;

    /// Widen the code to `f32` without scaling.
    fn to_f32(self) -> f32;
}

impl FixedPointCode for i8 {
    const VALUE_BITS: u8 = 7;

    #[inline]
    fn from_scaled(biased: f32) -> Self {
        // `as` truncates toward zero and saturates out-of-range values.
        biased as i8
    }

    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl FixedPointCode for i16 {
    const VALUE_BITS: u8 = 15;

    #[inline]
    fn from_scaled(biased: f32) -> Self {
        biased as i16
    }

    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

/// Fixed-point scale `2^q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QFormat {
    q: u8,
}

impl QFormat {
    /// Create a Q-format for code type `C`.
    ///
    /// # Errors
    /// `BadArgument` if `q` exceeds the value bits of `C`.
    pub fn new<C: FixedPointCode>(q: u8) -> Result<Self, DaqError> {
        if q > C::VALUE_BITS {
            return Err(DaqError::BadArgument(format!(
                "q = {q} exceeds the {} value bits of {}",
                C::VALUE_BITS,
                std::any::type_name::<C>()
            )));
        }
        Ok(Self { q })
    }

    /// Fraction bits.
    pub fn q(&self) -> u8 {
        self.q
    }

    /// The scale factor `2^q`.
    pub fn scale(&self) -> f32 {
        (1u32 << self.q) as f32
    }

    /// Quantize a single value.
    #[inline]
    pub fn quantize<C: FixedPointCode>(&self, value: f32) -> C {
        let scaled = value * self.scale();
        if value >= 0.0 {
            C::from_scaled(scaled + 0.5)
        } else {
            C::from_scaled(scaled - 0.5)
        }
    }

    /// Recover the value a code stands for.
    #[inline]
    pub fn dequantize<C: FixedPointCode>(&self, code: C) -> f32 {
        code.to_f32() / self.scale()
    }

    /// Quantize `input` into `output` element by element.
    pub fn quantize_slice<C: FixedPointCode>(&self, input: &[f32], output: &mut [C]) {
        for (code, &value) in output.iter_mut().zip(input) {
            *code = self.quantize(value);
        }
    }

    /// Dequantize `input` into `output` element by element.
    pub fn dequantize_slice<C: FixedPointCode>(&self, input: &[C], output: &mut [f32]) {
        for (value, &code) in output.iter_mut().zip(input) {
            *value = self.dequantize(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_values_q7() {
        let fmt = QFormat::new::<i8>(7).unwrap();
        assert_eq!(fmt.quantize::<i8>(0.5), 64);
        assert_eq!(fmt.quantize::<i8>(-0.5), -64);
        assert_eq!(fmt.quantize::<i16>(0.5), 64);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let fmt = QFormat::new::<i16>(1).unwrap();
        // 0.25 * 2 = 0.5 -> 1, -0.25 * 2 = -0.5 -> -1
        assert_eq!(fmt.quantize::<i16>(0.25), 1);
        assert_eq!(fmt.quantize::<i16>(-0.25), -1);
        assert_eq!(fmt.quantize::<i16>(0.2), 0);
        assert_eq!(fmt.quantize::<i16>(-0.2), 0);
    }

    #[test]
    fn test_saturation() {
        let q7 = QFormat::new::<i8>(7).unwrap();
        assert_eq!(q7.quantize::<i8>(1.0), i8::MAX);
        assert_eq!(q7.quantize::<i8>(-1.0), -128);
        assert_eq!(q7.quantize::<i8>(-2.0), i8::MIN);

        let q15 = QFormat::new::<i16>(15).unwrap();
        assert_eq!(q15.quantize::<i16>(1.0), i16::MAX);
        assert_eq!(q15.quantize::<i16>(-1.0), i16::MIN);
    }

    #[test]
    fn test_every_code_roundtrips() {
        let q7 = QFormat::new::<i8>(7).unwrap();
        for code in i8::MIN..=i8::MAX {
            assert_eq!(q7.quantize::<i8>(q7.dequantize(code)), code);
        }
        let q15 = QFormat::new::<i16>(15).unwrap();
        for code in i16::MIN..=i16::MAX {
            assert_eq!(q15.quantize::<i16>(q15.dequantize(code)), code);
        }
    }

    #[test]
    fn test_q_too_large() {
        assert!(QFormat::new::<i8>(8).is_err());
        assert!(QFormat::new::<i16>(15).is_ok());
        assert!(QFormat::new::<i16>(16).is_err());
    }

    #[test]
    fn test_slices() {
        let fmt = QFormat::new::<i8>(7).unwrap();
        let mut codes = [0i8; 3];
        fmt.quantize_slice(&[0.5, -0.25, 0.0], &mut codes);
        assert_eq!(codes, [64, -32, 0]);

        let mut values = [0.0f32; 3];
        fmt.dequantize_slice(&codes, &mut values);
        assert_eq!(values, [0.5, -0.25, 0.0]);
    }
}
