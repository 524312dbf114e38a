//! Conversion of mask descriptions into concrete masks.
//!
//! When no scale is given, the mask is normalized so that a flat kernel
//! preserves mean brightness: the scale is the sum of one coefficient plane,
//! or 1 when that sum is zero. The offset defaults to 0.

use crate::core::error::{MaskError, MaskResult};
use crate::mask::description::MaskDescription;
use crate::mask::types::{FloatMask, IntMask, Mask};

/// Largest coefficient, scale or offset magnitude an integer mask may hold.
pub const INT_COEFFICIENT_LIMIT: i64 = i32::MAX as i64;

/// Convert to an integer mask.
///
/// Coefficients, an explicit scale and the offset are rounded to nearest.
/// The default scale is computed from the rounded coefficients so integer
/// arithmetic stays exact.
pub fn to_integer(description: &MaskDescription) -> MaskResult<IntMask> {
    description.check_dimensions()?;

    let coefficients = description
        .coefficients
        .iter()
        .enumerate()
        .map(|(i, &c)| round_to_int(&format!("coefficient {}", i), c))
        .collect::<MaskResult<Vec<i32>>>()?;

    let scale = match description.scale {
        Some(scale) => round_to_int("scale", scale)?,
        None => {
            let total: i64 = coefficients.iter().map(|&c| c as i64).sum();
            let plane_sum = div_round(total, description.bands as i64);
            if plane_sum == 0 {
                1
            } else {
                i32::try_from(plane_sum)
                    .map_err(|_| MaskError::overflow("scale", plane_sum as f64))?
            }
        }
    };
    if scale == 0 {
        return Err(MaskError::ZeroScale);
    }

    let offset = match description.offset {
        Some(offset) => round_to_int("offset", offset)?,
        None => 0,
    };

    Ok(Mask::from_parts(
        description.width,
        description.height,
        description.bands,
        coefficients,
        scale,
        offset,
    ))
}

/// Convert to a floating point mask. Values pass through unchanged.
pub fn to_float(description: &MaskDescription) -> MaskResult<FloatMask> {
    description.check_dimensions()?;

    if let Some(i) = description.coefficients.iter().position(|c| !c.is_finite()) {
        return Err(MaskError::non_finite(format!("coefficient {}", i)));
    }

    let scale = match description.scale {
        Some(scale) => finite("scale", scale)?,
        None => {
            let plane_sum = description.coefficients.iter().sum::<f64>() / description.bands as f64;
            if plane_sum == 0.0 {
                1.0
            } else {
                finite("scale", plane_sum)?
            }
        }
    };
    if scale == 0.0 {
        return Err(MaskError::ZeroScale);
    }

    let offset = match description.offset {
        Some(offset) => finite("offset", offset)?,
        None => 0.0,
    };

    Ok(Mask::from_parts(
        description.width,
        description.height,
        description.bands,
        description.coefficients.clone(),
        scale,
        offset,
    ))
}

fn finite(field: &str, value: f64) -> MaskResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MaskError::non_finite(field))
    }
}

fn round_to_int(field: &str, value: f64) -> MaskResult<i32> {
    let rounded = finite(field, value)?.round();
    if rounded.abs() > INT_COEFFICIENT_LIMIT as f64 {
        return Err(MaskError::overflow(field, value));
    }
    Ok(rounded as i32)
}

/// Integer division rounding halves away from zero.
pub(crate) fn div_round(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if 2 * remainder.abs() >= denominator.abs() {
        quotient + (numerator.signum() * denominator.signum())
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::types::Representation;
    use proptest::prelude::*;

    #[test]
    fn test_default_scale_is_coefficient_sum() {
        let desc = MaskDescription::new(3, 3, vec![1.0; 9]);

        let int_mask = to_integer(&desc).unwrap();
        assert_eq!(int_mask.scale(), 9);
        assert_eq!(int_mask.offset(), 0);
        assert_eq!(int_mask.representation(), Representation::Integer);

        let float_mask = to_float(&desc).unwrap();
        assert_eq!(float_mask.scale(), 9.0);
        assert_eq!(float_mask.offset(), 0.0);
    }

    #[test]
    fn test_zero_sum_falls_back_to_unit_scale() {
        let desc = MaskDescription::new(3, 1, vec![-1.0, 0.0, 1.0]);
        assert_eq!(to_integer(&desc).unwrap().scale(), 1);
        assert_eq!(to_float(&desc).unwrap().scale(), 1.0);
    }

    #[test]
    fn test_per_band_default_scale() {
        let desc = MaskDescription::new(1, 1, vec![2.0, 2.0, 2.0]).with_bands(3);
        assert_eq!(to_integer(&desc).unwrap().scale(), 2);
        assert_eq!(to_float(&desc).unwrap().scale(), 2.0);
    }

    #[test]
    fn test_explicit_normalization() {
        let desc = MaskDescription::new(2, 1, vec![1.4, 2.6])
            .with_scale(2.4)
            .with_offset(-0.6);

        let int_mask = to_integer(&desc).unwrap();
        assert_eq!(int_mask.coefficients(), &[1, 3]);
        assert_eq!(int_mask.scale(), 2);
        assert_eq!(int_mask.offset(), -1);

        let float_mask = to_float(&desc).unwrap();
        assert_eq!(float_mask.coefficients(), &[1.4, 2.6]);
        assert_eq!(float_mask.scale(), 2.4);
        assert_eq!(float_mask.offset(), -0.6);
    }

    #[test]
    fn test_default_integer_scale_uses_rounded_coefficients() {
        let desc = MaskDescription::new(3, 1, vec![0.4, 0.4, 0.4]);
        let int_mask = to_integer(&desc).unwrap();
        assert_eq!(int_mask.coefficients(), &[0, 0, 0]);
        assert_eq!(int_mask.scale(), 1);
    }

    #[test]
    fn test_zero_scale_rejected() {
        let desc = MaskDescription::new(1, 1, vec![1.0]).with_scale(0.4);
        assert_eq!(to_integer(&desc), Err(MaskError::ZeroScale));
        assert!(to_float(&desc).is_ok());

        let desc = MaskDescription::new(1, 1, vec![1.0]).with_scale(0.0);
        assert_eq!(to_float(&desc), Err(MaskError::ZeroScale));
    }

    #[test]
    fn test_non_finite_rejected() {
        let desc = MaskDescription::new(2, 1, vec![1.0, f64::NAN]);
        assert!(matches!(to_integer(&desc), Err(MaskError::NonFinite { .. })));
        assert!(matches!(to_float(&desc), Err(MaskError::NonFinite { .. })));

        let desc = MaskDescription::new(1, 1, vec![1.0]).with_offset(f64::INFINITY);
        assert!(matches!(to_float(&desc), Err(MaskError::NonFinite { .. })));
    }

    #[test]
    fn test_overflowing_default_scale_rejected() {
        let desc = MaskDescription::new(2, 1, vec![f64::MAX, f64::MAX]);
        match to_float(&desc) {
            Err(MaskError::NonFinite { field }) => assert_eq!(field, "scale"),
            other => panic!("unexpected result: {:?}", other),
        }

        let desc = MaskDescription::new(2, 1, vec![f64::MAX, -f64::MAX]);
        assert_eq!(to_float(&desc).unwrap().scale(), 1.0);
    }

    #[test]
    fn test_integer_limit() {
        let desc = MaskDescription::new(1, 1, vec![3.0e9]);
        assert!(matches!(
            to_integer(&desc),
            Err(MaskError::IntegerOverflow { .. })
        ));
        assert!(to_float(&desc).is_ok());
    }

    #[test]
    fn test_div_round() {
        assert_eq!(div_round(7, 2), 4);
        assert_eq!(div_round(-7, 2), -4);
        assert_eq!(div_round(5, 3), 2);
        assert_eq!(div_round(4, 3), 1);
        assert_eq!(div_round(-5, -3), 2);
        assert_eq!(div_round(9, 9), 1);
    }

    proptest! {
        #[test]
        fn prop_length_mismatch_always_rejected(
            width in 1usize..6,
            height in 1usize..6,
            bands in 1usize..4,
            delta in 1usize..5,
            longer in any::<bool>(),
        ) {
            let expected = width * height * bands;
            let len = if longer { expected + delta } else { expected.saturating_sub(delta) };
            let desc = MaskDescription::new(width, height, vec![1.0; len]).with_bands(bands);

            let is_length_mismatch = |e: &MaskError| matches!(e, MaskError::LengthMismatch { .. });
            prop_assert!(to_integer(&desc).err().map_or(false, |e| is_length_mismatch(&e)));
            prop_assert!(to_float(&desc).err().map_or(false, |e| is_length_mismatch(&e)));
        }
    }
}
