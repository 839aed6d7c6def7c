//! Scalar float semantics: deterministic NaN propagation, round-to-even and
//! saturating/trapping float-to-int truncation.
//!
//! NaN payloads are normalized so results are reproducible across hosts:
//! the canonical NaN is the quiet NaN with an otherwise-empty payload
//! (`0x7fc0_0000` / `0x7ff8_0000_0000_0000`), and the canonical *arithmetic*
//! NaN is the canonical NaN with its lowest payload bit set, positive sign.
//! An operation producing a NaN yields the canonical NaN when some input was
//! a canonical NaN, and the arithmetic form otherwise.

use crate::compile::ir::SignedInt;
use crate::traps::Trap;

pub(crate) const CANON_NAN_F32: u32 = 0x7fc0_0000;
pub(crate) const CANON_NAN_F64: u64 = 0x7ff8_0000_0000_0000;
pub(crate) const ARITH_NAN_F32: u32 = CANON_NAN_F32 | 1;
pub(crate) const ARITH_NAN_F64: u64 = CANON_NAN_F64 | 1;

#[inline]
pub(crate) fn is_canonical_nan_f32(bits: u32) -> bool {
    bits & 0x7fff_ffff == CANON_NAN_F32
}

#[inline]
pub(crate) fn is_canonical_nan_f64(bits: u64) -> bool {
    bits & 0x7fff_ffff_ffff_ffff == CANON_NAN_F64
}

/// Normalize a float result's NaN payload based on the operation's inputs.
#[inline]
pub(crate) fn canonicalize_f32(result: f32, inputs: &[f32]) -> f32 {
    if !result.is_nan() {
        return result;
    }
    if inputs
        .iter()
        .any(|v| is_canonical_nan_f32(v.to_bits()))
    {
        f32::from_bits(CANON_NAN_F32)
    } else {
        f32::from_bits(ARITH_NAN_F32)
    }
}

#[inline]
pub(crate) fn canonicalize_f64(result: f64, inputs: &[f64]) -> f64 {
    if !result.is_nan() {
        return result;
    }
    if inputs
        .iter()
        .any(|v| is_canonical_nan_f64(v.to_bits()))
    {
        f64::from_bits(CANON_NAN_F64)
    } else {
        f64::from_bits(ARITH_NAN_F64)
    }
}

/// `min` with wasm semantics: NaN-propagating, and -0.0 < +0.0.
#[inline]
pub(crate) fn fmin_f64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return canonicalize_f64(f64::NAN, &[a, b]);
    }
    if a == b {
        // Zeros compare equal regardless of sign.
        return if a.is_sign_negative() { a } else { b };
    }
    if a < b {
        a
    } else {
        b
    }
}

#[inline]
pub(crate) fn fmax_f64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return canonicalize_f64(f64::NAN, &[a, b]);
    }
    if a == b {
        return if a.is_sign_positive() { a } else { b };
    }
    if a > b {
        a
    } else {
        b
    }
}

#[inline]
pub(crate) fn fmin_f32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return canonicalize_f32(f32::NAN, &[a, b]);
    }
    if a == b {
        return if a.is_sign_negative() { a } else { b };
    }
    if a < b {
        a
    } else {
        b
    }
}

#[inline]
pub(crate) fn fmax_f32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return canonicalize_f32(f32::NAN, &[a, b]);
    }
    if a == b {
        return if a.is_sign_positive() { a } else { b };
    }
    if a > b {
        a
    } else {
        b
    }
}

/// Float-to-integer truncation over an `f64` (f32 inputs are promoted
/// losslessly first).
///
/// Trapping mode raises [`Trap::InvalidConversionToInteger`] for NaN and
/// [`Trap::IntegerOverflow`] for out-of-range values; non-trapping mode
/// saturates (NaN to zero, infinities and overflow to the type bounds).
/// The result is the integer's raw slot encoding.
pub(crate) fn trunc_float_to_int(
    value: f64,
    output: SignedInt,
    non_trapping: bool,
) -> Result<u64, Trap> {
    let truncated = value.trunc();

    if truncated.is_nan() {
        return if non_trapping {
            Ok(0)
        } else {
            Err(Trap::InvalidConversionToInteger)
        };
    }

    // Bounds are expressed as "first float at or past the limit" so the
    // comparisons are exact for both f32-promoted and f64 inputs.
    let (low_ok, high_ok, min_slot, max_slot): (bool, bool, u64, u64) = match output {
        SignedInt::I32 => (
            truncated >= -2_147_483_648.0,
            truncated <= 2_147_483_647.0,
            u64::from(i32::MIN as u32),
            u64::from(i32::MAX as u32),
        ),
        SignedInt::U32 => (
            truncated > -1.0,
            truncated <= 4_294_967_295.0,
            0,
            u64::from(u32::MAX),
        ),
        SignedInt::I64 => (
            truncated >= -9_223_372_036_854_775_808.0,
            // 2^63 - 1 is not representable; the nearest representable
            // bound below 2^63 is what a float can actually hold.
            truncated < 9_223_372_036_854_775_808.0,
            i64::MIN as u64,
            i64::MAX as u64,
        ),
        SignedInt::U64 => (
            truncated > -1.0,
            truncated < 18_446_744_073_709_551_616.0,
            0,
            u64::MAX,
        ),
    };

    if !low_ok {
        return if non_trapping {
            Ok(min_slot)
        } else {
            Err(Trap::IntegerOverflow)
        };
    }
    if !high_ok {
        return if non_trapping {
            Ok(max_slot)
        } else {
            Err(Trap::IntegerOverflow)
        };
    }

    Ok(match output {
        SignedInt::I32 => u64::from(truncated as i32 as u32),
        SignedInt::U32 => u64::from(truncated as u32),
        SignedInt::I64 => truncated as i64 as u64,
        SignedInt::U64 => truncated as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_nan_stays_canonical() {
        let canon = f32::from_bits(CANON_NAN_F32);
        let out = canonicalize_f32(canon + 1.0, &[canon, 1.0]);
        assert_eq!(out.to_bits(), CANON_NAN_F32);
    }

    #[test]
    fn arithmetic_nan_stays_arithmetic() {
        let weird = f32::from_bits(0x7fc1_2345);
        let out = canonicalize_f32(weird + 1.0, &[weird, 1.0]);
        assert_eq!(out.to_bits(), ARITH_NAN_F32);
    }

    #[test]
    fn generated_nan_is_arithmetic() {
        let out = canonicalize_f64(f64::INFINITY - f64::INFINITY, &[f64::INFINITY, f64::NEG_INFINITY]);
        assert_eq!(out.to_bits(), ARITH_NAN_F64);
    }

    #[test]
    fn min_max_zero_signs() {
        assert!(fmin_f64(0.0, -0.0).is_sign_negative());
        assert!(fmax_f64(-0.0, 0.0).is_sign_positive());
        assert!(fmin_f32(-0.0, 0.0).is_sign_negative());
    }

    #[test]
    fn trunc_sat_i32_table() {
        let cases: &[(f64, u64)] = &[
            (f64::NAN, 0),
            (f64::INFINITY, 0x7fff_ffff),
            (f64::NEG_INFINITY, 0x8000_0000),
            (3.1e9, 0x7fff_ffff),
            (-3.1e9, 0x8000_0000),
            (1.5, 1),
            (-1.5, 0xffff_ffff),
        ];
        for (input, expect) in cases {
            let got = trunc_float_to_int(*input, SignedInt::I32, true).unwrap();
            assert_eq!(got, *expect, "input {input}");
        }
    }

    #[test]
    fn trunc_traps_without_flag() {
        assert_eq!(
            trunc_float_to_int(f64::NAN, SignedInt::I32, false),
            Err(Trap::InvalidConversionToInteger)
        );
        assert_eq!(
            trunc_float_to_int(3.1e9, SignedInt::I32, false),
            Err(Trap::IntegerOverflow)
        );
    }

    #[test]
    fn trunc_u32_negative_fraction_is_zero() {
        assert_eq!(trunc_float_to_int(-0.75, SignedInt::U32, false), Ok(0));
        assert_eq!(
            trunc_float_to_int(-1.0, SignedInt::U32, false),
            Err(Trap::IntegerOverflow)
        );
    }

    #[test]
    fn trunc_edge_i32() {
        assert_eq!(
            trunc_float_to_int(2_147_483_647.9, SignedInt::I32, false),
            Ok(0x7fff_ffff)
        );
        assert_eq!(
            trunc_float_to_int(-2_147_483_648.9, SignedInt::I32, false),
            Ok(0x8000_0000)
        );
    }
}
