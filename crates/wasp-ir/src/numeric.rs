//! Reference model of Wasm numeric instruction semantics.
//!
//! Integers are carried as raw bit patterns in a `u64`; 32-bit operations use
//! the low 32 bits and produce a zero-extended result. Floats are computed in
//! `f64` and rounded to `f32` for 32-bit operations, which is exact for every
//! operation modelled here.

use crate::operation::{FloatBinaryOp, FloatCompareOp, FloatUnaryOp, IntBinaryOp, IntCompareOp, IntUnaryOp, NumWidth};
use wasp_core::TrapKind;

pub fn int_binary(width: NumWidth, op: IntBinaryOp, lhs: u64, rhs: u64) -> Result<u64, TrapKind> {
    match width {
        NumWidth::Bits32 => int_binary_32(op, lhs as u32, rhs as u32).map(|v| v as u64),
        NumWidth::Bits64 => int_binary_64(op, lhs, rhs),
    }
}

fn int_binary_32(op: IntBinaryOp, x: u32, y: u32) -> Result<u32, TrapKind> {
    let (sx, sy) = (x as i32, y as i32);
    Ok(match op {
        IntBinaryOp::Add => x.wrapping_add(y),
        IntBinaryOp::Sub => x.wrapping_sub(y),
        IntBinaryOp::Mul => x.wrapping_mul(y),
        IntBinaryOp::DivS => {
            if sy == 0 {
                return Err(TrapKind::IntegerDivisionByZero);
            }
            if sx == i32::MIN && sy == -1 {
                return Err(TrapKind::IntegerOverflow);
            }
            (sx / sy) as u32
        }
        IntBinaryOp::DivU => x.checked_div(y).ok_or(TrapKind::IntegerDivisionByZero)?,
        IntBinaryOp::RemS => {
            if sy == 0 {
                return Err(TrapKind::IntegerDivisionByZero);
            }
            sx.wrapping_rem(sy) as u32
        }
        IntBinaryOp::RemU => x.checked_rem(y).ok_or(TrapKind::IntegerDivisionByZero)?,
        IntBinaryOp::And => x & y,
        IntBinaryOp::Or => x | y,
        IntBinaryOp::Xor => x ^ y,
        IntBinaryOp::Shl => x.wrapping_shl(y),
        IntBinaryOp::ShrS => sx.wrapping_shr(y) as u32,
        IntBinaryOp::ShrU => x.wrapping_shr(y),
        IntBinaryOp::Rotl => x.rotate_left(y % 32),
        IntBinaryOp::Rotr => x.rotate_right(y % 32),
    })
}

fn int_binary_64(op: IntBinaryOp, x: u64, y: u64) -> Result<u64, TrapKind> {
    let (sx, sy) = (x as i64, y as i64);
    Ok(match op {
        IntBinaryOp::Add => x.wrapping_add(y),
        IntBinaryOp::Sub => x.wrapping_sub(y),
        IntBinaryOp::Mul => x.wrapping_mul(y),
        IntBinaryOp::DivS => {
            if sy == 0 {
                return Err(TrapKind::IntegerDivisionByZero);
            }
            if sx == i64::MIN && sy == -1 {
                return Err(TrapKind::IntegerOverflow);
            }
            (sx / sy) as u64
        }
        IntBinaryOp::DivU => x.checked_div(y).ok_or(TrapKind::IntegerDivisionByZero)?,
        IntBinaryOp::RemS => {
            if sy == 0 {
                return Err(TrapKind::IntegerDivisionByZero);
            }
            sx.wrapping_rem(sy) as u64
        }
        IntBinaryOp::RemU => x.checked_rem(y).ok_or(TrapKind::IntegerDivisionByZero)?,
        IntBinaryOp::And => x & y,
        IntBinaryOp::Or => x | y,
        IntBinaryOp::Xor => x ^ y,
        // Shift counts are taken modulo the bit width
        IntBinaryOp::Shl => x.wrapping_shl(y as u32),
        IntBinaryOp::ShrS => sx.wrapping_shr(y as u32) as u64,
        IntBinaryOp::ShrU => x.wrapping_shr(y as u32),
        IntBinaryOp::Rotl => x.rotate_left((y % 64) as u32),
        IntBinaryOp::Rotr => x.rotate_right((y % 64) as u32),
    })
}

pub fn int_unary(width: NumWidth, op: IntUnaryOp, value: u64) -> u64 {
    match width {
        NumWidth::Bits32 => {
            let x = value as u32;
            (match op {
                IntUnaryOp::Clz => x.leading_zeros(),
                IntUnaryOp::Ctz => x.trailing_zeros(),
                IntUnaryOp::Popcnt => x.count_ones(),
            }) as u64
        }
        NumWidth::Bits64 => (match op {
            IntUnaryOp::Clz => value.leading_zeros(),
            IntUnaryOp::Ctz => value.trailing_zeros(),
            IntUnaryOp::Popcnt => value.count_ones(),
        }) as u64,
    }
}

pub fn int_eqz(width: NumWidth, value: u64) -> bool {
    match width {
        NumWidth::Bits32 => value as u32 == 0,
        NumWidth::Bits64 => value == 0,
    }
}

pub fn int_compare(width: NumWidth, op: IntCompareOp, lhs: u64, rhs: u64) -> bool {
    let (x, y, sx, sy) = match width {
        NumWidth::Bits32 => (
            lhs as u32 as u64,
            rhs as u32 as u64,
            lhs as u32 as i32 as i64,
            rhs as u32 as i32 as i64,
        ),
        NumWidth::Bits64 => (lhs, rhs, lhs as i64, rhs as i64),
    };
    match op {
        IntCompareOp::Eq => x == y,
        IntCompareOp::Ne => x != y,
        IntCompareOp::LtS => sx < sy,
        IntCompareOp::LtU => x < y,
        IntCompareOp::GtS => sx > sy,
        IntCompareOp::GtU => x > y,
        IntCompareOp::LeS => sx <= sy,
        IntCompareOp::LeU => x <= y,
        IntCompareOp::GeS => sx >= sy,
        IntCompareOp::GeU => x >= y,
    }
}

fn round_to_width(width: NumWidth, value: f64) -> f64 {
    match width {
        NumWidth::Bits32 => value as f32 as f64,
        NumWidth::Bits64 => value,
    }
}

fn wasm_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() { a } else { b }
    } else {
        a.min(b)
    }
}

fn wasm_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_positive() { a } else { b }
    } else {
        a.max(b)
    }
}

/// Round to nearest, ties to even
fn nearest(x: f64) -> f64 {
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        x.round()
    }
}

pub fn float_binary(width: NumWidth, op: FloatBinaryOp, lhs: f64, rhs: f64) -> f64 {
    let (a, b) = (round_to_width(width, lhs), round_to_width(width, rhs));
    let result = match op {
        FloatBinaryOp::Add => a + b,
        FloatBinaryOp::Sub => a - b,
        FloatBinaryOp::Mul => a * b,
        FloatBinaryOp::Div => a / b,
        FloatBinaryOp::Min => wasm_min(a, b),
        FloatBinaryOp::Max => wasm_max(a, b),
        FloatBinaryOp::Copysign => a.copysign(b),
    };
    round_to_width(width, result)
}

pub fn float_unary(width: NumWidth, op: FloatUnaryOp, value: f64) -> f64 {
    let x = round_to_width(width, value);
    let result = match op {
        FloatUnaryOp::Abs => x.abs(),
        FloatUnaryOp::Neg => -x,
        FloatUnaryOp::Ceil => x.ceil(),
        FloatUnaryOp::Floor => x.floor(),
        FloatUnaryOp::Trunc => x.trunc(),
        FloatUnaryOp::Nearest => nearest(x),
        FloatUnaryOp::Sqrt => x.sqrt(),
    };
    round_to_width(width, result)
}

pub fn float_compare(op: FloatCompareOp, lhs: f64, rhs: f64) -> bool {
    match op {
        FloatCompareOp::Eq => lhs == rhs,
        FloatCompareOp::Ne => lhs != rhs,
        FloatCompareOp::Lt => lhs < rhs,
        FloatCompareOp::Gt => lhs > rhs,
        FloatCompareOp::Le => lhs <= rhs,
        FloatCompareOp::Ge => lhs >= rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn i64_op(op: IntBinaryOp, a: i64, b: i64) -> Result<i64, TrapKind> {
        int_binary(NumWidth::Bits64, op, a as u64, b as u64).map(|v| v as i64)
    }

    fn i32_op(op: IntBinaryOp, a: i32, b: i32) -> Result<i32, TrapKind> {
        int_binary(NumWidth::Bits32, op, a as u32 as u64, b as u32 as u64).map(|v| v as u32 as i32)
    }

    #[test]
    fn test_i64_reference_values() {
        assert_eq!(i64_op(IntBinaryOp::Add, 1, 1), Ok(2));
        assert_eq!(i64_op(IntBinaryOp::DivU, -16, 4), Ok(4611686018427387900));
        assert_eq!(i64_op(IntBinaryOp::RemS, -17, 4), Ok(-1));
        assert_eq!(i64_op(IntBinaryOp::RemU, -17, 4), Ok(3));
        assert_eq!(i64_op(IntBinaryOp::ShrS, -3, 1), Ok(-2));
        assert_eq!(i64_op(IntBinaryOp::ShrU, -3, 1), Ok(9223372036854775806));
        assert_eq!(i64_op(IntBinaryOp::Rotl, -3, 1), Ok(-5));
        assert_eq!(i64_op(IntBinaryOp::Rotr, 1, 1), Ok(i64::MIN));
    }

    #[test]
    fn test_i32_reference_values() {
        assert_eq!(i32_op(IntBinaryOp::DivU, -16, 4), Ok(1073741820));
        assert_eq!(i32_op(IntBinaryOp::ShrU, -3, 1), Ok(2147483646));
        assert_eq!(i32_op(IntBinaryOp::Rotr, 1, 1), Ok(i32::MIN));
        assert_eq!(i32_op(IntBinaryOp::Shl, 1, 33), Ok(2));
    }

    #[test]
    fn test_traps() {
        for width in [NumWidth::Bits32, NumWidth::Bits64] {
            for op in [IntBinaryOp::DivS, IntBinaryOp::DivU, IntBinaryOp::RemS, IntBinaryOp::RemU] {
                assert_eq!(int_binary(width, op, 5, 0), Err(TrapKind::IntegerDivisionByZero));
            }
        }
        assert_eq!(i32_op(IntBinaryOp::DivS, i32::MIN, -1), Err(TrapKind::IntegerOverflow));
        assert_eq!(i64_op(IntBinaryOp::DivS, i64::MIN, -1), Err(TrapKind::IntegerOverflow));
        assert_eq!(i64_op(IntBinaryOp::RemS, i64::MIN, -1), Ok(0));
    }

    #[test]
    fn test_float_semantics() {
        let sum = float_binary(NumWidth::Bits32, FloatBinaryOp::Add, 1.0, 1.05);
        assert_eq!(sum, 2.049999952316284);
        assert_eq!(float_binary(NumWidth::Bits64, FloatBinaryOp::Copysign, -3.1, 4.2), 3.1);
        assert!(float_binary(NumWidth::Bits64, FloatBinaryOp::Min, f64::NAN, 1.0).is_nan());
        assert!(float_binary(NumWidth::Bits64, FloatBinaryOp::Min, 0.0, -0.0).is_sign_negative());
        assert!(float_binary(NumWidth::Bits64, FloatBinaryOp::Max, -0.0, 0.0).is_sign_positive());
        assert_eq!(float_unary(NumWidth::Bits64, FloatUnaryOp::Nearest, 2.5), 2.0);
        assert_eq!(float_unary(NumWidth::Bits64, FloatUnaryOp::Nearest, 3.5), 4.0);
        assert_eq!(float_unary(NumWidth::Bits64, FloatUnaryOp::Nearest, -2.5), -2.0);
    }

    #[test]
    fn test_unary_and_compare() {
        assert_eq!(int_unary(NumWidth::Bits32, IntUnaryOp::Clz, 1), 31);
        assert_eq!(int_unary(NumWidth::Bits64, IntUnaryOp::Ctz, 0), 64);
        assert!(int_compare(NumWidth::Bits32, IntCompareOp::LtS, (-1i32) as u32 as u64, 0));
        assert!(!int_compare(NumWidth::Bits32, IntCompareOp::LtU, (-1i32) as u32 as u64, 0));
        assert!(int_eqz(NumWidth::Bits32, 1 << 32));
    }

    proptest! {
        #[test]
        fn prop_32bit_results_fit(a in any::<u32>(), b in any::<u32>(), idx in 0usize..15) {
            let op = IntBinaryOp::ALL[idx];
            if let Ok(v) = int_binary(NumWidth::Bits32, op, a as u64, b as u64) {
                prop_assert!(v <= u32::MAX as u64);
            }
        }

        #[test]
        fn prop_add_sub_inverse(a in any::<u64>(), b in any::<u64>()) {
            let sum = int_binary(NumWidth::Bits64, IntBinaryOp::Add, a, b).unwrap();
            prop_assert_eq!(int_binary(NumWidth::Bits64, IntBinaryOp::Sub, sum, b).unwrap(), a);
        }
    }
}
