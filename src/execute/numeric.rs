use super::stack::Stack;
use crate::error::{RuntimeError, Trap};

/// Integer and float arithmetic, comparisons, and bit counting
/// (opcodes 0x45..=0xA6). Comparisons push 1 or 0 as i32.
pub(crate) fn numeric(stack: &mut Stack, opcode: u8) -> Result<(), RuntimeError> {
    match opcode {
        // i32 comparisons
        0x45 => {
            let a = stack.pop_i32()?;
            stack.push_i32((a == 0) as i32);
        }
        0x46 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a == b) as i32);
        }
        0x47 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a != b) as i32);
        }
        0x48 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a < b) as i32);
        }
        0x49 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(((a as u32) < b as u32) as i32);
        }
        0x4a => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a > b) as i32);
        }
        0x4b => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a as u32 > b as u32) as i32);
        }
        0x4c => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a <= b) as i32);
        }
        0x4d => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a as u32 <= b as u32) as i32);
        }
        0x4e => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a >= b) as i32);
        }
        0x4f => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a as u32 >= b as u32) as i32);
        }

        // i64 comparisons (results are i32)
        0x50 => {
            let a = stack.pop_i64()?;
            stack.push_i32((a == 0) as i32);
        }
        0x51 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a == b) as i32);
        }
        0x52 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a != b) as i32);
        }
        0x53 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a < b) as i32);
        }
        0x54 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32(((a as u64) < b as u64) as i32);
        }
        0x55 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a > b) as i32);
        }
        0x56 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a as u64 > b as u64) as i32);
        }
        0x57 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a <= b) as i32);
        }
        0x58 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a as u64 <= b as u64) as i32);
        }
        0x59 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a >= b) as i32);
        }
        0x5a => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i32((a as u64 >= b as u64) as i32);
        }

        // f32 comparisons; NaN compares false except ne
        0x5b => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_i32((a == b) as i32);
        }
        0x5c => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_i32((a != b) as i32);
        }
        0x5d => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_i32((a < b) as i32);
        }
        0x5e => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_i32((a > b) as i32);
        }
        0x5f => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_i32((a <= b) as i32);
        }
        0x60 => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_i32((a >= b) as i32);
        }

        // f64 comparisons
        0x61 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_i32((a == b) as i32);
        }
        0x62 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_i32((a != b) as i32);
        }
        0x63 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_i32((a < b) as i32);
        }
        0x64 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_i32((a > b) as i32);
        }
        0x65 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_i32((a <= b) as i32);
        }
        0x66 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_i32((a >= b) as i32);
        }

        // i32 arithmetic and bit operations
        0x67 => {
            let a = stack.pop_i32()?;
            stack.push_i32(a.leading_zeros() as i32);
        }
        0x68 => {
            let a = stack.pop_i32()?;
            stack.push_i32(a.trailing_zeros() as i32);
        }
        0x69 => {
            let a = stack.pop_i32()?;
            stack.push_i32(a.count_ones() as i32);
        }
        0x6a => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(a.wrapping_add(b));
        }
        0x6b => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(a.wrapping_sub(b));
        }
        0x6c => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(a.wrapping_mul(b));
        }
        0x6d => {
            let (a, b) = pop2_i32(stack)?;
            if b == 0 {
                return Err(Trap::IntegerDivideByZero.into());
            }
            if a == i32::MIN && b == -1 {
                return Err(Trap::IntegerOverflow.into());
            }
            stack.push_i32(a / b);
        }
        0x6e => {
            let (a, b) = pop2_i32(stack)?;
            if b == 0 {
                return Err(Trap::IntegerDivideByZero.into());
            }
            stack.push_i32((a as u32 / b as u32) as i32);
        }
        0x6f => {
            let (a, b) = pop2_i32(stack)?;
            if b == 0 {
                return Err(Trap::IntegerDivideByZero.into());
            }
            // i32::MIN % -1 is 0, not an overflow
            stack.push_i32(a.wrapping_rem(b));
        }
        0x70 => {
            let (a, b) = pop2_i32(stack)?;
            if b == 0 {
                return Err(Trap::IntegerDivideByZero.into());
            }
            stack.push_i32((a as u32 % b as u32) as i32);
        }
        0x71 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(a & b);
        }
        0x72 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(a | b);
        }
        0x73 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(a ^ b);
        }
        // shift and rotate amounts are masked modulo the width
        0x74 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(a.wrapping_shl(b as u32));
        }
        0x75 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32(a.wrapping_shr(b as u32));
        }
        0x76 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a as u32).wrapping_shr(b as u32) as i32);
        }
        0x77 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a as u32).rotate_left(b as u32) as i32);
        }
        0x78 => {
            let (a, b) = pop2_i32(stack)?;
            stack.push_i32((a as u32).rotate_right(b as u32) as i32);
        }

        // i64 arithmetic and bit operations
        0x79 => {
            let a = stack.pop_i64()?;
            stack.push_i64(a.leading_zeros() as i64);
        }
        0x7a => {
            let a = stack.pop_i64()?;
            stack.push_i64(a.trailing_zeros() as i64);
        }
        0x7b => {
            let a = stack.pop_i64()?;
            stack.push_i64(a.count_ones() as i64);
        }
        0x7c => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64(a.wrapping_add(b));
        }
        0x7d => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64(a.wrapping_sub(b));
        }
        0x7e => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64(a.wrapping_mul(b));
        }
        0x7f => {
            let (a, b) = pop2_i64(stack)?;
            if b == 0 {
                return Err(Trap::IntegerDivideByZero.into());
            }
            if a == i64::MIN && b == -1 {
                return Err(Trap::IntegerOverflow.into());
            }
            stack.push_i64(a / b);
        }
        0x80 => {
            let (a, b) = pop2_i64(stack)?;
            if b == 0 {
                return Err(Trap::IntegerDivideByZero.into());
            }
            stack.push_i64((a as u64 / b as u64) as i64);
        }
        0x81 => {
            let (a, b) = pop2_i64(stack)?;
            if b == 0 {
                return Err(Trap::IntegerDivideByZero.into());
            }
            stack.push_i64(a.wrapping_rem(b));
        }
        0x82 => {
            let (a, b) = pop2_i64(stack)?;
            if b == 0 {
                return Err(Trap::IntegerDivideByZero.into());
            }
            stack.push_i64((a as u64 % b as u64) as i64);
        }
        0x83 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64(a & b);
        }
        0x84 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64(a | b);
        }
        0x85 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64(a ^ b);
        }
        0x86 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64(a.wrapping_shl(b as u32));
        }
        0x87 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64(a.wrapping_shr(b as u32));
        }
        0x88 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64((a as u64).wrapping_shr(b as u32) as i64);
        }
        0x89 => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64((a as u64).rotate_left(b as u32) as i64);
        }
        0x8a => {
            let (a, b) = pop2_i64(stack)?;
            stack.push_i64((a as u64).rotate_right(b as u32) as i64);
        }

        // f32 operations
        0x8b => {
            let a = stack.pop_f32()?;
            stack.push_f32(a.abs());
        }
        0x8c => {
            let a = stack.pop_f32()?;
            stack.push_f32(-a);
        }
        0x8d => {
            let a = stack.pop_f32()?;
            stack.push_f32(a.ceil());
        }
        0x8e => {
            let a = stack.pop_f32()?;
            stack.push_f32(a.floor());
        }
        0x8f => {
            let a = stack.pop_f32()?;
            stack.push_f32(a.trunc());
        }
        0x90 => {
            let a = stack.pop_f32()?;
            stack.push_f32(a.round_ties_even());
        }
        0x91 => {
            let a = stack.pop_f32()?;
            stack.push_f32(a.sqrt());
        }
        0x92 => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_f32(a + b);
        }
        0x93 => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_f32(a - b);
        }
        0x94 => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_f32(a * b);
        }
        0x95 => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_f32(a / b);
        }
        0x96 => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_f32(fmin32(a, b));
        }
        0x97 => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_f32(fmax32(a, b));
        }
        0x98 => {
            let (a, b) = pop2_f32(stack)?;
            stack.push_f32(a.copysign(b));
        }

        // f64 operations
        0x99 => {
            let a = stack.pop_f64()?;
            stack.push_f64(a.abs());
        }
        0x9a => {
            let a = stack.pop_f64()?;
            stack.push_f64(-a);
        }
        0x9b => {
            let a = stack.pop_f64()?;
            stack.push_f64(a.ceil());
        }
        0x9c => {
            let a = stack.pop_f64()?;
            stack.push_f64(a.floor());
        }
        0x9d => {
            let a = stack.pop_f64()?;
            stack.push_f64(a.trunc());
        }
        0x9e => {
            let a = stack.pop_f64()?;
            stack.push_f64(a.round_ties_even());
        }
        0x9f => {
            let a = stack.pop_f64()?;
            stack.push_f64(a.sqrt());
        }
        0xa0 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_f64(a + b);
        }
        0xa1 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_f64(a - b);
        }
        0xa2 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_f64(a * b);
        }
        0xa3 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_f64(a / b);
        }
        0xa4 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_f64(fmin64(a, b));
        }
        0xa5 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_f64(fmax64(a, b));
        }
        0xa6 => {
            let (a, b) = pop2_f64(stack)?;
            stack.push_f64(a.copysign(b));
        }

        _ => {
            return Err(RuntimeError::interpreter(format!(
                "unknown opcode {opcode:#04x}"
            )))
        }
    }
    Ok(())
}

/// Conversions between the numeric types (opcodes 0xA7..=0xBF).
pub(crate) fn conversion(stack: &mut Stack, opcode: u8) -> Result<(), RuntimeError> {
    match opcode {
        0xa7 => {
            // i32.wrap_i64: low 32 bits
            let a = stack.pop_i64()?;
            stack.push_i32(a as i32);
        }
        0xa8 => {
            let a = stack.pop_f32()?;
            stack.push_i32(trunc_to_i32(a as f64)?);
        }
        0xa9 => {
            let a = stack.pop_f32()?;
            stack.push_i32(trunc_to_u32(a as f64)? as i32);
        }
        0xaa => {
            let a = stack.pop_f64()?;
            stack.push_i32(trunc_to_i32(a)?);
        }
        0xab => {
            let a = stack.pop_f64()?;
            stack.push_i32(trunc_to_u32(a)? as i32);
        }
        0xac => {
            let a = stack.pop_i32()?;
            stack.push_i64(a as i64);
        }
        0xad => {
            let a = stack.pop_i32()?;
            stack.push_i64(a as u32 as i64);
        }
        0xae => {
            let a = stack.pop_f32()?;
            stack.push_i64(trunc_to_i64(a as f64)?);
        }
        0xaf => {
            let a = stack.pop_f32()?;
            stack.push_i64(trunc_to_u64(a as f64)? as i64);
        }
        0xb0 => {
            let a = stack.pop_f64()?;
            stack.push_i64(trunc_to_i64(a)?);
        }
        0xb1 => {
            let a = stack.pop_f64()?;
            stack.push_i64(trunc_to_u64(a)? as i64);
        }
        0xb2 => {
            let a = stack.pop_i32()?;
            stack.push_f32(a as f32);
        }
        0xb3 => {
            let a = stack.pop_i32()?;
            stack.push_f32(a as u32 as f32);
        }
        0xb4 => {
            let a = stack.pop_i64()?;
            stack.push_f32(a as f32);
        }
        0xb5 => {
            let a = stack.pop_i64()?;
            stack.push_f32(a as u64 as f32);
        }
        0xb6 => {
            let a = stack.pop_f64()?;
            stack.push_f32(a as f32);
        }
        0xb7 => {
            let a = stack.pop_i32()?;
            stack.push_f64(a as f64);
        }
        0xb8 => {
            let a = stack.pop_i32()?;
            stack.push_f64(a as u32 as f64);
        }
        0xb9 => {
            let a = stack.pop_i64()?;
            stack.push_f64(a as f64);
        }
        0xba => {
            let a = stack.pop_i64()?;
            stack.push_f64(a as u64 as f64);
        }
        0xbb => {
            let a = stack.pop_f32()?;
            stack.push_f64(a as f64);
        }
        0xbc => {
            let a = stack.pop_f32()?;
            stack.push_i32(a.to_bits() as i32);
        }
        0xbd => {
            let a = stack.pop_f64()?;
            stack.push_i64(a.to_bits() as i64);
        }
        0xbe => {
            let a = stack.pop_i32()?;
            stack.push_f32(f32::from_bits(a as u32));
        }
        0xbf => {
            let a = stack.pop_i64()?;
            stack.push_f64(f64::from_bits(a as u64));
        }
        _ => {
            return Err(RuntimeError::interpreter(format!(
                "unknown opcode {opcode:#04x}"
            )))
        }
    }
    Ok(())
}

/// Saturating float-to-int truncations (0xFC prefix, sub-opcodes 0..=7).
/// Rust's float-to-int `as` casts already saturate and map NaN to zero,
/// which is exactly the required semantics.
pub(crate) fn saturating_truncation(stack: &mut Stack, sub_opcode: u32) -> Result<(), RuntimeError> {
    match sub_opcode {
        0x00 => {
            let a = stack.pop_f32()?;
            stack.push_i32(a as i32);
        }
        0x01 => {
            let a = stack.pop_f32()?;
            stack.push_i32(a as u32 as i32);
        }
        0x02 => {
            let a = stack.pop_f64()?;
            stack.push_i32(a as i32);
        }
        0x03 => {
            let a = stack.pop_f64()?;
            stack.push_i32(a as u32 as i32);
        }
        0x04 => {
            let a = stack.pop_f32()?;
            stack.push_i64(a as i64);
        }
        0x05 => {
            let a = stack.pop_f32()?;
            stack.push_i64(a as u64 as i64);
        }
        0x06 => {
            let a = stack.pop_f64()?;
            stack.push_i64(a as i64);
        }
        0x07 => {
            let a = stack.pop_f64()?;
            stack.push_i64(a as u64 as i64);
        }
        _ => {
            return Err(RuntimeError::interpreter(format!(
                "unknown 0xfc sub-opcode: {sub_opcode}"
            )))
        }
    }
    Ok(())
}

fn pop2_i32(stack: &mut Stack) -> Result<(i32, i32), RuntimeError> {
    let b = stack.pop_i32()?;
    let a = stack.pop_i32()?;
    Ok((a, b))
}

fn pop2_i64(stack: &mut Stack) -> Result<(i64, i64), RuntimeError> {
    let b = stack.pop_i64()?;
    let a = stack.pop_i64()?;
    Ok((a, b))
}

fn pop2_f32(stack: &mut Stack) -> Result<(f32, f32), RuntimeError> {
    let b = stack.pop_f32()?;
    let a = stack.pop_f32()?;
    Ok((a, b))
}

fn pop2_f64(stack: &mut Stack) -> Result<(f64, f64), RuntimeError> {
    let b = stack.pop_f64()?;
    let a = stack.pop_f64()?;
    Ok((a, b))
}

// wasm min/max: NaN if either operand is NaN, and -0 < +0.

fn fmin32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    if a == b {
        return if a.is_sign_negative() { a } else { b };
    }
    a.min(b)
}

fn fmax32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    if a == b {
        return if a.is_sign_positive() { a } else { b };
    }
    a.max(b)
}

fn fmin64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == b {
        return if a.is_sign_negative() { a } else { b };
    }
    a.min(b)
}

fn fmax64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == b {
        return if a.is_sign_positive() { a } else { b };
    }
    a.max(b)
}

// Trapping truncations. The source is truncated toward zero first; a result
// outside the destination range (including NaN and the infinities) traps.
// f32 sources are promoted to f64, which is exact.

fn trunc_to_i32(a: f64) -> Result<i32, Trap> {
    let t = a.trunc();
    if t.is_nan() || t >= 2_147_483_648.0 || t < -2_147_483_648.0 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as i32)
}

fn trunc_to_u32(a: f64) -> Result<u32, Trap> {
    let t = a.trunc();
    if t.is_nan() || t >= 4_294_967_296.0 || t <= -1.0 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as u32)
}

fn trunc_to_i64(a: f64) -> Result<i64, Trap> {
    let t = a.trunc();
    if t.is_nan() || t >= 9_223_372_036_854_775_808.0 || t < -9_223_372_036_854_775_808.0 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as i64)
}

fn trunc_to_u64(a: f64) -> Result<u64, Trap> {
    let t = a.trunc();
    if t.is_nan() || t >= 18_446_744_073_709_551_616.0 || t <= -1.0 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn binop_i32(opcode: u8, a: i32, b: i32) -> Result<Value, RuntimeError> {
        let mut stack = Stack::default();
        stack.push_i32(a);
        stack.push_i32(b);
        numeric(&mut stack, opcode)?;
        stack.pop()
    }

    fn binop_i64(opcode: u8, a: i64, b: i64) -> Result<Value, RuntimeError> {
        let mut stack = Stack::default();
        stack.push_i64(a);
        stack.push_i64(b);
        numeric(&mut stack, opcode)?;
        stack.pop()
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(binop_i32(0x6a, i32::MAX, 1).unwrap(), Value::I32(i32::MIN));
        assert_eq!(binop_i32(0x6b, i32::MIN, 1).unwrap(), Value::I32(i32::MAX));
        assert_eq!(binop_i32(0x6c, 65536, 65536).unwrap(), Value::I32(0));
        assert_eq!(binop_i64(0x7c, i64::MAX, 1).unwrap(), Value::I64(i64::MIN));
        assert_eq!(
            binop_i64(0x7e, 1 << 32, 1 << 32).unwrap(),
            Value::I64(0)
        );
    }

    #[test]
    fn division_traps_exactly_when_specified() {
        let div_by_zero = Err(RuntimeError::Trap(Trap::IntegerDivideByZero));
        assert_eq!(binop_i32(0x6d, 1, 0), div_by_zero.clone());
        assert_eq!(binop_i32(0x6e, 1, 0), div_by_zero.clone());
        assert_eq!(binop_i32(0x6f, 1, 0), div_by_zero.clone());
        assert_eq!(binop_i32(0x70, 1, 0), div_by_zero.clone());
        assert_eq!(
            binop_i32(0x6d, i32::MIN, -1),
            Err(RuntimeError::Trap(Trap::IntegerOverflow))
        );
        assert_eq!(
            binop_i64(0x7f, i64::MIN, -1),
            Err(RuntimeError::Trap(Trap::IntegerOverflow))
        );
        // rem_s of INT_MIN % -1 is defined and zero
        assert_eq!(binop_i32(0x6f, i32::MIN, -1).unwrap(), Value::I32(0));
        assert_eq!(binop_i64(0x81, i64::MIN, -1).unwrap(), Value::I64(0));
        assert_eq!(binop_i32(0x6d, -7, 2).unwrap(), Value::I32(-3));
        assert_eq!(binop_i32(0x6e, -1, 2).unwrap(), Value::I32(0x7fffffff));
    }

    #[test]
    fn shifts_mask_their_amount() {
        assert_eq!(binop_i32(0x74, 1, 33).unwrap(), Value::I32(2));
        assert_eq!(binop_i32(0x75, -8, 1).unwrap(), Value::I32(-4));
        assert_eq!(binop_i32(0x76, -1, 24).unwrap(), Value::I32(0xff));
        assert_eq!(binop_i64(0x86, 1, 65).unwrap(), Value::I64(2));
        assert_eq!(
            binop_i32(0x77, 0x4000_0001u32 as i32, 1).unwrap(),
            Value::I32(0x8000_0002u32 as i32)
        );
        assert_eq!(binop_i32(0x78, 1, 1).unwrap(), Value::I32(i32::MIN));
    }

    #[test]
    fn bit_counting() {
        let mut stack = Stack::default();
        stack.push_i32(0);
        numeric(&mut stack, 0x67).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(32));
        stack.push_i32(1);
        numeric(&mut stack, 0x67).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(31));
        stack.push_i32(0x60);
        numeric(&mut stack, 0x68).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(5));
        stack.push_i32(-1);
        numeric(&mut stack, 0x69).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(32));
        // i64 counts are pushed as i64
        stack.push_i64(0);
        numeric(&mut stack, 0x79).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I64(64));
    }

    #[test]
    fn float_min_max_follow_wasm_semantics() {
        let mut stack = Stack::default();
        stack.push_f32(f32::NAN);
        stack.push_f32(1.0);
        numeric(&mut stack, 0x96).unwrap();
        assert!(stack.pop_f32().unwrap().is_nan());

        stack.push_f32(-0.0);
        stack.push_f32(0.0);
        numeric(&mut stack, 0x96).unwrap();
        assert!(stack.pop_f32().unwrap().is_sign_negative());

        stack.push_f64(-0.0);
        stack.push_f64(0.0);
        numeric(&mut stack, 0xa5).unwrap();
        assert!(stack.pop_f64().unwrap().is_sign_positive());

        stack.push_f64(3.0);
        stack.push_f64(f64::NAN);
        numeric(&mut stack, 0xa4).unwrap();
        assert!(stack.pop_f64().unwrap().is_nan());
    }

    #[test]
    fn nearest_rounds_ties_to_even() {
        let mut stack = Stack::default();
        for (input, expected) in [(2.5, 2.0), (3.5, 4.0), (-0.5, -0.0), (4.7, 5.0)] {
            stack.push_f64(input);
            numeric(&mut stack, 0x9e).unwrap();
            assert_eq!(stack.pop_f64().unwrap(), expected);
        }
    }

    #[test]
    fn trapping_truncations_check_the_range() {
        let mut stack = Stack::default();
        stack.push_f32(-2.9);
        conversion(&mut stack, 0xa8).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(-2));

        stack.push_f64(2_147_483_647.9);
        conversion(&mut stack, 0xaa).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(i32::MAX));

        stack.push_f64(f64::NAN);
        assert_eq!(
            conversion(&mut stack, 0xaa),
            Err(RuntimeError::Trap(Trap::InvalidConversionToInteger))
        );
        stack.push_f32(f32::INFINITY);
        assert_eq!(
            conversion(&mut stack, 0xa8),
            Err(RuntimeError::Trap(Trap::InvalidConversionToInteger))
        );
        stack.push_f64(2_147_483_648.0);
        assert_eq!(
            conversion(&mut stack, 0xaa),
            Err(RuntimeError::Trap(Trap::InvalidConversionToInteger))
        );
        // strictly negative sources trap for the unsigned variants
        stack.push_f64(-1.0);
        assert_eq!(
            conversion(&mut stack, 0xab),
            Err(RuntimeError::Trap(Trap::InvalidConversionToInteger))
        );
        // but fractions above -1 truncate to zero
        stack.push_f64(-0.7);
        conversion(&mut stack, 0xab).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(0));
    }

    #[test]
    fn saturating_truncations_are_total() {
        let mut stack = Stack::default();
        let cases: [(u32, f64, Value); 6] = [
            (0x02, f64::NAN, Value::I32(0)),
            (0x02, 1e300, Value::I32(i32::MAX)),
            (0x02, -1e300, Value::I32(i32::MIN)),
            (0x03, -5.0, Value::I32(0)),
            (0x03, 1e300, Value::I32(-1)), // u32::MAX bit pattern
            (0x06, -1e300, Value::I64(i64::MIN)),
        ];
        for (sub, input, expected) in cases {
            stack.push_f64(input);
            saturating_truncation(&mut stack, sub).unwrap();
            assert_eq!(stack.pop().unwrap(), expected);
        }
        stack.push_f32(f32::NEG_INFINITY);
        saturating_truncation(&mut stack, 0x01).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(0));
        stack.push_f32(f32::INFINITY);
        saturating_truncation(&mut stack, 0x05).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I64(-1));
    }

    #[test]
    fn wrap_extend_and_reinterpret() {
        let mut stack = Stack::default();
        stack.push_i64(0x1_2345_6789);
        conversion(&mut stack, 0xa7).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(0x2345_6789));

        stack.push_i32(-1);
        conversion(&mut stack, 0xac).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I64(-1));

        stack.push_i32(-1);
        conversion(&mut stack, 0xad).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I64(0xffff_ffff));

        stack.push_f32(1.0);
        conversion(&mut stack, 0xbc).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(0x3f80_0000));

        stack.push_i32(0x3f80_0000);
        conversion(&mut stack, 0xbe).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::F32(1.0));

        stack.push_i32(-1);
        conversion(&mut stack, 0xb8).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::F64(4_294_967_295.0));
    }
}
