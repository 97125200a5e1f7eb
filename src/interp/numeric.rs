//! Opcode-indexed evaluation of every numeric instruction.
//!
//! One function per arity, each a single match over the Wasm opcode
//! byte, grouped the way the source groups its ALU/FPU handler
//! modules by operation category rather than one function per
//! mnemonic.

use crate::types::TrapCode;

use super::untyped_value::UntypedValue;

pub fn eval_unary(op: u8, a: UntypedValue) -> Result<UntypedValue, TrapCode> {
    Ok(match op {
        0x45 => UntypedValue::from((a.to_i32() == 0) as i32),
        0x50 => UntypedValue::from((a.to_i64() == 0) as i32),
        0x67 => UntypedValue::from(a.to_u32().leading_zeros() as i32),
        0x68 => UntypedValue::from(a.to_u32().trailing_zeros() as i32),
        0x69 => UntypedValue::from(a.to_u32().count_ones() as i32),
        0x79 => UntypedValue::from(a.to_u64().leading_zeros() as i64),
        0x7A => UntypedValue::from(a.to_u64().trailing_zeros() as i64),
        0x7B => UntypedValue::from(a.to_u64().count_ones() as i64),
        0x8B => UntypedValue::from_f32(a.to_f32().abs()),
        0x8C => UntypedValue::from_f32(-a.to_f32()),
        0x8D => UntypedValue::from_f32(a.to_f32().ceil()),
        0x8E => UntypedValue::from_f32(a.to_f32().floor()),
        0x8F => UntypedValue::from_f32(a.to_f32().trunc()),
        0x90 => UntypedValue::from_f32(round_ties_even_f32(a.to_f32())),
        0x91 => UntypedValue::from_f32(a.to_f32().sqrt()),
        0x99 => UntypedValue::from_f64(a.to_f64().abs()),
        0x9A => UntypedValue::from_f64(-a.to_f64()),
        0x9B => UntypedValue::from_f64(a.to_f64().ceil()),
        0x9C => UntypedValue::from_f64(a.to_f64().floor()),
        0x9D => UntypedValue::from_f64(a.to_f64().trunc()),
        0x9E => UntypedValue::from_f64(round_ties_even_f64(a.to_f64())),
        0x9F => UntypedValue::from_f64(a.to_f64().sqrt()),
        0xA7 => UntypedValue::from(a.to_i64() as i32),
        0xA8 => UntypedValue::from(f32_trunc_to_i32(a.to_f32(), true)?),
        0xA9 => UntypedValue::from(f32_trunc_to_i32(a.to_f32(), false)? as u32 as i32),
        0xAA => UntypedValue::from(f64_trunc_to_i32(a.to_f64(), true)?),
        0xAB => UntypedValue::from(f64_trunc_to_i32(a.to_f64(), false)? as u32 as i32),
        0xAC => UntypedValue::from(a.to_i32() as i64),
        0xAD => UntypedValue::from(a.to_u32() as i64),
        0xAE => UntypedValue::from(f32_trunc_to_i64(a.to_f32(), true)?),
        0xAF => UntypedValue::from(f32_trunc_to_i64(a.to_f32(), false)? as u64 as i64),
        0xB0 => UntypedValue::from(f64_trunc_to_i64(a.to_f64(), true)?),
        0xB1 => UntypedValue::from(f64_trunc_to_i64(a.to_f64(), false)? as u64 as i64),
        0xB2 => UntypedValue::from_f32(a.to_i32() as f32),
        0xB3 => UntypedValue::from_f32(a.to_u32() as f32),
        0xB4 => UntypedValue::from_f32(a.to_i64() as f32),
        0xB5 => UntypedValue::from_f32(a.to_u64() as f32),
        0xB6 => UntypedValue::from_f32(a.to_f64() as f32),
        0xB7 => UntypedValue::from_f64(a.to_i32() as f64),
        0xB8 => UntypedValue::from_f64(a.to_u32() as f64),
        0xB9 => UntypedValue::from_f64(a.to_i64() as f64),
        0xBA => UntypedValue::from_f64(a.to_u64() as f64),
        0xBB => UntypedValue::from_f64(a.to_f32() as f64),
        0xBC => UntypedValue::from(a.to_f32().to_bits() as i32),
        0xBD => UntypedValue::from(a.to_f64().to_bits() as i64),
        0xBE => UntypedValue::from_f32(f32::from_bits(a.to_u32())),
        0xBF => UntypedValue::from_f64(f64::from_bits(a.to_u64())),
        0xC0 => UntypedValue::from(a.to_i32() as i8 as i32),
        0xC1 => UntypedValue::from(a.to_i32() as i16 as i32),
        0xC2 => UntypedValue::from(a.to_i64() as i8 as i64),
        0xC3 => UntypedValue::from(a.to_i64() as i16 as i64),
        0xC4 => UntypedValue::from(a.to_i64() as i32 as i64),
        _ => unreachable!("opcode 0x{op:02x} is not a unary numeric instruction"),
    })
}

pub fn eval_binary(op: u8, a: UntypedValue, b: UntypedValue) -> Result<UntypedValue, TrapCode> {
    Ok(match op {
        0x46 => UntypedValue::from((a.to_i32() == b.to_i32()) as i32),
        0x47 => UntypedValue::from((a.to_i32() != b.to_i32()) as i32),
        0x48 => UntypedValue::from((a.to_i32() < b.to_i32()) as i32),
        0x49 => UntypedValue::from((a.to_u32() < b.to_u32()) as i32),
        0x4A => UntypedValue::from((a.to_i32() > b.to_i32()) as i32),
        0x4B => UntypedValue::from((a.to_u32() > b.to_u32()) as i32),
        0x4C => UntypedValue::from((a.to_i32() <= b.to_i32()) as i32),
        0x4D => UntypedValue::from((a.to_u32() <= b.to_u32()) as i32),
        0x4E => UntypedValue::from((a.to_i32() >= b.to_i32()) as i32),
        0x4F => UntypedValue::from((a.to_u32() >= b.to_u32()) as i32),
        0x51 => UntypedValue::from((a.to_i64() == b.to_i64()) as i32),
        0x52 => UntypedValue::from((a.to_i64() != b.to_i64()) as i32),
        0x53 => UntypedValue::from((a.to_i64() < b.to_i64()) as i32),
        0x54 => UntypedValue::from((a.to_u64() < b.to_u64()) as i32),
        0x55 => UntypedValue::from((a.to_i64() > b.to_i64()) as i32),
        0x56 => UntypedValue::from((a.to_u64() > b.to_u64()) as i32),
        0x57 => UntypedValue::from((a.to_i64() <= b.to_i64()) as i32),
        0x58 => UntypedValue::from((a.to_u64() <= b.to_u64()) as i32),
        0x59 => UntypedValue::from((a.to_i64() >= b.to_i64()) as i32),
        0x5A => UntypedValue::from((a.to_u64() >= b.to_u64()) as i32),
        0x5B => UntypedValue::from((a.to_f32() == b.to_f32()) as i32),
        0x5C => UntypedValue::from((a.to_f32() != b.to_f32()) as i32),
        0x5D => UntypedValue::from((a.to_f32() < b.to_f32()) as i32),
        0x5E => UntypedValue::from((a.to_f32() > b.to_f32()) as i32),
        0x5F => UntypedValue::from((a.to_f32() <= b.to_f32()) as i32),
        0x60 => UntypedValue::from((a.to_f32() >= b.to_f32()) as i32),
        0x61 => UntypedValue::from((a.to_f64() == b.to_f64()) as i32),
        0x62 => UntypedValue::from((a.to_f64() != b.to_f64()) as i32),
        0x63 => UntypedValue::from((a.to_f64() < b.to_f64()) as i32),
        0x64 => UntypedValue::from((a.to_f64() > b.to_f64()) as i32),
        0x65 => UntypedValue::from((a.to_f64() <= b.to_f64()) as i32),
        0x66 => UntypedValue::from((a.to_f64() >= b.to_f64()) as i32),
        0x6A => UntypedValue::from(a.to_i32().wrapping_add(b.to_i32())),
        0x6B => UntypedValue::from(a.to_i32().wrapping_sub(b.to_i32())),
        0x6C => UntypedValue::from(a.to_i32().wrapping_mul(b.to_i32())),
        0x6D => UntypedValue::from(a.to_i32().checked_div(b.to_i32()).ok_or_else(|| div_trap(b.to_i32() == 0))?),
        0x6E => UntypedValue::from(checked_udiv32(a.to_u32(), b.to_u32())?),
        0x6F => UntypedValue::from(rem32(a.to_i32(), b.to_i32())?),
        0x70 => UntypedValue::from(checked_urem32(a.to_u32(), b.to_u32())?),
        0x71 => UntypedValue::from(a.to_i32() & b.to_i32()),
        0x72 => UntypedValue::from(a.to_i32() | b.to_i32()),
        0x73 => UntypedValue::from(a.to_i32() ^ b.to_i32()),
        0x74 => UntypedValue::from(a.to_i32().wrapping_shl(b.to_u32())),
        0x75 => UntypedValue::from(a.to_i32().wrapping_shr(b.to_u32())),
        0x76 => UntypedValue::from((a.to_u32().wrapping_shr(b.to_u32())) as i32),
        0x77 => UntypedValue::from(a.to_u32().rotate_left(b.to_u32()) as i32),
        0x78 => UntypedValue::from(a.to_u32().rotate_right(b.to_u32()) as i32),
        0x7C => UntypedValue::from(a.to_i64().wrapping_add(b.to_i64())),
        0x7D => UntypedValue::from(a.to_i64().wrapping_sub(b.to_i64())),
        0x7E => UntypedValue::from(a.to_i64().wrapping_mul(b.to_i64())),
        0x7F => UntypedValue::from(a.to_i64().checked_div(b.to_i64()).ok_or_else(|| div_trap(b.to_i64() == 0))?),
        0x80 => UntypedValue::from(checked_udiv64(a.to_u64(), b.to_u64())?),
        0x81 => UntypedValue::from(rem64(a.to_i64(), b.to_i64())?),
        0x82 => UntypedValue::from(checked_urem64(a.to_u64(), b.to_u64())?),
        0x83 => UntypedValue::from(a.to_i64() & b.to_i64()),
        0x84 => UntypedValue::from(a.to_i64() | b.to_i64()),
        0x85 => UntypedValue::from(a.to_i64() ^ b.to_i64()),
        0x86 => UntypedValue::from(a.to_i64().wrapping_shl(b.to_u64() as u32)),
        0x87 => UntypedValue::from(a.to_i64().wrapping_shr(b.to_u64() as u32)),
        0x88 => UntypedValue::from((a.to_u64().wrapping_shr(b.to_u64() as u32)) as i64),
        0x89 => UntypedValue::from(a.to_u64().rotate_left(b.to_u64() as u32) as i64),
        0x8A => UntypedValue::from(a.to_u64().rotate_right(b.to_u64() as u32) as i64),
        0x92 => UntypedValue::from_f32(a.to_f32() + b.to_f32()),
        0x93 => UntypedValue::from_f32(a.to_f32() - b.to_f32()),
        0x94 => UntypedValue::from_f32(a.to_f32() * b.to_f32()),
        0x95 => UntypedValue::from_f32(a.to_f32() / b.to_f32()),
        0x96 => UntypedValue::from_f32(a.to_f32().min(b.to_f32())),
        0x97 => UntypedValue::from_f32(a.to_f32().max(b.to_f32())),
        0x98 => UntypedValue::from_f32(a.to_f32().copysign(b.to_f32())),
        0xA0 => UntypedValue::from_f64(a.to_f64() + b.to_f64()),
        0xA1 => UntypedValue::from_f64(a.to_f64() - b.to_f64()),
        0xA2 => UntypedValue::from_f64(a.to_f64() * b.to_f64()),
        0xA3 => UntypedValue::from_f64(a.to_f64() / b.to_f64()),
        0xA4 => UntypedValue::from_f64(a.to_f64().min(b.to_f64())),
        0xA5 => UntypedValue::from_f64(a.to_f64().max(b.to_f64())),
        0xA6 => UntypedValue::from_f64(a.to_f64().copysign(b.to_f64())),
        _ => unreachable!("opcode 0x{op:02x} is not a binary numeric instruction"),
    })
}

fn div_trap(is_zero: bool) -> TrapCode {
    if is_zero {
        TrapCode::IntegerDivisionByZero
    } else {
        TrapCode::IntegerOverflow
    }
}

fn rem32(a: i32, b: i32) -> Result<i32, TrapCode> {
    if b == 0 {
        return Err(TrapCode::IntegerDivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

fn checked_udiv32(a: u32, b: u32) -> Result<u32, TrapCode> {
    a.checked_div(b).ok_or(TrapCode::IntegerDivisionByZero)
}

fn checked_urem32(a: u32, b: u32) -> Result<u32, TrapCode> {
    a.checked_rem(b).ok_or(TrapCode::IntegerDivisionByZero)
}

fn checked_udiv64(a: u64, b: u64) -> Result<u64, TrapCode> {
    a.checked_div(b).ok_or(TrapCode::IntegerDivisionByZero)
}

fn checked_urem64(a: u64, b: u64) -> Result<u64, TrapCode> {
    a.checked_rem(b).ok_or(TrapCode::IntegerDivisionByZero)
}

fn rem64(a: i64, b: i64) -> Result<i64, TrapCode> {
    if b == 0 {
        return Err(TrapCode::IntegerDivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

fn f32_trunc_to_i32(v: f32, signed: bool) -> Result<i32, TrapCode> {
    if v.is_nan() {
        return Err(TrapCode::BadConversionToInteger);
    }
    let t = v.trunc();
    if signed {
        if t < i32::MIN as f32 || t > i32::MAX as f32 {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(t as i32)
    } else {
        if t < 0.0 || t > u32::MAX as f32 {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(t as u32 as i32)
    }
}

fn f64_trunc_to_i32(v: f64, signed: bool) -> Result<i32, TrapCode> {
    if v.is_nan() {
        return Err(TrapCode::BadConversionToInteger);
    }
    let t = v.trunc();
    if signed {
        if t < i32::MIN as f64 || t > i32::MAX as f64 {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(t as i32)
    } else {
        if t < 0.0 || t > u32::MAX as f64 {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(t as u32 as i32)
    }
}

fn f32_trunc_to_i64(v: f32, signed: bool) -> Result<i64, TrapCode> {
    if v.is_nan() {
        return Err(TrapCode::BadConversionToInteger);
    }
    let t = v.trunc();
    if signed {
        if t < i64::MIN as f32 || t >= i64::MAX as f32 {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(t as i64)
    } else {
        if t < 0.0 || t >= u64::MAX as f32 {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(t as u64 as i64)
    }
}

fn f64_trunc_to_i64(v: f64, signed: bool) -> Result<i64, TrapCode> {
    if v.is_nan() {
        return Err(TrapCode::BadConversionToInteger);
    }
    let t = v.trunc();
    if signed {
        if t < i64::MIN as f64 || t >= i64::MAX as f64 {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(t as i64)
    } else {
        if t < 0.0 || t >= u64::MAX as f64 {
            return Err(TrapCode::IntegerOverflow);
        }
        Ok(t as u64 as i64)
    }
}

fn round_ties_even_f32(v: f32) -> f32 {
    let r = v.round();
    if (v - v.trunc()).abs() == 0.5 && (r as i64) % 2 != 0 {
        r - r.signum()
    } else {
        r
    }
}

fn round_ties_even_f64(v: f64) -> f64 {
    let r = v.round();
    if (v - v.trunc()).abs() == 0.5 && (r as i64) % 2 != 0 {
        r - r.signum()
    } else {
        r
    }
}
