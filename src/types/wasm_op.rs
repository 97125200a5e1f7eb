//! The fixed Wasm 1.0 binary opcode table, grouped by the families the
//! validator applies shared typing rules to (one rule per family,
//! rather than one match arm per individual mnemonic).

use super::value::ValueType;

pub mod byte {
    pub const UNREACHABLE: u8 = 0x00;
    pub const NOP: u8 = 0x01;
    pub const BLOCK: u8 = 0x02;
    pub const LOOP: u8 = 0x03;
    pub const IF: u8 = 0x04;
    pub const ELSE: u8 = 0x05;
    pub const END: u8 = 0x0B;
    pub const BR: u8 = 0x0C;
    pub const BR_IF: u8 = 0x0D;
    pub const BR_TABLE: u8 = 0x0E;
    pub const RETURN: u8 = 0x0F;
    pub const CALL: u8 = 0x10;
    pub const CALL_INDIRECT: u8 = 0x11;
    pub const DROP: u8 = 0x1A;
    pub const SELECT: u8 = 0x1B;
    pub const LOCAL_GET: u8 = 0x20;
    pub const LOCAL_SET: u8 = 0x21;
    pub const LOCAL_TEE: u8 = 0x22;
    pub const GLOBAL_GET: u8 = 0x23;
    pub const GLOBAL_SET: u8 = 0x24;
    pub const MEM_LOAD_FIRST: u8 = 0x28;
    pub const MEM_LOAD_LAST: u8 = 0x35;
    pub const MEM_STORE_FIRST: u8 = 0x36;
    pub const MEM_STORE_LAST: u8 = 0x3E;
    pub const MEMORY_SIZE: u8 = 0x3F;
    pub const MEMORY_GROW: u8 = 0x40;
    pub const I32_CONST: u8 = 0x41;
    pub const I64_CONST: u8 = 0x42;
    pub const F32_CONST: u8 = 0x43;
    pub const F64_CONST: u8 = 0x44;
    pub const NUMERIC_FIRST: u8 = 0x45;
    pub const NUMERIC_LAST: u8 = 0xC4;
}

/// Which memory width/signedness a `load`/`store` byte names, and
/// what value type it carries.
#[derive(Debug, Clone, Copy)]
pub struct MemOpInfo {
    pub value_type: ValueType,
    pub access_size: u32,
    pub natural_align: u32,
    /// Whether a narrow load sign-extends to the full value width
    /// (`_s`) rather than zero-extending (`_u`). Meaningless for full
    /// width loads and for stores, which only ever truncate.
    pub sign_extend: bool,
}

pub fn mem_load_info(op: u8) -> Option<MemOpInfo> {
    use byte::*;
    if !(MEM_LOAD_FIRST..=MEM_LOAD_LAST).contains(&op) {
        return None;
    }
    let info = match op {
        0x28 => (ValueType::I32, 4, 2, false),
        0x29 => (ValueType::I64, 8, 3, false),
        0x2A => (ValueType::F32, 4, 2, false),
        0x2B => (ValueType::F64, 8, 3, false),
        0x2C => (ValueType::I32, 1, 0, true),
        0x2D => (ValueType::I32, 1, 0, false),
        0x2E => (ValueType::I32, 2, 1, true),
        0x2F => (ValueType::I32, 2, 1, false),
        0x30 => (ValueType::I64, 1, 0, true),
        0x31 => (ValueType::I64, 1, 0, false),
        0x32 => (ValueType::I64, 2, 1, true),
        0x33 => (ValueType::I64, 2, 1, false),
        0x34 => (ValueType::I64, 4, 2, true),
        0x35 => (ValueType::I64, 4, 2, false),
        _ => unreachable!(),
    };
    Some(MemOpInfo { value_type: info.0, access_size: info.1, natural_align: info.2, sign_extend: info.3 })
}

pub fn mem_store_info(op: u8) -> Option<MemOpInfo> {
    use byte::*;
    if !(MEM_STORE_FIRST..=MEM_STORE_LAST).contains(&op) {
        return None;
    }
    let info = match op {
        0x36 => (ValueType::I32, 4, 2),
        0x37 => (ValueType::I64, 8, 3),
        0x38 => (ValueType::F32, 4, 2),
        0x39 => (ValueType::F64, 8, 3),
        0x3A => (ValueType::I32, 1, 0),
        0x3B => (ValueType::I32, 2, 1),
        0x3C => (ValueType::I64, 1, 0),
        0x3D => (ValueType::I64, 2, 1),
        0x3E => (ValueType::I64, 4, 2),
        _ => unreachable!(),
    };
    Some(MemOpInfo { value_type: info.0, access_size: info.1, natural_align: info.2, sign_extend: false })
}

/// The abstract stack effect of a numeric opcode: how many operands
/// of `operand_type` it pops and what type it pushes. Covers every
/// byte in `0x45..=0xC4`; every opcode in this range pops operands of
/// a single uniform type (`operand_type`) and pushes exactly one
/// value of `result_type`.
#[derive(Debug, Clone, Copy)]
pub struct NumericSig {
    pub arity: u8,
    pub operand_type: ValueType,
    pub result_type: ValueType,
}

pub fn numeric_sig(op: u8) -> Option<NumericSig> {
    use ValueType::*;
    let sig = |arity, operand_type, result_type| Some(NumericSig { arity, operand_type, result_type });
    match op {
        0x45 => sig(1, I32, I32),             // i32.eqz
        0x46..=0x4F => sig(2, I32, I32),      // i32 compares
        0x50 => sig(1, I64, I32),             // i64.eqz
        0x51..=0x5A => sig(2, I64, I32),      // i64 compares
        0x5B..=0x60 => sig(2, F32, I32),      // f32 compares
        0x61..=0x66 => sig(2, F64, I32),      // f64 compares
        0x67..=0x69 => sig(1, I32, I32),      // i32 unary bitwise
        0x6A..=0x78 => sig(2, I32, I32),      // i32 binary arith/bitwise
        0x79..=0x7B => sig(1, I64, I64),      // i64 unary bitwise
        0x7C..=0x8A => sig(2, I64, I64),      // i64 binary arith/bitwise
        0x8B..=0x91 => sig(1, F32, F32),      // f32 unary
        0x92..=0x98 => sig(2, F32, F32),      // f32 binary
        0x99..=0x9F => sig(1, F64, F64),      // f64 unary
        0xA0..=0xA6 => sig(2, F64, F64),      // f64 binary
        0xA7 => sig(1, I64, I32),             // i32.wrap_i64
        0xA8..=0xA9 => sig(1, F32, I32),      // i32.trunc_f32_{s,u}
        0xAA..=0xAB => sig(1, F64, I32),      // i32.trunc_f64_{s,u}
        0xAC..=0xAD => sig(1, I32, I64),      // i64.extend_i32_{s,u}
        0xAE..=0xAF => sig(1, F32, I64),      // i64.trunc_f32_{s,u}
        0xB0..=0xB1 => sig(1, F64, I64),      // i64.trunc_f64_{s,u}
        0xB2..=0xB3 => sig(1, I32, F32),      // f32.convert_i32_{s,u}
        0xB4..=0xB5 => sig(1, I64, F32),      // f32.convert_i64_{s,u}
        0xB6 => sig(1, F64, F32),             // f32.demote_f64
        0xB7..=0xB8 => sig(1, I32, F64),      // f64.convert_i32_{s,u}
        0xB9..=0xBA => sig(1, I64, F64),      // f64.convert_i64_{s,u}
        0xBB => sig(1, F32, F64),             // f64.promote_f32
        0xBC => sig(1, F32, I32),             // i32.reinterpret_f32
        0xBD => sig(1, F64, I64),             // i64.reinterpret_f64
        0xBE => sig(1, I32, F32),             // f32.reinterpret_i32
        0xBF => sig(1, I64, F64),             // f64.reinterpret_i64
        0xC0..=0xC1 => sig(1, I32, I32),      // i32.extend{8,16}_s
        0xC2..=0xC4 => sig(1, I64, I64),      // i64.extend{8,16,32}_s
        _ => None,
    }
}

/// The mnemonic string used in error payloads (`op` field), so
/// diagnostics name the exact instruction rather than its byte.
pub fn mnemonic(op: u8) -> &'static str {
    match op {
        0x00 => "unreachable",
        0x01 => "nop",
        0x02 => "block",
        0x03 => "loop",
        0x04 => "if",
        0x05 => "else",
        0x0B => "end",
        0x0C => "br",
        0x0D => "br_if",
        0x0E => "br_table",
        0x0F => "return",
        0x10 => "call",
        0x11 => "call_indirect",
        0x1A => "drop",
        0x1B => "select",
        0x20 => "local.get",
        0x21 => "local.set",
        0x22 => "local.tee",
        0x23 => "global.get",
        0x24 => "global.set",
        0x28 => "i32.load",
        0x29 => "i64.load",
        0x2A => "f32.load",
        0x2B => "f64.load",
        0x2C => "i32.load8_s",
        0x2D => "i32.load8_u",
        0x2E => "i32.load16_s",
        0x2F => "i32.load16_u",
        0x30 => "i64.load8_s",
        0x31 => "i64.load8_u",
        0x32 => "i64.load16_s",
        0x33 => "i64.load16_u",
        0x34 => "i64.load32_s",
        0x35 => "i64.load32_u",
        0x36 => "i32.store",
        0x37 => "i64.store",
        0x38 => "f32.store",
        0x39 => "f64.store",
        0x3A => "i32.store8",
        0x3B => "i32.store16",
        0x3C => "i64.store8",
        0x3D => "i64.store16",
        0x3E => "i64.store32",
        0x3F => "memory.size",
        0x40 => "memory.grow",
        0x41 => "i32.const",
        0x42 => "i64.const",
        0x43 => "f32.const",
        0x44 => "f64.const",
        0x45 => "i32.eqz",
        0x6A => "i32.add",
        0x7C => "i64.add",
        _ => "<numeric>",
    }
}
