//! The validator's compile-time error taxonomy and the interpreter's
//! runtime trap codes. Kept as two separate sum types per the source's
//! own split between "rejected before it ever ran" and "trapped while
//! running" — see [`ValidationError`] and [`TrapCode`].

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt::{self, Formatter};

use super::host_error::HostError;
use super::value::ValueType;

/// One validation error kind plus its kind-specific payload. Every
/// variant pairs with a byte offset captured in [`ValidationFailure`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingEnd,
    IllegalOpbase { opcode_byte: u8 },
    MissingBlockType,
    IllegalBlockType { byte: u8 },
    IllegalElse,
    IfMissingElse { expected_count: usize, expected_type: Option<ValueType> },
    IfThenResultMismatch {
        expected_count: usize,
        actual_count: usize,
        expected_type: Option<ValueType>,
        actual_type: Option<ValueType>,
    },
    IfCondTypeNotI32 { cond_type: ValueType },
    EndResultMismatch {
        block_kind: &'static str,
        expected_count: usize,
        actual_count: usize,
        expected_type: Option<ValueType>,
        actual_type: Option<ValueType>,
    },
    TrailingCodeAfterEnd,
    InvalidLabelIndex,
    IllegalLabelIndex { label_index: u32, all_label_count: u32 },
    BrValueTypeMismatch { op: &'static str, expected_type: ValueType, actual_type: ValueType },
    BrCondTypeNotI32 { op: &'static str, cond_type: ValueType },
    BrTableTargetTypeMismatch {
        expected_label: u32,
        mismatched_label: u32,
        expected_arity: usize,
        actual_arity: usize,
        expected_type: Option<ValueType>,
        actual_type: Option<ValueType>,
    },
    NotLocalFunction { function_index: u32 },
    InvalidFunctionIndex { function_index: u32, all_function_size: u32 },
    InvalidFunctionIndexEncoding,
    InvalidTypeIndex,
    IllegalTypeIndex { type_index: u32, all_type_count: u32 },
    InvalidTableIndex,
    IllegalTableIndex { table_index: u32, all_table_count: u32 },
    InvalidMemoryIndex,
    IllegalMemoryIndex { memory_index: u32, all_memory_count: u32 },
    NoMemory { op: &'static str },
    IllegalMemargAlignment { op: &'static str, align: u32, max_align: u32 },
    InvalidMemargAlign,
    InvalidMemargOffset,
    InvalidLocalIndex,
    IllegalLocalIndex { local_index: u32, all_local_count: u32 },
    LocalSetTypeMismatch { local_index: u32, expected_type: ValueType, actual_type: ValueType },
    LocalTeeTypeMismatch { local_index: u32, expected_type: ValueType, actual_type: ValueType },
    InvalidGlobalIndex,
    IllegalGlobalIndex { global_index: u32, all_global_count: u32 },
    ImmutableGlobalSet { global_index: u32 },
    GlobalSetTypeMismatch { global_index: u32, expected_type: ValueType, actual_type: ValueType },
    OperandStackUnderflow { op: &'static str, stack_size_actual: usize, stack_size_required: usize },
    NumericOperandTypeMismatch { op: &'static str, expected_type: ValueType, actual_type: ValueType },
    SelectCondTypeNotI32 { cond_type: ValueType },
    SelectTypeMismatch { type_v1: ValueType, type_v2: ValueType },
    MemargAddressTypeNotI32 { op: &'static str, addr_type: ValueType },
    StoreValueTypeMismatch { op: &'static str, expected_type: ValueType, actual_type: ValueType },
    MemoryGrowDeltaTypeNotI32 { delta_type: ValueType },
    InvalidConstImmediate { op: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingEnd => write!(f, "function body is missing its `end`"),
            ValidationError::IllegalOpbase { opcode_byte } => {
                write!(f, "illegal opcode byte 0x{opcode_byte:02x}")
            }
            ValidationError::MissingBlockType => write!(f, "missing block type byte"),
            ValidationError::IllegalBlockType { byte } => {
                write!(f, "illegal block type byte 0x{byte:02x}")
            }
            ValidationError::IllegalElse => write!(f, "`else` without a matching `if`"),
            ValidationError::IfMissingElse { .. } => {
                write!(f, "`if` with a non-empty result type is missing its `else`")
            }
            ValidationError::IfThenResultMismatch { .. } => {
                write!(f, "`if` branch result does not match the block type")
            }
            ValidationError::IfCondTypeNotI32 { cond_type } => {
                write!(f, "`if` condition has type {cond_type}, expected i32")
            }
            ValidationError::EndResultMismatch { block_kind, .. } => {
                write!(f, "{block_kind} result does not match its declared type at `end`")
            }
            ValidationError::TrailingCodeAfterEnd => write!(f, "code continues past the function's final `end`"),
            ValidationError::InvalidLabelIndex => write!(f, "invalid label index encoding"),
            ValidationError::IllegalLabelIndex { label_index, all_label_count } => write!(
                f,
                "label index {label_index} out of range (only {all_label_count} enclosing labels)"
            ),
            ValidationError::BrValueTypeMismatch { op, expected_type, actual_type } => write!(
                f,
                "{op} transfers {actual_type} but target label expects {expected_type}"
            ),
            ValidationError::BrCondTypeNotI32 { op, cond_type } => {
                write!(f, "{op} condition has type {cond_type}, expected i32")
            }
            ValidationError::BrTableTargetTypeMismatch { expected_label, mismatched_label, .. } => write!(
                f,
                "br_table target label {mismatched_label} disagrees with label {expected_label}"
            ),
            ValidationError::NotLocalFunction { function_index } => {
                write!(f, "function {function_index} is not a local function")
            }
            ValidationError::InvalidFunctionIndex { function_index, all_function_size } => write!(
                f,
                "function index {function_index} out of range (only {all_function_size} functions)"
            ),
            ValidationError::InvalidFunctionIndexEncoding => write!(f, "invalid function index encoding"),
            ValidationError::InvalidTypeIndex => write!(f, "invalid type index encoding"),
            ValidationError::IllegalTypeIndex { type_index, all_type_count } => {
                write!(f, "type index {type_index} out of range (only {all_type_count} types)")
            }
            ValidationError::InvalidTableIndex => write!(f, "invalid table index encoding"),
            ValidationError::IllegalTableIndex { table_index, all_table_count } => write!(
                f,
                "table index {table_index} out of range (only {all_table_count} tables)"
            ),
            ValidationError::InvalidMemoryIndex => write!(f, "invalid memory index encoding"),
            ValidationError::IllegalMemoryIndex { memory_index, all_memory_count } => write!(
                f,
                "memory index {memory_index} out of range (only {all_memory_count} memories)"
            ),
            ValidationError::NoMemory { op } => write!(f, "{op} requires a declared memory"),
            ValidationError::IllegalMemargAlignment { op, align, max_align } => write!(
                f,
                "{op} alignment exponent {align} exceeds natural alignment {max_align}"
            ),
            ValidationError::InvalidMemargAlign => write!(f, "invalid memarg alignment encoding"),
            ValidationError::InvalidMemargOffset => write!(f, "invalid memarg offset encoding"),
            ValidationError::InvalidLocalIndex => write!(f, "invalid local index encoding"),
            ValidationError::IllegalLocalIndex { local_index, all_local_count } => write!(
                f,
                "local index {local_index} out of range (only {all_local_count} locals)"
            ),
            ValidationError::LocalSetTypeMismatch { local_index, expected_type, actual_type } => write!(
                f,
                "local.set {local_index} expected {expected_type}, got {actual_type}"
            ),
            ValidationError::LocalTeeTypeMismatch { local_index, expected_type, actual_type } => write!(
                f,
                "local.tee {local_index} expected {expected_type}, got {actual_type}"
            ),
            ValidationError::InvalidGlobalIndex => write!(f, "invalid global index encoding"),
            ValidationError::IllegalGlobalIndex { global_index, all_global_count } => write!(
                f,
                "global index {global_index} out of range (only {all_global_count} globals)"
            ),
            ValidationError::ImmutableGlobalSet { global_index } => {
                write!(f, "global.set to immutable global {global_index}")
            }
            ValidationError::GlobalSetTypeMismatch { global_index, expected_type, actual_type } => write!(
                f,
                "global.set {global_index} expected {expected_type}, got {actual_type}"
            ),
            ValidationError::OperandStackUnderflow { op, stack_size_actual, stack_size_required } => write!(
                f,
                "{op} requires {stack_size_required} operands, only {stack_size_actual} available"
            ),
            ValidationError::NumericOperandTypeMismatch { op, expected_type, actual_type } => write!(
                f,
                "{op} expected operand of type {expected_type}, got {actual_type}"
            ),
            ValidationError::SelectCondTypeNotI32 { cond_type } => {
                write!(f, "select condition has type {cond_type}, expected i32")
            }
            ValidationError::SelectTypeMismatch { type_v1, type_v2 } => {
                write!(f, "select operands have mismatched types {type_v1} and {type_v2}")
            }
            ValidationError::MemargAddressTypeNotI32 { op, addr_type } => {
                write!(f, "{op} address has type {addr_type}, expected i32")
            }
            ValidationError::StoreValueTypeMismatch { op, expected_type, actual_type } => write!(
                f,
                "{op} expected value of type {expected_type}, got {actual_type}"
            ),
            ValidationError::MemoryGrowDeltaTypeNotI32 { delta_type } => {
                write!(f, "memory.grow delta has type {delta_type}, expected i32")
            }
            ValidationError::InvalidConstImmediate { op } => write!(f, "{op} has an invalid immediate encoding"),
        }
    }
}

/// A [`ValidationError`] pinned to the byte offset of the opcode that
/// triggered it. The validator produces at most one of these and
/// halts immediately; nothing is ever recovered locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub err_offset: usize,
    pub kind: ValidationError,
}

impl ValidationFailure {
    pub fn new(err_offset: usize, kind: ValidationError) -> Self {
        Self { err_offset, kind }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "at byte {}: {}", self.err_offset, self.kind)
    }
}

/// A runtime trap: something the validator could not have ruled out
/// ahead of time (division by zero, an out-of-range memory access).
#[derive(Debug)]
pub enum TrapCode {
    UnreachableCodeReached,
    MemoryOutOfBounds,
    TableOutOfBounds,
    IndirectCallToNull,
    IntegerDivisionByZero,
    IntegerOverflow,
    BadConversionToInteger,
    StackOverflow,
    BadSignature,
    GrowthOperationLimited,
    UnresolvedFunction,
    BranchOffsetOutOfBounds,
    BranchTableTargetsOutOfBounds,
    ExecutionHalted,
    UnknownExternalFunction,
    HostInterruption(Box<dyn HostError>),
}

impl fmt::Display for TrapCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TrapCode::UnreachableCodeReached => write!(f, "unreachable code reached"),
            TrapCode::MemoryOutOfBounds => write!(f, "out of bounds memory access"),
            TrapCode::TableOutOfBounds => write!(f, "undefined element: out of bounds table access"),
            TrapCode::IndirectCallToNull => write!(f, "uninitialized element"),
            TrapCode::IntegerDivisionByZero => write!(f, "integer divide by zero"),
            TrapCode::IntegerOverflow => write!(f, "integer overflow"),
            TrapCode::BadConversionToInteger => write!(f, "invalid conversion to integer"),
            TrapCode::StackOverflow => write!(f, "call stack exhausted"),
            TrapCode::BadSignature => write!(f, "indirect call type mismatch"),
            TrapCode::GrowthOperationLimited => write!(f, "growth operation limited"),
            TrapCode::UnresolvedFunction => write!(f, "unresolved function"),
            TrapCode::BranchOffsetOutOfBounds => write!(f, "branch offset out of bounds"),
            TrapCode::BranchTableTargetsOutOfBounds => write!(f, "branch table targets are out of bounds"),
            TrapCode::ExecutionHalted => write!(f, "execution halted"),
            TrapCode::UnknownExternalFunction => write!(f, "unknown external function"),
            TrapCode::HostInterruption(err) => write!(f, "host interruption: {err}"),
        }
    }
}

/// Top-level error surfaced across the crate boundary: either the
/// function never made it past validation, or it trapped while
/// running.
#[derive(Debug)]
pub enum WazmError {
    Validation(ValidationFailure),
    Trap(TrapCode),
    MalformedBinary(String),
}

impl fmt::Display for WazmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WazmError::Validation(failure) => write!(f, "validation error: {failure}"),
            WazmError::Trap(trap) => write!(f, "trap: {trap}"),
            WazmError::MalformedBinary(msg) => write!(f, "malformed binary: {msg}"),
        }
    }
}

impl From<ValidationFailure> for WazmError {
    fn from(failure: ValidationFailure) -> Self {
        WazmError::Validation(failure)
    }
}

impl From<TrapCode> for WazmError {
    fn from(trap: TrapCode) -> Self {
        WazmError::Trap(trap)
    }
}
