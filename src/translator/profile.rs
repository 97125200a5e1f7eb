//! Compile-time interpreter configuration.
//!
//! The source specializes a single template (`CompileOption`) on a
//! pack of per-type ring ranges. Rust's equivalent is a trait with
//! associated consts, instantiated by zero-sized marker types so the
//! translator and the generated handlers are monomorphized per
//! profile rather than branching on a runtime flag.

/// A half-open range `[begin, end)` of stack-top register slots
/// reserved for one value type. `SENTINEL` (`begin == end == 0`)
/// means the type is never cached and always lives on the operand
/// stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingRange {
    pub begin: usize,
    pub end: usize,
}

impl RingRange {
    pub const SENTINEL: RingRange = RingRange { begin: 0, end: 0 };

    pub const fn size(self) -> usize {
        self.end - self.begin
    }

    pub const fn enabled(self) -> bool {
        self.end > self.begin
    }

    /// The slot preceding `pos` within this ring, wrapping at `begin`.
    pub const fn ring_prev(self, pos: usize) -> usize {
        if pos == self.begin {
            self.end - 1
        } else {
            pos - 1
        }
    }

    /// The slot following `pos` within this ring, wrapping at `end`.
    pub const fn ring_next(self, pos: usize) -> usize {
        if pos + 1 == self.end {
            self.begin
        } else {
            pos + 1
        }
    }
}

/// A compile-time interpreter configuration: which value types get a
/// stack-top register cache and how many slots each gets, plus
/// whether the dispatch loop runs in guaranteed-tail-call mode.
pub trait InterpreterProfile: 'static {
    const IS_TAIL_CALL: bool;
    const I32_RING: RingRange;
    const I64_RING: RingRange;
    const F32_RING: RingRange;
    const F64_RING: RingRange;
    const V128_RING: RingRange = RingRange::SENTINEL;

    fn ring_for(value_type: crate::types::ValueType) -> RingRange {
        use crate::types::ValueType::*;
        match value_type {
            I32 => Self::I32_RING,
            I64 => Self::I64_RING,
            F32 => Self::F32_RING,
            F64 => Self::F64_RING,
            V128 => Self::V128_RING,
        }
    }
}

/// One register slot per numeric type, merged ranges disabled. This
/// is the profile exercised by the end-to-end `local.get` caching
/// scenario.
pub struct RegisterCached;

impl InterpreterProfile for RegisterCached {
    const IS_TAIL_CALL: bool = true;
    const I32_RING: RingRange = RingRange { begin: 0, end: 2 };
    const I64_RING: RingRange = RingRange { begin: 2, end: 4 };
    const F32_RING: RingRange = RingRange { begin: 4, end: 5 };
    const F64_RING: RingRange = RingRange { begin: 5, end: 6 };
}

/// No register caching: every value lives on the operand stack. Used
/// as the reference profile that [`RegisterCached`] is checked
/// against for observable-behavior equivalence, and as the
/// non-tail-call-capable compatibility path.
pub struct MemoryOnly;

impl InterpreterProfile for MemoryOnly {
    const IS_TAIL_CALL: bool = false;
    const I32_RING: RingRange = RingRange::SENTINEL;
    const I64_RING: RingRange = RingRange::SENTINEL;
    const F32_RING: RingRange = RingRange::SENTINEL;
    const F64_RING: RingRange = RingRange::SENTINEL;
}
