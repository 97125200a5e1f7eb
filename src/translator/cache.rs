use alloc::vec::Vec;

use crate::types::ValueType;

use super::profile::{InterpreterProfile, RingRange};

/// What happened to the ring when a value was pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The type has no enabled ring; the value lives on the operand
    /// stack from the start.
    Stack,
    /// The value now occupies `ring_pos` and nothing needed spilling.
    Cached { ring_pos: usize },
    /// The ring was full of the same type; the slot at `spilled_pos`
    /// was written back to the operand stack to make room, and the
    /// new value now occupies `ring_pos`.
    Spilled { spilled_pos: usize, ring_pos: usize },
    /// A run of a different cached type was displaced wholesale
    /// (spilled bottom-to-top) before this value took the ring's
    /// first slot.
    RunDisplaced { displaced_type: ValueType, displaced_count: usize, ring_pos: usize },
}

/// What happened to the ring when a value was popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopOutcome {
    /// Popped straight from the operand stack; nothing cached.
    Stack,
    /// Popped a cache-resident value. A pop that folds a `drop` is
    /// exactly this case with the popped value discarded instead of
    /// consumed: no operand-stack traffic at all.
    Cached { ring_pos: usize },
}

/// Translation-time bookkeeping for the stack-top register cache.
/// Tracks a homogeneous run of the most-recently-pushed values that
/// are still cache-resident; a push of a different type, or of the
/// same type once the ring saturates, spills.
#[derive(Debug, Clone)]
pub struct CacheState {
    stack: Vec<ValueType>,
    cached_type: Option<ValueType>,
    cached_count: usize,
    ring_pos: usize,
}

impl CacheState {
    pub fn new() -> Self {
        Self { stack: Vec::new(), cached_type: None, cached_count: 0, ring_pos: 0 }
    }

    pub fn stack_height(&self) -> usize {
        self.stack.len()
    }

    pub fn is_fully_spilled(&self) -> bool {
        self.cached_count == 0
    }

    /// Forces every cache-resident value back onto the operand stack.
    /// Used at control-flow merge points so every incoming edge
    /// arrives with the same (empty) cache snapshot, satisfying the
    /// merge-point invariant.
    pub fn spill_all(&mut self) -> Option<(ValueType, usize, usize)> {
        if self.cached_count == 0 {
            return None;
        }
        let result = (self.cached_type.unwrap(), self.cached_count, self.ring_pos);
        self.cached_type = None;
        self.cached_count = 0;
        Some(result)
    }

    pub fn push<P: InterpreterProfile>(&mut self, t: ValueType) -> PushOutcome {
        self.stack.push(t);
        let ring = P::ring_for(t);
        if !ring.enabled() {
            self.cached_type = None;
            self.cached_count = 0;
            return PushOutcome::Stack;
        }

        if self.cached_type == Some(t) {
            if self.cached_count < ring.size() {
                self.ring_pos = if self.cached_count == 0 { ring.begin } else { ring.ring_next(self.ring_pos) };
                self.cached_count += 1;
                return PushOutcome::Cached { ring_pos: self.ring_pos };
            }
            let spilled_pos = ring.ring_next(self.ring_pos);
            self.ring_pos = spilled_pos;
            return PushOutcome::Spilled { spilled_pos, ring_pos: self.ring_pos };
        }

        let displaced = if self.cached_count > 0 {
            Some((self.cached_type.unwrap(), self.cached_count))
        } else {
            None
        };
        self.cached_type = Some(t);
        self.cached_count = 1;
        self.ring_pos = ring.begin;
        match displaced {
            Some((displaced_type, displaced_count)) => {
                PushOutcome::RunDisplaced { displaced_type, displaced_count, ring_pos: ring.begin }
            }
            None => PushOutcome::Cached { ring_pos: ring.begin },
        }
    }

    pub fn pop<P: InterpreterProfile>(&mut self) -> (Option<ValueType>, PopOutcome) {
        let popped = self.stack.pop();
        if self.cached_count == 0 {
            return (popped, PopOutcome::Stack);
        }
        let ring_pos = self.ring_pos;
        self.cached_count -= 1;
        if self.cached_count == 0 {
            self.cached_type = None;
        } else {
            let ring = P::ring_for(self.cached_type.unwrap());
            self.ring_pos = ring.ring_prev(self.ring_pos);
        }
        (popped, PopOutcome::Cached { ring_pos })
    }

    pub fn top_type(&self) -> Option<ValueType> {
        self.stack.last().copied()
    }
}

impl Default for CacheState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn ring_for<P: InterpreterProfile>(t: ValueType) -> RingRange {
    P::ring_for(t)
}
