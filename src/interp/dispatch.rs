//! The trampoline dispatch loop.
//!
//! Stable Rust has no guaranteed tail call (`become`), so the
//! handler-chain image is driven by one outer loop instead of letting
//! each handler literally tail-call the next: a handler returns
//! [`HandlerResult::Continue`] naming the next handler and `pc`, and
//! the loop below calls it. This keeps the same observable behavior
//! the source's guaranteed-tail-call dispatch guarantees — a handler
//! chain of any length runs in O(1) native stack depth — without
//! relying on an unstable language feature.

use alloc::vec::Vec;

use crate::types::{numeric_sig, TrapCode};

use super::instance::Instance;
use super::numeric::{eval_binary, eval_unary};
use super::untyped_value::UntypedValue;
use super::value_stack::{RuntimeStack, RuntimeStackPtr};
use crate::translator::image::{Immediate, Word};
use crate::translator::profile::InterpreterProfile;

pub const CACHE_REGISTER_COUNT: usize = 8;

/// What a handler did. The terminal handler returns `Halt`; every
/// other handler names the next handler to run and leaves `pc`
/// pointing at that handler's own immediates.
pub enum HandlerResult {
    Continue,
    Halt,
    Trap(TrapCode),
}

/// Everything a handler needs: the operand-stack cursor, the register
/// cache, the current function's cell stream, and a pointer back to
/// the owning instance for memory/global/call access.
pub struct ExecCtx<P: InterpreterProfile> {
    pub sp: RuntimeStackPtr,
    pub pc: u32,
    pub cells: *const [Word<P>],
    pub regs: [UntypedValue; CACHE_REGISTER_COUNT],
    pub frame_base: usize,
    pub instance: *mut Instance<P>,
}

impl<P: InterpreterProfile> ExecCtx<P> {
    fn cells(&self) -> &[Word<P>] {
        unsafe { &*self.cells }
    }

    pub fn instance(&mut self) -> &mut Instance<P> {
        unsafe { &mut *self.instance }
    }

    fn next_imm<'a>(&mut self) -> &'a Immediate {
        let cells = self.cells;
        let pc = self.pc as usize;
        self.pc += 1;
        let cell = unsafe { &(*cells)[pc] };
        match cell {
            Word::Imm(imm) => imm,
            Word::Handler(_) => panic!("dispatch: expected immediate cell, found handler"),
        }
    }

    fn next_handler(&mut self) -> HandlerFn<P> {
        let cell = &self.cells()[self.pc as usize];
        match cell {
            Word::Handler(h) => *h,
            Word::Imm(_) => panic!("dispatch: expected handler cell, found immediate"),
        }
    }

    fn fail(&mut self, trap: TrapCode) -> HandlerResult {
        log::debug!("trap at pc={}: {trap:?}", self.pc);
        HandlerResult::Trap(trap)
    }
}

pub type HandlerFn<P> = fn(&mut ExecCtx<P>) -> HandlerResult;

/// Runs the cell stream starting at `pc = 0` to completion. Returns
/// `Ok(())` on `Halt`, or the trap the chain raised.
pub fn run_chain<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> Result<(), TrapCode> {
    loop {
        let handler = ctx.next_handler();
        ctx.pc += 1;
        match handler(ctx) {
            HandlerResult::Continue => continue,
            HandlerResult::Halt => return Ok(()),
            HandlerResult::Trap(t) => return Err(t),
        }
    }
}

pub fn terminal_handler<P: InterpreterProfile>(_ctx: &mut ExecCtx<P>) -> HandlerResult {
    HandlerResult::Halt
}

pub fn h_unreachable<P: InterpreterProfile>(_ctx: &mut ExecCtx<P>) -> HandlerResult {
    HandlerResult::Trap(TrapCode::UnreachableCodeReached)
}

pub fn h_nop<P: InterpreterProfile>(_ctx: &mut ExecCtx<P>) -> HandlerResult {
    HandlerResult::Continue
}

pub fn h_i32_const<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let v = match ctx.next_imm() {
        Immediate::I32(v) => UntypedValue::from(*v),
        _ => unreachable!(),
    };
    ctx.sp.push(v);
    HandlerResult::Continue
}

pub fn h_i64_const<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let v = match ctx.next_imm() {
        Immediate::I64(v) => UntypedValue::from(*v),
        _ => unreachable!(),
    };
    ctx.sp.push(v);
    HandlerResult::Continue
}

pub fn h_f32_const<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let v = match ctx.next_imm() {
        Immediate::F32Bits(b) => UntypedValue::from_f32_bits(*b),
        _ => unreachable!(),
    };
    ctx.sp.push(v);
    HandlerResult::Continue
}

pub fn h_f64_const<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let v = match ctx.next_imm() {
        Immediate::F64Bits(b) => UntypedValue::from_f64_bits(*b),
        _ => unreachable!(),
    };
    ctx.sp.push(v);
    HandlerResult::Continue
}

pub fn h_drop<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    ctx.sp.drop_n(1);
    HandlerResult::Continue
}

/// `drop` folded against a cache-resident top: a pure register
/// decrement, no operand-stack traffic at all. Selected by the
/// translator only when the cache state at this site says the top is
/// cache-resident; otherwise [`h_drop`] is emitted instead.
pub fn h_drop_cached<P: InterpreterProfile>(_ctx: &mut ExecCtx<P>) -> HandlerResult {
    HandlerResult::Continue
}

pub fn h_select<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let cond = ctx.sp.pop();
    let v2 = ctx.sp.pop();
    let v1 = ctx.sp.pop();
    ctx.sp.push(if cond.to_i32() != 0 { v1 } else { v2 });
    HandlerResult::Continue
}

pub fn h_local_get<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let idx = match ctx.next_imm() {
        Immediate::Local(idx) => idx.0,
        _ => unreachable!(),
    };
    let v = ctx.sp.local(ctx.frame_base, idx);
    ctx.sp.push(v);
    HandlerResult::Continue
}

/// A monomorphized `local.get` specialized for a fixed cache slot: the
/// source's template-specialization-on-`CompileOption` machinery,
/// realized in Rust as a const-generic instantiation per feasible
/// ring position, invoked through a build-time table of function
/// pointers keyed by that position (one concrete `fn` item per `POS`,
/// coerced to the same `HandlerFn<P>` type).
pub fn h_local_get_cached<P: InterpreterProfile, const POS: usize>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let idx = match ctx.next_imm() {
        Immediate::Local(idx) => idx.0,
        _ => unreachable!(),
    };
    let v = ctx.sp.local(ctx.frame_base, idx);
    ctx.regs[POS] = v;
    HandlerResult::Continue
}

/// Build-time table of the feasible `local.get` cache positions, one
/// monomorphized handler per slot, covering every ring position a
/// [`RegisterCached`](super::super::translator::profile::RegisterCached)
/// profile can address.
pub fn local_get_cached_table<P: InterpreterProfile>() -> [HandlerFn<P>; CACHE_REGISTER_COUNT] {
    [
        h_local_get_cached::<P, 0>,
        h_local_get_cached::<P, 1>,
        h_local_get_cached::<P, 2>,
        h_local_get_cached::<P, 3>,
        h_local_get_cached::<P, 4>,
        h_local_get_cached::<P, 5>,
        h_local_get_cached::<P, 6>,
        h_local_get_cached::<P, 7>,
    ]
}

/// Writes a cache-resident run back onto the operand stack in program
/// order, emptying the registers it occupied. Emitted before any
/// instruction that isn't itself cache-aware, satisfying the
/// merge-point invariant for free: every such instruction forces a
/// spill first, so no two control-flow edges can disagree about
/// what's cached.
pub fn h_spill_cache<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let (begin, count) = match (ctx.next_imm(), ctx.next_imm()) {
        (Immediate::Cache(slot), Immediate::I32(count)) => (slot.0, *count as usize),
        _ => unreachable!(),
    };
    for i in 0..count {
        let v = ctx.regs[begin + i];
        ctx.sp.push(v);
    }
    HandlerResult::Continue
}

pub fn h_local_set<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let idx = match ctx.next_imm() {
        Immediate::Local(idx) => idx.0,
        _ => unreachable!(),
    };
    let v = ctx.sp.pop();
    ctx.sp.set_local(ctx.frame_base, idx, v);
    HandlerResult::Continue
}

pub fn h_local_tee<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let idx = match ctx.next_imm() {
        Immediate::Local(idx) => idx.0,
        _ => unreachable!(),
    };
    let v = ctx.sp.peek(0);
    ctx.sp.set_local(ctx.frame_base, idx, v);
    HandlerResult::Continue
}

pub fn h_global_get<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let idx = match ctx.next_imm() {
        Immediate::Global(idx) => idx.0 as usize,
        _ => unreachable!(),
    };
    let v = ctx.instance().globals[idx].value;
    ctx.sp.push(v);
    HandlerResult::Continue
}

pub fn h_global_set<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let idx = match ctx.next_imm() {
        Immediate::Global(idx) => idx.0 as usize,
        _ => unreachable!(),
    };
    let v = ctx.sp.pop();
    ctx.instance().globals[idx].value = v;
    HandlerResult::Continue
}

pub fn h_numeric_unary<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let op = match ctx.next_imm() {
        Immediate::I32(op) => *op as u8,
        _ => unreachable!(),
    };
    let a = ctx.sp.pop();
    match eval_unary(op, a) {
        Ok(v) => {
            ctx.sp.push(v);
            HandlerResult::Continue
        }
        Err(t) => ctx.fail(t),
    }
}

pub fn h_numeric_binary<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let op = match ctx.next_imm() {
        Immediate::I32(op) => *op as u8,
        _ => unreachable!(),
    };
    let b = ctx.sp.pop();
    let a = ctx.sp.pop();
    match eval_binary(op, a, b) {
        Ok(v) => {
            ctx.sp.push(v);
            HandlerResult::Continue
        }
        Err(t) => ctx.fail(t),
    }
}

pub fn h_memory_load<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let (mem_idx, mem_arg) = match ctx.next_imm() {
        Immediate::Mem(idx, arg) => (idx.0 as usize, *arg),
        _ => unreachable!(),
    };
    let op = match ctx.next_imm() {
        Immediate::I32(op) => *op as u8,
        _ => unreachable!(),
    };
    let info = crate::types::mem_load_info(op).expect("translator only emits valid load opcodes here");
    let addr = ctx.sp.pop().to_u32();
    let Some(addr) = addr.checked_add(mem_arg.offset) else {
        return ctx.fail(TrapCode::MemoryOutOfBounds);
    };
    let memory = &ctx.instance().memories[mem_idx];
    let bytes = match memory.read(addr, info.access_size) {
        Ok(b) => b,
        Err(t) => return ctx.fail(t),
    };
    let mut buf = [0u8; 8];
    buf[..info.access_size as usize].copy_from_slice(bytes);
    let raw = u64::from_le_bytes(buf);
    let value = if info.value_type.is_float() {
        if info.access_size == 4 {
            UntypedValue::from_f32_bits(raw as u32)
        } else {
            UntypedValue::from_f64_bits(raw)
        }
    } else if info.sign_extend {
        let shift = 64 - info.access_size * 8;
        UntypedValue::from(((raw << shift) as i64) >> shift)
    } else {
        UntypedValue::from(raw)
    };
    ctx.sp.push(value);
    HandlerResult::Continue
}

pub fn h_memory_store<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let (mem_idx, mem_arg) = match ctx.next_imm() {
        Immediate::Mem(idx, arg) => (idx.0 as usize, *arg),
        _ => unreachable!(),
    };
    let op = match ctx.next_imm() {
        Immediate::I32(op) => *op as u8,
        _ => unreachable!(),
    };
    let info = crate::types::mem_store_info(op).expect("translator only emits valid store opcodes here");
    let value = ctx.sp.pop();
    let addr = ctx.sp.pop().to_u32();
    let Some(addr) = addr.checked_add(mem_arg.offset) else {
        return ctx.fail(TrapCode::MemoryOutOfBounds);
    };
    let bytes = value.to_u64().to_le_bytes();
    let memory = &mut ctx.instance().memories[mem_idx];
    match memory.write(addr, &bytes[..info.access_size as usize]) {
        Ok(()) => HandlerResult::Continue,
        Err(t) => ctx.fail(t),
    }
}

pub fn h_memory_size<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let idx = match ctx.next_imm() {
        Immediate::Mem(idx, _) => idx.0 as usize,
        _ => unreachable!(),
    };
    let pages = ctx.instance().memories[idx].current_pages();
    ctx.sp.push(UntypedValue::from(pages as i32));
    HandlerResult::Continue
}

pub fn h_memory_grow<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let idx = match ctx.next_imm() {
        Immediate::Mem(idx, _) => idx.0 as usize,
        _ => unreachable!(),
    };
    let delta = ctx.sp.pop().to_u32();
    let result = ctx.instance().memories[idx].grow(delta);
    ctx.sp.push(UntypedValue::from(result.map(|p| p as i32).unwrap_or(-1)));
    HandlerResult::Continue
}

pub fn h_br<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let offset = match ctx.next_imm() {
        Immediate::Branch(b) => b.to_i32(),
        _ => unreachable!(),
    };
    ctx.pc = (ctx.pc as i64 + offset as i64) as u32;
    HandlerResult::Continue
}

pub fn h_br_if<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let offset = match ctx.next_imm() {
        Immediate::Branch(b) => b.to_i32(),
        _ => unreachable!(),
    };
    let cond = ctx.sp.pop();
    if cond.to_i32() != 0 {
        ctx.pc = (ctx.pc as i64 + offset as i64) as u32;
    }
    HandlerResult::Continue
}

/// Used only for `if`'s own entry test: jumps to the `else`/`end`
/// target when the condition is false, the inverse sense of `br_if`'s
/// "branch when true".
pub fn h_br_if_false<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let offset = match ctx.next_imm() {
        Immediate::Branch(b) => b.to_i32(),
        _ => unreachable!(),
    };
    let cond = ctx.sp.pop();
    if cond.to_i32() == 0 {
        ctx.pc = (ctx.pc as i64 + offset as i64) as u32;
    }
    HandlerResult::Continue
}

pub fn h_br_table<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let targets = match ctx.next_imm() {
        Immediate::BranchTable(ts) => ts.clone(),
        _ => unreachable!(),
    };
    let idx = ctx.sp.pop().to_u32() as usize;
    let chosen = targets.get(idx).or_else(|| targets.last()).copied().unwrap();
    ctx.pc = (ctx.pc as i64 + chosen.to_i32() as i64) as u32;
    HandlerResult::Continue
}

pub fn h_return<P: InterpreterProfile>(_ctx: &mut ExecCtx<P>) -> HandlerResult {
    HandlerResult::Halt
}

/// Looks up the opcode signature of a numeric instruction purely to
/// share the family classification with the validator; translation
/// uses it to decide arity when emitting [`h_numeric_unary`] vs
/// [`h_numeric_binary`].
pub fn numeric_arity(op: u8) -> u8 {
    numeric_sig(op).map(|s| s.arity).unwrap_or(1)
}

pub fn h_call<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let func_index = match ctx.next_imm() {
        Immediate::Func(idx) => idx.0 as usize,
        _ => unreachable!(),
    };
    call_by_index(ctx, func_index)
}

pub fn h_call_indirect<P: InterpreterProfile>(ctx: &mut ExecCtx<P>) -> HandlerResult {
    let table_index = match ctx.next_imm() {
        Immediate::Table(idx) => idx.0 as usize,
        _ => unreachable!(),
    };
    let elem_index = ctx.sp.pop().to_u32() as usize;
    let func_index = {
        let table = &ctx.instance().tables[table_index];
        match table.elements.get(elem_index).copied().flatten() {
            Some(f) => f as usize,
            None => return ctx.fail(TrapCode::IndirectCallToNull),
        }
    };
    call_by_index(ctx, func_index)
}

/// Calls are not trampolined into the running chain: each Wasm call
/// recurses through [`run_function`] on the native stack, same as a
/// direct-threaded interpreter would. The trampoline in [`run_chain`]
/// only needs to guarantee O(1) stack growth for the instruction
/// chain *within* a function; crossing a call boundary is expected to
/// use a stack frame, bounded by the same [`TrapCode::StackOverflow`]
/// as the operand stack itself.
fn call_by_index<P: InterpreterProfile>(ctx: &mut ExecCtx<P>, func_index: usize) -> HandlerResult {
    let (param_count, result_count) = {
        let func = &ctx.instance().functions[func_index];
        (func.image.param_count, func.image.result_count)
    };
    // Walking `depth_from_top` downward from `param_count - 1` to `0`
    // visits the deepest (first-pushed, param 0) slot first, so the
    // pushes already land in `args` in param order.
    let mut args = Vec::with_capacity(param_count);
    for i in (0..param_count).rev() {
        args.push(ctx.sp.peek(i));
    }
    ctx.sp.drop_n(param_count);
    match run_function(ctx.instance(), func_index, &args, result_count) {
        Ok(results) => {
            for v in results {
                ctx.sp.push(v);
            }
            HandlerResult::Continue
        }
        Err(t) => ctx.fail(t),
    }
}

/// Entry point for running one function against an already-built
/// instance. Sets up the stack frame for `args`, runs the chain, and
/// collects `result_count` values off the top on success.
pub fn run_function<P: InterpreterProfile>(
    instance: &mut Instance<P>,
    func_index: usize,
    args: &[UntypedValue],
    result_count: usize,
) -> Result<Vec<UntypedValue>, TrapCode> {
    log::trace!("running function {func_index} with {} args", args.len());
    let mut stack = RuntimeStack::new(crate::types::DEFAULT_MAX_VALUE_STACK_HEIGHT);
    let (local_count, max_stack_height, param_count, cells_ptr) = {
        let func = &instance.functions[func_index];
        (
            func.image.local_count,
            func.image.max_stack_height.max(args.len() + result_count + 16),
            func.image.param_count,
            &func.image.cells[..] as *const [Word<P>],
        )
    };
    stack.reserve(max_stack_height)?;
    let mut sp = stack.stack_ptr();
    for &a in args {
        sp.push(a);
    }
    for _ in param_count..local_count {
        sp.push(UntypedValue::default());
    }
    stack.sync_stack_ptr(sp);

    let mut ctx = ExecCtx::<P> {
        sp: stack.stack_ptr(),
        pc: 0,
        cells: cells_ptr,
        regs: [UntypedValue::default(); CACHE_REGISTER_COUNT],
        frame_base: 0,
        instance: instance as *mut Instance<P>,
    };
    run_chain(&mut ctx)?;
    stack.sync_stack_ptr(ctx.sp);
    Ok(stack.drain(result_count))
}
