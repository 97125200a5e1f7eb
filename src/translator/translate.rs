//! Lowers one already-validated function body into a handler-chain
//! [`Image`].
//!
//! Walks the same bytes the validator walked, this time trusting them:
//! no type checks, no error recovery. What differs from the validator
//! is purely a second concern layered on top of the opcode walk — at
//! each instruction, deciding whether its operands live in the
//! register cache or the operand stack, and emitting the handler that
//! matches.
//!
//! Caching is scoped to what a single streaming pass can decide
//! locally: a run of `local.get`s of the same numeric type accumulates
//! in the register ring, `drop` against a cache-resident top folds
//! into a pure decrement, and every other instruction spills whatever
//! is cached before it runs. That last rule is also what satisfies the
//! merge-point invariant — block/loop/if/else/end, and every branch,
//! fall under "every other instruction", so no control-flow edge can
//! ever disagree with another about what's cache-resident.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::interp::dispatch::{self, HandlerFn};
use crate::types::{
    mem_load_info, mem_store_info, numeric_sig, wasm_op::byte, BranchOffset, FuncIdx, GlobalIdx, LocalIdx,
    MemIdx, ModuleView, TableIdx, ValidationFailure, ValueType,
};
use crate::validator::{CodeReader, FrameKind, ValidatedFunction};

use super::cache::{ring_for, CacheState, PopOutcome, PushOutcome};
use super::image::{CacheSlot, Image, Immediate, MemArg};
use super::profile::InterpreterProfile;

enum PendingPatch {
    Direct(u32),
    TableSlot(u32, usize),
}

struct XFrame {
    kind: FrameKind,
    loop_start: Option<u32>,
    end_patches: Vec<PendingPatch>,
    if_false_patch: Option<u32>,
}

/// Translates one validated function into its handler-chain image.
///
/// `func_type_results` is the function's declared result arity
/// (0 or 1 in Wasm 1.0), needed to size the call boundary.
pub fn translate_function<P: InterpreterProfile>(
    _module: &ModuleView,
    validated: &ValidatedFunction,
    code: &[u8],
    func_type_results: usize,
) -> Result<Image<P>, ValidationFailure> {
    log::trace!("translating function with {} locals, {} results", validated.locals.len(), func_type_results);

    let mut image = Image::new(validated.locals.len(), validated.param_count, func_type_results);
    let mut cache = CacheState::new();
    let mut control: Vec<XFrame> = Vec::new();
    control.push(XFrame { kind: FrameKind::Function, loop_start: None, end_patches: Vec::new(), if_false_patch: None });

    let mut r = CodeReader::new(code, 0);
    loop {
        if r.eof() {
            break;
        }
        let op = r.read_opcode().expect("pre-validated bytecode");
        match op {
            byte::UNREACHABLE => {
                spill_if_needed(&mut image, &mut cache);
                image.emit_handler(dispatch::h_unreachable::<P>);
            }
            byte::NOP => {
                spill_if_needed(&mut image, &mut cache);
                image.emit_handler(dispatch::h_nop::<P>);
            }
            byte::BLOCK | byte::LOOP | byte::IF => {
                spill_if_needed(&mut image, &mut cache);
                let _bt_byte = r.read_byte(|| unreachable!()).expect("pre-validated bytecode");
                if op == byte::IF {
                    let cond_handler = image.emit_handler(dispatch::h_br_if_false::<P>);
                    image.emit_imm(Immediate::Branch(BranchOffset::uninit()));
                    control.push(XFrame {
                        kind: FrameKind::If,
                        loop_start: None,
                        end_patches: Vec::new(),
                        if_false_patch: Some(cond_handler),
                    });
                } else {
                    let kind = if op == byte::LOOP { FrameKind::Loop } else { FrameKind::Block };
                    let loop_start = if kind == FrameKind::Loop { Some(image.position()) } else { None };
                    control.push(XFrame { kind, loop_start, end_patches: Vec::new(), if_false_patch: None });
                }
            }
            byte::ELSE => {
                spill_if_needed(&mut image, &mut cache);
                let jump_over_else = image.emit_handler(dispatch::h_br::<P>);
                image.emit_imm(Immediate::Branch(BranchOffset::uninit()));
                let frame = control.last_mut().expect("control stack non-empty");
                frame.end_patches.push(PendingPatch::Direct(jump_over_else));
                if let Some(if_false) = frame.if_false_patch.take() {
                    image.patch_branch(if_false + 1, image.position());
                }
            }
            byte::END => {
                let frame = control.pop().expect("control stack non-empty");
                spill_if_needed(&mut image, &mut cache);
                let here = image.position();
                if let Some(if_false) = frame.if_false_patch {
                    image.patch_branch(if_false + 1, here);
                }
                for patch in frame.end_patches {
                    match patch {
                        PendingPatch::Direct(at) => image.patch_branch(at + 1, here),
                        PendingPatch::TableSlot(at, slot) => image.patch_branch_table_slot(at + 1, slot, here),
                    }
                }
                if frame.kind == FrameKind::Function {
                    image.emit_handler(dispatch::terminal_handler::<P>);
                    break;
                }
            }
            byte::BR => {
                spill_if_needed(&mut image, &mut cache);
                let label_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                let at = image.emit_handler(dispatch::h_br::<P>);
                image.emit_imm(Immediate::Branch(BranchOffset::uninit()));
                resolve_branch(&mut image, &mut control, label_index, at);
            }
            byte::BR_IF => {
                spill_if_needed(&mut image, &mut cache);
                let label_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                let at = image.emit_handler(dispatch::h_br_if::<P>);
                image.emit_imm(Immediate::Branch(BranchOffset::uninit()));
                resolve_branch(&mut image, &mut control, label_index, at);
            }
            byte::BR_TABLE => {
                spill_if_needed(&mut image, &mut cache);
                let count = r.read_vec_len(|| unreachable!()).expect("pre-validated bytecode");
                let mut labels = Vec::with_capacity(count as usize + 1);
                for _ in 0..count {
                    labels.push(r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode"));
                }
                labels.push(r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode"));
                let at = image.emit_handler(dispatch::h_br_table::<P>);
                let placeholder: Vec<BranchOffset> = (0..labels.len()).map(|_| BranchOffset::uninit()).collect();
                image.emit_imm(Immediate::BranchTable(Arc::from(placeholder)));
                for (slot, label_index) in labels.into_iter().enumerate() {
                    resolve_branch_table(&mut image, &mut control, label_index, at, slot);
                }
            }
            byte::RETURN => {
                spill_if_needed(&mut image, &mut cache);
                image.emit_handler(dispatch::h_return::<P>);
            }
            byte::CALL => {
                spill_if_needed(&mut image, &mut cache);
                let function_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_call::<P>);
                image.emit_imm(Immediate::Func(FuncIdx(function_index)));
            }
            byte::CALL_INDIRECT => {
                spill_if_needed(&mut image, &mut cache);
                let _type_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                let table_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_call_indirect::<P>);
                image.emit_imm(Immediate::Table(TableIdx(table_index)));
            }
            byte::DROP => {
                if !cache.is_fully_spilled() {
                    let (_, outcome) = cache.pop::<P>();
                    if let PopOutcome::Cached { .. } = outcome {
                        image.emit_handler(dispatch::h_drop_cached::<P>);
                        continue;
                    }
                }
                image.emit_handler(dispatch::h_drop::<P>);
            }
            byte::SELECT => {
                spill_if_needed(&mut image, &mut cache);
                image.emit_handler(dispatch::h_select::<P>);
            }
            byte::LOCAL_GET => {
                let local_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                let ty = validated.locals[local_index as usize];
                emit_local_get::<P>(&mut image, &mut cache, ty, local_index);
            }
            byte::LOCAL_SET => {
                spill_if_needed(&mut image, &mut cache);
                let local_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_local_set::<P>);
                image.emit_imm(Immediate::Local(LocalIdx(local_index)));
            }
            byte::LOCAL_TEE => {
                spill_if_needed(&mut image, &mut cache);
                let local_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_local_tee::<P>);
                image.emit_imm(Immediate::Local(LocalIdx(local_index)));
            }
            byte::GLOBAL_GET => {
                spill_if_needed(&mut image, &mut cache);
                let global_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_global_get::<P>);
                image.emit_imm(Immediate::Global(GlobalIdx(global_index)));
            }
            byte::GLOBAL_SET => {
                spill_if_needed(&mut image, &mut cache);
                let global_index = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_global_set::<P>);
                image.emit_imm(Immediate::Global(GlobalIdx(global_index)));
            }
            byte::MEMORY_SIZE => {
                spill_if_needed(&mut image, &mut cache);
                let _reserved = r.read_byte(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_memory_size::<P>);
                image.emit_imm(Immediate::Mem(MemIdx(0), MemArg { offset: 0 }));
            }
            byte::MEMORY_GROW => {
                spill_if_needed(&mut image, &mut cache);
                let _reserved = r.read_byte(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_memory_grow::<P>);
                image.emit_imm(Immediate::Mem(MemIdx(0), MemArg { offset: 0 }));
            }
            byte::I32_CONST => {
                let v = r.read_i32_leb(|| unreachable!()).expect("pre-validated bytecode");
                spill_if_needed(&mut image, &mut cache);
                image.emit_handler(dispatch::h_i32_const::<P>);
                image.emit_imm(Immediate::I32(v));
            }
            byte::I64_CONST => {
                let v = r.read_i64_leb(|| unreachable!()).expect("pre-validated bytecode");
                spill_if_needed(&mut image, &mut cache);
                image.emit_handler(dispatch::h_i64_const::<P>);
                image.emit_imm(Immediate::I64(v));
            }
            byte::F32_CONST => {
                let bits = r.read_f32_bits(|| unreachable!()).expect("pre-validated bytecode");
                spill_if_needed(&mut image, &mut cache);
                image.emit_handler(dispatch::h_f32_const::<P>);
                image.emit_imm(Immediate::F32Bits(bits));
            }
            byte::F64_CONST => {
                let bits = r.read_f64_bits(|| unreachable!()).expect("pre-validated bytecode");
                spill_if_needed(&mut image, &mut cache);
                image.emit_handler(dispatch::h_f64_const::<P>);
                image.emit_imm(Immediate::F64Bits(bits));
            }
            _ if (byte::MEM_LOAD_FIRST..=byte::MEM_LOAD_LAST).contains(&op) => {
                spill_if_needed(&mut image, &mut cache);
                let _info = mem_load_info(op).unwrap();
                let _align = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                let offset = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_memory_load::<P>);
                image.emit_imm(Immediate::Mem(MemIdx(0), MemArg { offset }));
                image.emit_imm(Immediate::I32(op as i32));
            }
            _ if (byte::MEM_STORE_FIRST..=byte::MEM_STORE_LAST).contains(&op) => {
                spill_if_needed(&mut image, &mut cache);
                let _info = mem_store_info(op).unwrap();
                let _align = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                let offset = r.read_u32_leb(|| unreachable!()).expect("pre-validated bytecode");
                image.emit_handler(dispatch::h_memory_store::<P>);
                image.emit_imm(Immediate::Mem(MemIdx(0), MemArg { offset }));
                image.emit_imm(Immediate::I32(op as i32));
            }
            _ if (byte::NUMERIC_FIRST..=byte::NUMERIC_LAST).contains(&op) => {
                spill_if_needed(&mut image, &mut cache);
                let sig = numeric_sig(op).expect("pre-validated bytecode");
                if sig.arity == 1 {
                    image.emit_handler(dispatch::h_numeric_unary::<P>);
                } else {
                    image.emit_handler(dispatch::h_numeric_binary::<P>);
                }
                image.emit_imm(Immediate::I32(op as i32));
            }
            other => unreachable!("pre-validated bytecode carries opcode {other:#x}"),
        }
    }

    image.max_stack_height = validated.locals.len() + 64;
    Ok(image)
}

/// Spills any cache-resident value before emitting an instruction
/// that isn't itself cache-aware.
fn spill_if_needed<P: InterpreterProfile>(image: &mut Image<P>, cache: &mut CacheState) {
    if let Some((ty, count, _ring_pos)) = cache.spill_all() {
        let begin = ring_for::<P>(ty).begin;
        image.emit_handler(dispatch::h_spill_cache::<P>);
        image.emit_imm(Immediate::Cache(CacheSlot(begin)));
        image.emit_imm(Immediate::I32(count as i32));
    }
}

fn emit_local_get<P: InterpreterProfile>(image: &mut Image<P>, cache: &mut CacheState, ty: ValueType, local_index: u32) {
    match cache.push::<P>(ty) {
        PushOutcome::Stack => {
            image.emit_handler(dispatch::h_local_get::<P>);
            image.emit_imm(Immediate::Local(LocalIdx(local_index)));
        }
        PushOutcome::Cached { ring_pos } => {
            emit_cached_get::<P>(image, ring_pos, local_index);
        }
        PushOutcome::Spilled { spilled_pos, ring_pos } => {
            image.emit_handler(dispatch::h_spill_cache::<P>);
            image.emit_imm(Immediate::Cache(CacheSlot(spilled_pos)));
            image.emit_imm(Immediate::I32(1));
            emit_cached_get::<P>(image, ring_pos, local_index);
        }
        PushOutcome::RunDisplaced { displaced_type, displaced_count, ring_pos } => {
            let begin = ring_for::<P>(displaced_type).begin;
            image.emit_handler(dispatch::h_spill_cache::<P>);
            image.emit_imm(Immediate::Cache(CacheSlot(begin)));
            image.emit_imm(Immediate::I32(displaced_count as i32));
            emit_cached_get::<P>(image, ring_pos, local_index);
        }
    }
}

fn emit_cached_get<P: InterpreterProfile>(image: &mut Image<P>, ring_pos: usize, local_index: u32) {
    let table = dispatch::local_get_cached_table::<P>();
    let handler: HandlerFn<P> = table[ring_pos];
    image.emit_handler(handler);
    image.emit_imm(Immediate::Local(LocalIdx(local_index)));
}

/// Resolves one branch's target: immediately, if its frame is a loop
/// (the target — the loop's own start — is already known), or
/// deferred to that frame's `end` otherwise.
fn resolve_branch<P: InterpreterProfile>(image: &mut Image<P>, control: &mut [XFrame], label_index: u32, at: u32) {
    let idx = control.len() - 1 - label_index as usize;
    match control[idx].loop_start {
        Some(target) => image.patch_branch(at + 1, target),
        None => control[idx].end_patches.push(PendingPatch::Direct(at)),
    }
}

fn resolve_branch_table<P: InterpreterProfile>(
    image: &mut Image<P>,
    control: &mut [XFrame],
    label_index: u32,
    at: u32,
    slot: usize,
) {
    let idx = control.len() - 1 - label_index as usize;
    match control[idx].loop_start {
        Some(target) => image.patch_branch_table_slot(at + 1, slot, target),
        None => control[idx].end_patches.push(PendingPatch::TableSlot(at, slot)),
    }
}
