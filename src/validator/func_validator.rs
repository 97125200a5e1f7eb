use alloc::vec::Vec;

use crate::types::{
    mem_load_info, mem_store_info, mnemonic, numeric_sig, wasm_op::byte, BlockType, FunctionType,
    ModuleView, TypeIdx, ValidationError, ValidationFailure, ValueType,
};

use super::frame::{ControlFrame, FrameKind};
use super::reader::CodeReader;

/// What survives validation for the translator to consume: the
/// function's full local list (parameters followed by declared
/// locals) indexed the same way `local.get`/`local.set`/`local.tee`
/// index them.
#[derive(Debug, Clone)]
pub struct ValidatedFunction {
    pub locals: Vec<ValueType>,
    pub param_count: usize,
    pub func_type_idx: TypeIdx,
}

struct FuncValidator<'a> {
    module: ModuleView<'a>,
    func_type: FunctionType,
    locals: Vec<ValueType>,
    operand_stack: Vec<ValueType>,
    control_stack: Vec<ControlFrame>,
    polymorphic: bool,
}

type VResult<T> = Result<T, ValidationFailure>;

impl<'a> FuncValidator<'a> {
    fn fail(&self, at: usize, kind: ValidationError) -> ValidationFailure {
        ValidationFailure::new(at, kind)
    }

    fn top_frame(&self) -> &ControlFrame {
        self.control_stack.last().expect("control stack always has the function frame")
    }

    fn top_frame_mut(&mut self) -> &mut ControlFrame {
        self.control_stack.last_mut().expect("control stack always has the function frame")
    }

    fn push_val(&mut self, t: ValueType) {
        self.operand_stack.push(t);
    }

    fn push_vals(&mut self, ts: &[ValueType]) {
        for &t in ts {
            self.push_val(t);
        }
    }

    /// Pops one operand, returning `None` ("Unknown") if the frame is
    /// polymorphic and already drained to its floor.
    fn pop_val(&mut self, at: usize, op: &'static str) -> VResult<Option<ValueType>> {
        let base = self.top_frame().stack_base;
        if self.operand_stack.len() == base {
            if self.polymorphic {
                return Ok(None);
            }
            return Err(self.fail(
                at,
                ValidationError::OperandStackUnderflow { op, stack_size_actual: 0, stack_size_required: 1 },
            ));
        }
        Ok(Some(self.operand_stack.pop().unwrap()))
    }

    fn pop_expect(&mut self, at: usize, expect: ValueType, op: &'static str) -> VResult<()> {
        match self.pop_val(at, op)? {
            None => Ok(()),
            Some(actual) if actual == expect => Ok(()),
            Some(actual) => {
                Err(self.fail(at, ValidationError::NumericOperandTypeMismatch { op, expected_type: expect, actual_type: actual }))
            }
        }
    }

    fn mark_unreachable(&mut self) {
        self.polymorphic = true;
        let base = self.top_frame().stack_base;
        self.operand_stack.truncate(base);
    }

    fn resolve_block_type(&self, at: usize, byte: u8) -> VResult<BlockType> {
        match byte {
            0x40 => Ok(BlockType::Empty),
            0x7F => Ok(BlockType::Value(ValueType::I32)),
            0x7E => Ok(BlockType::Value(ValueType::I64)),
            0x7D => Ok(BlockType::Value(ValueType::F32)),
            0x7C => Ok(BlockType::Value(ValueType::F64)),
            other => Err(self.fail(at, ValidationError::IllegalBlockType { byte: other })),
        }
    }

    fn push_frame(&mut self, kind: FrameKind, block_type: BlockType) {
        let base = self.operand_stack.len();
        self.control_stack.push(ControlFrame::new(kind, block_type, base, self.polymorphic));
    }

    /// Checks that the stack above `frame.stack_base` holds exactly
    /// `frame.end_types()`, tolerating a polymorphic shortfall, then
    /// truncates the operand stack back to `frame.stack_base`. Shared
    /// by `end` (which then pushes the results back and restores the
    /// enclosing polymorphic bit) and `else` (which does neither: the
    /// then-branch's results don't survive into the else-branch).
    fn check_and_truncate_to_base(
        &mut self,
        at: usize,
        frame: &ControlFrame,
        block_kind: &'static str,
    ) -> VResult<()> {
        let end_types = frame.end_types().to_vec();
        let required = end_types.len();

        // Pop declared results off the top, checking types in reverse.
        for &expect in end_types.iter().rev() {
            match self.pop_val(at, "end")? {
                None => {}
                Some(actual) if actual == expect => {}
                Some(actual) => {
                    return Err(self.fail(
                        at,
                        ValidationError::EndResultMismatch {
                            block_kind,
                            expected_count: required,
                            actual_count: required,
                            expected_type: Some(expect),
                            actual_type: Some(actual),
                        },
                    ));
                }
            }
        }

        let actual_height = self.operand_stack.len();
        if actual_height != frame.stack_base && !self.polymorphic {
            return Err(self.fail(
                at,
                ValidationError::EndResultMismatch {
                    block_kind,
                    expected_count: required,
                    actual_count: actual_height - frame.stack_base + required,
                    expected_type: end_types.first().copied(),
                    actual_type: None,
                },
            ));
        }
        // A polymorphic frame may have fewer values than its floor
        // implies was popped; normalize the stack back to the floor.
        self.operand_stack.truncate(frame.stack_base);
        Ok(())
    }

    /// Pops the current frame, checking its declared results are on
    /// the stack (exactly, unless the frame is polymorphic), pushes
    /// them onto the enclosing frame, and restores the polymorphic bit
    /// for the continuation per the else/other-kind split.
    fn pop_control_frame(&mut self, at: usize, block_kind: &'static str) -> VResult<ControlFrame> {
        let frame = self.control_stack.last().unwrap().clone();
        self.check_and_truncate_to_base(at, &frame, block_kind)?;

        self.control_stack.pop();
        self.polymorphic = match frame.kind {
            FrameKind::Else => frame.polymorphic_base || (frame.then_polymorphic_end && self.polymorphic),
            _ => frame.polymorphic_base,
        };
        self.push_vals(frame.end_types());
        Ok(frame)
    }

    /// Closes the then-branch at an `else`: checks its results against
    /// the `if` frame's declared type, truncates the stack back to the
    /// frame's original `stack_base` with nothing re-pushed (the
    /// else-branch starts from the same floor the then-branch did, not
    /// from the then-branch's results), resets `polymorphic` to the
    /// bit captured when the `if` was entered, and converts the frame
    /// in place from `If` to `Else` so its `stack_base` and freshly
    /// recorded `then_polymorphic_end` carry over unchanged.
    fn close_then_branch(&mut self, at: usize) -> VResult<()> {
        let frame = self.control_stack.last().unwrap().clone();
        self.check_and_truncate_to_base(at, &frame, "if")?;

        let then_polymorphic_end = self.polymorphic;
        self.polymorphic = frame.polymorphic_base;

        let top = self.top_frame_mut();
        top.kind = FrameKind::Else;
        top.then_polymorphic_end = then_polymorphic_end;
        Ok(())
    }

    fn label_frame(&self, at: usize, label_index: u32, op: &'static str) -> VResult<&ControlFrame> {
        let count = self.control_stack.len() as u32;
        if label_index >= count {
            return Err(self.fail(
                at,
                ValidationError::IllegalLabelIndex { label_index, all_label_count: count },
            ));
        }
        let _ = op;
        Ok(&self.control_stack[(count - 1 - label_index) as usize])
    }

    /// Checks that the operand stack currently satisfies a branch
    /// target's label types, without popping (branches don't consume
    /// the stack below what `end`/fallthrough later needs; only an
    /// unconditional transfer truncates it, via `mark_unreachable`).
    fn check_branch_types(&mut self, at: usize, label_index: u32, op: &'static str) -> VResult<()> {
        let label_types = self.label_frame(at, label_index, op)?.label_types().to_vec();
        let mut probe = self.operand_stack.clone();
        for &expect in label_types.iter().rev() {
            let base = self.top_frame().stack_base;
            if probe.len() == base {
                if self.polymorphic {
                    continue;
                }
                return Err(self.fail(
                    at,
                    ValidationError::OperandStackUnderflow { op, stack_size_actual: 0, stack_size_required: 1 },
                ));
            }
            let actual = probe.pop().unwrap();
            if actual != expect {
                return Err(self.fail(
                    at,
                    ValidationError::BrValueTypeMismatch { op, expected_type: expect, actual_type: actual },
                ));
            }
        }
        Ok(())
    }

    fn local_type(&self, at: usize, local_index: u32) -> VResult<ValueType> {
        self.locals.get(local_index as usize).copied().ok_or_else(|| {
            self.fail(
                at,
                ValidationError::IllegalLocalIndex { local_index, all_local_count: self.locals.len() as u32 },
            )
        })
    }

    fn memarg(&self, r: &mut CodeReader, at: usize, op: &'static str, natural_align: u32) -> VResult<()> {
        if self.module.total_memory_count() == 0 {
            return Err(self.fail(at, ValidationError::NoMemory { op }));
        }
        let align = r.read_u32_leb(|| ValidationError::InvalidMemargAlign)?;
        let _offset = r.read_u32_leb(|| ValidationError::InvalidMemargOffset)?;
        if align > natural_align {
            return Err(self.fail(at, ValidationError::IllegalMemargAlignment { op, align, max_align: natural_align }));
        }
        Ok(())
    }
}

/// Validates one function body and, on success, returns the locals
/// list the translator needs to keep indexing consistent.
///
/// `function_index` must name a local function (i.e.
/// `>= imported_function_count` and `< total_function_count`).
pub fn validate_code<'a>(
    module: ModuleView<'a>,
    function_index: u32,
    declared_locals: &[(u32, ValueType)],
    code: &[u8],
) -> VResult<ValidatedFunction> {
    let imported = module.imported_function_count();
    let total = module.total_function_count();
    if function_index < imported {
        return Err(ValidationFailure::new(0, ValidationError::NotLocalFunction { function_index }));
    }
    if function_index >= total {
        return Err(ValidationFailure::new(
            0,
            ValidationError::InvalidFunctionIndex { function_index, all_function_size: total },
        ));
    }

    let func_type = module
        .function_type(function_index)
        .ok_or_else(|| ValidationFailure::new(0, ValidationError::InvalidFunctionIndex { function_index, all_function_size: total }))?
        .clone();

    log::trace!("validating function {function_index}");

    let func_type_idx = module.functions.type_indices[(function_index - imported) as usize];

    let mut locals = func_type.params.clone();
    for &(count, ty) in declared_locals {
        for _ in 0..count {
            locals.push(ty);
        }
    }

    let mut v = FuncValidator {
        module,
        func_type: func_type.clone(),
        locals,
        operand_stack: Vec::new(),
        control_stack: Vec::new(),
        polymorphic: false,
    };
    let func_block_type = match func_type.results.as_slice() {
        [] => BlockType::Empty,
        [t] => BlockType::Value(*t),
        _ => BlockType::Empty, // Wasm 1.0 caps result arity at 1; unreachable by construction.
    };
    v.push_frame(FrameKind::Function, func_block_type);

    let mut r = CodeReader::new(code, 0);
    run(&mut v, &mut r)?;

    if !r.eof() {
        return Err(ValidationFailure::new(r.position(), ValidationError::TrailingCodeAfterEnd));
    }
    if !v.control_stack.is_empty() {
        return Err(ValidationFailure::new(r.position(), ValidationError::MissingEnd));
    }

    Ok(ValidatedFunction { locals: v.locals, param_count: func_type.params.len(), func_type_idx })
}

fn run(v: &mut FuncValidator, r: &mut CodeReader) -> VResult<()> {
    loop {
        if v.control_stack.is_empty() {
            return Err(ValidationFailure::new(r.position(), ValidationError::TrailingCodeAfterEnd));
        }
        let at = r.position();
        if r.eof() {
            return Err(ValidationFailure::new(at, ValidationError::MissingEnd));
        }
        let op = r.read_opcode()?;

        match op {
            byte::UNREACHABLE => {
                v.mark_unreachable();
            }
            byte::NOP => {}
            byte::BLOCK | byte::LOOP | byte::IF => {
                let bt_byte = r.read_byte(|| ValidationError::MissingBlockType)?;
                let bt = v.resolve_block_type(at, bt_byte)?;
                if op == byte::IF {
                    v.pop_expect(at, ValueType::I32, "if")?;
                }
                let kind = match op {
                    byte::BLOCK => FrameKind::Block,
                    byte::LOOP => FrameKind::Loop,
                    byte::IF => FrameKind::If,
                    _ => unreachable!(),
                };
                v.push_frame(kind, bt);
            }
            byte::ELSE => {
                if v.top_frame().kind != FrameKind::If {
                    return Err(v.fail(at, ValidationError::IllegalElse));
                }
                v.close_then_branch(at)?;
            }
            byte::END => {
                let is_if_without_else =
                    v.top_frame().kind == FrameKind::If && !v.top_frame().end_types().is_empty();
                if is_if_without_else {
                    let expected_count = v.top_frame().end_types().len();
                    let expected_type = v.top_frame().end_types().first().copied();
                    return Err(v.fail(at, ValidationError::IfMissingElse { expected_count, expected_type }));
                }
                let block_kind = match v.top_frame().kind {
                    FrameKind::Function => "function",
                    FrameKind::Block => "block",
                    FrameKind::Loop => "loop",
                    FrameKind::If => "if",
                    FrameKind::Else => "if/else",
                };
                let was_function = v.top_frame().kind == FrameKind::Function;
                v.pop_control_frame(at, block_kind)?;
                if was_function {
                    return Ok(());
                }
            }
            byte::BR => {
                let label_index = r.read_u32_leb(|| ValidationError::InvalidLabelIndex)?;
                v.check_branch_types(at, label_index, "br")?;
                v.mark_unreachable();
            }
            byte::BR_IF => {
                let label_index = r.read_u32_leb(|| ValidationError::InvalidLabelIndex)?;
                v.pop_expect(at, ValueType::I32, "br_if")?;
                v.check_branch_types(at, label_index, "br_if")?;
            }
            byte::BR_TABLE => {
                let count = r.read_vec_len(|| ValidationError::InvalidLabelIndex)?;
                let mut targets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    targets.push(r.read_u32_leb(|| ValidationError::InvalidLabelIndex)?);
                }
                let default = r.read_u32_leb(|| ValidationError::InvalidLabelIndex)?;
                v.pop_expect(at, ValueType::I32, "br_table")?;

                let default_frame = v.label_frame(at, default, "br_table")?;
                let expected_arity = default_frame.label_types().len();
                let expected_type = default_frame.label_types().first().copied();
                for &t in &targets {
                    let frame = v.label_frame(at, t, "br_table")?;
                    let arity = frame.label_types().len();
                    let ty = frame.label_types().first().copied();
                    if arity != expected_arity || ty != expected_type {
                        return Err(v.fail(
                            at,
                            ValidationError::BrTableTargetTypeMismatch {
                                expected_label: default,
                                mismatched_label: t,
                                expected_arity,
                                actual_arity: arity,
                                expected_type,
                                actual_type: ty,
                            },
                        ));
                    }
                }
                v.check_branch_types(at, default, "br_table")?;
                for &t in &targets {
                    v.check_branch_types(at, t, "br_table")?;
                }
                v.mark_unreachable();
            }
            byte::RETURN => {
                let func_results = v.func_type.results.clone();
                let mut probe_ok = true;
                let func_base = v.control_stack[0].stack_base;
                let mut height = v.operand_stack.len();
                for &expect in func_results.iter().rev() {
                    if height == func_base && v.polymorphic {
                        continue;
                    }
                    if height == func_base {
                        probe_ok = false;
                        break;
                    }
                    let actual = v.operand_stack[height - 1];
                    height -= 1;
                    if actual != expect {
                        return Err(v.fail(
                            at,
                            ValidationError::BrValueTypeMismatch { op: "return", expected_type: expect, actual_type: actual },
                        ));
                    }
                }
                if !probe_ok {
                    return Err(v.fail(
                        at,
                        ValidationError::OperandStackUnderflow { op: "return", stack_size_actual: 0, stack_size_required: 1 },
                    ));
                }
                v.mark_unreachable();
            }
            byte::CALL => {
                let function_index = r.read_u32_leb(|| ValidationError::InvalidFunctionIndexEncoding)?;
                let total = v.module.total_function_count();
                let callee = v.module.function_type(function_index).ok_or_else(|| {
                    v.fail(at, ValidationError::InvalidFunctionIndex { function_index, all_function_size: total })
                })?;
                let params = callee.params.clone();
                let results = callee.results.clone();
                for &expect in params.iter().rev() {
                    v.pop_expect(at, expect, "call")?;
                }
                v.push_vals(&results);
            }
            byte::CALL_INDIRECT => {
                let type_index = r.read_u32_leb(|| ValidationError::InvalidTypeIndex)?;
                let _table_index = r.read_u32_leb(|| ValidationError::InvalidTableIndex)?;
                if v.module.total_table_count() == 0 {
                    return Err(v.fail(at, ValidationError::InvalidTableIndex));
                }
                let all_type_count = v.module.types.len() as u32;
                let callee = v.module.types.get(TypeIdx(type_index)).cloned().ok_or_else(|| {
                    v.fail(at, ValidationError::IllegalTypeIndex { type_index, all_type_count })
                })?;
                v.pop_expect(at, ValueType::I32, "call_indirect")?;
                for &expect in callee.params.iter().rev() {
                    v.pop_expect(at, expect, "call_indirect")?;
                }
                v.push_vals(&callee.results);
            }
            byte::DROP => {
                v.pop_val(at, "drop")?;
            }
            byte::SELECT => {
                v.pop_expect(at, ValueType::I32, "select")?;
                let v2 = v.pop_val(at, "select")?;
                let v1 = v.pop_val(at, "select")?;
                match (v1, v2) {
                    (Some(a), Some(b)) if a == b => v.push_val(a),
                    (Some(a), Some(b)) => {
                        return Err(v.fail(at, ValidationError::SelectTypeMismatch { type_v1: a, type_v2: b }));
                    }
                    (Some(a), None) => v.push_val(a),
                    (None, Some(b)) => v.push_val(b),
                    (None, None) => v.push_val(ValueType::I32),
                }
            }
            byte::LOCAL_GET => {
                let local_index = r.read_u32_leb(|| ValidationError::InvalidLocalIndex)?;
                let ty = v.local_type(at, local_index)?;
                v.push_val(ty);
            }
            byte::LOCAL_SET => {
                let local_index = r.read_u32_leb(|| ValidationError::InvalidLocalIndex)?;
                let expect = v.local_type(at, local_index)?;
                match v.pop_val(at, "local.set")? {
                    None => {}
                    Some(actual) if actual == expect => {}
                    Some(actual) => {
                        return Err(v.fail(at, ValidationError::LocalSetTypeMismatch { local_index, expected_type: expect, actual_type: actual }));
                    }
                }
            }
            byte::LOCAL_TEE => {
                let local_index = r.read_u32_leb(|| ValidationError::InvalidLocalIndex)?;
                let expect = v.local_type(at, local_index)?;
                match v.pop_val(at, "local.tee")? {
                    None => v.push_val(expect),
                    Some(actual) if actual == expect => v.push_val(actual),
                    Some(actual) => {
                        return Err(v.fail(at, ValidationError::LocalTeeTypeMismatch { local_index, expected_type: expect, actual_type: actual }));
                    }
                }
            }
            byte::GLOBAL_GET => {
                let global_index = r.read_u32_leb(|| ValidationError::InvalidGlobalIndex)?;
                let all_global_count = v.module.total_global_count();
                let desc = v.module.global_desc(global_index).cloned().ok_or_else(|| {
                    v.fail(at, ValidationError::IllegalGlobalIndex { global_index, all_global_count })
                })?;
                v.push_val(desc.value_type);
            }
            byte::GLOBAL_SET => {
                let global_index = r.read_u32_leb(|| ValidationError::InvalidGlobalIndex)?;
                let all_global_count = v.module.total_global_count();
                let desc = v.module.global_desc(global_index).cloned().ok_or_else(|| {
                    v.fail(at, ValidationError::IllegalGlobalIndex { global_index, all_global_count })
                })?;
                if !desc.mutable {
                    return Err(v.fail(at, ValidationError::ImmutableGlobalSet { global_index }));
                }
                match v.pop_val(at, "global.set")? {
                    None => {}
                    Some(actual) if actual == desc.value_type => {}
                    Some(actual) => {
                        return Err(v.fail(at, ValidationError::GlobalSetTypeMismatch { global_index, expected_type: desc.value_type, actual_type: actual }));
                    }
                }
            }
            byte::MEMORY_SIZE => {
                let _reserved = r.read_byte(|| ValidationError::InvalidMemoryIndex)?;
                if v.module.total_memory_count() == 0 {
                    return Err(v.fail(at, ValidationError::NoMemory { op: "memory.size" }));
                }
                v.push_val(ValueType::I32);
            }
            byte::MEMORY_GROW => {
                let _reserved = r.read_byte(|| ValidationError::InvalidMemoryIndex)?;
                if v.module.total_memory_count() == 0 {
                    return Err(v.fail(at, ValidationError::NoMemory { op: "memory.grow" }));
                }
                v.pop_expect(at, ValueType::I32, "memory.grow")?;
                v.push_val(ValueType::I32);
            }
            byte::I32_CONST => {
                r.read_i32_leb(|| ValidationError::InvalidConstImmediate { op: "i32.const" })?;
                v.push_val(ValueType::I32);
            }
            byte::I64_CONST => {
                r.read_i64_leb(|| ValidationError::InvalidConstImmediate { op: "i64.const" })?;
                v.push_val(ValueType::I64);
            }
            byte::F32_CONST => {
                r.read_f32_bits(|| ValidationError::InvalidConstImmediate { op: "f32.const" })?;
                v.push_val(ValueType::F32);
            }
            byte::F64_CONST => {
                r.read_f64_bits(|| ValidationError::InvalidConstImmediate { op: "f64.const" })?;
                v.push_val(ValueType::F64);
            }
            _ if (byte::MEM_LOAD_FIRST..=byte::MEM_LOAD_LAST).contains(&op) => {
                let info = mem_load_info(op).unwrap();
                let name = mnemonic(op);
                v.memarg(r, at, name, info.natural_align)?;
                v.pop_expect(at, ValueType::I32, name)?;
                v.push_val(info.value_type);
            }
            _ if (byte::MEM_STORE_FIRST..=byte::MEM_STORE_LAST).contains(&op) => {
                let info = mem_store_info(op).unwrap();
                let name = mnemonic(op);
                v.memarg(r, at, name, info.natural_align)?;
                match v.pop_val(at, name)? {
                    None => {}
                    Some(actual) if actual == info.value_type => {}
                    Some(actual) => {
                        return Err(v.fail(at, ValidationError::StoreValueTypeMismatch { op: name, expected_type: info.value_type, actual_type: actual }));
                    }
                }
                v.pop_expect(at, ValueType::I32, name)?;
            }
            _ if (byte::NUMERIC_FIRST..=byte::NUMERIC_LAST).contains(&op) => {
                let sig = numeric_sig(op).ok_or_else(|| v.fail(at, ValidationError::IllegalOpbase { opcode_byte: op }))?;
                let name = mnemonic(op);
                for _ in 0..sig.arity {
                    v.pop_expect(at, sig.operand_type, name)?;
                }
                v.push_val(sig.result_type);
            }
            other => {
                return Err(v.fail(at, ValidationError::IllegalOpbase { opcode_byte: other }));
            }
        }
    }
}
