//! Function-body validation scenarios: type-state correctness under
//! the polymorphic-stack discipline, and the index/arity checks that
//! gate every index-carrying instruction.

mod common;

use wazm_core::*;

use common::TestModule;

fn validate(module: &TestModule, function_index: u32, locals: &[(u32, ValueType)], code: &[u8]) -> Result<ValidatedFunction, ValidationFailure> {
    validate_code(module.view(), function_index, locals, code)
}

#[test]
fn accepts_empty_function_with_no_results() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    let code = [0x0B]; // end
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn accepts_straight_line_arithmetic() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    #[rustfmt::skip]
    let code = [
        0x41, 0x02, // i32.const 2
        0x41, 0x03, // i32.const 3
        0x6A,       // i32.add
        0x0B,       // end
    ];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn rejects_result_type_mismatch_at_end() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [
        0x43, 0x00, 0x00, 0x00, 0x00, // f32.const 0.0
        0x0B,
    ];
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::EndResultMismatch { .. }));
}

#[test]
fn rejects_operand_stack_underflow() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [
        0x6A, // i32.add with nothing on the stack
        0x0B,
    ];
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::OperandStackUnderflow { .. }));
}

#[test]
fn rejects_numeric_operand_type_mismatch() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [
        0x44, 0, 0, 0, 0, 0, 0, 0, 0, // f64.const 0.0
        0x41, 0x01, // i32.const 1
        0x6A, // i32.add expects two i32s
        0x0B,
    ];
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::NumericOperandTypeMismatch { .. }));
}

#[test]
fn unreachable_makes_the_frame_polymorphic() {
    // After `unreachable`, popping below the (now-truncated) operand
    // stack floor yields "Unknown" instead of underflowing, so
    // `i32.add` validates here with nothing actually on the stack —
    // and still pushes a real i32 result for `end` to find.
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [
        0x00, // unreachable
        0x6A, // i32.add: both operands resolve against "Unknown"
        0x0B,
    ];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn polymorphic_frame_may_end_with_no_values_at_all() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [
        0x00, // unreachable
        0x0B, // end: no i32 on the stack, but the frame is polymorphic
    ];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn br_under_unreachable_does_not_require_operands() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [
        0x00, // unreachable
        0x0C, 0x00, // br 0, with nothing on the stack
        0x0B,
    ];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn accepts_if_else_with_matching_result_types() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    #[rustfmt::skip]
    let code = [
        0x41, 0x01,       // i32.const 1
        0x04, 0x7F,       // if (result i32)
        0x41, 0x02,       //   i32.const 2
        0x05,             // else
        0x41, 0x03,       //   i32.const 3
        0x0B,             // end (if)
        0x0B,             // end (function)
    ];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn rejects_if_with_result_but_no_else() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    #[rustfmt::skip]
    let code = [
        0x41, 0x01, // i32.const 1
        0x04, 0x7F, // if (result i32)
        0x41, 0x02, //   i32.const 2
        0x0B,       // end (if, no else)
        0x0B,       // end (function)
    ];
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::IfMissingElse { .. }));
}

#[test]
fn rejects_else_without_matching_if() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    let code = [0x05, 0x0B]; // else; end
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::IllegalElse));
}

#[test]
fn loop_label_targets_the_top_not_the_result() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    #[rustfmt::skip]
    let code = [
        0x03, 0x40, // loop (empty)
        0x0C, 0x00, // br 0 (back to loop top, no value expected)
        0x0B,       // end (loop)
        0x0B,       // end (function)
    ];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn br_table_requires_all_targets_to_agree_in_arity_and_type() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    #[rustfmt::skip]
    let code = [
        0x02, 0x7F,       // block (result i32)
          0x02, 0x40,     //   block (empty)
            0x41, 0x00,   //     i32.const 0
            0x41, 0x00,   //     i32.const 0
            0x0E, 0x01, 0x00, 0x01, // br_table [0] 1 : label 0 wants i32, label 1 wants nothing
          0x0B,
          0x41, 0x00,
        0x0B,
        0x0B,
    ];
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::BrTableTargetTypeMismatch { .. }));
}

#[test]
fn rejects_out_of_range_label_index() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    let code = [0x0C, 0x05, 0x0B]; // br 5, function has depth 1
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::IllegalLabelIndex { .. }));
}

#[test]
fn rejects_out_of_range_local_index() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [0x20, 0x07, 0x0B]; // local.get 7, no locals declared
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::IllegalLocalIndex { .. }));
}

#[test]
fn accepts_declared_locals_after_parameters() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![ValueType::I32], vec![ValueType::I64]);
    // one declared i64 local, at index 1 (index 0 is the parameter)
    let code = [0x20, 0x01, 0x0B]; // local.get 1
    let locals = [(1u32, ValueType::I64)];
    assert!(validate(&m, f, &locals, &code).is_ok());
}

#[test]
fn rejects_global_set_to_immutable_global() {
    let mut m = TestModule::new().with_global(ValueType::I32, false);
    let f = m.declare_function(vec![], vec![]);
    let code = [0x41, 0x00, 0x24, 0x00, 0x0B]; // i32.const 0; global.set 0
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::ImmutableGlobalSet { .. }));
}

#[test]
fn accepts_global_set_to_mutable_global_of_matching_type() {
    let mut m = TestModule::new().with_global(ValueType::I32, true);
    let f = m.declare_function(vec![], vec![]);
    let code = [0x41, 0x00, 0x24, 0x00, 0x0B];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn rejects_memory_instruction_with_no_declared_memory() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [0x41, 0x00, 0x28, 0x02, 0x00, 0x0B]; // i32.const 0; i32.load
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::NoMemory { .. }));
}

#[test]
fn rejects_memarg_alignment_exceeding_natural_alignment() {
    let mut m = TestModule::new().with_memory();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [0x41, 0x00, 0x28, 0x03, 0x00, 0x0B]; // i32.load align=3 (natural is 2)
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::IllegalMemargAlignment { .. }));
}

#[test]
fn accepts_matching_memarg_alignment() {
    let mut m = TestModule::new().with_memory();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [0x41, 0x00, 0x28, 0x02, 0x00, 0x0B];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn rejects_call_to_invalid_function_index() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    let code = [0x10, 0x09, 0x0B]; // call 9, no such function
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::InvalidFunctionIndex { .. }));
}

#[test]
fn accepts_call_with_matching_signature() {
    let mut m = TestModule::new();
    let callee = m.declare_function(vec![ValueType::I32], vec![ValueType::I32]);
    let caller = m.declare_function(vec![], vec![ValueType::I32]);
    assert_eq!(callee, 0);
    let code = [0x41, 0x05, 0x10, 0x00, 0x0B]; // i32.const 5; call 0
    assert!(validate(&m, caller, &[], &code).is_ok());
}

#[test]
fn rejects_call_indirect_with_no_declared_table() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    let ty = m.types.types.len() as u32;
    m.types.types.push(FunctionType::new(vec![], vec![]));
    let code = [0x41, 0x00, 0x11, ty as u8, 0x00, 0x0B]; // i32.const 0; call_indirect (type ty) (table 0)
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::InvalidTableIndex));
}

#[test]
fn accepts_call_indirect_with_declared_table() {
    let mut m = TestModule::new().with_table();
    let f = m.declare_function(vec![], vec![]);
    let ty = m.types.types.len() as u32;
    m.types.types.push(FunctionType::new(vec![], vec![]));
    let code = [0x41, 0x00, 0x11, ty as u8, 0x00, 0x0B];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn select_requires_matching_operand_types() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    #[rustfmt::skip]
    let code = [
        0x41, 0x01, // i32.const 1
        0x44, 0, 0, 0, 0, 0, 0, 0, 0, // f64.const 0.0
        0x41, 0x00, // i32.const 0 (condition)
        0x1B,       // select
        0x0B,
    ];
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::SelectTypeMismatch { .. }));
}

#[test]
fn select_with_one_operand_polymorphic_adopts_the_concrete_type() {
    // Two real pushes after `unreachable` leave `select`'s `v2` and
    // `cond` concrete but `v1` drawn from the exhausted polymorphic
    // frame as `Unknown`; the result takes `v2`'s type rather than
    // rejecting the (impossible to check) mismatch.
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    #[rustfmt::skip]
    let code = [
        0x00,       // unreachable: polymorphic from here
        0x41, 0x09, // i32.const 9 -> v2
        0x41, 0x00, // i32.const 0 -> cond
        0x1B,       // select: v1 resolves against Unknown
        0x0B,
    ];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn local_tee_under_polymorphism_pushes_the_locals_declared_type() {
    // `local.tee` on an exhausted polymorphic frame has no popped
    // operand to check, so it pushes the local's own declared type
    // rather than `Unknown` — matching `local.get`'s result in the
    // same position.
    let mut m = TestModule::new();
    let f = m.declare_function(vec![ValueType::I32], vec![ValueType::I32]);
    let code = [
        0x00, // unreachable
        0x22, 0x00, // local.tee 0
        0x0B,
    ];
    assert!(validate(&m, f, &[], &code).is_ok());
}

#[test]
fn rejects_trailing_code_after_final_end() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    let code = [0x0B, 0x01]; // end; nop
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::TrailingCodeAfterEnd));
}

#[test]
fn rejects_function_body_missing_its_end() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    let code = [0x01]; // nop, no end
    let err = validate(&m, f, &[], &code).unwrap_err();
    assert!(matches!(err.kind, ValidationError::MissingEnd));
}

