//! Translator scenarios: branch-target patching, the stack-top
//! register cache's scoped behavior, and the observable-equivalence
//! property between a caching profile and the pure-stack reference
//! profile.

mod common;

use wazm_core::*;

use common::{run, translate, translate_memory_only, TestModule};

#[test]
fn straight_line_function_has_no_unpatched_branches() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![ValueType::I32]);
    let code = [0x41, 0x2A, 0x0B]; // i32.const 42; end
    let image = translate(&m, f, &[], &code);
    for cell in &image.cells {
        if let Word::Imm(Immediate::Branch(b)) = cell {
            assert!(b.is_init(), "every branch immediate must be patched by translation's end");
        }
    }
}

#[test]
fn forward_branch_out_of_a_block_is_patched() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    #[rustfmt::skip]
    let code = [
        0x02, 0x40, // block
        0x0C, 0x00, // br 0 (forward, to the block's end)
        0x01,       // nop (unreachable by br, still present in the byte stream)
        0x0B,       // end (block)
        0x0B,       // end (function)
    ];
    let image = translate(&m, f, &[], &code);
    for cell in &image.cells {
        if let Word::Imm(Immediate::Branch(b)) = cell {
            assert!(b.is_init());
        }
    }
}

#[test]
fn backward_branch_to_a_loop_head_is_patched_immediately() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    #[rustfmt::skip]
    let code = [
        0x03, 0x40, // loop
        0x0C, 0x00, // br 0 (back to loop top)
        0x0B,       // end (loop)
        0x0B,       // end (function)
    ];
    let image = translate(&m, f, &[], &code);
    let mut saw_branch = false;
    for cell in &image.cells {
        if let Word::Imm(Immediate::Branch(b)) = cell {
            assert!(b.is_init());
            saw_branch = true;
        }
    }
    assert!(saw_branch);
}

#[test]
fn br_table_patches_every_slot_independently() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![], vec![]);
    #[rustfmt::skip]
    let code = [
        0x02, 0x40,       // block (outer, label 1 at br_table site)
          0x02, 0x40,     //   block (inner, label 0 at br_table site)
            0x41, 0x00,   //     i32.const 0
            0x0E, 0x02, 0x00, 0x01, 0x01, // br_table [0, 1] 1
          0x0B,
        0x0B,
        0x0B,
    ];
    let image = translate(&m, f, &[], &code);
    let mut saw_table = false;
    for cell in &image.cells {
        if let Word::Imm(Immediate::BranchTable(targets)) = cell {
            saw_table = true;
            for t in targets.iter() {
                assert!(t.is_init(), "every br_table slot must be independently patched");
            }
        }
    }
    assert!(saw_table);
}

#[test]
fn consecutive_local_gets_of_the_same_type_are_cached() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
    #[rustfmt::skip]
    let code = [
        0x20, 0x00, // local.get 0 -> cached
        0x20, 0x01, // local.get 1 -> cached
        0x6A,       // i32.add: spills the cache first, then reads from the stack
        0x0B,
    ];
    let image = translate(&m, f, &[], &code);
    let handler_count = image.cells.iter().filter(|c| matches!(c, Word::Handler(_))).count();
    // local.get (cached) x2, spill, add, terminal — five handler cells.
    assert_eq!(handler_count, 5);
}

#[test]
fn drop_against_a_cached_top_emits_no_stack_traffic_handler() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![ValueType::I32], vec![]);
    let code = [0x20, 0x00, 0x1A, 0x0B]; // local.get 0; drop; end
    let image = translate(&m, f, &[], &code);
    // local.get (cached), drop (cached, pure decrement), terminal.
    let handler_count = image.cells.iter().filter(|c| matches!(c, Word::Handler(_))).count();
    assert_eq!(handler_count, 3);
}

#[test]
fn caching_and_memory_only_profiles_compute_the_same_result() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
    #[rustfmt::skip]
    let code = [
        0x20, 0x00, // local.get 0
        0x20, 0x01, // local.get 1
        0x6A,       // i32.add
        0x20, 0x00, // local.get 0
        0x6C,       // i32.mul
        0x0B,
    ];
    let cached = translate(&m, f, &[], &code);
    let plain = translate_memory_only(&m, f, &[], &code);
    let cached_result = run(cached, &[3, 4]).unwrap();
    let plain_result = run(plain, &[3, 4]).unwrap();
    assert_eq!(cached_result, plain_result);
    assert_eq!(cached_result, vec![21]); // (3 + 4) * 3
}

#[test]
fn register_ring_saturation_still_preserves_program_order() {
    // i32's ring has two slots (`RegisterCached::I32_RING`); a third
    // consecutive `local.get` must spill the oldest rather than
    // silently losing it.
    let mut m = TestModule::new();
    let f = m.declare_function(
        vec![ValueType::I32, ValueType::I32, ValueType::I32],
        vec![ValueType::I32],
    );
    #[rustfmt::skip]
    let code = [
        0x20, 0x00, // local.get 0
        0x20, 0x01, // local.get 1
        0x20, 0x02, // local.get 2 -> ring saturates, oldest gets spilled
        0x6A,       // i32.add (0+1 on the stack, discarding one operand... )
        0x6A,       // second add to consume all three
        0x0B,
    ];
    let cached = translate(&m, f, &[], &code);
    let plain = translate_memory_only(&m, f, &[], &code);
    let cached_result = run(cached, &[10, 20, 30]).unwrap();
    let plain_result = run(plain, &[10, 20, 30]).unwrap();
    assert_eq!(cached_result, plain_result);
    assert_eq!(cached_result, vec![60]);
}

#[test]
fn spilling_across_a_branch_preserves_values_on_both_paths() {
    let mut m = TestModule::new();
    let f = m.declare_function(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
    #[rustfmt::skip]
    let code = [
        0x20, 0x00,       // local.get 0
        0x20, 0x01,       // local.get 1 (both cached)
        0x41, 0x01,       // i32.const 1
        0x04, 0x40,       //   if (empty): spills the cache before the branch test
        0x0B,             //   end (if), empty body
        0x6A,             // i32.add: uses the spilled locals
        0x0B,
    ];
    let cached = translate(&m, f, &[], &code);
    let plain = translate_memory_only(&m, f, &[], &code);
    let cached_result = run(cached, &[5, 9]).unwrap();
    let plain_result = run(plain, &[5, 9]).unwrap();
    assert_eq!(cached_result, plain_result);
    assert_eq!(cached_result, vec![14]);
}
