//! End-to-end checks of the standard library: every 32-bit value can be
//! loaded, and comparators branch to the external failure label.

#![allow(clippy::pedantic, clippy::nursery, clippy::too_many_lines)]

use generator_core::{
    BlockAttributes, ConcreteCall, GeneratorConfig, LabelTarget, Operand, PrepareAttributes,
    Sequence,
};
use minimips::isa;
use minimips::library::CHECK_FAILED;
use minimips::{reg, standard_template};
use proptest::prelude::*;
use rstest::rstest;
use strum as _;
use tempfile as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

fn register_index(call: &ConcreteCall, position: usize, name: &str) -> usize {
    match call.arguments().get(position, name) {
        Some(Operand::Mode(mode)) => mode.int_argument(0, "i").unwrap() as usize,
        other => panic!("{} operand {name} is not a register: {other:?}", call.name()),
    }
}

fn immediate(call: &ConcreteCall, position: usize, name: &str) -> u32 {
    call.int_argument(position, name).unwrap() as u32
}

/// Tiny interpreter for the register-only subset the preparators emit.
/// `$zero` stays hard-wired to zero.
fn execute(calls: &[ConcreteCall]) -> [u32; 32] {
    let mut regs = [0u32; 32];
    for call in calls {
        let entry = isa::lookup(call.name()).unwrap();
        let params = entry.format.parameters();
        let reg_at = |slot: usize| register_index(call, slot, params[slot]);
        let value = match call.name() {
            "lui" => (immediate(call, 1, "imm") & 0xFFFF) << 16,
            "ori" => regs[reg_at(1)] | (immediate(call, 2, "imm") & 0xFFFF),
            "xori" => regs[reg_at(1)] ^ (immediate(call, 2, "imm") & 0xFFFF),
            "sll" => regs[reg_at(1)] << (immediate(call, 2, "sa") & 31),
            "or" => regs[reg_at(1)] | regs[reg_at(2)],
            "and" => regs[reg_at(1)] & regs[reg_at(2)],
            "xor" => regs[reg_at(1)] ^ regs[reg_at(2)],
            "nor" => !(regs[reg_at(1)] | regs[reg_at(2)]),
            other => panic!("unexpected operation in a preparation: {other}"),
        };
        let dest = reg_at(0);
        if dest != 0 {
            regs[dest] = value;
        }
    }
    regs
}

fn prepare_once(seed: u64, index: u32, value: u32) -> Sequence {
    let template = standard_template(GeneratorConfig::default().with_seed(seed)).unwrap();
    let root = template
        .sequence(BlockAttributes::new(), |b| {
            let target = reg(b, index)?;
            b.prepare(target, value, PrepareAttributes::default())?;
            Ok(())
        })
        .unwrap();
    template.generate(&root, 1).unwrap().remove(0)
}

fn compare_once(index: u32, value: u32) -> Sequence {
    let template = standard_template(GeneratorConfig::default()).unwrap();
    let root = template
        .sequence(BlockAttributes::new(), |b| {
            let target = reg(b, index)?;
            b.compare(target, value, PrepareAttributes::default())?;
            Ok(())
        })
        .unwrap();
    template.generate(&root, 1).unwrap().remove(0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn preparators_load_any_word(seed in any::<u64>(), index in 2u32..32, value in any::<u32>()) {
        let sequence = prepare_once(seed, index, value);
        prop_assert!(!sequence.is_empty());
        prop_assert!(sequence.len() <= 3, "{:?}", sequence.operation_names());
        let regs = execute(sequence.calls());
        prop_assert_eq!(regs[index as usize], value, "{:?}", sequence.operation_names());
    }

    #[test]
    fn preparators_load_halfword_values(seed in any::<u64>(), index in 2u32..32, half in any::<u16>(), high in any::<bool>()) {
        let value = if high { u32::from(half) << 16 } else { u32::from(half) };
        let regs = execute(prepare_once(seed, index, value).calls());
        prop_assert_eq!(regs[index as usize], value);
    }
}

#[rstest]
#[case(0)]
#[case(0xFFFF_FFFF)]
#[case(0x1234)]
#[case(0xDEAD_0000)]
#[case(0xDEAD_BEEF)]
fn special_values_use_short_recipes(#[case] value: u32) {
    for seed in 0..8 {
        let sequence = prepare_once(seed, 8, value);
        assert_eq!(execute(sequence.calls())[8], value);
        if value == 0 || value == 0xFFFF_FFFF {
            assert_eq!(sequence.len(), 1, "{:?}", sequence.operation_names());
        }
    }
}

#[test]
fn zero_register_needs_no_preparation() {
    assert!(prepare_once(1, 0, 0xCAFE).is_empty());
    assert!(compare_once(0, 0xCAFE).is_empty());
}

#[rstest]
#[case(0x1234_5678)]
#[case(0)]
fn comparators_branch_to_the_external_failure_label(#[case] value: u32) {
    let sequence = compare_once(8, value);
    let names = sequence.operation_names();
    assert_eq!(names[names.len() - 2..], ["bne", "nop"]);

    let branch = &sequence.calls()[sequence.len() - 2];
    match branch.arguments().get(2, "target") {
        Some(Operand::Label(label)) => {
            assert_eq!(label.reference.to_string(), CHECK_FAILED);
            assert_eq!(label.target, Some(LabelTarget::External));
        }
        other => panic!("branch target is not a label: {other:?}"),
    }
    assert_eq!(register_index(branch, 1, "rt"), 8);
}

#[test]
fn default_comparator_loads_the_expected_value_into_at() {
    let value = 0x0BAD_F00D;
    let sequence = compare_once(8, value);
    let (preparation, check) = sequence.calls().split_at(sequence.len() - 2);

    assert_eq!(execute(preparation)[1], value);
    assert_eq!(register_index(&check[0], 0, "rs"), 1);
}
