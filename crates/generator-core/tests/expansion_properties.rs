//! Property suite for block expansion: combinator counts, allocation,
//! atomicity and determinism.

#![allow(clippy::pedantic, clippy::nursery, clippy::too_many_lines)]

use std::collections::BTreeSet;
use std::sync::Arc;

use generator_core::{
    AllocationPolicy, AllocationRequest, Argument, BlockAttributes, Combinator, GeneratorConfig,
    InstructionSetModel, Obfuscator, Operand, Permutator, Sequence, Signature, Template,
    UnknownImmediate,
};
use proptest::prelude::*;
use rand as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use strum as _;
use thiserror as _;
use tracing as _;

const LEFT: [&str; 4] = ["a0", "a1", "a2", "a3"];
const RIGHT: [&str; 4] = ["b0", "b1", "b2", "b3"];

struct PairModel;

impl InstructionSetModel for PairModel {
    fn enumerate_operations(&self) -> Vec<String> {
        LEFT.iter()
            .chain(RIGHT.iter())
            .chain(["x0", "x1", "x2", "use"].iter())
            .map(|&name| name.to_owned())
            .collect()
    }

    fn enumerate_addressing_modes(&self) -> Vec<String> {
        vec!["GPR".to_owned()]
    }

    fn signature(&self, name: &str) -> Option<Signature> {
        match name {
            "GPR" => Some(Signature::register_mode(&["i"], 32, 8)),
            "use" => Some(Signature::operation(&["r"])),
            _ if self.enumerate_operations().iter().any(|op| op == name) => {
                Some(Signature::operation(&[]))
            }
            _ => None,
        }
    }
}

fn template(config: GeneratorConfig) -> Template {
    Template::new(Arc::new(PairModel), config.with_default_allocator("GPR")).unwrap()
}

fn two_iterates(
    t: &Template,
    combinator: Combinator,
    left: usize,
    right: usize,
) -> generator_core::Block {
    t.block(BlockAttributes::new().combinator(combinator), |b| {
        b.iterate(BlockAttributes::new(), |b| {
            for name in &LEFT[..left] {
                b.call(name, [])?;
            }
            Ok(())
        })?;
        b.iterate(BlockAttributes::new(), |b| {
            for name in &RIGHT[..right] {
                b.call(name, [])?;
            }
            Ok(())
        })?;
        Ok(())
    })
    .unwrap()
}

fn names(sequence: &Sequence) -> Vec<String> {
    sequence
        .operation_names()
        .into_iter()
        .map(str::to_owned)
        .collect()
}

proptest! {
    #[test]
    fn product_emits_every_pair_before_cycling(left in 1usize..=4, right in 1usize..=4, extra in 0usize..4) {
        let t = template(GeneratorConfig::default());
        let root = two_iterates(&t, Combinator::Product, left, right);
        let total = left * right;
        let sequences = t.generate(&root, total + extra).unwrap();
        prop_assert_eq!(sequences.len(), total + extra);

        let distinct: BTreeSet<Vec<String>> = sequences[..total].iter().map(names).collect();
        prop_assert_eq!(distinct.len(), total);
        for (index, sequence) in sequences.iter().enumerate() {
            prop_assert_eq!(names(sequence), names(&sequences[index % total]));
            let shape = names(sequence);
            prop_assert_eq!(shape.len(), 2);
            prop_assert!(shape[0].starts_with('a'));
            prop_assert!(shape[1].starts_with('b'));
        }
    }

    #[test]
    fn diagonal_zips_children_with_cycling(left in 1usize..=4, right in 1usize..=4, count in 1usize..10) {
        let t = template(GeneratorConfig::default());
        let root = two_iterates(&t, Combinator::Diagonal, left, right);
        let sequences = t.generate(&root, count).unwrap();
        prop_assert_eq!(sequences.len(), count);
        for (index, sequence) in sequences.iter().enumerate() {
            prop_assert_eq!(
                names(sequence),
                vec![LEFT[index % left].to_owned(), RIGHT[index % right].to_owned()]
            );
        }
    }

    #[test]
    fn placeholders_without_frees_are_pairwise_distinct(count in 1usize..=8, seed in any::<u64>(), random in any::<bool>()) {
        let policy = if random { AllocationPolicy::RandomFree } else { AllocationPolicy::LowestFree };
        let t = template(GeneratorConfig::default().with_seed(seed).with_allocation_policy(policy));
        let root = t
            .sequence(BlockAttributes::new(), |b| {
                for _ in 0..count {
                    let placeholder = UnknownImmediate::new(AllocationRequest::new());
                    let register = b.mode("GPR", [Argument::from(placeholder)])?;
                    b.call("use", [Argument::from(register)])?;
                }
                Ok(())
            })
            .unwrap();
        let sequence = &t.generate(&root, 1).unwrap()[0];
        let indices: Vec<i64> = sequence
            .calls()
            .iter()
            .filter_map(|call| match call.arguments().values().next() {
                Some(Operand::Mode(mode)) => mode.int_argument(0, "i"),
                _ => None,
            })
            .collect();
        prop_assert_eq!(indices.len(), count);
        let distinct: BTreeSet<i64> = indices.iter().copied().collect();
        prop_assert_eq!(distinct.len(), count);
        prop_assert!(indices.iter().all(|&index| (0..8).contains(&index)));
    }

    #[test]
    fn atomic_blocks_stay_contiguous_under_reordering(seed in any::<u64>()) {
        let t = template(GeneratorConfig::default().with_seed(seed));
        let root = t
            .sequence(
                BlockAttributes::new()
                    .permutator(Permutator::Random)
                    .obfuscator(Obfuscator::Random),
                |b| {
                    b.call("a0", [])?.call("a1", [])?;
                    b.atomic(BlockAttributes::new(), |b| {
                        b.call("x0", [])?.call("x1", [])?.call("x2", [])?;
                        Ok(())
                    })?;
                    b.call("b0", [])?.call("b1", [])?;
                    Ok(())
                },
            )
            .unwrap();
        for sequence in t.generate(&root, 4).unwrap() {
            let shape = names(&sequence);
            prop_assert_eq!(shape.len(), 7);
            let start = shape.iter().position(|name| name == "x0").unwrap();
            prop_assert_eq!(&shape[start..start + 3], &["x0", "x1", "x2"]);
        }
    }

    #[test]
    fn same_seed_means_same_sequences(seed in any::<u64>()) {
        let config = GeneratorConfig::default().with_seed(seed);
        let build = || {
            let t = template(config.clone());
            let root = t
                .block(BlockAttributes::new().combinator(Combinator::Random), |b| {
                    b.sequence(BlockAttributes::new().permutator(Permutator::Random), |b| {
                        b.call("a0", [])?.call("a1", [])?.call("a2", [])?;
                        Ok(())
                    })?;
                    b.iterate(BlockAttributes::new(), |b| {
                        b.call("b0", [])?.call("b1", [])?;
                        Ok(())
                    })?;
                    Ok(())
                })
                .unwrap();
            t.generate(&root, 6).unwrap()
        };
        prop_assert_eq!(build(), build());
    }
}
