//! Demo test templates selectable from the command line.

use generator_core::{
    AllocationRequest, Argument, Block, BlockAttributes, BlockBuilder, Combinator,
    GenerationError, LabelRef, Obfuscator, Permutator, PrepareAttributes, Template,
    UnknownImmediate,
};

use crate::errors::FrontEndError;
use crate::model::reg;
use crate::registers::{AT, ZERO};

/// Template names in listing order.
pub const TEMPLATE_NAMES: &[&str] = &["arithmetic", "self_check", "loops"];

/// Template used when none is named.
pub const DEFAULT_TEMPLATE: &str = "self_check";

/// Placeholder for a scratch register other than `$zero` and `$at`.
fn scratch() -> UnknownImmediate {
    UnknownImmediate::new(AllocationRequest::new().exclude([ZERO, AT]))
}

fn register_operand(
    b: &BlockBuilder<'_>,
    index: impl Into<Argument>,
) -> Result<Argument, GenerationError> {
    Ok(reg(b, index)?.into())
}

fn three_register(b: &mut BlockBuilder<'_>, operation: &str) -> Result<(), GenerationError> {
    let rd = register_operand(b, scratch())?;
    let rs = register_operand(b, scratch())?;
    let rt = register_operand(b, scratch())?;
    b.call(operation, [rd, rs, rt])?;
    Ok(())
}

/// Product of two operation pools, shuffled within each draw.
fn arithmetic(template: &Template) -> Result<Block, GenerationError> {
    template.block(
        BlockAttributes::new()
            .combinator(Combinator::Product)
            .permutator(Permutator::Random),
        |b| {
            b.iterate(BlockAttributes::new(), |b| {
                for operation in ["add", "sub", "slt"] {
                    three_register(b, operation)?;
                }
                Ok(())
            })?;
            b.iterate(BlockAttributes::new(), |b| {
                for operation in ["and", "or", "xor", "nor"] {
                    three_register(b, operation)?;
                }
                Ok(())
            })?;
            Ok(())
        },
    )
}

/// Prepares two source registers with random values, adds them and checks
/// the sources are intact afterwards.
fn self_check(template: &Template) -> Result<Block, GenerationError> {
    let left_value = generator_core::value::rand(0, i64::from(u32::MAX))?;
    let right_value = generator_core::value::dist(vec![
        (generator_core::Variate::Value(0), 1),
        (generator_core::Variate::Value(0xFFFF_FFFF), 1),
        (generator_core::Variate::Range { low: 0, high: 0xFFFF }, 2),
        (generator_core::Variate::Range { low: 0x1_0000, high: 0xFFFF_FFFF }, 4),
    ])?;
    template.sequence(BlockAttributes::new().obfuscator(Obfuscator::Random), |b| {
        let left = scratch();
        let right = scratch();
        let left_reg = reg(b, left)?;
        let right_reg = reg(b, right)?;

        b.prepare(left_reg.clone(), left_value.clone(), PrepareAttributes::default())?;
        b.prepare(right_reg.clone(), right_value.clone(), PrepareAttributes::default())?;
        b.atomic(BlockAttributes::new(), |b| {
            let sum = register_operand(b, scratch())?;
            b.call(
                "addu",
                [sum, Argument::from(left_reg.clone()), Argument::from(right_reg.clone())],
            )?;
            b.call("nop", Vec::<Argument>::new())?;
            Ok(())
        })?;
        b.compare(left_reg, left_value, PrepareAttributes::default())?;
        b.compare(right_reg, right_value, PrepareAttributes::default())?;
        Ok(())
    })
}

/// Count-down loop with a numeric label and a forward exit branch.
fn loops(template: &Template) -> Result<Block, GenerationError> {
    let iterations = generator_core::value::rand(1, 8)?;
    template.sequence(BlockAttributes::new(), |b| {
        let counter = reg(b, scratch())?;
        let zero = register_operand(b, i64::from(ZERO))?;
        b.prepare(counter.clone(), iterations.clone(), PrepareAttributes::default())?;
        b.numeric_label(1)?;
        b.call(
            "addi",
            [
                Argument::from(counter.clone()),
                Argument::from(counter.clone()),
                Argument::Int(-1),
            ],
        )?;
        b.call(
            "bne",
            [
                Argument::from(counter),
                zero.clone(),
                Argument::from(LabelRef::Backward(1)),
            ],
        )?;
        b.call("nop", Vec::<Argument>::new())?;
        b.call(
            "beq",
            [zero.clone(), zero, Argument::from(LabelRef::named("done"))],
        )?;
        b.call("nop", Vec::<Argument>::new())?;
        b.label("done");
        Ok(())
    })
}

/// Builds the named demo template's root block.
///
/// # Errors
///
/// Returns [`FrontEndError::UnknownTemplate`] for unknown names and
/// propagates construction errors.
pub fn build(template: &Template, name: &str) -> Result<Block, FrontEndError> {
    let block = match name {
        "arithmetic" => arithmetic(template)?,
        "self_check" => self_check(template)?,
        "loops" => loops(template)?,
        other => return Err(FrontEndError::UnknownTemplate(other.to_owned())),
    };
    tracing::debug!(template = name, "built template");
    Ok(block)
}

#[cfg(test)]
mod tests {
    use generator_core::GeneratorConfig;

    use super::{build, TEMPLATE_NAMES};
    use crate::errors::FrontEndError;
    use crate::library::standard_template;

    #[test]
    fn every_listed_template_builds_and_runs() {
        let template = standard_template(GeneratorConfig::default()).unwrap();
        for name in TEMPLATE_NAMES {
            let root = build(&template, name).unwrap();
            let sequences = template.generate(&root, 3).unwrap();
            assert_eq!(sequences.len(), 3, "{name}");
            assert!(sequences.iter().all(|sequence| !sequence.is_empty()), "{name}");
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        let template = standard_template(GeneratorConfig::default()).unwrap();
        assert!(matches!(
            build(&template, "fibonacci"),
            Err(FrontEndError::UnknownTemplate(name)) if name == "fibonacci"
        ));
    }

    #[test]
    fn arithmetic_uses_distinct_scratch_registers() {
        let template = standard_template(GeneratorConfig::default()).unwrap();
        let root = build(&template, "arithmetic").unwrap();
        for sequence in template.generate(&root, 12).unwrap() {
            assert_eq!(sequence.len(), 2);
            for call in sequence.calls() {
                let mut seen = std::collections::HashSet::new();
                for operand in call.arguments().values() {
                    if let generator_core::Operand::Mode(mode) = operand {
                        let index = mode.int_argument(0, "i").unwrap();
                        assert!(index > 1);
                        assert!(seen.insert(index));
                    }
                }
            }
        }
    }
}
