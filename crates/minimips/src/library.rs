//! Standard preparators and comparators for `REG` targets.
//!
//! Unnamed recipes are chosen by the engine. The named halfword helpers
//! (`XXXX0000`, `0000XXXX`, `----XXXX`) only serve nested `prepare` steps of
//! other recipes.

use std::sync::Arc;

use generator_core::{
    ArgumentConstraint, GenerationError, GeneratorConfig, PrepareAttributes, RecipeBuilder,
    RecipeHeader, StepBuilder, Template, TemplateArg, VariantAttributes,
};

use crate::model::{MiniMips, REGISTER_MODE};
use crate::registers::{AT, ZERO};

/// External label comparators branch to on mismatch.
pub const CHECK_FAILED: &str = "check_failed";

/// Sets the high halfword and clears the low one.
pub const HIGH_HALF: &str = "XXXX0000";
/// Sets the low halfword and clears the high one.
pub const LOW_HALF: &str = "0000XXXX";
/// Sets a zero low halfword, keeping the high one.
pub const LOW_HALF_KEEP: &str = "----XXXX";

fn register(steps: &StepBuilder<'_>, index: u32) -> Result<TemplateArg, GenerationError> {
    steps.mode(REGISTER_MODE, [TemplateArg::from(i64::from(index))])
}

fn header(mask: Option<&str>) -> Result<RecipeHeader, GenerationError> {
    let header = RecipeHeader::new(REGISTER_MODE);
    match mask {
        Some(pattern) => header.mask(pattern),
        None => Ok(header),
    }
}

fn zero_register() -> RecipeHeader {
    RecipeHeader::new(REGISTER_MODE).argument("i", ArgumentConstraint::OneOf(vec![i64::from(ZERO)]))
}

fn named(name: &str) -> PrepareAttributes {
    PrepareAttributes::named(name)
}

/// `op target, source, value` over the implicit target.
fn immediate(
    steps: &mut StepBuilder<'_>,
    operation: &str,
    source: TemplateArg,
    value: TemplateArg,
) -> Result<(), GenerationError> {
    steps.call(operation, [TemplateArg::Target, source, value])?;
    Ok(())
}

fn default_preparator(recipe: &mut RecipeBuilder<'_>) -> Result<(), GenerationError> {
    recipe.variant(VariantAttributes::default().with_bias(25), |steps| {
        steps.call("lui", [TemplateArg::Target, TemplateArg::value_bits(16, 31)])?;
        immediate(steps, "ori", TemplateArg::Target, TemplateArg::value_bits(0, 15))
    })?;
    recipe.variant(VariantAttributes::default().with_bias(75), |steps| {
        steps.prepare(TemplateArg::Target, TemplateArg::value_bits(16, 31), named(HIGH_HALF))?;
        steps.prepare(TemplateArg::Target, TemplateArg::value_bits(0, 15), named(LOW_HALF_KEEP))?;
        Ok(())
    })?;
    Ok(())
}

fn zero_value_preparator(recipe: &mut RecipeBuilder<'_>) -> Result<(), GenerationError> {
    for operation in ["or", "and", "xor"] {
        recipe.variant(VariantAttributes::named(operation), |steps| {
            let zero = register(steps, ZERO)?;
            steps.call(operation, [TemplateArg::Target, zero.clone(), zero])?;
            Ok(())
        })?;
    }
    Ok(())
}

fn high_half(recipe: &mut RecipeBuilder<'_>) -> Result<(), GenerationError> {
    recipe.variant(VariantAttributes::named("lui").with_bias(25), |steps| {
        steps.call("lui", [TemplateArg::Target, TemplateArg::value()])?;
        Ok(())
    })?;
    recipe.variant(VariantAttributes::named("shift").with_bias(75), |steps| {
        steps.prepare(TemplateArg::Target, TemplateArg::value(), named(LOW_HALF))?;
        steps.call("sll", [TemplateArg::Target, TemplateArg::Target, TemplateArg::from(16)])?;
        Ok(())
    })?;
    Ok(())
}

fn low_half(recipe: &mut RecipeBuilder<'_>, keep_high: bool) -> Result<(), GenerationError> {
    for operation in ["ori", "xori"] {
        recipe.variant(VariantAttributes::named(operation), |steps| {
            let source = if keep_high {
                TemplateArg::Target
            } else {
                register(steps, ZERO)?
            };
            immediate(steps, operation, source, TemplateArg::value())
        })?;
    }
    Ok(())
}

fn default_comparator(recipe: &mut RecipeBuilder<'_>) -> Result<(), GenerationError> {
    let at = recipe.mode(REGISTER_MODE, [TemplateArg::from(i64::from(AT))])?;
    recipe.prepare(at.clone(), TemplateArg::value(), PrepareAttributes::default())?;
    recipe.call("bne", [at, TemplateArg::Target, TemplateArg::label(CHECK_FAILED)])?;
    recipe.call("nop", Vec::<TemplateArg>::new())?;
    Ok(())
}

fn zero_value_comparator(recipe: &mut RecipeBuilder<'_>) -> Result<(), GenerationError> {
    let zero = recipe.mode(REGISTER_MODE, [TemplateArg::from(i64::from(ZERO))])?;
    recipe.call("bne", [zero, TemplateArg::Target, TemplateArg::label(CHECK_FAILED)])?;
    recipe.call("nop", Vec::<TemplateArg>::new())?;
    Ok(())
}

/// Registers the standard recipes, declares the `REG` allocator and the
/// external `check_failed` label.
///
/// # Errors
///
/// Fails only if the template was not built from [`MiniMips`].
pub fn install(template: &mut Template) -> Result<(), GenerationError> {
    template
        .mode_allocator(REGISTER_MODE, None)?
        .declare_external_label(CHECK_FAILED);

    template.preparator(header(None)?, default_preparator)?;
    template.preparator(zero_register(), |_| Ok(()))?;
    template.preparator(header(Some("0000_0000"))?, zero_value_preparator)?;
    template.preparator(header(Some("FFFF_FFFF"))?, |recipe| {
        let zero = recipe.mode(REGISTER_MODE, [TemplateArg::from(i64::from(ZERO))])?;
        recipe.call("nor", [TemplateArg::Target, zero.clone(), zero])?;
        Ok(())
    })?;
    template.preparator(header(Some("0000_XXXX"))?, |recipe| {
        recipe.prepare(TemplateArg::Target, TemplateArg::value_bits(0, 15), named(LOW_HALF))?;
        Ok(())
    })?;
    template.preparator(header(Some("XXXX_0000"))?, |recipe| {
        recipe.prepare(TemplateArg::Target, TemplateArg::value_bits(16, 31), named(HIGH_HALF))?;
        Ok(())
    })?;
    template.preparator(header(Some("XXXX"))?.name(HIGH_HALF), high_half)?;
    template.preparator(header(Some("XXXX"))?.name(LOW_HALF), |recipe| low_half(recipe, false))?;
    template.preparator(header(Some("XXXX"))?.name(LOW_HALF_KEEP), |recipe| {
        low_half(recipe, true)
    })?;

    template.comparator(header(None)?, default_comparator)?;
    template.comparator(zero_register(), |_| Ok(()))?;
    template.comparator(header(Some("0000_0000"))?, zero_value_comparator)?;
    Ok(())
}

/// A MiniMIPS template with the standard library installed.
///
/// # Errors
///
/// Propagates construction errors from the library.
pub fn standard_template(config: GeneratorConfig) -> Result<Template, GenerationError> {
    let mut template = Template::new(Arc::new(MiniMips), config.with_default_allocator(REGISTER_MODE))?;
    install(&mut template)?;
    Ok(template)
}

#[cfg(test)]
mod tests {
    use generator_core::{GeneratorConfig, RecipeKind};

    use super::{standard_template, HIGH_HALF, LOW_HALF, LOW_HALF_KEEP};

    #[test]
    fn library_registers_every_recipe() {
        let template = standard_template(GeneratorConfig::default()).unwrap();
        let recipes = template.preparators().recipes();
        let count = |kind: RecipeKind| recipes.iter().filter(|recipe| recipe.kind() == kind).count();
        assert_eq!(count(RecipeKind::Preparator), 9);
        assert_eq!(count(RecipeKind::Comparator), 3);

        let names: Vec<_> = recipes
            .iter()
            .filter_map(|recipe| recipe.header().name.as_deref())
            .collect();
        assert_eq!(names, vec![HIGH_HALF, LOW_HALF, LOW_HALF_KEEP]);
    }

    #[test]
    fn zero_recipes_are_empty() {
        let template = standard_template(GeneratorConfig::default()).unwrap();
        let empty = template
            .preparators()
            .recipes()
            .iter()
            .filter(|recipe| !recipe.header().arguments.is_empty())
            .collect::<Vec<_>>();
        assert_eq!(empty.len(), 2);
        assert!(empty
            .iter()
            .all(|recipe| recipe.variants().iter().all(|variant| variant.steps.is_empty())));
    }
}
