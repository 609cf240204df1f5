//! Preparator and comparator recipes.
//!
//! A request to set (or check) a register mode to a value is resolved against
//! the registered recipes: the candidates are filtered by kind, target mode,
//! mask and argument constraints, the most specific survivor wins, and one of
//! its variants is instantiated with the target and value substituted in.

mod mask;
mod recipe;

pub use mask::Mask;
pub use recipe::{
    ArgumentConstraint, CallTemplate, Recipe, RecipeBuilder, RecipeHeader, RecipeKind,
    RecipeStep, StepBuilder, TemplateArg, Variant, VariantAttributes,
};

use crate::call::{ConcreteCall, Operand};
use crate::context::Context;
use crate::error::GenerationError;
use crate::model::{CallRegistry, PrimitiveKind};
use crate::value::BitValue;

/// Recipes in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparatorRegistry {
    recipes: Vec<Recipe>,
}

impl PreparatorRegistry {
    /// Adds a recipe after checking its target against the model.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the target is not a register mode
    /// with a value width, or a constraint names an unknown parameter.
    pub fn register(&mut self, calls: &CallRegistry, recipe: Recipe) -> Result<(), GenerationError> {
        let header = recipe.header();
        let signature = calls.check_kind(PrimitiveKind::Mode, &header.target)?;
        if signature.value_width.is_none() {
            return Err(GenerationError::configuration(format!(
                "{} target '{}' does not hold a value",
                recipe.kind(),
                header.target
            )));
        }
        if let Some((parameter, _)) = header
            .arguments
            .iter()
            .find(|(parameter, _)| signature.parameter_index(parameter).is_none())
        {
            return Err(GenerationError::configuration(format!(
                "'{}' has no parameter '{parameter}' to constrain",
                header.target
            )));
        }
        tracing::debug!(
            kind = %recipe.kind(),
            target = %header.target,
            mask = ?header.mask.as_ref().map(ToString::to_string),
            name = ?header.name,
            "registered recipe"
        );
        self.recipes.push(recipe);
        Ok(())
    }

    /// Registered recipes.
    #[must_use]
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Number of registered recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Picks the recipe for a request.
    ///
    /// Without a `name`, unnamed recipes are preferred and named ones are a
    /// fallback. Among matches the order is: argument-constrained recipes,
    /// then masked ones by fewest wildcards, then unmasked ones, then
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::UnresolvedPreparator`] when nothing matches.
    pub fn select(
        &self,
        calls: &CallRegistry,
        kind: RecipeKind,
        target: &ConcreteCall,
        value: &BitValue,
        name: Option<&str>,
    ) -> Result<&Recipe, GenerationError> {
        let matching: Vec<(usize, &Recipe)> = self
            .recipes
            .iter()
            .enumerate()
            .filter(|(_, recipe)| recipe.kind() == kind && applies(calls, recipe, target, value))
            .collect();
        let eligible: Vec<(usize, &Recipe)> = match name {
            Some(name) => matching
                .into_iter()
                .filter(|(_, recipe)| recipe.header().name.as_deref() == Some(name))
                .collect(),
            None => {
                let (unnamed, named): (Vec<_>, Vec<_>) = matching
                    .into_iter()
                    .partition(|(_, recipe)| recipe.header().name.is_none());
                if unnamed.is_empty() {
                    named
                } else {
                    unnamed
                }
            }
        };
        eligible
            .into_iter()
            .min_by_key(|(order, recipe)| specificity(recipe, *order))
            .map(|(_, recipe)| recipe)
            .ok_or_else(|| {
                let reason = name.map_or_else(
                    || "no matching recipe".to_owned(),
                    |name| format!("no matching recipe named '{name}'"),
                );
                unresolved(kind, target, value, reason)
            })
    }
}

fn applies(calls: &CallRegistry, recipe: &Recipe, target: &ConcreteCall, value: &BitValue) -> bool {
    let header = recipe.header();
    if header.target != target.name() {
        return false;
    }
    if let Some(mask) = &header.mask {
        if !mask.matches(value) {
            return false;
        }
    }
    let Some(signature) = calls.signature(target.name()) else {
        return false;
    };
    header.arguments.iter().all(|(parameter, constraint)| {
        signature
            .parameter_index(parameter)
            .and_then(|position| target.int_argument(position, parameter))
            .is_some_and(|actual| constraint.accepts(actual))
    })
}

fn specificity(recipe: &Recipe, order: usize) -> (bool, usize, usize) {
    let header = recipe.header();
    let wildcards = header
        .mask
        .as_ref()
        .map_or(usize::MAX, Mask::wildcard_count);
    (header.arguments.is_empty(), wildcards, order)
}

fn unresolved(
    kind: RecipeKind,
    target: &ConcreteCall,
    value: &BitValue,
    reason: impl Into<String>,
) -> GenerationError {
    GenerationError::UnresolvedPreparator {
        recipe: kind,
        target: target.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// A situated request to set or check a register.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request<'r> {
    pub(crate) kind: RecipeKind,
    pub(crate) target: &'r ConcreteCall,
    pub(crate) value: BitValue,
    pub(crate) name: Option<&'r str>,
    pub(crate) variant: Option<&'r str>,
}

/// Resolves a request into concrete calls, recursing through nested `prepare` steps.
pub(crate) fn expand(
    ctx: &mut Context<'_>,
    request: Request<'_>,
    depth: usize,
) -> Result<Vec<ConcreteCall>, GenerationError> {
    let limit = ctx.config().max_preparator_depth;
    if depth > limit {
        return Err(unresolved(
            request.kind,
            request.target,
            &request.value,
            format!("nesting exceeds the depth limit of {limit}"),
        ));
    }
    let registry = ctx.preparators();
    let recipe = registry.select(
        ctx.calls(),
        request.kind,
        request.target,
        &request.value,
        request.name,
    )?;
    let variant = recipe
        .choose_variant(request.variant, ctx.rng_mut())
        .ok_or_else(|| {
            unresolved(
                request.kind,
                request.target,
                &request.value,
                format!("no variant named '{}'", request.variant.unwrap_or_default()),
            )
        })?;
    tracing::debug!(
        kind = %request.kind,
        target = %request.target,
        value = %request.value,
        variant = ?variant.name,
        depth,
        "expanding recipe"
    );

    let mut calls = Vec::new();
    for step in &variant.steps {
        match step {
            RecipeStep::Call(template) => {
                let arguments = template
                    .arguments
                    .try_map(|argument| substitute(ctx, argument, &request))?;
                calls.push(ConcreteCall::new(
                    template.name.as_str(),
                    PrimitiveKind::Operation,
                    arguments,
                ));
            }
            RecipeStep::Prepare {
                target,
                value,
                name,
                variant,
            } => {
                let nested_target = match substitute(ctx, target, &request)? {
                    Operand::Mode(call) => *call,
                    other => {
                        return Err(GenerationError::configuration(format!(
                            "prepare target resolved to '{other}', not an addressing mode"
                        )))
                    }
                };
                let nested_value = match value {
                    TemplateArg::Value(None) => request.value,
                    TemplateArg::Value(Some((lo, hi))) => request.value.slice(*lo, *hi)?,
                    other => match substitute(ctx, other, &request)? {
                        Operand::Int(number) => {
                            BitValue::from_signed(number, ctx.value_width(&nested_target)?)?
                        }
                        operand => {
                            return Err(GenerationError::configuration(format!(
                                "prepare value resolved to '{operand}', not an integer"
                            )))
                        }
                    },
                };
                calls.extend(expand(
                    ctx,
                    Request {
                        kind: RecipeKind::Preparator,
                        target: &nested_target,
                        value: nested_value,
                        name: name.as_deref(),
                        variant: variant.as_deref(),
                    },
                    depth + 1,
                )?);
            }
        }
    }
    Ok(calls)
}

fn substitute(
    ctx: &mut Context<'_>,
    argument: &TemplateArg,
    request: &Request<'_>,
) -> Result<Operand, GenerationError> {
    match argument {
        TemplateArg::Literal(literal) => ctx.resolve_argument(literal),
        TemplateArg::Target => Ok(Operand::Mode(Box::new(request.target.clone()))),
        TemplateArg::Value(None) => Ok(Operand::Int(request.value.as_operand())),
        TemplateArg::Value(Some((lo, hi))) => {
            Ok(Operand::Int(request.value.slice(*lo, *hi)?.as_operand()))
        }
        TemplateArg::Mode { name, arguments } => {
            let arguments = arguments.try_map(|inner| substitute(ctx, inner, request))?;
            Ok(Operand::Mode(Box::new(ConcreteCall::new(
                name.as_str(),
                PrimitiveKind::Mode,
                arguments,
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{expand, ArgumentConstraint, PreparatorRegistry, RecipeBuilder, RecipeHeader, RecipeKind, Request, TemplateArg};
    use crate::allocator::AllocatorSet;
    use crate::block::PrepareAttributes;
    use crate::call::{Arguments, ConcreteCall, Operand};
    use crate::config::GeneratorConfig;
    use crate::context::Context;
    use crate::error::{ErrorKind, GenerationError};
    use crate::model::testing::ToyModel;
    use crate::model::{CallRegistry, PrimitiveKind};
    use crate::value::BitValue;

    fn calls() -> CallRegistry {
        CallRegistry::from_model(Arc::new(ToyModel)).unwrap()
    }

    fn reg(index: i64) -> ConcreteCall {
        ConcreteCall::new("R", PrimitiveKind::Mode, vec![Operand::Int(index)].into())
    }

    fn add(
        registry: &mut PreparatorRegistry,
        calls: &CallRegistry,
        kind: RecipeKind,
        header: RecipeHeader,
        operation: &str,
    ) {
        let mut builder = RecipeBuilder::new(calls);
        builder
            .call(operation, [TemplateArg::Target, TemplateArg::value()])
            .unwrap();
        registry
            .register(calls, builder.finish(kind, header).unwrap())
            .unwrap();
    }

    fn value(bits: u64) -> BitValue {
        BitValue::new(bits, 32).unwrap()
    }

    fn standard(calls: &CallRegistry) -> PreparatorRegistry {
        let mut registry = PreparatorRegistry::default();
        add(&mut registry, calls, RecipeKind::Preparator, RecipeHeader::new("R"), "li");
        add(
            &mut registry,
            calls,
            RecipeKind::Preparator,
            RecipeHeader::new("R").mask("0000_XXXX").unwrap(),
            "mov",
        );
        add(
            &mut registry,
            calls,
            RecipeKind::Preparator,
            RecipeHeader::new("R").mask("0000_000X").unwrap(),
            "shl",
        );
        add(
            &mut registry,
            calls,
            RecipeKind::Preparator,
            RecipeHeader::new("R")
                .mask("XXXX")
                .unwrap()
                .name("half"),
            "shl",
        );
        registry
    }

    #[test]
    fn most_specific_mask_wins() {
        let calls = calls();
        let registry = standard(&calls);
        let pick = |bits| {
            registry
                .select(&calls, RecipeKind::Preparator, &reg(3), &value(bits), None)
                .unwrap()
                .header()
                .mask
                .as_ref()
                .map(ToString::to_string)
        };
        assert_eq!(pick(0x0000_0007), Some("0000_000X".to_owned()));
        assert_eq!(pick(0x0000_1234), Some("0000_XXXX".to_owned()));
        assert_eq!(pick(0x1234_0000), None);
    }

    #[test]
    fn named_recipes_are_a_fallback_and_can_be_requested() {
        let calls = calls();
        let registry = standard(&calls);
        let half = BitValue::new(0xBEEF, 16).unwrap();
        let unmasked = registry
            .select(&calls, RecipeKind::Preparator, &reg(3), &half, None)
            .unwrap();
        assert_eq!(unmasked.header().name, None);
        let requested = registry
            .select(&calls, RecipeKind::Preparator, &reg(3), &half, Some("half"))
            .unwrap();
        assert_eq!(requested.header().name.as_deref(), Some("half"));

        let mut only_named = PreparatorRegistry::default();
        add(
            &mut only_named,
            &calls,
            RecipeKind::Preparator,
            RecipeHeader::new("R").mask("XXXX").unwrap().name("half"),
            "li",
        );
        let fallback = only_named
            .select(&calls, RecipeKind::Preparator, &reg(3), &half, None)
            .unwrap();
        assert_eq!(fallback.header().name.as_deref(), Some("half"));

        let error = registry
            .select(&calls, RecipeKind::Preparator, &reg(3), &value(1), Some("half"))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnresolvedPreparator);
    }

    #[test]
    fn argument_constraints_outrank_masks() {
        let calls = calls();
        let mut registry = standard(&calls);
        let zero = RecipeBuilder::new(&calls)
            .finish(
                RecipeKind::Preparator,
                RecipeHeader::new("R").argument("i", ArgumentConstraint::OneOf(vec![0])),
            )
            .unwrap();
        registry.register(&calls, zero).unwrap();

        let chosen = registry
            .select(&calls, RecipeKind::Preparator, &reg(0), &value(5), None)
            .unwrap();
        assert!(chosen.variants()[0].steps.is_empty());
        let other = registry
            .select(&calls, RecipeKind::Preparator, &reg(1), &value(5), None)
            .unwrap();
        assert!(!other.variants()[0].steps.is_empty());
    }

    #[test]
    fn comparators_are_separate_from_preparators() {
        let calls = calls();
        let registry = standard(&calls);
        let error = registry
            .select(&calls, RecipeKind::Comparator, &reg(1), &value(0), None)
            .unwrap_err();
        assert_eq!(
            error,
            GenerationError::UnresolvedPreparator {
                recipe: RecipeKind::Comparator,
                target: "R(1)".into(),
                value: "0x00000000".into(),
                reason: "no matching recipe".into(),
            }
        );
    }

    #[test]
    fn registration_checks_target_and_parameters() {
        let calls = calls();
        let mut registry = PreparatorRegistry::default();
        let recipe = RecipeBuilder::new(&calls)
            .finish(RecipeKind::Preparator, RecipeHeader::new("MEM"))
            .unwrap();
        assert!(registry.register(&calls, recipe).is_err());
        let recipe = RecipeBuilder::new(&calls)
            .finish(
                RecipeKind::Preparator,
                RecipeHeader::new("R").argument("j", ArgumentConstraint::OneOf(vec![0])),
            )
            .unwrap();
        assert!(registry.register(&calls, recipe).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn nested_prepare_steps_slice_the_value() {
        let calls = calls();
        let mut registry = PreparatorRegistry::default();
        let mut builder = RecipeBuilder::new(&calls);
        builder
            .prepare(
                TemplateArg::Target,
                TemplateArg::value_bits(16, 31),
                PrepareAttributes::named("half"),
            )
            .unwrap()
            .call("shl", [TemplateArg::Target, TemplateArg::from(16)])
            .unwrap();
        registry
            .register(&calls, builder.finish(RecipeKind::Preparator, RecipeHeader::new("R")).unwrap())
            .unwrap();
        add(
            &mut registry,
            &calls,
            RecipeKind::Preparator,
            RecipeHeader::new("R").mask("XXXX").unwrap().name("half"),
            "li",
        );

        let config = GeneratorConfig::default();
        let allocators = AllocatorSet::default();
        let mut ctx = Context::new(&calls, &config, &registry, allocators);
        let target = reg(4);
        let emitted = expand(
            &mut ctx,
            Request {
                kind: RecipeKind::Preparator,
                target: &target,
                value: value(0xABCD_0000),
                name: None,
                variant: None,
            },
            0,
        )
        .unwrap();
        let rendered: Vec<String> = emitted.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["li(R(4), 43981)", "shl(R(4), 16)"]);
    }

    #[test]
    fn runaway_recursion_hits_the_depth_limit() {
        let calls = calls();
        let mut registry = PreparatorRegistry::default();
        let mut builder = RecipeBuilder::new(&calls);
        builder
            .prepare(TemplateArg::Target, TemplateArg::value(), PrepareAttributes::default())
            .unwrap();
        registry
            .register(&calls, builder.finish(RecipeKind::Preparator, RecipeHeader::new("R")).unwrap())
            .unwrap();

        let config = GeneratorConfig::default().with_max_preparator_depth(3);
        let mut ctx = Context::new(&calls, &config, &registry, AllocatorSet::default());
        let target = reg(2);
        let error = expand(
            &mut ctx,
            Request {
                kind: RecipeKind::Preparator,
                target: &target,
                value: value(1),
                name: None,
                variant: None,
            },
            0,
        )
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnresolvedPreparator);
        assert!(error.to_string().contains("depth limit of 3"));
    }

    #[test]
    fn keyed_template_arguments_keep_their_shape() {
        let calls = calls();
        let mut registry = PreparatorRegistry::default();
        let mut builder = RecipeBuilder::new(&calls);
        builder
            .call(
                "li",
                Arguments::Keyed(vec![
                    ("dst".into(), TemplateArg::Target),
                    ("imm".into(), TemplateArg::value_bits(0, 7)),
                ]),
            )
            .unwrap();
        registry
            .register(&calls, builder.finish(RecipeKind::Preparator, RecipeHeader::new("R")).unwrap())
            .unwrap();
        let config = GeneratorConfig::default();
        let mut ctx = Context::new(&calls, &config, &registry, AllocatorSet::default());
        let target = reg(9);
        let emitted = expand(
            &mut ctx,
            Request {
                kind: RecipeKind::Preparator,
                target: &target,
                value: value(0x1FF),
                name: None,
                variant: None,
            },
            0,
        )
        .unwrap();
        assert_eq!(emitted[0].to_string(), "li(dst: R(9), imm: 255)");
    }
}
