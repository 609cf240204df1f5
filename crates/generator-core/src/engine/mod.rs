//! Expansion of a block tree into a stream of units.
//!
//! Per composite activation the pipeline is fixed: combinator, compositor,
//! permutator, rearranger, obfuscator. Prologue and epilogue wrap the result
//! and are never reordered.

mod combinator;
mod compositor;
mod transform;
pub(crate) mod unit;

use crate::block::{Block, BlockKind, Composite, Leaf};
use crate::call::Operand;
use crate::context::Context;
use crate::error::GenerationError;
use crate::preparator::{self, RecipeKind, Request};
use crate::value::BitValue;

pub(crate) use unit::{Item, Unit, UnitKind};

/// Number of distinct expansions a block yields before it starts cycling.
pub(crate) fn natural_count(block: &Block) -> usize {
    let Block::Composite(composite) = block else {
        return 1;
    };
    let counts: Vec<usize> = composite.children.iter().map(natural_count).collect();
    let widest = counts.iter().copied().max().unwrap_or(1);
    let raw = match composite.kind {
        BlockKind::Sequence | BlockKind::Atomic => widest,
        BlockKind::Iterate => counts.len().max(1).saturating_mul(widest),
        BlockKind::Block => {
            combinator::natural_count(composite.attributes.combinator.unwrap_or_default(), &counts)
        }
    };
    raw.div_ceil(composite.draws.unwrap_or(1)).max(1)
}

/// Draws a root yields before it cycles, accounting for the root `iterate`
/// draining a whole pool per draw.
pub(crate) fn root_natural_count(root: &Block) -> usize {
    match root {
        Block::Composite(composite)
            if composite.kind == BlockKind::Iterate && composite.draws.is_none() =>
        {
            natural_count(root)
                .div_ceil(composite.children.len().max(1))
                .max(1)
        }
        _ => natural_count(root),
    }
}

/// Expands the root for one draw. An `iterate` root drains a full pool cycle
/// per draw unless [`Composite::add`] says otherwise.
pub(crate) fn emit_root(
    ctx: &mut Context<'_>,
    root: &Block,
    draw: usize,
) -> Result<Vec<Unit>, GenerationError> {
    match root {
        Block::Leaf(leaf) => emit_leaf(ctx, leaf),
        Block::Composite(composite) => {
            let draws = composite.draws.unwrap_or(match composite.kind {
                BlockKind::Iterate => composite.children.len().max(1),
                BlockKind::Sequence | BlockKind::Atomic | BlockKind::Block => 1,
            });
            emit_composite(ctx, composite, draw, draws)
        }
    }
}

fn emit(ctx: &mut Context<'_>, block: &Block, index: usize) -> Result<Vec<Unit>, GenerationError> {
    match block {
        Block::Leaf(leaf) => emit_leaf(ctx, leaf),
        Block::Composite(composite) => {
            emit_composite(ctx, composite, index, composite.draws.unwrap_or(1))
        }
    }
}

/// Expands a child as its parent's transforms see it: a nested composite
/// becomes one unit, so its prologue, body and epilogue stay in order.
fn emit_unit(ctx: &mut Context<'_>, block: &Block, index: usize) -> Result<Vec<Unit>, GenerationError> {
    let units = emit(ctx, block, index)?;
    Ok(match block {
        Block::Composite(_) if units.len() > 1 => vec![Unit::wrap(UnitKind::Group, units, None)],
        _ => units,
    })
}

/// Expands a `block` child for its compositor. Children with a prologue or
/// epilogue stay whole; others expose their units for interleaving.
fn emit_source(ctx: &mut Context<'_>, block: &Block, index: usize) -> Result<Vec<Unit>, GenerationError> {
    match block {
        Block::Composite(composite)
            if !composite.prologue.is_empty() || !composite.epilogue.is_empty() =>
        {
            emit_unit(ctx, block, index)
        }
        _ => emit(ctx, block, index),
    }
}

fn emit_composite(
    ctx: &mut Context<'_>,
    composite: &Composite,
    index: usize,
    draws: usize,
) -> Result<Vec<Unit>, GenerationError> {
    ctx.enter(composite.id);
    let units = emit_activation(ctx, composite, index, draws);
    let left = ctx.leave();
    let units = units?;
    left?;
    Ok(match (composite.kind, composite.attributes.pin) {
        (BlockKind::Atomic, pin) => vec![Unit::wrap(UnitKind::Atomic, units, pin)],
        (_, Some(pin)) => vec![Unit::wrap(UnitKind::Group, units, Some(pin))],
        (_, None) => units,
    })
}

fn emit_activation(
    ctx: &mut Context<'_>,
    composite: &Composite,
    index: usize,
    draws: usize,
) -> Result<Vec<Unit>, GenerationError> {
    let mut units = Vec::new();
    for block in &composite.prologue {
        units.extend(emit_unit(ctx, block, index)?);
    }
    let first = index.saturating_mul(draws);
    for offset in 0..draws {
        units.extend(candidate(ctx, composite, first.saturating_add(offset))?);
    }
    for block in &composite.epilogue {
        units.extend(emit_unit(ctx, block, index)?);
    }
    Ok(units)
}

fn candidate(
    ctx: &mut Context<'_>,
    composite: &Composite,
    index: usize,
) -> Result<Vec<Unit>, GenerationError> {
    let attributes = &composite.attributes;
    let units = match composite.kind {
        BlockKind::Sequence | BlockKind::Atomic => {
            let mut units = Vec::new();
            for child in &composite.children {
                units.extend(emit_unit(ctx, child, index)?);
            }
            units
        }
        BlockKind::Iterate => {
            let pool = composite.children.len();
            if pool == 0 {
                Vec::new()
            } else {
                emit_unit(ctx, &composite.children[index % pool], index / pool)?
            }
        }
        BlockKind::Block => {
            let counts: Vec<usize> = composite.children.iter().map(natural_count).collect();
            let indices = combinator::select(
                attributes.combinator.unwrap_or_default(),
                &counts,
                index,
                ctx.rng_mut(),
            );
            let mut sources = Vec::with_capacity(indices.len());
            for (child, child_index) in composite.children.iter().zip(indices) {
                sources.push(emit_source(ctx, child, child_index)?);
            }
            compositor::compose(attributes.compositor.unwrap_or_default(), sources, ctx.rng_mut())
        }
    };
    let units = transform::permute(attributes.permutator.unwrap_or_default(), units, ctx.rng_mut());
    let units = transform::rearrange(attributes.rearranger.unwrap_or_default(), units);
    Ok(match attributes.obfuscator {
        Some(obfuscator) => transform::obfuscate(obfuscator, units, ctx.rng_mut()),
        None => units,
    })
}

fn emit_leaf(ctx: &mut Context<'_>, leaf: &Leaf) -> Result<Vec<Unit>, GenerationError> {
    match leaf {
        Leaf::Call(call) => {
            let call = ctx.concretize(call)?;
            Ok(vec![Unit::single(Item::Call {
                call,
                scope: ctx.scope(),
            })])
        }
        Leaf::Label(label) => Ok(vec![Unit::single(Item::Label {
            label: label.clone(),
            scope: ctx.scope(),
        })]),
        Leaf::Prepare(request) => {
            let target = ctx.concretize(&request.target)?;
            let width = ctx.value_width(&target)?;
            let value = match ctx.resolve_argument(&request.value)? {
                Operand::Int(value) => BitValue::from_signed(value, width)?,
                other => {
                    return Err(GenerationError::configuration(format!(
                        "{} value resolved to '{other}', not an integer",
                        request.kind
                    )))
                }
            };
            let calls = preparator::expand(
                ctx,
                Request {
                    kind: request.kind,
                    target: &target,
                    value,
                    name: request.attributes.name.as_deref(),
                    variant: request.attributes.variant.as_deref(),
                },
                0,
            )?;
            if calls.is_empty() {
                return Ok(Vec::new());
            }
            let scope = ctx.scope();
            let kind = match request.kind {
                RecipeKind::Preparator => UnitKind::Prepared,
                RecipeKind::Comparator => UnitKind::Compared,
            };
            Ok(vec![Unit {
                kind,
                items: calls
                    .into_iter()
                    .map(|call| Item::Call {
                        call,
                        scope: scope.clone(),
                    })
                    .collect(),
                pin: None,
            }])
        }
        Leaf::Free { allocator, index } => {
            ctx.free_register(allocator.as_deref(), *index)?;
            Ok(Vec::new())
        }
        Leaf::FreeAll { allocator } => {
            ctx.free_all_registers(allocator.as_deref())?;
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;

    use super::{natural_count, root_natural_count};
    use crate::block::{Block, BlockAttributes, BlockBuilder, BlockKind, Combinator};
    use crate::model::testing::ToyModel;
    use crate::model::CallRegistry;

    fn build(
        kind: BlockKind,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'_>) -> Result<(), crate::GenerationError>,
    ) -> Block {
        let calls = CallRegistry::from_model(Arc::new(ToyModel)).unwrap();
        let ids = Cell::new(0);
        Block::Composite(BlockBuilder::build(&calls, &ids, kind, attributes, body).unwrap())
    }

    #[test]
    fn counts_follow_block_kinds() {
        let product = build(
            BlockKind::Block,
            BlockAttributes::new().combinator(Combinator::Product),
            |b| {
                b.iterate(BlockAttributes::new(), |b| {
                    b.call("A", [])?.call("B", [])?;
                    Ok(())
                })?;
                b.iterate(BlockAttributes::new(), |b| {
                    b.call("C", [])?.call("D", [])?.call("E", [])?;
                    Ok(())
                })?;
                Ok(())
            },
        );
        assert_eq!(natural_count(&product), 6);

        let diagonal = build(BlockKind::Block, BlockAttributes::new(), |b| {
            b.iterate(BlockAttributes::new(), |b| {
                b.call("A", [])?.call("B", [])?;
                Ok(())
            })?;
            b.iterate(BlockAttributes::new(), |b| {
                b.call("C", [])?.call("D", [])?.call("E", [])?;
                Ok(())
            })?;
            Ok(())
        });
        assert_eq!(natural_count(&diagonal), 3);
    }

    #[test]
    fn add_divides_the_count() {
        let iterate = build(BlockKind::Sequence, BlockAttributes::new(), |b| {
            b.iterate(BlockAttributes::new(), |b| {
                b.call("A", [])?.call("B", [])?.call("C", [])?.call("D", [])?;
                Ok(())
            })?
            .add(3)?;
            Ok(())
        });
        assert_eq!(natural_count(&iterate), 2);

        let root = build(BlockKind::Iterate, BlockAttributes::new(), |b| {
            b.call("A", [])?.call("B", [])?.call("C", [])?;
            Ok(())
        });
        assert_eq!(natural_count(&root), 3);
        assert_eq!(root_natural_count(&root), 1);
        assert_eq!(natural_count(&Block::from(crate::block::Leaf::Label(crate::block::LabelDef::Numeric(1)))), 1);
    }
}
