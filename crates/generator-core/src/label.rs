use std::collections::{BTreeSet, HashMap};

use crate::block::{BlockId, LabelDef};
use crate::call::{LabelOperand, LabelRef, LabelTarget};
use crate::engine::Item;
use crate::error::GenerationError;
use crate::sequence::{LabelMark, Sequence};

struct Definition {
    ordinal: usize,
    position: usize,
    scope: Vec<BlockId>,
}

/// Ranks a definition by block distance from a reference: same block, then
/// descendants, then ancestors, then other branches.
fn block_distance(reference: &[BlockId], definition: &[BlockId]) -> (u8, usize, usize) {
    let common = reference
        .iter()
        .zip(definition)
        .take_while(|(a, b)| a == b)
        .count();
    let up = reference.len() - common;
    let down = definition.len() - common;
    match (up, down) {
        (0, 0) => (0, 0, 0),
        (0, down) => (1, down, 0),
        (up, 0) => (2, up, 0),
        (up, down) => (3, up, down),
    }
}

/// Flattens items into a sequence and binds every label reference.
pub(crate) fn resolve(
    items: Vec<Item>,
    externals: &BTreeSet<String>,
) -> Result<Sequence, GenerationError> {
    let mut calls = Vec::new();
    let mut marks = Vec::new();
    let mut named: HashMap<String, Vec<Definition>> = HashMap::new();
    let mut numeric: HashMap<u8, Vec<Definition>> = HashMap::new();
    let mut scopes = Vec::new();

    for (ordinal, item) in items.into_iter().enumerate() {
        match item {
            Item::Call { call, scope } => {
                calls.push((ordinal, call));
                scopes.push(scope);
            }
            Item::Label { label, scope } => {
                let definition = Definition {
                    ordinal,
                    position: calls.len(),
                    scope: scope.to_vec(),
                };
                match &label {
                    LabelDef::Named(name) => named.entry(name.clone()).or_default().push(definition),
                    LabelDef::Numeric(id) => numeric.entry(*id).or_default().push(definition),
                }
                marks.push(LabelMark {
                    label,
                    position: calls.len(),
                });
            }
        }
    }

    let mut resolved = Vec::with_capacity(calls.len());
    for ((ordinal, mut call), scope) in calls.into_iter().zip(scopes) {
        call.visit_labels_mut(&mut |operand: &mut LabelOperand| -> Result<(), GenerationError> {
            operand.target = Some(match &operand.reference {
                LabelRef::Forward(id) => numeric
                    .get(id)
                    .and_then(|defs| defs.iter().find(|def| def.ordinal > ordinal))
                    .map(|def| LabelTarget::Position(def.position))
                    .ok_or_else(|| unresolved(&operand.reference))?,
                LabelRef::Backward(id) => numeric
                    .get(id)
                    .and_then(|defs| defs.iter().rev().find(|def| def.ordinal < ordinal))
                    .map(|def| LabelTarget::Position(def.position))
                    .ok_or_else(|| unresolved(&operand.reference))?,
                LabelRef::Named(name) => match named.get(name) {
                    Some(defs) => defs
                        .iter()
                        .min_by_key(|def| {
                            (
                                block_distance(&scope, &def.scope),
                                def.ordinal.abs_diff(ordinal),
                                def.ordinal,
                            )
                        })
                        .map(|def| LabelTarget::Position(def.position))
                        .ok_or_else(|| unresolved(&operand.reference))?,
                    None if externals.contains(name) => LabelTarget::External,
                    None => return Err(unresolved(&operand.reference)),
                },
            });
            Ok(())
        })?;
        resolved.push(call);
    }
    Ok(Sequence::new(resolved, marks))
}

fn unresolved(reference: &LabelRef) -> GenerationError {
    GenerationError::UnresolvedLabel {
        reference: reference.to_string(),
    }
}
