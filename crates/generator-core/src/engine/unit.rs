use std::sync::Arc;

use crate::block::{BlockId, LabelDef, Pin};
use crate::call::ConcreteCall;

/// Path of composite ids from the root to the emitting block.
pub(crate) type Scope = Arc<[BlockId]>;

/// One element of the flattened stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Item {
    Call { call: ConcreteCall, scope: Scope },
    Label { label: LabelDef, scope: Scope },
}

/// How a unit behaves under reordering transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitKind {
    /// Single call or label.
    Single,
    /// Output of an atomic block.
    Atomic,
    /// Output of a nested or pinned block.
    Group,
    /// Preparator output, bound to the following unit.
    Prepared,
    /// Comparator output, bound to the preceding unit.
    Compared,
}

/// Indivisible piece of a stream as seen by transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Unit {
    pub(crate) kind: UnitKind,
    pub(crate) items: Vec<Item>,
    pub(crate) pin: Option<Pin>,
}

impl Unit {
    pub(crate) fn single(item: Item) -> Self {
        Self {
            kind: UnitKind::Single,
            items: vec![item],
            pin: None,
        }
    }

    /// Wraps several units into one opaque unit.
    pub(crate) fn wrap(kind: UnitKind, units: Vec<Self>, pin: Option<Pin>) -> Self {
        Self {
            kind,
            items: units.into_iter().flat_map(|unit| unit.items).collect(),
            pin,
        }
    }
}

/// Units that must stay adjacent: a target with its bound preparators before
/// it and comparators after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chain {
    pub(crate) units: Vec<Unit>,
}

impl Chain {
    pub(crate) fn pin(&self) -> Option<Pin> {
        self.units.iter().find_map(|unit| unit.pin)
    }
}

/// Groups units into dependency chains, keeping their order.
pub(crate) fn bind(units: Vec<Unit>) -> Vec<Chain> {
    let mut chains: Vec<Chain> = Vec::new();
    for unit in units {
        let attach = chains.last().is_some_and(|chain| {
            let awaiting_target = chain
                .units
                .last()
                .is_some_and(|last| last.kind == UnitKind::Prepared);
            awaiting_target || unit.kind == UnitKind::Compared
        });
        match chains.last_mut() {
            Some(chain) if attach => chain.units.push(unit),
            _ => chains.push(Chain { units: vec![unit] }),
        }
    }
    chains
}

/// Flattens chains back into units.
pub(crate) fn unbind(chains: Vec<Chain>) -> Vec<Unit> {
    chains.into_iter().flat_map(|chain| chain.units).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::{Item, Unit, UnitKind};
    use crate::call::ConcreteCall;
    use crate::model::PrimitiveKind;

    pub(crate) fn op(name: &str) -> Item {
        Item::Call {
            call: ConcreteCall::new(name, PrimitiveKind::Operation, Vec::new().into()),
            scope: Arc::from(Vec::new()),
        }
    }

    pub(crate) fn unit(kind: UnitKind, names: &[&str]) -> Unit {
        Unit {
            kind,
            items: names.iter().map(|name| op(name)).collect(),
            pin: None,
        }
    }

    pub(crate) fn names(units: &[Unit]) -> Vec<String> {
        units
            .iter()
            .flat_map(|unit| &unit.items)
            .map(|item| match item {
                Item::Call { call, .. } => call.name().to_owned(),
                Item::Label { label, .. } => format!("{label}:"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{names, unit};
    use super::{bind, unbind, UnitKind};

    #[test]
    fn preparators_bind_forward_and_comparators_backward() {
        let units = vec![
            unit(UnitKind::Single, &["A"]),
            unit(UnitKind::Prepared, &["p1"]),
            unit(UnitKind::Prepared, &["p2"]),
            unit(UnitKind::Single, &["B"]),
            unit(UnitKind::Compared, &["c"]),
            unit(UnitKind::Single, &["C"]),
        ];
        let chains = bind(units.clone());
        assert_eq!(chains.len(), 3);
        assert_eq!(names(&chains[1].units), vec!["p1", "p2", "B", "c"]);
        assert_eq!(unbind(chains), units);
    }

    #[test]
    fn leading_comparator_starts_its_own_chain() {
        let chains = bind(vec![
            unit(UnitKind::Compared, &["c"]),
            unit(UnitKind::Single, &["A"]),
        ]);
        assert_eq!(chains.len(), 2);
    }
}
