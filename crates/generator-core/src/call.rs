use std::fmt;

use crate::allocator::UnknownImmediate;
use crate::model::PrimitiveKind;
use crate::value::LazyValue;

/// Reference to a label from a call argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelRef {
    /// Named label.
    Named(String),
    /// Nearest later definition of a numeric label (`1f`).
    Forward(u8),
    /// Nearest earlier definition of a numeric label (`1b`).
    Backward(u8),
}

impl LabelRef {
    /// Named reference.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Display for LabelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Forward(id) => write!(f, "{id}f"),
            Self::Backward(id) => write!(f, "{id}b"),
        }
    }
}

/// Argument list of a call: positional or keyed, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arguments<T> {
    /// Arguments in parameter order.
    Positional(Vec<T>),
    /// Arguments by parameter name, in author order.
    Keyed(Vec<(String, T)>),
}

impl<T> Default for Arguments<T> {
    fn default() -> Self {
        Self::Positional(Vec::new())
    }
}

impl<T> From<Vec<T>> for Arguments<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Positional(values)
    }
}

impl<T, const N: usize> From<[T; N]> for Arguments<T> {
    fn from(values: [T; N]) -> Self {
        Self::Positional(values.into())
    }
}

impl<T> Arguments<T> {
    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Keyed(entries) => entries.len(),
        }
    }

    /// True when there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Argument values in stored order.
    pub fn values(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Self::Positional(values) => Box::new(values.iter()),
            Self::Keyed(entries) => Box::new(entries.iter().map(|(_, value)| value)),
        }
    }

    /// Looks up a parameter by its position or, for keyed lists, by name.
    #[must_use]
    pub fn get(&self, position: usize, name: &str) -> Option<&T> {
        match self {
            Self::Positional(values) => values.get(position),
            Self::Keyed(entries) => entries
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
        }
    }

    /// Maps every value, keeping the positional/keyed shape.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`.
    pub fn try_map<U, E>(&self, mut f: impl FnMut(&T) -> Result<U, E>) -> Result<Arguments<U>, E> {
        Ok(match self {
            Self::Positional(values) => {
                Arguments::Positional(values.iter().map(&mut f).collect::<Result<_, _>>()?)
            }
            Self::Keyed(entries) => Arguments::Keyed(
                entries
                    .iter()
                    .map(|(key, value)| f(value).map(|mapped| (key.clone(), mapped)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// Abstract argument of a call in the block tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Concrete integer.
    Int(i64),
    /// Concrete string.
    Str(String),
    /// Nested addressing-mode call.
    Mode(Box<InstructionCall>),
    /// Deferred value resolved per draw.
    Lazy(LazyValue),
    /// Register placeholder resolved by an allocator.
    Unknown(UnknownImmediate),
    /// Label reference resolved after the sequence is final.
    Label(LabelRef),
}

macro_rules! int_argument {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Argument {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

int_argument!(i8, i16, i32, i64, u8, u16, u32);

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<InstructionCall> for Argument {
    fn from(call: InstructionCall) -> Self {
        Self::Mode(Box::new(call))
    }
}

impl From<LazyValue> for Argument {
    fn from(value: LazyValue) -> Self {
        Self::Lazy(value)
    }
}

impl From<UnknownImmediate> for Argument {
    fn from(value: UnknownImmediate) -> Self {
        Self::Unknown(value)
    }
}

impl From<LabelRef> for Argument {
    fn from(reference: LabelRef) -> Self {
        Self::Label(reference)
    }
}

/// Operation or addressing mode with abstract arguments.
///
/// Instances are produced by [`crate::model::InstructionSetModel::build_call`],
/// so the argument list always fits the primitive's signature.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionCall {
    name: String,
    kind: PrimitiveKind,
    arguments: Arguments<Argument>,
}

impl InstructionCall {
    /// Wraps an already-validated call.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PrimitiveKind, arguments: Arguments<Argument>) -> Self {
        Self {
            name: name.into(),
            kind,
            arguments,
        }
    }

    /// Primitive name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operation or addressing mode.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// Abstract arguments.
    #[must_use]
    pub const fn arguments(&self) -> &Arguments<Argument> {
        &self.arguments
    }
}

/// Where a resolved label reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelTarget {
    /// Index of the call the label marks within the sequence.
    Position(usize),
    /// Label declared outside the generated sequence.
    External,
}

/// Label argument of a concrete call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelOperand {
    /// Reference as written.
    pub reference: LabelRef,
    /// Resolved target, filled in by the final label pass.
    pub target: Option<LabelTarget>,
}

/// Fully concrete argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Integer value.
    Int(i64),
    /// String value.
    Str(String),
    /// Concrete addressing mode.
    Mode(Box<ConcreteCall>),
    /// Label reference.
    Label(LabelOperand),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(text) => f.write_str(text),
            Self::Mode(call) => write!(f, "{call}"),
            Self::Label(label) => write!(f, "{}", label.reference),
        }
    }
}

/// Call whose arguments are all concrete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConcreteCall {
    name: String,
    kind: PrimitiveKind,
    arguments: Arguments<Operand>,
}

impl ConcreteCall {
    /// Builds a concrete call.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PrimitiveKind, arguments: Arguments<Operand>) -> Self {
        Self {
            name: name.into(),
            kind,
            arguments,
        }
    }

    /// Primitive name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operation or addressing mode.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// Concrete arguments.
    #[must_use]
    pub const fn arguments(&self) -> &Arguments<Operand> {
        &self.arguments
    }

    /// Integer argument at `position` (or keyed `name`), if present.
    #[must_use]
    pub fn int_argument(&self, position: usize, name: &str) -> Option<i64> {
        match self.arguments.get(position, name) {
            Some(Operand::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Visits every label operand, including ones nested in modes.
    pub(crate) fn visit_labels_mut<E>(
        &mut self,
        visit: &mut impl FnMut(&mut LabelOperand) -> Result<(), E>,
    ) -> Result<(), E> {
        let operands: Box<dyn Iterator<Item = &mut Operand>> = match &mut self.arguments {
            Arguments::Positional(values) => Box::new(values.iter_mut()),
            Arguments::Keyed(entries) => Box::new(entries.iter_mut().map(|(_, value)| value)),
        };
        for operand in operands {
            match operand {
                Operand::Label(label) => visit(label)?,
                Operand::Mode(call) => call.visit_labels_mut(visit)?,
                Operand::Int(_) | Operand::Str(_) => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConcreteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        match &self.arguments {
            Arguments::Positional(values) => {
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
            }
            Arguments::Keyed(entries) => {
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
            }
        }
        f.write_str(")")
    }
}
