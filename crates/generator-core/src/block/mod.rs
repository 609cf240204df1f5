//! Block tree: leaves and composites with their expansion attributes.

mod attributes;
mod builder;

pub use attributes::{
    BlockAttributes, Combinator, Compositor, Obfuscator, Permutator, Pin, Rearranger,
};
pub use builder::BlockBuilder;

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

use crate::attr::{self, AttributeValue};
use crate::call::{Argument, InstructionCall};
use crate::error::GenerationError;
use crate::preparator::RecipeKind;

/// Identity of a composite block within its template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u64);

/// Composite block kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BlockKind {
    /// Children concatenated per draw.
    Sequence,
    /// Like `sequence`, emitted as one contiguous unit.
    Atomic,
    /// Children drawn round-robin, one per draw.
    Iterate,
    /// Children combined by a combinator and merged by a compositor.
    Block,
}

/// Label definition placed in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelDef {
    /// Named label.
    Named(String),
    /// Reusable numeric label `0..=9`.
    Numeric(u8),
}

impl fmt::Display for LabelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Numeric(id) => write!(f, "{id}"),
        }
    }
}

/// `name` and `variant` selectors of a prepare or compare request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareAttributes {
    /// Restricts lookup to recipes registered under this name.
    pub name: Option<String>,
    /// Forces the variant with this name.
    pub variant: Option<String>,
}

impl PrepareAttributes {
    /// Requests a named recipe.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            variant: None,
        }
    }

    /// Returns these attributes forcing a named variant.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Parses `name` and `variant` attributes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown keys and a type mismatch for
    /// non-string values.
    pub fn parse<'a>(
        pairs: impl IntoIterator<Item = (&'a str, AttributeValue)>,
    ) -> Result<Self, GenerationError> {
        let mut attributes = Self::default();
        for (key, value) in pairs {
            match key {
                "name" => attributes.name = Some(attr::expect_str(key, &value)?.to_owned()),
                "variant" => attributes.variant = Some(attr::expect_str(key, &value)?.to_owned()),
                other => return Err(attr::unknown_key("prepare", other)),
            }
        }
        Ok(attributes)
    }
}

/// Situated request to set or verify a register value.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareRequest {
    /// Preparator or comparator.
    pub kind: RecipeKind,
    /// Target addressing mode; may contain placeholders.
    pub target: InstructionCall,
    /// Value; may be lazy.
    pub value: Argument,
    /// Recipe and variant selectors.
    pub attributes: PrepareAttributes,
}

/// Leaf of the block tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    /// One operation.
    Call(InstructionCall),
    /// Preparator or comparator request.
    Prepare(PrepareRequest),
    /// Label definition.
    Label(LabelDef),
    /// Returns one register to its pool.
    Free {
        /// Pool name; the default pool when `None`.
        allocator: Option<String>,
        /// Register index.
        index: u32,
    },
    /// Returns every register of a pool.
    FreeAll {
        /// Pool name; the default pool when `None`.
        allocator: Option<String>,
    },
}

/// Composite block with owned children.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub(crate) id: BlockId,
    pub(crate) kind: BlockKind,
    pub(crate) attributes: BlockAttributes,
    pub(crate) children: Vec<Block>,
    pub(crate) prologue: Vec<Block>,
    pub(crate) epilogue: Vec<Block>,
    pub(crate) draws: Option<usize>,
}

impl Composite {
    /// Block identity.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Block kind.
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Effective attributes.
    #[must_use]
    pub const fn attributes(&self) -> &BlockAttributes {
        &self.attributes
    }

    /// Body children.
    #[must_use]
    pub fn children(&self) -> &[Block] {
        &self.children
    }

    /// Fixed blocks emitted before each unit.
    #[must_use]
    pub fn prologue(&self) -> &[Block] {
        &self.prologue
    }

    /// Fixed blocks emitted after each unit.
    #[must_use]
    pub fn epilogue(&self) -> &[Block] {
        &self.epilogue
    }

    /// Draws consumed per emitted unit, when set by [`Composite::add`].
    #[must_use]
    pub const fn draws(&self) -> Option<usize> {
        self.draws
    }

    /// Makes one emitted unit of this block consume `draws` candidate draws.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `draws` is zero.
    pub fn add(&mut self, draws: usize) -> Result<&mut Self, GenerationError> {
        if draws == 0 {
            return Err(GenerationError::configuration("add(0) would emit nothing"));
        }
        self.draws = Some(draws);
        Ok(self)
    }
}

/// Node of the block tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Single call or stream marker.
    Leaf(Leaf),
    /// Nested group.
    Composite(Composite),
}

impl Block {
    /// The composite, if this is one.
    #[must_use]
    pub const fn as_composite(&self) -> Option<&Composite> {
        match self {
            Self::Composite(composite) => Some(composite),
            Self::Leaf(_) => None,
        }
    }

    /// Mutable access to the composite, if this is one.
    pub fn as_composite_mut(&mut self) -> Option<&mut Composite> {
        match self {
            Self::Composite(composite) => Some(composite),
            Self::Leaf(_) => None,
        }
    }
}

impl From<Leaf> for Block {
    fn from(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }
}

impl From<InstructionCall> for Block {
    fn from(call: InstructionCall) -> Self {
        Self::Leaf(Leaf::Call(call))
    }
}

impl From<Composite> for Block {
    fn from(composite: Composite) -> Self {
        Self::Composite(composite)
    }
}
