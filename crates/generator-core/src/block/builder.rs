use std::cell::Cell;
use std::mem;

use crate::block::{
    Block, BlockAttributes, BlockId, BlockKind, Composite, LabelDef, Leaf, PrepareAttributes,
    PrepareRequest,
};
use crate::call::{Argument, Arguments, InstructionCall};
use crate::error::GenerationError;
use crate::model::{CallRegistry, ModelError, PrimitiveKind};
use crate::preparator::RecipeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Body,
    Prologue,
    Epilogue,
}

/// Explicit builder for the body of one composite block.
///
/// Nested blocks get their own builder; the finished child is appended to the
/// section (body, prologue or epilogue) that is active in the parent.
#[derive(Debug)]
pub struct BlockBuilder<'t> {
    calls: &'t CallRegistry,
    ids: &'t Cell<u64>,
    composite: Composite,
    section: Section,
}

impl<'t> BlockBuilder<'t> {
    fn new(
        calls: &'t CallRegistry,
        ids: &'t Cell<u64>,
        kind: BlockKind,
        mut attributes: BlockAttributes,
    ) -> Self {
        let id = BlockId(ids.get());
        ids.set(id.0 + 1);
        if kind != BlockKind::Block {
            if let Some(combinator) = attributes.combinator.take() {
                tracing::warn!(%kind, %combinator, "combinator only applies to block kinds; ignored");
            }
            if let Some(compositor) = attributes.compositor.take() {
                tracing::warn!(%kind, %compositor, "compositor only applies to block kinds; ignored");
            }
        }
        Self {
            calls,
            ids,
            composite: Composite {
                id,
                kind,
                attributes,
                children: Vec::new(),
                prologue: Vec::new(),
                epilogue: Vec::new(),
                draws: None,
            },
            section: Section::Body,
        }
    }

    /// Runs `body` against a fresh builder and returns the finished composite.
    pub(crate) fn build(
        calls: &'t CallRegistry,
        ids: &'t Cell<u64>,
        kind: BlockKind,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut Self) -> Result<(), GenerationError>,
    ) -> Result<Composite, GenerationError> {
        let mut builder = Self::new(calls, ids, kind, attributes);
        body(&mut builder)?;
        Ok(builder.composite)
    }

    /// Identity of the block under construction.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.composite.id
    }

    fn section_mut(&mut self) -> &mut Vec<Block> {
        match self.section {
            Section::Body => &mut self.composite.children,
            Section::Prologue => &mut self.composite.prologue,
            Section::Epilogue => &mut self.composite.epilogue,
        }
    }

    /// Appends a child to the active section.
    pub fn add_child(&mut self, block: impl Into<Block>) -> &mut Self {
        self.section_mut().push(block.into());
        self
    }

    /// Builds an operation without adding it.
    ///
    /// # Errors
    ///
    /// Returns a model error for unknown operations or mismatched arguments.
    pub fn instruction(
        &self,
        name: &str,
        arguments: impl Into<Arguments<Argument>>,
    ) -> Result<InstructionCall, GenerationError> {
        self.calls.build_kind(PrimitiveKind::Operation, name, arguments)
    }

    /// Builds an addressing mode for use as an argument.
    ///
    /// # Errors
    ///
    /// Returns a model error for unknown modes or mismatched arguments.
    pub fn mode(
        &self,
        name: &str,
        arguments: impl Into<Arguments<Argument>>,
    ) -> Result<InstructionCall, GenerationError> {
        self.calls.build_kind(PrimitiveKind::Mode, name, arguments)
    }

    /// Builds an operation and appends it as a leaf.
    ///
    /// # Errors
    ///
    /// Same as [`BlockBuilder::instruction`].
    pub fn call(
        &mut self,
        name: &str,
        arguments: impl Into<Arguments<Argument>>,
    ) -> Result<&mut Self, GenerationError> {
        let call = self.instruction(name, arguments)?;
        Ok(self.add_child(call))
    }

    fn nested(
        &mut self,
        kind: BlockKind,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'t>) -> Result<(), GenerationError>,
    ) -> Result<&mut Composite, GenerationError> {
        let child = BlockBuilder::build(self.calls, self.ids, kind, attributes, body)?;
        let section = self.section_mut();
        section.push(Block::Composite(child));
        section
            .last_mut()
            .and_then(Block::as_composite_mut)
            .ok_or_else(|| GenerationError::configuration("nested block was not recorded"))
    }

    /// Adds a nested `sequence` block.
    ///
    /// # Errors
    ///
    /// Propagates errors from `body`.
    pub fn sequence(
        &mut self,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'t>) -> Result<(), GenerationError>,
    ) -> Result<&mut Composite, GenerationError> {
        self.nested(BlockKind::Sequence, attributes, body)
    }

    /// Adds a nested `atomic` block.
    ///
    /// # Errors
    ///
    /// Propagates errors from `body`.
    pub fn atomic(
        &mut self,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'t>) -> Result<(), GenerationError>,
    ) -> Result<&mut Composite, GenerationError> {
        self.nested(BlockKind::Atomic, attributes, body)
    }

    /// Adds a nested `iterate` block.
    ///
    /// # Errors
    ///
    /// Propagates errors from `body`.
    pub fn iterate(
        &mut self,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'t>) -> Result<(), GenerationError>,
    ) -> Result<&mut Composite, GenerationError> {
        self.nested(BlockKind::Iterate, attributes, body)
    }

    /// Adds a nested `block` with combinator and compositor.
    ///
    /// # Errors
    ///
    /// Propagates errors from `body`.
    pub fn block(
        &mut self,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'t>) -> Result<(), GenerationError>,
    ) -> Result<&mut Composite, GenerationError> {
        self.nested(BlockKind::Block, attributes, body)
    }

    fn in_section(
        &mut self,
        section: Section,
        body: impl FnOnce(&mut Self) -> Result<(), GenerationError>,
    ) -> Result<&mut Self, GenerationError> {
        let previous = mem::replace(&mut self.section, section);
        let result = body(self);
        self.section = previous;
        result?;
        Ok(self)
    }

    /// Adds fixed blocks emitted before every unit of this block.
    ///
    /// # Errors
    ///
    /// Propagates errors from `body`.
    pub fn prologue(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), GenerationError>,
    ) -> Result<&mut Self, GenerationError> {
        self.in_section(Section::Prologue, body)
    }

    /// Adds fixed blocks emitted after every unit of this block.
    ///
    /// # Errors
    ///
    /// Propagates errors from `body`.
    pub fn epilogue(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), GenerationError>,
    ) -> Result<&mut Self, GenerationError> {
        self.in_section(Section::Epilogue, body)
    }

    /// Defines a named label at this point of the stream.
    pub fn label(&mut self, name: &str) -> &mut Self {
        self.add_child(Leaf::Label(LabelDef::Named(name.to_owned())))
    }

    /// Defines a reusable numeric label.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `id` is above 9.
    pub fn numeric_label(&mut self, id: u8) -> Result<&mut Self, GenerationError> {
        if id > 9 {
            return Err(GenerationError::configuration(format!(
                "numeric label {id} is outside 0..=9"
            )));
        }
        Ok(self.add_child(Leaf::Label(LabelDef::Numeric(id))))
    }

    fn request(
        &mut self,
        kind: RecipeKind,
        target: InstructionCall,
        value: Argument,
        attributes: PrepareAttributes,
    ) -> Result<&mut Self, GenerationError> {
        if target.kind() != PrimitiveKind::Mode {
            return Err(ModelError::KindMismatch {
                name: target.name().to_owned(),
                expected: PrimitiveKind::Mode,
                found: target.kind(),
            }
            .into());
        }
        if !matches!(value, Argument::Int(_) | Argument::Lazy(_)) {
            return Err(GenerationError::configuration(format!(
                "{kind} value must be an integer or lazy value, got {value:?}"
            )));
        }
        Ok(self.add_child(Leaf::Prepare(PrepareRequest {
            kind,
            target,
            value,
            attributes,
        })))
    }

    /// Requests that `target` be set to `value` at this point.
    ///
    /// # Errors
    ///
    /// Returns an error when `target` is not an addressing mode or `value` is
    /// not an integer or lazy value.
    pub fn prepare(
        &mut self,
        target: InstructionCall,
        value: impl Into<Argument>,
        attributes: PrepareAttributes,
    ) -> Result<&mut Self, GenerationError> {
        self.request(RecipeKind::Preparator, target, value.into(), attributes)
    }

    /// Requests that `target` be checked against `value` at this point.
    ///
    /// # Errors
    ///
    /// Same as [`BlockBuilder::prepare`].
    pub fn compare(
        &mut self,
        target: InstructionCall,
        value: impl Into<Argument>,
        attributes: PrepareAttributes,
    ) -> Result<&mut Self, GenerationError> {
        self.request(RecipeKind::Comparator, target, value.into(), attributes)
    }

    /// Returns `index` to its pool when the stream reaches this point.
    pub fn free_register(&mut self, allocator: Option<&str>, index: u32) -> &mut Self {
        self.add_child(Leaf::Free {
            allocator: allocator.map(str::to_owned),
            index,
        })
    }

    /// Returns every register of a pool when the stream reaches this point.
    pub fn free_all_registers(&mut self, allocator: Option<&str>) -> &mut Self {
        self.add_child(Leaf::FreeAll {
            allocator: allocator.map(str::to_owned),
        })
    }
}
