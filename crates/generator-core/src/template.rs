use std::cell::Cell;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::allocator::{AllocationPolicy, Allocator, AllocatorSet};
use crate::block::{Block, BlockAttributes, BlockBuilder, BlockKind};
use crate::config::GeneratorConfig;
use crate::context::Context;
use crate::engine::{self, Unit};
use crate::error::GenerationError;
use crate::label;
use crate::model::{CallRegistry, InstructionSetModel};
use crate::preparator::{PreparatorRegistry, RecipeBuilder, RecipeHeader, RecipeKind};
use crate::sequence::{Sequence, SequenceSink};

/// A test template bound to one instruction-set model.
///
/// Construction methods (`sequence`, `preparator`, `mode_allocator`, ...)
/// validate eagerly and fail with construction-phase errors. [`Template::run`]
/// expands a finished root block; every run starts from a fresh [`Context`]
/// seeded from [`GeneratorConfig::seed`], so repeated runs with the same seed
/// produce identical output.
#[derive(Debug)]
pub struct Template {
    calls: CallRegistry,
    config: GeneratorConfig,
    preparators: PreparatorRegistry,
    allocators: AllocatorSet,
    externals: BTreeSet<String>,
    next_id: Cell<u64>,
}

impl Template {
    /// Binds a template to `model`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the model enumerates a name twice
    /// or lacks a signature for an enumerated name.
    pub fn new(
        model: Arc<dyn InstructionSetModel>,
        config: GeneratorConfig,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            calls: CallRegistry::from_model(model)?,
            config,
            preparators: PreparatorRegistry::default(),
            allocators: AllocatorSet::default(),
            externals: BTreeSet::new(),
            next_id: Cell::new(0),
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Name lookup table built from the model.
    #[must_use]
    pub const fn calls(&self) -> &CallRegistry {
        &self.calls
    }

    /// Registered preparators and comparators.
    #[must_use]
    pub const fn preparators(&self) -> &PreparatorRegistry {
        &self.preparators
    }

    fn composite(
        &self,
        kind: BlockKind,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'_>) -> Result<(), GenerationError>,
    ) -> Result<Block, GenerationError> {
        BlockBuilder::build(&self.calls, &self.next_id, kind, attributes, body).map(Block::from)
    }

    /// Builds a `sequence` block: children concatenated in order.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while building the body.
    pub fn sequence(
        &self,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'_>) -> Result<(), GenerationError>,
    ) -> Result<Block, GenerationError> {
        self.composite(BlockKind::Sequence, attributes, body)
    }

    /// Builds an `atomic` block: like `sequence`, never split by transforms.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while building the body.
    pub fn atomic(
        &self,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'_>) -> Result<(), GenerationError>,
    ) -> Result<Block, GenerationError> {
        self.composite(BlockKind::Atomic, attributes, body)
    }

    /// Builds an `iterate` block: children drawn round-robin.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while building the body.
    pub fn iterate(
        &self,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'_>) -> Result<(), GenerationError>,
    ) -> Result<Block, GenerationError> {
        self.composite(BlockKind::Iterate, attributes, body)
    }

    /// Builds a `block`: children combined and merged per its attributes.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while building the body.
    pub fn block(
        &self,
        attributes: BlockAttributes,
        body: impl FnOnce(&mut BlockBuilder<'_>) -> Result<(), GenerationError>,
    ) -> Result<Block, GenerationError> {
        self.composite(BlockKind::Block, attributes, body)
    }

    fn recipe(
        &mut self,
        kind: RecipeKind,
        header: RecipeHeader,
        body: impl FnOnce(&mut RecipeBuilder<'_>) -> Result<(), GenerationError>,
    ) -> Result<&mut Self, GenerationError> {
        let mut builder = RecipeBuilder::new(&self.calls);
        body(&mut builder)?;
        let recipe = builder.finish(kind, header)?;
        self.preparators.register(&self.calls, recipe)?;
        Ok(self)
    }

    /// Registers a recipe that sets a register to a value.
    ///
    /// # Errors
    ///
    /// Returns a construction error for an invalid target, body or variant
    /// set.
    pub fn preparator(
        &mut self,
        header: RecipeHeader,
        body: impl FnOnce(&mut RecipeBuilder<'_>) -> Result<(), GenerationError>,
    ) -> Result<&mut Self, GenerationError> {
        self.recipe(RecipeKind::Preparator, header, body)
    }

    /// Registers a recipe that checks a register against a value.
    ///
    /// # Errors
    ///
    /// Same as [`Template::preparator`].
    pub fn comparator(
        &mut self,
        header: RecipeHeader,
        body: impl FnOnce(&mut RecipeBuilder<'_>) -> Result<(), GenerationError>,
    ) -> Result<&mut Self, GenerationError> {
        self.recipe(RecipeKind::Comparator, header, body)
    }

    /// Declares an allocator over the register mode `name`, sized from the
    /// mode's register count.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `name` is not a register mode.
    pub fn mode_allocator(
        &mut self,
        name: &str,
        policy: Option<AllocationPolicy>,
    ) -> Result<&mut Self, GenerationError> {
        let size = self
            .calls
            .signature(name)
            .and_then(|signature| signature.register_count)
            .ok_or_else(|| {
                GenerationError::configuration(format!("'{name}' is not a register mode"))
            })?;
        let policy = policy.unwrap_or(self.config.allocation_policy);
        tracing::debug!(allocator = name, size, %policy, "declared allocator");
        self.allocators.declare(Allocator::new(name, size, policy));
        Ok(self)
    }

    /// Declares a label that is defined outside generated sequences.
    pub fn declare_external_label(&mut self, name: impl Into<String>) -> &mut Self {
        self.externals.insert(name.into());
        self
    }

    /// Fresh per-run context over this template's registries.
    #[must_use]
    pub fn new_context(&self) -> Context<'_> {
        Context::new(
            &self.calls,
            &self.config,
            &self.preparators,
            self.allocators.clone(),
        )
    }

    /// Expands `root` into `count` sequences, delivering each to `sink` as
    /// soon as it is finished. Returns the number delivered.
    ///
    /// # Errors
    ///
    /// Returns the first expansion error; sequences delivered before it stay
    /// delivered.
    pub fn run(
        &self,
        root: &Block,
        count: usize,
        sink: &mut dyn SequenceSink,
    ) -> Result<usize, GenerationError> {
        let natural = engine::root_natural_count(root);
        tracing::debug!(count, natural, seed = self.config.seed, "starting run");
        let mut ctx = self.new_context();
        for draw in 0..count {
            if draw == natural {
                tracing::debug!(draw, natural, "exhausted distinct expansions; cycling");
            }
            ctx.begin_draw();
            let units = engine::emit_root(&mut ctx, root, draw)?;
            let items = units.into_iter().flat_map(|unit: Unit| unit.items).collect();
            let sequence = label::resolve(items, &self.externals)?;
            ctx.end_draw()?;
            sink.accept_sequence(sequence);
        }
        Ok(count)
    }

    /// Expands `root` into `count` sequences and collects them.
    ///
    /// # Errors
    ///
    /// Same as [`Template::run`].
    pub fn generate(&self, root: &Block, count: usize) -> Result<Vec<Sequence>, GenerationError> {
        let mut sequences = Vec::with_capacity(count);
        self.run(root, count, &mut sequences)?;
        Ok(sequences)
    }
}
