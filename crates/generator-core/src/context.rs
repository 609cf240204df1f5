use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::allocator::{AllocationPolicy, Allocator, AllocatorSet, UnknownImmediate};
use crate::block::BlockId;
use crate::call::{Argument, ConcreteCall, InstructionCall, LabelOperand, Operand};
use crate::config::GeneratorConfig;
use crate::engine::unit::Scope;
use crate::error::GenerationError;
use crate::model::CallRegistry;
use crate::preparator::PreparatorRegistry;
use crate::value::{LazyCache, LazyValue};

/// Mutable state of one run: random source, allocators and per-draw caches.
///
/// Every run starts from a fresh context seeded from the configuration, so
/// runs never observe each other's allocations or draws.
#[derive(Debug)]
pub struct Context<'t> {
    calls: &'t CallRegistry,
    config: &'t GeneratorConfig,
    preparators: &'t PreparatorRegistry,
    allocators: AllocatorSet,
    rng: StdRng,
    lazy: LazyCache,
    placeholders: HashMap<usize, u32>,
    frames: Vec<Vec<Held>>,
    scopes: Vec<Scope>,
}

/// Non-retained placeholder register owned by a block frame.
#[derive(Debug)]
struct Held {
    allocator: String,
    index: u32,
    key: usize,
}

fn pool<'a>(
    allocators: &'a mut AllocatorSet,
    calls: &CallRegistry,
    policy: AllocationPolicy,
    name: &str,
) -> Result<&'a mut Allocator, GenerationError> {
    allocators.get_or_insert_with(name, || {
        let size = calls
            .signature(name)
            .and_then(|signature| signature.register_count)
            .ok_or_else(|| {
                GenerationError::configuration(format!(
                    "unknown allocator '{name}': no register mode of that name"
                ))
            })?;
        Ok(Allocator::new(name, size, policy))
    })
}

impl<'t> Context<'t> {
    /// Fresh context over the template's registries and declared allocators.
    #[must_use]
    pub fn new(
        calls: &'t CallRegistry,
        config: &'t GeneratorConfig,
        preparators: &'t PreparatorRegistry,
        allocators: AllocatorSet,
    ) -> Self {
        Self {
            calls,
            config,
            preparators,
            allocators,
            rng: StdRng::seed_from_u64(config.seed),
            lazy: LazyCache::default(),
            placeholders: HashMap::new(),
            frames: vec![Vec::new()],
            scopes: vec![Arc::from(Vec::new())],
        }
    }

    pub(crate) const fn calls(&self) -> &'t CallRegistry {
        self.calls
    }

    pub(crate) const fn config(&self) -> &'t GeneratorConfig {
        self.config
    }

    pub(crate) const fn preparators(&self) -> &'t PreparatorRegistry {
        self.preparators
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Allocators created so far.
    #[must_use]
    pub const fn allocators(&self) -> &AllocatorSet {
        &self.allocators
    }

    fn pool_name(&self, allocator: Option<&str>) -> String {
        allocator.map_or_else(|| self.config.default_allocator.clone(), str::to_owned)
    }

    /// Takes a register from a pool. The caller owns it until it is freed.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Exhaustion`] when no eligible register is
    /// free, or a configuration error for unknown pools.
    pub fn get_register(&mut self, allocator: Option<&str>, exclude: &[u32]) -> Result<u32, GenerationError> {
        let name = self.pool_name(allocator);
        pool(&mut self.allocators, self.calls, self.config.allocation_policy, &name)?
            .allocate(exclude, &mut self.rng)
    }

    /// Returns one register to its pool.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown pools or out-of-range indices.
    pub fn free_register(&mut self, allocator: Option<&str>, index: u32) -> Result<(), GenerationError> {
        let name = self.pool_name(allocator);
        tracing::debug!(allocator = %name, index, "freeing register");
        pool(&mut self.allocators, self.calls, self.config.allocation_policy, &name)?.free(index)
    }

    /// Returns every register of a pool.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown pools.
    pub fn free_all_registers(&mut self, allocator: Option<&str>) -> Result<(), GenerationError> {
        let name = self.pool_name(allocator);
        tracing::debug!(allocator = %name, "freeing all registers");
        pool(&mut self.allocators, self.calls, self.config.allocation_policy, &name)?.free_all();
        Ok(())
    }

    /// Resolves a lazy value; repeated calls within a draw agree.
    pub fn resolve_lazy(&mut self, value: &LazyValue) -> i64 {
        value.evaluate(&mut self.lazy, &mut self.rng)
    }

    pub(crate) fn resolve_unknown(&mut self, unknown: &UnknownImmediate) -> Result<u32, GenerationError> {
        if let Some(index) = self.placeholders.get(&unknown.key()) {
            return Ok(*index);
        }
        let request = unknown.request();
        let name = self.pool_name(request.allocator.as_deref());
        let index = pool(&mut self.allocators, self.calls, self.config.allocation_policy, &name)?
            .allocate(&request.exclude, &mut self.rng)?;
        tracing::debug!(allocator = %name, index, retain = request.retain, "resolved placeholder");
        if !request.retain {
            if let Some(frame) = self.frames.last_mut() {
                frame.push(Held {
                    allocator: name,
                    index,
                    key: unknown.key(),
                });
            }
        }
        self.placeholders.insert(unknown.key(), index);
        Ok(index)
    }

    pub(crate) fn resolve_argument(&mut self, argument: &Argument) -> Result<Operand, GenerationError> {
        Ok(match argument {
            Argument::Int(value) => Operand::Int(*value),
            Argument::Str(text) => Operand::Str(text.clone()),
            Argument::Mode(call) => Operand::Mode(Box::new(self.concretize(call)?)),
            Argument::Lazy(value) => Operand::Int(self.resolve_lazy(value)),
            Argument::Unknown(unknown) => Operand::Int(i64::from(self.resolve_unknown(unknown)?)),
            Argument::Label(reference) => Operand::Label(LabelOperand {
                reference: reference.clone(),
                target: None,
            }),
        })
    }

    pub(crate) fn concretize(&mut self, call: &InstructionCall) -> Result<ConcreteCall, GenerationError> {
        let arguments = call
            .arguments()
            .try_map(|argument| self.resolve_argument(argument))?;
        Ok(ConcreteCall::new(call.name(), call.kind(), arguments))
    }

    pub(crate) fn value_width(&self, target: &ConcreteCall) -> Result<u32, GenerationError> {
        self.calls
            .signature(target.name())
            .and_then(|signature| signature.value_width)
            .ok_or_else(|| {
                GenerationError::configuration(format!("'{}' does not hold a value", target.name()))
            })
    }

    pub(crate) fn scope(&self) -> Scope {
        self.scopes.last().cloned().unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub(crate) fn enter(&mut self, id: BlockId) {
        let mut path = self.scope().to_vec();
        path.push(id);
        self.scopes.push(Arc::from(path));
        self.frames.push(Vec::new());
    }

    pub(crate) fn leave(&mut self) -> Result<(), GenerationError> {
        self.scopes.pop();
        let frame = self.frames.pop().unwrap_or_default();
        self.release(frame)
    }

    /// Frees a frame's registers. Their placeholders forget the index, so a
    /// later use allocates again instead of aliasing a reissued register.
    fn release(&mut self, frame: Vec<Held>) -> Result<(), GenerationError> {
        for held in frame {
            self.placeholders.remove(&held.key);
            if let Some(allocator) = self.allocators.get_mut(&held.allocator) {
                allocator.free(held.index)?;
            }
        }
        Ok(())
    }

    pub(crate) fn begin_draw(&mut self) {
        self.lazy.clear();
        self.placeholders.clear();
        self.scopes.truncate(1);
        self.frames.truncate(1);
    }

    pub(crate) fn end_draw(&mut self) -> Result<(), GenerationError> {
        let frame = self.frames.first_mut().map(std::mem::take).unwrap_or_default();
        self.release(frame)
    }
}
