use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use strum::{Display, EnumString, IntoStaticStr};

use crate::attr::{self, AttributeValue};
use crate::error::GenerationError;

/// Allocation state of one register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterState {
    /// Available for allocation.
    Free,
    /// Handed out and not yet released.
    InUse,
}

/// How an allocator picks among eligible free registers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AllocationPolicy {
    /// Lowest eligible index.
    #[default]
    LowestFree,
    /// Uniform choice among eligible indices.
    RandomFree,
}

/// Named pool of register indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocator {
    name: String,
    states: Vec<RegisterState>,
    policy: AllocationPolicy,
}

impl Allocator {
    /// Creates a pool with every register free.
    #[must_use]
    pub fn new(name: impl Into<String>, size: u32, policy: AllocationPolicy) -> Self {
        Self {
            name: name.into(),
            states: vec![RegisterState::Free; size as usize],
            policy,
        }
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registers in the pool.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn size(&self) -> u32 {
        self.states.len() as u32
    }

    /// Selection policy.
    #[must_use]
    pub const fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// State of `index`, or `None` past the end of the pool.
    #[must_use]
    pub fn state(&self, index: u32) -> Option<RegisterState> {
        self.states.get(index as usize).copied()
    }

    /// Number of free registers.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.states
            .iter()
            .filter(|&&state| state == RegisterState::Free)
            .count()
    }

    /// Marks a free register not in `exclude` as in use and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Exhaustion`] when no register is eligible.
    #[allow(clippy::cast_possible_truncation)]
    pub fn allocate<R: Rng + ?Sized>(
        &mut self,
        exclude: &[u32],
        rng: &mut R,
    ) -> Result<u32, GenerationError> {
        let eligible: Vec<u32> = self
            .states
            .iter()
            .enumerate()
            .filter(|(index, &state)| {
                state == RegisterState::Free && !exclude.contains(&(*index as u32))
            })
            .map(|(index, _)| index as u32)
            .collect();
        let chosen = match self.policy {
            AllocationPolicy::LowestFree => eligible.first().copied(),
            AllocationPolicy::RandomFree => eligible.choose(rng).copied(),
        }
        .ok_or_else(|| GenerationError::Exhaustion {
            allocator: self.name.clone(),
        })?;
        self.states[chosen as usize] = RegisterState::InUse;
        tracing::trace!(allocator = %self.name, index = chosen, "allocated register");
        Ok(chosen)
    }

    /// Marks a specific register as in use.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `index` is outside the pool.
    pub fn reserve(&mut self, index: u32) -> Result<(), GenerationError> {
        *self.slot(index)? = RegisterState::InUse;
        Ok(())
    }

    /// Returns `index` to the free state.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `index` is outside the pool.
    pub fn free(&mut self, index: u32) -> Result<(), GenerationError> {
        *self.slot(index)? = RegisterState::Free;
        Ok(())
    }

    /// Returns every register to the free state.
    pub fn free_all(&mut self) {
        self.states.fill(RegisterState::Free);
    }

    fn slot(&mut self, index: u32) -> Result<&mut RegisterState, GenerationError> {
        let size = self.states.len();
        self.states.get_mut(index as usize).ok_or_else(|| {
            GenerationError::configuration(format!(
                "register {index} is outside allocator '{}' of size {size}",
                self.name
            ))
        })
    }
}

/// Allocators of one run, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatorSet {
    pools: BTreeMap<String, Allocator>,
}

impl AllocatorSet {
    /// Adds or replaces a pool.
    pub fn declare(&mut self, allocator: Allocator) {
        self.pools.insert(allocator.name.clone(), allocator);
    }

    /// Pool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Allocator> {
        self.pools.get(name)
    }

    /// Mutable pool by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Allocator> {
        self.pools.get_mut(name)
    }

    /// Pool by name, created with `make` on first use.
    pub fn get_or_insert_with(
        &mut self,
        name: &str,
        make: impl FnOnce() -> Result<Allocator, GenerationError>,
    ) -> Result<&mut Allocator, GenerationError> {
        if !self.pools.contains_key(name) {
            let allocator = make()?;
            tracing::debug!(allocator = name, size = allocator.size(), "created allocator on first use");
            self.pools.insert(name.to_owned(), allocator);
        }
        self.pools
            .get_mut(name)
            .ok_or_else(|| GenerationError::configuration(format!("unknown allocator '{name}'")))
    }

    /// Pool names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }
}

/// Constraints for resolving an [`UnknownImmediate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Pool name; the configured default pool when `None`.
    pub allocator: Option<String>,
    /// Indices never handed out for this request.
    pub exclude: Vec<u32>,
    /// Keep the register in use after the enclosing block finishes.
    pub retain: bool,
}

impl AllocationRequest {
    /// Request against the default pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the named pool.
    #[must_use]
    pub fn allocator(mut self, name: impl Into<String>) -> Self {
        self.allocator = Some(name.into());
        self
    }

    /// Excludes indices from the choice.
    #[must_use]
    pub fn exclude(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.exclude.extend(indices);
        self
    }

    /// Keeps the register allocated past the enclosing block.
    #[must_use]
    pub const fn retain(mut self) -> Self {
        self.retain = true;
        self
    }

    /// Parses `allocator`, `exclude` and `retain` attributes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown keys and a type mismatch for
    /// values of the wrong shape.
    pub fn parse<'a>(
        pairs: impl IntoIterator<Item = (&'a str, AttributeValue)>,
    ) -> Result<Self, GenerationError> {
        let mut request = Self::new();
        for (key, value) in pairs {
            match key {
                "allocator" => request.allocator = Some(attr::expect_str(key, &value)?.to_owned()),
                "exclude" => {
                    for item in attr::expect_list(key, &value)? {
                        let index = attr::expect_int(key, item)?;
                        let index = u32::try_from(index).map_err(|_| {
                            GenerationError::configuration(format!(
                                "excluded register {index} is negative or too large"
                            ))
                        })?;
                        request.exclude.push(index);
                    }
                }
                "retain" => request.retain = attr::expect_bool(key, &value)?,
                other => return Err(attr::unknown_key("allocation", other)),
            }
        }
        Ok(request)
    }
}

/// Register placeholder resolved by an allocator at expansion time.
///
/// Clones are the same placeholder: within one draw they all resolve to the
/// same index.
#[derive(Clone)]
pub struct UnknownImmediate {
    request: Arc<AllocationRequest>,
}

impl UnknownImmediate {
    /// New placeholder with its own identity.
    #[must_use]
    pub fn new(request: AllocationRequest) -> Self {
        Self {
            request: Arc::new(request),
        }
    }

    /// Allocation constraints.
    #[must_use]
    pub fn request(&self) -> &AllocationRequest {
        &self.request
    }

    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.request) as usize
    }
}

impl fmt::Debug for UnknownImmediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnknownImmediate").field(&*self.request).finish()
    }
}

impl PartialEq for UnknownImmediate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.request, &other.request)
    }
}
