use crate::allocator::AllocationPolicy;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x5EED_0001;

/// Allocator pool used by placeholders that name none.
pub const DEFAULT_ALLOCATOR: &str = "REG";

/// Nesting limit for recipes that prepare through other recipes.
pub const DEFAULT_PREPARATOR_DEPTH: usize = 16;

/// Run-level configuration shared by every draw of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GeneratorConfig {
    /// Seed for the per-run random number generator.
    pub seed: u64,
    /// Pool used by `UnknownImmediate` placeholders without an allocator name.
    pub default_allocator: String,
    /// Policy for pools created on first use.
    pub allocation_policy: AllocationPolicy,
    /// Maximum nesting of `prepare` steps inside recipe bodies.
    pub max_preparator_depth: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            default_allocator: DEFAULT_ALLOCATOR.to_owned(),
            allocation_policy: AllocationPolicy::default(),
            max_preparator_depth: DEFAULT_PREPARATOR_DEPTH,
        }
    }
}

impl GeneratorConfig {
    /// Returns this configuration with a different seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns this configuration with a different default allocator.
    #[must_use]
    pub fn with_default_allocator(mut self, name: impl Into<String>) -> Self {
        self.default_allocator = name.into();
        self
    }

    /// Returns this configuration with a different allocation policy.
    #[must_use]
    pub const fn with_allocation_policy(mut self, policy: AllocationPolicy) -> Self {
        self.allocation_policy = policy;
        self
    }

    /// Returns this configuration with a different preparator depth limit.
    #[must_use]
    pub const fn with_max_preparator_depth(mut self, depth: usize) -> Self {
        self.max_preparator_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{GeneratorConfig, DEFAULT_ALLOCATOR, DEFAULT_PREPARATOR_DEPTH, DEFAULT_SEED};
    use crate::allocator::AllocationPolicy;

    #[test]
    fn default_config_matches_documented_constants() {
        let config = GeneratorConfig::default();
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.default_allocator, DEFAULT_ALLOCATOR);
        assert_eq!(config.allocation_policy, AllocationPolicy::LowestFree);
        assert_eq!(config.max_preparator_depth, DEFAULT_PREPARATOR_DEPTH);
    }

    #[test]
    fn builders_override_single_fields() {
        let config = GeneratorConfig::default()
            .with_seed(7)
            .with_default_allocator("GPR")
            .with_allocation_policy(AllocationPolicy::RandomFree)
            .with_max_preparator_depth(2);
        assert_eq!(config.seed, 7);
        assert_eq!(config.default_allocator, "GPR");
        assert_eq!(config.allocation_policy, AllocationPolicy::RandomFree);
        assert_eq!(config.max_preparator_depth, 2);
    }
}
