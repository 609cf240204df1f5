//! Block-composition engine for generating processor test sequences.

/// Error taxonomy shared by construction and expansion.
pub mod error;
pub use error::{ErrorKind, ErrorPhase, GenerationError};

/// Run-level configuration defaults.
pub mod config;
pub use config::{GeneratorConfig, DEFAULT_ALLOCATOR, DEFAULT_PREPARATOR_DEPTH, DEFAULT_SEED};

/// String-keyed attribute values and shape-checked readers.
pub mod attr;
pub use attr::AttributeValue;

/// Instruction-set model interface and the call lookup table built from it.
pub mod model;
pub use model::{CallRegistry, InstructionSetModel, ModelError, PrimitiveKind, Signature};

/// Abstract and concrete call representations.
pub mod call;
pub use call::{
    Argument, Arguments, ConcreteCall, InstructionCall, LabelOperand, LabelRef, LabelTarget,
    Operand,
};

/// Lazy values, distributions and fixed-width bit values.
pub mod value;
pub use value::{BitValue, Distribution, LazyValue, Variate};

/// Register pools and unknown-immediate placeholders.
pub mod allocator;
pub use allocator::{
    AllocationPolicy, AllocationRequest, Allocator, AllocatorSet, RegisterState,
    UnknownImmediate,
};

/// Preparator and comparator recipes with their registry.
pub mod preparator;
pub use preparator::{
    ArgumentConstraint, CallTemplate, Mask, PreparatorRegistry, Recipe, RecipeBuilder,
    RecipeHeader, RecipeKind, RecipeStep, StepBuilder, TemplateArg, Variant, VariantAttributes,
};

/// Block tree model, attributes and builders.
pub mod block;
pub use block::{
    Block, BlockAttributes, BlockBuilder, BlockId, BlockKind, Combinator, Composite, Compositor,
    LabelDef, Leaf, Obfuscator, Permutator, Pin, PrepareAttributes, PrepareRequest, Rearranger,
};

/// Expansion engine: combinators, compositors and unit transforms.
mod engine;

/// Final label resolution pass.
mod label;

/// Per-run mutable state.
pub mod context;
pub use context::Context;

/// Generated sequences and the output sink interface.
pub mod sequence;
pub use sequence::{LabelMark, Sequence, SequenceSink};

/// Template: model binding, registries and the run driver.
pub mod template;
pub use template::Template;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
