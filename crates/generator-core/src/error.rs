use thiserror::Error;

use crate::model::ModelError;
use crate::preparator::RecipeKind;

/// Error classes used by callers to decide how much of a run survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown or invalid attribute, transform name, primitive or recipe.
    Configuration,
    /// Attribute value of the wrong shape.
    TypeMismatch,
    /// Allocator had no eligible free register.
    Exhaustion,
    /// No preparator or comparator recipe matched a request.
    UnresolvedPreparator,
    /// Dangling label reference at finalize time.
    UnresolvedLabel,
}

/// Point in the generation pipeline where an error is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorPhase {
    /// Block tree or registry construction; aborts the whole run.
    Construction,
    /// Expansion of one draw; earlier delivered sequences stay delivered.
    Expansion,
}

/// Stable error taxonomy for template construction and sequence expansion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Unknown attribute key, transform name, or malformed declaration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The instruction-set model rejected a call.
    #[error("invalid call: {0}")]
    Model(#[from] ModelError),
    /// Attribute value has the wrong shape.
    #[error("attribute '{key}' expects {expected}, found {found}")]
    TypeMismatch {
        /// Attribute key.
        key: String,
        /// Expected value shape.
        expected: &'static str,
        /// Shape actually supplied.
        found: &'static str,
    },
    /// Allocation found no free register matching the constraints.
    #[error("allocator '{allocator}' has no eligible free register")]
    Exhaustion {
        /// Allocator pool name.
        allocator: String,
    },
    /// No recipe could materialize a register value.
    #[error("no suitable {recipe} for {target} with value {value}: {reason}")]
    UnresolvedPreparator {
        /// Preparator or comparator.
        recipe: RecipeKind,
        /// Rendered target primitive.
        target: String,
        /// Rendered value.
        value: String,
        /// Why resolution stopped.
        reason: String,
    },
    /// A label reference had no matching definition.
    #[error("unresolved label reference '{reference}'")]
    UnresolvedLabel {
        /// Rendered reference (`name`, `1f`, `1b`).
        reference: String,
    },
}

impl GenerationError {
    /// Shorthand for a [`GenerationError::Configuration`] error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns the error class.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::Model(_) => ErrorKind::Configuration,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Exhaustion { .. } => ErrorKind::Exhaustion,
            Self::UnresolvedPreparator { .. } => ErrorKind::UnresolvedPreparator,
            Self::UnresolvedLabel { .. } => ErrorKind::UnresolvedLabel,
        }
    }

    /// Returns the pipeline phase this error class belongs to.
    #[must_use]
    pub const fn phase(&self) -> ErrorPhase {
        match self.kind() {
            ErrorKind::Configuration | ErrorKind::TypeMismatch => ErrorPhase::Construction,
            ErrorKind::Exhaustion
            | ErrorKind::UnresolvedPreparator
            | ErrorKind::UnresolvedLabel => ErrorPhase::Expansion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ErrorPhase, GenerationError};
    use crate::model::ModelError;
    use crate::preparator::RecipeKind;

    #[test]
    fn construction_errors_abort_before_output() {
        let config = GenerationError::configuration("unknown combinator 'zip'");
        assert_eq!(config.kind(), ErrorKind::Configuration);
        assert_eq!(config.phase(), ErrorPhase::Construction);

        let mismatch = GenerationError::TypeMismatch {
            key: "arguments".into(),
            expected: "a mapping",
            found: "a string",
        };
        assert_eq!(mismatch.phase(), ErrorPhase::Construction);
    }

    #[test]
    fn model_errors_are_configuration_errors() {
        let error: GenerationError = ModelError::UnknownPrimitive("frob".into()).into();
        assert_eq!(error.kind(), ErrorKind::Configuration);
        assert_eq!(
            error.to_string(),
            "invalid call: unknown operation or addressing mode 'frob'"
        );
    }

    #[test]
    fn expansion_errors_keep_delivered_output() {
        let exhausted = GenerationError::Exhaustion {
            allocator: "REG".into(),
        };
        assert_eq!(exhausted.phase(), ErrorPhase::Expansion);

        let unresolved = GenerationError::UnresolvedPreparator {
            recipe: RecipeKind::Comparator,
            target: "REG(3)".into(),
            value: "0x0000002A".into(),
            reason: "no matching recipe".into(),
        };
        assert_eq!(unresolved.kind(), ErrorKind::UnresolvedPreparator);
        assert_eq!(
            unresolved.to_string(),
            "no suitable comparator for REG(3) with value 0x0000002A: no matching recipe"
        );

        let label = GenerationError::UnresolvedLabel {
            reference: "1f".into(),
        };
        assert_eq!(label.phase(), ErrorPhase::Expansion);
    }
}
