use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::call::{Argument, Arguments, InstructionCall};
use crate::error::GenerationError;

/// Whether a primitive is an operation or an addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Instruction operation such as `add`.
    Operation,
    /// Addressing mode such as `REG`.
    Mode,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation => f.write_str("operation"),
            Self::Mode => f.write_str("addressing mode"),
        }
    }
}

/// Errors raised by an instruction-set model while building calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Name is neither an operation nor an addressing mode.
    #[error("unknown operation or addressing mode '{0}'")]
    UnknownPrimitive(String),
    /// Positional argument count does not match the signature.
    #[error("'{name}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        /// Primitive name.
        name: String,
        /// Parameter count.
        expected: usize,
        /// Supplied argument count.
        found: usize,
    },
    /// Keyed argument names no parameter.
    #[error("'{name}' has no parameter named '{parameter}'")]
    UnknownParameter {
        /// Primitive name.
        name: String,
        /// Offending key.
        parameter: String,
    },
    /// Keyed argument list omits a parameter.
    #[error("'{name}' is missing argument '{parameter}'")]
    MissingParameter {
        /// Primitive name.
        name: String,
        /// Parameter without a value.
        parameter: String,
    },
    /// A primitive was used where the other kind is required.
    #[error("'{name}' is an {found}, expected an {expected}")]
    KindMismatch {
        /// Primitive name.
        name: String,
        /// Required kind.
        expected: PrimitiveKind,
        /// Actual kind.
        found: PrimitiveKind,
    },
}

/// Metadata describing one operation or addressing mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Operation or addressing mode.
    pub kind: PrimitiveKind,
    /// Parameter names in positional order.
    pub parameters: Vec<String>,
    /// Bit width of the value a register mode holds.
    pub value_width: Option<u32>,
    /// Number of registers addressable by a register mode.
    pub register_count: Option<u32>,
}

impl Signature {
    /// Builds an operation signature.
    #[must_use]
    pub fn operation(parameters: &[&str]) -> Self {
        Self {
            kind: PrimitiveKind::Operation,
            parameters: parameters.iter().map(|&p| p.to_owned()).collect(),
            value_width: None,
            register_count: None,
        }
    }

    /// Builds a plain addressing-mode signature.
    #[must_use]
    pub fn mode(parameters: &[&str]) -> Self {
        Self {
            kind: PrimitiveKind::Mode,
            ..Self::operation(parameters)
        }
    }

    /// Builds a register addressing-mode signature with value width and pool size.
    #[must_use]
    pub fn register_mode(parameters: &[&str], value_width: u32, register_count: u32) -> Self {
        Self {
            value_width: Some(value_width),
            register_count: Some(register_count),
            ..Self::mode(parameters)
        }
    }

    /// Position of a named parameter.
    #[must_use]
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p == name)
    }

    /// Checks an argument list against the parameter list.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ArityMismatch`] for positional lists of the wrong
    /// length, and [`ModelError::UnknownParameter`] or
    /// [`ModelError::MissingParameter`] for keyed lists that do not cover the
    /// parameters exactly.
    pub fn check_arguments<T>(&self, name: &str, arguments: &Arguments<T>) -> Result<(), ModelError> {
        match arguments {
            Arguments::Positional(values) => {
                if values.len() == self.parameters.len() {
                    Ok(())
                } else {
                    Err(ModelError::ArityMismatch {
                        name: name.to_owned(),
                        expected: self.parameters.len(),
                        found: values.len(),
                    })
                }
            }
            Arguments::Keyed(entries) => {
                if let Some((key, _)) = entries.iter().find(|(key, _)| self.parameter_index(key).is_none()) {
                    return Err(ModelError::UnknownParameter {
                        name: name.to_owned(),
                        parameter: key.clone(),
                    });
                }
                if let Some(missing) = self
                    .parameters
                    .iter()
                    .find(|p| !entries.iter().any(|(key, _)| key == *p))
                {
                    return Err(ModelError::MissingParameter {
                        name: name.to_owned(),
                        parameter: missing.clone(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Interface to the instruction-set model the engine generates for.
pub trait InstructionSetModel {
    /// Names of all operations.
    fn enumerate_operations(&self) -> Vec<String>;

    /// Names of all addressing modes.
    fn enumerate_addressing_modes(&self) -> Vec<String>;

    /// Metadata for an operation or addressing mode.
    fn signature(&self, name: &str) -> Option<Signature>;

    /// Builds a validated call from a name and arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the name is unknown or the arguments do not
    /// fit its signature.
    fn build_call(
        &self,
        name: &str,
        arguments: Arguments<Argument>,
    ) -> Result<InstructionCall, ModelError> {
        let signature = self
            .signature(name)
            .ok_or_else(|| ModelError::UnknownPrimitive(name.to_owned()))?;
        signature.check_arguments(name, &arguments)?;
        Ok(InstructionCall::new(name, signature.kind, arguments))
    }
}

/// Name to signature lookup table populated once from a model.
#[derive(Clone)]
pub struct CallRegistry {
    model: Arc<dyn InstructionSetModel>,
    entries: BTreeMap<String, Signature>,
}

impl fmt::Debug for CallRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRegistry")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CallRegistry {
    /// Enumerates the model and records every primitive signature.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an enumerated name has no
    /// signature, is listed twice, or is listed under the wrong kind.
    pub fn from_model(model: Arc<dyn InstructionSetModel>) -> Result<Self, GenerationError> {
        let mut entries = BTreeMap::new();
        let listed = model
            .enumerate_operations()
            .into_iter()
            .map(|name| (name, PrimitiveKind::Operation))
            .chain(
                model
                    .enumerate_addressing_modes()
                    .into_iter()
                    .map(|name| (name, PrimitiveKind::Mode)),
            );
        for (name, kind) in listed {
            let signature = model.signature(&name).ok_or_else(|| {
                GenerationError::configuration(format!("model lists '{name}' without a signature"))
            })?;
            if signature.kind != kind {
                return Err(ModelError::KindMismatch {
                    name,
                    expected: kind,
                    found: signature.kind,
                }
                .into());
            }
            if entries.insert(name.clone(), signature).is_some() {
                return Err(GenerationError::configuration(format!(
                    "model lists '{name}' more than once"
                )));
            }
        }
        Ok(Self { model, entries })
    }

    /// Signature of a registered primitive.
    #[must_use]
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.entries.get(name)
    }

    /// Registered operation names in sorted order.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.names_of(PrimitiveKind::Operation)
    }

    /// Registered addressing-mode names in sorted order.
    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.names_of(PrimitiveKind::Mode)
    }

    fn names_of(&self, kind: PrimitiveKind) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(_, signature)| signature.kind == kind)
            .map(|(name, _)| name.as_str())
    }

    /// Builds a call through the model after checking the name is registered.
    ///
    /// # Errors
    ///
    /// Returns a model error for unknown names or mismatched arguments.
    pub fn build(
        &self,
        name: &str,
        arguments: impl Into<Arguments<Argument>>,
    ) -> Result<InstructionCall, GenerationError> {
        if !self.entries.contains_key(name) {
            return Err(ModelError::UnknownPrimitive(name.to_owned()).into());
        }
        Ok(self.model.build_call(name, arguments.into())?)
    }

    /// Like [`CallRegistry::build`], but requires the primitive to be of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::KindMismatch`] when the primitive has the other kind.
    pub fn build_kind(
        &self,
        kind: PrimitiveKind,
        name: &str,
        arguments: impl Into<Arguments<Argument>>,
    ) -> Result<InstructionCall, GenerationError> {
        self.check_kind(kind, name)?;
        self.build(name, arguments)
    }

    /// Validates that `name` is registered with the given kind and returns its signature.
    ///
    /// # Errors
    ///
    /// Returns a model error for unknown names or the wrong kind.
    pub fn check_kind(&self, kind: PrimitiveKind, name: &str) -> Result<&Signature, GenerationError> {
        let signature = self
            .signature(name)
            .ok_or_else(|| ModelError::UnknownPrimitive(name.to_owned()))?;
        if signature.kind != kind {
            return Err(ModelError::KindMismatch {
                name: name.to_owned(),
                expected: kind,
                found: signature.kind,
            }
            .into());
        }
        Ok(signature)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Tiny model used by the crate's unit tests.

    use super::{InstructionSetModel, Signature};

    /// Three-operand toy ISA with a 16-register, 32-bit `R` mode.
    pub(crate) struct ToyModel;

    impl InstructionSetModel for ToyModel {
        fn enumerate_operations(&self) -> Vec<String> {
            ["A", "B", "C", "D", "E", "mov", "li", "shl", "br", "nop"]
                .iter()
                .map(|&s| s.to_owned())
                .collect()
        }

        fn enumerate_addressing_modes(&self) -> Vec<String> {
            vec!["R".to_owned(), "MEM".to_owned()]
        }

        fn signature(&self, name: &str) -> Option<Signature> {
            match name {
                "A" | "B" | "C" | "D" | "E" | "nop" => Some(Signature::operation(&[])),
                "mov" => Some(Signature::operation(&["dst", "src"])),
                "li" => Some(Signature::operation(&["dst", "imm"])),
                "shl" => Some(Signature::operation(&["dst", "amount"])),
                "br" => Some(Signature::operation(&["target"])),
                "R" => Some(Signature::register_mode(&["i"], 32, 16)),
                "MEM" => Some(Signature::mode(&["base", "offset"])),
                _ => None,
            }
        }
    }
}
