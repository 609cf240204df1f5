use generator_core::{
    Argument, BlockBuilder, GenerationError, InstructionCall, InstructionSetModel, Signature,
};

use crate::isa::{self, OPERATIONS};
use crate::registers::{REGISTER_COUNT, WORD_BITS};

/// Name of the general-purpose register addressing mode.
pub const REGISTER_MODE: &str = "REG";

/// MiniMIPS instruction-set model: the operation table plus one register
/// addressing mode `REG(i)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MiniMips;

impl InstructionSetModel for MiniMips {
    fn enumerate_operations(&self) -> Vec<String> {
        OPERATIONS.iter().map(|entry| entry.name.to_owned()).collect()
    }

    fn enumerate_addressing_modes(&self) -> Vec<String> {
        vec![REGISTER_MODE.to_owned()]
    }

    fn signature(&self, name: &str) -> Option<Signature> {
        if name == REGISTER_MODE {
            return Some(Signature::register_mode(&["i"], WORD_BITS, REGISTER_COUNT));
        }
        isa::lookup(name)
            .filter(|entry| entry.name == name)
            .map(|entry| Signature::operation(entry.format.parameters()))
    }
}

/// Builds `REG(index)`; `index` may be a number or a placeholder.
///
/// # Errors
///
/// Returns a model error when the builder's template was not built from
/// [`MiniMips`].
pub fn reg(
    builder: &BlockBuilder<'_>,
    index: impl Into<Argument>,
) -> Result<InstructionCall, GenerationError> {
    builder.mode(REGISTER_MODE, [index.into()])
}
