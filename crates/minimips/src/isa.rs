//! MiniMIPS operation table.

use strum::{Display, IntoStaticStr};

/// Operand layout of an operation, which fixes its parameter names and the
/// assembly syntax used by the listing printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Format {
    /// `op rd, rs, rt`
    Register,
    /// `op rd, rt, sa`
    Shift,
    /// `op rt, rs, imm`
    Immediate,
    /// `op rt, imm`
    UpperImmediate,
    /// `op rt, offset(base)`
    Memory,
    /// `op rs, rt, target`
    Branch,
    /// `op target`
    Jump,
    /// `op`
    NoOperands,
}

impl Format {
    /// Parameter names in assembly order.
    #[must_use]
    pub const fn parameters(self) -> &'static [&'static str] {
        match self {
            Self::Register => &["rd", "rs", "rt"],
            Self::Shift => &["rd", "rt", "sa"],
            Self::Immediate => &["rt", "rs", "imm"],
            Self::UpperImmediate => &["rt", "imm"],
            Self::Memory => &["rt", "offset", "base"],
            Self::Branch => &["rs", "rt", "target"],
            Self::Jump => &["target"],
            Self::NoOperands => &[],
        }
    }
}

/// One row of the operation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationEntry {
    /// Lower-case mnemonic.
    pub name: &'static str,
    /// Primary opcode field.
    pub opcode: u8,
    /// Function field for `SPECIAL` encodings, zero otherwise.
    pub funct: u8,
    /// Operand layout.
    pub format: Format,
}

const fn op(name: &'static str, opcode: u8, funct: u8, format: Format) -> OperationEntry {
    OperationEntry {
        name,
        opcode,
        funct,
        format,
    }
}

/// Every operation of the model, in encoding order.
pub const OPERATIONS: &[OperationEntry] = &[
    op("nop", 0x00, 0x00, Format::NoOperands),
    op("sll", 0x00, 0x00, Format::Shift),
    op("srl", 0x00, 0x02, Format::Shift),
    op("add", 0x00, 0x20, Format::Register),
    op("addu", 0x00, 0x21, Format::Register),
    op("sub", 0x00, 0x22, Format::Register),
    op("and", 0x00, 0x24, Format::Register),
    op("or", 0x00, 0x25, Format::Register),
    op("xor", 0x00, 0x26, Format::Register),
    op("nor", 0x00, 0x27, Format::Register),
    op("slt", 0x00, 0x2A, Format::Register),
    op("j", 0x02, 0x00, Format::Jump),
    op("beq", 0x04, 0x00, Format::Branch),
    op("bne", 0x05, 0x00, Format::Branch),
    op("addi", 0x08, 0x00, Format::Immediate),
    op("andi", 0x0C, 0x00, Format::Immediate),
    op("ori", 0x0D, 0x00, Format::Immediate),
    op("xori", 0x0E, 0x00, Format::Immediate),
    op("lui", 0x0F, 0x00, Format::UpperImmediate),
    op("lw", 0x23, 0x00, Format::Memory),
    op("sw", 0x2B, 0x00, Format::Memory),
];

/// Looks up an operation by mnemonic, ASCII case-insensitively.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static OperationEntry> {
    OPERATIONS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{lookup, Format, OPERATIONS};

    #[test]
    fn mnemonics_are_unique() {
        let names: HashSet<_> = OPERATIONS.iter().map(|entry| entry.name).collect();
        assert_eq!(names.len(), OPERATIONS.len());
    }

    #[test]
    fn encodings_are_unique_apart_from_nop() {
        let encodings: HashSet<_> = OPERATIONS
            .iter()
            .filter(|entry| entry.name != "nop")
            .map(|entry| (entry.opcode, entry.funct))
            .collect();
        assert_eq!(encodings.len(), OPERATIONS.len() - 1);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("LUI").map(|entry| entry.format), Some(Format::UpperImmediate));
        assert_eq!(lookup("Bne").map(|entry| entry.format), Some(Format::Branch));
        assert!(lookup("mult").is_none());
    }

    #[test]
    fn formats_name_their_parameters() {
        assert_eq!(Format::Memory.parameters(), &["rt", "offset", "base"]);
        assert!(Format::NoOperands.parameters().is_empty());
        assert_eq!(Format::UpperImmediate.to_string(), "upper_immediate");
    }
}
