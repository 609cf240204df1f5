//! General-purpose register naming.

/// Number of general-purpose registers.
pub const REGISTER_COUNT: u32 = 32;

/// Width of a register value in bits.
pub const WORD_BITS: u32 = 32;

/// Hard-wired zero register.
pub const ZERO: u32 = 0;

/// Assembler temporary, used by comparators.
pub const AT: u32 = 1;

/// Conventional aliases, indexed by register number.
pub const ALIASES: [&str; REGISTER_COUNT as usize] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp", "fp",
    "ra",
];

/// Alias of register `index`.
#[must_use]
pub fn alias(index: u32) -> Option<&'static str> {
    ALIASES.get(usize::try_from(index).ok()?).copied()
}

/// Register number for an alias or number, with or without a leading `$`.
#[must_use]
pub fn index_of(name: &str) -> Option<u32> {
    let name = name.strip_prefix('$').unwrap_or(name);
    if let Ok(index) = name.parse::<u32>() {
        return (index < REGISTER_COUNT).then_some(index);
    }
    ALIASES
        .iter()
        .position(|&alias| alias == name)
        .and_then(|index| u32::try_from(index).ok())
}
