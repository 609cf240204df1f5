use std::fmt;
use std::str::FromStr;

use crate::error::GenerationError;
use crate::value::BitValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Nibble {
    Literal(u8),
    Any,
}

/// Hex nibble pattern such as `0000_XXXX`, most significant nibble first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mask {
    nibbles: Vec<Nibble>,
}

impl Mask {
    /// Parses a pattern of hex digits and `X` wildcards; `_` separators are ignored.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty patterns or other characters.
    pub fn parse(text: &str) -> Result<Self, GenerationError> {
        let nibbles = text
            .chars()
            .filter(|&c| c != '_')
            .map(|c| match c {
                'x' | 'X' => Ok(Nibble::Any),
                digit => digit
                    .to_digit(16)
                    .and_then(|value| u8::try_from(value).ok())
                    .map(Nibble::Literal)
                    .ok_or_else(|| {
                        GenerationError::configuration(format!(
                            "mask '{text}' contains '{digit}', expected hex digits or X"
                        ))
                    }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if nibbles.is_empty() {
            return Err(GenerationError::configuration("empty mask pattern"));
        }
        Ok(Self { nibbles })
    }

    /// Number of nibbles in the pattern.
    #[must_use]
    pub fn nibble_count(&self) -> usize {
        self.nibbles.len()
    }

    /// Number of `X` nibbles; fewer means more specific.
    #[must_use]
    pub fn wildcard_count(&self) -> usize {
        self.nibbles.iter().filter(|&&n| n == Nibble::Any).count()
    }

    /// True when the value's hex image has the same length and agrees on
    /// every literal nibble.
    #[must_use]
    pub fn matches(&self, value: &BitValue) -> bool {
        if self.nibbles.len() != value.nibble_count() as usize {
            return false;
        }
        (0u32..)
            .zip(&self.nibbles)
            .all(|(index, nibble)| match nibble {
                Nibble::Any => true,
                Nibble::Literal(expected) => value.nibble(index) == *expected,
            })
    }
}

impl FromStr for Mask {
    type Err = GenerationError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, nibble) in self.nibbles.iter().enumerate() {
            if index > 0 && index % 4 == 0 {
                f.write_str("_")?;
            }
            match nibble {
                Nibble::Any => f.write_str("X")?,
                Nibble::Literal(value) => write!(f, "{value:X}")?,
            }
        }
        Ok(())
    }
}
