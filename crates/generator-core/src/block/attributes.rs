use strum::{Display, EnumString, IntoStaticStr};

use crate::attr::{self, AttributeValue};
use crate::error::GenerationError;

/// How a `block` picks one candidate per child for each draw.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Combinator {
    /// Cartesian product, last child varying fastest.
    Product,
    /// Zip with cycling of shorter children.
    #[default]
    Diagonal,
    /// Uniform sample per child per draw.
    Random,
}

/// How the chosen child streams are merged.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Compositor {
    /// Children one after another.
    #[default]
    Catenation,
    /// Round-robin, one unit per child at a time.
    Rotation,
    /// Random interleaving weighted by remaining length.
    Random,
}

/// Reordering applied to the merged stream.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Permutator {
    /// Identity.
    #[default]
    Trivial,
    /// Uniform shuffle.
    Random,
}

/// Pin-driven reordering applied after the permutator.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Rearranger {
    /// Identity.
    #[default]
    Trivial,
    /// Moves head-pinned units first and tail-pinned units last.
    Pinned,
}

/// Final local shuffling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Obfuscator {
    /// One pass of random adjacent swaps over independent units.
    Random,
}

/// Placement a block requests from its parent's rearranger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Pin {
    /// Move to the front.
    Head,
    /// Move to the end.
    Tail,
}

/// Closed set of composite-block attributes.
///
/// `None` means the kind's default applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockAttributes {
    /// Candidate selection for `block` kinds.
    pub combinator: Option<Combinator>,
    /// Stream merge for `block` kinds.
    pub compositor: Option<Compositor>,
    /// Stream reordering.
    pub permutator: Option<Permutator>,
    /// Pin handling.
    pub rearranger: Option<Rearranger>,
    /// Local shuffling.
    pub obfuscator: Option<Obfuscator>,
    /// Requested placement within the parent.
    pub pin: Option<Pin>,
}

impl BlockAttributes {
    /// Attributes with every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the combinator.
    #[must_use]
    pub const fn combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = Some(combinator);
        self
    }

    /// Sets the compositor.
    #[must_use]
    pub const fn compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = Some(compositor);
        self
    }

    /// Sets the permutator.
    #[must_use]
    pub const fn permutator(mut self, permutator: Permutator) -> Self {
        self.permutator = Some(permutator);
        self
    }

    /// Sets the rearranger.
    #[must_use]
    pub const fn rearranger(mut self, rearranger: Rearranger) -> Self {
        self.rearranger = Some(rearranger);
        self
    }

    /// Sets the obfuscator.
    #[must_use]
    pub const fn obfuscator(mut self, obfuscator: Obfuscator) -> Self {
        self.obfuscator = Some(obfuscator);
        self
    }

    /// Sets the pin.
    #[must_use]
    pub const fn pin(mut self, pin: Pin) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Parses string-keyed attributes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown keys or strategy names and a
    /// type mismatch for non-string values.
    pub fn parse<'a>(
        pairs: impl IntoIterator<Item = (&'a str, AttributeValue)>,
    ) -> Result<Self, GenerationError> {
        let mut attributes = Self::default();
        for (key, value) in pairs {
            match key {
                "combinator" => attributes.combinator = Some(attr::expect_name(key, &value)?),
                "compositor" => attributes.compositor = Some(attr::expect_name(key, &value)?),
                "permutator" => attributes.permutator = Some(attr::expect_name(key, &value)?),
                "rearranger" => attributes.rearranger = Some(attr::expect_name(key, &value)?),
                "obfuscator" => attributes.obfuscator = Some(attr::expect_name(key, &value)?),
                "pin" => attributes.pin = Some(attr::expect_name(key, &value)?),
                other => return Err(attr::unknown_key("block", other)),
            }
        }
        Ok(attributes)
    }
}
