use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ::rand::distributions::{Distribution as _, WeightedIndex};
use ::rand::Rng;

use crate::error::GenerationError;

/// Unsigned value of a fixed bit width (1..=64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitValue {
    bits: u64,
    width: u32,
}

impl BitValue {
    /// Truncates `bits` to `width` bits.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `width` is zero or above 64.
    pub fn new(bits: u64, width: u32) -> Result<Self, GenerationError> {
        if width == 0 || width > 64 {
            return Err(GenerationError::configuration(format!(
                "bit width {width} is outside 1..=64"
            )));
        }
        Ok(Self {
            bits: bits & Self::mask(width),
            width,
        })
    }

    /// Two's-complement image of a signed value at `width` bits.
    ///
    /// # Errors
    ///
    /// Same as [`BitValue::new`].
    #[allow(clippy::cast_sign_loss)]
    pub fn from_signed(value: i64, width: u32) -> Result<Self, GenerationError> {
        Self::new(value as u64, width)
    }

    const fn mask(width: u32) -> u64 {
        if width >= 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        }
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.bits
    }

    /// Bit width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of hex digits in the image (`ceil(width / 4)`).
    #[must_use]
    pub const fn nibble_count(&self) -> u32 {
        self.width.div_ceil(4)
    }

    /// Nibble `index`, counting from the most significant one.
    #[must_use]
    pub const fn nibble(&self, index: u32) -> u8 {
        let shift = (self.nibble_count() - 1 - index) * 4;
        ((self.bits >> shift) & 0xF) as u8
    }

    /// Bits `lo..=hi` as a value of width `hi - lo + 1`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the range is reversed or exceeds the width.
    pub fn slice(&self, lo: u32, hi: u32) -> Result<Self, GenerationError> {
        if lo > hi || hi >= self.width {
            return Err(GenerationError::configuration(format!(
                "bit slice {lo}..={hi} is outside a {}-bit value",
                self.width
            )));
        }
        Self::new(self.bits >> lo, hi - lo + 1)
    }

    /// The bits reinterpreted as a signed integer operand.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_operand(&self) -> i64 {
        self.bits as i64
    }
}

impl fmt::Display for BitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0width$X}", self.bits, width = self.nibble_count() as usize)
    }
}

/// One weighted entry of a [`Distribution`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variate {
    /// Single constant.
    Value(i64),
    /// Uniform inclusive range.
    Range {
        /// Lower bound.
        low: i64,
        /// Upper bound.
        high: i64,
    },
    /// Nested distribution.
    Nested(Distribution),
}

/// Weighted union of constants, ranges and nested distributions.
#[derive(Debug, Clone)]
pub struct Distribution {
    variates: Vec<Variate>,
    weights: Vec<u32>,
    index: WeightedIndex<u32>,
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.variates == other.variates && self.weights == other.weights
    }
}

impl Eq for Distribution {}

impl Distribution {
    /// Builds a distribution from `(variate, weight)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no weight is positive or a range
    /// is reversed.
    pub fn new(entries: impl IntoIterator<Item = (Variate, u32)>) -> Result<Self, GenerationError> {
        let (variates, weights): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        for variate in &variates {
            if let Variate::Range { low, high } = variate {
                if low > high {
                    return Err(GenerationError::configuration(format!(
                        "distribution range {low}..={high} is empty"
                    )));
                }
            }
        }
        let index = WeightedIndex::new(&weights).map_err(|_| {
            GenerationError::configuration("distribution needs at least one positive weight")
        })?;
        Ok(Self {
            variates,
            weights,
            index,
        })
    }

    /// Entries with their weights.
    pub fn entries(&self) -> impl Iterator<Item = (&Variate, u32)> {
        self.variates.iter().zip(self.weights.iter().copied())
    }

    /// Draws one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        match &self.variates[self.index.sample(rng)] {
            Variate::Value(value) => *value,
            Variate::Range { low, high } => rng.gen_range(*low..=*high),
            Variate::Nested(nested) => nested.sample(rng),
        }
    }
}

enum Source {
    Uniform { low: i64, high: i64 },
    Weighted(Distribution),
    Derived {
        base: LazyValue,
        map: Box<dyn Fn(i64) -> i64 + Send + Sync>,
    },
}

/// Deferred scalar resolved once per draw.
///
/// Clones share identity: every clone resolves to the same value within a
/// draw. [`LazyValue::renewed`] yields a handle that draws afresh each time
/// it is resolved.
#[derive(Clone)]
pub struct LazyValue {
    source: Arc<Source>,
    renew: bool,
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source.as_ref() {
            Source::Uniform { low, high } => format!("rand({low}, {high})"),
            Source::Weighted(_) => "dist(..)".to_owned(),
            Source::Derived { base, .. } => format!("map({base:?})"),
        };
        f.debug_struct("LazyValue")
            .field("source", &kind)
            .field("renew", &self.renew)
            .finish()
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source) && self.renew == other.renew
    }
}

impl LazyValue {
    fn from_source(source: Source) -> Self {
        Self {
            source: Arc::new(source),
            renew: false,
        }
    }

    /// Value derived from this one by `map`; shares this value's draw.
    #[must_use]
    pub fn map(&self, map: impl Fn(i64) -> i64 + Send + Sync + 'static) -> Self {
        Self::from_source(Source::Derived {
            base: self.clone(),
            map: Box::new(map),
        })
    }

    /// Handle that draws a fresh value every time it is resolved.
    #[must_use]
    pub fn renewed(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            renew: true,
        }
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.source) as usize
    }

    /// Resolves against the per-draw cache.
    pub(crate) fn evaluate<R: Rng + ?Sized>(&self, cache: &mut LazyCache, rng: &mut R) -> i64 {
        if !self.renew {
            if let Some(value) = cache.values.get(&self.key()) {
                return *value;
            }
        }
        let value = match self.source.as_ref() {
            Source::Uniform { low, high } => rng.gen_range(*low..=*high),
            Source::Weighted(distribution) => distribution.sample(rng),
            Source::Derived { base, map } => map(base.evaluate(cache, rng)),
        };
        cache.values.insert(self.key(), value);
        value
    }
}

/// Values drawn during the current root draw, keyed by lazy-value identity.
#[derive(Debug, Default)]
pub(crate) struct LazyCache {
    values: HashMap<usize, i64>,
}

impl LazyCache {
    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}

/// Uniform value in `low..=high`.
///
/// # Errors
///
/// Returns a configuration error when `low > high`.
pub fn rand(low: i64, high: i64) -> Result<LazyValue, GenerationError> {
    if low > high {
        return Err(GenerationError::configuration(format!(
            "rand({low}, {high}) has an empty range"
        )));
    }
    Ok(LazyValue::from_source(Source::Uniform { low, high }))
}

/// Weighted choice among constants, ranges and nested distributions.
///
/// # Errors
///
/// Same as [`Distribution::new`].
pub fn dist(entries: impl IntoIterator<Item = (Variate, u32)>) -> Result<LazyValue, GenerationError> {
    Ok(LazyValue::from(Distribution::new(entries)?))
}

impl From<Distribution> for LazyValue {
    fn from(distribution: Distribution) -> Self {
        Self::from_source(Source::Weighted(distribution))
    }
}

#[cfg(test)]
mod tests {
    use ::rand::rngs::StdRng;
    use ::rand::SeedableRng;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{dist, rand, BitValue, Distribution, LazyCache, Variate};
    use crate::error::ErrorKind;

    #[rstest]
    #[case(0x0000_FFFF, 32, "0x0000FFFF")]
    #[case(0xABCD, 16, "0xABCD")]
    #[case(0x1F, 5, "0x1F")]
    #[case(0x1_2345_6789, 32, "0x23456789")]
    fn hex_image_uses_value_width(#[case] bits: u64, #[case] width: u32, #[case] text: &str) {
        assert_eq!(BitValue::new(bits, width).unwrap().to_string(), text);
    }

    #[test]
    fn slices_extract_bit_ranges() {
        let value = BitValue::new(0x1234_5678, 32).unwrap();
        assert_eq!(value.slice(16, 31).unwrap(), BitValue::new(0x1234, 16).unwrap());
        assert_eq!(value.slice(0, 15).unwrap().bits(), 0x5678);
        assert_eq!(value.nibble(0), 0x1);
        assert_eq!(value.nibble(7), 0x8);
        assert!(value.slice(16, 32).is_err());
    }

    #[test]
    fn signed_values_wrap_to_width() {
        assert_eq!(BitValue::from_signed(-1, 32).unwrap().bits(), 0xFFFF_FFFF);
    }

    #[test]
    fn lazy_value_is_stable_within_a_draw() {
        let value = rand(0, 1_000_000).unwrap();
        let copy = value.clone();
        let mut cache = LazyCache::default();
        let mut rng = StdRng::seed_from_u64(3);
        let first = value.evaluate(&mut cache, &mut rng);
        assert_eq!(copy.evaluate(&mut cache, &mut rng), first);

        let derived = value.map(|v| v + 1);
        assert_eq!(derived.evaluate(&mut cache, &mut rng), first + 1);

        cache.clear();
        let renewed = value.renewed();
        let draws: Vec<_> = (0..8).map(|_| renewed.evaluate(&mut cache, &mut rng)).collect();
        assert!(draws.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn distribution_rejects_all_zero_weights() {
        let error = Distribution::new([(Variate::Value(1), 0), (Variate::Value(2), 0)]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Configuration);
        assert!(Distribution::new(Vec::<(Variate, u32)>::new()).is_err());
        assert!(dist([(Variate::Range { low: 5, high: 1 }, 1)]).is_err());
        assert!(rand(2, 1).is_err());
    }

    #[test]
    fn zero_weight_entries_are_never_drawn() {
        let distribution =
            Distribution::new([(Variate::Value(7), 0), (Variate::Value(9), 3)]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        assert!((0..64).all(|_| distribution.sample(&mut rng) == 9));
    }

    proptest! {
        #[test]
        fn uniform_values_stay_in_range(low in -1000i64..1000, span in 0i64..1000, seed in any::<u64>()) {
            let value = rand(low, low + span).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let drawn = value.evaluate(&mut LazyCache::default(), &mut rng);
            prop_assert!((low..=low + span).contains(&drawn));
        }

        #[test]
        fn nested_distributions_stay_in_their_support(seed in any::<u64>()) {
            let inner = Distribution::new([(Variate::Range { low: 10, high: 20 }, 1)]).unwrap();
            let outer = Distribution::new([
                (Variate::Value(-1), 1),
                (Variate::Nested(inner), 2),
            ])
            .unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let drawn = outer.sample(&mut rng);
            prop_assert!(drawn == -1 || (10..=20).contains(&drawn));
        }
    }
}
