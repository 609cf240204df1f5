use rand::distributions::{Distribution as _, WeightedIndex};
use rand::Rng;
use strum::{Display, IntoStaticStr};

use crate::attr::{self, AttributeValue};
use crate::block::PrepareAttributes;
use crate::call::{Argument, Arguments, InstructionCall, LabelRef};
use crate::error::GenerationError;
use crate::model::{CallRegistry, PrimitiveKind};
use crate::preparator::Mask;

/// Whether a recipe sets a register value or checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum RecipeKind {
    /// Materializes a value into the target.
    Preparator,
    /// Verifies that the target holds a value.
    Comparator,
}

/// Operand slot of a call template in a recipe body.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    /// Fixed argument, resolved like any block argument.
    Literal(Argument),
    /// The request's target addressing mode.
    Target,
    /// The request's value, or bits `lo..=hi` of it.
    Value(Option<(u32, u32)>),
    /// Addressing mode built from further template arguments.
    Mode {
        /// Mode name.
        name: String,
        /// Mode arguments.
        arguments: Arguments<TemplateArg>,
    },
}

impl TemplateArg {
    /// The whole value.
    #[must_use]
    pub const fn value() -> Self {
        Self::Value(None)
    }

    /// Bits `lo..=hi` of the value.
    #[must_use]
    pub const fn value_bits(lo: u32, hi: u32) -> Self {
        Self::Value(Some((lo, hi)))
    }

    /// Named label reference.
    #[must_use]
    pub fn label(name: &str) -> Self {
        Self::Literal(Argument::Label(LabelRef::named(name)))
    }
}

impl From<Argument> for TemplateArg {
    fn from(argument: Argument) -> Self {
        Self::Literal(argument)
    }
}

impl From<InstructionCall> for TemplateArg {
    fn from(call: InstructionCall) -> Self {
        Self::Literal(call.into())
    }
}

impl From<i64> for TemplateArg {
    fn from(value: i64) -> Self {
        Self::Literal(Argument::Int(value))
    }
}

impl From<i32> for TemplateArg {
    fn from(value: i32) -> Self {
        Self::Literal(Argument::Int(i64::from(value)))
    }
}

/// Operation template instantiated when a recipe body runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CallTemplate {
    /// Operation name.
    pub name: String,
    /// Template arguments.
    pub arguments: Arguments<TemplateArg>,
}

/// One step of a recipe body.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeStep {
    /// Emit an operation.
    Call(CallTemplate),
    /// Resolve a nested preparator request.
    Prepare {
        /// Register mode to set.
        target: TemplateArg,
        /// Value or value slice to set it to.
        value: TemplateArg,
        /// Restricts the nested lookup to a named recipe.
        name: Option<String>,
        /// Forces a named variant.
        variant: Option<String>,
    },
}

/// Alternative body of a recipe with its selection weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Optional variant name.
    pub name: Option<String>,
    /// Relative selection weight.
    pub bias: u32,
    /// Body steps.
    pub steps: Vec<RecipeStep>,
}

/// `name` and `bias` of a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantAttributes {
    /// Optional variant name.
    pub name: Option<String>,
    /// Relative selection weight.
    pub bias: u32,
}

impl Default for VariantAttributes {
    fn default() -> Self {
        Self { name: None, bias: 1 }
    }
}

impl VariantAttributes {
    /// Named variant with the default bias.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Returns these attributes with a different bias.
    #[must_use]
    pub fn with_bias(mut self, bias: u32) -> Self {
        self.bias = bias;
        self
    }

    /// Parses `name` and `bias` attributes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown keys or negative biases and a
    /// type mismatch for values of the wrong shape.
    pub fn parse<'a>(
        pairs: impl IntoIterator<Item = (&'a str, AttributeValue)>,
    ) -> Result<Self, GenerationError> {
        let mut attributes = Self::default();
        for (key, value) in pairs {
            match key {
                "name" => attributes.name = Some(attr::expect_str(key, &value)?.to_owned()),
                "bias" => {
                    let bias = attr::expect_int(key, &value)?;
                    attributes.bias = u32::try_from(bias).map_err(|_| {
                        GenerationError::configuration(format!("variant bias {bias} is negative"))
                    })?;
                }
                other => return Err(attr::unknown_key("variant", other)),
            }
        }
        Ok(attributes)
    }
}

/// Accepted values of one target argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentConstraint {
    /// Any of the listed values.
    OneOf(Vec<i64>),
    /// Inclusive range.
    Range {
        /// Lower bound.
        low: i64,
        /// Upper bound.
        high: i64,
    },
}

impl ArgumentConstraint {
    /// True when `value` satisfies the constraint.
    #[must_use]
    pub fn accepts(&self, value: i64) -> bool {
        match self {
            Self::OneOf(values) => values.contains(&value),
            Self::Range { low, high } => (*low..=*high).contains(&value),
        }
    }

    fn parse(key: &str, value: &AttributeValue) -> Result<Self, GenerationError> {
        match value {
            AttributeValue::Int(single) => Ok(Self::OneOf(vec![*single])),
            AttributeValue::List(items) => Ok(Self::OneOf(
                items
                    .iter()
                    .map(|item| attr::expect_int(key, item))
                    .collect::<Result<_, _>>()?,
            )),
            AttributeValue::Map(bounds) => {
                let (mut low, mut high) = (None, None);
                for (bound, value) in bounds {
                    match bound.as_str() {
                        "from" => low = Some(attr::expect_int(bound, value)?),
                        "to" => high = Some(attr::expect_int(bound, value)?),
                        other => return Err(attr::unknown_key("range", other)),
                    }
                }
                match (low, high) {
                    (Some(low), Some(high)) if low <= high => Ok(Self::Range { low, high }),
                    _ => Err(GenerationError::configuration(format!(
                        "argument '{key}' needs a non-empty 'from'..'to' range"
                    ))),
                }
            }
            other => Err(GenerationError::TypeMismatch {
                key: key.to_owned(),
                expected: "an integer, list or range",
                found: other.shape(),
            }),
        }
    }
}

/// Registration key of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeHeader {
    /// Target addressing-mode name.
    pub target: String,
    /// Value pattern the recipe applies to.
    pub mask: Option<Mask>,
    /// Name used to request the recipe explicitly.
    pub name: Option<String>,
    /// Constraints on the target's arguments, by parameter name.
    pub arguments: Vec<(String, ArgumentConstraint)>,
}

impl RecipeHeader {
    /// Header matching every value of `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            mask: None,
            name: None,
            arguments: Vec::new(),
        }
    }

    /// Restricts the recipe to values matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed patterns.
    pub fn mask(mut self, pattern: &str) -> Result<Self, GenerationError> {
        self.mask = Some(Mask::parse(pattern)?);
        Ok(self)
    }

    /// Names the recipe.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Constrains a target argument.
    #[must_use]
    pub fn argument(mut self, parameter: impl Into<String>, constraint: ArgumentConstraint) -> Self {
        self.arguments.push((parameter.into(), constraint));
        self
    }

    /// Parses `target`, `mask`, `name` and `arguments` attributes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown keys, malformed masks or a
    /// missing target, and a type mismatch for values of the wrong shape.
    pub fn parse<'a>(
        pairs: impl IntoIterator<Item = (&'a str, AttributeValue)>,
    ) -> Result<Self, GenerationError> {
        let mut target = None;
        let mut header = Self::new(String::new());
        for (key, value) in pairs {
            match key {
                "target" => target = Some(attr::expect_str(key, &value)?.to_owned()),
                "mask" => header.mask = Some(Mask::parse(attr::expect_str(key, &value)?)?),
                "name" => header.name = Some(attr::expect_str(key, &value)?.to_owned()),
                "arguments" => {
                    for (parameter, constraint) in attr::expect_map(key, &value)? {
                        header.arguments.push((
                            parameter.clone(),
                            ArgumentConstraint::parse(parameter, constraint)?,
                        ));
                    }
                }
                other => return Err(attr::unknown_key("recipe", other)),
            }
        }
        header.target =
            target.ok_or_else(|| GenerationError::configuration("recipe needs a 'target'"))?;
        Ok(header)
    }
}

/// Registered preparator or comparator.
#[derive(Debug, Clone)]
pub struct Recipe {
    kind: RecipeKind,
    header: RecipeHeader,
    variants: Vec<Variant>,
    weights: WeightedIndex<u32>,
}

impl PartialEq for Recipe {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.header == other.header && self.variants == other.variants
    }
}

impl Recipe {
    /// Preparator or comparator.
    #[must_use]
    pub const fn kind(&self) -> RecipeKind {
        self.kind
    }

    /// Registration key.
    #[must_use]
    pub const fn header(&self) -> &RecipeHeader {
        &self.header
    }

    /// Variants in registration order.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Picks a variant by name, or by bias when `name` is `None`.
    pub(crate) fn choose_variant<R: Rng + ?Sized>(
        &self,
        name: Option<&str>,
        rng: &mut R,
    ) -> Option<&Variant> {
        match name {
            Some(name) => self
                .variants
                .iter()
                .find(|variant| variant.name.as_deref() == Some(name)),
            None => self.variants.get(self.weights.sample(rng)),
        }
    }
}

/// Collects the steps of one recipe body, validating calls against the model.
#[derive(Debug)]
pub struct StepBuilder<'c> {
    calls: &'c CallRegistry,
    steps: Vec<RecipeStep>,
}

impl<'c> StepBuilder<'c> {
    pub(crate) const fn new(calls: &'c CallRegistry) -> Self {
        Self {
            calls,
            steps: Vec::new(),
        }
    }

    /// Appends an operation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `name` is not an operation or the
    /// arguments do not fit its signature.
    pub fn call(
        &mut self,
        name: &str,
        arguments: impl Into<Arguments<TemplateArg>>,
    ) -> Result<&mut Self, GenerationError> {
        let arguments = arguments.into();
        self.check(PrimitiveKind::Operation, name, &arguments)?;
        self.steps.push(RecipeStep::Call(CallTemplate {
            name: name.to_owned(),
            arguments,
        }));
        Ok(self)
    }

    /// Builds an addressing-mode template argument.
    ///
    /// # Errors
    ///
    /// Same as [`StepBuilder::call`], for addressing modes.
    pub fn mode(
        &self,
        name: &str,
        arguments: impl Into<Arguments<TemplateArg>>,
    ) -> Result<TemplateArg, GenerationError> {
        let arguments = arguments.into();
        self.check(PrimitiveKind::Mode, name, &arguments)?;
        Ok(TemplateArg::Mode {
            name: name.to_owned(),
            arguments,
        })
    }

    /// Appends a nested preparator request.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `target` cannot denote an addressing
    /// mode or `value` cannot denote a value.
    pub fn prepare(
        &mut self,
        target: TemplateArg,
        value: TemplateArg,
        attributes: PrepareAttributes,
    ) -> Result<&mut Self, GenerationError> {
        match &target {
            TemplateArg::Target | TemplateArg::Mode { .. } | TemplateArg::Literal(Argument::Mode(_)) => {}
            other => {
                return Err(GenerationError::configuration(format!(
                    "prepare target must be an addressing mode, got {other:?}"
                )))
            }
        }
        match &value {
            TemplateArg::Value(Some((lo, hi))) if lo > hi => {
                return Err(GenerationError::configuration(format!(
                    "value slice {lo}..={hi} is reversed"
                )))
            }
            TemplateArg::Value(_)
            | TemplateArg::Literal(Argument::Int(_) | Argument::Lazy(_)) => {}
            other => {
                return Err(GenerationError::configuration(format!(
                    "prepare value must be a value or integer, got {other:?}"
                )))
            }
        }
        self.steps.push(RecipeStep::Prepare {
            target,
            value,
            name: attributes.name,
            variant: attributes.variant,
        });
        Ok(self)
    }

    fn check(
        &self,
        kind: PrimitiveKind,
        name: &str,
        arguments: &Arguments<TemplateArg>,
    ) -> Result<(), GenerationError> {
        let signature = self.calls.check_kind(kind, name)?;
        signature.check_arguments(name, arguments)?;
        for argument in arguments.values() {
            if let TemplateArg::Mode { name, arguments } = argument {
                self.check(PrimitiveKind::Mode, name, arguments)?;
            }
        }
        Ok(())
    }

    fn take(&mut self) -> Vec<RecipeStep> {
        std::mem::take(&mut self.steps)
    }
}

/// Body builder passed to recipe registration.
///
/// Steps added directly form the single implicit variant; [`RecipeBuilder::variant`]
/// declares explicit ones. A recipe uses one style or the other. A body with no
/// steps and no variants registers an empty recipe.
#[derive(Debug)]
pub struct RecipeBuilder<'c> {
    body: StepBuilder<'c>,
    variants: Vec<Variant>,
}

impl<'c> RecipeBuilder<'c> {
    pub(crate) const fn new(calls: &'c CallRegistry) -> Self {
        Self {
            body: StepBuilder::new(calls),
            variants: Vec::new(),
        }
    }

    /// Steps of the implicit variant.
    pub fn body(&mut self) -> &mut StepBuilder<'c> {
        &mut self.body
    }

    /// Appends an operation to the implicit variant.
    ///
    /// # Errors
    ///
    /// See [`StepBuilder::call`].
    pub fn call(
        &mut self,
        name: &str,
        arguments: impl Into<Arguments<TemplateArg>>,
    ) -> Result<&mut Self, GenerationError> {
        self.body.call(name, arguments)?;
        Ok(self)
    }

    /// Appends a nested preparator request to the implicit variant.
    ///
    /// # Errors
    ///
    /// See [`StepBuilder::prepare`].
    pub fn prepare(
        &mut self,
        target: TemplateArg,
        value: TemplateArg,
        attributes: PrepareAttributes,
    ) -> Result<&mut Self, GenerationError> {
        self.body.prepare(target, value, attributes)?;
        Ok(self)
    }

    /// Builds an addressing-mode template argument.
    ///
    /// # Errors
    ///
    /// See [`StepBuilder::mode`].
    pub fn mode(
        &self,
        name: &str,
        arguments: impl Into<Arguments<TemplateArg>>,
    ) -> Result<TemplateArg, GenerationError> {
        self.body.mode(name, arguments)
    }

    /// Declares an explicit variant.
    ///
    /// # Errors
    ///
    /// Propagates errors from `body`.
    pub fn variant(
        &mut self,
        attributes: VariantAttributes,
        body: impl FnOnce(&mut StepBuilder<'c>) -> Result<(), GenerationError>,
    ) -> Result<&mut Self, GenerationError> {
        let mut steps = StepBuilder::new(self.body.calls);
        body(&mut steps)?;
        self.variants.push(Variant {
            name: attributes.name,
            bias: attributes.bias,
            steps: steps.take(),
        });
        Ok(self)
    }

    pub(crate) fn finish(mut self, kind: RecipeKind, header: RecipeHeader) -> Result<Recipe, GenerationError> {
        let implicit = self.body.take();
        let variants = match (implicit.is_empty(), self.variants.is_empty()) {
            (_, true) => vec![Variant {
                name: None,
                bias: 1,
                steps: implicit,
            }],
            (true, false) => self.variants,
            (false, false) => {
                return Err(GenerationError::configuration(format!(
                    "{kind} for '{}' mixes plain steps with variants",
                    header.target
                )))
            }
        };
        let weights = WeightedIndex::new(variants.iter().map(|variant| variant.bias)).map_err(|_| {
            GenerationError::configuration(format!(
                "{kind} for '{}' needs a variant with positive bias",
                header.target
            ))
        })?;
        Ok(Recipe {
            kind,
            header,
            variants,
            weights,
        })
    }
}
