use std::str::FromStr;

use crate::error::GenerationError;

/// Value in a string-keyed attribute list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Name or text.
    Str(String),
    /// Integer.
    Int(i64),
    /// Flag.
    Bool(bool),
    /// Ordered list of values.
    List(Vec<AttributeValue>),
    /// Nested key/value mapping.
    Map(Vec<(String, AttributeValue)>),
}

impl AttributeValue {
    /// Human-readable shape name used in type mismatch errors.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Str(_) => "a string",
            Self::Int(_) => "an integer",
            Self::Bool(_) => "a boolean",
            Self::List(_) => "a list",
            Self::Map(_) => "a mapping",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

fn mismatch(key: &str, expected: &'static str, found: &AttributeValue) -> GenerationError {
    GenerationError::TypeMismatch {
        key: key.to_owned(),
        expected,
        found: found.shape(),
    }
}

pub(crate) fn expect_str<'a>(key: &str, value: &'a AttributeValue) -> Result<&'a str, GenerationError> {
    match value {
        AttributeValue::Str(text) => Ok(text),
        other => Err(mismatch(key, "a string", other)),
    }
}

pub(crate) fn expect_int(key: &str, value: &AttributeValue) -> Result<i64, GenerationError> {
    match value {
        AttributeValue::Int(number) => Ok(*number),
        other => Err(mismatch(key, "an integer", other)),
    }
}

pub(crate) fn expect_bool(key: &str, value: &AttributeValue) -> Result<bool, GenerationError> {
    match value {
        AttributeValue::Bool(flag) => Ok(*flag),
        other => Err(mismatch(key, "a boolean", other)),
    }
}

pub(crate) fn expect_list<'a>(
    key: &str,
    value: &'a AttributeValue,
) -> Result<&'a [AttributeValue], GenerationError> {
    match value {
        AttributeValue::List(items) => Ok(items),
        other => Err(mismatch(key, "a list", other)),
    }
}

pub(crate) fn expect_map<'a>(
    key: &str,
    value: &'a AttributeValue,
) -> Result<&'a [(String, AttributeValue)], GenerationError> {
    match value {
        AttributeValue::Map(entries) => Ok(entries),
        other => Err(mismatch(key, "a mapping", other)),
    }
}

/// Parses a named strategy (combinator, compositor...) from a string value.
pub(crate) fn expect_name<T: FromStr>(
    key: &str,
    value: &AttributeValue,
) -> Result<T, GenerationError> {
    let text = expect_str(key, value)?;
    text.parse()
        .map_err(|_| GenerationError::configuration(format!("unknown {key} '{text}'")))
}

pub(crate) fn unknown_key(owner: &str, key: &str) -> GenerationError {
    GenerationError::configuration(format!("unknown {owner} attribute '{key}'"))
}
