//! Field descriptors for model definitions.
//!
//! # Responsibility
//! - Define the closed set of field type tags and their string mapping.
//! - Carry per-field constraints (`required`, `enum`, `match`, bounds).
//! - Carry read-visibility markers (`access`, `readScopes`).
//!
//! # Invariants
//! - Type tags resolve only through `TYPE_TAGS`; unknown tags are errors.
//! - A `Pattern` always holds a compiled, valid regular expression.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Closed set of primitive and reference field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    /// Identifier of another document (a reference field).
    ObjectId,
    /// Arbitrary JSON value.
    Mixed,
    /// Array of arbitrary JSON values.
    Array,
}

const TYPE_TAGS: &[(&str, FieldType)] = &[
    ("string", FieldType::String),
    ("number", FieldType::Number),
    ("boolean", FieldType::Boolean),
    ("date", FieldType::Date),
    ("objectid", FieldType::ObjectId),
    ("reference", FieldType::ObjectId),
    ("mixed", FieldType::Mixed),
    ("array", FieldType::Array),
];

impl FieldType {
    /// Resolves a type tag (`"String"`, `"ObjectId"`, `"reference"`...).
    ///
    /// Matching is case-insensitive against the static tag table.
    pub fn parse(tag: &str) -> Result<Self, UnknownFieldType> {
        let normalized = tag.trim().to_ascii_lowercase();
        TYPE_TAGS
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| UnknownFieldType(tag.to_string()))
    }

    /// Canonical tag name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::ObjectId => "ObjectId",
            Self::Mixed => "Mixed",
            Self::Array => "Array",
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = UnknownFieldType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag that is not part of the supported set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldType(pub String);

impl Display for UnknownFieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "type `{}` could not be converted to a field type", self.0)
    }
}

impl Error for UnknownFieldType {}

/// Default read visibility of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Public,
    /// Omitted from default projections and never writable through assign.
    Private,
}

/// Scopes allowed to read a field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "Value")]
pub enum ReadScopes {
    #[default]
    All,
    Only(Vec<String>),
}

impl ReadScopes {
    /// Returns whether any of `scopes` grants read access.
    pub fn permits(&self, scopes: &[String]) -> bool {
        match self {
            Self::All => true,
            Self::Only(allowed) => allowed.iter().any(|scope| scopes.contains(scope)),
        }
    }
}

impl TryFrom<Value> for ReadScopes {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) if text == "all" => Ok(Self::All),
            Value::String(text) if text == "none" => Ok(Self::Only(Vec::new())),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(scope) => Ok(scope),
                    other => Err(format!("read scope must be a string, got `{other}`")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Only),
            other => Err(format!(
                "readScopes must be \"all\", \"none\" or a list of scopes, got `{other}`"
            )),
        }
    }
}

/// Compiled `match` constraint.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Named validators usable through the `validate` descriptor key.
pub const NAMED_VALIDATORS: &[&str] = &["email", "objectId"];

/// Type and constraint descriptor for one scalar field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub read_scopes: ReadScopes,
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "match")]
    pub pattern: Option<Pattern>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<f64>,
    pub max_length: Option<f64>,
    /// Target model name of a reference field.
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub default: Option<Value>,
    /// Named validator, one of `NAMED_VALIDATORS`.
    pub validate: Option<String>,
}

impl FieldDescriptor {
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            required: false,
            access: Access::Public,
            read_scopes: ReadScopes::All,
            enum_values: None,
            pattern: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            reference: None,
            default: None,
            validate: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn mixed() -> Self {
        Self::new(FieldType::Mixed)
    }

    /// Reference to a document of model `target`.
    pub fn reference(target: impl Into<String>) -> Self {
        let mut descriptor = Self::new(FieldType::ObjectId);
        descriptor.reference = Some(target.into());
        descriptor
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.access = Access::Private;
        self
    }

    pub fn with_read_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_scopes = ReadScopes::Only(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_enum<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_pattern(mut self, source: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Pattern::new(source)?);
        Ok(self)
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_min_length(mut self, min: f64) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn with_max_length(mut self, max: f64) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_private(&self) -> bool {
        self.access == Access::Private
    }

    pub fn is_reference(&self) -> bool {
        self.kind == FieldType::ObjectId
    }

    /// Lower bound, `min` taking precedence over `minLength`.
    pub fn lower_bound(&self) -> Option<f64> {
        self.min.or(self.min_length)
    }

    /// Upper bound, `max` taking precedence over `maxLength`.
    pub fn upper_bound(&self) -> Option<f64> {
        self.max.or(self.max_length)
    }
}
