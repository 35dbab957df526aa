//! Model definitions: field name to field definition maps.
//!
//! # Responsibility
//! - Represent scalar, array-of and nested field definitions.
//! - Parse JSON attribute maps into typed definitions.
//!
//! # Invariants
//! - A single-element JSON list denotes "array of" its element.
//! - An object without a string `type` key is a nested definition.
//! - Array definitions resolve one level deep to their inner descriptor.

use crate::model::field::{FieldDescriptor, FieldType, NAMED_VALIDATORS};
use serde_json::{Map, Value};
use std::collections::btree_map::{self, BTreeMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Definition of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDef {
    Scalar(FieldDescriptor),
    /// Array of the inner definition.
    Array(Box<FieldDef>),
    /// Embedded sub-document.
    Nested(Definition),
}

impl FieldDef {
    pub fn array_of(inner: impl Into<FieldDef>) -> Self {
        Self::Array(Box::new(inner.into()))
    }

    /// Returns the scalar descriptor, unwrapping one array level.
    pub fn resolve(&self) -> Option<&FieldDescriptor> {
        match self {
            Self::Scalar(descriptor) => Some(descriptor),
            Self::Array(inner) => match inner.as_ref() {
                Self::Scalar(descriptor) => Some(descriptor),
                _ => None,
            },
            Self::Nested(_) => None,
        }
    }

    pub fn is_private(&self) -> bool {
        self.resolve().is_some_and(FieldDescriptor::is_private)
    }

    pub fn is_reference(&self) -> bool {
        self.resolve().is_some_and(FieldDescriptor::is_reference)
    }

    /// Parses one field definition from its JSON form.
    pub fn from_json(name: &str, value: &Value) -> Result<Self, DefinitionError> {
        match value {
            Value::String(tag) => Ok(Self::Scalar(FieldDescriptor::new(parse_type(name, tag)?))),
            Value::Array(items) => match items.as_slice() {
                [] => Ok(Self::Scalar(FieldDescriptor::new(FieldType::Array))),
                [inner] => Ok(Self::array_of(Self::from_json(name, inner)?)),
                _ => Err(DefinitionError::InvalidField {
                    field: name.to_string(),
                    message: "array definitions must contain exactly one element".to_string(),
                }),
            },
            Value::Object(map) => match map.get("type") {
                Some(Value::String(tag)) => {
                    parse_type(name, tag)?;
                    parse_descriptor(name, map).map(Self::Scalar)
                }
                _ => Definition::from_json_map(map).map(Self::Nested),
            },
            other => Err(DefinitionError::InvalidField {
                field: name.to_string(),
                message: format!("unsupported definition value `{other}`"),
            }),
        }
    }
}

impl From<FieldDescriptor> for FieldDef {
    fn from(value: FieldDescriptor) -> Self {
        Self::Scalar(value)
    }
}

impl From<Definition> for FieldDef {
    fn from(value: Definition) -> Self {
        Self::Nested(value)
    }
}

/// Declarative mapping of field names to definitions for one resource kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definition {
    fields: BTreeMap<String, FieldDef>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn field(mut self, name: impl Into<String>, def: impl Into<FieldDef>) -> Self {
        self.insert(name, def);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, def: impl Into<FieldDef>) {
        self.fields.insert(name.into(), def.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldDef> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a JSON attributes object.
    pub fn from_json(value: &Value) -> Result<Self, DefinitionError> {
        match value {
            Value::Object(map) => Self::from_json_map(map),
            other => Err(DefinitionError::NotAnObject(other.to_string())),
        }
    }

    pub fn from_json_map(map: &Map<String, Value>) -> Result<Self, DefinitionError> {
        let mut definition = Self::new();
        for (name, value) in map {
            definition.insert(name.clone(), FieldDef::from_json(name, value)?);
        }
        Ok(definition)
    }
}

impl<'a> IntoIterator for &'a Definition {
    type Item = (&'a String, &'a FieldDef);
    type IntoIter = btree_map::Iter<'a, String, FieldDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn parse_type(field: &str, tag: &str) -> Result<FieldType, DefinitionError> {
    FieldType::parse(tag).map_err(|_| DefinitionError::UnknownType {
        field: field.to_string(),
        tag: tag.to_string(),
    })
}

fn parse_descriptor(
    field: &str,
    map: &Map<String, Value>,
) -> Result<FieldDescriptor, DefinitionError> {
    let descriptor: FieldDescriptor = serde_json::from_value(Value::Object(map.clone()))
        .map_err(|err| DefinitionError::InvalidField {
            field: field.to_string(),
            message: err.to_string(),
        })?;

    if let Some(name) = descriptor.validate.as_deref() {
        if !NAMED_VALIDATORS.contains(&name) {
            return Err(DefinitionError::UnknownValidator {
                field: field.to_string(),
                name: name.to_string(),
            });
        }
    }

    Ok(descriptor)
}

/// Errors raised while parsing a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    NotAnObject(String),
    UnknownType { field: String, tag: String },
    UnknownValidator { field: String, name: String },
    InvalidField { field: String, message: String },
}

impl Display for DefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject(value) => write!(f, "definition must be an object, got `{value}`"),
            Self::UnknownType { field, tag } => {
                write!(f, "field `{field}`: type `{tag}` could not be converted")
            }
            Self::UnknownValidator { field, name } => {
                write!(f, "field `{field}`: unknown validator `{name}`")
            }
            Self::InvalidField { field, message } => write!(f, "field `{field}`: {message}"),
        }
    }
}

impl Error for DefinitionError {}
