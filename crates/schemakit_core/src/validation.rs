//! Field validators derived from model definitions.
//!
//! # Responsibility
//! - Derive per-field validators for request bodies, independent of the
//!   store.
//! - Report every failing field of a payload at once.
//!
//! # Invariants
//! - Only `String` and `Number` fields resolve to a validator; other types
//!   map to `None`, meaning "no validation available".
//! - `min`/`max` take precedence over `minLength`/`maxLength`.
//! - Non-required fields accept missing, `null` and `""` values.
//! - Skipping `required` only tolerates missing keys; an explicit `null`
//!   (or a falsy reference, which assign turns into an unset) still fails.

use crate::model::definition::{Definition, FieldDef};
use crate::model::field::{FieldDescriptor, FieldType, Pattern};
use crate::schema::is_falsy;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Primitive kind a validator checks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
}

impl ValueKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
        }
    }
}

/// Format check selected through the descriptor `validate` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedValidator {
    Email,
    ObjectId,
}

impl NamedValidator {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "email" => Some(Self::Email),
            "objectId" => Some(Self::ObjectId),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::ObjectId => "objectId",
        }
    }

    fn accepts(self, value: &str) -> bool {
        match self {
            Self::Email => EMAIL_RE.is_match(value) && value == value.to_lowercase(),
            Self::ObjectId => Uuid::parse_str(value).is_ok(),
        }
    }
}

/// Validator for one scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValidator {
    pub kind: ValueKind,
    pub required: bool,
    pub allowed: Option<Vec<Value>>,
    pub pattern: Option<Pattern>,
    pub named: Option<NamedValidator>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FieldValidator {
    /// Derives a validator, or `None` for unsupported field types.
    pub fn for_descriptor(descriptor: &FieldDescriptor) -> Option<Self> {
        let kind = match descriptor.kind {
            FieldType::String => ValueKind::String,
            FieldType::Number => ValueKind::Number,
            _ => return None,
        };

        Some(Self {
            kind,
            required: descriptor.required,
            allowed: descriptor.enum_values.clone(),
            pattern: descriptor.pattern.clone(),
            named: descriptor.validate.as_deref().and_then(NamedValidator::parse),
            min: descriptor.lower_bound(),
            max: descriptor.upper_bound(),
        })
    }

    /// Checks one value; `None` means the key is missing.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), FieldError> {
        self.validate_with(value, false)
    }

    fn validate_with(&self, value: Option<&Value>, skip_required: bool) -> Result<(), FieldError> {
        let required = self.required && !(skip_required && value.is_none());
        let value = match value {
            None | Some(Value::Null) => {
                return if required {
                    Err(FieldError::Required)
                } else {
                    Ok(())
                };
            }
            Some(Value::String(text)) if text.is_empty() && !required => return Ok(()),
            Some(value) => value,
        };

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                return Err(FieldError::NotAllowed(value.clone()));
            }
        }

        match self.kind {
            ValueKind::String => {
                let text = value.as_str().ok_or(FieldError::InvalidType {
                    expected: self.kind.as_str(),
                })?;
                if let Some(pattern) = &self.pattern {
                    if !pattern.is_match(text) {
                        return Err(FieldError::PatternMismatch(pattern.as_str().to_string()));
                    }
                }
                if let Some(named) = self.named {
                    if !named.accepts(text) {
                        return Err(FieldError::InvalidFormat(named.as_str()));
                    }
                }
                self.check_bounds(text.chars().count() as f64)
            }
            ValueKind::Number => {
                let number = value.as_f64().ok_or(FieldError::InvalidType {
                    expected: self.kind.as_str(),
                })?;
                self.check_bounds(number)
            }
        }
    }

    fn check_bounds(&self, measure: f64) -> Result<(), FieldError> {
        if let Some(min) = self.min {
            if measure < min {
                return Err(FieldError::BelowMin(min));
            }
        }
        if let Some(max) = self.max {
            if measure > max {
                return Err(FieldError::AboveMax(max));
            }
        }
        Ok(())
    }
}

/// Why one field failed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    Required,
    InvalidType { expected: &'static str },
    NotAllowed(Value),
    PatternMismatch(String),
    InvalidFormat(&'static str),
    BelowMin(f64),
    AboveMax(f64),
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => write!(f, "is required"),
            Self::InvalidType { expected } => write!(f, "must be a {expected}"),
            Self::NotAllowed(value) => write!(f, "value `{value}` is not allowed"),
            Self::PatternMismatch(pattern) => write!(f, "must match `{pattern}`"),
            Self::InvalidFormat(name) => write!(f, "must be a valid {name}"),
            Self::BelowMin(min) => write!(f, "must be at least {min}"),
            Self::AboveMax(max) => write!(f, "must be at most {max}"),
        }
    }
}

impl Error for FieldError {}

/// All field failures of one payload, in field name order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    pub errors: Vec<(String, FieldError)>,
}

impl ValidationErrors {
    pub fn field(&self, name: &str) -> Option<&FieldError> {
        self.errors
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, error)| error)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let details = self
            .errors
            .iter()
            .map(|(field, error)| format!("`{field}` {error}"))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "validation failed: {details}")
    }
}

impl Error for ValidationErrors {}

/// Validators for every field of a definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionValidator {
    fields: BTreeMap<String, Option<FieldValidator>>,
    /// Required scalars without a type validator; `true` for references.
    presence: BTreeMap<String, bool>,
    skip_required: bool,
}

/// Derives field validators from a definition.
///
/// Array-wrapped and nested fields, like unsupported scalar types, map to
/// `None`. Required scalars of unsupported types are still checked for
/// presence.
pub fn validator_for_definition(definition: &Definition) -> DefinitionValidator {
    let presence = definition
        .iter()
        .filter_map(|(name, field)| match field {
            FieldDef::Scalar(descriptor)
                if descriptor.required && FieldValidator::for_descriptor(descriptor).is_none() =>
            {
                Some((name.clone(), descriptor.is_reference()))
            }
            _ => None,
        })
        .collect();
    let fields = definition
        .iter()
        .map(|(name, field)| {
            let validator = match field {
                FieldDef::Scalar(descriptor) => FieldValidator::for_descriptor(descriptor),
                FieldDef::Array(_) | FieldDef::Nested(_) => None,
            };
            (name.clone(), validator)
        })
        .collect();

    DefinitionValidator {
        fields,
        presence,
        skip_required: false,
    }
}

impl DefinitionValidator {
    /// Validator of `name`; `None` when the field is unknown or has no
    /// validation available.
    pub fn field(&self, name: &str) -> Option<&FieldValidator> {
        self.fields.get(name).and_then(Option::as_ref)
    }

    /// Whether `name` is declared, with or without a validator.
    pub fn declares(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Accepts missing required keys, for partial updates.
    pub fn skip_required(mut self) -> Self {
        self.skip_required = true;
        self
    }

    /// Drops the named fields from validation.
    pub fn without_fields(mut self, names: &[&str]) -> Self {
        for name in names {
            self.fields.remove(*name);
            self.presence.remove(*name);
        }
        self
    }

    /// Validates every declared field against `input`.
    ///
    /// Keys of `input` without a declared validator are not checked.
    pub fn validate(&self, input: &Map<String, Value>) -> Result<(), ValidationErrors> {
        let mut errors: Vec<(String, FieldError)> = self
            .fields
            .iter()
            .filter_map(|(name, validator)| {
                let validator = validator.as_ref()?;
                validator
                    .validate_with(input.get(name), self.skip_required)
                    .err()
                    .map(|error| (name.clone(), error))
            })
            .collect();

        for (name, is_reference) in &self.presence {
            let missing = match input.get(name) {
                None => !self.skip_required,
                Some(Value::Null) => true,
                Some(value) => *is_reference && is_falsy(value),
            };
            if missing {
                errors.push((name.clone(), FieldError::Required));
            }
        }
        errors.sort_by(|(left, _), (right, _)| left.cmp(right));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { errors })
        }
    }
}
