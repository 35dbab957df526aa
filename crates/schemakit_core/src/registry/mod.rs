//! Process-scoped model registry.
//!
//! # Responsibility
//! - Map model names to their schemas, owned by the caller.
//! - Load JSON model definitions from files and directories.
//!
//! # Invariants
//! - Registering an existing name returns the existing model unchanged.
//! - Model names are non-empty ASCII identifiers.

use crate::model::definition::DefinitionError;
use crate::model::document::Document;
use crate::schema::Schema;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

mod loader;

pub use loader::model_name_from_file_stem;

static MODEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid model name regex"));

/// A schema registered under a model name.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    schema: Schema,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Constructs an empty, unsaved document of this model.
    pub fn new_document(&self) -> Document {
        Document::new(self.name.clone())
    }
}

/// Registry failures.
#[derive(Debug)]
pub enum RegistryError {
    InvalidModelName(String),
    ModelNotFound(String),
    /// Model file lacks an `attributes` object.
    MissingAttributes(String),
    Definition {
        model: String,
        source: DefinitionError,
    },
    InvalidOptions {
        model: String,
        source: serde_json::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidModelName(name) => write!(f, "model name is invalid: `{name}`"),
            Self::ModelNotFound(name) => write!(f, "model not registered: {name}"),
            Self::MissingAttributes(name) => {
                write!(f, "invalid model definition for {name}, need attributes")
            }
            Self::Definition { model, source } => write!(f, "model {model}: {source}"),
            Self::InvalidOptions { model, source } => {
                write!(f, "model {model}: invalid schema options: {source}")
            }
            Self::Parse { path, source } => {
                write!(f, "could not parse model file `{}`: {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "could not read `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Definition { source, .. } => Some(source),
            Self::InvalidOptions { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Name to model mapping, initialized once at startup and passed by
/// reference.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema` under `name`.
    ///
    /// Returns the already-registered model when `name` is taken; the new
    /// schema is discarded.
    pub fn register(
        &mut self,
        name: &str,
        schema: Schema,
    ) -> Result<Arc<Model>, RegistryError> {
        let name = name.trim();
        if !MODEL_NAME_RE.is_match(name) {
            return Err(RegistryError::InvalidModelName(name.to_string()));
        }

        let model = self
            .models
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Model {
                    name: name.to_string(),
                    schema,
                })
            });
        Ok(Arc::clone(model))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name.trim()).cloned()
    }

    /// Like `get`, but reports unknown names as an error.
    pub fn require(&self, name: &str) -> Result<Arc<Model>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::ModelNotFound(name.trim().to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name.trim())
    }

    /// Returns sorted model names.
    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelRegistry, RegistryError};
    use crate::model::definition::Definition;
    use crate::model::field::FieldDescriptor;
    use crate::schema::{create_schema, SchemaOptions};
    use std::sync::Arc;

    #[test]
    fn register_is_idempotent_per_name() {
        let mut registry = ModelRegistry::new();
        let first = registry
            .register(
                "Shop",
                create_schema(
                    Definition::new().field("name", FieldDescriptor::string()),
                    SchemaOptions::default(),
                ),
            )
            .unwrap();
        let second = registry
            .register("Shop", create_schema(Definition::new(), SchemaOptions::default()))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.schema().definition().contains("name"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_invalid_names_and_reports_missing_models() {
        let mut registry = ModelRegistry::new();
        let err = registry
            .register("bad name", create_schema(Definition::new(), SchemaOptions::default()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidModelName(_)));

        let missing = registry.require("Ghost").unwrap_err();
        assert!(matches!(missing, RegistryError::ModelNotFound(name) if name == "Ghost"));
    }
}
