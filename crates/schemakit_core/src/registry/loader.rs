//! JSON model file loading.
//!
//! A model file is an object with a required `attributes` definition, an
//! optional `options` object merged over `SchemaOptions::default()` and an
//! optional `modelName` overriding the name derived from the file stem.

use super::{Model, ModelRegistry, RegistryError};
use crate::model::definition::Definition;
use crate::schema::{create_schema, SchemaOptions};
use log::{debug, error, info};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const MODEL_FILE_EXTENSION: &str = "json";

impl ModelRegistry {
    /// Builds and registers a model from its JSON file contents.
    ///
    /// # Errors
    /// - `MissingAttributes` when `attributes` is absent or not an object.
    /// - `InvalidOptions`/`Definition` when either part fails to parse.
    pub fn load_model(&mut self, name: &str, source: &Value) -> Result<Arc<Model>, RegistryError> {
        let attributes = match source.get("attributes") {
            Some(attributes) if attributes.is_object() => attributes,
            _ => return Err(RegistryError::MissingAttributes(name.to_string())),
        };

        let options = match source.get("options") {
            Some(options) => serde_json::from_value::<SchemaOptions>(options.clone()).map_err(
                |source| RegistryError::InvalidOptions {
                    model: name.to_string(),
                    source,
                },
            )?,
            None => SchemaOptions::default(),
        };

        let definition =
            Definition::from_json(attributes).map_err(|source| RegistryError::Definition {
                model: name.to_string(),
                source,
            })?;

        self.register(name, create_schema(definition, options))
    }

    /// Loads every `*.json` model file in `dir`, in file name order.
    ///
    /// Names that are already registered are skipped. Returns the names
    /// registered by this call.
    pub fn load_model_dir(&mut self, dir: impl AsRef<Path>) -> Result<Vec<String>, RegistryError> {
        let dir = dir.as_ref();
        let read_dir = fs::read_dir(dir).map_err(|source| RegistryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| RegistryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(MODEL_FILE_EXTENSION)
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = Vec::new();
        for path in paths {
            match self.load_model_file(&path) {
                Ok(Some(name)) => loaded.push(name),
                Ok(None) => {}
                Err(err) => {
                    error!(
                        "event=model_load module=registry status=error path={} error={}",
                        path.display(),
                        err
                    );
                    return Err(err);
                }
            }
        }

        info!(
            "event=model_load module=registry status=ok dir={} loaded={}",
            dir.display(),
            loaded.len()
        );
        Ok(loaded)
    }

    fn load_model_file(&mut self, path: &Path) -> Result<Option<String>, RegistryError> {
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source: Value = serde_json::from_str(&text).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let name = match source.get("modelName").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => {
                let stem = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or_default();
                model_name_from_file_stem(stem)
            }
        };

        if self.contains(&name) {
            debug!("event=model_load module=registry status=skipped model={name}");
            return Ok(None);
        }

        self.load_model(&name, &source)?;
        Ok(Some(name))
    }
}

/// Start-cases a file stem into a model name: `audit-entry` -> `AuditEntry`.
pub fn model_name_from_file_stem(stem: &str) -> String {
    stem.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
