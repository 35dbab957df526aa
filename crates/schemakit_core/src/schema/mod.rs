//! Schema builder over model definitions.
//!
//! # Responsibility
//! - Augment a definition with lifecycle fields (`deletedAt`, timestamps).
//! - Own the options that drive assign filtering and serialization.
//! - Expose assign, soft-delete and serialization as free functions and
//!   schema methods instead of per-instance method injection.
//!
//! # Invariants
//! - `deletedAt` is always injected; options cannot remove it.
//! - `RESERVED_FIELDS` are never writable through `assign_fields`.
//! - Serialized projections never expose `_`-prefixed keys.

use crate::model::definition::Definition;
use crate::model::document::Document;
use crate::model::field::FieldDescriptor;
use crate::validation::{validator_for_definition, DefinitionValidator};
use log::warn;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

mod assign;
mod lifecycle;
mod serialize;

pub use assign::{apply_defaults, assign_fields, AssignError};
pub(crate) use assign::is_falsy;
pub use lifecycle::{restore, soft_delete};

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";
pub const DELETED_AT_FIELD: &str = "deletedAt";

/// Lifecycle-managed names that callers may never assign.
pub const RESERVED_FIELDS: &[&str] = &[
    ID_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    DELETED_AT_FIELD,
];

/// Keys starting with this prefix are internal and never serialized.
pub const PRIVATE_PREFIX: char = '_';

/// Extra projection step run before field filtering.
pub type SerializeHook = Arc<dyn Fn(&Document, &mut Map<String, Value>) + Send + Sync>;

/// How `assign_fields` treats fields it may not write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignPolicy {
    /// Silently drop reserved and private fields, accept undeclared ones.
    #[default]
    Tolerant,
    /// Reject the whole payload on reserved, private or undeclared fields.
    Strict,
}

/// Per-call serialization options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializeOptions {
    /// Trusted internal contexts only.
    pub include_private: bool,
    /// Caller scopes matched against field `readScopes`.
    pub scopes: Vec<String>,
}

impl SerializeOptions {
    pub fn trusted() -> Self {
        Self {
            include_private: true,
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include_private: false,
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Store-level schema options.
///
/// Caller values override `Default`; partial JSON objects merge on top of
/// the defaults through `#[serde(default)]`.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaOptions {
    /// Maintain `createdAt`/`updatedAt`.
    pub timestamps: bool,
    pub assign_policy: AssignPolicy,
    /// Compare-and-swap saves on the document revision counter.
    pub optimistic_concurrency: bool,
    /// Projection options used by `Schema::serialize`. `include_private`
    /// is cleared by `create_schema`; trusted callers pass
    /// `SerializeOptions::trusted()` to `Schema::serialize_with` instead.
    pub serialize: SerializeOptions,
    #[serde(skip)]
    pub pre_filter: Option<SerializeHook>,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            timestamps: true,
            assign_policy: AssignPolicy::Tolerant,
            optimistic_concurrency: false,
            serialize: SerializeOptions::default(),
            pre_filter: None,
        }
    }
}

impl Debug for SchemaOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaOptions")
            .field("timestamps", &self.timestamps)
            .field("assign_policy", &self.assign_policy)
            .field("optimistic_concurrency", &self.optimistic_concurrency)
            .field("serialize", &self.serialize)
            .field("pre_filter", &self.pre_filter.is_some())
            .finish()
    }
}

/// Augmented definition plus options, ready to be registered as a model.
#[derive(Debug, Clone)]
pub struct Schema {
    definition: Definition,
    options: SchemaOptions,
}

/// Builds a schema from a definition and options.
///
/// Injects `deletedAt` and, when `options.timestamps` is set,
/// `createdAt`/`updatedAt`. Clears `options.serialize.include_private` so
/// the default projection stays client-safe. Performs no I/O and never
/// fails.
pub fn create_schema(definition: Definition, options: SchemaOptions) -> Schema {
    let mut definition = definition;
    let mut options = options;
    if options.serialize.include_private {
        warn!("event=schema_create module=schema status=ignored option=serialize.includePrivate");
        options.serialize.include_private = false;
    }
    definition.insert(DELETED_AT_FIELD, FieldDescriptor::date());
    if options.timestamps {
        definition.insert(CREATED_AT_FIELD, FieldDescriptor::date());
        definition.insert(UPDATED_AT_FIELD, FieldDescriptor::date());
    }
    Schema {
        definition,
        options,
    }
}

impl Schema {
    /// Augmented definition, including injected lifecycle fields.
    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn timestamps(&self) -> bool {
        self.options.timestamps
    }

    /// Body validator for create payloads. Reserved and private fields are
    /// stripped since assign never writes them.
    pub fn create_validator(&self) -> DefinitionValidator {
        let private: Vec<&str> = self
            .definition
            .iter()
            .filter(|(_, field)| field.is_private())
            .map(|(name, _)| name.as_str())
            .collect();
        validator_for_definition(&self.definition)
            .without_fields(RESERVED_FIELDS)
            .without_fields(&private)
    }

    /// Body validator for partial updates. Missing required fields are
    /// accepted; an explicit `null` on one is not.
    pub fn update_validator(&self) -> DefinitionValidator {
        self.create_validator().skip_required()
    }
}

/// Returns whether `key` is lifecycle-managed.
pub fn is_reserved_field(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::{
        create_schema, AssignPolicy, SchemaOptions, CREATED_AT_FIELD, DELETED_AT_FIELD,
        UPDATED_AT_FIELD,
    };
    use crate::model::definition::Definition;
    use crate::model::field::FieldDescriptor;
    use serde_json::json;

    #[test]
    fn injects_lifecycle_fields_by_default() {
        let schema = create_schema(
            Definition::new().field("name", FieldDescriptor::string()),
            SchemaOptions::default(),
        );
        let definition = schema.definition();
        assert!(definition.contains("name"));
        assert!(definition.contains(DELETED_AT_FIELD));
        assert!(definition.contains(CREATED_AT_FIELD));
        assert!(definition.contains(UPDATED_AT_FIELD));
    }

    #[test]
    fn timestamps_can_be_disabled_but_deleted_at_cannot() {
        let options = SchemaOptions {
            timestamps: false,
            ..SchemaOptions::default()
        };
        let schema = create_schema(Definition::new(), options);
        assert!(schema.definition().contains(DELETED_AT_FIELD));
        assert!(!schema.definition().contains(CREATED_AT_FIELD));
    }

    #[test]
    fn schema_level_include_private_is_cleared() {
        let options: SchemaOptions =
            serde_json::from_value(json!({ "serialize": { "includePrivate": true } })).unwrap();
        let schema = create_schema(Definition::new(), options);
        assert!(!schema.options().serialize.include_private);
    }

    #[test]
    fn create_validator_skips_private_fields() {
        let schema = create_schema(
            Definition::new()
                .field("title", FieldDescriptor::string().required())
                .field("token", FieldDescriptor::string().required().private()),
            SchemaOptions::default(),
        );
        let validator = schema.create_validator();
        assert!(validator.declares("title"));
        assert!(!validator.declares("token"));
        assert!(validator
            .validate(&serde_json::from_value(json!({ "title": "t" })).unwrap())
            .is_ok());
    }

    #[test]
    fn partial_json_options_merge_over_defaults() {
        let options: SchemaOptions =
            serde_json::from_value(json!({ "assignPolicy": "strict" })).unwrap();
        assert!(options.timestamps);
        assert_eq!(options.assign_policy, AssignPolicy::Strict);
        assert!(!options.optimistic_concurrency);
    }
}
