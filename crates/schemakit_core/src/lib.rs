//! Schema, assignment and serialization layer for document models.
//!
//! Models are declared as field definitions, augmented with lifecycle
//! fields by `create_schema`, registered in an explicit `ModelRegistry`,
//! and persisted through a `DocumentStore`. Untrusted payloads flow in
//! through `assign_fields` and out through `Schema::serialize`.

pub mod config;
pub mod logging;
pub mod model;
pub mod registry;
pub mod schema;
pub mod service;
pub mod store;
pub mod validation;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::definition::{Definition, DefinitionError, FieldDef};
pub use model::document::{Document, DocumentId};
pub use model::field::{Access, FieldDescriptor, FieldType, ReadScopes};
pub use registry::{Model, ModelRegistry, RegistryError};
pub use schema::{
    apply_defaults, assign_fields, create_schema, restore, soft_delete, AssignError, AssignPolicy,
    Schema, SchemaOptions, SerializeOptions,
};
pub use service::resource_service::{ResourceService, ServiceError, ServiceResult};
pub use store::{
    open_db, open_db_in_memory, DeletedFilter, DocumentQuery, DocumentStore, SqliteDocumentStore,
    StoreError, StoreResult,
};
pub use validation::{
    validator_for_definition, DefinitionValidator, FieldError, FieldValidator, ValidationErrors,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
