//! Resource use-case service.
//!
//! # Responsibility
//! - Implement the route-handler contract: validate, assign, persist and
//!   serialize documents of a registered model.
//! - Delegate persistence to `DocumentStore` implementations.
//!
//! # Invariants
//! - Every returned resource went through the schema serialization
//!   transform with the schema's default options.
//! - Payloads are validated before any document is mutated.

use crate::model::document::{Document, DocumentId};
use crate::registry::Model;
use crate::schema::{apply_defaults, assign_fields, restore, soft_delete, AssignError};
use crate::store::{DeletedFilter, DocumentQuery, DocumentStore, StoreError};
use crate::validation::ValidationErrors;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for resource use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Payload failed derived field validation.
    Validation(ValidationErrors),
    /// Payload names fields the strict assign policy rejects.
    Assign(AssignError),
    /// Target document does not exist (or is not visible).
    NotFound(DocumentId),
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Assign(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "resource not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Assign(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<AssignError> for ServiceError {
    fn from(value: AssignError) -> Self {
        Self::Assign(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Use-case service over one document store.
pub struct ResourceService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> ResourceService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a document from an untrusted payload.
    ///
    /// # Contract
    /// - Validates with `Schema::create_validator`.
    /// - Applies declared defaults, then assigns the filtered payload.
    /// - Returns the serialized resource.
    pub fn create(
        &self,
        model: &Model,
        payload: Map<String, Value>,
    ) -> ServiceResult<Map<String, Value>> {
        let schema = model.schema();
        schema.create_validator().validate(&payload)?;

        let mut document = model.new_document();
        assign_fields(&mut document, schema, payload)?;
        apply_defaults(&mut document, schema);
        self.store.insert(model, &mut document)?;

        Ok(schema.serialize(&document))
    }

    /// Applies a partial update to an active document.
    ///
    /// Missing required keys are accepted, but an explicit `null` (or a
    /// falsy reference) on a required field fails validation. Reserved and
    /// private keys are filtered by assign.
    pub fn update(
        &self,
        model: &Model,
        id: DocumentId,
        payload: Map<String, Value>,
    ) -> ServiceResult<Map<String, Value>> {
        let schema = model.schema();
        schema.update_validator().validate(&payload)?;

        let mut document = self.load(model, id, DeletedFilter::Exclude)?;
        assign_fields(&mut document, schema, payload)?;
        self.store.save(model, &mut document)?;

        Ok(schema.serialize(&document))
    }

    /// Returns one active resource.
    pub fn get(&self, model: &Model, id: DocumentId) -> ServiceResult<Map<String, Value>> {
        let document = self.load(model, id, DeletedFilter::Exclude)?;
        Ok(model.schema().serialize(&document))
    }

    /// Lists resources matching `query`.
    pub fn list(
        &self,
        model: &Model,
        query: &DocumentQuery,
    ) -> ServiceResult<Vec<Map<String, Value>>> {
        let schema = model.schema();
        Ok(self
            .store
            .find(model, query)?
            .iter()
            .map(|document| schema.serialize(document))
            .collect())
    }

    /// Soft-deletes a document. Deleting an already deleted document moves
    /// its deletion timestamp forward.
    pub fn delete(&self, model: &Model, id: DocumentId) -> ServiceResult<()> {
        let mut document = self.load(model, id, DeletedFilter::Include)?;
        soft_delete(&self.store, model, &mut document)?;
        Ok(())
    }

    /// Restores a soft-deleted document.
    pub fn restore(&self, model: &Model, id: DocumentId) -> ServiceResult<Map<String, Value>> {
        let mut document = self.load(model, id, DeletedFilter::Only)?;
        restore(&self.store, model, &mut document)?;
        Ok(model.schema().serialize(&document))
    }

    fn load(
        &self,
        model: &Model,
        id: DocumentId,
        deleted: DeletedFilter,
    ) -> ServiceResult<Document> {
        self.store
            .find_by_id(model, id, deleted)?
            .ok_or(ServiceError::NotFound(id))
    }
}
