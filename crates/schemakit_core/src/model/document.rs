//! Document (model instance) record.
//!
//! # Responsibility
//! - Hold one record's identity, field values and lifecycle timestamps.
//! - Provide direct, unfiltered field access for trusted callers.
//!
//! # Invariants
//! - `id` is stable and never reused for another document.
//! - `deleted_at` is the source of truth for soft-delete state.
//! - Lifecycle timestamps live outside `fields` and are store-managed.

use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a document.
pub type DocumentId = Uuid;

/// One persisted (or pending-persist) record of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    /// Registered name of the owning model.
    pub model: String,
    /// User-defined field values.
    pub fields: Map<String, Value>,
    /// Unix epoch milliseconds.
    pub created_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub updated_at: Option<i64>,
    /// Unix epoch milliseconds. `Some` marks the document as soft-deleted.
    pub deleted_at: Option<i64>,
    /// Revision counter, bumped by the store on every save.
    pub version: u64,
}

impl Document {
    /// Creates an empty, unsaved document with a generated id.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), model)
    }

    /// Creates an empty document with a caller-provided id.
    pub fn with_id(id: DocumentId, model: impl Into<String>) -> Self {
        Self {
            id,
            model: model.into(),
            fields: Map::new(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
            version: 0,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets a field directly, bypassing assign filtering.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Removes a field, returning the previous value.
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted()
    }

    /// Marks the document deleted at a timestamp strictly later than any
    /// previous deletion mark.
    pub(crate) fn mark_deleted(&mut self) {
        let now = now_epoch_ms();
        self.deleted_at = Some(match self.deleted_at {
            Some(previous) if previous >= now => previous + 1,
            _ => now,
        });
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
