//! Declarative model definitions and document records.
//!
//! # Responsibility
//! - Define field descriptors and the definition tree built from them.
//! - Define the document record that schemas mutate and serialize.
//!
//! # Invariants
//! - Field types form a closed tag set; no runtime symbol lookup.
//! - Deletion is represented by a `deleted_at` timestamp, not hard delete.

pub mod definition;
pub mod document;
pub mod field;
