//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, assignment and store calls into the
//!   create/read/update/delete contract route handlers rely on.
//! - Keep transport layers decoupled from storage details.

pub mod resource_service;
