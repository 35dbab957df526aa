//! Mass-assignment filtering for untrusted payloads.

use super::{is_reserved_field, AssignPolicy, Schema};
use crate::logging::sanitize_message;
use crate::model::definition::FieldDef;
use crate::model::document::Document;
use log::debug;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_LOGGED_KEYS_CHARS: usize = 160;

/// Assigns `fields` onto `document` after filtering.
///
/// Reserved and private fields are never written. Private sub-fields of
/// nested definitions keep the document's previous value when the client
/// replaces their parent object; array items are matched by position. A
/// falsy value (`null`, `false`, `0`, `""`) for a reference field unsets
/// the field instead of storing the literal. The document is mutated in
/// place; the caller persists it.
///
/// # Errors
/// - `AssignError::Rejected` under `AssignPolicy::Strict` when the payload
///   names a reserved, private or undeclared field. Nested private fields
///   are reported by dotted path (`profile.role`, `sessions.0.token`).
///   Nothing is written.
pub fn assign_fields(
    document: &mut Document,
    schema: &Schema,
    fields: Map<String, Value>,
) -> Result<(), AssignError> {
    let definition = schema.definition();
    let policy = schema.options().assign_policy;

    let rejected: Vec<String> = fields
        .keys()
        .filter(|key| {
            let disallowed = is_reserved_field(key)
                || definition.get(key).is_some_and(|field| field.is_private());
            let undeclared = policy == AssignPolicy::Strict && !definition.contains(key);
            disallowed || undeclared
        })
        .cloned()
        .collect();

    let mut nested = Vec::new();
    for (key, value) in &fields {
        if let Some(field) = definition.get(key).filter(|_| !rejected.contains(key)) {
            private_paths(value, field, key, &mut nested);
        }
    }

    if !rejected.is_empty() || !nested.is_empty() {
        if policy == AssignPolicy::Strict {
            return Err(AssignError::Rejected(
                rejected.into_iter().chain(nested).collect(),
            ));
        }
        let dropped = rejected.iter().chain(&nested).cloned().collect::<Vec<_>>();
        debug!(
            "event=assign_filter module=schema status=dropped model={} keys={}",
            document.model,
            sanitize_message(&dropped.join(","), MAX_LOGGED_KEYS_CHARS)
        );
    }

    for (key, mut value) in fields {
        if rejected.contains(&key) {
            continue;
        }
        let Some(field) = definition.get(&key) else {
            document.fields.insert(key, value);
            continue;
        };
        if field.is_reference() && is_falsy(&value) {
            document.unset(&key);
            continue;
        }
        keep_private(&mut value, document.fields.get(&key), field);
        document.fields.insert(key, value);
    }

    Ok(())
}

/// Collects dotted paths of private sub-fields named by `value`.
fn private_paths(value: &Value, field: &FieldDef, path: &str, out: &mut Vec<String>) {
    match (value, field) {
        (Value::Object(map), FieldDef::Nested(definition)) => {
            for (key, item) in map {
                let Some(sub) = definition.get(key) else {
                    continue;
                };
                let sub_path = format!("{path}.{key}");
                if sub.is_private() {
                    out.push(sub_path);
                } else {
                    private_paths(item, sub, &sub_path, out);
                }
            }
        }
        (Value::Array(items), FieldDef::Array(inner)) => {
            for (index, item) in items.iter().enumerate() {
                private_paths(item, inner, &format!("{path}.{index}"), out);
            }
        }
        _ => {}
    }
}

/// Replaces private sub-fields of `incoming` with their `previous` values,
/// or removes them when there is none.
fn keep_private(incoming: &mut Value, previous: Option<&Value>, field: &FieldDef) {
    match (incoming, field) {
        (Value::Object(map), FieldDef::Nested(definition)) => {
            let previous = previous.and_then(Value::as_object);
            for (key, sub) in definition {
                let old = previous.and_then(|object| object.get(key));
                if sub.is_private() {
                    match old {
                        Some(old) => {
                            map.insert(key.clone(), old.clone());
                        }
                        None => {
                            map.remove(key);
                        }
                    }
                } else if let Some(item) = map.get_mut(key) {
                    keep_private(item, old, sub);
                }
            }
        }
        (Value::Array(items), FieldDef::Array(inner)) => {
            let previous = previous.and_then(Value::as_array);
            for (index, item) in items.iter_mut().enumerate() {
                keep_private(item, previous.and_then(|list| list.get(index)), inner);
            }
        }
        _ => {}
    }
}

/// Fills missing fields that declare a `default`.
pub fn apply_defaults(document: &mut Document, schema: &Schema) {
    for (name, field) in schema.definition() {
        let default = match field {
            FieldDef::Scalar(descriptor) => descriptor.default.as_ref(),
            _ => None,
        };
        if let Some(value) = default {
            if !document.fields.contains_key(name) {
                document.fields.insert(name.clone(), value.clone());
            }
        }
    }
}

pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64().map_or(false, |n| n == 0.0 || n.is_nan()),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Assign failures under the strict policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    /// Payload keys that may not be assigned.
    Rejected(Vec<String>),
}

impl Display for AssignError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(keys) => write!(f, "fields may not be assigned: {}", keys.join(", ")),
        }
    }
}

impl Error for AssignError {}
