//! Client-safe JSON projection of documents.

use super::{
    Schema, SerializeOptions, CREATED_AT_FIELD, DELETED_AT_FIELD, ID_FIELD, PRIVATE_PREFIX,
    RESERVED_FIELDS, UPDATED_AT_FIELD,
};
use crate::model::definition::{Definition, FieldDef};
use crate::model::document::Document;
use serde_json::{Map, Value};

impl Schema {
    /// Projects a document with the schema's default options.
    pub fn serialize(&self, document: &Document) -> Map<String, Value> {
        self.serialize_with(document, &self.options.serialize)
    }

    /// Projects a document with explicit options.
    ///
    /// Output holds the readable fields, the computed `id` and any set
    /// lifecycle timestamps (epoch milliseconds). The revision counter is
    /// never emitted.
    pub fn serialize_with(
        &self,
        document: &Document,
        options: &SerializeOptions,
    ) -> Map<String, Value> {
        let mut output = document.fields.clone();
        if let Some(hook) = &self.options.pre_filter {
            hook(document, &mut output);
        }

        transform_object(&mut output, Some(&self.definition), options);

        for key in RESERVED_FIELDS {
            output.remove(*key);
        }
        output.insert(ID_FIELD.to_string(), Value::String(document.id.to_string()));
        let timestamps = [
            (CREATED_AT_FIELD, document.created_at),
            (UPDATED_AT_FIELD, document.updated_at),
            (DELETED_AT_FIELD, document.deleted_at),
        ];
        for (key, value) in timestamps {
            if let Some(epoch_ms) = value {
                output.insert(key.to_string(), Value::from(epoch_ms));
            }
        }

        output
    }

    /// `serialize` wrapped as a JSON value.
    pub fn to_json(&self, document: &Document) -> Value {
        Value::Object(self.serialize(document))
    }
}

fn transform_object(
    object: &mut Map<String, Value>,
    definition: Option<&Definition>,
    options: &SerializeOptions,
) {
    object.retain(|key, _| {
        !key.starts_with(PRIVATE_PREFIX)
            && definition
                .and_then(|definition| definition.get(key))
                .map_or(true, |field| is_readable(field, options))
    });

    for (key, value) in object.iter_mut() {
        let field = definition.and_then(|definition| definition.get(key));
        transform_value(value, field, options);
    }
}

fn transform_value(value: &mut Value, field: Option<&FieldDef>, options: &SerializeOptions) {
    match value {
        Value::Object(map) => {
            let nested = match field {
                Some(FieldDef::Nested(definition)) => Some(definition),
                _ => None,
            };
            transform_object(map, nested, options);
        }
        Value::Array(items) => {
            let inner = match field {
                Some(FieldDef::Array(inner)) => Some(inner.as_ref()),
                _ => None,
            };
            for item in items {
                transform_value(item, inner, options);
            }
        }
        _ => {}
    }
}

fn is_readable(field: &FieldDef, options: &SerializeOptions) -> bool {
    if options.include_private {
        return true;
    }
    match field.resolve() {
        Some(descriptor) => {
            !descriptor.is_private() && descriptor.read_scopes.permits(&options.scopes)
        }
        None => true,
    }
}
