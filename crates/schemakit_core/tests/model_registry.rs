use schemakit_core::{
    create_schema, Definition, DefinitionError, FieldDef, FieldDescriptor, FieldType,
    ModelRegistry, RegistryError, SchemaOptions,
};
use std::fs;
use std::sync::Arc;

#[test]
fn register_returns_existing_model_for_known_name() {
    let mut registry = ModelRegistry::new();
    let first = registry
        .register(
            "User",
            create_schema(
                Definition::new().field("name", FieldDescriptor::string()),
                SchemaOptions::default(),
            ),
        )
        .unwrap();
    let second = registry
        .register("User", create_schema(Definition::new(), SchemaOptions::default()))
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.schema().definition().contains("name"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn register_rejects_invalid_names() {
    let mut registry = ModelRegistry::new();
    for name in ["", "9lives", "bad name", "drop;table"] {
        let err = registry
            .register(name, create_schema(Definition::new(), SchemaOptions::default()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidModelName(_)), "{name}");
    }
    assert!(registry.is_empty());
}

#[test]
fn require_reports_unknown_models() {
    let registry = ModelRegistry::new();
    let err = registry.require("Ghost").unwrap_err();
    assert!(matches!(err, RegistryError::ModelNotFound(name) if name == "Ghost"));
}

#[test]
fn load_model_dir_registers_json_models_in_file_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("blog-post.json"),
        r#"{
            "attributes": {
                "title": { "type": "String", "required": true, "maxLength": 120 },
                "author": { "type": "ObjectId", "ref": "User" },
                "secret": { "type": "String", "access": "private" },
                "tags": ["String"],
                "meta": { "views": "Number" }
            },
            "options": { "assignPolicy": "strict" }
        }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("user.json"),
        r#"{ "modelName": "Account", "attributes": { "email": "String" } }"#,
    )
    .unwrap();
    fs::write(dir.path().join("README.txt"), "not a model").unwrap();

    let mut registry = ModelRegistry::new();
    let loaded = registry.load_model_dir(dir.path()).unwrap();
    assert_eq!(loaded, vec!["BlogPost".to_string(), "Account".to_string()]);
    assert_eq!(registry.names(), vec!["Account".to_string(), "BlogPost".to_string()]);

    let post = registry.require("BlogPost").unwrap();
    let definition = post.schema().definition();
    match definition.get("title") {
        Some(FieldDef::Scalar(descriptor)) => {
            assert_eq!(descriptor.kind, FieldType::String);
            assert!(descriptor.required);
            assert_eq!(descriptor.max_length, Some(120.0));
        }
        other => panic!("unexpected title definition: {other:?}"),
    }
    assert!(definition.get("author").unwrap().is_reference());
    assert!(definition.get("secret").unwrap().is_private());
    assert!(matches!(definition.get("tags"), Some(FieldDef::Array(_))));
    assert!(matches!(definition.get("meta"), Some(FieldDef::Nested(_))));
    assert!(definition.contains("deletedAt"));

    let reloaded = registry.load_model_dir(dir.path()).unwrap();
    assert!(reloaded.is_empty());
}

#[test]
fn load_model_dir_reports_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let mut registry = ModelRegistry::new();
    let err = registry.load_model_dir(dir.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }));
}

#[test]
fn load_model_dir_reports_unknown_field_types() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("widget.json"),
        r#"{ "attributes": { "size": "Decimal128" } }"#,
    )
    .unwrap();

    let mut registry = ModelRegistry::new();
    let err = registry.load_model_dir(dir.path()).unwrap_err();
    match err {
        RegistryError::Definition { model, source } => {
            assert_eq!(model, "Widget");
            assert_eq!(
                source,
                DefinitionError::UnknownType {
                    field: "size".to_string(),
                    tag: "Decimal128".to_string(),
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!registry.contains("Widget"));
}

#[test]
fn load_model_dir_reports_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ModelRegistry::new();

    let err = registry
        .load_model_dir(dir.path().join("missing"))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));
}
