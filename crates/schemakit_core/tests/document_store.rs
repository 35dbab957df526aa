use schemakit_core::store::migrations::latest_version;
use schemakit_core::{
    create_schema, open_db_in_memory, DeletedFilter, Definition, Document, DocumentQuery,
    DocumentStore, FieldDescriptor, Model, ModelRegistry, SchemaOptions, SqliteDocumentStore,
    StoreError,
};
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;

fn register(registry: &mut ModelRegistry, name: &str, options: SchemaOptions) -> Arc<Model> {
    registry
        .register(
            name,
            create_schema(
                Definition::new()
                    .field("title", FieldDescriptor::string())
                    .field("views", FieldDescriptor::number())
                    .field("published", FieldDescriptor::boolean()),
                options,
            ),
        )
        .unwrap()
}

fn post_model() -> Arc<Model> {
    register(&mut ModelRegistry::new(), "Post", SchemaOptions::default())
}

fn insert_post(store: &SqliteDocumentStore<'_>, model: &Model, title: &str) -> Document {
    let mut document = model.new_document();
    document.set("title", title);
    store.insert(model, &mut document).unwrap();
    document
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let result = SqliteDocumentStore::try_new(&conn);

    match result {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn try_new_rejects_missing_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteDocumentStore::try_new(&conn);
    assert!(matches!(
        result,
        Err(StoreError::MissingRequiredTable("documents"))
    ));
}

#[test]
fn try_new_rejects_missing_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE documents (id TEXT PRIMARY KEY, model TEXT NOT NULL, body TEXT NOT NULL);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let result = SqliteDocumentStore::try_new(&conn);
    assert!(matches!(
        result,
        Err(StoreError::MissingRequiredColumn {
            table: "documents",
            column: "version",
        })
    ));
}

#[test]
fn insert_stamps_timestamps_and_roundtrips_fields() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut document = model.new_document();
    document.set("title", "hello");
    document.set("meta", json!({ "tags": ["a", "b"] }));
    let id = store.insert(&model, &mut document).unwrap();

    assert_eq!(id, document.id);
    assert!(document.created_at.is_some());
    assert_eq!(document.created_at, document.updated_at);
    assert_eq!(document.version, 0);

    let loaded = store
        .find_by_id(&model, id, DeletedFilter::Exclude)
        .unwrap()
        .unwrap();
    assert_eq!(loaded, document);
}

#[test]
fn insert_without_timestamps_leaves_them_unset() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = register(
        &mut ModelRegistry::new(),
        "Event",
        SchemaOptions {
            timestamps: false,
            ..SchemaOptions::default()
        },
    );

    let document = insert_post(&store, &model, "launch");
    assert_eq!(document.created_at, None);
    assert_eq!(document.updated_at, None);
}

#[test]
fn insert_rejects_duplicate_ids_and_foreign_documents() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut document = insert_post(&store, &model, "once");
    let err = store.insert(&model, &mut document).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(id) if id == document.id));

    let mut foreign = Document::new("Comment");
    let err = store.insert(&model, &mut foreign).unwrap_err();
    assert!(matches!(
        err,
        StoreError::ModelMismatch { expected, actual } if expected == "Post" && actual == "Comment"
    ));
}

#[test]
fn save_bumps_version_and_persists_fields() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut document = insert_post(&store, &model, "draft");
    let created_at = document.created_at;
    document.set("title", "final");
    store.save(&model, &mut document).unwrap();

    assert_eq!(document.version, 1);
    assert_eq!(document.created_at, created_at);
    assert!(document.updated_at >= created_at);

    let loaded = store
        .find_by_id(&model, document.id, DeletedFilter::Exclude)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.get("title"), Some(&json!("final")));
    assert_eq!(loaded.version, 1);
}

#[test]
fn save_unknown_document_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut document = model.new_document();
    let err = store.save(&model, &mut document).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == document.id));
}

#[test]
fn optimistic_concurrency_rejects_stale_saves() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = register(
        &mut ModelRegistry::new(),
        "Post",
        SchemaOptions {
            optimistic_concurrency: true,
            ..SchemaOptions::default()
        },
    );

    let inserted = insert_post(&store, &model, "v0");
    let mut first = store
        .find_by_id(&model, inserted.id, DeletedFilter::Exclude)
        .unwrap()
        .unwrap();
    let mut second = first.clone();

    first.set("title", "v1");
    store.save(&model, &mut first).unwrap();

    second.set("title", "conflicting");
    let err = store.save(&model, &mut second).unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionConflict { id, expected: 0 } if id == inserted.id
    ));
    assert_eq!(second.version, 0);

    let stored = store
        .find_by_id(&model, inserted.id, DeletedFilter::Exclude)
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("title"), Some(&json!("v1")));
}

#[test]
fn without_optimistic_concurrency_last_write_wins() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut first = insert_post(&store, &model, "v0");
    let mut second = first.clone();

    first.set("title", "v1");
    store.save(&model, &mut first).unwrap();
    second.set("title", "v2");
    store.save(&model, &mut second).unwrap();

    let stored = store
        .find_by_id(&model, first.id, DeletedFilter::Exclude)
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("title"), Some(&json!("v2")));
}

#[test]
fn find_filters_by_field_values() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut hello = model.new_document();
    hello.set("title", "hello");
    hello.set("views", 10);
    hello.set("published", true);
    store.insert(&model, &mut hello).unwrap();

    let mut draft = model.new_document();
    draft.set("title", "draft");
    draft.set("published", false);
    store.insert(&model, &mut draft).unwrap();

    let by_title = store
        .find(&model, &DocumentQuery::new().where_eq("title", "hello"))
        .unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].id, hello.id);

    let published = store
        .find(&model, &DocumentQuery::new().where_eq("published", true))
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, hello.id);

    let by_views = store
        .find(&model, &DocumentQuery::new().where_eq("views", 10))
        .unwrap();
    assert_eq!(by_views.len(), 1);

    let without_views = store
        .find(&model, &DocumentQuery::new().where_eq("views", json!(null)))
        .unwrap();
    assert_eq!(without_views.len(), 1);
    assert_eq!(without_views[0].id, draft.id);
}

#[test]
fn find_paginates_in_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let ids: Vec<_> = (0..5)
        .map(|index| insert_post(&store, &model, &format!("post-{index}")).id)
        .collect();

    let page = store
        .find(&model, &DocumentQuery::new().paginate(Some(2), 1))
        .unwrap();
    assert_eq!(
        page.iter().map(|document| document.id).collect::<Vec<_>>(),
        vec![ids[1], ids[2]]
    );

    let tail = store
        .find(&model, &DocumentQuery::new().paginate(None, 3))
        .unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].id, ids[3]);
}

#[test]
fn queries_are_scoped_to_the_model() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let mut registry = ModelRegistry::new();
    let posts = register(&mut registry, "Post", SchemaOptions::default());
    let pages = register(&mut registry, "Page", SchemaOptions::default());

    let post = insert_post(&store, &posts, "shared");
    insert_post(&store, &pages, "shared");

    assert_eq!(store.count(&posts, &DocumentQuery::new()).unwrap(), 1);
    assert_eq!(store.count(&pages, &DocumentQuery::new()).unwrap(), 1);
    assert!(store
        .find_by_id(&pages, post.id, DeletedFilter::Include)
        .unwrap()
        .is_none());
}

#[test]
fn invalid_filters_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let nested_path = store.find(&model, &DocumentQuery::new().where_eq("meta.tags", "a"));
    assert!(matches!(nested_path, Err(StoreError::InvalidQuery(_))));

    let injected = store.count(
        &model,
        &DocumentQuery::new().where_eq("title') OR 1=1 --", "x"),
    );
    assert!(matches!(injected, Err(StoreError::InvalidQuery(_))));

    let non_scalar = store.find(&model, &DocumentQuery::new().where_eq("title", json!(["a"])));
    assert!(matches!(non_scalar, Err(StoreError::InvalidQuery(_))));
}
