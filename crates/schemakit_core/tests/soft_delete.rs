use schemakit_core::{
    create_schema, open_db_in_memory, restore, soft_delete, DeletedFilter, Definition,
    DocumentQuery, DocumentStore, FieldDescriptor, Model, ModelRegistry, SchemaOptions,
    SqliteDocumentStore, StoreError,
};
use std::sync::Arc;

fn post_model() -> Arc<Model> {
    let mut registry = ModelRegistry::new();
    registry
        .register(
            "Post",
            create_schema(
                Definition::new().field("title", FieldDescriptor::string()),
                SchemaOptions::default(),
            ),
        )
        .unwrap()
}

fn count(store: &SqliteDocumentStore<'_>, model: &Model, deleted: DeletedFilter) -> u64 {
    store
        .count(model, &DocumentQuery::new().with_deleted(deleted))
        .unwrap()
}

#[test]
fn soft_delete_hides_document_but_keeps_row() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut document = model.new_document();
    document.set("title", "draft");
    store.insert(&model, &mut document).unwrap();

    soft_delete(&store, &model, &mut document).unwrap();
    assert!(document.is_deleted());

    assert!(store
        .find_by_id(&model, document.id, DeletedFilter::Exclude)
        .unwrap()
        .is_none());
    let stored = store
        .find_by_id(&model, document.id, DeletedFilter::Include)
        .unwrap()
        .unwrap();
    assert_eq!(stored.deleted_at, document.deleted_at);
    assert_eq!(stored.get("title"), document.get("title"));

    assert_eq!(count(&store, &model, DeletedFilter::Exclude), 0);
    assert_eq!(count(&store, &model, DeletedFilter::Only), 1);
    assert_eq!(count(&store, &model, DeletedFilter::Include), 1);
}

#[test]
fn deleting_twice_moves_deleted_at_forward() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut document = model.new_document();
    store.insert(&model, &mut document).unwrap();

    soft_delete(&store, &model, &mut document).unwrap();
    let first = document.deleted_at.unwrap();
    soft_delete(&store, &model, &mut document).unwrap();
    let second = document.deleted_at.unwrap();

    assert!(second > first);
    assert_eq!(count(&store, &model, DeletedFilter::Only), 1);
}

#[test]
fn restore_clears_deletion_mark() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut document = model.new_document();
    store.insert(&model, &mut document).unwrap();
    soft_delete(&store, &model, &mut document).unwrap();

    restore(&store, &model, &mut document).unwrap();
    assert!(document.is_active());

    let stored = store
        .find_by_id(&model, document.id, DeletedFilter::Exclude)
        .unwrap()
        .unwrap();
    assert_eq!(stored.deleted_at, None);
}

#[test]
fn failed_save_rolls_back_deletion_mark() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut unsaved = model.new_document();
    let err = soft_delete(&store, &model, &mut unsaved).unwrap_err();

    assert!(matches!(err, StoreError::NotFound(id) if id == unsaved.id));
    assert_eq!(unsaved.deleted_at, None);
}

#[test]
fn destroy_removes_row_physically() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    let model = post_model();

    let mut document = model.new_document();
    store.insert(&model, &mut document).unwrap();
    soft_delete(&store, &model, &mut document).unwrap();

    store.destroy(&model, document.id).unwrap();
    assert_eq!(count(&store, &model, DeletedFilter::Include), 0);

    let err = store.destroy(&model, document.id).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == document.id));
}
