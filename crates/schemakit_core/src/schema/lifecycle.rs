//! Soft-delete lifecycle operations.

use crate::model::document::Document;
use crate::registry::Model;
use crate::store::{DocumentStore, StoreResult};
use log::info;

/// Marks `document` deleted and persists it through `store`.
///
/// Calling it again moves `deleted_at` forward; the document stays
/// deleted. The row is never physically removed. Persistence errors are
/// returned unchanged.
pub fn soft_delete<S>(store: &S, model: &Model, document: &mut Document) -> StoreResult<()>
where
    S: DocumentStore + ?Sized,
{
    let previous = document.deleted_at;
    document.mark_deleted();
    if let Err(err) = store.save(model, document) {
        document.deleted_at = previous;
        return Err(err);
    }

    info!(
        "event=document_soft_delete module=schema status=ok model={} id={}",
        model.name(),
        document.id
    );
    Ok(())
}

/// Clears the deletion mark of `document` and persists it.
pub fn restore<S>(store: &S, model: &Model, document: &mut Document) -> StoreResult<()>
where
    S: DocumentStore + ?Sized,
{
    let previous = document.deleted_at.take();
    if let Err(err) = store.save(model, document) {
        document.deleted_at = previous;
        return Err(err);
    }

    info!(
        "event=document_restore module=schema status=ok model={} id={}",
        model.name(),
        document.id
    );
    Ok(())
}
