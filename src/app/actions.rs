use crate::app::selection::Selection;
use crate::error::AppError;
use crate::records::{Category, Record, RecordFields, RecordId};
use crate::storage::RecordStore;

/// Applies record writes through the store. Validation runs first so a
/// blank field never reaches the store; nothing is retried.
pub struct MutationCoordinator<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> MutationCoordinator<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub fn insert(&self, fields: &RecordFields) -> Result<Record, AppError> {
        let fields = fields.validate()?;
        let record = self.store.insert(&fields).map_err(|err| {
            tracing::error!(?err, category = %fields.category(), "failed to insert record");
            err
        })?;
        tracing::info!(id = %record.id, category = %record.category(), "record added");
        Ok(record)
    }

    /// Replaces every editable field of one record. The caller refetches on success.
    pub fn update(&self, id: &RecordId, fields: &RecordFields) -> Result<RecordFields, AppError> {
        let fields = fields.validate()?;
        self.store.update(id, &fields).map_err(|err| {
            tracing::error!(?err, id = %id, "failed to update record");
            err
        })?;
        tracing::info!(id = %id, "record updated");
        Ok(fields)
    }

    /// Deletes `ids` as one batch. Selection entries are dropped only after
    /// the store confirms; on failure the selection is left untouched.
    pub fn delete(
        &self,
        category: Category,
        ids: &[RecordId],
        selection: &mut Selection,
    ) -> Result<usize, AppError> {
        let removed = self.store.delete_many(category, ids).map_err(|err| {
            tracing::error!(?err, count = ids.len(), category = %category, "failed to delete records");
            err
        })?;
        selection.remove_many(ids);
        tracing::info!(requested = ids.len(), removed, category = %category, "records deleted");
        Ok(removed)
    }
}
