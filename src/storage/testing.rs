use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use time::{Duration, OffsetDateTime};

use super::RecordStore;
use crate::error::StoreError;
use crate::records::{Category, Record, RecordFields, RecordId};
use crate::search::{Predicate, RecordQuery, SortDirection};

/// In-memory store with switchable failures for exercising error paths.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    fail_lists: Mutex<bool>,
    fail_writes: Mutex<bool>,
    pub list_calls: Mutex<Vec<(Category, RecordQuery)>>,
    inserted: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_lists(&self, fail: bool) {
        *self.fail_lists.lock().unwrap() = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn take_list_calls(&self) -> Vec<(Category, RecordQuery)> {
        std::mem::take(&mut *self.list_calls.lock().unwrap())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

fn matches(record: &Record, query: &RecordQuery) -> bool {
    query.predicates.iter().all(|predicate| match predicate {
        Predicate::Contains { column, needle } => record
            .fields
            .get(column)
            .map(|value| value.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        Predicate::CreatedWithin(range) => range.contains(record.created_at),
    })
}

impl RecordStore for MemoryStore {
    fn list(&self, category: Category, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        self.list_calls
            .lock()
            .unwrap()
            .push((category, query.clone()));
        if *self.fail_lists.lock().unwrap() {
            return Err(StoreError::Unavailable("simulated timeout".into()));
        }
        let records = self.records.lock().unwrap();
        let mut hits: Vec<Record> = records
            .iter()
            .rev()
            .filter(|record| record.category() == category && matches(record, query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if query.order == SortDirection::Ascending {
            hits.reverse();
        }
        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    fn insert(&self, fields: &RecordFields) -> Result<Record, StoreError> {
        self.check_writes()?;
        let seq = self.inserted.fetch_add(1, Ordering::SeqCst) as i64;
        let record = Record {
            id: RecordId::generate(),
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::days(19_000) + Duration::seconds(seq),
            fields: fields.clone(),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    fn update(&self, id: &RecordId, fields: &RecordFields) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        record.fields = fields.clone();
        Ok(())
    }

    fn delete_many(&self, category: Category, ids: &[RecordId]) -> Result<usize, StoreError> {
        self.check_writes()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|record| record.category() != category || !ids.contains(&record.id));
        Ok(before - records.len())
    }
}
