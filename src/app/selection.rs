use indexmap::IndexSet;

use crate::records::{Record, RecordId};

/// Ids ticked in the table. Ids that are no longer visible are kept but never
/// counted: every query goes through the visible rows.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: IndexSet<RecordId>,
}

impl Selection {
    pub fn contains(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    /// Flips one id; returns whether it is now selected.
    pub fn toggle(&mut self, id: &RecordId) -> bool {
        if self.ids.shift_remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    /// Header checkbox: select exactly the visible rows, or clear when they
    /// are all selected already.
    pub fn toggle_all(&mut self, visible: &[Record]) {
        if header_checked(self, visible) {
            self.clear();
        } else {
            self.ids = visible.iter().map(|record| record.id.clone()).collect();
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn remove_many(&mut self, ids: &[RecordId]) {
        for id in ids {
            self.ids.shift_remove(id);
        }
    }

    /// Selected ids among `visible`, in row order.
    pub fn effective(&self, visible: &[Record]) -> Vec<RecordId> {
        visible
            .iter()
            .filter(|record| self.ids.contains(&record.id))
            .map(|record| record.id.clone())
            .collect()
    }

    pub fn effective_count(&self, visible: &[Record]) -> usize {
        visible
            .iter()
            .filter(|record| self.ids.contains(&record.id))
            .count()
    }

    pub fn raw_len(&self) -> usize {
        self.ids.len()
    }
}

pub fn header_checked(selection: &Selection, visible: &[Record]) -> bool {
    !visible.is_empty() && selection.effective_count(visible) == visible.len()
}
