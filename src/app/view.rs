use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::app::fetch::FetchResponse;
use crate::app::filter::FilterController;
use crate::app::selection::{header_checked, Selection};
use crate::records::{Category, Record, RecordId};
use crate::search::{build_query, FilterState, Mode, RecordQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed,
    Stale,
}

#[derive(Debug, Clone)]
struct InFlight {
    generation: u64,
    filter: FilterState,
}

/// State of one category's record table. Dropped and rebuilt whenever the
/// operator navigates away, so nothing leaks between sections.
#[derive(Debug, Clone)]
pub struct RecordView {
    category: Category,
    recent_limit: usize,
    records: Vec<Record>,
    shown: FilterState,
    filters: FilterController,
    selection: Selection,
    cursor: usize,
    in_flight: Option<InFlight>,
    last_error: Option<String>,
}

impl RecordView {
    pub fn new(category: Category, debounce: Duration, recent_limit: usize) -> Self {
        Self {
            category,
            recent_limit,
            records: Vec::new(),
            shown: FilterState::default(),
            filters: FilterController::new(debounce),
            selection: Selection::default(),
            cursor: 0,
            in_flight: None,
            last_error: None,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn filters(&self) -> &FilterController {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterController {
        &mut self.filters
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn query_for(&self, filter: &FilterState) -> RecordQuery {
        build_query(self.category, filter, self.recent_limit)
    }

    /// Filter state of the last change not yet fetched, if the debounce settled.
    pub fn poll_filters(&mut self, now: Instant) -> Option<FilterState> {
        self.filters.poll(now)
    }

    /// Filter to use for a refresh after a mutation.
    pub fn current_filter(&self) -> FilterState {
        self.filters.applied().clone()
    }

    pub fn begin_fetch(&mut self, generation: u64, filter: FilterState) {
        self.in_flight = Some(InFlight { generation, filter });
    }

    /// Applies a response only when it answers the newest request.
    pub fn complete_fetch(&mut self, response: FetchResponse) -> FetchOutcome {
        let awaited = self
            .in_flight
            .as_ref()
            .map(|flight| flight.generation == response.generation && response.category == self.category)
            .unwrap_or(false);
        if !awaited {
            tracing::debug!(generation = response.generation, "discarding stale fetch response");
            return FetchOutcome::Stale;
        }
        let Some(flight) = self.in_flight.take() else {
            return FetchOutcome::Stale;
        };
        match response.result {
            Ok(records) => {
                self.records = records;
                self.shown = flight.filter;
                self.last_error = None;
                self.clamp_cursor();
                FetchOutcome::Applied
            }
            Err(err) => {
                self.last_error = Some(format!("Failed to fetch records: {err}"));
                FetchOutcome::Failed
            }
        }
    }

    /// Drops the in-flight request without a response, keeping current rows.
    pub fn abandon_fetch(&mut self, message: String) {
        self.in_flight = None;
        self.last_error = Some(message);
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn awaited_generation(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|flight| flight.generation)
    }

    /// True while a search (as opposed to a browse) is in flight.
    pub fn is_searching(&self) -> bool {
        self.in_flight
            .as_ref()
            .map(|flight| flight.filter.mode() == Mode::Searching)
            .unwrap_or(false)
    }

    /// Filters the displayed rows were fetched with.
    pub fn shown_filter(&self) -> &FilterState {
        &self.shown
    }

    pub fn shown_mode(&self) -> Mode {
        self.shown.mode()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Record> {
        self.records.get(self.cursor)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.records.is_empty() {
            return;
        }
        let last = self.records.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    fn clamp_cursor(&mut self) {
        if self.records.is_empty() {
            self.cursor = 0;
        } else if self.cursor >= self.records.len() {
            self.cursor = self.records.len() - 1;
        }
    }

    pub fn toggle_current(&mut self) -> Option<bool> {
        let id = self.current()?.id.clone();
        Some(self.selection.toggle(&id))
    }

    pub fn toggle_all(&mut self) {
        self.selection.toggle_all(&self.records);
    }

    pub fn header_checked(&self) -> bool {
        header_checked(&self.selection, &self.records)
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.selection.contains(id)
    }

    /// Ids a bulk delete would target: selected and currently visible.
    pub fn selected_visible(&self) -> Vec<RecordId> {
        self.selection.effective(&self.records)
    }

    /// Year choices for the selector, newest first.
    pub fn available_years(&self, current_year: i32) -> Vec<i32> {
        let mut years = BTreeSet::new();
        years.insert(current_year);
        for record in &self.records {
            years.insert(record.created_at.year());
        }
        if let Some(year) = self.filters.raw().year {
            years.insert(year);
        }
        years.into_iter().rev().collect()
    }

    /// Summary under the table.
    pub fn footer(&self) -> String {
        let count = self.records.len();
        match self.shown_mode() {
            Mode::Searching => format!(
                "Found {count} matching record{}",
                if count == 1 { "" } else { "s" }
            ),
            Mode::Browsing => format!(
                "Showing last {count} record{} (type to search across all records)",
                if count == 1 { "" } else { "s" }
            ),
        }
    }
}
