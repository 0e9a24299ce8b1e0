use std::time::{Duration, Instant};

use time::Month;

use crate::error::ValidationErrors;
use crate::search::{Debounced, FilterState, Mode, TEXT_FILTERS};

/// Raw filter input plus its debounced projection.
///
/// Text slots are debounced; year, month and date apply immediately. Every
/// change to the effective state is reported exactly once, either from a
/// setter or from [`FilterController::poll`], and is what drives a fetch.
#[derive(Debug, Clone)]
pub struct FilterController {
    raw: FilterState,
    text: [Debounced<String>; TEXT_FILTERS],
    applied: FilterState,
}

impl FilterController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            raw: FilterState::default(),
            text: std::array::from_fn(|_| Debounced::new(String::new(), debounce)),
            applied: FilterState::default(),
        }
    }

    /// What the operator currently sees in the inputs.
    pub fn raw(&self) -> &FilterState {
        &self.raw
    }

    /// The state the most recent fetch was requested for.
    pub fn applied(&self) -> &FilterState {
        &self.applied
    }

    pub fn mode(&self) -> Mode {
        self.applied.mode()
    }

    pub fn is_pending(&self) -> bool {
        self.text.iter().any(Debounced::is_pending)
    }

    pub fn set_term(&mut self, slot: usize, text: impl Into<String>, now: Instant) {
        let Some(raw) = self.raw.terms.get_mut(slot) else {
            return;
        };
        *raw = text.into();
        self.text[slot].set(raw.trim().to_string(), now);
    }

    pub fn push_char(&mut self, slot: usize, ch: char, now: Instant) {
        if let Some(term) = self.raw.terms.get(slot) {
            let mut next = term.clone();
            next.push(ch);
            self.set_term(slot, next, now);
        }
    }

    pub fn pop_char(&mut self, slot: usize, now: Instant) {
        if let Some(term) = self.raw.terms.get(slot) {
            let mut next = term.clone();
            if next.pop().is_some() {
                self.set_term(slot, next, now);
            }
        }
    }

    /// Clearing the year also clears the month.
    pub fn set_year(&mut self, year: Option<i32>) -> Option<FilterState> {
        self.raw.year = year;
        if year.is_none() {
            self.raw.month = None;
        }
        self.take_change()
    }

    pub fn set_month(&mut self, month: Option<Month>) -> Result<Option<FilterState>, ValidationErrors> {
        if month.is_some() && self.raw.year.is_none() {
            let mut errors = ValidationErrors::default();
            errors.push("month", "Select a year before choosing a month");
            return Err(errors);
        }
        self.raw.month = month;
        Ok(self.take_change())
    }

    pub fn set_date(&mut self, date: Option<time::Date>) -> Option<FilterState> {
        self.raw.date = date;
        self.take_change()
    }

    /// Resets every input at once, bypassing the debounce.
    pub fn clear(&mut self) -> Option<FilterState> {
        self.raw = FilterState::default();
        for text in &mut self.text {
            text.force(String::new());
        }
        self.take_change()
    }

    /// Promotes settled text and reports a changed effective state.
    pub fn poll(&mut self, now: Instant) -> Option<FilterState> {
        let mut settled = false;
        for text in &mut self.text {
            settled |= text.poll(now);
        }
        if !settled {
            return None;
        }
        self.take_change()
    }

    fn effective(&self) -> FilterState {
        FilterState {
            terms: std::array::from_fn(|slot| self.text[slot].value().clone()),
            year: self.raw.year,
            month: self.raw.month,
            date: self.raw.date,
        }
    }

    fn take_change(&mut self) -> Option<FilterState> {
        let effective = self.effective();
        if effective == self.applied {
            return None;
        }
        tracing::debug!(mode = ?effective.mode(), "filter state changed");
        self.applied = effective.clone();
        Some(effective)
    }
}

/// Year selector order: all, then each option, then back to all.
pub fn next_year(current: Option<i32>, options: &[i32]) -> Option<i32> {
    match current {
        None => options.first().copied(),
        Some(year) => match options.iter().position(|&y| y == year) {
            Some(idx) => options.get(idx + 1).copied(),
            None => options.first().copied(),
        },
    }
}

pub fn next_month(current: Option<Month>) -> Option<Month> {
    match current {
        None => Some(Month::January),
        Some(Month::December) => None,
        Some(month) => Some(month.next()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Category;
    use crate::search::{build_query, RecordQuery};
    use assert_matches::assert_matches;
    use time::macros::date;

    const DELAY: Duration = Duration::from_millis(600);

    fn ms(start: Instant, offset: u64) -> Instant {
        start + Duration::from_millis(offset)
    }

    #[test]
    fn typing_burst_yields_one_change_with_the_last_value() {
        let start = Instant::now();
        let mut filters = FilterController::new(DELAY);
        let mut changes = Vec::new();
        for (i, ch) in "OPD-12".chars().enumerate() {
            filters.push_char(0, ch, ms(start, i as u64 * 120));
            changes.extend(filters.poll(ms(start, i as u64 * 120 + 60)));
        }
        assert!(changes.is_empty());
        assert!(filters.is_pending());
        for tick in (700..3000).step_by(100) {
            changes.extend(filters.poll(ms(start, tick)));
        }
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].term(0), "OPD-12");
        assert_eq!(changes[0].mode(), Mode::Searching);
    }

    #[test]
    fn whitespace_only_edits_do_not_refetch() {
        let start = Instant::now();
        let mut filters = FilterController::new(DELAY);
        filters.set_term(1, "   ", start);
        assert_eq!(filters.poll(ms(start, 1000)), None);
        assert_eq!(filters.mode(), Mode::Browsing);

        filters.set_term(1, "abc", ms(start, 1000));
        assert!(filters.poll(ms(start, 2000)).is_some());
        filters.set_term(1, "abc  ", ms(start, 2000));
        assert_eq!(filters.poll(ms(start, 3000)), None);
    }

    #[test]
    fn clearing_from_search_reports_browsing_exactly_once() {
        let start = Instant::now();
        let mut filters = FilterController::new(DELAY);
        filters.set_term(2, "M1", start);
        assert!(filters.poll(ms(start, 600)).is_some());

        let cleared = filters.clear().expect("clear reports a change");
        assert_eq!(cleared.mode(), Mode::Browsing);
        assert_eq!(
            build_query(Category::Private, &cleared, 100),
            RecordQuery::recent(100)
        );
        for tick in (700..3000).step_by(100) {
            assert_eq!(filters.poll(ms(start, tick)), None);
        }
        assert_eq!(filters.clear(), None);
    }

    #[test]
    fn clear_drops_text_still_waiting_on_the_debounce() {
        let start = Instant::now();
        let mut filters = FilterController::new(DELAY);
        filters.set_term(0, "abc", start);
        assert_eq!(filters.clear(), None);
        assert_eq!(filters.poll(ms(start, 5000)), None);
        assert_eq!(filters.raw().term(0), "");
    }

    #[test]
    fn date_selectors_apply_immediately() {
        let mut filters = FilterController::new(DELAY);
        let changed = filters.set_year(Some(2024)).expect("year change");
        assert_eq!(changed.year, Some(2024));
        let changed = filters
            .set_month(Some(Month::March))
            .expect("month accepted")
            .expect("month change");
        assert_eq!(changed.effective_month(), Some(Month::March));
        assert!(filters.set_date(Some(date!(2024 - 03 - 05))).is_some());
        assert_eq!(filters.set_date(Some(date!(2024 - 03 - 05))), None);
    }

    #[test]
    fn month_requires_a_year_and_clearing_year_clears_month() {
        let mut filters = FilterController::new(DELAY);
        let rejected = filters.set_month(Some(Month::May));
        assert_matches!(rejected, Err(errors) if errors.for_field("month").is_some());
        assert_eq!(filters.raw().month, None);

        filters.set_year(Some(2023));
        filters.set_month(Some(Month::May)).expect("accepted");
        let cleared = filters.set_year(None).expect("change");
        assert_eq!(cleared.month, None);
        assert_eq!(cleared.mode(), Mode::Browsing);
    }

    #[test]
    fn selector_cycles_wrap_back_to_all() {
        assert_eq!(next_year(None, &[2025, 2024]), Some(2025));
        assert_eq!(next_year(Some(2025), &[2025, 2024]), Some(2024));
        assert_eq!(next_year(Some(2024), &[2025, 2024]), None);
        assert_eq!(next_year(Some(1999), &[2025]), Some(2025));
        assert_eq!(next_month(None), Some(Month::January));
        assert_eq!(next_month(Some(Month::November)), Some(Month::December));
        assert_eq!(next_month(Some(Month::December)), None);
    }
}
