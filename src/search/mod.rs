use std::cmp::{max, min};

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, Time};

use crate::records::Category;

pub mod debounce;

pub use debounce::Debounced;

/// Number of free-text filter slots per category.
pub const TEXT_FILTERS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeFilter {
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>, // exclusive
}

impl RangeFilter {
    pub fn between(from: OffsetDateTime, to: OffsetDateTime) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn has_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Narrows to the intersection of both ranges.
    pub fn merge(&mut self, other: RangeFilter) {
        if let Some(from) = other.from {
            self.from = Some(match self.from {
                Some(existing) => max(existing, from),
                None => from,
            });
        }
        if let Some(to) = other.to {
            self.to = Some(match self.to {
                Some(existing) => min(existing, to),
                None => to,
            });
        }
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.from.map_or(true, |from| instant >= from) && self.to.map_or(true, |to| instant < to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    Searching,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub terms: [String; TEXT_FILTERS],
    pub year: Option<i32>,
    pub month: Option<Month>,
    pub date: Option<Date>,
}

impl FilterState {
    /// Trimmed text for a slot; whitespace-only text is treated as empty.
    pub fn term(&self, slot: usize) -> &str {
        self.terms.get(slot).map(|t| t.trim()).unwrap_or("")
    }

    pub fn has_text(&self) -> bool {
        (0..TEXT_FILTERS).any(|slot| !self.term(slot).is_empty())
    }

    pub fn mode(&self) -> Mode {
        if self.has_text() || self.year.is_some() || self.month.is_some() || self.date.is_some() {
            Mode::Searching
        } else {
            Mode::Browsing
        }
    }

    /// Month only narrows results once a year is chosen.
    pub fn effective_month(&self) -> Option<Month> {
        self.year.and(self.month)
    }

    pub fn created_range(&self) -> RangeFilter {
        let mut range = RangeFilter::default();
        if let Some(year) = self.year {
            let bounds = match self.effective_month() {
                Some(month) => month_bounds(year, month),
                None => year_bounds(year),
            };
            if let Some(bounds) = bounds {
                range.merge(bounds);
            }
        }
        if let Some(day) = self.date.and_then(day_bounds) {
            range.merge(day);
        }
        range
    }

    pub fn highlight_terms(&self) -> Vec<String> {
        (0..TEXT_FILTERS)
            .map(|slot| self.term(slot))
            .filter(|term| !term.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Short labels for the active date filters.
    pub fn date_chips(&self) -> Vec<String> {
        let mut chips = Vec::new();
        if let Some(year) = self.year {
            chips.push(format!("year {year}"));
        }
        if let Some(month) = self.month {
            if self.year.is_some() {
                chips.push(format!("month {month}"));
            } else {
                chips.push(format!("month {month} (needs year)"));
            }
        }
        if let Some(date) = self.date {
            chips.push(format!("date {}", format_date(date)));
        }
        chips
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive substring match on one column.
    Contains { column: &'static str, needle: String },
    CreatedWithin(RangeFilter),
}

/// Clause set handed to a record store; always ordered by `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub predicates: Vec<Predicate>,
    pub order: SortDirection,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            predicates: Vec::new(),
            order: SortDirection::Descending,
            limit: Some(limit),
        }
    }
}

pub fn build_query(category: Category, filter: &FilterState, recent_limit: usize) -> RecordQuery {
    if filter.mode() == Mode::Browsing {
        return RecordQuery::recent(recent_limit);
    }
    let mut predicates = Vec::new();
    for (slot, spec) in category.search_fields().iter().enumerate() {
        let needle = filter.term(slot);
        if !needle.is_empty() {
            predicates.push(Predicate::Contains {
                column: spec.column,
                needle: needle.to_string(),
            });
        }
    }
    let range = filter.created_range();
    if range.has_range() {
        predicates.push(Predicate::CreatedWithin(range));
    }
    RecordQuery {
        predicates,
        order: SortDirection::Descending,
        limit: None,
    }
}

fn midnight(date: Date) -> OffsetDateTime {
    date.with_time(Time::MIDNIGHT).assume_utc()
}

/// Whole calendar year, `[Jan 1, Jan 1 of the next year)`. Covers all of Dec 31.
pub fn year_bounds(year: i32) -> Option<RangeFilter> {
    let start = Date::from_calendar_date(year, Month::January, 1).ok()?;
    let end = Date::from_calendar_date(year.checked_add(1)?, Month::January, 1).ok()?;
    Some(RangeFilter::between(midnight(start), midnight(end)))
}

pub fn month_bounds(year: i32, month: Month) -> Option<RangeFilter> {
    let start = Date::from_calendar_date(year, month, 1).ok()?;
    let end = if month == Month::December {
        Date::from_calendar_date(year.checked_add(1)?, Month::January, 1).ok()?
    } else {
        Date::from_calendar_date(year, month.next(), 1).ok()?
    };
    Some(RangeFilter::between(midnight(start), midnight(end)))
}

pub fn day_bounds(date: Date) -> Option<RangeFilter> {
    let next = date.next_day()?;
    Some(RangeFilter::between(midnight(date), midnight(next)))
}

pub fn parse_date(input: &str) -> Option<Date> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

pub fn month_from_number(number: u8) -> Option<Month> {
    Month::try_from(number).ok()
}
