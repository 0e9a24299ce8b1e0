use std::time::Duration;

use crate::app::view::RecordView;
use crate::error::ValidationErrors;
use crate::records::{Category, FieldSpec, Record, RecordFields, RecordId};
use crate::search::TEXT_FILTERS;

const MAX_FIELD_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Table,
    Insert,
}

/// Field-by-field form used for both adding and editing a record.
#[derive(Debug, Clone)]
pub struct RecordForm {
    category: Category,
    values: Vec<String>,
    focused: usize,
    errors: ValidationErrors,
}

impl RecordForm {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            values: vec![String::new(); category.fields().len()],
            focused: 0,
            errors: ValidationErrors::default(),
        }
    }

    pub fn from_record(record: &Record) -> Self {
        let mut form = Self::new(record.category());
        form.values = record
            .fields
            .values()
            .into_iter()
            .map(str::to_string)
            .collect();
        form
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn specs(&self) -> &'static [FieldSpec] {
        self.category.fields()
    }

    pub fn value(&self, idx: usize) -> &str {
        self.values.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn focused(&self) -> usize {
        self.focused
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn set_errors(&mut self, errors: ValidationErrors) {
        if let Some(first) = errors
            .iter()
            .next()
            .and_then(|err| self.specs().iter().position(|spec| spec.column == err.field))
        {
            self.focused = first;
        }
        self.errors = errors;
    }

    pub fn push_char(&mut self, ch: char) {
        if let Some(value) = self.values.get_mut(self.focused) {
            if value.chars().count() < MAX_FIELD_LEN {
                value.push(ch);
            }
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(value) = self.values.get_mut(self.focused) {
            value.pop();
        }
    }

    pub fn focus_next(&mut self) {
        self.focused = (self.focused + 1) % self.values.len().max(1);
    }

    pub fn focus_prev(&mut self) {
        let len = self.values.len().max(1);
        self.focused = (self.focused + len - 1) % len;
    }

    pub fn fields(&self) -> RecordFields {
        RecordFields::from_values(self.category, self.values.iter().cloned())
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.category);
    }
}

#[derive(Debug, Clone)]
pub struct EditOverlay {
    pub id: RecordId,
    pub form: RecordForm,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteOverlay {
    pub category: Category,
    pub ids: Vec<RecordId>,
    pub error: Option<String>,
}

impl DeleteOverlay {
    pub fn prompt(&self) -> String {
        let count = self.ids.len();
        format!(
            "Delete {count} record{}? This cannot be undone.",
            if count == 1 { "" } else { "s" }
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatePromptOverlay {
    pub input: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    EditRecord(EditOverlay),
    ConfirmDelete(DeleteOverlay),
    DatePrompt(DatePromptOverlay),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub section: Category,
    pub pane: Pane,
    pub view: RecordView,
    pub insert_form: RecordForm,
    pub insert_error: Option<String>,
    pub filter_input: Option<usize>,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
    pub operator: Option<String>,
    debounce: Duration,
    recent_limit: usize,
}

impl AppState {
    pub fn new(
        section: Category,
        debounce: Duration,
        recent_limit: usize,
        operator: Option<String>,
    ) -> Self {
        Self {
            section,
            pane: Pane::Table,
            view: RecordView::new(section, debounce, recent_limit),
            insert_form: RecordForm::new(section),
            insert_error: None,
            filter_input: None,
            status_message: None,
            overlay: None,
            operator,
            debounce,
            recent_limit,
        }
    }

    /// Switches section or pane. Returns true when a fresh table was mounted
    /// and needs its first fetch.
    pub fn navigate(&mut self, section: Category, pane: Pane) -> bool {
        if section == self.section && pane == self.pane {
            return false;
        }
        if section != self.section {
            self.insert_form = RecordForm::new(section);
            self.insert_error = None;
        }
        self.section = section;
        self.pane = pane;
        self.overlay = None;
        self.filter_input = None;
        if pane == Pane::Table {
            self.view = RecordView::new(section, self.debounce, self.recent_limit);
            true
        } else {
            false
        }
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn is_filter_input_active(&self) -> bool {
        self.filter_input.is_some()
    }

    pub fn begin_filter_input(&mut self) {
        self.filter_input = Some(self.filter_input.unwrap_or(0));
    }

    pub fn next_filter_slot(&mut self) {
        if let Some(slot) = self.filter_input {
            self.filter_input = Some((slot + 1) % TEXT_FILTERS);
        }
    }

    pub fn end_filter_input(&mut self) {
        self.filter_input = None;
    }

    pub fn open_edit_current(&mut self) -> bool {
        let Some(record) = self.view.current() else {
            return false;
        };
        self.overlay = Some(OverlayState::EditRecord(EditOverlay {
            id: record.id.clone(),
            form: RecordForm::from_record(record),
            error: None,
        }));
        true
    }

    pub fn open_delete_current(&mut self) -> bool {
        let Some(record) = self.view.current() else {
            return false;
        };
        let ids = vec![record.id.clone()];
        self.open_delete(ids)
    }

    pub fn open_delete_selected(&mut self) -> bool {
        let ids = self.view.selected_visible();
        self.open_delete(ids)
    }

    fn open_delete(&mut self, ids: Vec<RecordId>) -> bool {
        if ids.is_empty() {
            return false;
        }
        self.overlay = Some(OverlayState::ConfirmDelete(DeleteOverlay {
            category: self.section,
            ids,
            error: None,
        }));
        true
    }

    pub fn open_date_prompt(&mut self) {
        let input = self
            .view
            .filters()
            .raw()
            .date
            .map(crate::search::format_date)
            .unwrap_or_default();
        self.overlay = Some(OverlayState::DatePrompt(DatePromptOverlay { input, error: None }));
    }

    pub fn edit_overlay_mut(&mut self) -> Option<&mut EditOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::EditRecord(ref mut overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn delete_overlay_mut(&mut self) -> Option<&mut DeleteOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::ConfirmDelete(ref mut overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn date_prompt_mut(&mut self) -> Option<&mut DatePromptOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::DatePrompt(ref mut overlay)) => Some(overlay),
            _ => None,
        }
    }
}
