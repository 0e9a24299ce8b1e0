use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use ratatui::Terminal;
use time::OffsetDateTime;

use crate::auth::SessionProvider;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::records::Category;
use crate::search::{parse_date, FilterState};
use crate::storage::RecordStore;
use crate::ui;

pub mod actions;
pub mod fetch;
pub mod filter;
pub mod selection;
pub mod state;
pub mod view;

pub use actions::MutationCoordinator;
pub use fetch::{FetchResponse, FetchWorker};
pub use state::{AppState, OverlayState, Pane, RecordForm};
pub use view::{FetchOutcome, RecordView};

const DATE_INPUT_LEN: usize = 10;

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    ShowSection(Category),
    ShowInsert,
    ToggleRow,
    ToggleAll,
    EditRecord,
    DeleteCurrent,
    DeleteSelected,
    StartFilter,
    CycleYear,
    CycleMonth,
    PromptDate,
    ClearDate,
    ClearFilters,
    Refresh,
    SignOut,
}

pub struct App {
    pub config: Arc<AppConfig>,
    store: Arc<dyn RecordStore>,
    sessions: Box<dyn SessionProvider>,
    state: AppState,
    worker: FetchWorker,
    table_state: TableState,
    should_quit: bool,
    signed_out: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn RecordStore>,
        sessions: Box<dyn SessionProvider>,
    ) -> Result<Self> {
        let session = sessions
            .current()
            .context("reading operator session")?
            .ok_or_else(|| anyhow!("no operator signed in; run `frontdesk login <email>` first"))?;
        let state = AppState::new(
            config.ui.default_section,
            config.search.debounce,
            config.search.recent_limit,
            Some(session.email),
        );
        let worker = FetchWorker::spawn(store.clone()).context("starting record fetcher")?;
        let tick_rate = config.ui.tick_rate();
        let mut app = Self {
            config,
            store,
            sessions,
            state,
            worker,
            table_state: TableState::default(),
            should_quit: false,
            signed_out: false,
            tick_rate,
        };
        app.dispatch_fetch(FilterState::default());
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    /// True when the session ended because the operator signed out.
    pub fn signed_out(&self) -> bool {
        self.signed_out
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.view.records().is_empty() {
                        self.table_state.select(None);
                    } else {
                        self.table_state.select(Some(self.state.view.cursor()));
                    }
                    ui::draw_app(frame, &self.state, &mut self.table_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick(Instant::now());
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self, now: Instant) {
        if let Some(filter) = self.state.view.poll_filters(now) {
            self.dispatch_fetch(filter);
        }
        loop {
            match self.worker.try_recv() {
                Ok(Some(response)) => {
                    if self.state.view.complete_fetch(response) == FetchOutcome::Failed {
                        let message = self.state.view.last_error().map(str::to_string);
                        self.state.set_status_message(message);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    if self.state.view.is_loading() {
                        let err = AppError::Unexpected(
                            anyhow::Error::new(err).context("record fetch never completed"),
                        );
                        tracing::error!(error = %err, "fetch worker stopped");
                        let message = err.user_message();
                        self.state.view.abandon_fetch(message.clone());
                        self.state.set_status_message(Some(message));
                    }
                    break;
                }
            }
        }
    }

    fn dispatch_fetch(&mut self, filter: FilterState) {
        let query = self.state.view.query_for(&filter);
        match self.worker.submit(self.state.section, query) {
            Ok(generation) => self.state.view.begin_fetch(generation, filter),
            Err(err) => {
                tracing::error!(?err, "failed to queue record fetch");
                self.state
                    .set_status_message(Some(format!("Failed to fetch records: {err}")));
            }
        }
    }

    fn refetch(&mut self) {
        let filter = self.state.view.current_filter();
        self.dispatch_fetch(filter);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.handle_overlay_key(key) {
            return;
        }
        if self.state.pane == Pane::Insert {
            self.handle_insert_key(key);
            return;
        }
        if self.state.is_filter_input_active() && self.handle_filter_key(key) {
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Refresh)
            }
            _ if !plain => None,
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('1') => Some(Action::ShowSection(Category::Nhis)),
            KeyCode::Char('2') => Some(Action::ShowSection(Category::Private)),
            KeyCode::Char('n') | KeyCode::Tab => Some(Action::ShowInsert),
            KeyCode::Char(' ') => Some(Action::ToggleRow),
            KeyCode::Char('a') => Some(Action::ToggleAll),
            KeyCode::Char('e') | KeyCode::Enter => Some(Action::EditRecord),
            KeyCode::Char('d') => Some(Action::DeleteCurrent),
            KeyCode::Char('D') => Some(Action::DeleteSelected),
            KeyCode::Char('/') => Some(Action::StartFilter),
            KeyCode::Char('y') => Some(Action::CycleYear),
            KeyCode::Char('m') => Some(Action::CycleMonth),
            KeyCode::Char('t') => Some(Action::PromptDate),
            KeyCode::Char('x') => Some(Action::ClearDate),
            KeyCode::Char('c') => Some(Action::ClearFilters),
            KeyCode::Char('L') => Some(Action::SignOut),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.view.move_cursor(1),
            Action::SelectPrevious => self.state.view.move_cursor(-1),
            Action::ShowSection(category) => {
                if self.state.navigate(category, Pane::Table) {
                    self.refetch();
                }
            }
            Action::ShowInsert => {
                self.state.navigate(self.state.section, Pane::Insert);
            }
            Action::ToggleRow => {
                self.state.view.toggle_current();
            }
            Action::ToggleAll => self.state.view.toggle_all(),
            Action::EditRecord => {
                if !self.state.open_edit_current() {
                    self.state.set_status_message(Some("No record to edit"));
                }
            }
            Action::DeleteCurrent => {
                if !self.state.open_delete_current() {
                    self.state.set_status_message(Some("No record to delete"));
                }
            }
            Action::DeleteSelected => {
                if !self.state.open_delete_selected() {
                    self.state
                        .set_status_message(Some("Select records with space or 'a' first"));
                }
            }
            Action::StartFilter => self.state.begin_filter_input(),
            Action::CycleYear => {
                let options = self
                    .state
                    .view
                    .available_years(OffsetDateTime::now_utc().year());
                let next = filter::next_year(self.state.view.filters().raw().year, &options);
                if let Some(changed) = self.state.view.filters_mut().set_year(next) {
                    self.dispatch_fetch(changed);
                }
            }
            Action::CycleMonth => {
                let next = filter::next_month(self.state.view.filters().raw().month);
                match self.state.view.filters_mut().set_month(next) {
                    Ok(Some(changed)) => self.dispatch_fetch(changed),
                    Ok(None) => {}
                    Err(errors) => self.state.set_status_message(Some(errors.to_string())),
                }
            }
            Action::PromptDate => self.state.open_date_prompt(),
            Action::ClearDate => {
                if let Some(changed) = self.state.view.filters_mut().set_date(None) {
                    self.dispatch_fetch(changed);
                }
            }
            Action::ClearFilters => {
                self.state.end_filter_input();
                if let Some(changed) = self.state.view.filters_mut().clear() {
                    self.dispatch_fetch(changed);
                }
                self.state.set_status_message(Some("Filters cleared"));
            }
            Action::Refresh => {
                self.state.view.clear_error();
                self.refetch();
            }
            Action::SignOut => match self.sessions.sign_out() {
                Ok(()) => {
                    self.signed_out = true;
                    self.should_quit = true;
                }
                Err(err) => {
                    tracing::error!(?err, "failed to sign out");
                    self.state.set_status_message(Some("Failed to sign out"));
                }
            },
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> bool {
        let Some(slot) = self.state.filter_input else {
            return false;
        };
        let now = Instant::now();
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.state.end_filter_input(),
            KeyCode::Tab => self.state.next_filter_slot(),
            KeyCode::Backspace => self.state.view.filters_mut().pop_char(slot, now),
            KeyCode::Char(ch)
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                self.state.view.filters_mut().push_char(slot, ch, now)
            }
            _ => return false,
        }
        true
    }

    fn handle_insert_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                if self.state.navigate(self.state.section, Pane::Table) {
                    self.refetch();
                }
            }
            KeyCode::Enter => self.submit_insert(),
            KeyCode::Tab | KeyCode::Down => self.state.insert_form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.state.insert_form.focus_prev(),
            KeyCode::Backspace => self.state.insert_form.pop_char(),
            KeyCode::Char(ch)
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                self.state.insert_form.push_char(ch)
            }
            _ => {}
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let typed = match key.code {
            KeyCode::Char(ch)
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                Some(ch)
            }
            _ => None,
        };
        match self.state.overlay() {
            Some(OverlayState::EditRecord(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Edit canceled"));
                    }
                    KeyCode::Enter => self.submit_edit(),
                    KeyCode::Tab | KeyCode::Down => {
                        if let Some(edit) = self.state.edit_overlay_mut() {
                            edit.form.focus_next();
                        }
                    }
                    KeyCode::BackTab | KeyCode::Up => {
                        if let Some(edit) = self.state.edit_overlay_mut() {
                            edit.form.focus_prev();
                        }
                    }
                    KeyCode::Backspace => {
                        if let Some(edit) = self.state.edit_overlay_mut() {
                            edit.form.pop_char();
                        }
                    }
                    _ => {
                        if let (Some(ch), Some(edit)) = (typed, self.state.edit_overlay_mut()) {
                            edit.form.push_char(ch);
                        }
                    }
                }
                true
            }
            Some(OverlayState::ConfirmDelete(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => self.submit_delete(),
                    _ => {}
                }
                true
            }
            Some(OverlayState::DatePrompt(_)) => {
                match key.code {
                    KeyCode::Esc => self.state.close_overlay(),
                    KeyCode::Enter => self.submit_date(),
                    KeyCode::Backspace => {
                        if let Some(prompt) = self.state.date_prompt_mut() {
                            prompt.input.pop();
                        }
                    }
                    _ => {
                        if let (Some(ch), Some(prompt)) = (typed, self.state.date_prompt_mut()) {
                            if prompt.input.len() < DATE_INPUT_LEN {
                                prompt.input.push(ch);
                            }
                        }
                    }
                }
                true
            }
            None => false,
        }
    }

    fn submit_insert(&mut self) {
        let fields = self.state.insert_form.fields();
        let coordinator = MutationCoordinator::new(self.store.as_ref());
        match coordinator.insert(&fields) {
            Ok(_) => {
                self.state.insert_form.reset();
                self.state.insert_error = None;
                self.state.set_status_message(Some("Record added"));
            }
            Err(AppError::Validation(errors)) => {
                self.state.insert_error = None;
                self.state.insert_form.set_errors(errors);
            }
            Err(err) => {
                self.state.insert_error = Some(format!("Failed to add record: {}", err.user_message()));
            }
        }
    }

    fn submit_edit(&mut self) {
        let Some((id, fields)) = self
            .state
            .edit_overlay_mut()
            .map(|edit| (edit.id.clone(), edit.form.fields()))
        else {
            return;
        };
        let coordinator = MutationCoordinator::new(self.store.as_ref());
        match coordinator.update(&id, &fields) {
            Ok(_) => {
                self.state.close_overlay();
                self.state.set_status_message(Some("Record updated"));
                self.refetch();
            }
            Err(AppError::Validation(errors)) => {
                if let Some(edit) = self.state.edit_overlay_mut() {
                    edit.error = None;
                    edit.form.set_errors(errors);
                }
            }
            Err(err) => {
                if let Some(edit) = self.state.edit_overlay_mut() {
                    edit.error = Some(format!("Failed to update record: {}", err.user_message()));
                }
            }
        }
    }

    fn submit_delete(&mut self) {
        let Some((category, ids)) = self
            .state
            .delete_overlay_mut()
            .map(|draft| (draft.category, draft.ids.clone()))
        else {
            return;
        };
        let coordinator = MutationCoordinator::new(self.store.as_ref());
        match coordinator.delete(category, &ids, self.state.view.selection_mut()) {
            Ok(removed) => {
                self.state.close_overlay();
                self.state
                    .set_status_message(Some(format!("{removed} record(s) deleted")));
                self.refetch();
            }
            Err(err) => {
                if let Some(draft) = self.state.delete_overlay_mut() {
                    draft.error = Some(format!("Failed to delete: {}", err.user_message()));
                }
            }
        }
    }

    fn submit_date(&mut self) {
        let Some(input) = self
            .state
            .date_prompt_mut()
            .map(|prompt| prompt.input.trim().to_string())
        else {
            return;
        };
        let date = if input.is_empty() {
            None
        } else {
            match parse_date(&input) {
                Some(date) => Some(date),
                None => {
                    if let Some(prompt) = self.state.date_prompt_mut() {
                        prompt.error = Some("Enter a date as YYYY-MM-DD".to_string());
                    }
                    return;
                }
            }
        };
        self.state.close_overlay();
        if let Some(changed) = self.state.view.filters_mut().set_date(date) {
            self.dispatch_fetch(changed);
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use crate::error::StoreError;
    use crate::records::{Record, RecordFields, RecordId};
    use crate::search::{Predicate, RecordQuery};
    use crate::storage::testing::MemoryStore;

    struct SignedIn;

    impl SessionProvider for SignedIn {
        fn current(&self) -> Result<Option<Session>> {
            Ok(Some(Session {
                email: "desk@clinic.example".into(),
                signed_in_at: OffsetDateTime::UNIX_EPOCH,
            }))
        }

        fn sign_out(&self) -> Result<()> {
            Ok(())
        }
    }

    struct SignedOut;

    impl SessionProvider for SignedOut {
        fn current(&self) -> Result<Option<Session>> {
            Ok(None)
        }

        fn sign_out(&self) -> Result<()> {
            Ok(())
        }
    }

    fn app_with(store: Arc<MemoryStore>) -> App {
        let mut config = AppConfig::default();
        config.search.debounce = Duration::ZERO;
        App::new(Arc::new(config), store, Box::new(SignedIn)).expect("app starts")
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn settle(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            app.on_tick(Instant::now());
            if !app.state.view.is_loading() && !app.state.view.filters().is_pending() {
                break;
            }
            assert!(Instant::now() < deadline, "fetch did not settle");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn seed(store: &MemoryStore, opd: &[&str]) {
        for number in opd {
            store
                .insert(&RecordFields::from_values(Category::Nhis, [*number, "N", "C"]))
                .expect("seed");
        }
    }

    #[test]
    fn refuses_to_start_without_a_session() {
        let store = Arc::new(MemoryStore::new());
        let result = App::new(Arc::new(AppConfig::default()), store, Box::new(SignedOut));
        assert!(result.is_err());
    }

    struct CrashingStore;

    impl RecordStore for CrashingStore {
        fn list(&self, _: Category, _: &RecordQuery) -> Result<Vec<Record>, StoreError> {
            panic!("listing blew up");
        }

        fn insert(&self, _: &RecordFields) -> Result<Record, StoreError> {
            Err(StoreError::Unavailable("read only".into()))
        }

        fn update(&self, _: &RecordId, _: &RecordFields) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read only".into()))
        }

        fn delete_many(&self, _: Category, _: &[RecordId]) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("read only".into()))
        }
    }

    #[test]
    fn crashed_fetcher_stops_loading_and_reports_an_error() {
        let mut config = AppConfig::default();
        config.search.debounce = Duration::ZERO;
        let mut app = App::new(Arc::new(config), Arc::new(CrashingStore), Box::new(SignedIn))
            .expect("app starts");
        assert!(app.state().view.is_loading());
        settle(&mut app);
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("An unexpected error occurred")
        );
        assert_eq!(
            app.state().view.last_error(),
            Some("An unexpected error occurred")
        );
        assert!(app.state().view.records().is_empty());
    }

    #[test]
    fn mount_browses_recent_records() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, &["OPD-1", "OPD-2"]);
        let mut app = app_with(store.clone());
        settle(&mut app);
        assert_eq!(app.state().view.records().len(), 2);
        let calls = store.take_list_calls();
        assert_eq!(calls, vec![(Category::Nhis, RecordQuery::recent(100))]);
    }

    #[test]
    fn typed_filter_searches_across_all_records() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, &["OPD-1", "OPD-22", "ABC-3"]);
        let mut app = app_with(store.clone());
        settle(&mut app);
        store.take_list_calls();

        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "opd");
        settle(&mut app);

        assert_eq!(app.state().view.records().len(), 2);
        let calls = store.take_list_calls();
        let (_, last) = calls.last().expect("search issued");
        assert_eq!(last.limit, None);
        assert!(last.predicates.iter().any(|p| matches!(
            p,
            Predicate::Contains { column: "opd_number", needle } if needle == "opd"
        )));
    }

    #[test]
    fn bulk_delete_confirms_then_refetches() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, &["OPD-1", "OPD-2", "OPD-3"]);
        let mut app = app_with(store.clone());
        settle(&mut app);

        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Char('D'));
        assert!(matches!(
            app.state().overlay(),
            Some(OverlayState::ConfirmDelete(draft)) if draft.ids.len() == 3
        ));
        press(&mut app, KeyCode::Enter);
        settle(&mut app);

        assert!(app.state().overlay().is_none());
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("3 record(s) deleted")
        );
        assert!(app.state().view.records().is_empty());
        assert_eq!(app.state().view.selection().raw_len(), 0);
    }

    #[test]
    fn failed_delete_keeps_dialog_open_with_message() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, &["OPD-1"]);
        let mut app = app_with(store.clone());
        settle(&mut app);
        store.set_fail_writes(true);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(matches!(
            app.state().overlay(),
            Some(OverlayState::ConfirmDelete(draft)) if draft.error.is_some()
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn month_needs_a_year_first() {
        let store = Arc::new(MemoryStore::new());
        let mut app = app_with(store);
        settle(&mut app);
        press(&mut app, KeyCode::Char('m'));
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("Select a year before choosing a month")
        );
        assert_eq!(app.state().view.filters().raw().month, None);
    }

    #[test]
    fn invalid_date_stays_in_prompt() {
        let store = Arc::new(MemoryStore::new());
        let mut app = app_with(store);
        settle(&mut app);
        press(&mut app, KeyCode::Char('t'));
        type_text(&mut app, "2024-13-01");
        press(&mut app, KeyCode::Enter);
        assert!(matches!(
            app.state().overlay(),
            Some(OverlayState::DatePrompt(prompt)) if prompt.error.is_some()
        ));
        assert_eq!(app.state().view.filters().raw().date, None);
    }

    #[test]
    fn insert_pane_adds_records_and_reports_missing_fields() {
        let store = Arc::new(MemoryStore::new());
        let mut app = app_with(store.clone());
        settle(&mut app);
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.state().pane, Pane::Insert);

        type_text(&mut app, "OPD-7");
        press(&mut app, KeyCode::Enter);
        assert_eq!(store.len(), 0);
        assert_eq!(app.state().insert_form.errors().len(), 2);
        assert_eq!(app.state().insert_form.focused(), 1);

        type_text(&mut app, "NH-7");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "CCC-7");
        press(&mut app, KeyCode::Enter);
        assert_eq!(store.len(), 1);
        assert_eq!(app.state().status_message.as_deref(), Some("Record added"));

        press(&mut app, KeyCode::Esc);
        settle(&mut app);
        assert_eq!(app.state().pane, Pane::Table);
        assert_eq!(app.state().view.records().len(), 1);
    }
}
