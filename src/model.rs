use ratatui::crossterm::event::{KeyCode, KeyEvent};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{AppConfig, CMDMode, HELP_TEXT, Message, RegistryError};
use crate::form::{FormAction, RegisterForm};
use crate::inputter::{InputResult, Inputter};
use crate::patient::{NewPatient, Patient, patient_columns};
use crate::source::{RowSource, SourceState};
use crate::store::PatientRepository;
use crate::view::columns::searchable_fields;
use crate::view::{Column, Record, ViewController};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    DIRECTORY,
    CMDINPUT,
    REGISTER,
    CONFIRM_DELETE(i64),
    POPUP,
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    config: AppConfig,

    source: RowSource<Patient>,
    source_state: SourceState<Patient>,
    view: ViewController<Patient>,
    columns: Vec<Column<Patient>>,
    curser_row: usize,

    input: Inputter,
    last_input: InputResult,
    cmd_mode: Option<CMDMode>,
    // Typed search text waiting for the debounce to pass.
    pending_filter: Option<(String, Instant)>,
    filter_before_search: String,

    form: RegisterForm,
    repository: Option<Box<dyn PatientRepository>>,

    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn new(
        config: &AppConfig,
        source: RowSource<Patient>,
        repository: Option<Box<dyn PatientRepository>>,
    ) -> Self {
        let columns = patient_columns();
        let view = ViewController::new(searchable_fields(&columns), config.page_size, config.match_mode);
        let mut model = Model {
            status: Status::READY,
            modus: Modus::DIRECTORY,
            previous_modus: Modus::DIRECTORY,
            config: config.clone(),
            source_state: SourceState::Loading,
            source,
            view,
            columns,
            curser_row: 0,
            input: Inputter::with_max_len(64),
            last_input: InputResult::default(),
            cmd_mode: None,
            pending_filter: None,
            filter_before_search: String::new(),
            form: RegisterForm::default(),
            repository,
            popup_message: String::new(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        let initial = model.source.current();
        model.apply_source_state(initial);
        model
    }

    // ------------------------------ Accessors ----------------------------- //

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn source_state(&self) -> &SourceState<Patient> {
        &self.source_state
    }

    pub fn view(&self) -> &ViewController<Patient> {
        &self.view
    }

    pub fn columns(&self) -> &[Column<Patient>] {
        &self.columns
    }

    pub fn selected_row(&self) -> usize {
        self.curser_row
    }

    pub fn cmd_input(&self) -> Option<(CMDMode, &InputResult)> {
        match self.modus {
            Modus::CMDINPUT => self.cmd_mode.map(|mode| (mode, &self.last_input)),
            _ => None,
        }
    }

    /// Search text as typed, which may be ahead of the applied filter.
    pub fn search_text(&self) -> &str {
        match &self.pending_filter {
            Some((text, _)) => text,
            None => &self.view.params().filter_text,
        }
    }

    pub fn form(&self) -> &RegisterForm {
        &self.form
    }

    pub fn popup_message(&self) -> &str {
        &self.popup_message
    }

    pub fn delete_candidate(&self) -> Option<&Patient> {
        match self.modus {
            Modus::CONFIRM_DELETE(id) => self.view.rows().iter().find(|p| p.id == id),
            _ => None,
        }
    }

    /// The status message while it is still fresh.
    pub fn status_message(&self) -> Option<&str> {
        let fresh = self.last_status_message_update.elapsed() < self.config.status_message_ttl;
        (fresh && !self.status_message.is_empty()).then_some(self.status_message.as_str())
    }

    pub fn raw_keyevents(&self) -> bool {
        matches!(
            self.modus,
            Modus::CMDINPUT | Modus::REGISTER | Modus::CONFIRM_DELETE(_)
        )
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn selected_patient(&self) -> Option<&Patient> {
        self.view.visible_rows().get(self.curser_row).copied()
    }

    // ---------------------------- Data updates ---------------------------- //

    /// Applies snapshots from the row source and any search text whose
    /// debounce has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) {
        if let Some(state) = self.source.poll() {
            self.apply_source_state(state);
        }

        let due = self
            .pending_filter
            .as_ref()
            .is_some_and(|(_, typed_at)| now.saturating_duration_since(*typed_at) >= self.config.filter_debounce);
        if due && let Some((text, _)) = self.pending_filter.take() {
            self.apply_filter(text);
        }
    }

    fn apply_source_state(&mut self, state: SourceState<Patient>) {
        // A failed refresh keeps the last delivered snapshot on screen.
        if let (SourceState::Unavailable(reason), SourceState::Ready(_)) = (&state, &self.source_state) {
            error!("Refreshing patients failed: {reason}");
            self.set_status_message(format!("Could not refresh patients: {reason}"));
            return;
        }
        match &state {
            SourceState::Loading => trace!("Waiting for the first snapshot"),
            SourceState::Ready(rows) => {
                debug!("Applying snapshot with {} patients", rows.len());
                self.view.set_rows(Arc::clone(rows));
            }
            SourceState::Unavailable(reason) => {
                warn!("Patient directory unavailable: {reason}");
                self.view.set_rows(Arc::new(Vec::new()));
            }
        }
        self.source_state = state;
        self.clamp_curser();
    }

    fn apply_filter(&mut self, text: String) {
        trace!("Applying filter '{text}'");
        self.view.set_filter_text(text);
        self.curser_row = 0;
    }

    fn clamp_curser(&mut self) {
        let visible = self.view.visible_rows().len();
        self.curser_row = self.curser_row.min(visible.saturating_sub(1));
    }

    // --------------------------- Message dispatch -------------------------- //

    pub fn update(&mut self, message: Option<Message>) -> Result<(), RegistryError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::DIRECTORY => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::PrevPage => self.change_page(ViewController::prev_page),
                    Message::NextPage => self.change_page(ViewController::next_page),
                    Message::FirstPage => self.change_page(ViewController::first_page),
                    Message::LastPage => self.change_page(ViewController::last_page),
                    Message::PageSizeUp => self.resize_page(true),
                    Message::PageSizeDown => self.resize_page(false),
                    Message::SortColumn(idx) => self.sort_column(idx),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::GotoPage => self.enter_cmd_mode(CMDMode::GotoPage),
                    Message::ClearFilter => self.clear_filter(),
                    Message::Register => self.enter_register(),
                    Message::Delete => self.request_delete(),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT | Modus::REGISTER | Modus::CONFIRM_DELETE(_) => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)?
                    }
                }
            }
        }
        Ok(())
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::POPUP | Modus::REGISTER | Modus::CONFIRM_DELETE(_) => {
                trace!("Leaving {:?}", self.modus);
                self.previous_modus = self.modus;
                self.modus = Modus::DIRECTORY;
            }
            Modus::DIRECTORY | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn raw_input(&mut self, key: KeyEvent) -> Result<(), RegistryError> {
        match self.modus {
            Modus::CMDINPUT => {
                self.last_input = self.input.read(key);
                if self.last_input.finished {
                    self.handle_cmd_input();
                } else if self.cmd_mode == Some(CMDMode::Search) {
                    self.pending_filter = Some((self.last_input.input.clone(), Instant::now()));
                }
            }
            Modus::REGISTER => match self.form.handle_key(key) {
                FormAction::Editing => {}
                FormAction::Cancel => self.exit(),
                FormAction::Submit(patient) => self.register(patient),
            },
            Modus::CONFIRM_DELETE(id) => match key.code {
                KeyCode::Enter | KeyCode::Char('y') => {
                    self.exit();
                    self.delete(id);
                }
                KeyCode::Esc | KeyCode::Char('n') => self.exit(),
                _ => {}
            },
            Modus::DIRECTORY | Modus::POPUP => {}
        }
        Ok(())
    }

    // ----------------------------- Command line ---------------------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?}");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.input.clear();
        if mode == CMDMode::Search {
            self.filter_before_search = self.view.params().filter_text.clone();
            self.input.set(&self.filter_before_search);
        }
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode.take() {
            Some(CMDMode::Search) => {
                self.pending_filter = None;
                if self.last_input.canceled {
                    let previous = std::mem::take(&mut self.filter_before_search);
                    self.apply_filter(previous);
                } else {
                    self.apply_filter(cmd_input);
                    let total = self.view.total_rows();
                    if total == 0 {
                        self.set_status_message("Found no matches!");
                    } else {
                        self.set_status_message(format!("Found {total} patients"));
                    }
                }
            }
            Some(CMDMode::GotoPage) if !self.last_input.canceled => self.goto_page(&cmd_input),
            Some(CMDMode::GotoPage) => {}
            None => info!("Cmd mode is none!"),
        }
    }

    fn goto_page(&mut self, raw: &str) {
        match raw.trim().parse::<usize>() {
            Ok(page) if (1..=self.view.total_pages()).contains(&page) => {
                self.view.click_page(page);
                self.curser_row = 0;
            }
            _ => self.set_status_message(format!(
                "No page '{}', choose 1 to {}",
                raw.trim(),
                self.view.total_pages()
            )),
        }
    }

    fn clear_filter(&mut self) {
        self.pending_filter = None;
        self.apply_filter(String::new());
    }

    // ------------------------------ Directory ------------------------------ //

    fn move_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.view.can_prev_page() {
            self.view.prev_page();
            self.curser_row = self.view.visible_rows().len().saturating_sub(1);
        }
    }

    fn move_selection_down(&mut self) {
        let visible = self.view.visible_rows().len();
        if self.curser_row + 1 < visible {
            self.curser_row += 1;
        } else if self.view.can_next_page() {
            self.view.next_page();
            self.curser_row = 0;
        }
    }

    fn change_page(&mut self, step: fn(&mut ViewController<Patient>)) {
        step(&mut self.view);
        self.clamp_curser();
    }

    fn resize_page(&mut self, larger: bool) {
        let current = self.view.params().page_size;
        let next = if larger { current.larger() } else { current.smaller() };
        if next != current {
            self.view.set_page_size(next);
            self.clamp_curser();
            self.set_status_message(format!("{next} / page"));
        }
    }

    fn sort_column(&mut self, idx: usize) {
        let Some(column) = self.columns.get(idx) else {
            return;
        };
        let Some(field) = column.sort_field else {
            trace!("Column {} is not sortable", column.key);
            return;
        };
        let header = column.header;
        self.view.toggle_sort(field);
        self.clamp_curser();

        let params = self.view.params();
        match &params.sort_key {
            Some(_) => {
                let message = format!("Sorted by {header} {}", params.sort_direction.arrow());
                self.set_status_message(message);
            }
            None => self.set_status_message("Sorting cleared"),
        }
    }

    // --------------------------- Registry writes --------------------------- //

    fn enter_register(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::REGISTER;
    }

    fn register(&mut self, patient: NewPatient) {
        let Some(repository) = self.repository.as_ref() else {
            self.set_status_message(RegistryError::Unavailable("no patient store".into()).to_string());
            return;
        };
        match repository.register(&patient) {
            Ok(stored) => {
                info!("Registered patient {}", stored.id);
                self.form.reset();
                self.set_status_message("Patient registered successfully");
            }
            Err(err) => {
                error!("Registration failed: {err}");
                self.set_status_message(err.to_string());
            }
        }
    }

    fn request_delete(&mut self) {
        match self.selected_patient().map(Record::id) {
            Some(id) => {
                self.previous_modus = self.modus;
                self.modus = Modus::CONFIRM_DELETE(id);
            }
            None => self.set_status_message("No patient selected"),
        }
    }

    fn delete(&mut self, id: i64) {
        let Some(repository) = self.repository.as_ref() else {
            self.set_status_message(RegistryError::Unavailable("no patient store".into()).to_string());
            return;
        };
        match repository.remove(id) {
            Ok(()) => self.set_status_message("Patient deleted"),
            Err(err) => {
                error!("Delete failed: {err}");
                self.set_status_message(err.to_string());
            }
        }
    }
}
