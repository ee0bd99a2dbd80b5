use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::patient::ValidationErrors;
use crate::view::{MatchMode, PageSize};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("patient store is unavailable: {0}")]
    Unavailable(String),
    #[error("malformed date '{0}'")]
    MalformedDate(String),
    #[error("patient {0} was not found")]
    NotFound(i64),
    #[error("page index {page_index} is outside of {total_pages} pages")]
    PageOutOfRange { page_index: usize, total_pages: usize },
    #[error("page size '{0}' is not one of 5, 10, 20, 30, 40 or 50")]
    InvalidPageSize(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct AppConfig {
    /// Milliseconds to wait for a terminal event per loop iteration.
    pub event_poll_time: u64,
    /// Quiet time after the last keystroke before the filter is applied.
    pub filter_debounce: Duration,
    pub status_message_ttl: Duration,
    pub page_size: PageSize,
    pub match_mode: MatchMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            filter_debounce: Duration::from_millis(200),
            status_message_ttl: Duration::from_secs(4),
            page_size: PageSize::default(),
            match_mode: MatchMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Search,
    GotoPage,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Search => "Search patients: ",
            CMDMode::GotoPage => "Go to page: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    PrevPage,
    NextPage,
    FirstPage,
    LastPage,
    PageSizeUp,
    PageSizeDown,
    SortColumn(usize),
    Search,
    GotoPage,
    ClearFilter,
    Register,
    Delete,
    Help,
    Enter,
    Exit,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Directory
  ↑/k ↓/j        move selection
  ←/h →/l        previous / next page
  Home/End       first / last page
  g              go to page
  [ ]            smaller / larger pages
  1-5            sort by column (asc, desc, off)
  /              search patients
  c              clear search
  a              register a patient
  d              delete selected patient (Enter/y confirms)
  ?              this help
  q              quit

Registration form
  Tab/↓ Shift+Tab/↑   next / previous field
  Enter               submit
  Esc                 back to directory
";
