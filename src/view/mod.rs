//! Filtered, sorted and paginated view over a live row snapshot.
//!
//! The [`ViewController`] owns the view parameters and derives the visible
//! window whenever either the parameters or the underlying snapshot change.
//! Rows are addressed by index into the snapshot; the snapshot itself is
//! shared and never modified.

pub mod columns;
pub mod filter;
pub mod paginate;
pub mod sort;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, trace, warn};

use crate::domain::RegistryError;
pub use columns::{Cell, Column};
pub use filter::MatchMode;
pub use paginate::{BOUNDARY_PAGE_BUTTONS, PAGE_RANGE_DISPLAYED, PageItem};
pub use sort::SortDirection;

/// A scalar field value as seen by filtering and sorting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Null,
    Text(&'a str),
    Number(f64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl<'a> Value<'a> {
    /// Text the free-text filter compares against, `None` for missing values.
    pub fn search_text(&self) -> Option<Cow<'a, str>> {
        match *self {
            Value::Null => None,
            Value::Text(s) => Some(Cow::Borrowed(s)),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Date(d) => Some(Cow::Owned(d.format("%m/%d/%Y").to_string())),
            Value::Timestamp(ts) => Some(Cow::Owned(ts.to_rfc3339())),
        }
    }
}

/// A row with a stable identifier and named scalar fields.
pub trait Record: Send + Sync {
    fn id(&self) -> i64;

    /// Value of the field `key`, [`Value::Null`] when absent or unknown.
    fn field(&self, key: &str) -> Value<'_>;
}

/// Allowed page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PageSize {
    Five,
    #[default]
    Ten,
    Twenty,
    Thirty,
    Forty,
    Fifty,
}

impl PageSize {
    pub const ALL: [PageSize; 6] = [
        PageSize::Five,
        PageSize::Ten,
        PageSize::Twenty,
        PageSize::Thirty,
        PageSize::Forty,
        PageSize::Fifty,
    ];

    pub fn get(self) -> usize {
        match self {
            PageSize::Five => 5,
            PageSize::Ten => 10,
            PageSize::Twenty => 20,
            PageSize::Thirty => 30,
            PageSize::Forty => 40,
            PageSize::Fifty => 50,
        }
    }

    /// Next larger size, saturating at the largest.
    pub fn larger(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + 1).min(Self::ALL.len() - 1)]
    }

    /// Next smaller size, saturating at the smallest.
    pub fn smaller(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[idx.saturating_sub(1)]
    }
}

impl TryFrom<usize> for PageSize {
    type Error = RegistryError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|s| s.get() == value)
            .ok_or_else(|| RegistryError::InvalidPageSize(value.to_string()))
    }
}

impl std::str::FromStr for PageSize {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: usize = s
            .trim()
            .parse()
            .map_err(|_| RegistryError::InvalidPageSize(s.to_string()))?;
        PageSize::try_from(value)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// User controlled view state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewParams {
    pub filter_text: String,
    pub sort_key: Option<String>,
    pub sort_direction: SortDirection,
    pub page_size: PageSize,
    pub page_index: usize,
}

// Window of the current page inside `ViewController::ordered`.
#[derive(Debug, Clone, Default, PartialEq)]
struct PageWindow {
    start: usize,
    end: usize,
    total_pages: usize,
    start_row: usize,
    end_row: usize,
}

/// Everything the presentation layer needs to draw one page.
#[derive(Debug)]
pub struct ViewSnapshot<'a, T> {
    pub visible_rows: Vec<&'a T>,
    pub total_rows: usize,
    pub total_pages: usize,
    pub start_row: usize,
    pub end_row: usize,
    pub page_index: usize,
    pub page_size: PageSize,
    pub plan: Vec<PageItem>,
}

pub struct ViewController<T: Record> {
    rows: Arc<Vec<T>>,
    params: ViewParams,
    searchable: Vec<&'static str>,
    match_mode: MatchMode,
    // Filtered and sorted indices into `rows`.
    ordered: Vec<usize>,
    window: PageWindow,
}

impl<T: Record> ViewController<T> {
    pub fn new(searchable: Vec<&'static str>, page_size: PageSize, match_mode: MatchMode) -> Self {
        Self {
            rows: Arc::new(Vec::new()),
            params: ViewParams {
                page_size,
                ..ViewParams::default()
            },
            searchable,
            match_mode,
            ordered: Vec::new(),
            window: PageWindow::default(),
        }
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn rows(&self) -> &Arc<Vec<T>> {
        &self.rows
    }

    /// Replaces the row snapshot and re-derives the view.
    pub fn set_rows(&mut self, rows: Arc<Vec<T>>) {
        debug!("New row snapshot with {} rows", rows.len());
        self.rows = rows;
        self.recompute();
    }

    pub fn set_filter_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.params.filter_text {
            return;
        }
        self.params.filter_text = text;
        self.recompute();
    }

    /// Cycles the sort on `key`: ascending, descending, then unsorted.
    /// Switching to another key starts again at ascending.
    pub fn toggle_sort(&mut self, key: &str) {
        let next = match (&self.params.sort_key, self.params.sort_direction) {
            (Some(current), SortDirection::Ascending) if current == key => Some(SortDirection::Descending),
            (Some(current), SortDirection::Descending) if current == key => None,
            _ => Some(SortDirection::Ascending),
        };
        match next {
            Some(direction) => self.set_sort(Some(key), direction),
            None => self.set_sort(None, SortDirection::Ascending),
        }
    }

    pub fn set_sort(&mut self, key: Option<&str>, direction: SortDirection) {
        self.params.sort_key = key.map(str::to_string);
        self.params.sort_direction = direction;
        self.recompute();
    }

    /// Changes the page size, keeping the first row of the current page visible.
    pub fn set_page_size(&mut self, page_size: PageSize) {
        let top_row = self.params.page_index * self.params.page_size.get();
        self.params.page_size = page_size;
        self.params.page_index = top_row / page_size.get();
        self.refresh_page();
    }

    /// Jumps to the 1-based `page_number`; numbers outside the pages are ignored.
    pub fn click_page(&mut self, page_number: usize) {
        if page_number == 0 || page_number > self.window.total_pages {
            debug!("Ignoring click on page {} of {}", page_number, self.window.total_pages);
            return;
        }
        self.params.page_index = page_number - 1;
        self.refresh_page();
    }

    pub fn prev_page(&mut self) {
        if self.can_prev_page() {
            self.params.page_index -= 1;
            self.refresh_page();
        }
    }

    pub fn next_page(&mut self) {
        if self.can_next_page() {
            self.params.page_index += 1;
            self.refresh_page();
        }
    }

    pub fn first_page(&mut self) {
        self.params.page_index = 0;
        self.refresh_page();
    }

    pub fn last_page(&mut self) {
        self.params.page_index = self.window.total_pages.saturating_sub(1);
        self.refresh_page();
    }

    pub fn can_prev_page(&self) -> bool {
        self.params.page_index > 0
    }

    pub fn can_next_page(&self) -> bool {
        self.params.page_index + 1 < self.window.total_pages
    }

    pub fn total_rows(&self) -> usize {
        self.ordered.len()
    }

    pub fn total_pages(&self) -> usize {
        self.window.total_pages
    }

    /// Rows of the current page, in display order.
    pub fn visible_rows(&self) -> Vec<&T> {
        self.ordered[self.window.start..self.window.end]
            .iter()
            .map(|&idx| &self.rows[idx])
            .collect()
    }

    pub fn plan(&self) -> Vec<PageItem> {
        paginate::page_plan(
            self.params.page_index + 1,
            self.window.total_pages,
            PAGE_RANGE_DISPLAYED,
            BOUNDARY_PAGE_BUTTONS,
        )
    }

    pub fn snapshot(&self) -> ViewSnapshot<'_, T> {
        ViewSnapshot {
            visible_rows: self.visible_rows(),
            total_rows: self.total_rows(),
            total_pages: self.window.total_pages,
            start_row: self.window.start_row,
            end_row: self.window.end_row,
            page_index: self.params.page_index,
            page_size: self.params.page_size,
            plan: self.plan(),
        }
    }

    fn recompute(&mut self) {
        let filtered = filter::filter(
            &self.rows,
            &self.params.filter_text,
            &self.searchable,
            self.match_mode,
        );
        self.ordered = sort::sort(
            &self.rows,
            &filtered,
            self.params.sort_key.as_deref(),
            self.params.sort_direction,
        );
        trace!("View holds {}/{} rows", self.ordered.len(), self.rows.len());
        self.refresh_page();
    }

    // Paginates once, and once more after clamping if the index fell out of range.
    fn refresh_page(&mut self) {
        let page_index = self.params.page_index;
        let size = self.params.page_size;
        let window = match paginate::paginate(&self.ordered, size, page_index) {
            Ok(page) => Ok(page),
            Err(RegistryError::PageOutOfRange { total_pages, .. }) => {
                let clamped = total_pages.saturating_sub(1);
                debug!("Clamping page index {} to {}", page_index, clamped);
                self.params.page_index = clamped;
                paginate::paginate(&self.ordered, size, clamped)
            }
            Err(err) => Err(err),
        }
        .map(|page| PageWindow {
            start: page.range.start,
            end: page.range.end,
            total_pages: page.total_pages,
            start_row: page.start_row,
            end_row: page.end_row,
        });

        match window {
            Ok(window) => self.window = window,
            Err(err) => {
                warn!("Could not paginate view: {err}");
                self.params.page_index = 0;
                self.window = PageWindow::default();
            }
        }
    }
}
