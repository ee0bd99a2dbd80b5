use chrono::{DateTime, Utc};

/// Rendered content of one table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text {
        primary: String,
        secondary: Option<String>,
    },
    Badge(String),
    Avatar {
        initials: String,
        /// Index into the avatar palette.
        palette: usize,
        title: String,
        subtitle: Option<String>,
    },
    /// Row actions, in display order.
    Menu(Vec<&'static str>),
}

impl Cell {
    pub fn text(primary: impl Into<String>) -> Self {
        Cell::Text {
            primary: primary.into(),
            secondary: None,
        }
    }

    /// Single-line form used for width estimation and plain output.
    pub fn plain(&self) -> String {
        match self {
            Cell::Text { primary, secondary: None } => primary.clone(),
            Cell::Text {
                primary,
                secondary: Some(secondary),
            } => format!("{primary} · {secondary}"),
            Cell::Badge(label) => format!("[{label}]"),
            Cell::Avatar { initials, title, .. } => format!("({initials}) {title}"),
            Cell::Menu(actions) => actions.join(" | "),
        }
    }
}

/// Declares one column of a table over records of type `T`.
pub struct Column<T> {
    pub key: &'static str,
    pub header: &'static str,
    /// Record fields the free-text filter looks at for this column.
    pub search_fields: &'static [&'static str],
    /// Record field used when the column is sorted, `None` if not sortable.
    pub sort_field: Option<&'static str>,
    pub render: fn(&T, DateTime<Utc>) -> Cell,
}

impl<T> Column<T> {
    pub fn render(&self, record: &T, now: DateTime<Utc>) -> Cell {
        (self.render)(record, now)
    }
}

/// Collects the searchable fields of all columns, without duplicates.
pub fn searchable_fields<T>(columns: &[Column<T>]) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = Vec::new();
    for field in columns.iter().flat_map(|c| c.search_fields.iter()) {
        if !fields.contains(field) {
            fields.push(field);
        }
    }
    fields
}
