//! Patient records, the registration schema and cell formatting.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use tracing::warn;

use crate::domain::RegistryError;
use crate::view::{Cell, Column, Record, Value};

static DATE_OF_BIRTH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("valid date of birth pattern"));
static PHONE_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10}$").expect("valid phone pattern"));
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Number of colours in the avatar palette.
pub const AVATAR_PALETTE_SIZE: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// `None` when the stored value could not be parsed.
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Record for Patient {
    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, key: &str) -> Value<'_> {
        fn opt(s: &Option<String>) -> Value<'_> {
            s.as_deref().map_or(Value::Null, Value::Text)
        }
        match key {
            "first_name" => Value::Text(&self.first_name),
            "last_name" => Value::Text(&self.last_name),
            "email" => opt(&self.email),
            "phone" => opt(&self.phone),
            "address" => opt(&self.address),
            "date_of_birth" => self.date_of_birth.map_or(Value::Null, Value::Date),
            "created_at" => self.created_at.map_or(Value::Null, Value::Timestamp),
            _ => Value::Null,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Patient {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let date_of_birth: String = row.try_get("date_of_birth")?;
        let created_at: Option<String> = row.try_get("created_at")?;

        let date_of_birth = parse_stored_date(&date_of_birth)
            .inspect_err(|err| warn!("Patient {id}: {err}"))
            .ok();
        let created_at = created_at.and_then(|raw| {
            parse_stored_timestamp(&raw)
                .inspect_err(|err| warn!("Patient {id}: {err}"))
                .ok()
        });

        Ok(Patient {
            id,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            date_of_birth,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            created_at,
        })
    }
}

/// Parses a stored date of birth: ISO `YYYY-MM-DD`, or the legacy `MM/DD/YYYY` mask.
pub fn parse_stored_date(raw: &str) -> Result<NaiveDate, RegistryError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|_| RegistryError::MalformedDate(raw.to_string()))
}

/// Parses a stored creation timestamp (RFC 3339, or SQLite's `YYYY-MM-DD HH:MM:SS[.fff]` in UTC).
pub fn parse_stored_timestamp(raw: &str) -> Result<DateTime<Utc>, RegistryError> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|ts| ts.and_utc()))
        .map_err(|_| RegistryError::MalformedDate(raw.to_string()))
}

/// Parses a date of birth as entered on the form (`MM/DD/YYYY`).
pub fn parse_date_of_birth(raw: &str) -> Result<NaiveDate, RegistryError> {
    let raw = raw.trim();
    if !DATE_OF_BIRTH_REGEX.is_match(raw) {
        return Err(RegistryError::MalformedDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, "%m/%d/%Y").map_err(|_| RegistryError::MalformedDate(raw.to_string()))
}

// ------------------------------ Registration ------------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientField {
    FirstName,
    LastName,
    DateOfBirth,
    Email,
    Phone,
    Address,
}

impl PatientField {
    pub const ALL: [PatientField; 6] = [
        PatientField::FirstName,
        PatientField::LastName,
        PatientField::DateOfBirth,
        PatientField::Email,
        PatientField::Phone,
        PatientField::Address,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PatientField::FirstName => "First Name",
            PatientField::LastName => "Last Name",
            PatientField::DateOfBirth => "Date of Birth",
            PatientField::Email => "Email",
            PatientField::Phone => "Phone",
            PatientField::Address => "Address",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            PatientField::FirstName => "John",
            PatientField::LastName => "Doe",
            PatientField::DateOfBirth => "MM/DD/YYYY",
            PatientField::Email => "john.doe@example.com",
            PatientField::Phone => "5551234567",
            PatientField::Address => "123 Main St, Anytown",
        }
    }

    pub fn required(&self) -> bool {
        matches!(
            self,
            PatientField::FirstName | PatientField::LastName | PatientField::DateOfBirth
        )
    }
}

/// Raw form input, one string per field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientInput {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl PatientInput {
    pub fn get(&self, field: PatientField) -> &str {
        match field {
            PatientField::FirstName => &self.first_name,
            PatientField::LastName => &self.last_name,
            PatientField::DateOfBirth => &self.date_of_birth,
            PatientField::Email => &self.email,
            PatientField::Phone => &self.phone,
            PatientField::Address => &self.address,
        }
    }

    pub fn set(&mut self, field: PatientField, value: impl Into<String>) {
        let slot = match field {
            PatientField::FirstName => &mut self.first_name,
            PatientField::LastName => &mut self.last_name,
            PatientField::DateOfBirth => &mut self.date_of_birth,
            PatientField::Email => &mut self.email,
            PatientField::Phone => &mut self.phone,
            PatientField::Address => &mut self.address,
        };
        *slot = value.into();
    }
}

/// A validated patient ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: PatientField,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn for_field(&self, field: PatientField) -> Option<&'static str> {
        self.errors.iter().find(|e| e.field == field).map(|e| e.message)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, field: PatientField, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field.label(), e.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn optional(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Checks form input against the registration schema.
pub fn validate(input: &PatientInput) -> Result<NewPatient, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let first_name = input.first_name.trim();
    if first_name.is_empty() {
        errors.push(PatientField::FirstName, "First name is required");
    }
    let last_name = input.last_name.trim();
    if last_name.is_empty() {
        errors.push(PatientField::LastName, "Last name is required");
    }

    let date_of_birth = if DATE_OF_BIRTH_REGEX.is_match(input.date_of_birth.trim()) {
        match parse_date_of_birth(&input.date_of_birth) {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(PatientField::DateOfBirth, "Date of birth is not a valid calendar date");
                None
            }
        }
    } else {
        errors.push(PatientField::DateOfBirth, "Date of birth must be in MM/DD/YYYY format");
        None
    };

    let email = optional(&input.email);
    if email.as_deref().is_some_and(|e| !EMAIL_REGEX.is_match(e)) {
        errors.push(PatientField::Email, "Invalid email address");
    }
    let phone = optional(&input.phone);
    if phone.as_deref().is_some_and(|p| !PHONE_NUMBER_REGEX.is_match(p)) {
        errors.push(PatientField::Phone, "Phone number must be 10 digits only");
    }

    match date_of_birth {
        Some(date_of_birth) if errors.is_empty() => Ok(NewPatient {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            date_of_birth,
            email,
            phone,
            address: optional(&input.address),
        }),
        _ => Err(errors),
    }
}

// ------------------------------- Formatting ------------------------------- //

pub fn initials(first_name: &str, last_name: &str) -> String {
    first_name
        .chars()
        .take(1)
        .chain(last_name.chars().take(1))
        .collect::<String>()
        .to_uppercase()
}

/// Stable palette slot for a name: sum of its UTF-16 code units.
pub fn avatar_palette(name: &str) -> usize {
    name.encode_utf16().map(usize::from).sum::<usize>() % AVATAR_PALETTE_SIZE
}

/// Whole years between `date_of_birth` and `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

pub fn format_age(date_of_birth: Option<NaiveDate>, today: NaiveDate) -> String {
    match date_of_birth {
        Some(dob) => format!("{} years", age_on(dob, today)),
        None => "Unknown".to_string(),
    }
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => "Invalid date".to_string(),
    }
}

/// Human distance between `then` and `now`, e.g. "about 2 hours ago".
pub fn format_time_ago(then: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(then) = then else {
        return "Unknown".to_string();
    };
    let seconds = (now - then).num_seconds();
    let distance = format_distance(seconds.unsigned_abs());
    if seconds >= 0 {
        format!("{distance} ago")
    } else {
        format!("in {distance}")
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 { format!("1 {unit}") } else { format!("{n} {unit}s") }
}

fn format_distance(seconds: u64) -> String {
    const MINUTES_IN_DAY: u64 = 1440;
    const MINUTES_IN_MONTH: u64 = 43200;

    let minutes = (seconds + 30) / 60;
    let months = minutes / MINUTES_IN_MONTH;

    if minutes == 0 {
        "less than a minute".to_string()
    } else if minutes < 45 {
        plural(minutes, "minute")
    } else if minutes < 90 {
        "about 1 hour".to_string()
    } else if minutes < MINUTES_IN_DAY {
        format!("about {}", plural((minutes + 30) / 60, "hour"))
    } else if minutes < 2520 {
        "1 day".to_string()
    } else if minutes < MINUTES_IN_MONTH {
        plural((minutes + MINUTES_IN_DAY / 2) / MINUTES_IN_DAY, "day")
    } else if minutes < MINUTES_IN_MONTH * 2 {
        format!("about {}", plural((minutes + MINUTES_IN_MONTH / 2) / MINUTES_IN_MONTH, "month"))
    } else if months < 12 {
        plural((minutes + MINUTES_IN_MONTH / 2) / MINUTES_IN_MONTH, "month")
    } else {
        let years = months / 12;
        match months % 12 {
            0..3 => format!("about {}", plural(years, "year")),
            3..9 => format!("over {}", plural(years, "year")),
            _ => format!("almost {}", plural(years + 1, "year")),
        }
    }
}

// -------------------------------- Columns --------------------------------- //

fn name_cell(p: &Patient, _now: DateTime<Utc>) -> Cell {
    let full_name = p.full_name();
    Cell::Avatar {
        initials: initials(&p.first_name, &p.last_name),
        palette: avatar_palette(&full_name),
        title: full_name,
        subtitle: p.email.clone(),
    }
}

fn age_cell(p: &Patient, now: DateTime<Utc>) -> Cell {
    Cell::Badge(format_age(p.date_of_birth, now.date_naive()))
}

fn dob_cell(p: &Patient, _now: DateTime<Utc>) -> Cell {
    Cell::text(format_date(p.date_of_birth))
}

fn contact_cell(p: &Patient, _now: DateTime<Utc>) -> Cell {
    Cell::Text {
        primary: p.phone.clone().unwrap_or_else(|| "No phone".to_string()),
        secondary: Some(p.address.clone().unwrap_or_else(|| "No address".to_string())),
    }
}

fn registered_cell(p: &Patient, now: DateTime<Utc>) -> Cell {
    Cell::text(format_time_ago(p.created_at, now))
}

fn actions_cell(_p: &Patient, _now: DateTime<Utc>) -> Cell {
    Cell::Menu(vec!["Delete patient"])
}

/// Column layout of the patient directory.
pub fn patient_columns() -> Vec<Column<Patient>> {
    vec![
        Column {
            key: "name",
            header: "Patient",
            search_fields: &["first_name", "last_name", "email"],
            sort_field: Some("last_name"),
            render: name_cell,
        },
        Column {
            key: "age",
            header: "Age",
            search_fields: &[],
            sort_field: Some("date_of_birth"),
            render: age_cell,
        },
        Column {
            key: "date_of_birth",
            header: "DOB",
            search_fields: &[],
            sort_field: Some("date_of_birth"),
            render: dob_cell,
        },
        Column {
            key: "contact",
            header: "Contact",
            search_fields: &["phone", "address"],
            sort_field: Some("phone"),
            render: contact_cell,
        },
        Column {
            key: "created_at",
            header: "Registered",
            search_fields: &[],
            sort_field: Some("created_at"),
            render: registered_cell,
        },
        Column {
            key: "actions",
            header: "",
            search_fields: &[],
            sort_field: None,
            render: actions_cell,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn input() -> PatientInput {
        PatientInput {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            date_of_birth: "01/02/1990".into(),
            phone: "5551234567".into(),
            ..PatientInput::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn valid_input_becomes_a_new_patient() {
        let patient = validate(&input()).unwrap();
        assert_eq!(patient.first_name, "Jane");
        assert_eq!(patient.date_of_birth, date(1990, 1, 2));
        assert_eq!(patient.phone.as_deref(), Some("5551234567"));
        assert_eq!(patient.email, None);
        assert_eq!(patient.address, None);
    }

    #[test]
    fn required_fields_are_reported_per_field() {
        let errors = validate(&PatientInput::default()).unwrap_err();
        assert_eq!(errors.for_field(PatientField::FirstName), Some("First name is required"));
        assert_eq!(errors.for_field(PatientField::LastName), Some("Last name is required"));
        assert_eq!(
            errors.for_field(PatientField::DateOfBirth),
            Some("Date of birth must be in MM/DD/YYYY format")
        );
        assert_eq!(errors.for_field(PatientField::Email), None);
    }

    #[test]
    fn optional_fields_are_checked_when_present() {
        let mut bad = input();
        bad.email = "not-an-email".into();
        bad.phone = "555-123".into();
        bad.address = "   ".into();
        let errors = validate(&bad).unwrap_err();
        assert_eq!(errors.for_field(PatientField::Email), Some("Invalid email address"));
        assert_eq!(errors.for_field(PatientField::Phone), Some("Phone number must be 10 digits only"));
        assert_eq!(errors.for_field(PatientField::Address), None);

        let mut good = input();
        good.email = " jane@example.com ".into();
        assert_eq!(validate(&good).unwrap().email.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn impossible_calendar_dates_are_rejected() {
        let mut bad = input();
        bad.date_of_birth = "02/30/1990".into();
        let errors = validate(&bad).unwrap_err();
        assert_eq!(
            errors.for_field(PatientField::DateOfBirth),
            Some("Date of birth is not a valid calendar date")
        );
        assert!(matches!(parse_date_of_birth("1990-01-02"), Err(RegistryError::MalformedDate(_))));
    }

    #[test]
    fn stored_values_parse_in_both_layouts() {
        assert_eq!(parse_stored_date("1990-01-02").unwrap(), date(1990, 1, 2));
        assert_eq!(parse_stored_date("01/02/1990").unwrap(), date(1990, 1, 2));
        assert!(parse_stored_date("yesterday").is_err());
        let ts = parse_stored_timestamp("2024-05-06 07:08:09.123").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 123);
        assert!(parse_stored_timestamp("2024-05-06T07:08:09Z").is_ok());
    }

    #[test]
    fn ages_count_completed_years() {
        assert_eq!(age_on(date(1990, 1, 2), date(2026, 1, 1)), 35);
        assert_eq!(age_on(date(1990, 1, 2), date(2026, 1, 2)), 36);
        assert_eq!(format_age(None, date(2026, 1, 1)), "Unknown");
    }

    #[test]
    fn display_helpers_fall_back_to_sentinels() {
        assert_eq!(format_date(Some(date(1990, 1, 2))), "Jan 2, 1990");
        assert_eq!(format_date(None), "Invalid date");
        assert_eq!(format_time_ago(None, Utc::now()), "Unknown");
        assert_eq!(initials("jane", "doe"), "JD");
        assert_eq!(initials("", "doe"), "D");
        assert!(avatar_palette("Jane Doe") < AVATAR_PALETTE_SIZE);
        assert_eq!(avatar_palette("Jane Doe"), avatar_palette("Jane Doe"));
    }

    #[test]
    fn time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let ago = |d: Duration| format_time_ago(Some(now - d), now);
        assert_eq!(ago(Duration::seconds(10)), "less than a minute ago");
        assert_eq!(ago(Duration::minutes(1)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(30)), "30 minutes ago");
        assert_eq!(ago(Duration::minutes(60)), "about 1 hour ago");
        assert_eq!(ago(Duration::hours(5)), "about 5 hours ago");
        assert_eq!(ago(Duration::hours(30)), "1 day ago");
        assert_eq!(ago(Duration::days(10)), "10 days ago");
        assert_eq!(ago(Duration::days(45)), "about 2 months ago");
        assert_eq!(ago(Duration::days(200)), "7 months ago");
        assert_eq!(ago(Duration::days(400)), "about 1 year ago");
        assert_eq!(ago(Duration::days(365 * 2 + 150)), "over 2 years ago");
        assert_eq!(ago(Duration::days(365 * 2 + 300)), "almost 3 years ago");
        assert_eq!(format_time_ago(Some(now + Duration::minutes(5)), now), "in 5 minutes");
    }

    #[test]
    fn patient_fields_feed_the_view() {
        let patient = Patient {
            id: 7,
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            date_of_birth: None,
            email: None,
            phone: Some("5551234567".into()),
            address: None,
            created_at: None,
        };
        assert_eq!(patient.field("last_name"), Value::Text("Doe"));
        assert_eq!(patient.field("email"), Value::Null);
        assert_eq!(patient.field("date_of_birth"), Value::Null);
        let columns = patient_columns();
        let contact = columns.iter().find(|c| c.key == "contact").unwrap();
        assert_eq!(
            contact.render(&patient, Utc::now()),
            Cell::Text { primary: "5551234567".into(), secondary: Some("No address".into()) }
        );
    }
}
