//! Embedded patient store.
//!
//! SQLite through sqlx, running on the tokio runtime. Every successful write
//! bumps a revision counter; live queries subscribed through
//! [`Database::subscribe_query`] re-run on each bump and publish the full
//! result as a new snapshot.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::RegistryError;
use crate::patient::{NewPatient, Patient, PatientInput, validate};
use crate::source::{RowSource, SourceState};

/// Current database schema version
const SCHEMA_VERSION: i32 = 1;

/// Directory listing, newest registrations first.
pub const PATIENTS_QUERY: &str = "SELECT * FROM patients ORDER BY created_at DESC, id DESC";

const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    address TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_patients_created_at ON patients(created_at)
"#;

/// Handle to the patient store. Cheap to clone; clones share the pool and
/// the change signal.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    changes: Arc<watch::Sender<u64>>,
}

impl Database {
    /// Opens (or creates) the store at `location`; `:memory:` keeps it in memory.
    pub async fn open(location: &str) -> Result<Self, RegistryError> {
        let pool = if location == ":memory:" {
            // One connection that never expires, otherwise the data goes with it.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
                .await?
        } else {
            if let Some(parent) = Path::new(location).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let options = SqliteConnectOptions::new()
                .filename(location)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(4).connect_with(options).await?
        };
        info!("Opened patient store at {location}");

        let (changes, _) = watch::channel(0u64);
        let db = Self {
            pool,
            changes: Arc::new(changes),
        };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn open_in_memory() -> Result<Self, RegistryError> {
        Self::open(":memory:").await
    }

    async fn run_migrations(&self) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let current_version = sqlx::query("SELECT MAX(version) AS version FROM _migrations")
            .fetch_optional(&self.pool)
            .await?
            .and_then(|row| row.try_get::<i32, _>("version").ok())
            .unwrap_or(0);

        info!(current_version, target_version = SCHEMA_VERSION, "Checking database migrations");

        for version in (current_version + 1)..=SCHEMA_VERSION {
            let (name, sql) = match version {
                1 => ("patients", MIGRATION_V1),
                _ => {
                    warn!("Unknown migration version: {}", version);
                    continue;
                }
            };
            info!("Applying migration v{}: {}", version, name);
            for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
                sqlx::query(statement.trim()).execute(&self.pool).await?;
            }
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(version)
                .bind(name)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    fn notify_changed(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }

    /// Number of live queries currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Runs a read statement once and returns all rows.
    pub async fn fetch_all<T>(&self, sql: &str) -> Result<Vec<T>, RegistryError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        Ok(sqlx::query_as::<_, T>(sql).fetch_all(&self.pool).await?)
    }

    pub async fn list_patients(&self) -> Result<Vec<Patient>, RegistryError> {
        self.fetch_all(PATIENTS_QUERY).await
    }

    pub async fn insert_patient(&self, patient: &NewPatient) -> Result<Patient, RegistryError> {
        let stored = sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients (first_name, last_name, date_of_birth, email, phone, address)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.date_of_birth)
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(&patient.address)
        .fetch_one(&self.pool)
        .await?;

        info!("Registered patient {} ({})", stored.id, stored.full_name());
        self.notify_changed();
        Ok(stored)
    }

    /// Validates raw form input and stores it.
    pub async fn register(&self, input: &PatientInput) -> Result<Patient, RegistryError> {
        let patient = validate(input)?;
        self.insert_patient(&patient).await
    }

    pub async fn delete_patient(&self, id: i64) -> Result<(), RegistryError> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(id));
        }
        info!("Deleted patient {id}");
        self.notify_changed();
        Ok(())
    }

    /// Subscribes to `sql`: the returned source receives the full result now
    /// and after every write.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe_query<T>(&self, sql: &'static str) -> RowSource<T>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static,
    {
        let (tx, rx) = watch::channel(SourceState::Loading);
        let mut changes = self.changes.subscribe();
        let pool = self.pool.clone();

        let feeder = tokio::spawn(async move {
            loop {
                let state = match sqlx::query_as::<_, T>(sql).fetch_all(&pool).await {
                    Ok(rows) => {
                        debug!("Live query delivered {} rows", rows.len());
                        SourceState::Ready(Arc::new(rows))
                    }
                    Err(err) => {
                        error!("Live query failed: {err}");
                        SourceState::Unavailable(err.to_string())
                    }
                };
                if tx.send(state).is_err() {
                    break;
                }
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
            debug!("Live query stopped");
        });

        RowSource::new(rx, Some(feeder.abort_handle()))
    }
}

/// Synchronous write access to the patient store.
pub trait PatientRepository {
    fn register(&self, patient: &NewPatient) -> Result<Patient, RegistryError>;
    fn remove(&self, id: i64) -> Result<(), RegistryError>;
}

/// Runs store writes on the runtime from a non-async thread.
pub struct BlockingRepository {
    db: Database,
    handle: Handle,
}

impl BlockingRepository {
    pub fn new(db: Database, handle: Handle) -> Self {
        Self { db, handle }
    }
}

impl PatientRepository for BlockingRepository {
    fn register(&self, patient: &NewPatient) -> Result<Patient, RegistryError> {
        self.handle.block_on(self.db.insert_patient(patient))
    }

    fn remove(&self, id: i64) -> Result<(), RegistryError> {
        self.handle.block_on(self.db.delete_patient(id))
    }
}
