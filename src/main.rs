use std::fs::File;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod form;
mod inputter;
mod model;
mod patient;
mod source;
mod store;
mod ui;
mod view;

use controller::Controller;
use domain::{AppConfig, RegistryError};
use model::{Model, Status};
use patient::Patient;
use source::RowSource;
use store::{BlockingRepository, Database, PATIENTS_QUERY, PatientRepository};
use ui::RegistryUI;
use view::{MatchMode, PageSize};

/// Patient registration desk with a live, searchable patient directory.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Patient store file, or ":memory:" for a store that lives as long as the app
    #[arg(long, default_value = "~/.local/share/patient-registry/patients.db")]
    db: String,

    /// Rows per directory page (5, 10, 20, 30, 40 or 50)
    #[arg(long, default_value_t = PageSize::Ten)]
    page_size: PageSize,

    /// Milliseconds to wait for input per frame
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Milliseconds of quiet typing before the search is applied
    #[arg(long, default_value_t = 200)]
    debounce_ms: u64,

    /// Fuzzy instead of substring search
    #[arg(long)]
    fuzzy: bool,

    #[arg(long, default_value = "patient-registry.log")]
    log_file: String,

    /// Used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &str, level: &str) -> Result<(), RegistryError> {
    let file = File::create(shellexpand::tilde(path).as_ref())?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn store_location(raw: &str) -> Result<String, RegistryError> {
    if raw == ":memory:" {
        return Ok(raw.to_string());
    }
    shellexpand::full(raw)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| RegistryError::Unavailable(e.to_string()))
}

fn run(args: Args) -> Result<(), RegistryError> {
    init_logging(&args.log_file, &args.log_level)?;
    info!("Starting patient registry with {args:?}");

    let config = AppConfig::default()
        .with_event_poll_time(args.poll_ms)
        .with_filter_debounce(Duration::from_millis(args.debounce_ms))
        .with_page_size(args.page_size)
        .with_match_mode(if args.fuzzy {
            MatchMode::Fuzzy
        } else {
            MatchMode::Substring
        });

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    let opened = match store_location(&args.db) {
        Ok(location) => runtime.block_on(Database::open(&location)),
        Err(err) => Err(err),
    };
    let (source, repository) = match opened {
        Ok(db) => {
            // Spawning the live query needs the runtime context.
            let source = runtime.block_on(async { db.subscribe_query::<Patient>(PATIENTS_QUERY) });
            let repository: Box<dyn PatientRepository> =
                Box::new(BlockingRepository::new(db, runtime.handle().clone()));
            (source, Some(repository))
        }
        Err(err) => {
            error!("Could not open the patient store: {err}");
            (RowSource::unavailable(err.to_string()), None)
        }
    };

    let mut model = Model::new(&config, source, repository);
    let ui = RegistryUI::new();
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &ui, &controller);
    ratatui::restore();

    info!("Shutting down");
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &RegistryUI,
    controller: &Controller,
) -> Result<(), RegistryError> {
    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(model, f))?;

        model.poll(Instant::now());

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
