//! KPI Board entry point
//!
//! Native: a CLI over a file-backed store. Web: a start hook that opens
//! LocalStorage and reports what it finds.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use kpi_board::Settings;
    use kpi_board::persistence::StateManager;
    use kpi_board::platform::LocalStorageBackend;

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");
        log::info!("KPI Board starting...");

        let backend = match LocalStorageBackend::open() {
            Ok(backend) => backend,
            Err(err) => {
                log::error!("LocalStorage unavailable: {}", err);
                return;
            }
        };

        let store = StateManager::new(backend);
        let settings = Settings::load(&store);
        let store = store.with_reload_delay(settings.reload_delay());

        // Same-tab writes arrive here; other tabs get the browser's storage event
        store
            .bus()
            .subscribe(|change| log::debug!("'{}' changed", change.key));

        let keys = store.keys_with_prefix(&settings.key_prefix);
        log::info!("KPI Board ready ({} stored keys)", keys.len());
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_app::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    use clap::{Parser, Subcommand};
    use thiserror::Error;

    use kpi_board::consts::{DEFAULT_STORE_FILE, STORE_PATH_ENV};
    use kpi_board::format::format_percentage;
    use kpi_board::metrics::parse_delimited;
    use kpi_board::persistence::{BackendError, FileBackend, ImportOutcome, StateManager, StateValue};
    use kpi_board::scoring::attainment;
    use kpi_board::{Settings, platform, score_color, score_level, score_percentage};

    #[derive(Debug, Parser)]
    #[command(name = "kpi-board", version, about = "Inspect and maintain KPI dashboard state")]
    pub struct Cli {
        /// Store file
        #[arg(long, env = STORE_PATH_ENV, default_value = DEFAULT_STORE_FILE)]
        pub store: PathBuf,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Subcommand)]
    pub enum Command {
        /// Score an actual value against a target
        Score {
            #[arg(allow_hyphen_values = true)]
            actual: f64,
            target: f64,
        },
        /// Print the payload stored under a key
        Get { key: String },
        /// Store a JSON payload under a key
        Set { key: String, json: String },
        /// Remove a key
        Clear { key: String },
        /// List keys, optionally filtered by prefix
        Keys {
            #[arg(long, default_value = "")]
            prefix: String,
        },
        /// Export keys as one JSON document (defaults to the configured set)
        Export { keys: Vec<String> },
        /// Import a document produced by `export`
        Import { file: PathBuf },
        /// Validate a comma-separated KPI sheet and store its rows
        Ingest { file: PathBuf },
    }

    #[derive(Debug, Error)]
    pub enum CliError {
        #[error("store unavailable: {0}")]
        Backend(#[from] BackendError),
        #[error("cannot read {}: {source}", path.display())]
        Read { path: PathBuf, source: io::Error },
        #[error("invalid JSON: {0}")]
        Json(#[from] serde_json::Error),
        #[error("could not save '{key}'")]
        SaveFailed { key: String },
        #[error("could not clear '{key}'")]
        ClearFailed { key: String },
        #[error("import rejected: {reason}")]
        ImportRejected { reason: String },
        #[error("import applied but some keys could not be saved")]
        ImportIncomplete,
        #[error("{0} invalid row(s), nothing stored")]
        InvalidRows(usize),
    }

    pub type CliResult<T = ()> = Result<T, CliError>;

    fn read_file(path: &Path) -> CliResult<String> {
        fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn open(path: &Path) -> CliResult<(StateManager<FileBackend>, Settings)> {
        let store = StateManager::new(FileBackend::open(path)?);
        let settings = Settings::load(&store);
        Ok((store.with_reload_delay(settings.reload_delay()), settings))
    }

    pub fn run(cli: Cli) -> CliResult {
        match cli.command {
            Command::Score { actual, target } => score(actual, target),
            Command::Get { key } => {
                let (store, _) = open(&cli.store)?;
                let value: StateValue = store.load(&key, StateValue::Null, None);
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Command::Set { key, json } => {
                let (store, _) = open(&cli.store)?;
                let value: StateValue = serde_json::from_str(&json)?;
                if !store.save(&key, &value, None) {
                    return Err(CliError::SaveFailed { key });
                }
                Ok(())
            }
            Command::Clear { key } => {
                let (store, _) = open(&cli.store)?;
                if !store.clear(&key) {
                    return Err(CliError::ClearFailed { key });
                }
                Ok(())
            }
            Command::Keys { prefix } => {
                let (store, _) = open(&cli.store)?;
                let mut keys = store.keys_with_prefix(&prefix);
                keys.sort();
                for key in keys {
                    println!("{}", key);
                }
                Ok(())
            }
            Command::Export { keys } => {
                let (store, settings) = open(&cli.store)?;
                let keys = if keys.is_empty() { settings.export_key_list() } else { keys };
                println!("{}", store.export_configuration(&keys));
                Ok(())
            }
            Command::Import { file } => {
                let (store, _) = open(&cli.store)?;
                let json = read_file(&file)?;
                import(&store, &json)
            }
            Command::Ingest { file } => {
                let (store, settings) = open(&cli.store)?;
                let text = read_file(&file)?;
                let (key, count) = ingest(&store, &settings, &text)?;
                println!("Stored {} row(s) under {}", count, key);
                Ok(())
            }
        }
    }

    fn import(store: &StateManager<FileBackend>, json: &str) -> CliResult {
        match store.import_configuration(json) {
            ImportOutcome::Rejected { reason } => Err(CliError::ImportRejected { reason }),
            outcome => {
                if let Some(delay) = outcome.reload_after() {
                    platform::schedule_reload(delay);
                }
                if outcome.succeeded() { Ok(()) } else { Err(CliError::ImportIncomplete) }
            }
        }
    }

    /// Validate a sheet and store its rows; returns the key and row count
    fn ingest(store: &StateManager<FileBackend>, settings: &Settings, text: &str) -> CliResult<(String, usize)> {
        let rows = parse_delimited(text).map_err(|errors| {
            for err in &errors {
                log::error!("{}", err);
            }
            CliError::InvalidRows(errors.len())
        })?;
        let key = settings.key("kpi_rows");
        if !store.save(&key, &rows, None) {
            return Err(CliError::SaveFailed { key });
        }
        Ok((key, rows.len()))
    }

    fn score(actual: f64, target: f64) -> CliResult {
        let level = score_level(actual, target);
        let exact = attainment(actual, target).map_or("n/a".to_string(), format_percentage);
        println!(
            "{} {}% ({}) {}",
            level.as_str(),
            score_percentage(actual, target),
            exact,
            score_color(level)
        );
        Ok(())
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    use clap::Parser;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match cli::run(cli::Cli::parse()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::ExitCode::FAILURE
        }
    }
}
