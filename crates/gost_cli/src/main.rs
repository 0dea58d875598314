//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `gost_core` linkage and database bootstrap from a shell.
//! - Print every datastream of a catalog database as JSON lines.
//!
//! Usage: `gost_cli [db_path]`. The schema comes from `GOST_DB_SCHEMA`;
//! logs go to `GOST_LOG_DIR` when it is set.

use gost_core::db::{open_db_in_memory_with_config, open_db_with_config};
use gost_core::{
    core_version, default_log_level, init_logging, DatastreamService, SqliteDatastreamRepository,
    StoreConfig,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gost_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("GOST_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let config = StoreConfig::from_env()?;
    let conn = match std::env::args().nth(1) {
        Some(path) => open_db_with_config(path, &config)?,
        None => open_db_in_memory_with_config(&config)?,
    };

    let repo = SqliteDatastreamRepository::try_new(&conn, &config)?;
    let service = DatastreamService::new(repo);
    let datastreams = service.list_datastreams()?;

    println!("gost_core version={}", core_version());
    println!("schema={} datastreams={}", config.schema(), datastreams.len());
    for datastream in &datastreams {
        println!("{}", serde_json::to_string(datastream)?);
    }
    log::info!(
        "event=cli_list module=cli status=ok count={}",
        datastreams.len()
    );

    Ok(())
}
