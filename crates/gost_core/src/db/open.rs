//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure pragmas and spatial functions required by core behavior.
//! - Attach the configured schema when it is not `main`.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have `ST_GeomFromGeoJSON`/`ST_AsGeoJSON` registered.
//! - Returned connections have migrations fully applied in the configured schema.

use super::migrations::apply_migrations;
use super::spatial::register_spatial_functions;
use super::DbResult;
use crate::config::StoreConfig;
use log::{error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const IN_MEMORY_TARGET: &str = ":memory:";

/// Opens a SQLite database file using the default `main` schema.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_config(path, &StoreConfig::default())
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// A non-`main` schema is backed by a sibling file named
/// `<file name>-<schema>` attached under the schema name.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_with_config(path: impl AsRef<Path>, config: &StoreConfig) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file schema={}",
        config.schema()
    );

    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    let attach_target = attached_db_path(path, config.schema());
    finish_open(
        conn,
        config,
        &attach_target.to_string_lossy(),
        "file",
        started_at,
    )
}

/// Opens an in-memory SQLite database using the default `main` schema.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_db_in_memory_with_config(&StoreConfig::default())
}

/// Opens an in-memory SQLite database and applies all pending migrations.
///
/// A non-`main` schema is backed by a second in-memory database attached
/// under the schema name.
pub fn open_db_in_memory_with_config(config: &StoreConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=memory schema={}",
        config.schema()
    );

    let conn = match Connection::open_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    finish_open(conn, config, IN_MEMORY_TARGET, "memory", started_at)
}

fn finish_open(
    mut conn: Connection,
    config: &StoreConfig,
    attach_target: &str,
    mode: &str,
    started_at: Instant,
) -> DbResult<Connection> {
    match bootstrap_connection(&mut conn, config, attach_target) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} schema={} duration_ms={}",
                mode,
                config.schema(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    config: &StoreConfig,
    attach_target: &str,
) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    register_spatial_functions(conn)?;

    if config.is_attached_schema() {
        // Schema name is a validated identifier; only the target can be bound.
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS {};", config.schema()),
            [attach_target],
        )?;
    }

    apply_migrations(conn, config)?;
    Ok(())
}

fn attached_db_path(path: &Path, schema: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gost".to_string());
    path.with_file_name(format!("{file_name}-{schema}"))
}
