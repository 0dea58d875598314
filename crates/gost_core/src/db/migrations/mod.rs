//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register catalog schema migrations in strictly increasing order.
//! - Apply pending migrations atomically inside the configured schema.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA <schema>.user_version`.
//! - Migration SQL qualifies every created object with `{schema}`.

use crate::config::StoreConfig;
use crate::db::{DbError, DbResult};
use rusqlite::Connection;

const SCHEMA_PLACEHOLDER: &str = "{schema}";

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_catalog.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection, config: &StoreConfig) -> DbResult<()> {
    let schema = config.schema();
    let current_version = schema_version(conn, schema)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            schema: schema.to_string(),
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(&migration.sql.replace(SCHEMA_PLACEHOLDER, schema))?;
        tx.execute_batch(&format!(
            "PRAGMA {schema}.user_version = {};",
            migration.version
        ))?;
    }
    tx.commit()?;

    Ok(())
}

/// Reads the migration version recorded in `schema`.
pub fn schema_version(conn: &Connection, schema: &str) -> DbResult<u32> {
    let version = conn.query_row(&format!("PRAGMA {schema}.user_version;"), [], |row| {
        row.get::<_, u32>(0)
    })?;
    Ok(version)
}
