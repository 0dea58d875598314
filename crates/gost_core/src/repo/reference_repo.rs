//! Existence checks for entities a datastream references.
//!
//! # Responsibility
//! - Answer "does this thing/sensor/observed property exist" for write paths.
//! - Share the row-existence probe with the datastream repository.
//!
//! # Invariants
//! - Probes are three-valued internally (`Existence`); store errors become
//!   `Unknown` and are logged before the boolean boundary maps them to `false`.
//! - Probes never propagate errors to callers.

use crate::config::StoreConfig;
use crate::model::ReferenceKind;
use log::warn;
use rusqlite::Connection;

/// Outcome of a single row-existence probe.
#[derive(Debug)]
pub enum Existence {
    Present,
    Absent,
    /// The probe failed; the row may or may not exist.
    Unknown(rusqlite::Error),
}

impl Existence {
    /// Collapses the probe to the boolean contract used by write-path gates.
    ///
    /// `Unknown` maps to `false`; the underlying error is only visible in logs.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Existence gate for the entities a datastream must reference.
pub trait ReferenceLookup {
    fn thing_exists(&self, id: i64) -> bool;
    fn sensor_exists(&self, id: i64) -> bool;
    fn observed_property_exists(&self, id: i64) -> bool;

    /// Dispatches to the check matching `kind`.
    fn reference_exists(&self, kind: ReferenceKind, id: i64) -> bool {
        match kind {
            ReferenceKind::Thing => self.thing_exists(id),
            ReferenceKind::Sensor => self.sensor_exists(id),
            ReferenceKind::ObservedProperty => self.observed_property_exists(id),
        }
    }
}

/// SQLite-backed existence checks over the catalog tables.
pub struct SqliteReferenceRepository<'conn> {
    conn: &'conn Connection,
    schema: String,
}

impl<'conn> SqliteReferenceRepository<'conn> {
    pub fn new(conn: &'conn Connection, config: &StoreConfig) -> Self {
        Self {
            conn,
            schema: config.schema().to_string(),
        }
    }

    /// Runs the probe for `kind` without collapsing store errors.
    pub fn check(&self, kind: ReferenceKind, id: i64) -> Existence {
        check_row_exists(self.conn, &self.schema, kind.table(), id)
    }
}

impl ReferenceLookup for SqliteReferenceRepository<'_> {
    fn thing_exists(&self, id: i64) -> bool {
        self.check(ReferenceKind::Thing, id).is_present()
    }

    fn sensor_exists(&self, id: i64) -> bool {
        self.check(ReferenceKind::Sensor, id).is_present()
    }

    fn observed_property_exists(&self, id: i64) -> bool {
        self.check(ReferenceKind::ObservedProperty, id).is_present()
    }
}

/// Probes `<schema>.<table>` for a row with primary key `id`.
///
/// `schema` must be a validated identifier and `table` a static table name.
pub(crate) fn check_row_exists(
    conn: &Connection,
    schema: &str,
    table: &str,
    id: i64,
) -> Existence {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {schema}.{table} WHERE id = ?1 LIMIT 1);");
    match conn.query_row(&sql, [id], |row| row.get::<_, bool>(0)) {
        Ok(true) => Existence::Present,
        Ok(false) => Existence::Absent,
        Err(err) => {
            warn!(
                "event=exists_check module=repo status=error table={} id={} error={}",
                table, id, err
            );
            Existence::Unknown(err)
        }
    }
}
