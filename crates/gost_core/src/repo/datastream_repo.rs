//! Datastream repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide lookup, create, delete and existence APIs over `datastream`.
//! - Enforce that referenced thing/sensor/observed property rows exist
//!   before a datastream row is written.
//! - Keep SQL and storage encodings inside the core persistence boundary.
//!
//! # Invariants
//! - Ids are validated before any statement is issued.
//! - Every read path materializes rows through `parse_datastream_row`;
//!   one undecodable row fails the whole read.
//! - Geometry payloads are bound as parameters, never spliced into SQL.
//! - Only the validated schema name is interpolated into statement text.

use crate::codec::{
    geojson_to_geometry, geometry_to_geojson, json_to_map, map_to_json, CodecError,
};
use crate::config::StoreConfig;
use crate::db::migrations::{latest_version, schema_version};
use crate::db::spatial::AS_GEOJSON;
use crate::db::DbError;
use crate::model::{Datastream, NewDatastream, ReferenceKind};
use crate::repo::reference_repo::{check_row_exists, ReferenceLookup, SqliteReferenceRepository};
use log::debug;
use rusqlite::{params, Connection, Params, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATASTREAM_COLUMNS: &str = "datastream.id AS id,
    datastream.description AS description,
    datastream.unitofmeasurement AS unitofmeasurement,
    ST_AsGeoJSON(datastream.observedarea) AS observedarea";

const REQUIRED_TABLES: [&str; 5] = [
    "thing",
    "sensor",
    "observedproperty",
    "datastream",
    "observation",
];

const REQUIRED_DATASTREAM_COLUMNS: [&str; 7] = [
    "id",
    "description",
    "unitofmeasurement",
    "observedarea",
    "thing_id",
    "sensor_id",
    "observedproperty_id",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Coarse error classes for the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    BadRequest,
    Decode,
    Store,
}

/// Repository error for datastream persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Supplied identifier is not a non-negative integer.
    InvalidArgument(String),
    /// Single-entity lookup matched no row.
    NotFound(String),
    /// Create request references an entity that does not exist.
    MissingReference(ReferenceKind),
    /// Stored text could not be decoded into the read model.
    Decode {
        column: &'static str,
        source: CodecError,
    },
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing from the configured schema.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Connection was not opened through `db::open_*`.
    MissingSpatialSupport,
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MissingReference(_) => ErrorKind::BadRequest,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Db(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::MissingSpatialSupport => ErrorKind::Store,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "{message}"),
            Self::NotFound(message) => write!(f, "{message}"),
            Self::MissingReference(kind) => write!(f, "{kind} does not exist"),
            Self::Decode { column, source } => {
                write!(f, "invalid persisted datastream data in `{column}`: {source}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "datastream repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "datastream repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "datastream repository requires column `{column}` in table `{table}`"
            ),
            Self::MissingSpatialSupport => write!(
                f,
                "datastream repository requires `{AS_GEOJSON}` on the connection"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            Self::InvalidArgument(_)
            | Self::NotFound(_)
            | Self::MissingReference(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::MissingSpatialSupport => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for datastream operations.
pub trait DatastreamRepository {
    fn get_datastream(&self, id: &str) -> RepoResult<Datastream>;
    fn list_datastreams(&self) -> RepoResult<Vec<Datastream>>;
    fn get_datastream_by_observation(&self, observation_id: &str) -> RepoResult<Datastream>;
    fn list_datastreams_by_thing(&self, thing_id: &str) -> RepoResult<Vec<Datastream>>;
    fn list_datastreams_by_sensor(&self, sensor_id: &str) -> RepoResult<Vec<Datastream>>;
    fn list_datastreams_by_observed_property(
        &self,
        observed_property_id: &str,
    ) -> RepoResult<Vec<Datastream>>;
    fn create_datastream(&self, datastream: &NewDatastream) -> RepoResult<Datastream>;
    fn delete_datastream(&self, id: &str) -> RepoResult<()>;
    fn datastream_exists(&self, id: i64) -> bool;
}

/// SQLite-backed datastream repository.
pub struct SqliteDatastreamRepository<'conn, L = SqliteReferenceRepository<'conn>> {
    conn: &'conn Connection,
    schema: String,
    references: L,
}

impl<'conn> SqliteDatastreamRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection, config: &StoreConfig) -> RepoResult<Self> {
        let references = SqliteReferenceRepository::new(conn, config);
        Self::try_with_references(conn, config, references)
    }
}

impl<'conn, L: ReferenceLookup> SqliteDatastreamRepository<'conn, L> {
    /// Constructs a repository using a custom reference existence gate.
    pub fn try_with_references(
        conn: &'conn Connection,
        config: &StoreConfig,
        references: L,
    ) -> RepoResult<Self> {
        ensure_datastream_connection_ready(conn, config.schema())?;
        Ok(Self {
            conn,
            schema: config.schema().to_string(),
            references,
        })
    }

    fn select_sql(&self) -> String {
        format!("SELECT {DATASTREAM_COLUMNS} FROM {}.datastream", self.schema)
    }

    fn related_sql(&self, table: &str, join_predicate: &str) -> String {
        format!(
            "{} INNER JOIN {schema}.{table} ON {join_predicate} WHERE {table}.id = ?1 ORDER BY datastream.id",
            self.select_sql(),
            schema = self.schema,
        )
    }

    fn query_datastreams<P: Params>(&self, sql: &str, params: P) -> RepoResult<Vec<Datastream>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut datastreams = Vec::new();

        while let Some(row) = rows.next()? {
            datastreams.push(parse_datastream_row(row)?);
        }

        Ok(datastreams)
    }

    fn query_datastream<P: Params>(&self, sql: &str, params: P) -> RepoResult<Datastream> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let Some(row) = rows.next()? else {
            return Err(RepoError::NotFound("Datastream not found".to_string()));
        };
        let datastream = parse_datastream_row(row)?;
        Ok(datastream)
    }

    fn require_reference(&self, request: &NewDatastream, kind: ReferenceKind) -> RepoResult<i64> {
        let id = request
            .reference(kind)
            .and_then(|reference| parse_id(&reference.id).ok())
            .ok_or(RepoError::MissingReference(kind))?;

        if !self.references.reference_exists(kind, id) {
            return Err(RepoError::MissingReference(kind));
        }

        Ok(id)
    }
}

impl<L: ReferenceLookup> DatastreamRepository for SqliteDatastreamRepository<'_, L> {
    fn get_datastream(&self, id: &str) -> RepoResult<Datastream> {
        let id = parse_id(id)?;
        let sql = format!("{} WHERE datastream.id = ?1;", self.select_sql());
        self.query_datastream(&sql, [id])
    }

    fn list_datastreams(&self) -> RepoResult<Vec<Datastream>> {
        let sql = format!("{} ORDER BY datastream.id;", self.select_sql());
        self.query_datastreams(&sql, params![])
    }

    fn get_datastream_by_observation(&self, observation_id: &str) -> RepoResult<Datastream> {
        let id = parse_id(observation_id)?;
        let sql = self.related_sql("observation", "datastream.id = observation.stream_id");
        self.query_datastream(&sql, [id])
    }

    fn list_datastreams_by_thing(&self, thing_id: &str) -> RepoResult<Vec<Datastream>> {
        let id = parse_id(thing_id)?;
        let sql = self.related_sql("thing", "thing.id = datastream.thing_id");
        self.query_datastreams(&sql, [id])
    }

    fn list_datastreams_by_sensor(&self, sensor_id: &str) -> RepoResult<Vec<Datastream>> {
        let id = parse_id(sensor_id)?;
        let sql = self.related_sql("sensor", "sensor.id = datastream.sensor_id");
        self.query_datastreams(&sql, [id])
    }

    fn list_datastreams_by_observed_property(
        &self,
        observed_property_id: &str,
    ) -> RepoResult<Vec<Datastream>> {
        let id = parse_id(observed_property_id)?;
        let sql = self.related_sql(
            "observedproperty",
            "observedproperty.id = datastream.observedproperty_id",
        );
        self.query_datastreams(&sql, [id])
    }

    fn create_datastream(&self, datastream: &NewDatastream) -> RepoResult<Datastream> {
        // Fixed order: the first missing reference is the one reported.
        let thing_id = self.require_reference(datastream, ReferenceKind::Thing)?;
        let sensor_id = self.require_reference(datastream, ReferenceKind::Sensor)?;
        let observed_property_id =
            self.require_reference(datastream, ReferenceKind::ObservedProperty)?;

        let unit_of_measurement = map_to_json(&datastream.unit_of_measurement);
        let observed_area = geometry_to_geojson(&datastream.observed_area);

        let id: i64 = self.conn.query_row(
            &format!(
                "INSERT INTO {}.datastream (
                    description,
                    unitofmeasurement,
                    observedarea,
                    thing_id,
                    sensor_id,
                    observedproperty_id
                ) VALUES (?1, ?2, ST_GeomFromGeoJSON(?3), ?4, ?5, ?6)
                RETURNING id;",
                self.schema
            ),
            params![
                datastream.description.as_str(),
                unit_of_measurement,
                observed_area,
                thing_id,
                sensor_id,
                observed_property_id,
            ],
            |row| row.get(0),
        )?;

        debug!(
            "event=datastream_create module=repo status=ok id={} thing_id={} sensor_id={} observedproperty_id={}",
            id, thing_id, sensor_id, observed_property_id
        );

        Ok(Datastream {
            id: id.to_string(),
            description: datastream.description.clone(),
            unit_of_measurement: datastream.unit_of_measurement.clone(),
            observed_area: datastream.observed_area.clone(),
        })
    }

    fn delete_datastream(&self, id: &str) -> RepoResult<()> {
        let id = parse_id(id)?;
        let changed = self.conn.execute(
            &format!("DELETE FROM {}.datastream WHERE id = ?1;", self.schema),
            [id],
        )?;

        debug!(
            "event=datastream_delete module=repo status=ok id={} rows={}",
            id, changed
        );
        Ok(())
    }

    fn datastream_exists(&self, id: i64) -> bool {
        check_row_exists(self.conn, &self.schema, "datastream", id).is_present()
    }
}

/// Parses an external id into the store's integer key.
pub fn parse_id(value: &str) -> RepoResult<i64> {
    value
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 0)
        .ok_or_else(|| {
            RepoError::InvalidArgument(format!(
                "invalid id `{value}`; expected a non-negative integer"
            ))
        })
}

fn parse_datastream_row(row: &Row<'_>) -> RepoResult<Datastream> {
    let id: i64 = row.get("id")?;
    let unit_text: String = row.get("unitofmeasurement")?;
    let area_text: Option<String> = row.get("observedarea")?;

    let unit_of_measurement =
        json_to_map(Some(&unit_text)).map_err(|source| RepoError::Decode {
            column: "unitofmeasurement",
            source,
        })?;
    let observed_area =
        geojson_to_geometry(area_text.as_deref()).map_err(|source| RepoError::Decode {
            column: "observedarea",
            source,
        })?;

    Ok(Datastream {
        id: id.to_string(),
        description: row.get("description")?,
        unit_of_measurement,
        observed_area,
    })
}

fn ensure_datastream_connection_ready(conn: &Connection, schema: &str) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn, schema)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, schema, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in REQUIRED_DATASTREAM_COLUMNS {
        if !table_has_column(conn, schema, "datastream", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "datastream",
                column,
            });
        }
    }

    conn.query_row(&format!("SELECT {AS_GEOJSON}(NULL);"), [], |row| {
        row.get::<_, Option<String>>(0)
    })
    .map_err(|_| RepoError::MissingSpatialSupport)?;

    Ok(())
}

fn table_exists(conn: &Connection, schema: &str, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(
                SELECT 1
                FROM {schema}.sqlite_master
                WHERE type = 'table' AND name = ?1
            );"
        ),
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, schema: &str, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA {schema}.table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
