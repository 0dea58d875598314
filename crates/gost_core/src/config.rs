//! Store configuration.
//!
//! # Responsibility
//! - Carry the trusted schema qualifier used by every statement.
//! - Validate the schema name once, so SQL builders can interpolate it.
//!
//! # Invariants
//! - `schema` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
//! - `schema` is never derived from request input.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Environment variable consulted by [`StoreConfig::from_env`].
pub const SCHEMA_ENV_VAR: &str = "GOST_DB_SCHEMA";

/// SQLite name of the primary database of a connection.
pub const DEFAULT_SCHEMA: &str = "main";

const MAX_SCHEMA_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptySchema,
    InvalidSchema(String),
    ReservedSchema(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySchema => write!(f, "schema name cannot be empty"),
            Self::InvalidSchema(name) => write!(
                f,
                "invalid schema name `{name}`; expected a plain identifier of at most {MAX_SCHEMA_LEN} chars"
            ),
            Self::ReservedSchema(name) => write!(f, "schema name `{name}` is reserved"),
        }
    }
}

impl Error for ConfigError {}

/// Connection-independent settings shared read-only by all repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    schema: String,
}

impl StoreConfig {
    /// Builds a config for the given schema qualifier.
    ///
    /// # Errors
    /// - `EmptySchema` for blank input.
    /// - `InvalidSchema` when the name is not a plain identifier.
    /// - `ReservedSchema` for `temp`, which SQLite owns.
    pub fn new(schema: impl Into<String>) -> Result<Self, ConfigError> {
        let schema = schema.into().trim().to_string();
        validate_schema(&schema)?;
        Ok(Self { schema })
    }

    /// Reads the schema from `GOST_DB_SCHEMA`, falling back to `main`.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(SCHEMA_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => Self::new(value),
            _ => Ok(Self::default()),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Whether the schema lives in an attached database rather than `main`.
    pub fn is_attached_schema(&self) -> bool {
        !self.schema.eq_ignore_ascii_case(DEFAULT_SCHEMA)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

fn validate_schema(schema: &str) -> Result<(), ConfigError> {
    if schema.is_empty() {
        return Err(ConfigError::EmptySchema);
    }
    if schema.eq_ignore_ascii_case("temp") {
        return Err(ConfigError::ReservedSchema(schema.to_string()));
    }

    let mut chars = schema.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    let rest_ok = chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !starts_ok || !rest_ok || schema.len() > MAX_SCHEMA_LEN {
        return Err(ConfigError::InvalidSchema(schema.to_string()));
    }

    Ok(())
}
