//! Datastream persistence core for the GOST sensor catalog.
//! Owns the datastream storage contract: lookups, creation with reference
//! checks, deletion, and the JSON/GeoJSON storage encodings.

pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{Datastream, DatastreamId, EntityRef, JsonMap, NewDatastream, ReferenceKind};
pub use repo::datastream_repo::{
    DatastreamRepository, ErrorKind, RepoError, RepoResult, SqliteDatastreamRepository,
};
pub use repo::reference_repo::{Existence, ReferenceLookup, SqliteReferenceRepository};
pub use service::datastream_service::DatastreamService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
