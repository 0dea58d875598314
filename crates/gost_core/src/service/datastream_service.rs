//! Datastream use-case service.
//!
//! # Responsibility
//! - Provide stable entry points for request-handling callers.
//! - Delegate persistence to repository implementations.
//! - Emit write-path diagnostics with duration and outcome.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Service layer remains storage-agnostic.

use crate::model::{Datastream, NewDatastream};
use crate::repo::datastream_repo::{DatastreamRepository, RepoResult};
use log::{info, warn};
use std::time::Instant;

/// Use-case service wrapper for datastream operations.
pub struct DatastreamService<R: DatastreamRepository> {
    repo: R,
}

impl<R: DatastreamRepository> DatastreamService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Gets one datastream by external id.
    pub fn get_datastream(&self, id: &str) -> RepoResult<Datastream> {
        self.repo.get_datastream(id)
    }

    /// Lists every datastream in ascending id order.
    pub fn list_datastreams(&self) -> RepoResult<Vec<Datastream>> {
        self.repo.list_datastreams()
    }

    /// Gets the datastream an observation belongs to.
    pub fn get_datastream_by_observation(&self, observation_id: &str) -> RepoResult<Datastream> {
        self.repo.get_datastream_by_observation(observation_id)
    }

    /// Lists datastreams attached to a thing; an unknown thing yields none.
    pub fn list_datastreams_by_thing(&self, thing_id: &str) -> RepoResult<Vec<Datastream>> {
        self.repo.list_datastreams_by_thing(thing_id)
    }

    /// Lists datastreams measured by a sensor.
    pub fn list_datastreams_by_sensor(&self, sensor_id: &str) -> RepoResult<Vec<Datastream>> {
        self.repo.list_datastreams_by_sensor(sensor_id)
    }

    /// Lists datastreams observing a property.
    pub fn list_datastreams_by_observed_property(
        &self,
        observed_property_id: &str,
    ) -> RepoResult<Vec<Datastream>> {
        self.repo
            .list_datastreams_by_observed_property(observed_property_id)
    }

    /// Creates a datastream after its references are verified.
    ///
    /// # Contract
    /// - Returns the stored datastream with its new id and no associations.
    /// - Reference failures are reported for the first missing entity only.
    pub fn create_datastream(&self, datastream: &NewDatastream) -> RepoResult<Datastream> {
        let started_at = Instant::now();
        match self.repo.create_datastream(datastream) {
            Ok(created) => {
                info!(
                    "event=datastream_create module=service status=ok id={} duration_ms={}",
                    created.id,
                    started_at.elapsed().as_millis()
                );
                Ok(created)
            }
            Err(err) => {
                warn!(
                    "event=datastream_create module=service status=error kind={:?} duration_ms={} error={}",
                    err.kind(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Deletes a datastream by id; deleting a missing row succeeds.
    pub fn delete_datastream(&self, id: &str) -> RepoResult<()> {
        self.repo.delete_datastream(id)?;
        info!("event=datastream_delete module=service status=ok id={}", id);
        Ok(())
    }

    /// Returns whether a datastream row exists; store errors read as `false`.
    pub fn datastream_exists(&self, id: i64) -> bool {
        self.repo.datastream_exists(id)
    }
}
