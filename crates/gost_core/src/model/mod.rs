//! Catalog domain model for the datastream persistence core.
//!
//! # Responsibility
//! - Define the datastream read model and its create request.
//! - Keep related entities as id-only references.
//!
//! # Invariants
//! - Datastream ids are assigned by the store, never by callers.
//! - Related entities are never embedded in a datastream read model.

pub mod datastream;

pub use datastream::{Datastream, DatastreamId, EntityRef, NewDatastream, ReferenceKind};

/// String-keyed attribute mapping with arbitrary JSON values.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
