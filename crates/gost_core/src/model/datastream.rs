//! Datastream domain model.
//!
//! # Responsibility
//! - Define the read model returned by every lookup path.
//! - Define the create request carrying write-time-only references.
//!
//! # Invariants
//! - `Datastream` has no association fields; relationships are exposed by the
//!   request layer as links, not as embedded entities.
//! - `observed_area` is empty when the store holds no geometry.

use super::JsonMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Store-assigned datastream identifier in its external string form.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type DatastreamId = String;

/// Related entity types a datastream must reference on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Thing,
    Sensor,
    ObservedProperty,
}

impl ReferenceKind {
    /// Table holding rows of this entity type.
    pub fn table(self) -> &'static str {
        match self {
            Self::Thing => "thing",
            Self::Sensor => "sensor",
            Self::ObservedProperty => "observedproperty",
        }
    }
}

impl Display for ReferenceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thing => write!(f, "Thing"),
            Self::Sensor => write!(f, "Sensor"),
            Self::ObservedProperty => write!(f, "ObservedProperty"),
        }
    }
}

/// Id-only reference to a related entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "@iot.id")]
    pub id: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Materialized datastream as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastream {
    #[serde(rename = "@iot.id")]
    pub id: DatastreamId,
    pub description: String,
    pub unit_of_measurement: JsonMap,
    /// GeoJSON geometry as rendered by the store; empty when absent.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub observed_area: JsonMap,
}

/// Create request for a datastream.
///
/// All three references are required by the write path; they are optional
/// here so a request decoded from the wire can be rejected per reference.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDatastream {
    pub description: String,
    pub unit_of_measurement: JsonMap,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub observed_area: JsonMap,
    #[serde(rename = "Thing", default, skip_serializing_if = "Option::is_none")]
    pub thing: Option<EntityRef>,
    #[serde(rename = "Sensor", default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<EntityRef>,
    #[serde(
        rename = "ObservedProperty",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub observed_property: Option<EntityRef>,
}

impl NewDatastream {
    /// Creates a request with all three references set and no observed area.
    pub fn new(
        description: impl Into<String>,
        unit_of_measurement: JsonMap,
        thing_id: impl Into<String>,
        sensor_id: impl Into<String>,
        observed_property_id: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            unit_of_measurement,
            observed_area: JsonMap::new(),
            thing: Some(EntityRef::new(thing_id)),
            sensor: Some(EntityRef::new(sensor_id)),
            observed_property: Some(EntityRef::new(observed_property_id)),
        }
    }

    /// Sets the geospatial extent, builder style.
    pub fn with_observed_area(mut self, observed_area: JsonMap) -> Self {
        self.observed_area = observed_area;
        self
    }

    /// Returns the reference supplied for `kind`, if any.
    pub fn reference(&self, kind: ReferenceKind) -> Option<&EntityRef> {
        match kind {
            ReferenceKind::Thing => self.thing.as_ref(),
            ReferenceKind::Sensor => self.sensor.as_ref(),
            ReferenceKind::ObservedProperty => self.observed_property.as_ref(),
        }
    }
}
