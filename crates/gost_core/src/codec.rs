//! Conversions between datastream payload fields and their storage text.
//!
//! # Responsibility
//! - Decode stored JSON text into attribute mappings.
//! - Encode attribute mappings and geospatial extents for write paths.
//!
//! # Invariants
//! - Absent text decodes to an empty mapping, never an error.
//! - An empty geospatial mapping encodes to `None` so the column stays NULL.
//! - Geometry normalization is owned by the store (`ST_AsGeoJSON`); decoding
//!   only checks that the rendered text is a geometry.

use crate::db::spatial::{normalize_geometry, SpatialError};
use crate::model::JsonMap;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug)]
pub enum CodecError {
    /// Payload is not valid JSON.
    Malformed(serde_json::Error),
    /// Payload is valid JSON but not an object.
    NotAnObject(&'static str),
    /// Payload is a JSON object but not a GeoJSON geometry.
    InvalidGeometry(SpatialError),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed json: {err}"),
            Self::NotAnObject(found) => write!(f, "expected json object, found {found}"),
            Self::InvalidGeometry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::InvalidGeometry(err) => Some(err),
            Self::NotAnObject(_) => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}

/// Decodes optional JSON text into a mapping.
pub fn json_to_map(payload: Option<&str>) -> CodecResult<JsonMap> {
    let Some(text) = payload else {
        return Ok(JsonMap::new());
    };

    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(CodecError::NotAnObject(json_kind(&other))),
    }
}

/// Decodes stored GeoJSON text into a geospatial extent.
///
/// Absent text is an empty extent. Text that parses but is not a geometry is
/// an `InvalidGeometry` error.
pub fn geojson_to_geometry(payload: Option<&str>) -> CodecResult<JsonMap> {
    let area = json_to_map(payload)?;
    if area.is_empty() {
        return Ok(area);
    }

    match normalize_geometry(&Value::Object(area)).map_err(CodecError::InvalidGeometry)? {
        Value::Object(geometry) => Ok(geometry),
        other => Err(CodecError::NotAnObject(json_kind(&other))),
    }
}

/// Encodes an attribute mapping as JSON text.
pub fn map_to_json(map: &JsonMap) -> String {
    // A map of `Value`s has string keys only, so serialization cannot fail.
    Value::Object(map.clone()).to_string()
}

/// Encodes a geospatial extent as GeoJSON text, or `None` when empty.
pub fn geometry_to_geojson(area: &JsonMap) -> Option<String> {
    if area.is_empty() {
        return None;
    }
    Some(map_to_json(area))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{geojson_to_geometry, geometry_to_geojson, json_to_map, map_to_json, CodecError};
    use crate::model::JsonMap;
    use serde_json::json;

    fn object(value: serde_json::Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn absent_payload_decodes_to_empty_map() {
        assert!(json_to_map(None).unwrap().is_empty());
    }

    #[test]
    fn unit_of_measurement_roundtrips_through_text() {
        let unit = object(json!({
            "name": "degree Celsius",
            "symbol": "°C",
            "definition": "http://unitsofmeasure.org/ucum.html#para-30",
            "scale": [1, 2.5, null],
            "nested": {"flag": true}
        }));

        let text = map_to_json(&unit);
        assert_eq!(json_to_map(Some(&text)).unwrap(), unit);
    }

    #[test]
    fn empty_map_roundtrips_through_text() {
        let text = map_to_json(&JsonMap::new());
        assert_eq!(text, "{}");
        assert!(json_to_map(Some(&text)).unwrap().is_empty());
    }

    #[test]
    fn malformed_text_is_a_decode_error() {
        let err = json_to_map(Some("{\"name\": ")).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn non_object_json_is_rejected() {
        let err = json_to_map(Some("[1, 2]")).unwrap_err();
        assert!(matches!(err, CodecError::NotAnObject("array")));
    }

    #[test]
    fn empty_geometry_encodes_to_none() {
        assert_eq!(geometry_to_geojson(&JsonMap::new()), None);

        let point = object(json!({"type": "Point", "coordinates": [5.0, 52.0]}));
        let text = geometry_to_geojson(&point).unwrap();
        assert_eq!(json_to_map(Some(&text)).unwrap(), point);
    }

    #[test]
    fn stored_geometry_text_must_be_a_geometry() {
        assert!(geojson_to_geometry(None).unwrap().is_empty());
        assert_eq!(
            geojson_to_geometry(Some(r#"{"type":"Point","coordinates":[1,2]}"#)).unwrap(),
            object(json!({"type": "Point", "coordinates": [1, 2]}))
        );

        let err = geojson_to_geometry(Some(r#"{"type":"Circle","radius":3}"#)).unwrap_err();
        assert!(matches!(err, CodecError::InvalidGeometry(_)));
        let err = geojson_to_geometry(Some("{not json")).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
