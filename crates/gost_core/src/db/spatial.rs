//! Spatial SQL functions registered on every catalog connection.
//!
//! # Responsibility
//! - Provide `ST_GeomFromGeoJSON(text)` to build stored geometry values.
//! - Provide `ST_AsGeoJSON(geometry)` to render stored geometry as GeoJSON.
//!
//! # Invariants
//! - Both functions are strict: NULL in, NULL out.
//! - Stored geometry is always a validated, member-stripped GeoJSON geometry.
//! - Rendered coordinates carry at most `MAX_DECIMAL_DIGITS` fraction digits;
//!   integral values render without a fraction.
//! - Invalid input to `ST_GeomFromGeoJSON` raises an SQL error; it is never
//!   coerced to NULL.
//! - `ST_AsGeoJSON` returns stored text that is not a geometry unchanged, so
//!   the reader's decoder reports it against the column.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Number, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const GEOM_FROM_GEOJSON: &str = "ST_GeomFromGeoJSON";
pub const AS_GEOJSON: &str = "ST_AsGeoJSON";

const MAX_DECIMAL_DIGITS: i32 = 9;
const MAX_INTEGRAL_RENDER: f64 = 1e15;

/// Reasons a payload is not an acceptable geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpatialError {
    NotText,
    InvalidJson(String),
    NotAnObject,
    MissingType,
    UnsupportedType(String),
    MissingMember {
        geometry: String,
        member: &'static str,
    },
    InvalidPosition(String),
    InvalidShape {
        geometry: String,
        reason: &'static str,
    },
}

impl Display for SpatialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotText => write!(f, "geometry input must be text"),
            Self::InvalidJson(err) => write!(f, "invalid GeoJSON text: {err}"),
            Self::NotAnObject => write!(f, "GeoJSON geometry must be an object"),
            Self::MissingType => write!(f, "GeoJSON geometry has no `type`"),
            Self::UnsupportedType(kind) => write!(f, "unknown GeoJSON type `{kind}`"),
            Self::MissingMember { geometry, member } => {
                write!(f, "GeoJSON {geometry} has no `{member}` member")
            }
            Self::InvalidPosition(reason) => write!(f, "invalid GeoJSON position: {reason}"),
            Self::InvalidShape { geometry, reason } => {
                write!(f, "invalid GeoJSON {geometry}: {reason}")
            }
        }
    }
}

impl Error for SpatialError {}

/// Registers the spatial functions on `conn`.
pub fn register_spatial_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function(GEOM_FROM_GEOJSON, 1, flags, geom_from_geojson)?;
    conn.create_scalar_function(AS_GEOJSON, 1, flags, as_geojson)?;
    Ok(())
}

fn geom_from_geojson(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    let Some(text) = text_argument(ctx)? else {
        return Ok(None);
    };
    let geometry = parse_geometry(text).map_err(user_error)?;
    Ok(Some(geometry.to_string()))
}

fn as_geojson(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    let Some(text) = text_argument(ctx)? else {
        return Ok(None);
    };
    let rendered = match parse_geometry(text) {
        Ok(geometry) => render_geometry(&geometry).to_string(),
        Err(_) => text.to_string(),
    };
    Ok(Some(rendered))
}

fn text_argument<'a>(ctx: &'a Context<'_>) -> rusqlite::Result<Option<&'a str>> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(Some)
            .map_err(|err| user_error(SpatialError::InvalidJson(err.to_string()))),
        _ => Err(user_error(SpatialError::NotText)),
    }
}

fn user_error(err: SpatialError) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(err))
}

/// Parses and validates GeoJSON geometry text, dropping foreign members.
pub fn parse_geometry(text: &str) -> Result<Value, SpatialError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| SpatialError::InvalidJson(err.to_string()))?;
    normalize_geometry(&value)
}

/// Validates a GeoJSON geometry value and keeps only its geometric members.
pub fn normalize_geometry(value: &Value) -> Result<Value, SpatialError> {
    let object = value.as_object().ok_or(SpatialError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(SpatialError::MissingType)?;

    let mut normalized = Map::new();
    normalized.insert("type".to_string(), Value::String(kind.to_string()));

    if kind == "GeometryCollection" {
        let members = object
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| SpatialError::MissingMember {
                geometry: kind.to_string(),
                member: "geometries",
            })?;
        let geometries = members
            .iter()
            .map(normalize_geometry)
            .collect::<Result<Vec<_>, _>>()?;
        normalized.insert("geometries".to_string(), Value::Array(geometries));
        return Ok(Value::Object(normalized));
    }

    let coordinates = object
        .get("coordinates")
        .ok_or_else(|| SpatialError::MissingMember {
            geometry: kind.to_string(),
            member: "coordinates",
        })?;

    let checked = match kind {
        "Point" => position(coordinates)?,
        "MultiPoint" => positions(kind, coordinates, 0)?,
        "LineString" => positions(kind, coordinates, 2)?,
        "MultiLineString" => nested(kind, coordinates, |line| positions(kind, line, 2))?,
        "Polygon" => polygon(kind, coordinates)?,
        "MultiPolygon" => nested(kind, coordinates, |rings| polygon(kind, rings))?,
        other => return Err(SpatialError::UnsupportedType(other.to_string())),
    };
    normalized.insert("coordinates".to_string(), checked);

    Ok(Value::Object(normalized))
}

/// Renders a normalized geometry with store-side coordinate precision.
pub fn render_geometry(geometry: &Value) -> Value {
    match geometry {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, value)| (key.clone(), render_geometry(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(render_geometry).collect()),
        Value::Number(number) => number
            .as_f64()
            .map(render_coordinate)
            .unwrap_or_else(|| Value::Number(number.clone())),
        other => other.clone(),
    }
}

fn render_coordinate(value: f64) -> Value {
    let scale = 10f64.powi(MAX_DECIMAL_DIGITS);
    let scaled = value * scale;
    // Past this magnitude there are no fraction digits left to round.
    let rounded = if scaled.is_finite() {
        scaled.round() / scale
    } else {
        value
    };
    if rounded.fract() == 0.0 && rounded.abs() < MAX_INTEGRAL_RENDER {
        return Value::Number(Number::from(rounded as i64));
    }
    Number::from_f64(rounded).map_or(Value::Null, Value::Number)
}

fn position(value: &Value) -> Result<Value, SpatialError> {
    let items = value
        .as_array()
        .ok_or_else(|| SpatialError::InvalidPosition("expected an array".to_string()))?;
    if !(2..=4).contains(&items.len()) {
        return Err(SpatialError::InvalidPosition(format!(
            "expected 2 to 4 ordinates, got {}",
            items.len()
        )));
    }
    for item in items {
        match item.as_f64() {
            Some(ordinate) if ordinate.is_finite() => {}
            _ => {
                return Err(SpatialError::InvalidPosition(format!(
                    "ordinate `{item}` is not a finite number"
                )))
            }
        }
    }
    Ok(value.clone())
}

fn positions(kind: &str, value: &Value, min_len: usize) -> Result<Value, SpatialError> {
    let items = value.as_array().ok_or_else(|| SpatialError::InvalidShape {
        geometry: kind.to_string(),
        reason: "expected an array of positions",
    })?;
    if items.len() < min_len {
        return Err(SpatialError::InvalidShape {
            geometry: kind.to_string(),
            reason: "too few positions",
        });
    }
    items
        .iter()
        .map(position)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn polygon(kind: &str, value: &Value) -> Result<Value, SpatialError> {
    nested(kind, value, |ring| {
        let checked = positions(kind, ring, 4)?;
        let points = checked.as_array().map(Vec::as_slice).unwrap_or_default();
        if points.first() != points.last() {
            return Err(SpatialError::InvalidShape {
                geometry: kind.to_string(),
                reason: "linear ring is not closed",
            });
        }
        Ok(checked)
    })
}

fn nested<F>(kind: &str, value: &Value, check: F) -> Result<Value, SpatialError>
where
    F: Fn(&Value) -> Result<Value, SpatialError>,
{
    let items = value.as_array().ok_or_else(|| SpatialError::InvalidShape {
        geometry: kind.to_string(),
        reason: "expected an array",
    })?;
    items
        .iter()
        .map(check)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

#[cfg(test)]
mod tests {
    use super::{normalize_geometry, parse_geometry, render_geometry, SpatialError};
    use serde_json::json;

    #[test]
    fn foreign_members_are_dropped() {
        let normalized = normalize_geometry(&json!({
            "type": "Point",
            "coordinates": [5.1, 52.3],
            "crs": {"type": "name", "properties": {"name": "EPSG:4326"}},
            "bbox": [5.1, 52.3, 5.1, 52.3]
        }))
        .unwrap();
        assert_eq!(normalized, json!({"type": "Point", "coordinates": [5.1, 52.3]}));
    }

    #[test]
    fn unclosed_polygon_ring_is_rejected() {
        let err = normalize_geometry(&json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]
        }))
        .unwrap_err();
        assert!(matches!(err, SpatialError::InvalidShape { .. }));
    }

    #[test]
    fn features_are_not_geometries() {
        let err = parse_geometry(r#"{"type":"Feature","geometry":null}"#).unwrap_err();
        assert_eq!(err, SpatialError::UnsupportedType("Feature".to_string()));
    }

    #[test]
    fn geometry_collection_normalizes_members() {
        let normalized = normalize_geometry(&json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [1, 2], "id": 3},
                {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}
            ]
        }))
        .unwrap();
        assert_eq!(
            normalized["geometries"][0],
            json!({"type": "Point", "coordinates": [1, 2]})
        );
    }

    #[test]
    fn render_rounds_to_nine_digits_and_trims_integral_values() {
        let rendered = render_geometry(&json!({
            "type": "Point",
            "coordinates": [5.0, 52.1234567891234]
        }));
        assert_eq!(
            rendered,
            json!({"type": "Point", "coordinates": [5, 52.123456789]})
        );
    }

    #[test]
    fn render_keeps_ordinates_too_large_to_scale() {
        let rendered = render_geometry(&json!({
            "type": "Point",
            "coordinates": [1e300, 52.0]
        }));
        assert_eq!(
            rendered,
            json!({"type": "Point", "coordinates": [1e300, 52]})
        );
    }

    #[test]
    fn position_requires_finite_numbers() {
        let err = normalize_geometry(&json!({"type": "Point", "coordinates": ["5", 1]}))
            .unwrap_err();
        assert!(matches!(err, SpatialError::InvalidPosition(_)));
    }
}
