use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use flate2::read::GzDecoder;
use geo::{Centroid, Coord, Geometry, MapCoords};
use mvt_reader::feature::Value;
use mvt_reader::Reader;
use parcel_core::normalize_identifier;

/// Property keys holding the object id, in order of preference.
pub const OBJECT_ID_KEYS: [&str; 2] = ["parcel_objectid", "OBJECTID"];
/// Property keys holding the entity id, in order of preference.
pub const ENTITY_ID_KEYS: [&str; 2] = ["parcel_id", "id"];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to inflate gzip tile: {0}")]
    Inflate(String),
    #[error("malformed vector tile: {0}")]
    Malformed(String),
}

/// One decoded feature, in y-up tile-local space.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    pub id_fields: BTreeMap<String, String>,
    pub local_geometry: Geometry<f64>,
}

impl RawFeature {
    pub fn object_id(&self) -> Option<&str> {
        first_present(&self.id_fields, &OBJECT_ID_KEYS)
    }

    pub fn entity_id(&self) -> Option<&str> {
        first_present(&self.id_fields, &ENTITY_ID_KEYS)
    }

    /// Centroid `(px, py)` of the local geometry.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        self.local_geometry
            .centroid()
            .map(|point| (point.x(), point.y()))
    }
}

fn first_present<'a>(fields: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| fields.get(*key))
        .map(String::as_str)
}

/// Decode a vector-tile payload, keeping features of the first layer that
/// carry an object id and a geometry.
///
/// Coordinates are rescaled from the extent the layer declares to `extent`,
/// so callers always work in one local space.
pub fn decode_tile(payload: &[u8], extent: u32) -> Result<Vec<RawFeature>, DecodeError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    let data = inflate_if_gzipped(payload)?;

    let reader = Reader::new(data).map_err(|err| DecodeError::Malformed(err.to_string()))?;
    let layer_names = reader
        .get_layer_names()
        .map_err(|err| DecodeError::Malformed(err.to_string()))?;
    if layer_names.is_empty() {
        return Ok(Vec::new());
    }

    // Layer names differ between servers; the first layer holds the parcels.
    let features = reader
        .get_features(0)
        .map_err(|err| DecodeError::Malformed(err.to_string()))?;

    let layer_extent = reader
        .get_layer_metadata()
        .map_err(|err| DecodeError::Malformed(err.to_string()))?
        .first()
        .map(|layer| layer.extent)
        .filter(|declared| *declared > 0)
        .unwrap_or(extent);
    let target = f64::from(extent);
    let scale = target / f64::from(layer_extent);

    let decoded = features
        .iter()
        .filter_map(|feature| {
            let id_fields = extract_id_fields(feature.properties.as_ref()?);
            first_present(&id_fields, &OBJECT_ID_KEYS)?;
            let local_geometry = feature.get_geometry().map_coords(|c| Coord {
                x: f64::from(c.x) * scale,
                y: target - f64::from(c.y) * scale,
            });
            Some(RawFeature {
                id_fields,
                local_geometry,
            })
        })
        .collect();
    Ok(decoded)
}

fn inflate_if_gzipped(payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if !payload.starts_with(&GZIP_MAGIC) {
        return Ok(payload.to_vec());
    }
    let mut inflated = Vec::new();
    GzDecoder::new(payload)
        .read_to_end(&mut inflated)
        .map_err(|err| DecodeError::Inflate(err.to_string()))?;
    Ok(inflated)
}

fn extract_id_fields(properties: &HashMap<String, Value>) -> BTreeMap<String, String> {
    OBJECT_ID_KEYS
        .iter()
        .chain(ENTITY_ID_KEYS.iter())
        .filter_map(|key| {
            let text = property_text(properties.get(*key)?)?;
            Some((key.to_string(), text))
        })
        .collect()
}

fn property_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => normalize_identifier(text),
        Value::Int(number) | Value::SInt(number) => Some(number.to_string()),
        Value::UInt(number) => Some(number.to_string()),
        Value::Double(number) => float_text(*number),
        Value::Float(number) => float_text(f64::from(*number)),
        _ => None,
    }
}

/// Integral floats print without a fractional part.
fn float_text(number: f64) -> Option<String> {
    if !number.is_finite() {
        return None;
    }
    if number.fract() == 0.0 && number.abs() < 9.007_199_254_740_992e15 {
        Some(format!("{number:.0}"))
    } else {
        Some(number.to_string())
    }
}
