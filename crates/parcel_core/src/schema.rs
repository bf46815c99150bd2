use std::collections::BTreeMap;

use serde_json::Value;

use crate::{ApiStatus, EntityRecord};

pub const ENTITY_ID_COLUMN: &str = "parcel_id";
pub const OBJECT_ID_COLUMN: &str = "parcel_objectid";
pub const LON_COLUMN: &str = "lon";
pub const LAT_COLUMN: &str = "lat";
pub const RULE_ID_COLUMN: &str = "rule_id";
pub const API_STATUS_COLUMN: &str = "api_status";
pub const EXTRA_DATA_COLUMN: &str = "extra_data";

/// Attribute columns filled from API result elements, in output order.
pub const ATTRIBUTE_COLUMNS: [&str; 16] = [
    RULE_ID_COLUMN,
    "zoningId",
    "zoningColor",
    "zoningGroup",
    "landuse",
    "description",
    "name",
    "coloring",
    "coloringDescription",
    "maxBuildingCoefficient",
    "maxBuildingHeight",
    "maxParcelCoverage",
    "maxRuleDepth",
    "mainStreetsSetback",
    "secondaryStreetsSetback",
    "sideRearSetback",
];

/// Full output header. `extra_data` stays last.
pub const OUTPUT_COLUMNS: [&str; 22] = [
    ENTITY_ID_COLUMN,
    OBJECT_ID_COLUMN,
    LON_COLUMN,
    LAT_COLUMN,
    ATTRIBUTE_COLUMNS[0],
    ATTRIBUTE_COLUMNS[1],
    ATTRIBUTE_COLUMNS[2],
    ATTRIBUTE_COLUMNS[3],
    ATTRIBUTE_COLUMNS[4],
    ATTRIBUTE_COLUMNS[5],
    ATTRIBUTE_COLUMNS[6],
    ATTRIBUTE_COLUMNS[7],
    ATTRIBUTE_COLUMNS[8],
    ATTRIBUTE_COLUMNS[9],
    ATTRIBUTE_COLUMNS[10],
    ATTRIBUTE_COLUMNS[11],
    ATTRIBUTE_COLUMNS[12],
    ATTRIBUTE_COLUMNS[13],
    ATTRIBUTE_COLUMNS[14],
    ATTRIBUTE_COLUMNS[15],
    API_STATUS_COLUMN,
    EXTRA_DATA_COLUMN,
];

/// Schema name of an attribute column, if `name` is one.
pub fn attribute_column(name: &str) -> Option<&'static str> {
    ATTRIBUTE_COLUMNS.iter().copied().find(|column| *column == name)
}

/// One persisted output line.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub entity: EntityRecord,
    attributes: BTreeMap<&'static str, Value>,
    pub api_status: ApiStatus,
    pub extra_data: Option<Value>,
}

impl OutputRow {
    /// Row carrying only identity columns and a status.
    pub fn bare(entity: &EntityRecord, api_status: ApiStatus) -> Self {
        Self {
            entity: entity.clone(),
            attributes: BTreeMap::new(),
            api_status,
            extra_data: None,
        }
    }

    /// Store `value` under the schema column `name`; hands the value back
    /// when `name` is not an attribute column.
    pub fn set_attribute(&mut self, name: &str, value: Value) -> Result<(), Value> {
        match attribute_column(name) {
            Some(column) => {
                self.attributes.insert(column, value);
                Ok(())
            }
            None => Err(value),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn rule_id(&self) -> Option<String> {
        self.attribute(RULE_ID_COLUMN).and_then(cell_text)
    }

    /// Cells in [`OUTPUT_COLUMNS`] order.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(OUTPUT_COLUMNS.len());
        record.push(self.entity.entity_id.clone().unwrap_or_default());
        record.push(self.entity.object_id.clone());
        record.push(self.entity.lon.map(|v| v.to_string()).unwrap_or_default());
        record.push(self.entity.lat.map(|v| v.to_string()).unwrap_or_default());
        for column in ATTRIBUTE_COLUMNS {
            record.push(
                self.attributes
                    .get(column)
                    .and_then(cell_text)
                    .unwrap_or_default(),
            );
        }
        record.push(self.api_status.as_str().to_string());
        record.push(self.extra_data.as_ref().map(Value::to_string).unwrap_or_default());
        record
    }
}

/// Text stored in a CSV cell for a JSON value; `None` for null.
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
