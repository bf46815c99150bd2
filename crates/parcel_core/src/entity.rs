use std::collections::HashSet;

/// One unit of harvesting work. Identity is `object_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub entity_id: Option<String>,
    pub object_id: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl EntityRecord {
    /// Build a record from raw identifier text; `None` when the object id
    /// normalizes to nothing.
    pub fn from_raw(
        entity_id: Option<&str>,
        object_id: &str,
        lon: Option<f64>,
        lat: Option<f64>,
    ) -> Option<Self> {
        let object_id = normalize_identifier(object_id)?;
        Some(Self {
            entity_id: entity_id.and_then(normalize_identifier),
            object_id,
            lon,
            lat,
        })
    }
}

/// Canonical string form of an identifier.
///
/// Trims whitespace and removes a `.0` suffix left behind when an integer id
/// passed through a float column (`"12345.0"` becomes `"12345"`). Returns
/// `None` for empty input.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let canonical = match trimmed.strip_suffix(".0") {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits,
        _ => trimmed,
    };
    if canonical.is_empty() {
        None
    } else {
        Some(canonical.to_string())
    }
}

/// Drop repeated object ids, keeping the first occurrence and input order.
pub fn dedupe_by_object_id(records: impl IntoIterator<Item = EntityRecord>) -> Vec<EntityRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.object_id.clone()))
        .collect()
}
