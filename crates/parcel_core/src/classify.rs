use serde_json::{Map, Value};

use crate::{ApiStatus, EntityRecord, FetchOutcome, FetchResolution, OutputRow, RULE_ID_COLUMN};

/// Turn the resolution of one entity into the rows to persist.
///
/// Always returns at least one row. A successful response fans out into one
/// row per result element.
pub fn classify(entity: &EntityRecord, resolution: &FetchResolution) -> Vec<OutputRow> {
    match (&resolution.outcome, resolution.status()) {
        (FetchOutcome::Success(items), ApiStatus::Success) => items
            .iter()
            .map(|element| classify_element(entity, element))
            .collect(),
        (_, status) => vec![OutputRow::bare(entity, status)],
    }
}

fn classify_element(entity: &EntityRecord, element: &Value) -> OutputRow {
    let mut row = OutputRow::bare(entity, ApiStatus::Success);

    let Value::Object(fields) = element else {
        row.extra_data = Some(element.clone());
        return row;
    };

    let mut extras = Map::new();
    for (key, value) in fields {
        // The API's generic `id` is the rule identifier.
        let column = if key == "id" { RULE_ID_COLUMN } else { key.as_str() };
        // First value for a column wins; `id` sorts before `rule_id`.
        if row.attribute(column).is_some() {
            extras.insert(key.clone(), value.clone());
            continue;
        }
        if let Err(value) = row.set_attribute(column, value.clone()) {
            extras.insert(key.clone(), value);
        }
    }
    if !extras.is_empty() {
        row.extra_data = Some(Value::Object(extras));
    }
    row
}
