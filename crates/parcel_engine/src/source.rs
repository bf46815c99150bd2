use std::collections::HashSet;
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use parcel_core::{EntityRecord, ENTITY_ID_COLUMN, LAT_COLUMN, LON_COLUMN, OBJECT_ID_COLUMN};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

const UTF8_BOM: char = '\u{feff}';

/// Fatal problems with the input table; raised before any network activity.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file {0:?} not found")]
    NotFound(PathBuf),
    #[error("failed to read input {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("input {path:?} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("input {path:?} line {line}: invalid {column} value {value:?}")]
    InvalidCoordinate {
        path: PathBuf,
        line: u64,
        column: &'static str,
        value: String,
    },
}

/// Entities read from an input table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityTable {
    pub records: Vec<EntityRecord>,
    /// Rows without a usable object id.
    pub dropped_rows: usize,
    /// Rows repeating an object id seen earlier.
    pub duplicate_rows: usize,
}

pub(crate) fn header_position(headers: &csv::StringRecord, column: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim_start_matches(UTF8_BOM).trim() == column)
}

/// Read `parcel_objectid` (required), `parcel_id`, `lon` and `lat` from a
/// CSV file. Every cell is read as text, ids are normalized once here.
pub fn read_entities(path: &Path) -> Result<EntityTable, InputError> {
    if !path.is_file() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    let csv_error = |source: csv::Error| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let object_col =
        header_position(&headers, OBJECT_ID_COLUMN).ok_or_else(|| InputError::MissingColumn {
            path: path.to_path_buf(),
            column: OBJECT_ID_COLUMN,
        })?;
    let entity_col = header_position(&headers, ENTITY_ID_COLUMN);
    let lon_col = header_position(&headers, LON_COLUMN);
    let lat_col = header_position(&headers, LAT_COLUMN);

    let mut table = EntityTable::default();
    let mut seen = HashSet::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let cell = |col: Option<usize>| col.and_then(|index| row.get(index));
        let coordinate = |col: Option<usize>, column: &'static str| {
            parse_coordinate(cell(col)).map_err(|value| InputError::InvalidCoordinate {
                path: path.to_path_buf(),
                line,
                column,
                value,
            })
        };

        let lon = coordinate(lon_col, LON_COLUMN)?;
        let lat = coordinate(lat_col, LAT_COLUMN)?;
        let Some(record) =
            EntityRecord::from_raw(cell(entity_col), row.get(object_col).unwrap_or(""), lon, lat)
        else {
            table.dropped_rows += 1;
            continue;
        };
        if !seen.insert(record.object_id.clone()) {
            table.duplicate_rows += 1;
            continue;
        }
        table.records.push(record);
    }

    if table.dropped_rows > 0 || table.duplicate_rows > 0 {
        engine_warn!(
            "input {:?}: dropped {} rows without object id, {} duplicate rows",
            path,
            table.dropped_rows,
            table.duplicate_rows
        );
    }
    engine_info!("Loaded {} entities from {:?}", table.records.len(), path);
    Ok(table)
}

/// Empty cells are absent coordinates; anything else must parse.
fn parse_coordinate(cell: Option<&str>) -> Result<Option<f64>, String> {
    let Some(text) = cell.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(text.to_string()),
    }
}

/// Atomically write the entity table consumed by `read_entities`.
pub fn write_entities(path: &Path, records: &[EntityRecord]) -> Result<PathBuf, PersistError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([ENTITY_ID_COLUMN, OBJECT_ID_COLUMN, LON_COLUMN, LAT_COLUMN])?;
    for record in records {
        writer.write_record([
            record.entity_id.clone().unwrap_or_default(),
            record.object_id.clone(),
            record.lon.map(|v| v.to_string()).unwrap_or_default(),
            record.lat.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    let content = writer
        .into_inner()
        .map_err(|err| PersistError::Io(err.into_error()))?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PersistError::OutputDir(format!("{} is not a file path", path.display())))?;
    AtomicFileWriter::for_file(path).write(filename, &content)
}
