//! Parcel core: pure tile math, entity model, retry policy and result
//! classification. Nothing in this crate performs IO.
mod classify;
mod entity;
mod outcome;
mod reproject;
mod retry;
mod schema;
mod tile;

pub use classify::classify;
pub use entity::{dedupe_by_object_id, normalize_identifier, EntityRecord};
pub use outcome::{ApiStatus, FetchOutcome};
pub use reproject::{forward_tile_projection, tile_local_to_lon_lat, GeoPoint, TileLocalPoint, DEFAULT_EXTENT};
pub use retry::{FetchResolution, RetryDecision, RetryPolicy};
pub use schema::{
    attribute_column, OutputRow, API_STATUS_COLUMN, ATTRIBUTE_COLUMNS, ENTITY_ID_COLUMN,
    EXTRA_DATA_COLUMN, LAT_COLUMN, LON_COLUMN, OBJECT_ID_COLUMN, OUTPUT_COLUMNS, RULE_ID_COLUMN,
};
pub use tile::{
    lat_to_tile_y, lon_to_tile_x, BoundingBox, GridError, TileCoordinate, TileGrid,
    MAX_MERCATOR_LAT, MAX_ZOOM,
};
