use engine_logging::{engine_debug, engine_warn};
use futures_util::{stream, StreamExt};
use parcel_core::{dedupe_by_object_id, tile_local_to_lon_lat, EntityRecord, TileCoordinate, TileGrid};

use crate::decode::decode_tile;
use crate::fetch::TileSource;
use crate::{HarvestEvent, ProgressSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFailure {
    pub tile: TileCoordinate,
    pub reason: String,
}

/// Entities found across a tile grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityCollection {
    /// Deduplicated by object id, in grid order.
    pub records: Vec<EntityRecord>,
    pub failures: Vec<TileFailure>,
    pub tiles_scanned: usize,
    pub features_seen: usize,
}

/// Fetch and decode every tile of `grid`; a tile that cannot be fetched or
/// decoded contributes no features and is listed in `failures`.
pub async fn collect_entities(
    source: &dyn TileSource,
    grid: &TileGrid,
    extent: u32,
    concurrency: usize,
    progress: &dyn ProgressSink,
) -> EntityCollection {
    let mut per_tile: Vec<(usize, TileCoordinate, Result<Vec<EntityRecord>, String>)> =
        stream::iter(grid.iter().enumerate())
            .map(|(index, tile)| async move {
                (index, tile, scan_tile(source, tile, extent).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
    // Completion order varies; dedupe must not.
    per_tile.sort_by_key(|(index, _, _)| *index);

    let mut collection = EntityCollection {
        tiles_scanned: per_tile.len(),
        ..EntityCollection::default()
    };
    let mut found = Vec::new();
    for (_, tile, result) in per_tile {
        match result {
            Ok(records) => {
                engine_debug!("tile {:?}: {} features", tile, records.len());
                progress.emit(HarvestEvent::TileDecoded {
                    tile,
                    features: records.len(),
                });
                collection.features_seen += records.len();
                found.extend(records);
            }
            Err(reason) => {
                engine_warn!("tile {}/{}/{} skipped: {}", tile.zoom, tile.x, tile.y, reason);
                progress.emit(HarvestEvent::TileFailed {
                    tile,
                    reason: reason.clone(),
                });
                collection.failures.push(TileFailure { tile, reason });
            }
        }
    }
    collection.records = dedupe_by_object_id(found);
    collection
}

async fn scan_tile(
    source: &dyn TileSource,
    tile: TileCoordinate,
    extent: u32,
) -> Result<Vec<EntityRecord>, String> {
    let payload = source.fetch_tile(tile).await.map_err(|err| err.to_string())?;
    let features = decode_tile(&payload, extent).map_err(|err| err.to_string())?;

    Ok(features
        .iter()
        .filter_map(|feature| {
            let (px, py) = feature.centroid()?;
            let point = tile_local_to_lon_lat(px, py, tile, extent);
            EntityRecord::from_raw(
                feature.entity_id(),
                feature.object_id()?,
                Some(point.lon),
                Some(point.lat),
            )
        })
        .collect())
}
