//! Conversion between geographic coordinates and tile-local positions.
//!
//! Tile-local positions use a y-up space: `py = 0` is the southern edge of
//! the tile and `py = extent` the northern edge. Vector-tile geometry is
//! flipped into this space at decode time.
use std::f64::consts::PI;

use crate::tile::{clamp_index, lat_to_tile_y_frac, lon_to_tile_x_frac, tiles_per_axis};
use crate::TileCoordinate;

/// Default vector-tile extent.
pub const DEFAULT_EXTENT: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// A position inside one tile, in y-up local units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLocalPoint {
    pub tile: TileCoordinate,
    pub px: f64,
    pub py: f64,
}

/// Project a geographic point into the tile that contains it at `zoom`.
pub fn forward_tile_projection(lon: f64, lat: f64, zoom: u8, extent: u32) -> TileLocalPoint {
    let extent = f64::from(extent);
    let x_frac = lon_to_tile_x_frac(lon, zoom);
    let y_frac = lat_to_tile_y_frac(lat, zoom);
    let x = clamp_index(x_frac, zoom);
    let y = clamp_index(y_frac, zoom);

    TileLocalPoint {
        tile: TileCoordinate::new(zoom, x, y),
        px: (x_frac - f64::from(x)) * extent,
        py: extent - (y_frac - f64::from(y)) * extent,
    }
}

/// Inverse of [`forward_tile_projection`].
pub fn tile_local_to_lon_lat(px: f64, py: f64, tile: TileCoordinate, extent: u32) -> GeoPoint {
    let extent = f64::from(extent);
    let n = tiles_per_axis(tile.zoom);

    let fx = px / extent;
    // Local space is y-up, tile rows grow southwards.
    let fy = (extent - py) / extent;
    let x_frac = f64::from(tile.x) + fx;
    let y_frac = f64::from(tile.y) + fy;

    let lon = x_frac / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y_frac / n)).sinh().atan().to_degrees();
    GeoPoint { lon, lat }
}

impl TileLocalPoint {
    pub fn to_geo(&self, extent: u32) -> GeoPoint {
        tile_local_to_lon_lat(self.px, self.py, self.tile, extent)
    }
}
