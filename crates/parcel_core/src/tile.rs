use std::f64::consts::PI;

/// Highest zoom level accepted by the grid enumerator.
pub const MAX_ZOOM: u8 = 30;

/// Latitude limit of the square Web-Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoordinate {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoordinate {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }
}

/// Geographic bounding box in degrees. Corners may be given in any order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("bounding box {edge} is not a finite number")]
    NonFinite { edge: &'static str },
    #[error("zoom {0} exceeds the maximum of {MAX_ZOOM}")]
    ZoomTooLarge(u8),
}

pub(crate) fn tiles_per_axis(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Fractional global tile x for a longitude.
pub(crate) fn lon_to_tile_x_frac(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * tiles_per_axis(zoom)
}

/// Fractional global tile y for a latitude, clamped to the Mercator range.
pub(crate) fn lat_to_tile_y_frac(lat: f64, zoom: u8) -> f64 {
    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let merc = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln();
    (1.0 - merc / PI) / 2.0 * tiles_per_axis(zoom)
}

pub(crate) fn clamp_index(frac: f64, zoom: u8) -> u32 {
    let max_index = tiles_per_axis(zoom) - 1.0;
    frac.floor().clamp(0.0, max_index) as u32
}

/// Tile column containing `lon` at `zoom`.
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> u32 {
    clamp_index(lon_to_tile_x_frac(lon, zoom), zoom)
}

/// Tile row containing `lat` at `zoom`. Rows grow southwards.
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> u32 {
    clamp_index(lat_to_tile_y_frac(lat, zoom), zoom)
}

/// Inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub zoom: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileGrid {
    /// Grid of every tile touched by `bbox` at `zoom`.
    ///
    /// Min/max are taken per axis, so a box with swapped corners yields the
    /// same grid as the well-ordered one.
    pub fn covering(bbox: &BoundingBox, zoom: u8) -> Result<Self, GridError> {
        if zoom > MAX_ZOOM {
            return Err(GridError::ZoomTooLarge(zoom));
        }
        for (edge, value) in [
            ("north", bbox.north),
            ("south", bbox.south),
            ("east", bbox.east),
            ("west", bbox.west),
        ] {
            if !value.is_finite() {
                return Err(GridError::NonFinite { edge });
            }
        }

        let x_a = lon_to_tile_x(bbox.west, zoom);
        let x_b = lon_to_tile_x(bbox.east, zoom);
        let y_a = lat_to_tile_y(bbox.north, zoom);
        let y_b = lat_to_tile_y(bbox.south, zoom);

        Ok(Self {
            zoom,
            x_min: x_a.min(x_b),
            x_max: x_a.max(x_b),
            y_min: y_a.min(y_b),
            y_max: y_a.max(y_b),
        })
    }

    pub fn width(&self) -> u64 {
        u64::from(self.x_max - self.x_min) + 1
    }

    pub fn height(&self) -> u64 {
        u64::from(self.y_max - self.y_min) + 1
    }

    /// Number of tiles in the grid; never zero.
    pub fn len(&self) -> u64 {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, tile: &TileCoordinate) -> bool {
        tile.zoom == self.zoom
            && (self.x_min..=self.x_max).contains(&tile.x)
            && (self.y_min..=self.y_max).contains(&tile.y)
    }

    /// Tiles in row-major order (north row first, west to east).
    pub fn iter(&self) -> impl Iterator<Item = TileCoordinate> + '_ {
        (self.y_min..=self.y_max).flat_map(move |y| {
            (self.x_min..=self.x_max).map(move |x| TileCoordinate::new(self.zoom, x, y))
        })
    }
}
