use serde::{Deserialize, Serialize};

/// WGS84 coordinate, degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Viewport bounds. Longitudes are not normalized: a view wrapping the
/// antimeridian reports `west < -180` or `east > 180`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Creates bounds from the `[[south, west], [north, east]]` shape map
    /// viewports report.
    pub fn from_view_bounds(bounds: [[f64; 2]; 2]) -> Self {
        Self::from_coords(bounds[0][0], bounds[0][1], bounds[1][0], bounds[1][1])
    }

    pub fn to_view_bounds(&self) -> [[f64; 2]; 2] {
        [
            [self.south_west.lat, self.south_west.lng],
            [self.north_east.lat, self.north_east.lng],
        ]
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn west(&self) -> f64 {
        self.south_west.lng
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    pub fn east(&self) -> f64 {
        self.north_east.lng
    }
}

/// The whole world
impl Default for LatLngBounds {
    fn default() -> Self {
        Self::from_coords(-90.0, -180.0, 90.0, 180.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_bounds_shape() {
        let bounds = LatLngBounds::from_view_bounds([[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(bounds.south(), 1.0);
        assert_eq!(bounds.west(), 2.0);
        assert_eq!(bounds.north(), 3.0);
        assert_eq!(bounds.east(), 4.0);
        assert_eq!(bounds.to_view_bounds(), [[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_default_is_the_world() {
        let bounds = LatLngBounds::default();
        assert_eq!(bounds.to_view_bounds(), [[-90.0, -180.0], [90.0, 180.0]]);
        assert_eq!(LatLng::default(), LatLng::new(0.0, 0.0));
    }
}
