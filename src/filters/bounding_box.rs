use crate::core::geo::LatLngBounds;

/// Viewport filter sent as the `bbox` query param.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBoxFilter {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBoxFilter {
    /// Latitudes are clamped to the valid range; a view spanning the whole
    /// globe or more collapses to `[-180, 180]`.
    pub fn new(bounds: &LatLngBounds) -> Self {
        let (mut west, mut east) = (bounds.west(), bounds.east());
        if east - west >= 360.0 {
            west = -180.0;
            east = 180.0;
        }
        Self {
            west,
            south: bounds.south().clamp(-90.0, 90.0),
            east,
            north: bounds.north().clamp(-90.0, 90.0),
        }
    }
}

impl std::fmt::Display for BoundingBoxFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}
