use std::time::Duration;

use instant::Instant;
use serde::{Deserialize, Serialize};

use crate::core::geo::{LatLng, LatLngBounds};

/// Collaborator reporting the current map view.
///
/// Implemented by whatever owns the rendered map (a Leaflet/GMaps adapter, a
/// headless test viewport, ...).
pub trait MapViewport {
    /// Current bounds as `[[south, west], [north, east]]`.
    fn view_bounds(&self) -> LatLngBounds;
}

/// Plain viewport state: center, zoom and the bounds they cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    bounds: LatLngBounds,
}

impl Viewport {
    pub fn new(center: LatLng, zoom: f64, bounds: LatLngBounds) -> Self {
        Self {
            center,
            zoom,
            bounds,
        }
    }

    /// Update the view. Returns true when center or zoom changed, which is
    /// what dataviews listen to.
    pub fn set_view(&mut self, center: LatLng, zoom: f64, bounds: LatLngBounds) -> bool {
        let changed = self.center != center || self.zoom != zoom;
        self.center = center;
        self.zoom = zoom;
        self.bounds = bounds;
        changed
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::default(), 0.0, LatLngBounds::default())
    }
}

impl MapViewport for Viewport {
    fn view_bounds(&self) -> LatLngBounds {
        self.bounds.clone()
    }
}

/// Trailing-edge debounce for viewport changes.
///
/// Only the state after changes stop for `wait` is reported; every `notify`
/// restarts the window.
#[derive(Debug, Clone)]
pub struct BoundsDebouncer {
    wait: Duration,
    last_change: Option<Instant>,
}

impl BoundsDebouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            last_change: None,
        }
    }

    pub fn notify(&mut self, now: Instant) {
        self.last_change = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_change.is_some()
    }

    /// Time left before a pending change settles.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.last_change.map(|last| {
            let elapsed = now.saturating_duration_since(last);
            self.wait.saturating_sub(elapsed)
        })
    }

    /// Returns true exactly once per settled burst of changes.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.last_change {
            Some(last) if now.saturating_duration_since(last) >= self.wait => {
                self.last_change = None;
                true
            }
            _ => false,
        }
    }
}
