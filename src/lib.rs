//! # mapsync
//!
//! Keeps a dashboard's layers, dataviews and analysis graph synchronized with
//! a Windshaft-style tile/analysis backend.
//!
//! The crate builds the map-configuration payload for the backend, decides when
//! that payload has to be resent and when a dataview can simply be re-fetched,
//! deduplicates identical instantiation requests, propagates analysis status
//! through the dependency graph and derives CDN-aware tile/grid URL sets from the
//! backend response. Rendering is left to whatever view layer consumes it.

pub mod analysis;
pub mod core;
pub mod dashboard;
pub mod dataviews;
pub mod events;
pub mod filters;
pub mod layers;
pub mod prelude;
pub mod windshaft;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::SyncConfig,
    geo::{LatLng, LatLngBounds},
    viewport::{MapViewport, Viewport},
};

pub use analysis::{
    graph::AnalysisGraph,
    node::{AnalysisNode, AnalysisStatus},
    reference::{AnalysisReference, StaticReference},
};

pub use dataviews::{
    factory::DataviewsFactory,
    model::{DataviewEvent, DataviewModel, FetchDecision},
};

pub use filters::Filter;

pub use layers::{layer::Layer, manager::LayerCollection, provider::DataProvider};

pub use windshaft::{
    client::WindshaftClient,
    instance::{MapInstance, TileUrls},
    map::WindshaftMap,
    transport::{HttpRequest, HttpResponse, Transport, TransportError},
};

pub use dashboard::Dashboard;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0} is required")]
    MissingAttribute(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown param '{param}' for analysis of type '{analysis_type}'")]
    UnknownParam {
        analysis_type: String,
        param: String,
    },

    #[error("Analysis type '{0}' is not supported")]
    UnknownAnalysisType(String),

    #[error("Transport error ({status}): {message}")]
    Transport { status: u16, message: String },

    #[error("Maps API Error -> {}", first_windshaft_message(.0))]
    Windshaft(Vec<windshaft::error::WindshaftError>),

    #[error("Maximum number of subsequent equal requests to the Maps API reached ({limit})")]
    MaxInstantiationRetries { limit: usize },

    #[error("Not found: {0}")]
    NotFound(String),
}

fn first_windshaft_message(errors: &[windshaft::error::WindshaftError]) -> String {
    errors
        .first()
        .map(|error| error.to_string())
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// Error type alias for convenience
pub type Error = MapError;
