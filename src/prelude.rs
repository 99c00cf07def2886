//! Prelude module for common mapsync types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapsync::prelude::*;`

pub use crate::core::{
    config::SyncConfig,
    geo::{LatLng, LatLngBounds},
    reload::{ReloadOptions, UrlChange},
    viewport::{BoundsDebouncer, MapViewport, Viewport},
};

pub use crate::analysis::{
    AnalysisEvent, AnalysisGraph, AnalysisNode, AnalysisReference, AnalysisSchema,
    AnalysisStatus, StaticReference,
};

pub use crate::layers::{
    layer::{Layer, LayerKind},
    manager::LayerCollection,
    provider::DataProvider,
};

pub use crate::filters::{
    bounding_box::BoundingBoxFilter, category::CategoryFilter, range::RangeFilter, Filter,
};

pub use crate::dataviews::{
    factory::{DataviewAttributes, DataviewsFactory},
    model::{DataviewEvent, DataviewModel, DataviewState, FetchDecision},
    DataviewKind,
};

pub use crate::windshaft::{
    client::WindshaftClient,
    instance::{MapInstance, TileUrls},
    map::WindshaftMap,
    transport::{HttpRequest, HttpResponse, Transport, TransportError},
};

pub use crate::dashboard::Dashboard;
pub use crate::events::EventManager;

pub use crate::{Error as MapError, Result};

pub use std::{sync::Arc, time::Duration};

pub use instant::Instant;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

#[cfg(feature = "tokio-runtime")]
pub use futures::Future;
