//! Maps API (Windshaft) integration: payload generation, transport, request
//! deduplication, instance snapshots and model updates.

pub mod client;
pub mod config;
pub mod error;
pub mod instance;
pub mod map;
pub mod request;
pub mod strategy;
pub mod tracker;
pub mod transport;
pub mod updater;

pub use client::WindshaftClient;
pub use config::MapConfigGenerator;
pub use error::WindshaftError;
pub use instance::{MapInstance, TileUrls};
pub use map::{WindshaftEvent, WindshaftMap};
pub use request::{Request, RequestParams};
pub use strategy::{DefaultStrategy, PayloadCompressor, TransportChoice, TransportStrategy};
pub use tracker::RequestTracker;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use updater::{ModelTargets, ModelUpdater};
