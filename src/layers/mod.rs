//! Layer models consumed by the synchronization engine.

pub mod layer;
pub mod manager;
pub mod provider;

pub use layer::{Layer, LayerKind};
pub use manager::LayerCollection;
pub use provider::DataProvider;
