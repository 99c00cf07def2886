//! How an instantiation payload travels to the backend
//!
//! Small payloads go as a `config=` GET param (JSONP-cacheable), large ones
//! are POSTed or, when cross-origin POST is unavailable, LZMA-compressed into
//! an `lzma=` GET param.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use serde_json::json;

use crate::core::config::SyncConfig;
use crate::core::constants::COMPRESSION_CACHE_SIZE;
use crate::Result;

#[cfg(feature = "debug")]
use log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportChoice {
    Post,
    Get,
    CompressedGet,
}

pub trait TransportStrategy: Send + Sync {
    fn choose(&self, payload: &str) -> TransportChoice;
}

/// Size-threshold strategy of the Maps API clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultStrategy {
    pub cors_supported: bool,
    pub force_cors: bool,
    pub max_get_size: usize,
}

impl DefaultStrategy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            cors_supported: config.cors_supported,
            force_cors: config.force_cors,
            max_get_size: config.max_get_size,
        }
    }
}

impl TransportStrategy for DefaultStrategy {
    fn choose(&self, payload: &str) -> TransportChoice {
        let oversized = payload.len() >= self.max_get_size;
        let choice = if self.cors_supported && (self.force_cors || oversized) {
            TransportChoice::Post
        } else if oversized {
            TransportChoice::CompressedGet
        } else {
            TransportChoice::Get
        };

        #[cfg(feature = "debug")]
        log::debug!("{} byte payload sent as {:?}", payload.len(), choice);

        choice
    }
}

/// LZMA + hex encoder for `lzma=` params, with an LRU of recent payloads so
/// retried instantiations skip the compression.
#[derive(Debug)]
pub struct PayloadCompressor {
    cache: Mutex<LruCache<String, String>>,
}

impl PayloadCompressor {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Hex-encoded LZMA stream of `{"config": "<payload>"}`.
    pub fn compress(&self, payload: &str) -> Result<String> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(encoded) = cache.get(payload) {
                return Ok(encoded.clone());
            }
        }

        let wrapped = json!({ "config": payload }).to_string();
        let mut compressed = Vec::new();
        lzma_rs::lzma_compress(&mut wrapped.as_bytes(), &mut compressed)?;
        let encoded = hex::encode(compressed);

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(payload.to_string(), encoded.clone());
        }
        Ok(encoded)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().ok().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PayloadCompressor {
    fn default() -> Self {
        Self::new(COMPRESSION_CACHE_SIZE)
    }
}
