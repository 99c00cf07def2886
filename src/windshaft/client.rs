//! Maps API client: sends instantiation payloads and normalizes the answers.

use std::sync::Arc;

use serde_json::Value;

use crate::core::config::SyncConfig;
use crate::core::constants::JSONP_CALLBACK_PREFIX;
use crate::windshaft::error::WindshaftError;
use crate::windshaft::request::RequestParams;
use crate::windshaft::strategy::{
    DefaultStrategy, PayloadCompressor, TransportChoice, TransportStrategy,
};
use crate::windshaft::transport::{HttpRequest, Transport, TransportError};
use crate::{MapError, Result};

#[cfg(feature = "debug")]
use log;

/// Deterministic JSONP callback name, so repeated identical GETs hit the
/// HTTP cache.
pub fn jsonp_callback_name(payload: &str) -> String {
    format!("{}{}", JSONP_CALLBACK_PREFIX, fxhash::hash64(payload))
}

/// Errors carried by a response body. Bodies that are not JSON yield no
/// errors, which callers report as "Unknown error".
fn errors_from_body(body: &str) -> Vec<WindshaftError> {
    serde_json::from_str::<Value>(body)
        .map(|value| WindshaftError::from_response(&value))
        .unwrap_or_default()
}

pub struct WindshaftClient {
    host: String,
    endpoint: String,
    strategy: Box<dyn TransportStrategy>,
    compressor: PayloadCompressor,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for WindshaftClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindshaftClient")
            .field("host", &self.host)
            .field("endpoint", &self.endpoint)
            .field("compressor", &self.compressor)
            .finish()
    }
}

impl WindshaftClient {
    pub fn new(config: &SyncConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            host: config.host(),
            endpoint: config.endpoint.clone(),
            strategy: Box::new(DefaultStrategy::from_config(config)),
            compressor: PayloadCompressor::default(),
            transport,
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn TransportStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `{host}/{endpoint}?stat_tag=..&<params>&<data>`
    fn url(&self, params: &RequestParams, data: Option<String>) -> String {
        let mut query = params.to_query();
        query.extend(data);
        format!("{}/{}?{}", self.host, self.endpoint, query.join("&"))
    }

    /// Build the HTTP request for `payload` according to the strategy.
    pub fn build_request(&self, payload: &str, params: &RequestParams) -> Result<HttpRequest> {
        let request = match self.strategy.choose(payload) {
            TransportChoice::Post => HttpRequest::post(self.url(params, None), payload),
            TransportChoice::Get => {
                let data = format!("config={}", urlencoding::encode(payload));
                HttpRequest::get(self.url(params, Some(data)))
                    .with_jsonp_callback(jsonp_callback_name(payload))
            }
            TransportChoice::CompressedGet => {
                let encoded = self.compressor.compress(payload)?;
                let data = format!("lzma={}", urlencoding::encode(&encoded));
                HttpRequest::get(self.url(params, Some(data)))
                    .with_jsonp_callback(jsonp_callback_name(payload))
            }
        };
        Ok(request)
    }

    /// Instantiate a map. Backend errors, including error bodies of
    /// successful responses, come back as [`MapError::Windshaft`].
    pub async fn instantiate_map(&self, payload: &str, params: &RequestParams) -> Result<Value> {
        let request = self.build_request(payload, params)?;

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(TransportError::Aborted) => {
                return Err(MapError::Transport {
                    status: 0,
                    message: TransportError::Aborted.to_string(),
                })
            }
            Err(TransportError::Failed { status, body }) => {
                #[cfg(feature = "debug")]
                log::error!("map instantiation failed ({}): {}", status, body);

                let errors = errors_from_body(&body);
                if errors.is_empty() && status == 0 {
                    return Err(MapError::Transport {
                        status,
                        message: body,
                    });
                }
                return Err(MapError::Windshaft(errors));
            }
        };

        if !response.is_success() {
            return Err(MapError::Windshaft(errors_from_body(&response.body)));
        }

        let body: Value = match serde_json::from_str(&response.body) {
            Ok(body) => body,
            Err(_) => return Err(MapError::Windshaft(Vec::new())),
        };
        let errors = WindshaftError::from_response(&body);
        if !errors.is_empty() {
            return Err(MapError::Windshaft(errors));
        }
        Ok(body)
    }
}
