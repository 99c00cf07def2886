//! HTTP transport abstraction
//!
//! The engine never talks to the network directly: every request goes through
//! a [`Transport`]. [`ReqwestTransport`] is the default implementation; tests
//! plug in scripted ones.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;

#[cfg(feature = "debug")]
use log;

/// Shared async HTTP client. Building it once keeps TLS and connection pool
/// setup out of the request path.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("mapsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// JSON body for POST requests
    pub body: Option<String>,
    /// Callback name when the response is wrapped as JSONP
    pub jsonp_callback: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
            jsonp_callback: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body.into()),
            jsonp_callback: None,
        }
    }

    pub fn with_jsonp_callback(mut self, callback: impl Into<String>) -> Self {
        self.jsonp_callback = Some(callback.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below the HTTP response level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request was cancelled by the client; never reported as an error
    #[error("request aborted")]
    Aborted,
    #[error("request failed ({status}): {body}")]
    Failed { status: u16, body: String },
}

impl TransportError {
    pub fn is_abort(&self) -> bool {
        matches!(self, TransportError::Aborted)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request. Any HTTP response, successful or not, is `Ok`.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Strip a `callback(...)` JSONP wrapper, if present.
pub fn unwrap_jsonp<'a>(body: &'a str, callback: &str) -> &'a str {
    let trimmed = body.trim();
    trimmed
        .strip_prefix(callback)
        .and_then(|rest| rest.trim_start().strip_prefix('('))
        .and_then(|rest| {
            let rest = rest.trim_end();
            let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
            rest.strip_suffix(')')
        })
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// [`Transport`] backed by the shared reqwest client
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        #[cfg(feature = "debug")]
        log::debug!("{:?} {}", request.method, request.url);

        let builder = match request.method {
            HttpMethod::Get => HTTP_CLIENT.get(&request.url),
            HttpMethod::Post => HTTP_CLIENT
                .post(&request.url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(request.body.clone().unwrap_or_default()),
        };

        let response = builder.send().await.map_err(|err| TransportError::Failed {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            body: err.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| TransportError::Failed {
            status,
            body: err.to_string(),
        })?;

        let body = match &request.jsonp_callback {
            Some(callback) => unwrap_jsonp(&body, callback).to_string(),
            None => body,
        };
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_jsonp() {
        assert_eq!(unwrap_jsonp(r#"_cdbc_1({"a": 1});"#, "_cdbc_1"), r#"{"a": 1}"#);
        assert_eq!(unwrap_jsonp(r#" _cdbc_1 ( {"a": 1} ) "#, "_cdbc_1"), r#"{"a": 1}"#);
        assert_eq!(unwrap_jsonp(r#"{"a": 1}"#, "_cdbc_1"), r#"{"a": 1}"#);
    }

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::ok("{}").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }
}
