//! Network side of dataview fetching.
//!
//! Models hand out [`FetchRequest`] tickets; these helpers resolve them
//! through a [`Transport`] and give the raw result back so the model can
//! apply it with `finish_fetch`.

use futures::future::join_all;
use serde_json::Value;

use crate::dataviews::model::FetchRequest;
use crate::windshaft::transport::{HttpRequest, Transport, TransportError};

#[cfg(feature = "debug")]
use log;

/// GET the dataview url. Non-2xx statuses and bodies that are not JSON are
/// reported as `Failed` with the body kept for error parsing.
pub async fn fetch_dataview(
    transport: &dyn Transport,
    request: &FetchRequest,
) -> Result<Value, TransportError> {
    #[cfg(feature = "debug")]
    log::debug!("fetching dataview {} (#{})", request.dataview_id, request.seq);

    let response = transport.send(HttpRequest::get(request.url.clone())).await?;
    if !response.is_success() {
        return Err(TransportError::Failed {
            status: response.status,
            body: response.body,
        });
    }

    match serde_json::from_str(&response.body) {
        Ok(value) => Ok(value),
        Err(_) => Err(TransportError::Failed {
            status: response.status,
            body: response.body,
        }),
    }
}

/// Resolve several tickets concurrently, preserving their order.
pub async fn fetch_all(
    transport: &dyn Transport,
    requests: Vec<FetchRequest>,
) -> Vec<(FetchRequest, Result<Value, TransportError>)> {
    let results = join_all(
        requests
            .iter()
            .map(|request| fetch_dataview(transport, request)),
    )
    .await;
    requests.into_iter().zip(results).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windshaft::transport::HttpResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct EchoTransport {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.url.clone());
            if request.url.contains("broken") {
                return Ok(HttpResponse::new(500, r#"{"errors":["boom"]}"#));
            }
            if request.url.contains("html") {
                return Ok(HttpResponse::ok("<html>"));
            }
            if request.url.contains("abort") {
                return Err(TransportError::Aborted);
            }
            Ok(HttpResponse::ok(json!({ "url": request.url }).to_string()))
        }
    }

    fn ticket(url: &str, seq: u64) -> FetchRequest {
        FetchRequest {
            dataview_id: "dv".to_string(),
            seq,
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_dataview_outcomes() {
        let transport = EchoTransport {
            seen: Mutex::new(Vec::new()),
        };

        let ok = fetch_dataview(&transport, &ticket("http://dv/ok", 1)).await;
        assert_eq!(ok, Ok(json!({ "url": "http://dv/ok" })));

        let failed = fetch_dataview(&transport, &ticket("http://dv/broken", 2)).await;
        assert_eq!(
            failed,
            Err(TransportError::Failed {
                status: 500,
                body: r#"{"errors":["boom"]}"#.to_string()
            })
        );

        let not_json = fetch_dataview(&transport, &ticket("http://dv/html", 3)).await;
        assert!(matches!(not_json, Err(TransportError::Failed { status: 200, .. })));

        let aborted = fetch_dataview(&transport, &ticket("http://dv/abort", 4)).await;
        assert!(aborted.unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_order() {
        let transport = EchoTransport {
            seen: Mutex::new(Vec::new()),
        };
        let results = fetch_all(
            &transport,
            vec![ticket("http://dv/a", 1), ticket("http://dv/b", 2)],
        )
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.seq, 1);
        assert_eq!(results[1].1, Ok(json!({ "url": "http://dv/b" })));
        assert_eq!(transport.seen.lock().unwrap().len(), 2);
    }
}
