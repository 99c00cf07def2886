use std::collections::VecDeque;
use std::time::Duration;

use instant::Instant;

use crate::windshaft::request::Request;

#[derive(Debug, Clone)]
struct TrackedRequest {
    request: Request,
    at: Instant,
}

/// Remembers the last `limit` completed instantiation requests.
///
/// A request is refused once the whole ring holds that same request: the
/// same payload was sent `limit` times in a row, which only happens when
/// something keeps triggering reloads without changing the map.
#[derive(Debug, Clone)]
pub struct RequestTracker {
    limit: usize,
    window: Option<Duration>,
    requests: VecDeque<TrackedRequest>,
}

impl RequestTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            window: None,
            requests: VecDeque::with_capacity(limit),
        }
    }

    /// Entries older than `window` no longer count as repetitions.
    pub fn with_window(mut self, window: Option<Duration>) -> Self {
        self.window = window;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn can_request_be_performed(&self, request: &Request, now: Instant) -> bool {
        let recent: Vec<&Request> = self
            .requests
            .iter()
            .filter(|tracked| match self.window {
                Some(window) => now.saturating_duration_since(tracked.at) <= window,
                None => true,
            })
            .map(|tracked| &tracked.request)
            .collect();

        !(recent.len() >= self.limit && recent.iter().all(|tracked| *tracked == request))
    }

    /// Record a request once it completed, successfully or not.
    pub fn track(&mut self, request: Request, now: Instant) {
        if self.limit == 0 {
            return;
        }
        if self.requests.len() == self.limit {
            self.requests.pop_front();
        }
        self.requests.push_back(TrackedRequest { request, at: now });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}
