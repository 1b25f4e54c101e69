//! Network boundary
//!
//! The cache never talks to the network directly; it goes through the
//! `Network` trait so fetch behavior is swappable in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{CacheError, Method, Request, Response, ResponseKind};

/// Performs requests against the real network. Implementations may
/// block; callers drive them through `smol::unblock`.
pub trait Network: Send + Sync {
    fn fetch(&self, request: &Request) -> Result<Response, CacheError>;
}

/// Production network backed by a blocking HTTP client.
pub struct HttpNetwork {
    client: reqwest::blocking::Client,
    /// Origin used to classify responses as same-origin (basic) or not
    origin: String,
}

impl HttpNetwork {
    pub fn new(origin: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    fn classify(&self, url: &str) -> ResponseKind {
        if url.starts_with(&self.origin) {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        }
    }
}

impl Network for HttpNetwork {
    fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Patch => reqwest::Method::PATCH,
        };

        log::debug!("Fetching from network: {}", request.url);
        let response = self
            .client
            .request(method, &request.url)
            .send()
            .map_err(|e| CacheError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| CacheError::Network(e.to_string()))?
            .to_vec();

        Ok(Response {
            status,
            headers,
            body,
            kind: self.classify(&request.url),
        })
    }
}

/// Canned-response network for tests and the demo. Counts requests so
/// cache-first behavior is observable.
#[derive(Default)]
pub struct StaticNetwork {
    responses: Mutex<HashMap<String, Result<Response, String>>>,
    requests: AtomicUsize,
}

impl StaticNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for GETs of `url`
    pub fn insert(&self, url: &str, response: Response) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(response));
    }

    /// Fail requests for `url` with a network error
    pub fn insert_error(&self, url: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(message.to_string()));
    }

    /// Remove a canned entry, simulating the host going offline
    pub fn remove(&self, url: &str) {
        self.responses.lock().unwrap().remove(url);
    }

    /// Number of requests that reached this network
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Network for StaticNetwork {
    fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().get(&request.url) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(CacheError::Network(message.clone())),
            None => Err(CacheError::Network(format!("unreachable: {}", request.url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_network_serves_canned_responses() {
        let network = StaticNetwork::new();
        network.insert("https://app.test/", Response::new(200, b"<html>".to_vec()));

        let response = network.fetch(&Request::get("https://app.test/")).unwrap();
        assert_eq!(response.body, b"<html>");
        assert_eq!(network.request_count(), 1);
    }

    #[test]
    fn static_network_fails_unknown_urls() {
        let network = StaticNetwork::new();
        let err = network.fetch(&Request::get("https://app.test/missing"));
        assert!(matches!(err, Err(CacheError::Network(_))));
    }

    #[test]
    fn static_network_counts_every_request() {
        let network = StaticNetwork::new();
        network.insert("https://app.test/a", Response::new(200, Vec::new()));
        let _ = network.fetch(&Request::get("https://app.test/a"));
        let _ = network.fetch(&Request::get("https://app.test/a"));
        let _ = network.fetch(&Request::get("https://app.test/b"));
        assert_eq!(network.request_count(), 3);
    }

    #[test]
    fn http_network_classifies_origins() {
        let network = HttpNetwork::new("https://app.test");
        assert_eq!(network.classify("https://app.test/page"), ResponseKind::Basic);
        assert_eq!(network.classify("https://cdn.test/lib.js"), ResponseKind::Cors);
    }
}
