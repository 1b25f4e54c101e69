//! StoryMaps Cache Storage
//!
//! Versioned request/response caching for the offline app shell.

mod net;
mod store;

pub use net::{HttpNetwork, Network, StaticNetwork};
pub use store::{CacheStore, NamedCache, PopulationReport};

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }

    /// Only GET requests are cacheable.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Method::Get)
    }
}

/// Request mode, mirroring how the request was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Full-page load; eligible for the offline fallback page
    Navigate,
    SameOrigin,
    Cors,
    NoCors,
}

/// A request as seen by the fetch interceptor
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    pub mode: RequestMode,
}

impl Request {
    /// Plain GET sub-resource request
    pub fn get(url: &str) -> Self {
        Self {
            method: Method::Get,
            url: url.to_string(),
            mode: RequestMode::NoCors,
        }
    }

    /// GET request in navigation mode (a full-page load)
    pub fn navigate(url: &str) -> Self {
        Self {
            method: Method::Get,
            url: url.to_string(),
            mode: RequestMode::Navigate,
        }
    }

    /// Whether the request targets an http(s) URL at all
    pub fn is_http(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// Exact-match cache key: method plus absolute URL
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method.as_str(), self.url)
    }
}

/// Response type relative to the requesting origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Same-origin response with readable body
    Basic,
    /// Cross-origin response obtained with CORS
    Cors,
    /// Cross-origin no-cors response; body and status are inscrutable
    Opaque,
}

/// A response snapshot as held in the cache
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub kind: ResponseKind,
}

impl Response {
    /// Same-origin response with the given status and body
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
            kind: ResponseKind::Basic,
        }
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Get header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the fetch interceptor may write this response back to the
    /// cache: exactly status 200 and a readable same-origin body. Opaque
    /// bodies and error pages must never poison the cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }
}

/// Cache storage error
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP error: {status}")]
    Http { status: u16 },

    #[error("not cacheable: {0}")]
    NotCacheable(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_includes_method() {
        let get = Request::get("https://app.test/a.js");
        let mut head = Request::get("https://app.test/a.js");
        head.method = Method::Head;
        assert_ne!(get.cache_key(), head.cache_key());
    }

    #[test]
    fn non_http_schemes_detected() {
        let req = Request::get("chrome-extension://abc/page");
        assert!(!req.is_http());
        assert!(Request::get("https://app.test/").is_http());
    }

    #[test]
    fn cacheability_rules() {
        assert!(Response::new(200, Vec::new()).is_cacheable());
        assert!(!Response::new(404, Vec::new()).is_cacheable());
        assert!(!Response::new(200, Vec::new())
            .with_kind(ResponseKind::Opaque)
            .is_cacheable());
    }

    #[test]
    fn header_lookup_case_insensitive() {
        let resp = Response::new(200, Vec::new()).with_header("Content-Type", "text/html");
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("etag"), None);
    }
}
