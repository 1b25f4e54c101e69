//! Worker configuration
//!
//! Built once from the worker script's own URL and passed explicitly to
//! every component; nothing reads it as an ambient global.

use url::Url;

use crate::WorkerError;

/// Third-party assets cached alongside the app shell. These CDN hosts
/// are less reliable than same-origin assets; population treats each
/// independently so one of them failing never blocks the shell.
pub const THIRD_PARTY_ASSETS: [&str; 4] = [
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
    "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css",
    "https://cdn.jsdelivr.net/npm/sweetalert2@11/dist/sweetalert2.min.js",
];

/// Configuration snapshot for one worker build
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Absolute URL of the worker script
    pub location: String,
    /// scheme://host[:port]
    pub origin: String,
    /// Sub-path prefix for project-pages style hosting ("" or "/app")
    pub base_path: String,
    /// Versioned cache name; doubles as the build's version string
    pub cache_name: String,
}

impl WorkerConfig {
    /// Derive the configuration from the worker script URL.
    pub fn from_location(location: &str) -> Result<Self, WorkerError> {
        let url =
            Url::parse(location).map_err(|e| WorkerError::InvalidLocation(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WorkerError::InvalidLocation(location.to_string()));
        }

        let origin = url.origin().ascii_serialization();
        let base_path = detect_base_path(url.path());
        let config = Self {
            location: location.to_string(),
            origin,
            base_path,
            cache_name: format!("storymaps-v{}", env!("CARGO_PKG_VERSION")),
        };
        log::debug!(
            "Worker config: base_path={:?} cache_name={} origin={}",
            config.base_path,
            config.cache_name,
            config.origin
        );
        Ok(config)
    }

    /// The current cache version string
    pub fn version(&self) -> &str {
        &self.cache_name
    }

    /// App root path, base-path qualified ("/" or "/app/")
    pub fn app_root(&self) -> String {
        format!("{}/", self.base_path)
    }

    /// Default notification icon path
    pub fn icon_path(&self) -> String {
        format!("{}/icon-192.png", self.base_path)
    }

    /// Absolutize a path against this origin; URLs pass through.
    pub fn absolutize(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.origin, path)
        }
    }

    /// App-shell manifest cached on install: entry page, index,
    /// manifest, and the enumerated third-party assets.
    pub fn app_shell(&self) -> Vec<String> {
        let mut urls = vec![
            self.absolutize(&self.app_root()),
            self.absolutize(&format!("{}/index.html", self.base_path)),
            self.absolutize(&format!("{}/manifest.json", self.base_path)),
        ];
        urls.extend(THIRD_PARTY_ASSETS.iter().map(|u| u.to_string()));
        urls
    }

    /// Offline fallback candidates for failed navigations, tried in
    /// order: base-path index, root index, index relative to the script
    /// directory.
    pub fn fallback_candidates(&self) -> Vec<String> {
        let mut candidates = vec![
            self.absolutize(&format!("{}/index.html", self.base_path)),
            self.absolutize("/index.html"),
        ];
        if let Ok(url) = Url::parse(&self.location) {
            if let Ok(relative) = url.join("index.html") {
                candidates.push(relative.to_string());
            }
        }
        candidates.dedup();
        candidates
    }
}

/// First path segment is the base path, unless it is the worker script
/// itself (root deployment).
fn detect_base_path(pathname: &str) -> String {
    let script_name = pathname.rsplit('/').next().unwrap_or_default();
    let parts: Vec<&str> = pathname.split('/').collect();
    if parts.len() > 1 && !parts[1].is_empty() && parts[1] != script_name {
        format!("/{}", parts[1])
    } else {
        String::new()
    }
}
