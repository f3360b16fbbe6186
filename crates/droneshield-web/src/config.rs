//! Viewer configuration from the page URL

use bevy::prelude::*;
use droneshield_core::EntityKey;
use droneshield_scene::{CameraConfig, CameraMode};

/// Port the simulation service listens on
pub const DEFAULT_FEED_PORT: u16 = 8000;

/// Path of the world-state websocket
pub const FEED_PATH: &str = "/ws/gamestate";

/// Resource storing where the feed lives and how the camera starts
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// WebSocket URL (e.g., "ws://192.168.1.100:8000/ws/gamestate")
    pub feed_url: String,
    pub camera: CameraConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            feed_url: Self::feed_url_for(&format!("localhost:{}", DEFAULT_FEED_PORT), false),
            camera: CameraConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Create config from URL query parameters or same-origin fallback
    #[cfg(target_arch = "wasm32")]
    pub fn from_browser() -> Self {
        let Some(window) = web_sys::window() else {
            tracing::warn!("No browser window; using default viewer config");
            return Self::default();
        };
        let location = window.location();
        let search = location.search().unwrap_or_default();
        let hostname = location
            .hostname()
            .unwrap_or_else(|_| "localhost".to_string());
        let secure = location.protocol().unwrap_or_default() == "https:";

        Self::from_query(&search, &hostname, secure)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_browser() -> Self {
        Self::default()
    }

    /// Build a config from a `?feed=..&camera=..&target=..` query string.
    ///
    /// Without `feed`, the service is assumed on `hostname` at the default
    /// port. Unparseable values are logged and replaced by defaults.
    pub fn from_query(search: &str, hostname: &str, secure: bool) -> Self {
        let hostname = if hostname.is_empty() { "localhost" } else { hostname };
        let feed_url = match parse_query_param(search, "feed") {
            Some(feed) => {
                tracing::info!("Using feed from URL parameter: {}", feed);
                Self::feed_url_for(&feed, secure)
            }
            None => Self::feed_url_for(&format!("{}:{}", hostname, DEFAULT_FEED_PORT), secure),
        };

        let mut camera = CameraConfig::default();
        if let Some(mode) = parse_query_param(search, "camera") {
            match mode.parse::<CameraMode>() {
                Ok(mode) => camera.mode = mode,
                Err(e) => tracing::warn!("{}; using {}", e, camera.mode.label()),
            }
        }
        if let Some(target) = parse_query_param(search, "target") {
            match target.parse::<EntityKey>() {
                Ok(target) => camera.target = target,
                Err(e) => tracing::warn!("Bad target parameter: {}; using {}", e, camera.target),
            }
        }

        Self { feed_url, camera }
    }

    /// Websocket URL for a feed address.
    ///
    /// `ws://`/`wss://` URLs are used as given; `http(s)://` URLs and bare
    /// `host:port` addresses get the matching ws scheme and the feed path.
    pub fn feed_url_for(address: &str, secure: bool) -> String {
        let address = address.trim().trim_end_matches('/');
        if address.starts_with("ws://") || address.starts_with("wss://") {
            return address.to_string();
        }

        let (scheme, rest) = if let Some(rest) = address.strip_prefix("https://") {
            ("wss", rest)
        } else if let Some(rest) = address.strip_prefix("http://") {
            ("ws", rest)
        } else if secure {
            ("wss", address)
        } else {
            ("ws", address)
        };

        if rest.contains('/') {
            format!("{}://{}", scheme, rest)
        } else {
            format!("{}://{}{}", scheme, rest, FEED_PATH)
        }
    }
}

/// Parse a query parameter from a search string
fn parse_query_param(search: &str, param: &str) -> Option<String> {
    let search = search.trim_start_matches('?');
    for pair in search.split('&') {
        let mut parts = pair.splitn(2, '=');
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if key == param && !value.is_empty() {
                return Some(
                    value
                        .replace("%3A", ":")
                        .replace("%3a", ":")
                        .replace("%2F", "/")
                        .replace("%2f", "/"),
                );
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_same_host() {
        let config = ViewerConfig::from_query("", "sim.local", false);
        assert_eq!(config.feed_url, "ws://sim.local:8000/ws/gamestate");
        assert_eq!(config.camera, CameraConfig::default());

        let secure = ViewerConfig::from_query("?", "sim.local", true);
        assert_eq!(secure.feed_url, "wss://sim.local:8000/ws/gamestate");

        assert_eq!(ViewerConfig::default().feed_url, "ws://localhost:8000/ws/gamestate");
    }

    #[test]
    fn test_query_overrides() {
        let config = ViewerConfig::from_query(
            "?feed=10.0.0.5%3A9000&camera=drone&target=defender:2",
            "localhost",
            false,
        );
        assert_eq!(config.feed_url, "ws://10.0.0.5:9000/ws/gamestate");
        assert_eq!(config.camera.mode, CameraMode::LockedFollow);
        assert_eq!(config.camera.target, EntityKey::defender(2));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = ViewerConfig::from_query("?camera=sideways&target=tank:1", "localhost", false);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_feed_url_forms() {
        assert_eq!(
            ViewerConfig::feed_url_for("wss://example.com/custom", false),
            "wss://example.com/custom"
        );
        assert_eq!(
            ViewerConfig::feed_url_for("https://example.com", false),
            "wss://example.com/ws/gamestate"
        );
        assert_eq!(
            ViewerConfig::feed_url_for("http://example.com:8000/", false),
            "ws://example.com:8000/ws/gamestate"
        );
        assert_eq!(
            ViewerConfig::feed_url_for("example.com:8000", true),
            "wss://example.com:8000/ws/gamestate"
        );
    }

    #[test]
    fn test_parse_query_param() {
        assert_eq!(parse_query_param("?a=1&b=2", "b"), Some("2".to_string()));
        assert_eq!(parse_query_param("?a=&b=2", "a"), None);
        assert_eq!(parse_query_param("", "a"), None);
    }
}
