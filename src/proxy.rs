//! Proxy provider: decides whether a fetch goes direct or through a proxy.

use std::sync::atomic::{AtomicUsize, Ordering};

use seo_monitor_search::{ProxyEndpoint, Route};

use crate::config::ProxyConfig;

/// Source of proxy endpoints. Rotation policy belongs to the implementation.
pub trait ProxyProvider: Send + Sync {
    fn is_proxy_enabled(&self) -> bool;

    /// Next endpoint to use, `None` when no proxy is available.
    fn next_proxy(&self) -> Option<ProxyEndpoint>;

    /// Route for the next request.
    fn route(&self) -> Route {
        if !self.is_proxy_enabled() {
            return Route::Direct;
        }
        match self.next_proxy() {
            Some(endpoint) => Route::Proxy(endpoint),
            None => {
                tracing::warn!("proxy enabled but no endpoint available, fetching directly");
                Route::Direct
            }
        }
    }
}

/// Always fetch directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxy;

impl ProxyProvider for NoProxy {
    fn is_proxy_enabled(&self) -> bool {
        false
    }

    fn next_proxy(&self) -> Option<ProxyEndpoint> {
        None
    }
}

/// Round-robin over a fixed endpoint list.
#[derive(Debug)]
pub struct RotatingProxies {
    enabled: bool,
    endpoints: Vec<ProxyEndpoint>,
    cursor: AtomicUsize,
}

impl RotatingProxies {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self {
            enabled: !endpoints.is_empty(),
            endpoints,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        let endpoints = config
            .endpoints
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(ProxyEndpoint::new)
            .collect::<Vec<_>>();
        Self {
            enabled: config.enabled && !endpoints.is_empty(),
            endpoints,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl ProxyProvider for RotatingProxies {
    fn is_proxy_enabled(&self) -> bool {
        self.enabled
    }

    fn next_proxy(&self) -> Option<ProxyEndpoint> {
        if self.endpoints.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        self.endpoints.get(idx).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_proxy_routes_direct() {
        assert_eq!(NoProxy.route(), Route::Direct);
    }

    #[test]
    fn rotation_wraps_around() {
        let proxies = RotatingProxies::new(vec![
            ProxyEndpoint::new("http://10.0.0.1:3128"),
            ProxyEndpoint::new("http://10.0.0.2:3128"),
        ]);
        let picked: Vec<String> = (0..3)
            .filter_map(|_| proxies.next_proxy())
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(
            picked,
            vec![
                "http://10.0.0.1:3128",
                "http://10.0.0.2:3128",
                "http://10.0.0.1:3128"
            ]
        );
    }

    #[test]
    fn disabled_config_routes_direct() {
        let config = ProxyConfig {
            enabled: false,
            endpoints: vec!["http://10.0.0.1:3128".into()],
        };
        let proxies = RotatingProxies::from_config(&config);
        assert!(!proxies.is_proxy_enabled());
        assert_eq!(proxies.route(), Route::Direct);
    }

    #[test]
    fn enabled_without_endpoints_is_disabled() {
        let config = ProxyConfig {
            enabled: true,
            endpoints: vec!["  ".into()],
        };
        let proxies = RotatingProxies::from_config(&config);
        assert!(proxies.is_empty());
        assert!(!proxies.is_proxy_enabled());
    }

    #[test]
    fn enabled_config_routes_through_proxy() {
        let config = ProxyConfig {
            enabled: true,
            endpoints: vec!["http://10.0.0.9:8080".into()],
        };
        let proxies = RotatingProxies::from_config(&config);
        assert_eq!(proxies.len(), 1);
        assert!(proxies.route().is_proxied());
    }
}
