//! Dev server proxy routes
//!
//! During development, requests whose path starts with a configured prefix
//! are forwarded to a local backend with the path unchanged. Not used by
//! production builds.

use crate::config::DevConfig;
use crate::error::{AssetCacheError, AssetCacheResult};
use url::Url;

/// One prefix to backend mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub prefix: String,
    pub target: Url,
}

/// Ordered route table; longer prefixes are tried first
#[derive(Debug, Clone, Default)]
pub struct ProxyRoutes {
    routes: Vec<ProxyRoute>,
}

impl ProxyRoutes {
    pub fn from_config(config: &DevConfig) -> AssetCacheResult<Self> {
        let mut routes = config
            .proxy
            .iter()
            .map(|(prefix, target)| {
                let target = Url::parse(target).map_err(|e| AssetCacheError::InvalidUrl {
                    url: target.clone(),
                    reason: e.to_string(),
                })?;
                Ok(ProxyRoute {
                    prefix: prefix.clone(),
                    target,
                })
            })
            .collect::<AssetCacheResult<Vec<_>>>()?;

        // Stable: equal lengths keep the config's key order
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[ProxyRoute] {
        &self.routes
    }

    /// Route matching a request path, if any
    pub fn matching(&self, path: &str) -> Option<&ProxyRoute> {
        self.routes.iter().find(|r| path.starts_with(&r.prefix))
    }

    /// Backend URL a request path is forwarded to
    pub fn resolve(&self, path: &str) -> Option<String> {
        self.matching(path).map(|route| {
            format!(
                "{}{}",
                route.target.as_str().trim_end_matches('/'),
                path
            )
        })
    }
}
