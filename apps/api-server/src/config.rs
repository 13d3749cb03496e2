//! Application configuration loaded from environment variables.

use std::env;

use nichofy_infra::{InMemoryStoreConfig, QueryCacheConfig};

/// Page size limits applied to list and live requests.
#[derive(Debug, Clone, Copy)]
pub struct PageConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PageConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_page_size = parse_var("MAX_PAGE_SIZE")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_page_size);
        let default_page_size = parse_var("DEFAULT_PAGE_SIZE")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.default_page_size)
            .min(max_page_size);

        Self {
            default_page_size,
            max_page_size,
        }
    }

    /// Requested size, defaulted and clamped to `1..=max_page_size`.
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cache: QueryCacheConfig,
    pub store: InMemoryStoreConfig,
    pub pages: PageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cache: QueryCacheConfig::default(),
            store: InMemoryStoreConfig::default(),
            pages: PageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT").unwrap_or(8080),
            cache: QueryCacheConfig::from_env(),
            store: InMemoryStoreConfig::from_env(),
            pages: PageConfig::from_env(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
