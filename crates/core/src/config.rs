use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CAMPAIGN_RECONCILE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub esp: EspConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// Upstream ESP API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EspConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as the `Version` header on every request.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Hard cap on pages followed for one resource.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FanoutConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

// Default functions
fn default_base_url() -> String {
    "https://services.leadconnectorhq.com".to_string()
}
fn default_api_version() -> String {
    "2021-07-28".to_string()
}
fn default_timeout_ms() -> u64 {
    15_000
}
fn default_page_size() -> u32 {
    100
}
fn default_max_pages() -> usize {
    30
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_max_concurrent() -> usize {
    5
}
fn default_max_depth() -> usize {
    6
}

impl Default for EspConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            timeout_ms: default_timeout_ms(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            esp: EspConfig::default(),
            cache: CacheConfig::default(),
            fanout: FanoutConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CAMPAIGN_RECONCILE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
