use serde::Deserialize;

/// Main configuration structure for kb-crawler
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Default number of new pages to fetch per crawl
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Recorded alongside crawled pages; discovery is bounded by `max_pages`
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Delay after each processed URL (milliseconds)
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Per-request timeout for every HTTP call (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on sitemap documents fetched while resolving one sitemap
    #[serde(default = "default_max_sitemap_documents")]
    pub max_sitemap_documents: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            pacing_delay_ms: default_pacing_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_sitemap_documents: default_max_sitemap_documents(),
        }
    }
}

/// Content-extraction service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Service prefix; the target URL is appended verbatim
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Inline API key, used only when the environment variable is unset
    #[serde(default)]
    pub api_key: Option<String>,

    /// Extraction calls allowed per rolling window
    #[serde(default = "default_calls_per_window")]
    pub calls_per_window: u32,

    /// Length of the rolling window (seconds)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            api_key: None,
            calls_per_window: default_calls_per_window(),
            window_secs: default_window_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(default)]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite knowledge base database
    pub database_path: String,
}

fn default_max_pages() -> usize {
    100
}

fn default_max_depth() -> u32 {
    2
}

fn default_pacing_delay_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_sitemap_documents() -> usize {
    50
}

fn default_endpoint() -> String {
    "https://r.jina.ai/".to_string()
}

fn default_api_key_env() -> String {
    "JINA_API_KEY".to_string()
}

fn default_calls_per_window() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    60
}

fn default_crawler_name() -> String {
    "kb-crawler".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
