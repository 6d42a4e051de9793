//! Configuration file parser for `gadio-feed.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which targets the GADIO radio catalog on gcores.com. Unknown keys are
//! accepted by serde but logged as warnings so typos do not go unnoticed.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the 1 MB limit.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration, constructed once per run and threaded into
/// every pipeline component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub channel: ChannelConfig,
    pub output: OutputConfig,
}

/// Where and how politely to crawl.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Site root. Only links on this host are followed.
    pub base_url: String,

    /// Path segment of the catalog, e.g. `radios` for `/radios?page=N`
    /// listings and `/radios/<id>` detail pages.
    pub listing_path: String,

    pub user_agent: String,

    /// Maximum concurrent requests per host.
    pub parallelism: usize,

    /// Fixed politeness delay after each request, in milliseconds.
    pub delay_ms: u64,

    /// Upper bound of the random jitter added to `delay_ms`.
    pub random_delay_ms: u64,

    /// Deadline for a single GET or HEAD request.
    pub request_timeout_secs: u64,

    /// Deadline for the whole crawl, measured up to the join barrier.
    pub run_timeout_secs: u64,

    /// On-disk response cache. `None` disables caching.
    pub cache_dir: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.gcores.com/".to_string(),
            listing_path: "radios".to_string(),
            user_agent: "unknown".to_string(),
            parallelism: 4,
            delay_ms: 800,
            random_delay_ms: 600,
            request_timeout_secs: 30,
            run_timeout_secs: 600,
            cache_dir: Some(PathBuf::from(".cache")),
        }
    }
}

impl CrawlConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn random_delay(&self) -> Duration {
        Duration::from_millis(self.random_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs.max(1))
    }
}

/// Run-invariant channel metadata written into the feed envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: String,
    pub link: String,
    /// URL the feed itself is published at, for `<atom:link rel="self">`.
    pub self_link: Option<String>,
    pub description: String,
    pub language: String,
    pub copyright: String,
    pub generator: String,
    pub managing_editor: String,
    pub owner_name: String,
    pub owner_email: String,
    pub subtitle: String,
    pub keywords: Vec<String>,
    pub explicit: bool,
    pub image: String,
    pub category: String,
    pub subcategory: String,
    /// `sy:updatePeriod` (hourly, daily, weekly, monthly, yearly).
    pub update_period: String,
    pub update_frequency: u32,
    /// Channel `pubDate`, RFC 3339.
    pub published: String,
    /// Wrap item descriptions in CDATA instead of entity-escaping them.
    pub cdata_descriptions: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "（非官方源）GADIO".to_string(),
            link: "https://www.gcores.com/".to_string(),
            self_link: None,
            description: "（非官方源）机核网 gcores.com 「不止是游戏」，机核从年轻人的兴趣出发，\
                          旨在用亲切幽默地风格在游戏、电影、音乐、消费等不同领域提供有价值的精致内容，\
                          把有着各种兴趣爱好的年轻人聚集在一起，在这个无趣的世界里，找到一处属于自己的安宁之乡。"
                .to_string(),
            language: "zh-cn".to_string(),
            copyright: "www.gcores.com".to_string(),
            generator: concat!("gadio-feed ", env!("CARGO_PKG_VERSION")).to_string(),
            managing_editor: "gamecores@qq.com (机核网 www.gcores.com)".to_string(),
            owner_name: "机核网 www.gcores.com".to_string(),
            owner_email: "gamecores@qq.com".to_string(),
            subtitle: "机核网－嘉电游GADIO".to_string(),
            keywords: vec!["gadio".to_string(), "gcores".to_string(), "机核".to_string()],
            explicit: false,
            image: "http://media.fmit.cn/feed/gadionewlogos.png".to_string(),
            category: "Games & Hobbies".to_string(),
            subcategory: "Video Games".to_string(),
            update_period: "daily".to_string(),
            update_frequency: 1,
            published: "2010-05-10T12:00:00Z".to_string(),
            cdata_descriptions: false,
        }
    }
}

/// Output sinks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub feed_path: PathBuf,
    /// JSON run report with skipped episodes. `None` disables it.
    pub report_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            feed_path: PathBuf::from("results/gadio.xml"),
            report_path: None,
        }
    }
}

const KNOWN_SECTIONS: [(&str, &[&str]); 3] = [
    (
        "crawl",
        &[
            "base_url",
            "listing_path",
            "user_agent",
            "parallelism",
            "delay_ms",
            "random_delay_ms",
            "request_timeout_secs",
            "run_timeout_secs",
            "cache_dir",
        ],
    ),
    (
        "channel",
        &[
            "title",
            "link",
            "self_link",
            "description",
            "language",
            "copyright",
            "generator",
            "managing_editor",
            "owner_name",
            "owner_email",
            "subtitle",
            "keywords",
            "explicit",
            "image",
            "category",
            "subcategory",
            "update_period",
            "update_frequency",
            "published",
            "cdata_descriptions",
        ],
    ),
    ("output", &["feed_path", "report_path"]),
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            base_url = %config.crawl.base_url,
            parallelism = config.crawl.parallelism,
            "Loaded configuration"
        );
        Ok(config)
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for (key, value) in raw {
        let Some((_, fields)) = KNOWN_SECTIONS.iter().find(|(name, _)| *name == key.as_str()) else {
            tracing::warn!(key = %key, "Unknown section in config file, ignoring");
            continue;
        };
        if let Some(table) = value.as_table() {
            for field in table.keys() {
                if !fields.contains(&field.as_str()) {
                    tracing::warn!(section = %key, key = %field, "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
