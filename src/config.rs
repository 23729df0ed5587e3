use crate::model::{Channel, Guild};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub archive_root: PathBuf,
    // Timeout settings
    pub request_timeout: Duration,
    pub channel_deadline: Duration,
    // Parallelism; 1 keeps the fully sequential behaviour
    pub channel_concurrency: usize,
    pub attachment_concurrency: usize,
    pub history_page_size: u8,
    pub filter: ArchiveFilter,
}

/// Which guilds and channels a run visits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveFilter {
    /// Guild names or ids to archive. Empty means every guild.
    #[serde(default)]
    pub guilds: Vec<String>,
    /// Channel names or ids never archived.
    #[serde(default)]
    pub skip_channels: Vec<String>,
}

impl ArchiveFilter {
    pub fn allows_guild(&self, guild: &Guild) -> bool {
        self.guilds.is_empty() || matches_any(&self.guilds, &guild.name, guild.id)
    }

    pub fn allows_channel(&self, channel: &Channel) -> bool {
        !matches_any(&self.skip_channels, &channel.name, channel.id)
    }
}

fn matches_any(entries: &[String], name: &str, id: u64) -> bool {
    let id = id.to_string();
    entries.iter().any(|e| e == name || *e == id)
}

const DEFAULT_CONFIG_FILE: &str = "chanvault.toml";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CHANNEL_DEADLINE: Duration = Duration::from_secs(30 * 60);
/// Largest page the Discord history endpoint serves.
pub const MAX_HISTORY_PAGE: u8 = 100;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    /// Config with defaults for everything but the credential and destination.
    pub fn new(discord_token: impl Into<String>, archive_root: impl Into<PathBuf>) -> Self {
        Config {
            discord_token: discord_token.into(),
            archive_root: archive_root.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            channel_deadline: DEFAULT_CHANNEL_DEADLINE,
            channel_concurrency: 1,
            attachment_concurrency: 4,
            history_page_size: MAX_HISTORY_PAGE,
            filter: ArchiveFilter::default(),
        }
    }

    fn build() -> anyhow::Result<Self> {
        let discord_token = env::var("DISCORD_TOKEN")
            .or_else(|_| env::var("DISCORD_BOT_TOKEN"))
            .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?;

        Ok(Config {
            discord_token,
            archive_root: env::var("ARCHIVE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_archive_root()),
            request_timeout: env_duration("REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT)?,
            channel_deadline: env_duration("CHANNEL_DEADLINE", DEFAULT_CHANNEL_DEADLINE)?,
            channel_concurrency: env::var("CHANNEL_CONCURRENCY")
                .unwrap_or_else(|_| "1".to_string())
                .parse::<usize>()
                .unwrap_or(1)
                .max(1),
            attachment_concurrency: env::var("ATTACHMENT_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse::<usize>()
                .unwrap_or(4)
                .max(1),
            history_page_size: env::var("HISTORY_PAGE_SIZE")
                .unwrap_or_else(|_| MAX_HISTORY_PAGE.to_string())
                .parse::<u8>()
                .unwrap_or(MAX_HISTORY_PAGE)
                .clamp(1, MAX_HISTORY_PAGE),
            filter: Self::load_filter()?,
        })
    }

    pub fn load_filter() -> anyhow::Result<ArchiveFilter> {
        let path =
            env::var("CHANVAULT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        if let Ok(content) = fs::read_to_string(&path) {
            #[derive(Deserialize)]
            struct FileWrapper {
                #[serde(default)]
                filter: ArchiveFilter,
            }
            let wrapper: FileWrapper = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path, e))?;
            return Ok(wrapper.filter);
        }

        // Fallback to env variable
        if let Ok(env_guilds) = env::var("ARCHIVE_GUILDS") {
            if let Ok(guilds) = serde_json::from_str(&env_guilds) {
                return Ok(ArchiveFilter {
                    guilds,
                    skip_channels: Vec::new(),
                });
            }
        }

        Ok(ArchiveFilter::default())
    }
}

fn env_duration(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(key) {
        Ok(raw) => humantime::parse_duration(raw.trim())
            .map_err(|e| anyhow::anyhow!("{} must be a duration like '30s': {}", key, e)),
        Err(_) => Ok(default),
    }
}

/// `~/Downloads` where the platform has one, `./archive` otherwise.
fn default_archive_root() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("archive"))
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("archive_root", &self.archive_root)
            .field("request_timeout", &self.request_timeout)
            .field("channel_deadline", &self.channel_deadline)
            .field("channel_concurrency", &self.channel_concurrency)
            .field("attachment_concurrency", &self.attachment_concurrency)
            .field("history_page_size", &self.history_page_size)
            .field("filter", &self.filter)
            .finish()
    }
}
