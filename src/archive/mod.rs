//! One-shot archive run: every allowed guild, every text channel.
//!
//! Layout under the root is `<guild>/<channel>/{<id>.txt, <id>_<file>, index.html}`.
//! A channel failure never stops the run; only failing to list guilds does.

pub mod attachment;
pub mod paths;
pub mod persist;
pub mod resume;
pub mod sync;
pub mod timeline;

use crate::config::Config;
use crate::error::{ArchiveError, Result};
use crate::model::{Channel, Guild};
use crate::source::HistorySource;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

pub use sync::{sync_channel, ChannelReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Archived(ChannelReport),
    /// Access denied; expected for channels the bot cannot read.
    Forbidden,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ChannelRecord {
    pub guild: String,
    pub channel: String,
    pub outcome: ChannelOutcome,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub channels: Vec<ChannelRecord>,
    /// Guilds whose directory or channel list could not be obtained.
    pub failed_guilds: Vec<String>,
}

impl RunReport {
    pub fn outcome(&self, guild: &str, channel: &str) -> Option<&ChannelOutcome> {
        self.channels
            .iter()
            .find(|r| r.guild == guild && r.channel == channel)
            .map(|r| &r.outcome)
    }

    pub fn archived(&self) -> usize {
        self.count(|o| matches!(o, ChannelOutcome::Archived(_)))
    }

    pub fn forbidden(&self) -> usize {
        self.count(|o| matches!(o, ChannelOutcome::Forbidden))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ChannelOutcome::Failed(_)))
    }

    pub fn new_messages(&self) -> usize {
        self.channels
            .iter()
            .filter_map(|r| match &r.outcome {
                ChannelOutcome::Archived(report) => Some(report.new_messages),
                _ => None,
            })
            .sum()
    }

    pub fn log_summary(&self) {
        info!(
            archived = self.archived(),
            forbidden = self.forbidden(),
            failed = self.failed(),
            failed_guilds = self.failed_guilds.len(),
            new_messages = self.new_messages(),
            "Archive run finished"
        );
    }

    fn count(&self, pred: impl Fn(&ChannelOutcome) -> bool) -> usize {
        self.channels.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Drives an archive run against a connected source.
pub struct Archiver<'a, S: ?Sized> {
    source: &'a S,
    config: &'a Config,
}

impl<'a, S> Archiver<'a, S>
where
    S: HistorySource + ?Sized,
{
    pub fn new(source: &'a S, config: &'a Config) -> Self {
        Self { source, config }
    }

    /// Archives everything reachable, once.
    ///
    /// Errors only when the guild list itself cannot be fetched.
    pub async fn run(&self) -> Result<RunReport> {
        let guilds = self.source.guilds().await?;
        info!("Found {} guilds", guilds.len());

        let mut report = RunReport::default();
        for guild in guilds {
            if !self.config.filter.allows_guild(&guild) {
                debug!("Skipping guild {} (filtered)", guild.name);
                continue;
            }
            self.archive_guild(&guild, &mut report).await;
        }
        Ok(report)
    }

    async fn archive_guild(&self, guild: &Guild, report: &mut RunReport) {
        info!("Processing server: {}", guild.name);
        let guild_path = self.config.archive_root.join(paths::segment(&guild.name));
        if let Err(e) = tokio::fs::create_dir_all(&guild_path).await {
            let e = ArchiveError::io(&guild_path, e);
            error!(guild = %guild.name, error = %e, "Cannot create guild directory");
            report.failed_guilds.push(guild.name.clone());
            return;
        }

        let channels = match self.source.text_channels(guild).await {
            Ok(channels) => channels,
            Err(e) => {
                if e.is_forbidden() {
                    warn!(guild = %guild.name, error = %e, "No access to guild channel list");
                } else {
                    error!(guild = %guild.name, error = %e, "Failed to list channels");
                }
                report.failed_guilds.push(guild.name.clone());
                return;
            }
        };

        let channels: Vec<Channel> = channels
            .into_iter()
            .filter(|c| {
                let allowed = self.config.filter.allows_channel(c);
                if !allowed {
                    debug!("Skipping channel {} (filtered)", c.name);
                }
                allowed
            })
            .collect();

        let guild_path = guild_path.as_path();
        let records: Vec<Vec<ChannelRecord>> = stream::iter(group_by_directory(channels))
            .map(|group| async move {
                let mut records = Vec::with_capacity(group.len());
                for channel in &group {
                    records.push(self.archive_channel(guild, channel, guild_path).await);
                }
                records
            })
            .buffered(self.config.channel_concurrency.max(1))
            .collect()
            .await;

        report.channels.extend(records.into_iter().flatten());
    }

    async fn archive_channel(
        &self,
        guild: &Guild,
        channel: &Channel,
        guild_path: &Path,
    ) -> ChannelRecord {
        info!("Processing channel: {}", channel.name);
        let deadline = self.config.channel_deadline;
        let sync = sync_channel(
            self.source,
            channel,
            guild_path,
            self.config.attachment_concurrency,
        );

        let outcome = match tokio::time::timeout(deadline, sync).await {
            Ok(Ok(report)) => {
                info!(
                    guild = %guild.name,
                    channel = %channel.name,
                    new = report.new_messages,
                    total = report.total_messages,
                    "Channel archived"
                );
                ChannelOutcome::Archived(report)
            }
            Ok(Err(e)) if e.is_forbidden() => {
                warn!(
                    guild = %guild.name,
                    channel = %channel.name,
                    "No access to channel, this may be intended"
                );
                ChannelOutcome::Forbidden
            }
            Ok(Err(e)) => {
                error!(guild = %guild.name, channel = %channel.name, error = %e, "Error in channel");
                ChannelOutcome::Failed(e.to_string())
            }
            Err(_) => {
                let e = ArchiveError::Timeout(deadline);
                error!(guild = %guild.name, channel = %channel.name, error = %e, "Channel sync abandoned");
                ChannelOutcome::Failed(e.to_string())
            }
        };

        ChannelRecord {
            guild: guild.name.clone(),
            channel: channel.name.clone(),
            outcome,
        }
    }
}

/// Channels sharing a directory name stay together so they never sync concurrently.
/// Groups keep the order in which their first channel appeared.
fn group_by_directory(channels: Vec<Channel>) -> Vec<Vec<Channel>> {
    let mut groups: Vec<Vec<Channel>> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for channel in channels {
        let key = paths::segment(&channel.name);
        match slots.get(&key) {
            Some(&slot) => groups[slot].push(channel),
            None => {
                slots.insert(key, groups.len());
                groups.push(vec![channel]);
            }
        }
    }
    groups
}
