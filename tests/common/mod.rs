//! In-memory history source for driving archive runs in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chanvault::error::{ArchiveError, Result};
use chanvault::model::{Attachment, Channel, Guild, Message};
use chanvault::source::HistorySource;
use chrono::{TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Normal,
    Forbidden,
    /// Yields the first message then errors.
    BreaksMidway,
    /// Never yields anything.
    Hangs,
}

#[derive(Default)]
pub struct FakeSource {
    guilds: Vec<Guild>,
    channels: HashMap<u64, Vec<Channel>>,
    histories: HashMap<u64, Vec<Message>>,
    behaviour: HashMap<u64, Behaviour>,
    broken_urls: HashSet<String>,
    guild_listing_fails: bool,
    downloads: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guild(mut self, id: u64, name: &str) -> Self {
        self.guilds.push(Guild {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn channel(mut self, guild_id: u64, id: u64, name: &str) -> Self {
        self.channels.entry(guild_id).or_default().push(Channel {
            id,
            guild_id,
            name: name.to_string(),
        });
        self
    }

    /// Messages are stored in insertion order; `history` serves them oldest first.
    pub fn message(mut self, channel_id: u64, message: Message) -> Self {
        self.histories.entry(channel_id).or_default().push(message);
        self
    }

    pub fn forbidden(mut self, channel_id: u64) -> Self {
        self.behaviour.insert(channel_id, Behaviour::Forbidden);
        self
    }

    pub fn breaks_midway(mut self, channel_id: u64) -> Self {
        self.behaviour.insert(channel_id, Behaviour::BreaksMidway);
        self
    }

    pub fn hangs(mut self, channel_id: u64) -> Self {
        self.behaviour.insert(channel_id, Behaviour::Hangs);
        self
    }

    pub fn broken_url(mut self, url: &str) -> Self {
        self.broken_urls.insert(url.to_string());
        self
    }

    pub fn failing_guild_listing(mut self) -> Self {
        self.guild_listing_fails = true;
        self
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn ordered_history(&self, channel_id: u64) -> Vec<Message> {
        let mut messages = self.histories.get(&channel_id).cloned().unwrap_or_default();
        messages.sort_by_key(|m| (m.created_at, m.id));
        messages
    }
}

#[async_trait]
impl HistorySource for FakeSource {
    async fn guilds(&self) -> Result<Vec<Guild>> {
        if self.guild_listing_fails {
            return Err(ArchiveError::Session("401 Unauthorized".into()));
        }
        Ok(self.guilds.clone())
    }

    async fn text_channels(&self, guild: &Guild) -> Result<Vec<Channel>> {
        Ok(self.channels.get(&guild.id).cloned().unwrap_or_default())
    }

    fn history<'a>(&'a self, channel: &'a Channel) -> BoxStream<'a, Result<Message>> {
        let behaviour = self
            .behaviour
            .get(&channel.id)
            .copied()
            .unwrap_or(Behaviour::Normal);
        let messages = self.ordered_history(channel.id);
        match behaviour {
            Behaviour::Normal => stream::iter(messages.into_iter().map(Ok)).boxed(),
            Behaviour::Forbidden => stream::once(async move {
                Err::<Message, _>(ArchiveError::Forbidden(format!("channel {}", channel.name)))
            })
            .boxed(),
            Behaviour::BreaksMidway => stream::iter(
                messages
                    .into_iter()
                    .take(1)
                    .map(Ok)
                    .chain(std::iter::once(Err(ArchiveError::Remote(
                        "disconnected mid-history".into(),
                    )))),
            )
            .boxed(),
            Behaviour::Hangs => stream::pending().boxed(),
        }
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.broken_urls.contains(&attachment.url) {
            return Err(ArchiveError::Remote(format!("404 for {}", attachment.url)));
        }
        Ok(format!("bytes of {}", attachment.filename).into_bytes())
    }
}

/// A message created `id` minutes after a fixed epoch.
pub fn message(id: u64, author: &str, content: &str, files: &[&str]) -> Message {
    message_at(id, id as i64 * 60, author, content, files)
}

pub fn message_at(id: u64, offset_secs: i64, author: &str, content: &str, files: &[&str]) -> Message {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Message {
        id,
        author: author.to_string(),
        content: content.to_string(),
        created_at: base + chrono::Duration::seconds(offset_secs),
        attachments: files
            .iter()
            .map(|f| Attachment {
                filename: f.to_string(),
                url: format!("https://cdn.example/{}/{}", id, f),
            })
            .collect(),
    }
}

/// Sorted file names directly inside `dir`.
pub fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
