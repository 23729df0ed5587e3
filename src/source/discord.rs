use crate::config::Config;
use crate::error::{ArchiveError, Result};
use crate::model::{Attachment, Channel, Guild, Message};
use crate::source::HistorySource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serenity::http::{GuildPagination, Http, MessagePagination};
use serenity::model::channel::{ChannelType, GuildChannel, Message as DiscordMessage};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Discord caps guild listing pages at 200 entries.
const GUILD_PAGE: u64 = 200;

/// REST-only Discord session used as the archive's history source.
pub struct DiscordSource {
    http: Arc<Http>,
    http_client: reqwest::Client,
    request_timeout: Duration,
    page_size: u8,
}

impl DiscordSource {
    /// Opens the session and checks the token by fetching the bot's own user.
    pub async fn connect(config: &Config) -> Result<Self> {
        let http = Arc::new(Http::new(&config.discord_token));

        let user = tokio::time::timeout(config.request_timeout, http.get_current_user())
            .await
            .map_err(|_| {
                ArchiveError::Session(format!(
                    "login timed out after {}",
                    humantime::format_duration(config.request_timeout)
                ))
            })?
            .map_err(|e| ArchiveError::Session(format!("credential rejected: {}", e)))?;
        info!("Successfully logged in as {}", user.tag());

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ArchiveError::Session(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            http_client,
            request_timeout: config.request_timeout,
            page_size: config.history_page_size,
        })
    }

    /// Ends the session. Nothing is reused after an archive run.
    pub async fn close(self) {
        info!("Closing Discord session");
        drop(self.http);
    }

    async fn bounded<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = serenity::Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(what, e)),
            Err(_) => Err(ArchiveError::Timeout(self.request_timeout)),
        }
    }

    async fn history_page(&self, channel_id: ChannelId, after: MessageId) -> Result<Vec<Message>> {
        let what = format!("history of channel {}", channel_id);
        let page = self
            .bounded(
                &what,
                self.http.get_messages(
                    channel_id,
                    Some(MessagePagination::After(after)),
                    Some(self.page_size),
                ),
            )
            .await?;
        debug!(
            "Fetched {} messages from channel {} after {}",
            page.len(),
            channel_id,
            after
        );
        Ok(ordered_page(page))
    }
}

#[async_trait]
impl HistorySource for DiscordSource {
    async fn guilds(&self) -> Result<Vec<Guild>> {
        let mut guilds = Vec::new();
        let mut cursor: Option<GuildId> = None;
        loop {
            let page = self
                .bounded(
                    "guild list",
                    self.http
                        .get_guilds(cursor.map(GuildPagination::After), Some(GUILD_PAGE)),
                )
                .await?;
            let full = page.len() as u64 == GUILD_PAGE;
            cursor = page.last().map(|g| g.id);
            guilds.extend(page.into_iter().map(|g| Guild {
                id: g.id.get(),
                name: g.name,
            }));
            if !full {
                break;
            }
        }
        Ok(guilds)
    }

    async fn text_channels(&self, guild: &Guild) -> Result<Vec<Channel>> {
        let what = format!("channels of guild {}", guild.name);
        let channels = self
            .bounded(&what, self.http.get_channels(GuildId::new(guild.id)))
            .await?;
        Ok(text_channels_in_order(channels))
    }

    fn history<'a>(&'a self, channel: &'a Channel) -> BoxStream<'a, Result<Message>> {
        let channel_id = ChannelId::new(channel.id);
        let page_size = usize::from(self.page_size);
        // Snowflakes start above 1, so `after 1` is the beginning of the channel.
        stream::try_unfold(Some(MessageId::new(1)), move |cursor| async move {
            let Some(after) = cursor else {
                return Ok(None);
            };
            let page = self.history_page(channel_id, after).await?;
            let next = next_cursor(&page, page_size);
            Ok::<_, ArchiveError>(Some((page, next)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        let what = format!("download of {}", attachment.filename);
        let response = self
            .http_client
            .get(&attachment.url)
            .send()
            .await
            .map_err(|e| self.transfer_error(&what, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(ArchiveError::Forbidden(what));
        }
        if !status.is_success() {
            return Err(ArchiveError::Remote(format!("{}: HTTP {}", what, status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transfer_error(&what, e))?;
        Ok(bytes.to_vec())
    }
}

impl DiscordSource {
    fn transfer_error(&self, what: &str, err: reqwest::Error) -> ArchiveError {
        if err.is_timeout() {
            ArchiveError::Timeout(self.request_timeout)
        } else {
            ArchiveError::Remote(format!("{}: {}", what, err))
        }
    }
}

fn classify(what: &str, err: serenity::Error) -> ArchiveError {
    let status = match &err {
        serenity::Error::Http(http) => http.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    match status {
        Some(403) => ArchiveError::Forbidden(format!("{}: {}", what, err)),
        _ => ArchiveError::Remote(format!("{}: {}", what, err)),
    }
}

/// Pages come back newest first even when paging forward.
fn ordered_page(mut page: Vec<DiscordMessage>) -> Vec<Message> {
    page.sort_by_key(|m| m.id);
    page.iter().map(to_message).collect()
}

/// Where the next page starts: after the newest message of a full page.
/// A short page is the end of the channel.
fn next_cursor(page: &[Message], page_size: usize) -> Option<MessageId> {
    if page.len() < page_size {
        return None;
    }
    page.last().map(|m| MessageId::new(m.id))
}

fn text_channels_in_order(mut channels: Vec<GuildChannel>) -> Vec<Channel> {
    channels.retain(|c| matches!(c.kind, ChannelType::Text | ChannelType::News));
    channels.sort_by_key(|c| (c.position, c.id));
    channels
        .into_iter()
        .map(|c| Channel {
            id: c.id.get(),
            guild_id: c.guild_id.get(),
            name: c.name,
        })
        .collect()
}

fn to_message(msg: &DiscordMessage) -> Message {
    let created_at = DateTime::<Utc>::from_timestamp(msg.timestamp.unix_timestamp(), 0)
        .unwrap_or_default();
    Message {
        id: msg.id.get(),
        author: msg.author.tag(),
        content: msg.content.clone(),
        created_at,
        attachments: msg
            .attachments
            .iter()
            .map(|a| Attachment {
                filename: a.filename.clone(),
                url: a.url.clone(),
            })
            .collect(),
    }
}
