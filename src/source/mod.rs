//! The remote side of an archive run.

use crate::error::Result;
use crate::model::{Attachment, Channel, Guild, Message};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod discord;

pub use discord::DiscordSource;

/// Something that can enumerate guilds and replay channel history.
///
/// Access-denied conditions must surface as
/// [`ArchiveError::Forbidden`](crate::error::ArchiveError::Forbidden) so the
/// orchestrator can tell them apart from real failures.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Guilds reachable from the current session, in platform order.
    async fn guilds(&self) -> Result<Vec<Guild>>;

    /// Channels of `guild` that carry text history, in display order.
    async fn text_channels(&self, guild: &Guild) -> Result<Vec<Channel>>;

    /// The full history of `channel`, oldest first.
    ///
    /// Each call starts from the beginning of the channel.
    fn history<'a>(&'a self, channel: &'a Channel) -> BoxStream<'a, Result<Message>>;

    /// Fetch the bytes of one attachment.
    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>>;
}
