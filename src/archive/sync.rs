use crate::archive::persist::persist_message;
use crate::archive::resume::ResumeIndex;
use crate::archive::{paths, timeline};
use crate::error::{ArchiveError, Result};
use crate::model::Channel;
use crate::source::HistorySource;
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What one channel sync did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    /// Messages written this run.
    pub new_messages: usize,
    /// Messages returned by the source this run, all of them in the timeline.
    pub total_messages: usize,
    pub attachments_saved: usize,
    pub attachment_failures: usize,
}

/// Directory a channel is archived into.
pub fn channel_path(guild_path: &Path, channel: &Channel) -> PathBuf {
    guild_path.join(paths::segment(&channel.name))
}

/// Brings one channel's archive up to date and rewrites its timeline.
///
/// The resume index is read once, before the first write. The whole history is
/// replayed; only messages without a marker are persisted, but every message
/// lands in the timeline.
pub async fn sync_channel<S>(
    source: &S,
    channel: &Channel,
    guild_path: &Path,
    attachment_concurrency: usize,
) -> Result<ChannelReport>
where
    S: HistorySource + ?Sized,
{
    let channel_path = channel_path(guild_path, channel);
    tokio::fs::create_dir_all(&channel_path)
        .await
        .map_err(|e| ArchiveError::io(&channel_path, e))?;

    let archived = ResumeIndex::scan(&channel_path).await?;
    debug!(
        "Channel {}: {} messages already archived",
        channel.name,
        archived.len()
    );

    let mut report = ChannelReport::default();
    let mut messages = Vec::new();
    let mut history = source.history(channel);
    while let Some(message) = history.try_next().await? {
        if !archived.contains(message.id) {
            let outcome =
                persist_message(source, &message, &channel_path, attachment_concurrency).await?;
            report.new_messages += 1;
            report.attachments_saved += outcome.attachments_saved;
            report.attachment_failures += outcome.attachment_failures.len();
        }
        messages.push(message);
    }
    report.total_messages = messages.len();

    timeline::write(&channel_path, &channel.name, &messages).await?;
    Ok(report)
}
