//! Writes one message and its attachments into a channel directory.

use crate::archive::attachment::{fetch_attachment, AttachmentFailure};
use crate::archive::paths;
use crate::error::{ArchiveError, Result};
use crate::model::Message;
use crate::source::HistorySource;
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub attachments_saved: usize,
    pub attachment_failures: Vec<AttachmentFailure>,
}

/// Body of the `<id>.txt` marker.
pub fn marker_body(message: &Message) -> String {
    format!("{}: {}\n", message.author, message.content)
}

/// Writes the text marker, then fetches every attachment.
///
/// Only a failure to write the marker is an error. Attachment failures are
/// collected in the outcome and do not stop sibling transfers.
pub async fn persist_message<S>(
    source: &S,
    message: &Message,
    channel_path: &Path,
    attachment_concurrency: usize,
) -> Result<PersistOutcome>
where
    S: HistorySource + ?Sized,
{
    write_marker(message, channel_path).await?;
    info!("Saving message {} from {}", message.id, message.author);

    let names = paths::attachment_file_names(message);
    let results: Vec<_> = stream::iter(message.attachments.iter().zip(names))
        .map(|(attachment, name)| async move {
            let dest = channel_path.join(&name);
            (attachment, fetch_attachment(source, attachment, &dest).await)
        })
        .buffer_unordered(attachment_concurrency.max(1))
        .collect()
        .await;

    let mut outcome = PersistOutcome::default();
    for (attachment, result) in results {
        match result {
            Ok(_) => outcome.attachments_saved += 1,
            Err(error) => {
                let failure = AttachmentFailure {
                    message_id: message.id,
                    filename: attachment.filename.clone(),
                    error,
                };
                warn!(
                    message_id = failure.message_id,
                    filename = %failure.filename,
                    error = %failure.error,
                    "Failed to save attachment"
                );
                outcome.attachment_failures.push(failure);
            }
        }
    }
    Ok(outcome)
}

/// Writes through a hidden `.part` sibling so the marker appears whole or not at all.
async fn write_marker(message: &Message, channel_path: &Path) -> Result<()> {
    let final_path = channel_path.join(paths::marker_name(message.id));
    let part_path = channel_path.join(format!(".{}.part", paths::marker_name(message.id)));

    tokio::fs::write(&part_path, marker_body(message))
        .await
        .map_err(|e| ArchiveError::io(&part_path, e))?;
    tokio::fs::rename(&part_path, &final_path)
        .await
        .map_err(|e| ArchiveError::io(&final_path, e))?;
    Ok(())
}
