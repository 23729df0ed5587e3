use crate::error::{ArchiveError, Result};
use crate::model::Attachment;
use crate::source::HistorySource;
use std::path::Path;
use tracing::debug;

/// An attachment that could not be stored. The owning message stays archived.
#[derive(Debug)]
pub struct AttachmentFailure {
    pub message_id: u64,
    pub filename: String,
    pub error: ArchiveError,
}

/// Transfers one attachment's bytes to `dest`. Returns the number of bytes written.
pub async fn fetch_attachment<S>(source: &S, attachment: &Attachment, dest: &Path) -> Result<u64>
where
    S: HistorySource + ?Sized,
{
    debug!("Downloading attachment: {}", attachment.filename);
    let bytes = source.download(attachment).await?;
    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|e| ArchiveError::io(dest, e))?;
    Ok(bytes.len() as u64)
}
