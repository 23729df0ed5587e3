//! Rebuilds "what is already archived" from a channel directory.

use crate::error::{ArchiveError, Result};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Message ids whose `<id>.txt` marker exists in a channel directory.
///
/// Built once per channel before any write for that channel starts.
#[derive(Debug, Default, Clone)]
pub struct ResumeIndex {
    ids: HashSet<String>,
}

impl ResumeIndex {
    pub async fn scan(dir: &Path) -> Result<Self> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ArchiveError::io(dir, e)),
        };

        let mut ids = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ArchiveError::io(dir, e))?
        {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(marker_id) {
                ids.insert(id.to_string());
            }
        }

        debug!("Resume index for {:?}: {} archived messages", dir, ids.len());
        Ok(Self { ids })
    }

    pub fn contains(&self, message_id: u64) -> bool {
        self.ids.contains(&message_id.to_string())
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// `"5.txt"` -> `Some("5")`; anything without the `.txt` suffix is not a marker.
fn marker_id(file_name: &str) -> Option<&str> {
    if !file_name.ends_with(".txt") {
        return None;
    }
    file_name.split('.').next().filter(|id| !id.is_empty())
}
