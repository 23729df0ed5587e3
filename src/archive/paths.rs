//! Naming rules for everything written under the archive root.

use crate::model::Message;
use std::collections::HashSet;

/// Make `name` safe to use as a single path component.
///
/// Separators, NUL and characters Windows refuses in file names become `_`.
/// Names that would resolve to the current or parent directory become `_`.
pub fn segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// File name of the text marker for a message.
pub fn marker_name(message_id: u64) -> String {
    format!("{}.txt", message_id)
}

/// Local file names for each attachment of `message`, in attachment order.
///
/// The first attachment with a given name keeps `<id>_<name>`. Later ones take
/// `<id>_<stem>_<n>.<ext>` with the smallest `n >= 2` not already handed out
/// for this message, so names never repeat.
pub fn attachment_file_names(message: &Message) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    message
        .attachments
        .iter()
        .map(|attachment| {
            let name = segment(&attachment.filename);
            let mut candidate = name.clone();
            let mut n = 2;
            while taken.contains(&candidate) {
                candidate = numbered(&name, n);
                n += 1;
            }
            taken.insert(candidate.clone());
            format!("{}_{}", message.id, candidate)
        })
        .collect()
}

fn numbered(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", name, n),
    }
}
