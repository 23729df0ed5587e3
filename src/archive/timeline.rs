//! The per-channel `index.html` snapshot.

use crate::archive::paths;
use crate::error::{ArchiveError, Result};
use crate::model::Message;
use std::path::Path;

pub const TIMELINE_FILE: &str = "index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    /// Classify by file extension, ignoring case.
    pub fn classify(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "gif" => Some(Self::Image),
            "mp3" | "ogg" => Some(Self::Audio),
            "mp4" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Renders the full timeline document for `messages`, in the given order.
///
/// Attachment references use the same file names the persister writes, whether
/// or not the files are present on disk.
pub fn render(channel_name: &str, messages: &[Message]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    html.push_str("<title>Channel Timeline</title></head><body>\n");
    html.push_str(&format!("<h1>Timeline for {}</h1>\n", escape(channel_name)));

    for message in messages {
        html.push_str(&format!(
            "<div><strong>{}</strong>: {}<br>\n",
            escape(&message.author),
            escape(&message.content)
        ));

        let names = paths::attachment_file_names(message);
        for (attachment, name) in message.attachments.iter().zip(&names) {
            let src = escape(name);
            match MediaKind::classify(&attachment.filename) {
                Some(MediaKind::Image) => {
                    html.push_str(&format!("<img src=\"{}\" width=\"200\"><br>\n", src));
                }
                Some(MediaKind::Audio) => {
                    html.push_str(&format!(
                        "<audio controls><source src=\"{}\" type=\"audio/mpeg\">\
                         Your browser does not support the audio tag.</audio><br>\n",
                        src
                    ));
                }
                Some(MediaKind::Video) => {
                    html.push_str(&format!(
                        "<video width=\"320\" height=\"240\" controls>\
                         <source src=\"{}\" type=\"video/mp4\">\
                         Your browser does not support the video tag.</video><br>\n",
                        src
                    ));
                }
                None => {}
            }
        }

        html.push_str(&format!(
            "<small>{}</small></div><hr>\n",
            message.created_at.format("%Y-%m-%d %H:%M:%S%:z")
        ));
    }

    html.push_str("</body></html>\n");
    html
}

/// Overwrites `<channel_path>/index.html`.
pub async fn write(channel_path: &Path, channel_name: &str, messages: &[Message]) -> Result<()> {
    let path = channel_path.join(TIMELINE_FILE);
    tokio::fs::write(&path, render(channel_name, messages))
        .await
        .map_err(|e| ArchiveError::io(&path, e))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;
    use chrono::{TimeZone, Utc};

    fn message(id: u64, author: &str, content: &str, files: &[&str]) -> Message {
        Message {
            id,
            author: author.into(),
            content: content.into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            attachments: files
                .iter()
                .map(|f| Attachment {
                    filename: f.to_string(),
                    url: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(MediaKind::classify("PHOTO.JPG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::classify("anim.gif"), Some(MediaKind::Image));
        assert_eq!(MediaKind::classify("clip.MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::classify("note.ogg"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::classify("song.mp3"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::classify("report.pdf"), None);
        assert_eq!(MediaKind::classify("png"), None);
    }

    #[test]
    fn test_render_media_blocks() {
        let html = render(
            "general",
            &[
                message(1, "alice", "pic", &["PHOTO.JPG"]),
                message(2, "bob", "vid", &["clip.MP4"]),
                message(3, "carol", "voice", &["note.ogg"]),
                message(4, "dave", "doc", &["report.pdf"]),
            ],
        );

        assert!(html.contains("<h1>Timeline for general</h1>"));
        assert!(html.contains("<img src=\"1_PHOTO.JPG\" width=\"200\">"));
        assert!(html.contains("<source src=\"2_clip.MP4\" type=\"video/mp4\">"));
        assert!(html.contains("<source src=\"3_note.ogg\" type=\"audio/mpeg\">"));
        assert!(!html.contains("4_report.pdf"));
        assert!(html.contains("<strong>dave</strong>: doc"));
        assert!(html.contains("<small>2024-05-01 12:00:00+00:00</small>"));
    }

    #[test]
    fn test_render_keeps_given_order() {
        let html = render(
            "general",
            &[
                message(1, "a", "first", &[]),
                message(2, "b", "second", &[]),
                message(3, "c", "third", &[]),
            ],
        );
        let first = html.find("first").unwrap();
        let second = html.find("second").unwrap();
        let third = html.find("third").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_render_escapes_text() {
        let html = render(
            "<chan>",
            &[message(1, "<b>eve</b>", "<script>alert('x')</script> & co", &[])],
        );
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; co"));
        assert!(html.contains("<strong>&lt;b&gt;eve&lt;/b&gt;</strong>"));
        assert!(html.contains("Timeline for &lt;chan&gt;"));
    }

    #[test]
    fn test_render_document_shape() {
        let html = render(
            "general",
            &[
                message(1, "a", "one", &["a.png"]),
                message(2, "b", "two", &[]),
            ],
        );
        assert!(html.starts_with("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">"));
        assert!(html.ends_with("</body></html>\n"));
        assert_eq!(html.matches("<div>").count(), 2);
        assert_eq!(html.matches("</div><hr>\n").count(), 2);
        assert!(html.contains("<div><strong>a</strong>: one<br>\n<img src=\"1_a.png\" width=\"200\"><br>\n<small>"));
    }

    #[test]
    fn test_render_disambiguated_names() {
        let html = render("general", &[message(5, "a", "two", &["x.png", "x.png"])]);
        assert!(html.contains("src=\"5_x.png\""));
        assert!(html.contains("src=\"5_x_2.png\""));
    }
}
