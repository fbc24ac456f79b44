//! Pure formatting helpers that turn stored note fields into display strings.

use once_cell::sync::Lazy;
use time::error::InvalidFormatDescription;
use time::format_description::{self, OwnedFormatItem};
use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::palette::format_color;
use crate::storage::Note;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "[year]-[month]-[day] [hour]:[minute]";
pub const UNKNOWN_TIME: &str = "Unknown time";
pub const ELLIPSIS: &str = "...";
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone)]
pub struct TimestampFormat {
    items: OwnedFormatItem,
}

impl TimestampFormat {
    pub fn parse(description: &str) -> Result<Self, InvalidFormatDescription> {
        let items = format_description::parse_owned::<2>(description)?;
        Ok(Self { items })
    }

    /// Renders epoch milliseconds in UTC. Non-positive values have no
    /// meaningful date and render as [`UNKNOWN_TIME`].
    pub fn format(&self, epoch_millis: i64) -> String {
        if epoch_millis <= 0 {
            return UNKNOWN_TIME.to_string();
        }
        let nanos = i128::from(epoch_millis) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .and_then(|dt| dt.format(&self.items).ok())
            .unwrap_or_else(|| UNKNOWN_TIME.to_string())
    }
}

impl Default for TimestampFormat {
    fn default() -> Self {
        static DEFAULT: Lazy<TimestampFormat> = Lazy::new(|| {
            TimestampFormat::parse(DEFAULT_TIMESTAMP_FORMAT)
                .expect("valid default timestamp format")
        });
        DEFAULT.clone()
    }
}

/// Cuts `body` after `max_chars` grapheme clusters and appends [`ELLIPSIS`].
/// Bodies that already fit are returned unchanged.
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.grapheme_indices(true).nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &body[..cut]),
        None => body.to_string(),
    }
}

pub fn display_title(title: &str) -> &str {
    if title.trim().is_empty() {
        UNTITLED
    } else {
        title
    }
}

/// One rendered line of the note list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub id: i64,
    pub title: String,
    pub modified: String,
    pub category: String,
    pub color: Option<u32>,
}

impl ListRow {
    pub fn from_note(note: &Note, format: &TimestampFormat, color: Option<u32>) -> Self {
        Self {
            id: note.id,
            title: display_title(&note.title).to_string(),
            modified: format.format(note.modified_at),
            category: note.category.clone(),
            color,
        }
    }

    pub fn render(&self) -> String {
        let color = self
            .color
            .map(format_color)
            .unwrap_or_else(|| String::from("-"));
        format!(
            "#{:<5} {}\n       {}  [{} {}]",
            self.id, self.title, self.modified, self.category, color
        )
    }
}
