use chrono::{DateTime, Utc};

use super::media::MediaFormat;

/// The downloadable resource attached to a feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    /// Byte length from the probe's `Content-Length`. Always non-zero.
    pub length: u64,
    pub format: MediaFormat,
}

/// A fully resolved episode, ready to become one `<item>`.
///
/// Built once per episode after its enclosure probe succeeds, inserted into
/// the aggregator exactly once and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub published: DateTime<Utc>,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub cover: Option<String>,
    /// Raw duration label from the listing block.
    pub duration: String,
    /// Detail page the episode was scraped from.
    pub link: String,
    pub enclosure: Enclosure,
}

impl EpisodeRecord {
    /// Item title: `"<title> | <category>"`, or just the title when the
    /// listing block had no category.
    pub fn display_title(&self) -> String {
        if self.category.is_empty() {
            self.title.clone()
        } else {
            format!("{} | {}", self.title, self.category)
        }
    }
}
