use chrono::{DateTime, Utc};
use url::Url;

/// Separator placed between narrative text blocks of a detail page.
pub const SUMMARY_SEPARATOR: &str = "\r\n";

/// Partial episode metadata scraped from a catalog block.
///
/// Created once per episode block and moved into the task that fetches the
/// episode's detail page; never shared between tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeContext {
    /// Parsed creation date, or the run start time when the block had no
    /// parseable date.
    pub published: DateTime<Utc>,
    /// First image URL found in the image area's inline style.
    pub cover: Option<String>,
    /// Duration label text, verbatim. Empty when the block had none.
    pub duration: String,
    /// Text of the category label's first link. Empty when absent.
    pub category: String,
    /// Detail page the episode links to.
    pub detail_url: Url,
}

impl EpisodeContext {
    pub fn new(detail_url: Url, run_start: DateTime<Utc>) -> Self {
        Self {
            published: run_start,
            cover: None,
            duration: String::new(),
            category: String::new(),
            detail_url,
        }
    }
}

/// Episode context after its detail page has been extracted.
///
/// Only obtainable from a consumed [`EpisodeContext`], so detail fields can
/// never be read before the detail stage has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedEpisode {
    pub context: EpisodeContext,
    /// Href of the play/download control. Empty when the page had none.
    pub audio_url: String,
    pub title: String,
    /// Narrative blocks in document order, joined by [`SUMMARY_SEPARATOR`].
    pub summary: String,
    summary_blocks: usize,
}

impl CompletedEpisode {
    pub fn new(context: EpisodeContext) -> Self {
        Self {
            context,
            audio_url: String::new(),
            title: String::new(),
            summary: String::new(),
            summary_blocks: 0,
        }
    }

    /// Extends the summary with another narrative block.
    ///
    /// Every block takes a slot, so an empty block still contributes a
    /// separator.
    pub fn append_summary(&mut self, text: &str) {
        if self.summary_blocks > 0 {
            self.summary.push_str(SUMMARY_SEPARATOR);
        }
        self.summary.push_str(text);
        self.summary_blocks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn detail_url() -> Url {
        Url::parse("https://www.gcores.com/radios/1").unwrap()
    }

    #[test]
    fn test_defaults() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let ctx = EpisodeContext::new(detail_url(), start);
        assert_eq!(ctx.published, start);
        assert!(ctx.cover.is_none());
        assert!(ctx.duration.is_empty());
        assert!(ctx.category.is_empty());

        let done = CompletedEpisode::new(ctx.clone());
        assert_eq!(done.context, ctx);
        assert!(done.audio_url.is_empty());
        assert!(done.title.is_empty());
        assert!(done.summary.is_empty());
    }

    #[test]
    fn test_append_summary_joins_in_order() {
        let mut done = CompletedEpisode::new(EpisodeContext::new(detail_url(), Utc::now()));
        done.append_summary("first");
        done.append_summary("second");
        done.append_summary("third");
        assert_eq!(done.summary, "first\r\nsecond\r\nthird");
    }

    #[test]
    fn test_append_summary_leading_empty_block() {
        let mut done = CompletedEpisode::new(EpisodeContext::new(detail_url(), Utc::now()));
        done.append_summary("");
        done.append_summary("a");
        assert_eq!(done.summary, "\r\na");
    }
}
