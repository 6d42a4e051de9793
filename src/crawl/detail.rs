use scraper::{Html, Selector};

use super::context::{CompletedEpisode, EpisodeContext};
use crate::util::{collapse_whitespace, parse_selector};

const AUDIO_SELECTOR: &str = "a.originalButton.originalButton-circle.ml-3";
const TITLE_SELECTOR: &str = "h1.originalPage_title";
const NARRATIVE_SELECTOR: &str = "span[data-text]";

/// Compiled selectors for episode detail pages.
#[derive(Debug)]
pub struct DetailParser {
    audio: Selector,
    title: Selector,
    narrative: Selector,
}

impl DetailParser {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            audio: parse_selector(AUDIO_SELECTOR)?,
            title: parse_selector(TITLE_SELECTOR)?,
            narrative: parse_selector(NARRATIVE_SELECTOR)?,
        })
    }

    /// Completes `context` from a detail page.
    ///
    /// The first play control and the first heading win. Every narrative
    /// span is appended to the summary in document order. Missing elements
    /// leave the field empty; the enclosure stage rejects an empty audio URL.
    pub fn parse(&self, html: &str, context: EpisodeContext) -> CompletedEpisode {
        let document = Html::parse_document(html);
        let mut episode = CompletedEpisode::new(context);

        if let Some(href) = document
            .select(&self.audio)
            .find_map(|a| a.value().attr("href"))
        {
            episode.audio_url = href.trim().to_string();
        }

        if let Some(heading) = document.select(&self.title).next() {
            episode.title = collapse_whitespace(&heading.text().collect::<String>());
        }

        for span in document.select(&self.narrative) {
            let text: String = span.text().collect();
            episode.append_summary(text.trim());
        }

        episode
    }
}
