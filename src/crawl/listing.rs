//! Catalog page extraction.
//!
//! A catalog page holds repeated episode blocks plus pagination anchors.
//! [`ListingParser::parse`] turns one page into the partial
//! [`EpisodeContext`]s it lists and the page numbers it links to. Scheduling
//! and range filtering are left to the pipeline.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use super::context::EpisodeContext;
use crate::util::{collapse_whitespace, parse_selector, resolve_link, same_host};

const BLOCK_SELECTOR: &str = "div.col-xl-3.col-md-4.col-sm-6";
const CREATED_DATE_CLASS: &str = "original_createdDate";
const IMAGE_AREA_CLASS: &str = "original_imgArea";
const DURATION_CLASS: &str = "original_imgArea_info";
const CATEGORY_CLASS: &str = "original_category";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("Starting page must be at least 1, got {0}")]
    StartBelowOne(u32),
    #[error("Ending page {end} is before starting page {start}")]
    EndBeforeStart { start: u32, end: u32 },
}

/// Inclusive bound on the catalog pages a run may visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Result<Self, RangeError> {
        if start < 1 {
            return Err(RangeError::StartBelowOne(start));
        }
        if end < start {
            return Err(RangeError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("Invalid link pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// URL shapes of one catalog site: `/<path>?page=N` listings and
/// `/<path>/<id>` detail pages, both restricted to the base host.
#[derive(Debug, Clone)]
pub struct SitePatterns {
    base: Url,
    listing_path: String,
    page: Regex,
    detail: Regex,
}

impl SitePatterns {
    pub fn new(base_url: &str, listing_path: &str) -> Result<Self, PatternError> {
        let base = Url::parse(base_url)?;
        let path = listing_path.trim_matches('/');
        let escaped = regex::escape(path);
        Ok(Self {
            base,
            listing_path: path.to_string(),
            page: Regex::new(&format!(r"/{escaped}\?page=(\d+)$"))?,
            detail: Regex::new(&format!(r"/{escaped}/\d+$"))?,
        })
    }

    /// Absolute URL of catalog page `number`.
    pub fn page_url(&self, number: u32) -> Result<Url, url::ParseError> {
        self.base
            .join(&format!("{}?page={}", self.listing_path, number))
    }

    /// Page number of a catalog URL on the base host, if `url` is one.
    pub fn page_number(&self, url: &Url) -> Option<u32> {
        if !same_host(&self.base, url) {
            return None;
        }
        self.page
            .captures(url.as_str())
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn is_detail(&self, url: &Url) -> bool {
        same_host(&self.base, url) && self.detail.is_match(url.as_str())
    }
}

/// A pagination anchor found on a catalog page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: u32,
    pub url: Url,
}

/// Everything extracted from one catalog page.
#[derive(Debug, Default)]
pub struct ListingPage {
    /// One entry per episode block that links to a detail page, in
    /// document order.
    pub episodes: Vec<EpisodeContext>,
    /// Every pagination anchor, in document order. Not range-filtered.
    pub pages: Vec<PageLink>,
}

/// Compiled selectors for catalog pages.
#[derive(Debug)]
pub struct ListingParser {
    block: Selector,
    labeled: Selector,
    anchor: Selector,
    link: Selector,
    cover: Regex,
}

impl ListingParser {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            block: parse_selector(BLOCK_SELECTOR)?,
            labeled: parse_selector("[class]")?,
            anchor: parse_selector("a")?,
            link: parse_selector("a[href]")?,
            cover: Regex::new(r#"(?i)https?://[^\s'"()]+?\.(?:jpe?g|png|gif|webp)"#)?,
        })
    }

    /// Extracts episode blocks and pagination links from a catalog page.
    ///
    /// Label extraction never fails: a missing or malformed label leaves
    /// the field at its [`EpisodeContext::new`] default. Blocks with no
    /// detail link on the site are skipped.
    pub fn parse(
        &self,
        html: &str,
        page_url: &Url,
        patterns: &SitePatterns,
        run_start: DateTime<Utc>,
    ) -> ListingPage {
        let document = Html::parse_document(html);
        let mut listing = ListingPage::default();

        for block in document.select(&self.block) {
            let Some(detail_url) = self.detail_link(block, page_url, patterns) else {
                tracing::debug!(page = %page_url, "Episode block without detail link");
                continue;
            };
            let mut context = EpisodeContext::new(detail_url, run_start);
            self.fill_labels(block, &mut context);
            listing.episodes.push(context);
        }

        for anchor in document.select(&self.link) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Ok(url) = resolve_link(page_url, href) else {
                continue;
            };
            if let Some(number) = patterns.page_number(&url) {
                listing.pages.push(PageLink { number, url });
            }
        }

        listing
    }

    fn detail_link(&self, block: ElementRef<'_>, page_url: &Url, patterns: &SitePatterns) -> Option<Url> {
        block
            .select(&self.link)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_link(page_url, href).ok())
            .find(|url| patterns.is_detail(url))
    }

    fn fill_labels(&self, block: ElementRef<'_>, context: &mut EpisodeContext) {
        for element in block.select(&self.labeled) {
            for class in element.value().classes() {
                match class {
                    CREATED_DATE_CLASS => {
                        if let Some(published) = parse_created_date(&text_of(element)) {
                            context.published = published;
                        }
                    }
                    IMAGE_AREA_CLASS => {
                        if let Some(style) = element.value().attr("style") {
                            if let Some(found) = self.cover.find(style) {
                                context.cover = Some(found.as_str().to_string());
                            }
                        }
                    }
                    DURATION_CLASS => context.duration = text_of(element),
                    CATEGORY_CLASS => {
                        if let Some(link) = element.select(&self.anchor).next() {
                            context.category = text_of(link);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Parses a `YYYY-MM-DD` label as midnight UTC.
fn parse_created_date(text: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}
