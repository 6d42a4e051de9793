use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use super::context::EpisodeContext;
use super::detail::DetailParser;
use super::enclosure;
use super::fetcher::{FetchError, Fetcher};
use super::listing::{ListingParser, PageRange, PatternError, SitePatterns};
use super::report::{RunReport, SkipEvent, SkipReason};
use super::tracker::{InFlight, Stage, Ticket};
use crate::config::CrawlConfig;
use crate::feed::{sort_key, EpisodeRecord, OrderedAggregator};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid site configuration: {0}")]
    InvalidSite(#[from] PatternError),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] FetchError),
    #[error("Crawler setup failed: {0}")]
    Setup(String),
    #[error("Failed to fetch first catalog page {url}: {source}")]
    FirstPage {
        url: String,
        #[source]
        source: FetchError,
    },
}

/// Result of a crawl: the episodes in feed order plus diagnostics.
#[derive(Debug)]
pub struct RunOutput {
    pub episodes: Vec<EpisodeRecord>,
    pub report: RunReport,
}

#[derive(Debug)]
enum Diagnostic {
    PageFetched,
    EpisodeDiscovered,
    Skipped(SkipEvent),
}

/// Per-run state shared by every spawned fetch task.
struct Crawler {
    fetcher: Fetcher,
    patterns: SitePatterns,
    listing: ListingParser,
    detail: DetailParser,
    range: PageRange,
    run_start: DateTime<Utc>,
    aggregator: OrderedAggregator,
    in_flight: Arc<InFlight>,
    diagnostics: mpsc::UnboundedSender<Diagnostic>,
}

/// Crawls catalog pages `range` and returns every resolved episode,
/// newest first.
///
/// Only a failure to fetch the first catalog page aborts the run. Later
/// page, detail and enclosure failures drop the affected page or episode
/// and are recorded in [`RunReport::skipped`]. If the run deadline expires
/// before all tasks finish, the episodes collected so far are returned and
/// [`RunReport::timed_out`] is set.
pub async fn run(
    config: &CrawlConfig,
    range: PageRange,
    run_start: DateTime<Utc>,
) -> Result<RunOutput, PipelineError> {
    let patterns = SitePatterns::new(&config.base_url, &config.listing_path)?;
    let first = patterns
        .page_url(range.start())
        .map_err(PatternError::from)?;
    let (diagnostics, mut events) = mpsc::unbounded_channel();

    let crawler = Arc::new(Crawler {
        fetcher: Fetcher::new(config)?,
        patterns,
        listing: ListingParser::new().map_err(|e| PipelineError::Setup(e.to_string()))?,
        detail: DetailParser::new().map_err(|e| PipelineError::Setup(e.to_string()))?,
        range,
        run_start,
        aggregator: OrderedAggregator::new(),
        in_flight: InFlight::new(),
        diagnostics,
    });

    tracing::info!(
        start = range.start(),
        end = range.end(),
        url = %first,
        "Starting crawl"
    );

    crawler.fetcher.claim(&first);
    let ticket = crawler.in_flight.ticket(Stage::Listing);
    let body = crawler
        .fetcher
        .get_text(&first)
        .await
        .map_err(|source| PipelineError::FirstPage {
            url: first.to_string(),
            source,
        })?;
    crawler.walk(&first, &body);
    drop(ticket);

    let run_timeout = config.run_timeout();
    let timed_out = tokio::time::timeout(run_timeout, crawler.in_flight.wait_idle())
        .await
        .is_err();
    if timed_out {
        tracing::warn!(
            timeout = ?run_timeout,
            listing = crawler.in_flight.pending(Stage::Listing),
            detail = crawler.in_flight.pending(Stage::Detail),
            "Run deadline expired, assembling feed from episodes collected so far"
        );
    }

    let episodes = crawler.aggregator.drain();

    let mut report = RunReport {
        episodes_published: episodes.len(),
        timed_out,
        ..RunReport::default()
    };
    while let Ok(event) = events.try_recv() {
        match event {
            Diagnostic::PageFetched => report.pages_fetched += 1,
            Diagnostic::EpisodeDiscovered => report.episodes_discovered += 1,
            Diagnostic::Skipped(skip) => report.skipped.push(skip),
        }
    }

    tracing::info!(
        pages = report.pages_fetched,
        discovered = report.episodes_discovered,
        published = report.episodes_published,
        skipped = report.skipped.len(),
        "Crawl finished"
    );

    Ok(RunOutput { episodes, report })
}

impl Crawler {
    /// Extracts a fetched catalog page and schedules its episodes and any
    /// in-range pages. Called while the page's own ticket is still held.
    fn walk(self: &Arc<Self>, url: &Url, body: &str) {
        let page = self
            .listing
            .parse(body, url, &self.patterns, self.run_start);
        self.emit(Diagnostic::PageFetched);
        tracing::info!(
            page = %url,
            episodes = page.episodes.len(),
            links = page.pages.len(),
            "Walked catalog page"
        );

        for context in page.episodes {
            self.schedule_detail(context);
        }
        for link in page.pages {
            if self.range.contains(link.number) {
                self.schedule_page(link.url);
            }
        }
    }

    fn schedule_page(self: &Arc<Self>, url: Url) {
        if !self.fetcher.claim(&url) {
            return;
        }
        let ticket = self.in_flight.ticket(Stage::Listing);
        let crawler = Arc::clone(self);
        tokio::spawn(async move {
            let _ticket = ticket;
            match crawler.fetcher.get_text(&url).await {
                Ok(body) => crawler.walk(&url, &body),
                Err(e) => {
                    tracing::warn!(page = %url, error = %e, "Failed to fetch catalog page");
                    crawler.skip(
                        Stage::Listing,
                        &url,
                        SkipReason::ListingFetchFailed {
                            error: e.to_string(),
                        },
                    );
                }
            }
        });
    }

    fn schedule_detail(self: &Arc<Self>, context: EpisodeContext) {
        if !self.fetcher.claim(&context.detail_url) {
            tracing::debug!(url = %context.detail_url, "Detail page already scheduled");
            return;
        }
        self.emit(Diagnostic::EpisodeDiscovered);
        let ticket = self.in_flight.ticket(Stage::Detail);
        let crawler = Arc::clone(self);
        tokio::spawn(crawler.process_detail(context, ticket));
    }

    async fn process_detail(self: Arc<Self>, context: EpisodeContext, _ticket: Ticket) {
        let url = context.detail_url.clone();
        let body = match self.fetcher.get_text(&url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to fetch detail page");
                self.skip(
                    Stage::Detail,
                    &url,
                    SkipReason::DetailFetchFailed {
                        error: e.to_string(),
                    },
                );
                return;
            }
        };

        let episode = self.detail.parse(&body, context);
        let record = match enclosure::resolve(&self.fetcher, episode).await {
            Ok(record) => record,
            Err(reason) => {
                tracing::debug!(url = %url, reason = ?reason, "Dropping episode");
                self.skip(Stage::Detail, &url, reason);
                return;
            }
        };

        let published = record.published;
        let title = record.display_title();
        match self.aggregator.insert(sort_key(published), record) {
            Ok(()) => tracing::info!(%published, title = %title, "Collected episode"),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Episode finished after feed assembly");
                self.skip(Stage::Detail, &url, SkipReason::AggregatorClosed);
            }
        }
    }

    fn skip(&self, stage: Stage, url: &Url, reason: SkipReason) {
        self.emit(Diagnostic::Skipped(SkipEvent {
            stage,
            url: url.to_string(),
            reason,
        }));
    }

    fn emit(&self, diagnostic: Diagnostic) {
        // The receiver is gone once the run has returned
        let _ = self.diagnostics.send(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> CrawlConfig {
        CrawlConfig {
            base_url: format!("{}/", server.uri()),
            delay_ms: 0,
            random_delay_ms: 0,
            request_timeout_secs: 5,
            run_timeout_secs: 30,
            cache_dir: None,
            ..CrawlConfig::default()
        }
    }

    #[tokio::test]
    async fn test_first_page_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = run(&config(&server), PageRange::new(1, 2).unwrap(), Utc::now()).await;
        match result {
            Err(PipelineError::FirstPage { source, .. }) => {
                assert!(matches!(source, FetchError::HttpStatus(503)));
            }
            other => panic!("Expected FirstPage error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_later_page_failure_is_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/radios"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<a href="/radios?page=2">next</a>"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/radios"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let output = run(&config(&server), PageRange::new(1, 2).unwrap(), Utc::now())
            .await
            .unwrap();
        assert!(output.episodes.is_empty());
        assert_eq!(output.report.pages_fetched, 1);
        assert_eq!(output.report.skipped.len(), 1);
        assert_eq!(output.report.skipped[0].stage, Stage::Listing);
        assert!(matches!(
            output.report.skipped[0].reason,
            SkipReason::ListingFetchFailed { .. }
        ));
        assert!(!output.report.timed_out);
    }

    #[tokio::test]
    async fn test_run_deadline_returns_partial_output() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/radios"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="col-xl-3 col-md-4 col-sm-6"><a href="/radios/7">ep</a></div>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/radios/7"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(4)))
            .mount(&server)
            .await;

        let config = CrawlConfig {
            run_timeout_secs: 1,
            ..config(&server)
        };
        let output = run(&config, PageRange::new(1, 1).unwrap(), Utc::now())
            .await
            .unwrap();
        assert!(output.report.timed_out);
        assert!(output.episodes.is_empty());
        assert_eq!(output.report.episodes_discovered, 1);
    }
}
