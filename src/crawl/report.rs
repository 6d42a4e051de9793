use serde::Serialize;

use super::tracker::Stage;

/// Why an episode or page was left out of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    ListingFetchFailed { error: String },
    DetailFetchFailed { error: String },
    MissingAudioUrl,
    InvalidAudioUrl { error: String },
    ProbeFailed { error: String },
    HttpStatus { status: u16 },
    MissingContentLength,
    AggregatorClosed,
}

/// One dropped page or episode, with the stage that dropped it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipEvent {
    pub stage: Stage,
    pub url: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Summary of one crawl, written as JSON with `--report`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub pages_fetched: usize,
    pub episodes_discovered: usize,
    pub episodes_published: usize,
    pub skipped: Vec<SkipEvent>,
    /// The run deadline expired before every task finished.
    pub timed_out: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_flat_skip_events() {
        let report = RunReport {
            pages_fetched: 2,
            episodes_discovered: 3,
            episodes_published: 2,
            skipped: vec![SkipEvent {
                stage: Stage::Detail,
                url: "https://www.gcores.com/radios/3".to_string(),
                reason: SkipReason::HttpStatus { status: 404 },
            }],
            timed_out: false,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["pages_fetched"], 2);
        assert_eq!(json["skipped"][0]["stage"], "detail");
        assert_eq!(json["skipped"][0]["kind"], "http_status");
        assert_eq!(json["skipped"][0]["status"], 404);
        assert_eq!(json["timed_out"], false);
    }
}
