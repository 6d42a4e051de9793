use std::fmt;

/// Duration reported for episodes whose listing block carries no duration
/// label (1:22:18, the running time of a typical show).
pub const DEFAULT_DURATION_SECS: u64 = 3600 + 22 * 60 + 18;

/// Value written to `<itunes:duration>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeDuration {
    /// Total running time in seconds.
    Seconds(u64),
    /// Label text that is not a clock value, passed through verbatim.
    Raw(String),
}

impl fmt::Display for EpisodeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeDuration::Seconds(secs) => write!(f, "{secs}"),
            EpisodeDuration::Raw(text) => f.write_str(text),
        }
    }
}

/// Parses the duration label scraped from a listing block.
///
/// - empty or whitespace-only → [`DEFAULT_DURATION_SECS`]
/// - `H:MM:SS` → `H*3600 + MM*60 + SS`
/// - `MM:SS` → `MM*60 + SS`
/// - `SS` → `SS`
/// - anything else → [`EpisodeDuration::Raw`] with the trimmed text
///
/// # Examples
///
/// ```
/// use gadio_feed::feed::{parse_duration, EpisodeDuration};
///
/// assert_eq!(parse_duration("1:02:03"), EpisodeDuration::Seconds(3723));
/// assert_eq!(parse_duration(""), EpisodeDuration::Seconds(4938));
/// ```
pub fn parse_duration(text: &str) -> EpisodeDuration {
    let text = text.trim();
    if text.is_empty() {
        return EpisodeDuration::Seconds(DEFAULT_DURATION_SECS);
    }

    let fields: Option<Vec<u64>> = text
        .split(':')
        .map(|part| {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse::<u64>().ok()
        })
        .collect();

    let secs = match fields.as_deref() {
        Some([h, m, s]) => h
            .checked_mul(3600)
            .and_then(|h| h.checked_add(m.checked_mul(60)?))
            .and_then(|hm| hm.checked_add(*s)),
        Some([m, s]) => m.checked_mul(60).and_then(|m| m.checked_add(*s)),
        Some([s]) => Some(*s),
        _ => None,
    };

    match secs {
        Some(secs) => EpisodeDuration::Seconds(secs),
        None => EpisodeDuration::Raw(text.to_string()),
    }
}
