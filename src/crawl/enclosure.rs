use super::context::CompletedEpisode;
use super::fetcher::Fetcher;
use super::report::SkipReason;
use crate::feed::{Enclosure, EpisodeRecord, MediaFormat};
use crate::util::parse_http_url;

/// Probes the episode's audio URL and builds its final record.
///
/// The episode is dropped when it has no audio URL, the probe fails or
/// returns a non-success status, or the response carries no usable
/// `Content-Length`. An unknown `Content-Type` is kept as
/// [`MediaFormat::Unrecognized`].
pub async fn resolve(
    fetcher: &Fetcher,
    episode: CompletedEpisode,
) -> Result<EpisodeRecord, SkipReason> {
    if episode.audio_url.is_empty() {
        return Err(SkipReason::MissingAudioUrl);
    }
    let audio_url = parse_http_url(&episode.audio_url).map_err(|e| SkipReason::InvalidAudioUrl {
        error: e.to_string(),
    })?;

    let probe = fetcher
        .probe(&audio_url)
        .await
        .map_err(|e| SkipReason::ProbeFailed {
            error: e.to_string(),
        })?;

    // Narrower than header presence alone: error statuses and zero lengths
    // are dropped too
    if !(200..300).contains(&probe.status) {
        return Err(SkipReason::HttpStatus {
            status: probe.status,
        });
    }

    let length = match probe.content_length {
        Some(length) if length > 0 => length,
        _ => return Err(SkipReason::MissingContentLength),
    };
    let format = probe
        .content_type
        .as_deref()
        .map(MediaFormat::from_content_type)
        .unwrap_or(MediaFormat::Unrecognized);

    let CompletedEpisode {
        context,
        title,
        summary,
        ..
    } = episode;

    Ok(EpisodeRecord {
        published: context.published,
        title,
        category: context.category,
        summary,
        cover: context.cover,
        duration: context.duration,
        link: context.detail_url.to_string(),
        enclosure: Enclosure {
            url: audio_url.to_string(),
            length,
            format,
        },
    })
}
