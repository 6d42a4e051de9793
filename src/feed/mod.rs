//! Podcast feed assembly.
//!
//! - [`aggregator`] - Concurrency-safe, newest-first collection of resolved episodes
//! - [`writer`] - RSS 2.0 + iTunes namespace serialization and atomic file output
//! - [`channel`] - Validated channel metadata
//! - [`duration`] / [`media`] - Field conversions for `<itunes:duration>` and `<enclosure>`
//!
//! # Example
//!
//! ```ignore
//! use gadio_feed::feed::{render_feed, write_feed, Channel};
//!
//! let channel = Channel::from_config(&config.channel)?;
//! let xml = render_feed(&channel, &episodes, run_start)?;
//! write_feed(&config.output.feed_path, &xml)?;
//! ```

pub mod aggregator;
pub mod channel;
pub mod duration;
mod episode;
pub mod media;
pub mod writer;

pub use aggregator::{sort_key, AggregatorError, OrderedAggregator};
pub use channel::{Channel, ChannelError};
pub use duration::{parse_duration, EpisodeDuration, DEFAULT_DURATION_SECS};
pub use episode::{Enclosure, EpisodeRecord};
pub use media::MediaFormat;
pub use writer::{escape_text, render_feed, write_feed};
