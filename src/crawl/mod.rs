//! Two-stage catalog crawl.
//!
//! - [`listing`] - Catalog page extraction and the page range
//! - [`detail`] - Detail page extraction into a [`CompletedEpisode`]
//! - [`enclosure`] - HEAD probe of the audio file
//! - [`fetcher`] - HTTP engine with URL dedup, timeouts and the response cache
//! - [`pipeline`] - Task scheduling, the join barrier and the run report
//!
//! # Example
//!
//! ```ignore
//! use gadio_feed::crawl::{run, PageRange};
//!
//! let output = run(&config.crawl, PageRange::new(1, 2)?, Utc::now()).await?;
//! for episode in &output.episodes {
//!     println!("{} {}", episode.published, episode.display_title());
//! }
//! ```

pub mod cache;
pub mod context;
pub mod detail;
pub mod enclosure;
pub mod fetcher;
pub mod listing;
pub mod pipeline;
pub mod politeness;
pub mod report;
pub mod tracker;

pub use cache::ResponseCache;
pub use context::{CompletedEpisode, EpisodeContext, SUMMARY_SEPARATOR};
pub use fetcher::{FetchError, Fetcher, ProbeResponse};
pub use listing::{PageRange, RangeError, SitePatterns};
pub use pipeline::{run, PipelineError, RunOutput};
pub use politeness::{PolitePermit, Politeness};
pub use report::{RunReport, SkipEvent, SkipReason};
pub use tracker::{InFlight, Stage, Ticket};
