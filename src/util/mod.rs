//! Utility functions shared by the crawler and the feed writer.
//!
//! - **Links**: resolving scraped `href`s against the page they came from and
//!   keeping the crawl on the configured host
//! - **Selectors**: compiling CSS selectors with a readable error
//! - **Text**: normalizing scraped text and removing characters that XML 1.0
//!   cannot carry
//!
//! # Examples
//!
//! ```
//! use gadio_feed::util::{resolve_link, strip_invalid_xml_chars};
//! use url::Url;
//!
//! let page = Url::parse("https://www.gcores.com/radios?page=1").unwrap();
//! let link = resolve_link(&page, "/radios/1234").unwrap();
//! assert_eq!(link.as_str(), "https://www.gcores.com/radios/1234");
//!
//! assert_eq!(strip_invalid_xml_chars("a\u{0}b"), "ab");
//! ```

mod links;
mod selector;
mod text;

pub use links::{parse_http_url, resolve_link, same_host, LinkError};
pub use selector::parse_selector;
pub use text::{collapse_whitespace, strip_invalid_xml_chars};
