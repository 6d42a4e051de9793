use anyhow::{anyhow, Result};
use scraper::Selector;

/// Compiles a CSS selector, keeping the offending text in the error.
///
/// `scraper`'s parse error borrows the input, so it is flattened into an
/// owned message here.
pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {}", css, e))
}
