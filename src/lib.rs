pub mod config;
pub mod crawl;
pub mod feed;
pub mod util;
