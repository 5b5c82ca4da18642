//! Scrapes a WordPress category listing and publishes its newest posts as an
//! RSS 2.0 feed, remembering which posts were already processed.

pub mod config;
pub mod feed;
pub mod job;
pub mod scrape;
pub mod storage;
pub mod util;

pub use config::Config;
pub use job::{run, run_once, RunError, RunSummary};
