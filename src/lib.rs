//! `crawlspan` is a concurrent, scope-aware web crawler core.
//!
//! A [`Crawler`] drives a pool of asynchronous fetch workers over a queue of
//! [`PageRequest`]s, keeping every visited page and its discovered links in
//! a [`CrawlerData`] that can be checkpointed and resumed. Which discovered
//! links are worth re-queueing is decided by a [`Policy`]; which URLs are
//! worth fetching at all is decided by a [`Scope`]. Both are data, not code:
//! callers configure a crawl by building these values rather than
//! subclassing anything.
//!
//! The crate deliberately stops at the crawling core. A command-line
//! front-end, a `robots.txt`-compliant scheduler, and a plugin registry that
//! loads [`PageHandler`]s from configuration all belong in a downstream
//! binary; this crate only defines the traits they plug into.

mod checkpoint;
mod config;
mod error;
mod extract;
mod fetch;
mod orchestrator;
mod plugin;
mod policy;
mod rate;
mod scope;
mod state;
mod url_model;

pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use config::load_scope;
pub use error::{CrawlError, Result};
pub use extract::{extract_urls_from_html, harvest_robots, should_extract_links, RobotsHarvest};
pub use fetch::{fetch_page, fetch_robots};
pub use orchestrator::{Crawler, CrawlerBuilder, Options};
pub use plugin::{run_handler, run_handlers_for_domain, PageHandler, PluginSource};
pub use policy::{Policy, VALIDITY_COUNT};
pub use rate::RateLimiter;
pub use scope::{CompiledScope, RegexScope, Scope};
pub use state::{CrawlerData, DomainResultEntry, DomainResults, FetchedIndex, Headers, PageResult};
pub use url_model::{extract_domain_name, protocol_of, root_url, PageRequest};
