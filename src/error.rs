//! Typed error taxonomy for the crawler core.

use thiserror::Error;

/// Errors produced by the crawler core.
///
/// `Config` and `State` are fatal: the caller should abort. The others are
/// per-URL/per-page and are recorded + dropped by the orchestrator, never
/// retried internally.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Missing or unparseable scope file, missing required seeds, etc.
    #[error("configuration error: {0}")]
    Config(String),

    /// DNS/connection/timeout failure fetching a single URL.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Body-read/decode failure for a single URL.
    #[error("decode error fetching {url}: {message}")]
    Decode { url: String, message: String },

    /// Snapshot or checkpoint (de)serialisation failure; should be impossible
    /// for well-formed state, but is not swallowed if it happens.
    #[error("state error: {0}")]
    State(String),

    /// A plugin handler faulted while processing a page.
    #[error("handler error in plugin {plugin}: {message}")]
    Handler { plugin: String, message: String },
}

pub type Result<T> = std::result::Result<T, CrawlError>;
