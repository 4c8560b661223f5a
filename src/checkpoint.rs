//! Checkpoint persistence for [`CrawlerData`]: plain file I/O plus
//! `serde_json`, with no implicit scheduling. The caller decides when to
//! save and when a finished crawl's checkpoint can be removed.

use std::path::Path;

use crate::error::CrawlError;
use crate::state::CrawlerData;

/// Serialises `data` as JSON and writes it to `path`.
pub fn save_checkpoint(data: &CrawlerData, path: impl AsRef<Path>) -> Result<(), CrawlError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(data)
        .map_err(|err| CrawlError::State(format!("failed to serialise checkpoint: {err}")))?;

    std::fs::write(path, json).map_err(|err| {
        CrawlError::State(format!(
            "failed to write checkpoint file {}: {err}",
            path.display()
        ))
    })
}

/// Reads and deserialises a checkpoint file written by [`save_checkpoint`].
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<CrawlerData, CrawlError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|err| {
        CrawlError::State(format!(
            "failed to read checkpoint file {}: {err}",
            path.display()
        ))
    })?;

    serde_json::from_str(&contents)
        .map_err(|err| CrawlError::State(format!("failed to parse checkpoint: {err}")))
}
