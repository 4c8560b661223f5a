//! The plugin boundary the core consumes but never implements.
//!
//! The per-domain handler registry, its YAML-backed configuration store, and
//! the executable loader that materialises handlers from disk all live
//! outside this crate. The core only needs a lookup from domain to a list of
//! handlers, and a way to invoke each handler without letting a faulty one
//! take the whole worker down with it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::state::{DomainResultEntry, PageResult};

/// One post-processing callback, namespaced by `name()` when its output is
/// merged into a page's attachments.
pub trait PageHandler: Send + Sync {
    /// The plugin's name; used as the attachment key prefix
    /// (`"<name>.<key>"`).
    fn name(&self) -> &str;

    /// Inspects the fetched page and returns attachment key/value pairs.
    /// Implementations are expected to be total; a handler that panics loses
    /// only its own page (see [`run_handler`]).
    fn handle(
        &self,
        body: &[u8],
        result: &PageResult,
        entry: &DomainResultEntry,
    ) -> HashMap<String, String>;
}

/// Supplies the handlers that should run for a given domain. Implemented
/// outside the core (e.g. by a YAML-backed plugin registry); the core only
/// consumes `&dyn PluginSource`.
pub trait PluginSource: Send + Sync {
    fn plugins_for_domain(&self, domain: &str) -> Vec<Arc<dyn PageHandler>>;
}

/// Runs one handler, namespacing its output keys. A handler that panics is
/// caught here (the Rust analogue of "a throwing handler terminates the
/// enclosing worker") and reported as `None` so the caller can treat this
/// page as a worker-level fault, rather than unwinding the whole worker
/// task.
pub fn run_handler(
    handler: &Arc<dyn PageHandler>,
    body: &[u8],
    result: &PageResult,
    entry: &DomainResultEntry,
) -> Option<HashMap<String, String>> {
    let name = handler.name().to_string();
    let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(body, result, entry)));

    match outcome {
        Ok(attachments) => Some(
            attachments
                .into_iter()
                .map(|(key, value)| (format!("{name}.{key}"), value))
                .collect(),
        ),
        Err(_) => {
            warn!(plugin = %name, url = %result.url.to_url(), "plugin handler panicked, dropping page attachments");
            None
        }
    }
}

/// Runs every handler registered for `domain` against one page, merging
/// their namespaced outputs. A handler panic loses only its own attachments,
/// not the whole page, so this always returns a map (possibly empty). It
/// returns an owned map rather than mutating `entry` in place, avoiding a
/// rewrite-keys-while-iterating bug.
pub fn run_handlers_for_domain(
    source: &dyn PluginSource,
    domain: &str,
    body: &[u8],
    result: &PageResult,
    entry: &DomainResultEntry,
) -> HashMap<String, String> {
    let mut merged = HashMap::new();
    for handler in source.plugins_for_domain(domain) {
        if let Some(attachments) = run_handler(&handler, body, result, entry) {
            merged.extend(attachments);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_model::PageRequest;
    use indexmap::IndexMap;

    struct Echo;
    impl PageHandler for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn handle(&self, _body: &[u8], result: &PageResult, _entry: &DomainResultEntry) -> HashMap<String, String> {
            let mut map = HashMap::new();
            map.insert("status".to_string(), result.status_code.to_string());
            map
        }
    }

    struct Panicker;
    impl PageHandler for Panicker {
        fn name(&self) -> &str {
            "boom"
        }

        fn handle(&self, _body: &[u8], _result: &PageResult, _entry: &DomainResultEntry) -> HashMap<String, String> {
            panic!("plugin exploded");
        }
    }

    fn sample_result() -> PageResult {
        PageResult {
            url: PageRequest::from_url("http://h/x"),
            status_code: 200,
            content_length: 0,
            headers: IndexMap::new(),
            found_urls: vec![],
        }
    }

    #[test]
    fn namespaces_handler_output() {
        let handler: Arc<dyn PageHandler> = Arc::new(Echo);
        let result = sample_result();
        let entry = DomainResultEntry::default();
        let attachments = run_handler(&handler, b"", &result, &entry).unwrap();
        assert_eq!(attachments.get("echo.status"), Some(&"200".to_string()));
    }

    #[test]
    fn panicking_handler_drops_its_own_attachments_only() {
        let handler: Arc<dyn PageHandler> = Arc::new(Panicker);
        let result = sample_result();
        let entry = DomainResultEntry::default();
        assert!(run_handler(&handler, b"", &result, &entry).is_none());
    }

    #[test]
    fn merges_multiple_handlers_by_namespace() {
        struct Source;
        impl PluginSource for Source {
            fn plugins_for_domain(&self, _domain: &str) -> Vec<Arc<dyn PageHandler>> {
                vec![Arc::new(Echo), Arc::new(Panicker)]
            }
        }

        let result = sample_result();
        let entry = DomainResultEntry::default();
        let merged = run_handlers_for_domain(&Source, "h", b"", &result, &entry);
        assert_eq!(merged.get("echo.status"), Some(&"200".to_string()));
        assert!(!merged.contains_key("boom.status"));
    }
}
