//! Persistent crawl state: the pending queue, the fetched index, and the
//! operations that keep both consistent.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::policy::Policy;
use crate::scope::CompiledScope;
use crate::url_model::{extract_domain_name, PageRequest};

/// Response headers as an ordered multimap, as the checkpoint format needs.
pub type Headers = IndexMap<String, Vec<String>>;

/// The result of fetching one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub url: PageRequest,
    pub status_code: u16,
    pub content_length: i64,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub found_urls: Vec<PageRequest>,
}

impl PageResult {
    /// The first `Content-Type` header, stripped at `;`. Header lookup is
    /// case-insensitive to match real HTTP semantics.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, values)| values.first())
            .map(|value| value.split(';').next().unwrap_or(value).trim())
    }
}

/// Per base-url fetch history plus any plugin-contributed attachments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainResultEntry {
    #[serde(rename = "results", default)]
    pub page_results: Vec<PageResult>,
    #[serde(rename = "attachements", default)]
    pub attachments: IndexMap<String, String>,
}

/// `base_url -> entry`, within one domain.
pub type DomainResults = IndexMap<String, DomainResultEntry>;

/// `domain -> base_url -> entry`.
pub type FetchedIndex = IndexMap<String, DomainResults>;

/// The full crawl state: pending queue plus fetched index. Owned exclusively
/// by the orchestrator during a crawl; serialisable as a checkpoint at any
/// quiescent point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlerData {
    #[serde(default)]
    pub urls_to_fetch: Vec<PageRequest>,
    #[serde(rename = "fetched_urls", default)]
    pub fetched: FetchedIndex,
}

impl CrawlerData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_domain_present(&self, domain: &str) -> bool {
        self.fetched.contains_key(domain)
    }

    /// LIFO pop from the tail, biasing traversal depth-first.
    pub fn pop_url_to_fetch(&mut self) -> Option<PageRequest> {
        self.urls_to_fetch.pop()
    }

    /// Enqueues `req` iff it is in scope, the policy admits it, and it is
    /// not already present (by canonical form) in the queue.
    pub fn add_url_to_fetch(&mut self, req: PageRequest, policy: &Policy, scope: &CompiledScope) -> bool {
        if !scope.url_in_scope(&req) || !policy.should_add(&req, self) {
            return false;
        }

        let canonical = req.to_url();
        if self
            .urls_to_fetch
            .iter()
            .any(|queued| queued.to_url() == canonical)
        {
            return false;
        }

        self.urls_to_fetch.push(req);
        true
    }

    /// Returns the subset of `reqs` actually appended, preserving order.
    pub fn add_urls_to_fetch(
        &mut self,
        reqs: Vec<PageRequest>,
        policy: &Policy,
        scope: &CompiledScope,
    ) -> Vec<PageRequest> {
        reqs.into_iter()
            .filter(|req| self.add_url_to_fetch(req.clone(), policy, scope))
            .collect()
    }

    /// Records a fetched page under its domain/base-url bucket, ignoring a
    /// duplicate of an already-recorded canonical URL.
    pub fn add_fetched_url(&mut self, result: PageResult) {
        let domain = extract_domain_name(&result.url.base_url);
        let base_url = result.url.base_url.clone();
        let canonical = result.url.to_url();

        let entry = self
            .fetched
            .entry(domain)
            .or_insert_with(DomainResults::default)
            .entry(base_url)
            .or_insert_with(DomainResultEntry::default);

        if entry
            .page_results
            .iter()
            .any(|existing| existing.url.to_url() == canonical)
        {
            return;
        }

        entry.page_results.push(result);
    }

    /// Additively merges plugin-contributed attachments into a bucket.
    pub fn merge_attachments(
        &mut self,
        domain: &str,
        base_url: &str,
        attachments: IndexMap<String, String>,
    ) {
        if attachments.is_empty() {
            return;
        }

        let entry = self
            .fetched
            .entry(domain.to_string())
            .or_insert_with(DomainResults::default)
            .entry(base_url.to_string())
            .or_insert_with(DomainResultEntry::default);

        entry.attachments.extend(attachments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn unrestricted_scope() -> CompiledScope {
        Scope::default().compile()
    }

    fn page(url: &str, content_length: i64) -> PageResult {
        PageResult {
            url: PageRequest::from_url(url),
            status_code: 200,
            content_length,
            headers: Headers::new(),
            found_urls: vec![],
        }
    }

    #[test]
    fn add_url_to_fetch_rejects_duplicates() {
        let mut data = CrawlerData::new();
        let scope = unrestricted_scope();
        assert!(data.add_url_to_fetch(PageRequest::from_url("http://a/b"), &Policy::Aggressive, &scope));
        assert!(!data.add_url_to_fetch(PageRequest::from_url("http://a/b"), &Policy::Aggressive, &scope));
        assert_eq!(data.urls_to_fetch.len(), 1);
    }

    #[test]
    fn add_urls_to_fetch_preserves_order_of_admitted() {
        let mut data = CrawlerData::new();
        let scope = unrestricted_scope();
        let added = data.add_urls_to_fetch(
            vec![
                PageRequest::from_url("http://a/1"),
                PageRequest::from_url("http://a/2"),
                PageRequest::from_url("http://a/1"),
            ],
            &Policy::Aggressive,
            &scope,
        );
        assert_eq!(
            added.iter().map(|r| r.to_url()).collect::<Vec<_>>(),
            vec!["http://a/1", "http://a/2"]
        );
    }

    #[test]
    fn pop_url_to_fetch_is_lifo() {
        let mut data = CrawlerData::new();
        let scope = unrestricted_scope();
        data.add_url_to_fetch(PageRequest::from_url("http://a/1"), &Policy::Aggressive, &scope);
        data.add_url_to_fetch(PageRequest::from_url("http://a/2"), &Policy::Aggressive, &scope);
        assert_eq!(data.pop_url_to_fetch().unwrap().to_url(), "http://a/2");
        assert_eq!(data.pop_url_to_fetch().unwrap().to_url(), "http://a/1");
        assert!(data.pop_url_to_fetch().is_none());
    }

    #[test]
    fn add_fetched_url_dedups_by_canonical_form() {
        let mut data = CrawlerData::new();
        data.add_fetched_url(page("http://a/b", 10));
        data.add_fetched_url(page("http://a/b", 99));
        let entry = &data.fetched["a"]["http://a/b"];
        assert_eq!(entry.page_results.len(), 1);
        assert_eq!(entry.page_results[0].content_length, 10);
    }

    #[test]
    fn merge_attachments_is_additive() {
        let mut data = CrawlerData::new();
        data.add_fetched_url(page("http://a/b", 10));
        let mut first = IndexMap::new();
        first.insert("plugin.k1".to_string(), "v1".to_string());
        data.merge_attachments("a", "http://a/b", first);

        let mut second = IndexMap::new();
        second.insert("plugin.k2".to_string(), "v2".to_string());
        data.merge_attachments("a", "http://a/b", second);

        let entry = &data.fetched["a"]["http://a/b"];
        assert_eq!(entry.attachments.get("plugin.k1").unwrap(), "v1");
        assert_eq!(entry.attachments.get("plugin.k2").unwrap(), "v2");
    }

    #[test]
    fn checkpoint_round_trips_through_json() {
        let mut data = CrawlerData::new();
        data.add_url_to_fetch(PageRequest::from_url("http://a/b"), &Policy::Aggressive, &unrestricted_scope());
        data.add_fetched_url(page("http://a/c", 5));

        let json = serde_json::to_string(&data).unwrap();
        let restored: CrawlerData = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.urls_to_fetch.len(), 1);
        assert_eq!(restored.fetched["a"]["http://a/c"].page_results[0].content_length, 5);
    }
}
