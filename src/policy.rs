//! The `ShouldAdd` revisit policies: a closed variant set of three built-ins
//! plus an open `Custom` predicate, modelled as a tagged enum rather than
//! trait-object subclassing.

use std::fmt;
use std::sync::Arc;

use crate::state::CrawlerData;
use crate::url_model::{extract_domain_name, PageRequest};

/// A discovered base-url is only worth re-queueing after this many prior
/// fetches have shown no variation in content length (used by `Moderate`).
pub const VALIDITY_COUNT: usize = 3;

/// A revisit policy decides whether a newly discovered in-scope URL should
/// be queued, given the fetch history recorded so far.
#[derive(Clone)]
pub enum Policy {
    /// Enqueue unless this exact URL has already been fetched.
    Aggressive,
    /// Enqueue only if repeated fetches under the base-url show the content
    /// length actually varies.
    Moderate,
    /// Enqueue only if the URL's domain has never been touched.
    Light,
    /// A user-supplied predicate with the same signature as the built-ins.
    Custom(Arc<dyn Fn(&PageRequest, &CrawlerData) -> bool + Send + Sync>),
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Aggressive => write!(f, "Policy::Aggressive"),
            Policy::Moderate => write!(f, "Policy::Moderate"),
            Policy::Light => write!(f, "Policy::Light"),
            Policy::Custom(_) => write!(f, "Policy::Custom(..)"),
        }
    }
}

impl Policy {
    pub fn should_add(&self, found_url: &PageRequest, data: &CrawlerData) -> bool {
        match self {
            Policy::Aggressive => aggressive(found_url, data),
            Policy::Moderate => moderate(found_url, data),
            Policy::Light => light(found_url, data),
            Policy::Custom(predicate) => predicate(found_url, data),
        }
    }
}

fn bucket<'a>(
    found_url: &PageRequest,
    data: &'a CrawlerData,
) -> (String, Option<&'a crate::state::DomainResultEntry>) {
    let domain = extract_domain_name(&found_url.base_url);
    let entry = data
        .fetched
        .get(&domain)
        .and_then(|domain_results| domain_results.get(&found_url.base_url));
    (domain, entry)
}

fn aggressive(found_url: &PageRequest, data: &CrawlerData) -> bool {
    let (_, entry) = bucket(found_url, data);
    let Some(entry) = entry else {
        return true;
    };

    let canonical = found_url.to_url();
    !entry
        .page_results
        .iter()
        .any(|result| result.url.to_url() == canonical)
}

fn light(found_url: &PageRequest, data: &CrawlerData) -> bool {
    let domain = extract_domain_name(&found_url.base_url);
    !data.fetched.contains_key(&domain)
}

fn moderate(found_url: &PageRequest, data: &CrawlerData) -> bool {
    let (_, entry) = bucket(found_url, data);
    let Some(entry) = entry else {
        return true;
    };

    if entry.page_results.len() <= VALIDITY_COUNT {
        return false;
    }

    let first_length = entry.page_results[0].content_length;
    entry.page_results[1..]
        .iter()
        .any(|result| result.content_length != first_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PageResult;
    use indexmap::IndexMap;

    fn page(url: &str, content_length: i64) -> PageResult {
        PageResult {
            url: PageRequest::from_url(url),
            status_code: 200,
            content_length,
            headers: IndexMap::new(),
            found_urls: vec![],
        }
    }

    #[test]
    fn aggressive_allows_unseen_url() {
        let data = CrawlerData::new();
        assert!(Policy::Aggressive.should_add(&PageRequest::from_url("http://h/x"), &data));
    }

    #[test]
    fn aggressive_rejects_already_fetched_exact_url() {
        let mut data = CrawlerData::new();
        data.add_fetched_url(page("http://h/x", 10));
        assert!(!Policy::Aggressive.should_add(&PageRequest::from_url("http://h/x"), &data));
        assert!(Policy::Aggressive.should_add(&PageRequest::from_url("http://h/y"), &data));
    }

    #[test]
    fn light_rejects_any_url_on_a_touched_domain() {
        let mut data = CrawlerData::new();
        data.add_fetched_url(page("http://h/x", 10));
        assert!(!Policy::Light.should_add(&PageRequest::from_url("http://h/other"), &data));
        assert!(Policy::Light.should_add(&PageRequest::from_url("http://other-host/x"), &data));
    }

    #[test]
    fn moderate_suppresses_same_size_reruns() {
        let mut data = CrawlerData::new();
        for i in 0..4 {
            data.add_fetched_url(page(&format!("http://h/x?k={i}"), 100));
        }
        assert!(!Policy::Moderate.should_add(&PageRequest::from_url("http://h/x?k=5"), &data));
    }

    #[test]
    fn moderate_admits_once_variation_is_observed() {
        let mut data = CrawlerData::new();
        for (i, len) in [100, 100, 100, 250].into_iter().enumerate() {
            data.add_fetched_url(page(&format!("http://h/x?k={i}"), len));
        }
        assert!(Policy::Moderate.should_add(&PageRequest::from_url("http://h/x?k=5"), &data));
    }

    #[test]
    fn moderate_admits_below_validity_count() {
        let mut data = CrawlerData::new();
        data.add_fetched_url(page("http://h/x", 100));
        assert!(!Policy::Moderate.should_add(&PageRequest::from_url("http://h/x"), &data));
    }

    #[test]
    fn custom_policy_invokes_predicate() {
        let policy = Policy::Custom(Arc::new(|req: &PageRequest, _: &CrawlerData| {
            req.base_url.ends_with(".html")
        }));
        let data = CrawlerData::new();
        assert!(policy.should_add(&PageRequest::from_url("http://h/x.html"), &data));
        assert!(!policy.should_add(&PageRequest::from_url("http://h/x.png"), &data));
    }
}
