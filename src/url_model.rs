//! The `PageRequest` URL model: canonical parsing/serialising, domain
//! extraction, and the dotted-extension helper used by scope matching.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A request target split into its base URL, query parameters and fragment.
///
/// `params` is a `BTreeMap` rather than a `HashMap` on purpose: it keeps keys
/// in lexicographic order so [`PageRequest::to_url`] is a stable canonical
/// form regardless of the order discovered URLs' query strings were written
/// in. That canonical form is the sole identity used for dedup (`Eq`/`Hash`
/// below) and for checkpoint serialisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    pub base_url: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub anchor: String,
}

static AUTHORITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?)://([^/\s]+)").expect("static authority regex"));

impl PageRequest {
    /// Parses a URL string the same way the original splits on `?` then `#`:
    /// no percent-decoding, no scheme validation, just positional splitting.
    pub fn from_url(url: &str) -> Self {
        let (before_query, query) = match url.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (url, None),
        };

        let (base_url, anchor) = match before_query.split_once('#') {
            Some((base, anchor)) => (base.to_string(), anchor.to_string()),
            None => (before_query.to_string(), String::new()),
        };

        let mut params = BTreeMap::new();
        if let Some(query) = query {
            for token in query.split('&') {
                if token.is_empty() {
                    continue;
                }
                match token.split_once('=') {
                    Some((key, value)) => {
                        params.insert(key.to_string(), value.to_string());
                    }
                    None => {
                        params.insert(token.to_string(), String::new());
                    }
                }
            }
        }

        PageRequest {
            base_url,
            params,
            anchor,
        }
    }

    /// Canonical serialisation: `base[#anchor][?k=v&k=v...]`, params sorted
    /// by key. This is the identity used everywhere dedup matters.
    pub fn to_url(&self) -> String {
        let mut url = self.base_url.clone();

        if !self.anchor.is_empty() {
            url.push('#');
            url.push_str(&self.anchor);
        }

        if !self.params.is_empty() {
            let pairs: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }

        url
    }

    /// The dotted suffix chain of the last non-empty path segment, e.g.
    /// `"/a/b.tar.gz"` -> `".tar.gz"`. Mirrors the original's segment
    /// selection: a trailing slash falls back to the segment before it.
    pub fn extensions(&self) -> String {
        let segments: Vec<&str> = self.base_url.split('/').collect();
        let last = segments.last().copied().unwrap_or("");
        let segment = if last.is_empty() && segments.len() >= 2 {
            segments[segments.len() - 2]
        } else {
            last
        };

        let mut dotted = segment.split('.');
        dotted.next(); // the name before the first dot isn't part of the extension
        format!(".{}", dotted.collect::<Vec<_>>().join("."))
    }
}

impl PartialEq for PageRequest {
    fn eq(&self, other: &Self) -> bool {
        self.to_url() == other.to_url()
    }
}

impl Eq for PageRequest {}

impl Hash for PageRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_url().hash(state);
    }
}

/// Returns the `scheme://authority` prefix of a URL, or `None` if it doesn't
/// start with `http(s)://`.
pub fn root_url(url: &str) -> Option<String> {
    AUTHORITY_RE
        .captures(url)
        .map(|caps| format!("{}://{}", &caps[1], &caps[2]))
}

/// Returns the authority (host\[:port\]) of a URL, or an empty string if it
/// isn't an `http(s)://` URL.
pub fn extract_domain_name(url: &str) -> String {
    AUTHORITY_RE
        .captures(url)
        .map(|caps| caps[2].to_string())
        .unwrap_or_default()
}

/// Returns the scheme (everything before `://`) of a URL.
pub fn protocol_of(url: &str) -> &str {
    url.split("://").next().unwrap_or(url)
}
