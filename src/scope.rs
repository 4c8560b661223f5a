//! Regex-based scope matching and its on-disk representation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::PageResult;
use crate::url_model::PageRequest;

/// Serialisable include/exclude pattern set, as loaded from a scope file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegexScope {
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl RegexScope {
    /// Compiles patterns, skipping (and logging) any that fail to parse
    /// rather than treating a single bad pattern as fatal.
    pub fn compile(&self) -> CompiledRegexScope {
        CompiledRegexScope {
            includes: compile_all(&self.includes),
            excludes: compile_all(&self.excludes),
        }
    }
}

fn compile_all(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "skipping invalid scope regex");
                None
            }
        })
        .collect()
}

/// Compiled form of [`RegexScope`] used at match time.
#[derive(Debug, Clone, Default)]
pub struct CompiledRegexScope {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl CompiledRegexScope {
    /// Empty string never matches; an empty `includes` set means
    /// include-all; excludes always win over includes.
    pub fn matches(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }

        let included = self.includes.is_empty() || self.includes.iter().any(|re| re.is_match(value));
        if !included {
            return false;
        }

        !self.excludes.iter().any(|re| re.is_match(value))
    }
}

/// The serialisable scope document, as loaded from a scope file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub urls: Option<RegexScope>,
    #[serde(default, rename = "content-type")]
    pub content_types: Option<RegexScope>,
    #[serde(default)]
    pub extensions: Option<RegexScope>,
}

impl Scope {
    pub fn compile(&self) -> CompiledScope {
        CompiledScope {
            urls: self.urls.as_ref().map(RegexScope::compile),
            content_types: self.content_types.as_ref().map(RegexScope::compile),
            extensions: self.extensions.as_ref().map(RegexScope::compile),
        }
    }
}

/// Compiled form of [`Scope`], held by the orchestrator for the crawl's
/// lifetime so regexes are compiled exactly once.
#[derive(Debug, Clone, Default)]
pub struct CompiledScope {
    urls: Option<CompiledRegexScope>,
    content_types: Option<CompiledRegexScope>,
    extensions: Option<CompiledRegexScope>,
}

impl CompiledScope {
    pub fn url_in_scope(&self, req: &PageRequest) -> bool {
        if let Some(urls) = &self.urls {
            if !urls.matches(&req.base_url) {
                return false;
            }
        }

        if let Some(extensions) = &self.extensions {
            if !extensions.matches(&req.extensions()) {
                return false;
            }
        }

        true
    }

    pub fn page_in_scope(&self, result: &PageResult) -> bool {
        if !self.url_in_scope(&result.url) {
            return false;
        }

        if let Some(content_types) = &self.content_types {
            return content_types.matches(result.content_type().unwrap_or_default());
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_includes_means_include_all() {
        let scope = RegexScope::default().compile();
        assert!(scope.matches("anything"));
    }

    #[test]
    fn empty_value_never_matches() {
        let scope = RegexScope {
            includes: vec![".*".into()],
            excludes: vec![],
        }
        .compile();
        assert!(!scope.matches(""));
    }

    #[test]
    fn exclude_wins_over_include() {
        let scope = RegexScope {
            includes: vec!["^https?://host/".into()],
            excludes: vec!["/admin".into()],
        }
        .compile();
        assert!(scope.matches("http://host/public"));
        assert!(!scope.matches("http://host/admin"));
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let scope = RegexScope {
            includes: vec!["[unterminated".into(), "host".into()],
            excludes: vec![],
        }
        .compile();
        assert!(scope.matches("host"));
    }

    #[test]
    fn url_in_scope_checks_urls_and_extensions() {
        let scope = Scope {
            urls: Some(RegexScope {
                includes: vec!["^https?://host/".into()],
                excludes: vec![],
            }),
            content_types: None,
            extensions: Some(RegexScope {
                includes: vec![],
                excludes: vec![r"\.exe$".into()],
            }),
        }
        .compile();

        assert!(scope.url_in_scope(&PageRequest::from_url("http://host/a.html")));
        assert!(!scope.url_in_scope(&PageRequest::from_url("http://host/a.exe")));
        assert!(!scope.url_in_scope(&PageRequest::from_url("http://other/a.html")));
    }
}
