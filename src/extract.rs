//! Regex-based link harvesting from response bodies, and the `robots.txt`
//! line harvester.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::url_model::{protocol_of, root_url, PageRequest};

/// MIME prefixes response bodies must match for link extraction to run.
pub const INCLUDED_MIME_PREFIXES: &[&str] = &[
    "text",
    "application/xml",
    "application/x-httpd-php",
    "application/x-sh",
    "application/json",
];

/// Character class excluding whitespace, both quote characters, `<`, `>`,
/// `\` and `*` — the allowed path-character set for harvested link paths.
const PCHAR: &str = r#"[^\s'"<>\\*]"#;

static ABSOLUTE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"https?://[^/\s]+(?:/{PCHAR}*)+")).expect("static absolute-url regex")
});

static QUOTED_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#""(?:/{PCHAR}*)+""#)).expect("static quoted-path regex")
});

static CRAWL_DELAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)crawl-delay:\s*(\d+)").expect("static crawl-delay regex"));

/// True if link extraction should run against a response with this
/// `Content-Type` (already stripped at `;`).
pub fn should_extract_links(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    INCLUDED_MIME_PREFIXES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
}

/// Harvests absolute URLs and quoted path literals from `body`, resolving
/// quoted paths against `referring_url`. Candidates are HTML-entity
/// unescaped and deduplicated in arrival order.
pub fn extract_urls_from_html(body: &str, referring_url: &str) -> Vec<PageRequest> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for candidate in ABSOLUTE_URL_RE.find_iter(body) {
        push_unique(&mut found, &mut seen, candidate.as_str());
    }

    let root = root_url(referring_url);
    let protocol = protocol_of(referring_url);

    for quoted in QUOTED_PATH_RE.find_iter(body) {
        let raw = quoted.as_str();
        if raw.len() <= 2 {
            continue;
        }
        let location = &raw[1..raw.len() - 1];
        if location.is_empty() {
            continue;
        }

        let resolved = if location.starts_with("//") {
            format!("{protocol}:{location}")
        } else if let Some(root) = &root {
            format!("{root}{location}")
        } else {
            continue;
        };

        push_unique(&mut found, &mut seen, &resolved);
    }

    found
}

fn push_unique(found: &mut Vec<PageRequest>, seen: &mut HashSet<String>, candidate: &str) {
    let unescaped = html_escape::decode_html_entities(candidate);
    let req = PageRequest::from_url(&unescaped);
    if seen.insert(req.to_url()) {
        found.push(req);
    }
}

/// The outcome of harvesting a `robots.txt` body: candidate URLs built from
/// `Allow`/`Disallow` paths, plus an optional `Crawl-delay` in seconds. The
/// core records the delay as an attachment but never enforces it itself;
/// full `robots.txt` compliance is out of scope for this crate.
#[derive(Debug, Clone, Default)]
pub struct RobotsHarvest {
    pub candidates: Vec<PageRequest>,
    pub crawl_delay: Option<u64>,
}

/// Parses a `robots.txt` body into candidate paths and an optional
/// crawl-delay.
pub fn harvest_robots(body: &str, root_url: &str) -> RobotsHarvest {
    let mut candidates = Vec::new();

    for line in body.lines() {
        let path = if let Some(rest) = line.strip_prefix("Disallow:") {
            rest
        } else if let Some(rest) = line.strip_prefix("Allow:") {
            rest
        } else {
            continue;
        };

        if path.contains('*') {
            continue;
        }

        let path = path.replace(' ', "");
        candidates.push(PageRequest::from_url(&format!("{root_url}{path}")));
    }

    let crawl_delay = CRAWL_DELAY_RE
        .captures(body)
        .and_then(|caps| caps[1].parse::<u64>().ok());

    RobotsHarvest {
        candidates,
        crawl_delay,
    }
}
