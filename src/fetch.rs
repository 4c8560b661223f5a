//! The HTTP fetcher: issues one request and turns the response into a
//! [`PageResult`] plus its raw body.

use indexmap::IndexMap;
use reqwest::{Client, Request};
use tracing::{instrument, warn};

use crate::error::CrawlError;
use crate::extract::{extract_urls_from_html, harvest_robots, should_extract_links, RobotsHarvest};
use crate::scope::CompiledScope;
use crate::state::{Headers, PageResult};
use crate::url_model::PageRequest;

/// Fetches `req`, returning the resulting [`PageResult`] and the raw body.
/// The body is returned (not consumed by the core) so plugin handlers can
/// inspect it.
///
/// Transport and decode failures are returned as a [`CrawlError`]; the
/// caller drops the URL rather than retrying.
#[instrument(skip(client, scope), fields(url = %req.to_url()))]
pub async fn fetch_page(
    client: &Client,
    req: PageRequest,
    scope: &CompiledScope,
    headers: Option<reqwest::header::HeaderMap>,
) -> Result<(PageResult, Vec<u8>), CrawlError> {
    let url = req.to_url();

    let mut builder = client.get(&url);
    if let Some(headers) = headers {
        builder = builder.headers(headers);
    }

    let request: Request = builder.build().map_err(|source| CrawlError::Transport {
        url: url.clone(),
        source,
    })?;

    let response = client
        .execute(request)
        .await
        .map_err(|source| CrawlError::Transport {
            url: url.clone(),
            source,
        })?;

    let status_code = response.status().as_u16();
    let response_headers = collect_headers(response.headers());
    let reported_length = response.content_length();

    let body = response
        .bytes()
        .await
        .map_err(|err| CrawlError::Decode {
            url: url.clone(),
            message: err.to_string(),
        })?
        .to_vec();

    let content_length = match reported_length {
        Some(len) => len as i64,
        None => body.len() as i64,
    };

    let mut result = PageResult {
        url: req,
        status_code,
        content_length,
        headers: response_headers,
        found_urls: Vec::new(),
    };

    let content_type = result.content_type().map(str::to_string);
    if should_extract_links(content_type.as_deref()) {
        match std::str::from_utf8(&body) {
            Ok(text) => {
                let candidates = extract_urls_from_html(text, &result.url.base_url);
                result.found_urls = candidates
                    .into_iter()
                    .filter(|candidate| scope.url_in_scope(candidate))
                    .collect();
            }
            Err(err) => {
                warn!(url = %url, error = %err, "body is not valid utf-8, skipping link extraction");
            }
        }
    }

    Ok((result, body))
}

/// Fetches `root_url`'s `robots.txt` and harvests it. A missing or
/// unreachable `robots.txt` is a transport error like any other fetch; the
/// orchestrator treats it as "nothing harvested" rather than fatal.
#[instrument(skip(client))]
pub async fn fetch_robots(client: &Client, root_url: &str) -> Result<RobotsHarvest, CrawlError> {
    let url = format!("{root_url}/robots.txt");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|source| CrawlError::Transport {
            url: url.clone(),
            source,
        })?;

    let body = response.text().await.map_err(|err| CrawlError::Decode {
        url: url.clone(),
        message: err.to_string(),
    })?;

    Ok(harvest_robots(&body, root_url))
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> Headers {
    let mut collected: Headers = IndexMap::new();
    for (name, value) in headers.iter() {
        let value = value.to_str().unwrap_or_default().to_string();
        collected
            .entry(name.as_str().to_string())
            .or_insert_with(Vec::new)
            .push(value);
    }
    collected
}
