//! The crawl orchestrator: worker-pool main loop, cancellation and the rate
//! limiter wiring. This is the sole mutator of [`CrawlerData`]; workers are
//! pure fetchers that never touch it directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tracing::{instrument, warn};

use crate::error::CrawlError;
use crate::extract::RobotsHarvest;
use crate::fetch::{fetch_page, fetch_robots};
use crate::plugin::{run_handlers_for_domain, PluginSource};
use crate::policy::Policy;
use crate::rate::RateLimiter;
use crate::scope::{CompiledScope, Scope};
use crate::state::{CrawlerData, FetchedIndex, PageResult};
use crate::url_model::{extract_domain_name, root_url, PageRequest};

/// Default user agent, used when no `headers_provider` is supplied.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64; rv:47.0) Gecko/20100101 Firefox/47.3";

type HeadersProvider = Arc<dyn Fn(&PageRequest) -> HeaderMap + Send + Sync>;

/// Crawl configuration.
#[derive(Clone)]
pub struct Options {
    pub max_workers: usize,
    pub policy: Policy,
    pub save_cookies: bool,
    /// `None` means no per-request timeout, matching the source's zero-value
    /// default client timeout.
    pub timeout: Option<Duration>,
    pub headers_provider: Option<HeadersProvider>,
    /// `<= 0` means unlimited.
    pub request_rate: i64,
    pub fetch_robots: bool,
    pub plugin_source: Option<Arc<dyn PluginSource>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_workers: 10,
            policy: Policy::Aggressive,
            save_cookies: false,
            timeout: None,
            headers_provider: None,
            request_rate: -1,
            fetch_robots: false,
            plugin_source: None,
        }
    }
}

fn default_headers(_req: &PageRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

/// Builder for [`Crawler`], a fluent config-then-builder shape.
pub struct CrawlerBuilder {
    scope: Scope,
    options: Options,
}

impl Default for CrawlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlerBuilder {
    pub fn new() -> Self {
        Self {
            scope: Scope::default(),
            options: Options::default(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.options.max_workers = max_workers;
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.options.policy = policy;
        self
    }

    pub fn with_save_cookies(mut self, save_cookies: bool) -> Self {
        self.options.save_cookies = save_cookies;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn with_headers_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&PageRequest) -> HeaderMap + Send + Sync + 'static,
    {
        self.options.headers_provider = Some(Arc::new(provider));
        self
    }

    pub fn with_request_rate(mut self, request_rate: i64) -> Self {
        self.options.request_rate = request_rate;
        self
    }

    pub fn with_fetch_robots(mut self, fetch_robots: bool) -> Self {
        self.options.fetch_robots = fetch_robots;
        self
    }

    pub fn with_plugin_source(mut self, source: Arc<dyn PluginSource>) -> Self {
        self.options.plugin_source = Some(source);
        self
    }

    pub fn build(self) -> Result<Crawler, CrawlError> {
        Crawler::new(self.scope, self.options)
    }
}

struct WorkerOutcome {
    result: PageResult,
    attachments: HashMap<String, String>,
}

/// The worker-pool crawler. Owns [`CrawlerData`] exclusively for the
/// duration of a crawl.
pub struct Crawler {
    scope: CompiledScope,
    options: Options,
    client: Client,
    data: CrawlerData,
    done: bool,
    on_url_found: Option<mpsc::Sender<Vec<PageRequest>>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Crawler {
    pub fn new(scope: Scope, options: Options) -> Result<Self, CrawlError> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if options.save_cookies {
            builder = builder.cookie_store(true);
        }

        let client = builder
            .build()
            .map_err(|err| CrawlError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            scope: scope.compile(),
            options,
            client,
            data: CrawlerData::new(),
            done: false,
            on_url_found: None,
            cancel: None,
        })
    }

    /// Registers a sink that receives the URLs newly admitted to the queue
    /// after each round. If unset, discoveries are silently enqueued.
    pub fn on_url_found(&mut self, sender: mpsc::Sender<Vec<PageRequest>>) {
        self.on_url_found = Some(sender);
    }

    /// Registers a single-shot cancel signal, observed non-blockingly before
    /// each dispatch.
    pub fn on_cancel(&mut self, receiver: watch::Receiver<bool>) {
        self.cancel = Some(receiver);
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Returns a copy of the current state, valid for checkpointing even
    /// after a cancelled crawl.
    pub fn get_data(&self) -> CrawlerData {
        self.data.clone()
    }

    /// Adopts a deserialised checkpoint, then crawls with no new seeds.
    pub async fn resume_scan(&mut self, data: CrawlerData) {
        self.data = data;
        self.crawl(Vec::new()).await;
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Enqueues `seed_urls` and runs the worker-pool main loop to
    /// completion or cancellation.
    #[instrument(skip(self, seed_urls), fields(seeds = seed_urls.len()))]
    pub async fn crawl(&mut self, seed_urls: Vec<String>) {
        for seed in seed_urls {
            let req = PageRequest::from_url(&seed);
            if !self.data.urls_to_fetch.iter().any(|q| q.to_url() == req.to_url()) {
                self.data.urls_to_fetch.push(req);
            }
        }

        self.done = false;
        let rate_limiter = Arc::new(RateLimiter::new(self.options.request_rate));
        let max_workers = self.options.max_workers.max(1);
        let (result_tx, mut result_rx) = mpsc::channel::<Option<WorkerOutcome>>(max_workers);
        let mut in_flight: usize = 0;

        while !self.data.urls_to_fetch.is_empty() || in_flight > 0 {
            // Isolates workers from mutation: a fresh immutable snapshot is
            // taken once per round.
            let snapshot: Arc<FetchedIndex> = Arc::new(self.data.fetched.clone());
            let mut dispatched_this_round = 0usize;

            while in_flight < max_workers {
                rate_limiter.wait_until_ready().await;

                if self.is_cancelled() {
                    self.done = false;
                    return;
                }

                let Some(req) = self.data.pop_url_to_fetch() else {
                    break;
                };

                in_flight += 1;
                dispatched_this_round += 1;
                rate_limiter.increment().await;

                self.spawn_worker(req, Arc::clone(&snapshot), result_tx.clone());
            }

            for _ in 0..dispatched_this_round {
                let Some(outcome) = result_rx.recv().await else {
                    break;
                };
                in_flight -= 1;
                self.handle_outcome(outcome).await;
            }
        }

        self.done = true;
    }

    fn spawn_worker(
        &self,
        req: PageRequest,
        snapshot: Arc<FetchedIndex>,
        tx: mpsc::Sender<Option<WorkerOutcome>>,
    ) {
        let client = self.client.clone();
        let scope = self.scope.clone();
        let headers_provider = self.options.headers_provider.clone();
        let plugin_source = self.options.plugin_source.clone();

        tokio::spawn(async move {
            let headers = Some(match &headers_provider {
                Some(provider) => provider(&req),
                None => default_headers(&req),
            });

            let outcome = match fetch_page(&client, req, &scope, headers).await {
                Ok((result, body)) => {
                    let attachments = match &plugin_source {
                        Some(source) => {
                            let domain = extract_domain_name(&result.url.base_url);
                            let entry = snapshot
                                .get(&domain)
                                .and_then(|domain_results| domain_results.get(&result.url.base_url))
                                .cloned()
                                .unwrap_or_default();
                            run_handlers_for_domain(source.as_ref(), &domain, &body, &result, &entry)
                        }
                        None => HashMap::new(),
                    };
                    Some(WorkerOutcome { result, attachments })
                }
                Err(err) => {
                    warn!(error = %err, "fetch failed, dropping url");
                    None
                }
            };

            let _ = tx.send(outcome).await;
        });
    }

    async fn handle_outcome(&mut self, outcome: Option<WorkerOutcome>) {
        let Some(WorkerOutcome {
            mut result,
            attachments,
        }) = outcome
        else {
            return;
        };

        let domain = extract_domain_name(&result.url.base_url);
        let base_url = result.url.base_url.clone();

        if self.options.fetch_robots && !self.data.is_domain_present(&domain) {
            if let Some(root) = root_url(&result.url.base_url) {
                match fetch_robots(&self.client, &root).await {
                    Ok(harvest) => self.apply_robots_harvest(&mut result, &domain, &base_url, harvest),
                    Err(err) => warn!(error = %err, domain = %domain, "failed to fetch robots.txt"),
                }
            }
        }

        self.data.add_fetched_url(result.clone());

        if !attachments.is_empty() {
            let attachments: IndexMap<String, String> = attachments.into_iter().collect();
            self.data.merge_attachments(&domain, &base_url, attachments);
        }

        if result.found_urls.is_empty() {
            return;
        }

        let added = self
            .data
            .add_urls_to_fetch(result.found_urls, &self.options.policy, &self.scope);

        if added.is_empty() {
            return;
        }

        if let Some(sender) = &self.on_url_found {
            let _ = sender.send(added).await;
        }
    }

    fn apply_robots_harvest(
        &mut self,
        result: &mut PageResult,
        domain: &str,
        base_url: &str,
        harvest: RobotsHarvest,
    ) {
        result.found_urls.extend(harvest.candidates);
        if let Some(delay) = harvest.crawl_delay {
            let mut extra = IndexMap::new();
            extra.insert("robots.crawl_delay".to_string(), delay.to_string());
            self.data.merge_attachments(domain, base_url, extra);
        }
    }
}
