//! Candidate article sources.
//!
//! Each upstream feed is one [`ArticleSource`]. [`NewsAggregator`] queries them in turn,
//! absorbs per-feed failures, and ranks the merged list with [`merge_and_rank`].

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Selector};
use tracing::{info, warn};
use url::Url;

use crate::article::{truncate_summary, Article};
use crate::error::{PipelineError, PipelineResult};

pub mod ainews;
pub mod futuretools;
pub mod newscientist;
pub mod physorg;
pub mod rss;

pub use ainews::AiNewsSource;
pub use futuretools::FutureToolsSource;
pub use newscientist::NewScientistSource;
pub use physorg::PhysOrgSource;
pub use rss::RssFeedSource;

/// Some publishers reject non-browser agents outright.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch at most `limit` articles. Failures are reported as `PipelineError::Source`.
    async fn fetch(&self, limit: usize) -> PipelineResult<Vec<Article>>;
}

/// Build the HTTP client shared by the feed extractors.
pub fn http_client(timeout_secs: u64) -> PipelineResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| PipelineError::Source {
            feed: "http".to_string(),
            message: format!("failed to build reqwest client: {}", e),
        })
}

/// GET a page body, retrying server errors and rate limiting with exponential backoff.
/// Other client errors are treated as permanent.
pub async fn fetch_page(client: &Client, feed: &str, url: &str) -> PipelineResult<Vec<u8>> {
    let source_err = |message: String| PipelineError::Source {
        feed: feed.to_string(),
        message,
    };

    let max_retries = 3;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        if attempt > 1 {
            let backoff = Duration::from_secs(2u64.pow(attempt - 2)); // 1s, 2s
            info!("Retrying fetch for {} (attempt {}/{}) after {:?}...", url, attempt, max_retries, backoff);
            tokio::time::sleep(backoff).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|e| source_err(format!("failed to read response body: {}", e)))?;
                    return Ok(bytes.to_vec());
                } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(format!("retryable status: {}", status));
                } else {
                    return Err(source_err(format!("fetch failed with status: {}", status)));
                }
            }
            Err(e) => {
                last_error = Some(format!("network error during fetch: {}", e));
            }
        }
    }

    Err(source_err(last_error.unwrap_or_else(|| "unknown error after retries".to_string())))
}

/// Filter invalid entries, truncate summaries, drop repeated titles, then stable-sort
/// by engagement score (highest first). Equal scores keep feed order.
pub fn merge_and_rank(articles: Vec<Article>, summary_max_chars: usize) -> Vec<Article> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<Article> = articles
        .into_iter()
        .filter(Article::is_valid)
        .filter(|a| seen.insert(a.title.clone()))
        .map(|mut a| {
            a.summary = truncate_summary(&a.summary, summary_max_chars);
            a
        })
        .collect();
    ranked.sort_by_key(|a| std::cmp::Reverse(a.engagement_score()));
    ranked
}

/// Queries every configured source and produces the ranked candidate list for a run.
pub struct NewsAggregator {
    sources: Vec<Box<dyn ArticleSource>>,
    per_feed_limit: usize,
    feed_delay: Duration,
    summary_max_chars: usize,
}

impl NewsAggregator {
    pub fn new(sources: Vec<Box<dyn ArticleSource>>, cfg: &common::PipelineConfig) -> Self {
        Self {
            sources,
            per_feed_limit: cfg.per_feed_limit,
            feed_delay: Duration::from_secs(cfg.feed_delay_seconds),
            summary_max_chars: cfg.summary_max_chars,
        }
    }

    /// The four built-in publishers plus any `[[feeds]]` entries.
    pub fn from_config(cfg: &common::Config) -> PipelineResult<Self> {
        let client = http_client(cfg.pipeline.fetch_timeout_seconds)?;
        let mut sources: Vec<Box<dyn ArticleSource>> = vec![
            Box::new(PhysOrgSource::new(client.clone())),
            Box::new(AiNewsSource::new(client.clone())),
            Box::new(FutureToolsSource::new(client.clone())),
            Box::new(NewScientistSource::new(client.clone())),
        ];
        for feed in &cfg.feeds {
            sources.push(Box::new(RssFeedSource::new(
                client.clone(),
                feed.url.clone(),
                feed.name.clone(),
            )));
        }
        Ok(Self::new(sources, &cfg.pipeline))
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Query sources one after another. A failing source contributes nothing.
    pub async fn fetch(&self) -> Vec<Article> {
        let mut all = Vec::new();
        for (idx, source) in self.sources.iter().enumerate() {
            if idx > 0 && !self.feed_delay.is_zero() {
                tokio::time::sleep(self.feed_delay).await;
            }
            info!(source = source.name(), "sources: extracting");
            match source.fetch(self.per_feed_limit).await {
                Ok(mut articles) => {
                    articles.truncate(self.per_feed_limit);
                    info!(source = source.name(), count = articles.len(), "sources: extracted");
                    all.extend(articles);
                }
                Err(e) => warn!(source = source.name(), error = %e, "sources: feed failed, skipping"),
            }
        }
        merge_and_rank(all, self.summary_max_chars)
    }
}

// Small DOM helpers shared by the HTML extractors.

pub(crate) fn selector(feed: &str, css: &str) -> PipelineResult<Selector> {
    Selector::parse(css).map_err(|e| PipelineError::Source {
        feed: feed.to_string(),
        message: format!("invalid selector '{}': {:?}", css, e),
    })
}

/// Text content with runs of whitespace collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

pub(crate) fn first_text(scope: ElementRef<'_>, sel: &Selector) -> String {
    scope.select(sel).next().map(element_text).unwrap_or_default()
}

pub(crate) fn resolve_link(base: &Url, href: Option<&str>) -> Option<String> {
    let href = href?.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// "High" when the lowercase title contains any of `keywords`, else "Medium".
pub(crate) fn keyword_label(title: &str, keywords: &[&str]) -> String {
    let lower = title.to_lowercase();
    if keywords.iter().any(|k| lower.contains(k)) {
        "High".to_string()
    } else {
        "Medium".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedSource {
        name: &'static str,
        result: Result<Vec<Article>, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ArticleSource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _limit: usize) -> PipelineResult<Vec<Article>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(|m| PipelineError::Source {
                feed: self.name.to_string(),
                message: m.to_string(),
            })
        }
    }

    fn cfg() -> common::PipelineConfig {
        common::PipelineConfig {
            feed_delay_seconds: 0,
            ..Default::default()
        }
    }

    #[test]
    fn ranking_is_stable_and_drops_invalid() {
        let articles = vec![
            Article::new("Gardening tips", "https://a/1"),
            Article::new("", "https://a/2"),
            Article::new("New quantum chip", "https://a/3"),
            Article::new("Cooking update", "https://a/4"),
            Article::new("Knitting patterns", "https://a/5"),
            Article::new("No link", ""),
        ];
        let ranked = merge_and_rank(articles, 300);
        let titles: Vec<_> = ranked.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["New quantum chip", "Cooking update", "Gardening tips", "Knitting patterns"]);
    }

    #[test]
    fn ranking_truncates_summaries_and_dedups_titles() {
        let articles = vec![
            Article::new("Same", "https://a/1").with_summary("s".repeat(400)),
            Article::new("Same", "https://b/1"),
        ];
        let ranked = merge_and_rank(articles, 300);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].link, "https://a/1");
        assert_eq!(ranked[0].summary.chars().count(), 303);
    }

    #[tokio::test]
    async fn failing_feed_contributes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sources: Vec<Box<dyn ArticleSource>> = vec![
            Box::new(FixedSource {
                name: "broken",
                result: Err("503"),
                calls: calls.clone(),
            }),
            Box::new(FixedSource {
                name: "ok",
                result: Ok(vec![Article::new("AI", "https://ok/1")]),
                calls: calls.clone(),
            }),
        ];
        let aggregator = NewsAggregator::new(sources, &cfg());
        let articles = aggregator.fetch().await;
        assert_eq!(articles.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn per_feed_limit_is_enforced() {
        let many = (0..30)
            .map(|i| Article::new(format!("t{}", i), format!("https://x/{}", i)))
            .collect();
        let sources: Vec<Box<dyn ArticleSource>> = vec![Box::new(FixedSource {
            name: "chatty",
            result: Ok(many),
            calls: Arc::new(AtomicUsize::new(0)),
        })];
        let aggregator = NewsAggregator::new(sources, &cfg());
        assert_eq!(aggregator.fetch().await.len(), 20);
    }

    #[test]
    fn labels_and_links() {
        assert_eq!(keyword_label("A New Tool", &["tool"]), "High");
        assert_eq!(keyword_label("Gardening", &["tool"]), "Medium");

        let base = Url::parse("https://phys.org/physics-news/").unwrap();
        assert_eq!(
            resolve_link(&base, Some("/news/2024-qubit.html")).as_deref(),
            Some("https://phys.org/news/2024-qubit.html")
        );
        assert_eq!(resolve_link(&base, Some("  ")), None);
    }
}
