use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use super::{fetch_page, ArticleSource};
use crate::article::{text_or, Article, NO_DATE, NO_SUMMARY};
use crate::error::{PipelineError, PipelineResult};

/// Any RSS/Atom feed listed under `[[feeds]]` in the configuration.
pub struct RssFeedSource {
    client: Client,
    url: String,
    name: String,
}

impl RssFeedSource {
    pub fn new(client: Client, url: impl Into<String>, name: Option<String>) -> Self {
        let url = url.into();
        let name = name.unwrap_or_else(|| url.clone());
        Self { client, url, name }
    }

    pub fn parse_feed(&self, bytes: &[u8], limit: usize) -> PipelineResult<Vec<Article>> {
        let feed = parser::parse(bytes).map_err(|e| PipelineError::Source {
            feed: self.name.clone(),
            message: format!("failed to parse feed: {}", e),
        })?;
        let source = feed
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.name.clone());

        Ok(feed
            .entries
            .iter()
            .take(limit)
            .filter_map(|entry| entry_to_article(entry, &source))
            .collect())
    }
}

fn entry_to_article(entry: &Entry, source: &str) -> Option<Article> {
    let title = entry.title.as_ref().map(|t| t.content.trim().to_string())?;
    let link = entry.links.first().map(|l| l.href.clone())?;
    if title.is_empty() || link.is_empty() {
        debug!(?title, "rss: skipping entry without title or link");
        return None;
    }

    let summary_html = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();
    let summary = html2text::from_read(summary_html.as_bytes(), 1000)
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    let date = entry
        .published
        .or(entry.updated)
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| NO_DATE.to_string());

    Some(Article {
        title,
        link,
        summary: text_or(&summary, NO_SUMMARY),
        date,
        source: source.to_string(),
        engagement: String::new(),
    })
}

#[async_trait::async_trait]
impl ArticleSource for RssFeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, limit: usize) -> PipelineResult<Vec<Article>> {
        let body = fetch_page(&self.client, &self.name, &self.url).await?;
        self.parse_feed(&body, limit)
    }
}
