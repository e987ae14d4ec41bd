use reqwest::Client;
use scraper::Html;
use url::Url;

use super::{element_text, fetch_page, first_text, resolve_link, selector, ArticleSource};
use crate::article::{text_or, Article, NO_DATE, NO_SUMMARY};
use crate::error::{PipelineError, PipelineResult};

const NAME: &str = "Phys.org - Quantum Physics";
const URL: &str = "https://phys.org/physics-news/quantum-physics/";

/// Phys.org quantum physics listing. Engagement is the page's view counter.
pub struct PhysOrgSource {
    client: Client,
    url: String,
}

impl PhysOrgSource {
    pub fn new(client: Client) -> Self {
        Self::with_url(client, URL)
    }

    pub fn with_url(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

pub fn parse_listing(html: &str, base: &Url, limit: usize) -> PipelineResult<Vec<Article>> {
    let doc = Html::parse_document(html);
    let cards = selector(NAME, "article.sorted-article")?;
    let heading = selector(NAME, "h3, h2")?;
    let anchor = selector(NAME, "a")?;
    let summary_sel = selector(NAME, "p.sorted-article__summary, p")?;
    let date_sel = selector(NAME, "time, span.sorted-article__date")?;
    let views_sel = selector(NAME, "span.sorted-article__views")?;

    let mut articles = Vec::new();
    for card in doc.select(&cards).take(limit) {
        let Some(title_el) = card.select(&heading).next() else {
            continue;
        };
        let title = element_text(title_el);
        let link = resolve_link(
            base,
            title_el.select(&anchor).next().and_then(|a| a.value().attr("href")),
        );
        let Some(link) = link else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        articles.push(Article {
            title,
            link,
            summary: text_or(&first_text(card, &summary_sel), NO_SUMMARY),
            date: text_or(&first_text(card, &date_sel), NO_DATE),
            source: NAME.to_string(),
            engagement: text_or(&first_text(card, &views_sel), "0"),
        });
    }
    Ok(articles)
}

#[async_trait::async_trait]
impl ArticleSource for PhysOrgSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, limit: usize) -> PipelineResult<Vec<Article>> {
        let base = Url::parse(&self.url).map_err(|e| PipelineError::Source {
            feed: NAME.to_string(),
            message: format!("bad url {}: {}", self.url, e),
        })?;
        let body = fetch_page(&self.client, NAME, &self.url).await?;
        parse_listing(&String::from_utf8_lossy(&body), &base, limit)
    }
}
