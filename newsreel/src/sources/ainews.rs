use reqwest::Client;
use scraper::Html;
use url::Url;

use super::{
    element_text, fetch_page, first_text, keyword_label, resolve_link, selector, ArticleSource,
};
use crate::article::{text_or, Article, NO_DATE, NO_SUMMARY};
use crate::error::{PipelineError, PipelineResult};

const NAME: &str = "AI News";
const URL: &str = "https://www.artificialintelligence-news.com/";
const HIGH_ENGAGEMENT: [&str; 4] = ["breakthrough", "major", "new", "latest"];

pub struct AiNewsSource {
    client: Client,
    url: String,
}

impl AiNewsSource {
    pub fn new(client: Client) -> Self {
        Self::with_url(client, URL)
    }

    pub fn with_url(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

pub fn parse_listing(html: &str, base: &Url, limit: usize) -> PipelineResult<Vec<Article>> {
    let doc = Html::parse_document(html);
    let cards = selector(NAME, "article, div.post")?;
    let heading = selector(NAME, "h1, h2, h3, a.entry-title-link")?;
    let anchor = selector(NAME, "a")?;
    let summary_sel = selector(NAME, "div.entry-summary, div.excerpt, p")?;
    let date_sel = selector(NAME, "time, span.published, div.entry-meta")?;

    let mut articles = Vec::new();
    for card in doc.select(&cards).take(limit) {
        let Some(title_el) = card.select(&heading).next() else {
            continue;
        };
        let title = element_text(title_el);
        if title.is_empty() {
            continue;
        }

        // Heading link first, then the heading itself when it is the anchor, then any card link.
        let href = title_el
            .select(&anchor)
            .next()
            .or_else(|| (title_el.value().name() == "a").then_some(title_el))
            .or_else(|| card.select(&anchor).next())
            .and_then(|a| a.value().attr("href"));
        let Some(link) = resolve_link(base, href) else {
            continue;
        };

        articles.push(Article {
            engagement: keyword_label(&title, &HIGH_ENGAGEMENT),
            title,
            link,
            summary: text_or(&first_text(card, &summary_sel), NO_SUMMARY),
            date: text_or(&first_text(card, &date_sel), NO_DATE),
            source: NAME.to_string(),
        });
    }
    Ok(articles)
}

#[async_trait::async_trait]
impl ArticleSource for AiNewsSource {
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
