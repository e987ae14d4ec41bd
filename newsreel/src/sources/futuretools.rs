use reqwest::Client;
use scraper::Html;
use url::Url;

use super::{
    element_text, fetch_page, first_text, keyword_label, resolve_link, selector, ArticleSource,
};
use crate::article::{text_or, Article, NO_DATE, NO_SUMMARY};
use crate::error::{PipelineError, PipelineResult};

const NAME: &str = "Future Tools";
const URL: &str = "https://www.futuretools.io/news";
const HIGH_ENGAGEMENT: [&str; 4] = ["ai", "tool", "new", "best"];

pub struct FutureToolsSource {
    client: Client,
    url: String,
}

impl FutureToolsSource {
    pub fn new(client: Client) -> Self {
        Self::with_url(client, URL)
    }

    pub fn with_url(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

pub fn parse_listing(html: &str, base: &Url, limit: usize) -> PipelineResult<Vec<Article>> {
    let doc = Html::parse_document(html);
    let cards = selector(NAME, "div.news-item, article, div.post")?;
    let heading = selector(NAME, "h1, h2, h3, a")?;
    let anchor = selector(NAME, "a")?;
    let summary_sel = selector(NAME, "p, div.description, div.excerpt")?;
    let date_sel = selector(NAME, "time, span.date, div.meta")?;

    let mut articles = Vec::new();
    for card in doc.select(&cards).take(limit) {
        let Some(title_el) = card.select(&heading).next() else {
            continue;
        };
        let title = element_text(title_el);
        if title.is_empty() {
            continue;
        }

        let link_el = if title_el.value().name() == "a" {
            Some(title_el)
        } else {
            title_el
                .select(&anchor)
                .next()
                .or_else(|| card.select(&anchor).next())
        };
        let Some(link) = resolve_link(base, link_el.and_then(|a| a.value().attr("href"))) else {
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
impl ArticleSource for FutureToolsSource {
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
