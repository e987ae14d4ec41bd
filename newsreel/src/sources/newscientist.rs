use reqwest::Client;
use scraper::Html;
use tracing::debug;
use url::Url;

use super::{fetch_page, first_text, keyword_label, resolve_link, selector, ArticleSource};
use crate::article::{Article, NO_DATE, NO_SUMMARY};
use crate::error::{PipelineError, PipelineResult};

const NAME: &str = "New Scientist - Technology";
const URL: &str = "https://www.newscientist.com/subject/technology/";
const HIGH_ENGAGEMENT: [&str; 10] = [
    "breakthrough",
    "discovery",
    "new",
    "revolutionary",
    "ai",
    "quantum",
    "advanced",
    "innovative",
    "first",
    "major",
];

/// New Scientist technology cards. Listing pages carry no teaser text, so the
/// summary is built from the lead image caption and credit. Dates are not shown.
pub struct NewScientistSource {
    client: Client,
    url: String,
}

impl NewScientistSource {
    pub fn new(client: Client) -> Self {
        Self::with_url(client, URL)
    }

    pub fn with_url(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

pub fn parse_listing(html: &str, base: &Url, limit: usize) -> PipelineResult<Vec<Article>> {
    let doc = Html::parse_document(html);
    let card_links = selector(NAME, "a.CardLink")?;
    let card_sel = selector(NAME, "article.Card")?;
    let title_sel = selector(NAME, "h3.Card__Title")?;
    let category_sel = selector(NAME, "h4.Card__Category")?;
    let image_sel = selector(NAME, "img.Image")?;

    let mut articles = Vec::new();
    for card_link in doc.select(&card_links).take(limit) {
        let Some(link) = resolve_link(base, card_link.value().attr("href")) else {
            continue;
        };
        let Some(card) = card_link.select(&card_sel).next() else {
            continue;
        };
        let title = first_text(card, &title_sel);
        if title.is_empty() {
            continue;
        }
        debug!(%title, category = %first_text(card, &category_sel), "newscientist: card");

        let mut parts = Vec::new();
        if let Some(img) = card.select(&image_sel).next() {
            if let Some(caption) = img.value().attr("data-caption").map(str::trim).filter(|c| !c.is_empty()) {
                parts.push(caption.to_string());
            }
            if let Some(credit) = img.value().attr("data-credit").map(str::trim).filter(|c| !c.is_empty()) {
                parts.push(format!("Credit: {}", credit));
            }
        }
        let summary = if parts.is_empty() {
            NO_SUMMARY.to_string()
        } else {
            parts.join(" | ")
        };

        articles.push(Article {
            engagement: keyword_label(&title, &HIGH_ENGAGEMENT),
            title,
            link,
            summary,
            date: NO_DATE.to_string(),
            source: NAME.to_string(),
        });
    }
    Ok(articles)
}

#[async_trait::async_trait]
impl ArticleSource for NewScientistSource {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_comes_from_image_caption_and_credit() {
        let page = r#"
            <a class="CardLink" href="/article/2450-first-room-temperature-qubit/">
              <article class="Card">
                <h4 class="Card__Category">Quantum</h4>
                <h3 class="Card__Title">First room-temperature qubit</h3>
                <p class="Card__SubjectType">News</p>
                <img class="Image" data-caption="A qubit chip" data-credit="Lab Photo">
              </article>
            </a>
            <a class="CardLink" href="/article/2451-gadgets/">
              <article class="Card"><h3 class="Card__Title">Gadget roundup</h3></article>
            </a>
            <a class="CardLink" href="/video/no-card/">Not a card</a>
        "#;
        let base = Url::parse(URL).unwrap();
        let articles = parse_listing(page, &base, 20).unwrap();
        assert_eq!(articles.len(), 2);

        assert_eq!(
            articles[0].link,
            "https://www.newscientist.com/article/2450-first-room-temperature-qubit/"
        );
        assert_eq!(articles[0].summary, "A qubit chip | Credit: Lab Photo");
        assert_eq!(articles[0].engagement, "High");
        assert_eq!(articles[0].date, NO_DATE);

        assert_eq!(articles[1].summary, NO_SUMMARY);
        assert_eq!(articles[1].engagement, "Medium");
    }
}
