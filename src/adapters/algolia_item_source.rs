//! Algolia HN search API implementation of the ItemSource port.

use super::http_activity_api::{network_error, status_error, USER_AGENT};
use crate::domain::EntityKind;
use crate::ports::{ApiError, Item, ItemSource};
use async_trait::async_trait;
use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ApiItem {
    id: u64,
    #[serde(rename = "type")]
    kind: Option<String>,
    author: Option<String>,
    created_at_i: Option<i64>,
    title: Option<String>,
    text: Option<String>,
    url: Option<String>,
    points: Option<i64>,
    #[serde(default)]
    children: Vec<ApiItem>,
}

impl ApiItem {
    fn into_item(self) -> Item {
        let kind = match self.kind.as_deref() {
            Some("comment") => EntityKind::Comment,
            _ => EntityKind::Story,
        };
        let comment_count = match kind {
            EntityKind::Story => Some(count_comments(&self.children)),
            EntityKind::Comment => None,
        };
        Item {
            id: self.id.to_string(),
            kind,
            author: self.author,
            created_at: self.created_at_i,
            title: self.title.map(|t| html_to_text(&t)),
            text: self
                .text
                .map(|t| html_to_text(&t))
                .filter(|t| !t.is_empty()),
            url: self.url,
            points: self.points,
            comment_count,
            children: self.children.into_iter().map(ApiItem::into_item).collect(),
        }
    }
}

fn count_comments(children: &[ApiItem]) -> u32 {
    children
        .iter()
        .map(|c| 1 + count_comments(&c.children))
        .sum()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    author: Option<String>,
    points: Option<i64>,
    num_comments: Option<u32>,
    created_at_i: Option<i64>,
}

impl SearchHit {
    fn into_item(self) -> Item {
        Item {
            id: self.object_id,
            kind: EntityKind::Story,
            author: self.author,
            created_at: self.created_at_i,
            title: self.title.map(|t| html_to_text(&t)),
            text: None,
            url: self.url,
            points: self.points,
            comment_count: self.num_comments,
            children: Vec::new(),
        }
    }
}

pub struct AlgoliaItemSource {
    base_url: String,
    http_client: reqwest::Client,
}

impl AlgoliaItemSource {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        debug!(url = %url, "fetching items");
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(network_error)?;

        if let Some(err) = status_error(response.status()) {
            return Err(err);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait(?Send)]
impl ItemSource for AlgoliaItemSource {
    async fn front_page(&self) -> Result<Vec<Item>, ApiError> {
        let url = format!("{}/search?tags=front_page&hitsPerPage=30", self.base_url);
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response.hits.into_iter().map(SearchHit::into_item).collect())
    }

    async fn item(&self, id: &str) -> Result<Item, ApiError> {
        let url = format!("{}/items/{}", self.base_url, id);
        let item: ApiItem = self.get_json(&url).await?;
        Ok(item.into_item())
    }
}

static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href="([^"]*)"[^>]*>.*?</a>"#).expect("valid link pattern")
});
static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p(\s[^>]*)?>").expect("valid paragraph pattern"));
static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid break pattern"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank-run pattern"));

/// Flatten the HTML the API returns for comment bodies: paragraphs become
/// blank lines, links are replaced by their href, entities are decoded.
fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in LINK.captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&markup_to_text(&html[last..whole.start()]));
        // The link text repeats the href, possibly truncated.
        out.push_str(&decode_html_entities(&caps[1]));
        last = whole.end();
    }
    out.push_str(&markup_to_text(&html[last..]));

    BLANK_RUN.replace_all(out.trim(), "\n\n").into_owned()
}

/// Text between links. Decoded once, after tags are gone.
fn markup_to_text(fragment: &str) -> String {
    let text = PARAGRAPH.replace_all(fragment, "\n\n");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    decode_html_entities(&text).into_owned()
}
