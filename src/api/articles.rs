//! Spaceflight News client and the normalized [`Article`] shape.

use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::url::construct_api_url;

pub const DEFAULT_ARTICLES_BASE_URL: &str = "https://api.spaceflightnewsapi.net/v4";
pub const PAGE_SIZE: u32 = 50;

const NO_TITLE: &str = "No title";
const NO_DESCRIPTION: &str = "No description available";
const NO_URL: &str = "#";
const PLACEHOLDER_IMAGE: &str = "https://placehold.co/600x400?text=Space+News";
const AVATAR_BASE: &str = "https://ui-avatars.com/api/";
const UNKNOWN_AUTHOR: &str = "Unknown";
const FALLBACK_TAG: &str = "Space News";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: String,
    pub profile_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub cover_image: String,
    pub published_at: String,
    pub reading_time_minutes: u32,
    pub author: Author,
    pub tags: Vec<String>,
}

/// Article record as returned by the upstream API. Every field is optional
/// and empty strings count as missing.
#[derive(Debug, Default, Deserialize)]
struct RawArticle {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    news_site: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticlePage {
    results: Option<Vec<RawArticle>>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn reading_time_minutes(summary: Option<&str>) -> u32 {
    let length = match summary {
        Some(text) if !text.is_empty() => text.chars().count(),
        _ => 2000,
    };
    match length.div_ceil(1000) {
        0 => 3,
        minutes => u32::try_from(minutes).unwrap_or(u32::MAX),
    }
}

fn avatar_url(site: &str) -> String {
    reqwest::Url::parse_with_params(AVATAR_BASE, &[("name", site)])
        .map(String::from)
        .unwrap_or_else(|_| format!("{AVATAR_BASE}?name=Space"))
}

impl From<RawArticle> for Article {
    fn from(raw: RawArticle) -> Self {
        let id = match raw.id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let summary = present(raw.summary);
        let news_site = present(raw.news_site);

        Article {
            id,
            title: present(raw.title).unwrap_or_else(|| NO_TITLE.to_string()),
            reading_time_minutes: reading_time_minutes(summary.as_deref()),
            description: summary.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            url: present(raw.url).unwrap_or_else(|| NO_URL.to_string()),
            cover_image: present(raw.image_url).unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            published_at: present(raw.published_at)
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            author: Author {
                name: news_site
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
                profile_image: avatar_url(news_site.as_deref().unwrap_or("Space")),
            },
            tags: match news_site {
                Some(site) => vec![site],
                None => vec![FALLBACK_TAG.to_string()],
            },
        }
    }
}

#[derive(Debug)]
pub enum ArticleError {
    Api { status: u16 },
    Transport(reqwest::Error),
    Decode(serde_json::Error),
    /// The body parsed but had no `results` array.
    InvalidResponse,
}

impl fmt::Display for ArticleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleError::Api { status } => write!(f, "Spaceflight News API error: {status}"),
            ArticleError::Transport(err) => write!(f, "Failed to fetch news articles: {err}"),
            ArticleError::Decode(err) => write!(f, "Failed to decode news articles: {err}"),
            ArticleError::InvalidResponse => write!(f, "Invalid API response structure"),
        }
    }
}

impl StdError for ArticleError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ArticleError::Transport(err) => Some(err),
            ArticleError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ArticleError {
    fn from(err: reqwest::Error) -> Self {
        ArticleError::Transport(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    /// Title search; blank means the unfiltered feed.
    pub search: Option<String>,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            page_size: PAGE_SIZE,
        }
    }
}

impl ArticleQuery {
    pub fn search(text: &str) -> Self {
        Self {
            search: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size)
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.page_size.to_string()),
            ("offset", self.offset().to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("title_contains", search.trim().to_string()));
        }
        params
    }
}

#[derive(Clone)]
pub struct ArticleClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArticleClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    pub async fn fetch(&self, query: &ArticleQuery) -> Result<Vec<Article>, ArticleError> {
        let url = construct_api_url(&self.base_url, "articles");
        debug!(%url, page = query.page, "fetching articles");

        let response = self.client.get(url).query(&query.params()).send().await?;
        if !response.status().is_success() {
            return Err(ArticleError::Api {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let page: ArticlePage = serde_json::from_slice(&body).map_err(ArticleError::Decode)?;
        let results = page.results.ok_or(ArticleError::InvalidResponse)?;
        Ok(results.into_iter().map(Article::from).collect())
    }
}

/// Unique non-empty tags in first-seen order.
pub fn extract_tags(articles: &[Article]) -> Vec<String> {
    let mut seen = HashSet::new();
    articles
        .iter()
        .flat_map(|article| article.tags.iter())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

pub fn filter_by_tag<'a>(articles: &'a [Article], tag: Option<&str>) -> Vec<&'a Article> {
    match tag {
        Some(tag) => articles
            .iter()
            .filter(|article| article.tags.iter().any(|t| t == tag))
            .collect(),
        None => articles.iter().collect(),
    }
}
