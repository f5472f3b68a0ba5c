//! Space news listing for `blendchat articles` and `/articles`.

use std::error::Error;

use chrono::DateTime;

use crate::api::articles::{extract_tags, filter_by_tag, Article, ArticleQuery};
use crate::core::saved_articles::SavedArticles;

use super::context::CliContext;

const DESCRIPTION_PREVIEW_CHARS: usize = 160;

fn format_published(published_at: &str) -> String {
    DateTime::parse_from_rfc3339(published_at)
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|_| published_at.to_string())
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(DESCRIPTION_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

pub fn article_lines(articles: &[&Article], saved: &SavedArticles) -> Vec<String> {
    let mut lines = Vec::new();
    for article in articles {
        let star = if saved.is_saved(&article.id) { " ★" } else { "" };
        lines.push(format!("[{}] {}{star}", article.id, article.title));
        lines.push(format!(
            "    {} · {} · {} min read",
            article.author.name,
            format_published(&article.published_at),
            article.reading_time_minutes
        ));
        if !article.tags.is_empty() {
            lines.push(format!("    #{}", article.tags.join(" #")));
        }
        lines.push(format!("    {}", preview(&article.description)));
        lines.push(format!("    {}", article.url));
    }
    lines
}

/// Options for one listing.
#[derive(Debug, Clone, Default)]
pub struct ListingOptions {
    pub search: Option<String>,
    pub page: u32,
    pub tag: Option<String>,
    pub saved_only: bool,
}

/// Fetch one page and render it, applying the tag and bookmark filters.
pub async fn fetch_listing(
    ctx: &CliContext,
    saved: &SavedArticles,
    options: &ListingOptions,
) -> Result<Vec<String>, Box<dyn Error>> {
    let query = match options.search.as_deref() {
        Some(text) => ArticleQuery::search(text),
        None => ArticleQuery::default(),
    }
    .page(options.page);

    let articles = ctx.article_client().fetch(&query).await?;
    let mut shown = filter_by_tag(&articles, options.tag.as_deref());
    if options.saved_only {
        shown.retain(|article| saved.is_saved(&article.id));
    }

    if shown.is_empty() {
        return Ok(vec!["No articles found.".to_string()]);
    }

    let mut lines = vec![format!(
        "🚀 Space news, page {} ({} article{})",
        query.page,
        shown.len(),
        if shown.len() == 1 { "" } else { "s" }
    )];
    lines.extend(article_lines(&shown, saved));
    let tags = extract_tags(&articles);
    if !tags.is_empty() {
        lines.push(format!("Tags: {}", tags.join(", ")));
    }
    Ok(lines)
}

pub async fn run_articles(ctx: &CliContext, options: ListingOptions) -> Result<(), Box<dyn Error>> {
    let saved = SavedArticles::load(ctx.storage.clone());
    for line in fetch_listing(ctx, &saved, &options).await? {
        println!("{line}");
    }
    Ok(())
}

pub fn run_save_article(ctx: &CliContext, id: &str) -> Result<(), Box<dyn Error>> {
    let mut saved = SavedArticles::load(ctx.storage.clone());
    saved.toggle(id.trim());
    for notice in saved.take_notices() {
        println!("{notice}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::articles::Author;
    use crate::core::storage::MemoryStore;

    fn article(id: &str, description: &str) -> Article {
        Article {
            id: id.to_string(),
            title: "Starship flies again".to_string(),
            description: description.to_string(),
            url: "https://example.com/starship".to_string(),
            cover_image: String::new(),
            published_at: "2024-03-14T15:30:00Z".to_string(),
            reading_time_minutes: 2,
            author: Author {
                name: "SpaceNews".to_string(),
                profile_image: String::new(),
            },
            tags: vec!["SpaceNews".to_string(), "Launch".to_string()],
        }
    }

    #[test]
    fn listing_shows_metadata_and_bookmark_marker() {
        let mut saved = SavedArticles::load(MemoryStore::shared());
        saved.toggle("7");
        let first = article("7", "Short summary.");
        let second = article("8", "Another one.");

        let lines = article_lines(&[&first, &second], &saved);
        assert_eq!(lines[0], "[7] Starship flies again ★");
        assert_eq!(lines[1], "    SpaceNews · Mar 14, 2024 · 2 min read");
        assert_eq!(lines[2], "    #SpaceNews #Launch");
        assert_eq!(lines[3], "    Short summary.");
        assert_eq!(lines[4], "    https://example.com/starship");
        assert_eq!(lines[5], "[8] Starship flies again");
    }

    #[test]
    fn long_descriptions_are_shortened() {
        let long = "word ".repeat(100);
        let preview = preview(&long);
        assert!(preview.ends_with('…'));
        assert_eq!(preview.chars().count(), DESCRIPTION_PREVIEW_CHARS);
    }

    #[test]
    fn unparsable_dates_are_shown_verbatim() {
        assert_eq!(format_published("yesterday"), "yesterday");
    }
}
