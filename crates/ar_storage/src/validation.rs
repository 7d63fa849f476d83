//! Field rules the article API enforces on create.

use ar_core::{NewArticle, ValidationErrors};

pub const MAX_TITLE_CHARS: usize = 255;

/// Checks `article` against the create rules.
///
/// `original_exists` answers whether a referenced original article id is known.
pub fn validate_new_article(
    article: &NewArticle,
    original_exists: impl Fn(i64) -> bool,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if article.title.trim().is_empty() {
        errors.add("title", "The title field is required.");
    } else if article.title.chars().count() > MAX_TITLE_CHARS {
        errors.add("title", "The title field must not be greater than 255 characters.");
    }

    if article.content.trim().is_empty() {
        errors.add("content", "The content field is required.");
    }

    if let Some(url) = article.url.as_deref() {
        if url::Url::parse(url).is_err() {
            errors.add("url", "The url field must be a valid URL.");
        }
    }

    if let Some(id) = article.original_article_id {
        if !original_exists(id) {
            errors.add("original_article_id", "The selected original article id is invalid.");
        }
    }

    errors
}
