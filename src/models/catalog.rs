//! Catalog entry (bibliographic record) model

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// ISBN-10 or ISBN-13 once separators are stripped
pub static ISBN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{9}[\dX]|\d{13})$").unwrap());

/// Catalog entry from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CatalogEntry {
    pub id: i64,
    #[sqlx(rename = "titulo")]
    pub title: String,
    #[sqlx(rename = "autor")]
    pub author: String,
    #[sqlx(rename = "sinopse")]
    pub synopsis: Option<String>,
    pub isbn: Option<String>,
    #[sqlx(rename = "capa_url")]
    pub cover_url: Option<String>,
}

/// Create catalog entry request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCatalogEntry {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Author must be 1-255 characters"))]
    pub author: String,
    pub synopsis: Option<String>,
    #[validate(regex(path = *ISBN_PATTERN, message = "Invalid ISBN"))]
    pub isbn: Option<String>,
    #[validate(length(max = 255))]
    pub cover_url: Option<String>,
}

/// Update catalog entry request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCatalogEntry {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author must be 1-255 characters"))]
    pub author: Option<String>,
    pub synopsis: Option<String>,
    #[validate(regex(path = *ISBN_PATTERN, message = "Invalid ISBN"))]
    pub isbn: Option<String>,
    #[validate(length(max = 255))]
    pub cover_url: Option<String>,
}

/// Entry-category join row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CatalogCategoryLink {
    pub id: i64,
    #[sqlx(rename = "livro_id")]
    pub entry_id: i64,
    #[sqlx(rename = "categoria_id")]
    pub category_id: i64,
}

/// Strip hyphens and spaces from an ISBN, uppercasing the check digit
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_isbn() {
        assert_eq!(normalize_isbn("978-85-359-0277-8"), "9788535902778");
        assert_eq!(normalize_isbn("0 306 40615 x"), "030640615X");
    }

    #[test]
    fn test_isbn_pattern() {
        assert!(ISBN_PATTERN.is_match("9788535902778"));
        assert!(ISBN_PATTERN.is_match("030640615X"));
        assert!(!ISBN_PATTERN.is_match("978-85-359-0277-8"));
        assert!(!ISBN_PATTERN.is_match("12345"));
    }
}
