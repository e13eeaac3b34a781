//! Category tree model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Category node (self-referencing parent link)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    #[sqlx(rename = "nome")]
    pub name: String,
    #[sqlx(rename = "descricao")]
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

/// Create category request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

/// Update category request.
///
/// `parent_id: Some(None)` moves the category to the root.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCategory {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Option<i64>>,
}

/// Category with its subcategories, for tree display
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<CategoryNode>,
}
