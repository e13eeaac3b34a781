//! Physical copy ("exemplar") model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::enums::CopyState;

/// One physical instance of a catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BookCopy {
    pub id: i64,
    #[sqlx(rename = "livro_id")]
    pub entry_id: i64,
    #[sqlx(rename = "codigo_exemplar")]
    pub code: String,
    #[sqlx(rename = "estado")]
    pub state: CopyState,
}

/// Create copy request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCopy {
    pub entry_id: i64,
    #[validate(length(min = 1, max = 20, message = "Copy code must be 1-20 characters"))]
    pub code: String,
}

/// Copy listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CopyQuery {
    pub entry_id: Option<i64>,
    pub state: Option<CopyState>,
}

impl CopyQuery {
    pub fn matches(&self, copy: &BookCopy) -> bool {
        self.entry_id.map_or(true, |id| copy.entry_id == id)
            && self.state.map_or(true, |s| copy.state == s)
    }
}
