//! Cursor encoding used by the in-memory store.

use serde::{Deserialize, Serialize};

use nichofy_core::RepoError;
use nichofy_core::domain::{Cursor, Post, PostSort, SortField, SortValue};

/// Position of the last document of a page under a given order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CursorPosition {
    pub field: SortField,
    pub value: SortValue,
    pub id: String,
}

impl CursorPosition {
    pub fn of(post: &Post, sort: PostSort) -> Self {
        Self {
            field: sort.field,
            value: sort.value_of(post),
            id: post.id.clone(),
        }
    }

    pub fn encode(&self) -> Result<Cursor, RepoError> {
        serde_json::to_string(self)
            .map(Cursor::new)
            .map_err(|e| RepoError::Query(format!("cursor encoding failed: {e}")))
    }

    /// Decode a cursor and check it was issued for the same sort field.
    pub fn decode(cursor: &Cursor, sort: PostSort) -> Result<Self, RepoError> {
        let position: Self = serde_json::from_str(cursor.as_str())
            .map_err(|_| RepoError::Query("malformed cursor".to_string()))?;

        if position.field != sort.field {
            return Err(RepoError::Query(format!(
                "cursor was issued for order by {}, query orders by {}",
                position.field, sort.field
            )));
        }

        Ok(position)
    }
}
