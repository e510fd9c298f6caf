//! Item metadata port (trait).
//! Read-through access to stories and comment threads used to build a page.

use super::activity_api::ApiError;
use crate::domain::EntityKind;
use async_trait::async_trait;

/// A story or comment with its reply tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub kind: EntityKind,
    pub author: Option<String>,
    /// Unix timestamp in seconds.
    pub created_at: Option<i64>,
    pub title: Option<String>,
    /// Plain text body. `None` for deleted comments.
    pub text: Option<String>,
    pub url: Option<String>,
    pub points: Option<i64>,
    pub comment_count: Option<u32>,
    pub children: Vec<Item>,
}

impl Item {
    /// Deleted or removed comments come back without author or text.
    pub fn is_dead(&self) -> bool {
        self.kind == EntityKind::Comment && (self.author.is_none() || self.text.is_none())
    }
}

#[async_trait(?Send)]
pub trait ItemSource {
    /// Stories currently on the front page, in rank order.
    async fn front_page(&self) -> Result<Vec<Item>, ApiError>;

    /// One item with its full reply tree.
    async fn item(&self, id: &str) -> Result<Item, ApiError>;
}
