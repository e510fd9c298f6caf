//! Remote activity API port (trait).
//! Read returns a point-in-time snapshot; write is a single idempotent
//! set/clear of one `(item, kind)` bit.

use crate::domain::ActivityKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("authorization rejected")]
    Unauthorized,

    #[error("no auth token available for mutation")]
    MissingAuth,

    #[error("network error: {0}")]
    Network(String),

    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    #[error("request rejected: HTTP {status}")]
    Client { status: u16 },

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Transient failures worth retrying; authorization and request errors
    /// are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Server { .. })
    }
}

/// Per-kind sets of item ids, as stored locally and served remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    #[serde(default)]
    pub favorite_submission: BTreeSet<String>,
    #[serde(default)]
    pub favorite_comment: BTreeSet<String>,
    #[serde(default)]
    pub flag_submission: BTreeSet<String>,
    #[serde(default)]
    pub flag_comment: BTreeSet<String>,
}

impl ActivitySnapshot {
    pub fn set_for(&self, kind: ActivityKind) -> &BTreeSet<String> {
        match kind {
            ActivityKind::FavoriteSubmission => &self.favorite_submission,
            ActivityKind::FavoriteComment => &self.favorite_comment,
            ActivityKind::FlagSubmission => &self.flag_submission,
            ActivityKind::FlagComment => &self.flag_comment,
        }
    }

    pub fn set_for_mut(&mut self, kind: ActivityKind) -> &mut BTreeSet<String> {
        match kind {
            ActivityKind::FavoriteSubmission => &mut self.favorite_submission,
            ActivityKind::FavoriteComment => &mut self.favorite_comment,
            ActivityKind::FlagSubmission => &mut self.flag_submission,
            ActivityKind::FlagComment => &mut self.flag_comment,
        }
    }

    pub fn contains(&self, item_id: &str, kind: ActivityKind) -> bool {
        self.set_for(kind).contains(item_id)
    }

    /// Set or clear one bit. Returns the previous value.
    pub fn apply(&mut self, item_id: &str, kind: ActivityKind, state: bool) -> bool {
        let set = self.set_for_mut(kind);
        if state {
            !set.insert(item_id.to_string())
        } else {
            set.remove(item_id)
        }
    }
}

/// Mutation request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityMutation<'a> {
    pub item_id: &'a str,
    pub kind: &'a str,
    pub state: bool,
    pub auth: &'a str,
}

#[async_trait(?Send)]
pub trait ActivityApi {
    async fn fetch(&self, username: &str) -> Result<ActivitySnapshot, ApiError>;

    async fn set(
        &self,
        item_id: &str,
        kind: ActivityKind,
        state: bool,
        auth: &str,
    ) -> Result<(), ApiError>;
}
