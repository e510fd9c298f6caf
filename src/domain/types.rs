//! Pure data types for the navigation domain.
//! No I/O, no dependencies on external crates beyond std and chrono.

use std::fmt;

/// What kind of row an entity wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Comment,
    Story,
}

impl EntityKind {
    /// Namespace segment used for persisted state keys.
    pub fn storage_segment(self) -> &'static str {
        match self {
            EntityKind::Comment => "comments",
            EntityKind::Story => "stories",
        }
    }
}

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

/// Traversal direction through the ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// The four tracked activity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityKind {
    FavoriteSubmission,
    FavoriteComment,
    FlagSubmission,
    FlagComment,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::FavoriteSubmission,
        ActivityKind::FavoriteComment,
        ActivityKind::FlagSubmission,
        ActivityKind::FlagComment,
    ];

    /// Wire/storage name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::FavoriteSubmission => "favorite_submission",
            ActivityKind::FavoriteComment => "favorite_comment",
            ActivityKind::FlagSubmission => "flag_submission",
            ActivityKind::FlagComment => "flag_comment",
        }
    }

    pub fn favorite_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Comment => ActivityKind::FavoriteComment,
            EntityKind::Story => ActivityKind::FavoriteSubmission,
        }
    }

    pub fn flag_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Comment => ActivityKind::FlagComment,
            EntityKind::Story => ActivityKind::FlagSubmission,
        }
    }

    pub fn is_favorite(self) -> bool {
        matches!(
            self,
            ActivityKind::FavoriteSubmission | ActivityKind::FavoriteComment
        )
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a thread toggle moved when it was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseToggle {
    /// The control represented "collapsed"; clicking it expands.
    Expanded,
    /// The control represented "expanded"; clicking it collapses.
    Collapsed,
}

/// Human-readable age label for a unix timestamp in seconds.
pub fn relative_time(timestamp: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    relative_time_at(timestamp, now)
}

pub(crate) fn relative_time_at(timestamp: i64, now: i64) -> String {
    let diff = now - timestamp;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        let mins = diff / 60;
        format!("{} minute{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if diff < 86400 {
        let hours = diff / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if diff < 2592000 {
        let days = diff / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        let months = diff / 2592000;
        format!("{} month{} ago", months, if months == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_time_buckets() {
        assert_eq!(relative_time_at(1000, 1030), "just now");
        assert_eq!(relative_time_at(0, 60), "1 minute ago");
        assert_eq!(relative_time_at(0, 7200), "2 hours ago");
        assert_eq!(relative_time_at(0, 86400 * 3), "3 days ago");
        assert_eq!(relative_time_at(0, 2592000 * 2), "2 months ago");
    }

    #[test]
    fn activity_kind_maps_entity_kind() {
        assert_eq!(
            ActivityKind::favorite_for(EntityKind::Story),
            ActivityKind::FavoriteSubmission
        );
        assert_eq!(
            ActivityKind::flag_for(EntityKind::Comment),
            ActivityKind::FlagComment
        );
        assert!(ActivityKind::FavoriteComment.is_favorite());
        assert!(!ActivityKind::FlagSubmission.is_favorite());
    }
}
