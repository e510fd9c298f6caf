//! Comment and story wrappers over live rows.
//!
//! An [`Entity`] caches the attributes that never change for a rendered row
//! (id, author, age, indent level, rank) and reads volatile state such as
//! collapsed/dead through its [`Row`] on every query, so a native collapse
//! toggle is visible immediately.

use super::types::{CollapseToggle, EntityKind, VoteDirection};
use crate::ports::page::{
    Control, ControlRef, Row, RowEvent, RowListener, COLLAPSED_CLASS, DEAD_CLASS, INDENT_UNIT_PX,
};
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub struct Entity {
    id: String,
    kind: EntityKind,
    author: Option<String>,
    age: Option<String>,
    indent: u32,
    rank: Option<u32>,
    row: Rc<dyn Row>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("indent", &self.indent)
            .field("rank", &self.rank)
            .finish()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

impl Eq for Entity {}

impl Entity {
    pub fn comment(row: Rc<dyn Row>) -> Self {
        Self::wrap(EntityKind::Comment, row)
    }

    pub fn story(row: Rc<dyn Row>) -> Self {
        Self::wrap(EntityKind::Story, row)
    }

    fn wrap(kind: EntityKind, row: Rc<dyn Row>) -> Self {
        let indent = match kind {
            EntityKind::Comment => row.indent_width().unwrap_or(0) / INDENT_UNIT_PX,
            EntityKind::Story => 0,
        };
        let rank = match kind {
            EntityKind::Story => row.rank(),
            EntityKind::Comment => None,
        };
        Self {
            id: row.row_id(),
            kind,
            author: row.author(),
            age: row.age(),
            indent,
            rank,
            row,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn age(&self) -> Option<&str> {
        self.age.as_deref()
    }

    /// Hierarchy depth; always 0 for stories.
    pub fn indent(&self) -> u32 {
        self.indent
    }

    pub fn rank(&self) -> Option<u32> {
        self.rank
    }

    pub fn collapsed(&self) -> bool {
        self.row.has_class(COLLAPSED_CLASS)
    }

    pub fn dead(&self) -> bool {
        self.row.has_class(DEAD_CLASS)
    }

    pub fn hidden(&self) -> bool {
        self.collapsed() || self.dead()
    }

    /// Click the vote control for `direction`. An existing unvote control
    /// wins over a fresh vote. Returns whether any control was clicked.
    pub fn toggle_vote(&self, direction: VoteDirection) -> bool {
        let vote = match direction {
            VoteDirection::Up => Control::Upvote,
            VoteDirection::Down => Control::Downvote,
        };
        self.click_first(&[Control::Unvote, vote]).is_some()
    }

    pub fn favorite(&self) -> bool {
        self.click_first(&[Control::Favorite]).is_some()
    }

    pub fn flag(&self) -> bool {
        self.click_first(&[Control::Flag]).is_some()
    }

    /// Open the reply form, returning the control so the caller can track
    /// whether a reply box is open.
    pub fn reply(&self) -> Option<ControlRef> {
        self.click_first(&[Control::Reply])
    }

    pub fn collapse_toggle(&self) -> Option<CollapseToggle> {
        let toggle = self.row.control(Control::ThreadToggle)?;
        let outcome = if toggle_shows_collapsed(&toggle.label) {
            CollapseToggle::Expanded
        } else {
            CollapseToggle::Collapsed
        };
        self.row.click(&toggle);
        Some(outcome)
    }

    pub fn control(&self, control: Control) -> Option<ControlRef> {
        self.row.control(control)
    }

    /// Link labelled `[n]` in the entity's text.
    pub fn reference_link(&self, n: u8) -> Option<String> {
        find_reference(&self.row.text(), n)
    }

    pub(crate) fn add_listener(&self, event: RowEvent, listener: RowListener) {
        self.row.add_listener(event, listener);
    }

    pub(crate) fn remove_listener(&self, event: RowEvent, listener: &RowListener) {
        self.row.remove_listener(event, listener);
    }

    fn click_first(&self, candidates: &[Control]) -> Option<ControlRef> {
        let found = candidates.iter().find_map(|c| self.row.control(*c))?;
        self.row.click(&found);
        Some(found)
    }
}

/// A thread toggle represents "collapsed" when it shows a bracketed count
/// (`[3 more]`) or the expand glyph (`[+]`).
fn toggle_shows_collapsed(label: &str) -> bool {
    let label = label.trim();
    let Some(inner) = label.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
        return false;
    };
    let inner = inner.trim();
    inner == "+" || inner.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn find_reference(text: &str, n: u8) -> Option<String> {
    let marker = format!("[{n}]");
    let mut rest = text;
    while let Some(idx) = rest.find(&marker) {
        let after = &rest[idx + marker.len()..];
        let candidate = after.trim_start().split_whitespace().next().unwrap_or("");
        if candidate.starts_with("http://") || candidate.starts_with("https://") {
            return Some(candidate.to_string());
        }
        rest = after;
    }
    None
}
