//! Page port (traits).
//! The live document surface the engine reads row state from and drives
//! controls through. Implementations may wrap a real DOM, an in-memory
//! page, or a test fake.

use std::rc::Rc;

/// Row class marking a collapsed thread root.
pub const COLLAPSED_CLASS: &str = "coll";
/// Row class marking a moderated (dead) entity.
pub const DEAD_CLASS: &str = "dead";
/// Width in pixels of one indent level.
pub const INDENT_UNIT_PX: u32 = 40;

/// Low-level click targets a row may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Upvote,
    Downvote,
    Unvote,
    Reply,
    Favorite,
    Flag,
    ThreadToggle,
    StoryLink,
    CommentsLink,
}

/// A resolved control inside a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRef {
    pub row_id: String,
    pub control: Control,
    /// Visible label, e.g. `[-]`, `[3 more]`, `favorite`.
    pub label: String,
    pub href: Option<String>,
}

/// Event types listeners can attach to on a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowEvent {
    Click,
}

/// Listener invoked with the id of the row the event landed on.
pub type RowListener = Rc<dyn Fn(&str)>;

/// One server-rendered row.
pub trait Row {
    fn row_id(&self) -> String;

    /// Read a class marker fresh from the row.
    fn has_class(&self, class: &str) -> bool;

    /// Width of the indent marker, if the row has one.
    fn indent_width(&self) -> Option<u32>;

    fn author(&self) -> Option<String>;

    fn age(&self) -> Option<String>;

    /// Rank label on story rows.
    fn rank(&self) -> Option<u32>;

    /// Body text (comment text or story title).
    fn text(&self) -> String;

    fn control(&self, control: Control) -> Option<ControlRef>;

    fn click(&self, control: &ControlRef);

    fn add_listener(&self, event: RowEvent, listener: RowListener);

    /// Remove a listener previously added with the same `Rc`.
    fn remove_listener(&self, event: RowEvent, listener: &RowListener);
}

/// Where keyboard focus currently sits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Body,
    Anchor,
    /// A native text input or textarea. `reply` marks a reply textarea and
    /// `row_id` the row that contains it.
    Input { row_id: Option<String>, reply: bool },
}

/// Resolved target of a pointer click.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClickTarget {
    /// Closest ancestor entity row, if any.
    pub row_id: Option<String>,
    /// Click landed on an input or textarea.
    pub in_input: bool,
}

/// The hosting document.
pub trait Page {
    /// Id of the item the page shows; `None` for listings.
    fn item_id(&self) -> Option<String>;

    /// Stable id of the page used to scope persisted state.
    fn page_key(&self) -> String {
        self.item_id().unwrap_or_else(|| "front".to_string())
    }

    fn comment_rows(&self) -> Vec<Rc<dyn Row>>;

    fn story_rows(&self) -> Vec<Rc<dyn Row>>;

    fn focus(&self) -> Focus;

    fn blur(&self);

    fn scroll_into_view(&self, row_id: &str);

    fn scroll_to_top(&self);

    fn open_url(&self, url: &str);

    /// Deliver a click to the row it landed on, firing that row's listeners.
    fn dispatch_click(&self, target: &ClickTarget);
}
