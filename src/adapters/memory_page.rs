//! In-memory page adapter.
//!
//! Models the server-rendered markup the engine expects: rows carrying
//! `coll`/`dead`/`noshow` classes, a 40px-per-level indent marker, and the
//! vote, reply, favorite, flag and thread-toggle controls. Control clicks
//! are applied in memory and queued as [`PageEvent`]s for the host.

use crate::domain::{relative_time, EntityKind, VoteDirection};
use crate::ports::page::{
    ClickTarget, Control, ControlRef, Focus, Page, Row, RowEvent, RowListener, COLLAPSED_CLASS,
    DEAD_CLASS, INDENT_UNIT_PX,
};
use crate::ports::Item;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;
use tracing::debug;

/// Row class hiding a descendant of a collapsed thread.
pub const NOSHOW_CLASS: &str = "noshow";

const ITEM_URL: &str = "https://news.ycombinator.com/item?id=";

/// Side effects of control clicks and page operations, drained by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Voted {
        row_id: String,
        direction: Option<VoteDirection>,
    },
    ReplyToggled {
        row_id: String,
        open: bool,
    },
    Favorite {
        row_id: String,
    },
    Flag {
        row_id: String,
    },
    ThreadToggled {
        row_id: String,
        collapsed: bool,
    },
    OpenUrl(String),
    /// `None` scrolls to the top of the page.
    ScrollTo(Option<String>),
}

/// Construction data for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowData {
    pub id: String,
    pub kind: EntityKind,
    pub depth: u32,
    pub author: Option<String>,
    pub age: Option<String>,
    pub rank: Option<u32>,
    /// Comment text or story title.
    pub text: String,
    pub url: Option<String>,
    pub points: Option<i64>,
    pub dead: bool,
}

impl RowData {
    pub fn comment(id: &str, depth: u32, text: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: EntityKind::Comment,
            depth,
            author: None,
            age: None,
            rank: None,
            text: text.to_string(),
            url: None,
            points: None,
            dead: false,
        }
    }

    pub fn story(id: &str, rank: u32, title: &str, url: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            kind: EntityKind::Story,
            depth: 0,
            author: None,
            age: None,
            rank: Some(rank),
            text: title.to_string(),
            url: url.map(str::to_string),
            points: None,
            dead: false,
        }
    }

    fn from_item(item: &Item, depth: u32, rank: Option<u32>) -> Self {
        let text = match item.kind {
            EntityKind::Story => item.title.clone().unwrap_or_default(),
            EntityKind::Comment => item.text.clone().unwrap_or_else(|| "[deleted]".to_string()),
        };
        Self {
            id: item.id.clone(),
            kind: item.kind,
            depth,
            author: item.author.clone(),
            age: item.created_at.map(relative_time),
            rank,
            text,
            url: item.url.clone(),
            points: item.points,
            dead: item.is_dead(),
        }
    }
}

#[derive(Default)]
struct Shared {
    events: RefCell<VecDeque<PageEvent>>,
    focus: RefCell<Focus>,
}

impl Shared {
    fn push(&self, event: PageEvent) {
        self.events.borrow_mut().push_back(event);
    }
}

pub struct MemoryRow {
    data: RowData,
    classes: RefCell<BTreeSet<String>>,
    vote: Cell<Option<VoteDirection>>,
    reply_open: Cell<bool>,
    favorited: Cell<bool>,
    flagged: Cell<bool>,
    /// Rows of the subtree below this one, in page order.
    subtree: RefCell<Vec<Rc<MemoryRow>>>,
    listeners: RefCell<Vec<RowListener>>,
    shared: Rc<Shared>,
}

impl MemoryRow {
    fn new(data: RowData, shared: Rc<Shared>) -> Self {
        let mut classes = BTreeSet::new();
        if data.dead {
            classes.insert(DEAD_CLASS.to_string());
        }
        Self {
            data,
            classes: RefCell::new(classes),
            vote: Cell::new(None),
            reply_open: Cell::new(false),
            favorited: Cell::new(false),
            flagged: Cell::new(false),
            subtree: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            shared,
        }
    }

    pub fn data(&self) -> &RowData {
        &self.data
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn depth(&self) -> u32 {
        self.data.depth
    }

    pub fn is_shown(&self) -> bool {
        !self.has_class(NOSHOW_CLASS)
    }

    pub fn vote(&self) -> Option<VoteDirection> {
        self.vote.get()
    }

    pub fn is_reply_open(&self) -> bool {
        self.reply_open.get()
    }

    pub fn favorited(&self) -> bool {
        self.favorited.get()
    }

    pub fn flagged(&self) -> bool {
        self.flagged.get()
    }

    pub fn set_favorited(&self, on: bool) {
        self.favorited.set(on);
    }

    pub fn set_flagged(&self, on: bool) {
        self.flagged.set(on);
    }

    /// Number of rows hidden under this one when collapsed.
    pub fn hidden_count(&self) -> usize {
        self.subtree.borrow().len()
    }

    pub fn set_class(&self, class: &str, on: bool) {
        let mut classes = self.classes.borrow_mut();
        if on {
            classes.insert(class.to_string());
        } else {
            classes.remove(class);
        }
    }

    fn is_comment(&self) -> bool {
        self.data.kind == EntityKind::Comment
    }

    fn toggle_label(&self) -> String {
        if self.has_class(COLLAPSED_CLASS) {
            format!("[{} more]", self.hidden_count() + 1)
        } else {
            "[–]".to_string()
        }
    }

    fn control_ref(&self, control: Control, label: String, href: Option<String>) -> ControlRef {
        ControlRef {
            row_id: self.data.id.clone(),
            control,
            label,
            href,
        }
    }

    fn toggle_thread(&self) -> bool {
        let collapsing = !self.has_class(COLLAPSED_CLASS);
        self.set_class(COLLAPSED_CLASS, collapsing);

        let subtree = self.subtree.borrow();
        if collapsing {
            for row in subtree.iter() {
                row.set_class(NOSHOW_CLASS, true);
            }
        } else {
            // Nested threads that are still collapsed keep their rows hidden.
            let mut hide_below: Option<u32> = None;
            for row in subtree.iter() {
                if hide_below.is_some_and(|depth| row.depth() <= depth) {
                    hide_below = None;
                }
                row.set_class(NOSHOW_CLASS, hide_below.is_some());
                if hide_below.is_none() && row.has_class(COLLAPSED_CLASS) {
                    hide_below = Some(row.depth());
                }
            }
        }
        collapsing
    }

    fn fire(&self, event: RowEvent) {
        // Clone out so a listener may add or remove listeners.
        let listeners: Vec<RowListener> = self.listeners.borrow().clone();
        match event {
            RowEvent::Click => {
                for listener in listeners {
                    listener(self.data.id.as_str());
                }
            }
        }
    }
}

impl Row for MemoryRow {
    fn row_id(&self) -> String {
        self.data.id.clone()
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.borrow().contains(class)
    }

    fn indent_width(&self) -> Option<u32> {
        self.is_comment().then_some(self.data.depth * INDENT_UNIT_PX)
    }

    fn author(&self) -> Option<String> {
        self.data.author.clone()
    }

    fn age(&self) -> Option<String> {
        self.data.age.clone()
    }

    fn rank(&self) -> Option<u32> {
        self.data.rank
    }

    fn text(&self) -> String {
        self.data.text.clone()
    }

    fn control(&self, control: Control) -> Option<ControlRef> {
        let dead = self.has_class(DEAD_CLASS);
        let voted = self.vote.get().is_some();
        match control {
            Control::Upvote if !dead && !voted => {
                Some(self.control_ref(control, "▲".to_string(), None))
            }
            Control::Downvote if self.is_comment() && !dead && !voted => {
                Some(self.control_ref(control, "▼".to_string(), None))
            }
            Control::Unvote if voted => Some(self.control_ref(control, "unvote".to_string(), None)),
            Control::Reply if self.is_comment() && !dead => {
                Some(self.control_ref(control, "reply".to_string(), None))
            }
            Control::Favorite => {
                let label = if self.favorited.get() { "un-favorite" } else { "favorite" };
                Some(self.control_ref(control, label.to_string(), None))
            }
            Control::Flag if !dead => {
                let label = if self.flagged.get() { "unflag" } else { "flag" };
                Some(self.control_ref(control, label.to_string(), None))
            }
            Control::ThreadToggle if self.is_comment() => {
                Some(self.control_ref(control, self.toggle_label(), None))
            }
            Control::StoryLink if !self.is_comment() => {
                let href = self
                    .data
                    .url
                    .clone()
                    .unwrap_or_else(|| format!("{ITEM_URL}{}", self.data.id));
                Some(self.control_ref(control, self.data.text.clone(), Some(href)))
            }
            Control::CommentsLink if !self.is_comment() => Some(self.control_ref(
                control,
                "comments".to_string(),
                Some(format!("{ITEM_URL}{}", self.data.id)),
            )),
            _ => None,
        }
    }

    fn click(&self, control: &ControlRef) {
        let row_id = self.data.id.clone();
        debug!(row_id = %row_id, control = ?control.control, "control clicked");
        match control.control {
            Control::Upvote => {
                self.vote.set(Some(VoteDirection::Up));
                self.shared.push(PageEvent::Voted {
                    row_id,
                    direction: Some(VoteDirection::Up),
                });
            }
            Control::Downvote => {
                self.vote.set(Some(VoteDirection::Down));
                self.shared.push(PageEvent::Voted {
                    row_id,
                    direction: Some(VoteDirection::Down),
                });
            }
            Control::Unvote => {
                self.vote.set(None);
                self.shared.push(PageEvent::Voted {
                    row_id,
                    direction: None,
                });
            }
            Control::Reply => {
                let open = !self.reply_open.get();
                self.reply_open.set(open);
                *self.shared.focus.borrow_mut() = if open {
                    Focus::Input {
                        row_id: Some(row_id.clone()),
                        reply: true,
                    }
                } else {
                    Focus::Body
                };
                self.shared.push(PageEvent::ReplyToggled { row_id, open });
            }
            Control::Favorite => self.shared.push(PageEvent::Favorite { row_id }),
            Control::Flag => self.shared.push(PageEvent::Flag { row_id }),
            Control::ThreadToggle => {
                let collapsed = self.toggle_thread();
                self.shared
                    .push(PageEvent::ThreadToggled { row_id, collapsed });
            }
            Control::StoryLink | Control::CommentsLink => {
                if let Some(href) = &control.href {
                    self.shared.push(PageEvent::OpenUrl(href.clone()));
                }
            }
        }
    }

    fn add_listener(&self, _event: RowEvent, listener: RowListener) {
        self.listeners.borrow_mut().push(listener);
    }

    fn remove_listener(&self, _event: RowEvent, listener: &RowListener) {
        self.listeners
            .borrow_mut()
            .retain(|l| !Rc::ptr_eq(l, listener));
    }
}

pub struct MemoryPage {
    item_id: Option<String>,
    rows: Vec<Rc<MemoryRow>>,
    shared: Rc<Shared>,
}

impl MemoryPage {
    pub fn new(item_id: Option<String>, rows: Vec<RowData>) -> Self {
        let shared = Rc::new(Shared::default());
        let rows: Vec<Rc<MemoryRow>> = rows
            .into_iter()
            .map(|data| Rc::new(MemoryRow::new(data, Rc::clone(&shared))))
            .collect();

        for (i, row) in rows.iter().enumerate() {
            if row.is_comment() {
                let subtree: Vec<Rc<MemoryRow>> = rows[i + 1..]
                    .iter()
                    .take_while(|r| r.is_comment() && r.depth() > row.depth())
                    .cloned()
                    .collect();
                *row.subtree.borrow_mut() = subtree;
            }
        }

        Self {
            item_id,
            rows,
            shared,
        }
    }

    /// Build a thread page: the story row followed by its comments in
    /// depth-first order.
    pub fn from_thread(item: &Item) -> Self {
        let mut rows = vec![RowData::from_item(item, 0, None)];
        fn walk(children: &[Item], depth: u32, rows: &mut Vec<RowData>) {
            for child in children {
                rows.push(RowData::from_item(child, depth, None));
                walk(&child.children, depth + 1, rows);
            }
        }
        walk(&item.children, 0, &mut rows);
        Self::new(Some(item.id.clone()), rows)
    }

    pub fn from_front_page(stories: &[Item]) -> Self {
        let rows = stories
            .iter()
            .enumerate()
            .map(|(i, item)| RowData::from_item(item, 0, Some(i as u32 + 1)))
            .collect();
        Self::new(None, rows)
    }

    pub fn rows(&self) -> &[Rc<MemoryRow>] {
        &self.rows
    }

    pub fn row(&self, id: &str) -> Option<&Rc<MemoryRow>> {
        self.rows.iter().find(|r| r.id() == id)
    }

    /// Rows not hidden under a collapsed thread, in page order.
    pub fn shown_rows(&self) -> impl Iterator<Item = &Rc<MemoryRow>> {
        self.rows.iter().filter(|r| r.is_shown())
    }

    pub fn set_focus(&self, focus: Focus) {
        *self.shared.focus.borrow_mut() = focus;
    }

    pub fn drain_events(&self) -> Vec<PageEvent> {
        self.shared.events.borrow_mut().drain(..).collect()
    }

    fn rows_of(&self, kind: EntityKind) -> Vec<Rc<dyn Row>> {
        self.rows
            .iter()
            .filter(|r| r.data.kind == kind)
            .map(|r| Rc::clone(r) as Rc<dyn Row>)
            .collect()
    }
}

impl Page for MemoryPage {
    fn item_id(&self) -> Option<String> {
        self.item_id.clone()
    }

    fn comment_rows(&self) -> Vec<Rc<dyn Row>> {
        self.rows_of(EntityKind::Comment)
    }

    fn story_rows(&self) -> Vec<Rc<dyn Row>> {
        self.rows_of(EntityKind::Story)
    }

    fn focus(&self) -> Focus {
        self.shared.focus.borrow().clone()
    }

    fn blur(&self) {
        *self.shared.focus.borrow_mut() = Focus::Body;
    }

    fn scroll_into_view(&self, row_id: &str) {
        self.shared
            .push(PageEvent::ScrollTo(Some(row_id.to_string())));
    }

    fn scroll_to_top(&self) {
        self.shared.push(PageEvent::ScrollTo(None));
    }

    fn open_url(&self, url: &str) {
        self.shared.push(PageEvent::OpenUrl(url.to_string()));
    }

    fn dispatch_click(&self, target: &ClickTarget) {
        let Some(row) = target.row_id.as_deref().and_then(|id| self.row(id)) else {
            return;
        };
        row.fire(RowEvent::Click);
    }
}
