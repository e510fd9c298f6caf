//! Keyboard and click dispatch over a [`TraversalController`].
//!
//! Keys are resolved through the [`Keymap`] against the contexts the page
//! and overlay state imply, then applied to the controller. Row clicks are
//! observed through a single listener attached to every entity, so clicking
//! a row activates it and clicking elsewhere deactivates.

use crate::domain::{Direction, EntityKind, VoteDirection};
use crate::keymap::{Action, Context, Keymap};
use crate::ports::page::{ClickTarget, Control, ControlRef, Focus, Page, RowEvent, RowListener};
use crate::ports::{KeyCode, KeyEvent};
use crate::traversal::TraversalController;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Result of feeding one key to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No binding in the current contexts, or the machine is detached.
    Unbound,
    /// Swallowed by the input guard or the help overlay.
    Suppressed,
    Handled(Action),
}

pub struct KeyboardStateMachine {
    page: Rc<dyn Page>,
    controller: TraversalController,
    keymap: Keymap,
    open_reply: Option<ControlRef>,
    help_open: bool,
    clicked: Rc<RefCell<Option<String>>>,
    click_listener: RowListener,
    attached: bool,
}

impl KeyboardStateMachine {
    pub fn new(page: Rc<dyn Page>, controller: TraversalController, keymap: Keymap) -> Self {
        let clicked: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&clicked);
        let click_listener: RowListener = Rc::new(move |id: &str| {
            *sink.borrow_mut() = Some(id.to_string());
        });
        Self {
            page,
            controller,
            keymap,
            open_reply: None,
            help_open: false,
            clicked,
            click_listener,
            attached: false,
        }
    }

    /// Start handling events: restores the persisted active entity and
    /// binds the row click listener.
    pub fn attach(&mut self) {
        if self.attached {
            return;
        }
        if let Some(restored) = self.controller.restore() {
            let id = restored.id().to_string();
            self.page.scroll_into_view(&id);
        }
        self.controller
            .add_event_listener(RowEvent::Click, &self.click_listener);
        self.attached = true;
        debug!(kind = ?self.controller.kind(), entities = self.controller.len(), "keyboard attached");
    }

    /// Remove every binding. Events delivered afterwards are ignored.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.controller
            .remove_event_listener(RowEvent::Click, &self.click_listener);
        self.attached = false;
        self.help_open = false;
        debug!("keyboard detached");
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn controller(&self) -> &TraversalController {
        &self.controller
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn help_open(&self) -> bool {
        self.help_open
    }

    /// Reply form opened from the keyboard and not yet closed.
    pub fn open_reply(&self) -> Option<&ControlRef> {
        self.open_reply.as_ref()
    }

    pub fn contexts(&self) -> Vec<Context> {
        let mut contexts = vec![Context::Global];
        contexts.push(match self.controller.kind() {
            EntityKind::Comment => Context::Comments,
            EntityKind::Story => Context::Stories,
        });
        if self.help_open {
            contexts.push(Context::Help);
        }
        contexts
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> Dispatch {
        if !self.attached {
            return Dispatch::Unbound;
        }
        if self.prevent(key) {
            return Dispatch::Suppressed;
        }

        let Some(action) = self
            .keymap
            .lookup(key.code, key.modifiers, &self.contexts())
        else {
            return Dispatch::Unbound;
        };

        if self.help_open && !matches!(action, Action::DismissHelp | Action::Quit) {
            return Dispatch::Suppressed;
        }
        if action == Action::ShowHelp && self.help_open {
            return Dispatch::Suppressed;
        }

        debug!(?action, "key dispatched");
        self.perform(action);
        Dispatch::Handled(action)
    }

    /// Input guard. Anchors are blurred and dispatch continues; inside a
    /// text field only Escape from the active entity's reply box gets
    /// through.
    fn prevent(&self, key: &KeyEvent) -> bool {
        match self.page.focus() {
            Focus::Body => false,
            Focus::Anchor => {
                self.page.blur();
                false
            }
            Focus::Input { row_id, reply } => {
                let in_active_reply = reply
                    && row_id.is_some()
                    && row_id.as_deref() == self.controller.active().map(|e| e.id());
                !(in_active_reply && key.code == KeyCode::Esc)
            }
        }
    }

    fn perform(&mut self, action: Action) {
        match action {
            Action::Next => self.step(Direction::Down, true),
            Action::Previous => self.step(Direction::Up, true),
            Action::NextIncludingHidden => self.step(Direction::Down, false),
            Action::PreviousIncludingHidden => self.step(Direction::Up, false),
            Action::NextSibling => {
                let target = self.controller.sibling(Direction::Down).map(|e| e.id().to_string());
                self.move_to(target);
            }
            Action::PreviousSibling => {
                let target = self.controller.sibling(Direction::Up).map(|e| e.id().to_string());
                self.move_to(target);
            }
            Action::ClosestCollapsedUp => {
                let target = self.controller.closest_collapsed_up().map(|e| e.id().to_string());
                self.move_to(target);
            }
            Action::ClosestCollapsedDown => {
                let target = self
                    .controller
                    .closest_collapsed_down()
                    .map(|e| e.id().to_string());
                self.move_to(target);
            }
            Action::ScrollTop => self.page.scroll_to_top(),
            Action::Reply => {
                if let Some(control) = self.controller.reply() {
                    self.open_reply = Some(control);
                }
            }
            Action::Favorite => {
                self.controller.favorite();
            }
            Action::Flag => {
                self.controller.flag();
            }
            Action::VoteUp => {
                self.controller.toggle_vote(VoteDirection::Up);
            }
            Action::VoteDown => {
                self.controller.toggle_vote(VoteDirection::Down);
            }
            Action::ToggleCollapse => {
                if let Some(toggle) = self.controller.collapse_toggle() {
                    debug!(?toggle, "thread toggled");
                }
            }
            Action::OpenReference(n) => {
                if let Some(url) = self.controller.active().and_then(|e| e.reference_link(n)) {
                    self.page.open_url(&url);
                }
            }
            Action::OpenLink => self.open_control(Control::StoryLink),
            Action::OpenComments => self.open_control(Control::CommentsLink),
            Action::Escape => self.escape(),
            Action::ShowHelp => self.help_open = true,
            Action::DismissHelp => self.help_open = false,
            // Quitting belongs to the host.
            Action::Quit => {}
        }
    }

    fn step(&mut self, direction: Direction, skip_hidden: bool) {
        let target = match self.controller.active() {
            Some(active) => match direction {
                Direction::Down => self.controller.get_next(active.id(), skip_hidden),
                Direction::Up => self.controller.get_previous(active.id(), skip_hidden),
            },
            None => {
                let edge = match direction {
                    Direction::Down => self.controller.first(),
                    Direction::Up => self.controller.last(),
                };
                match edge {
                    Some(e) if skip_hidden && e.hidden() => match direction {
                        Direction::Down => self.controller.get_next(e.id(), true),
                        Direction::Up => self.controller.get_previous(e.id(), true),
                    },
                    other => other,
                }
            }
        }
        .map(|e| e.id().to_string());
        self.move_to(target);
    }

    fn move_to(&mut self, target: Option<String>) {
        let Some(id) = target else {
            return;
        };
        if self.controller.activate(&id) {
            self.page.scroll_into_view(&id);
        }
    }

    fn open_control(&self, control: Control) {
        let href = self
            .controller
            .active()
            .and_then(|e| e.control(control))
            .and_then(|c| c.href);
        if let Some(href) = href {
            self.page.open_url(&href);
        }
    }

    fn escape(&mut self) {
        match self.open_reply.take() {
            Some(reply) => {
                // The reply link toggles the form closed.
                if let Some(entity) = self.controller.get(&reply.row_id) {
                    entity.reply();
                }
                self.page.blur();
            }
            None => self.controller.deactivate(),
        }
    }

    /// Click handling: a click inside an entity row activates it, a click
    /// outside every row and input deactivates.
    pub fn handle_click(&mut self, target: &ClickTarget) {
        if !self.attached {
            return;
        }
        self.page.dispatch_click(target);
        let clicked = self.clicked.borrow_mut().take();
        match clicked {
            Some(id) => {
                self.controller.activate(&id);
            }
            None if target.row_id.is_none() && !target.in_input => self.controller.deactivate(),
            None => {}
        }
    }
}
