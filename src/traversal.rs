//! Active-entity state machine over an ordered list of comments or stories.
//!
//! The controller owns the [`OrderedList`] built from a page snapshot and at
//! most one active entity. Traversal is visibility-aware: hidden entities
//! (collapsed or dead) and the subtrees under them are skipped unless the
//! caller asks for raw neighbors.

use crate::domain::{CollapseToggle, Direction, Entity, EntityKind, OrderedList, VoteDirection};
use crate::ports::page::{ControlRef, Page, RowEvent, RowListener};
use crate::ports::KeyValueStore;
use std::rc::Rc;
use tracing::{debug, warn};

pub struct TraversalController {
    kind: EntityKind,
    list: OrderedList<Entity>,
    active: Option<usize>,
    store: Rc<dyn KeyValueStore>,
    storage_key: String,
}

impl TraversalController {
    pub fn new(
        kind: EntityKind,
        entities: Vec<Entity>,
        store: Rc<dyn KeyValueStore>,
        page_key: &str,
    ) -> Self {
        let list = OrderedList::new(entities, |e: &Entity| e.id().to_string());
        Self {
            kind,
            list,
            active: None,
            store,
            storage_key: format!("active:{}:{}", kind.storage_segment(), page_key),
        }
    }

    /// Controller over every comment row on the page.
    pub fn comments(page: &dyn Page, store: Rc<dyn KeyValueStore>) -> Self {
        let entities = page.comment_rows().into_iter().map(Entity::comment).collect();
        Self::new(EntityKind::Comment, entities, store, &page.page_key())
    }

    /// Controller over every story row on the page.
    pub fn stories(page: &dyn Page, store: Rc<dyn KeyValueStore>) -> Self {
        let entities = page.story_rows().into_iter().map(Entity::story).collect();
        Self::new(EntityKind::Story, entities, store, &page.page_key())
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.list.get(id)
    }

    pub fn first(&self) -> Option<&Entity> {
        self.list.first()
    }

    pub fn last(&self) -> Option<&Entity> {
        self.list.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.list.iter()
    }

    pub fn active(&self) -> Option<&Entity> {
        self.active.and_then(|pos| self.list.at(pos))
    }

    /// Make `id` the active entity, deactivating any previous one first.
    /// Returns `false` if `id` is not in the list.
    pub fn activate(&mut self, id: &str) -> bool {
        let Some(pos) = self.list.position(id) else {
            return false;
        };
        if let Some(prev) = self.active.take() {
            if prev != pos {
                debug!(id = self.list.key_at(prev).unwrap_or_default(), "deactivated");
            }
        }
        self.active = Some(pos);
        debug!(id, kind = ?self.kind, "activated");
        if let Err(e) = self.store.set_item(&self.storage_key, id) {
            warn!(error = %e, "could not persist active entity");
        }
        true
    }

    pub fn deactivate(&mut self) {
        if self.active.take().is_some() {
            debug!(kind = ?self.kind, "deactivated");
            if let Err(e) = self.store.remove_item(&self.storage_key) {
                warn!(error = %e, "could not clear persisted active entity");
            }
        }
    }

    /// Re-activate the entity persisted for this page, if it still exists.
    pub fn restore(&mut self) -> Option<&Entity> {
        let stored = match self.store.get_item(&self.storage_key) {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(error = %e, "could not read persisted active entity");
                return None;
            }
        };
        if self.activate(&stored) {
            self.active()
        } else {
            debug!(id = %stored, "persisted active entity no longer on page");
            None
        }
    }

    pub fn get_next(&self, id: &str, skip_hidden: bool) -> Option<&Entity> {
        let origin = self.list.position(id)?;
        let pos = self.next_position(origin, skip_hidden)?;
        self.list.at(pos)
    }

    pub fn get_previous(&self, id: &str, skip_hidden: bool) -> Option<&Entity> {
        let origin = self.list.position(id)?;
        let pos = self.previous_position(origin, skip_hidden)?;
        self.list.at(pos)
    }

    fn next_position(&self, origin: usize, skip_hidden: bool) -> Option<usize> {
        let origin_entity = self.list.at(origin)?;
        let origin_indent = origin_entity.indent();
        let mut pos = origin + 1;
        if skip_hidden && origin_entity.collapsed() {
            while self.list.at(pos).is_some_and(|e| e.indent() > origin_indent) {
                pos += 1;
            }
        }
        loop {
            let candidate = self.list.at(pos)?;
            if !skip_hidden || !candidate.hidden() {
                return Some(pos);
            }
            // A hidden root takes its deeper descendants with it. A collapsed
            // leaf also hides what follows it down to the origin's level; a
            // dead leaf is skipped alone.
            let has_descendants = self
                .list
                .at(pos + 1)
                .is_some_and(|next| next.indent() > candidate.indent());
            let base = if !has_descendants && candidate.collapsed() {
                origin_indent.min(candidate.indent())
            } else {
                candidate.indent()
            };
            pos += 1;
            while self.list.at(pos).is_some_and(|e| e.indent() > base) {
                pos += 1;
            }
        }
    }

    fn previous_position(&self, origin: usize, skip_hidden: bool) -> Option<usize> {
        let mut pos = origin.checked_sub(1)?;
        loop {
            let candidate = self.list.at(pos)?;
            if !skip_hidden {
                return Some(pos);
            }
            if candidate.hidden() {
                pos = pos.checked_sub(1)?;
                continue;
            }
            match self.hidden_ancestor(pos) {
                Some(root) => pos = root.checked_sub(1)?,
                None => return Some(pos),
            }
        }
    }

    /// Closest ancestor of `pos` that is hidden.
    fn hidden_ancestor(&self, pos: usize) -> Option<usize> {
        let mut level = self.list.at(pos)?.indent();
        for q in (0..pos).rev() {
            if level == 0 {
                break;
            }
            let e = self.list.at(q)?;
            if e.indent() < level {
                if e.hidden() {
                    return Some(q);
                }
                level = e.indent();
            }
        }
        None
    }

    /// Whether the entity at `id` has deeper-indented descendants.
    pub fn has_descendants(&self, id: &str) -> bool {
        let Some(pos) = self.list.position(id) else {
            return false;
        };
        match (self.list.at(pos), self.list.at(pos + 1)) {
            (Some(e), Some(next)) => next.indent() > e.indent(),
            _ => false,
        }
    }

    /// First entity after `id`'s subtree, i.e. the first following entity
    /// whose indent is not deeper than `id`'s.
    pub fn subtree_end(&self, id: &str) -> Option<&Entity> {
        let pos = self.list.position(id)?;
        let level = self.list.at(pos)?.indent();
        self.list
            .iter()
            .skip(pos + 1)
            .find(|e| e.indent() <= level)
    }

    /// Step one entity at a time from the active entity until a hidden one
    /// is found.
    pub fn find_closest_collapsed(&self, direction: Direction) -> Option<&Entity> {
        let start = self.active?;
        match direction {
            Direction::Down => self.list.iter().skip(start + 1).find(|e| e.hidden()),
            Direction::Up => self
                .list
                .iter()
                .take(start)
                .rev()
                .find(|e| e.hidden()),
        }
    }

    pub fn closest_collapsed_up(&self) -> Option<&Entity> {
        self.find_closest_collapsed(Direction::Up)
    }

    pub fn closest_collapsed_down(&self) -> Option<&Entity> {
        self.find_closest_collapsed(Direction::Down)
    }

    /// Next visible entity at the same indent as the active one, without
    /// leaving the active entity's parent.
    pub fn sibling(&self, direction: Direction) -> Option<&Entity> {
        let start = self.active?;
        let level = self.list.at(start)?.indent();
        let mut candidates: Box<dyn Iterator<Item = &Entity>> = match direction {
            Direction::Down => Box::new(self.list.iter().skip(start + 1)),
            Direction::Up => Box::new(self.list.iter().take(start).rev()),
        };
        candidates
            .find(|e| e.indent() < level || (e.indent() == level && !e.hidden()))
            .filter(|e| e.indent() == level)
    }

    // ─── Action proxies ───

    pub fn favorite(&self) -> bool {
        self.active().is_some_and(Entity::favorite)
    }

    pub fn flag(&self) -> bool {
        self.active().is_some_and(Entity::flag)
    }

    pub fn toggle_vote(&self, direction: VoteDirection) -> bool {
        self.active().is_some_and(|e| e.toggle_vote(direction))
    }

    pub fn reply(&self) -> Option<ControlRef> {
        self.active().and_then(Entity::reply)
    }

    pub fn collapse_toggle(&self) -> Option<CollapseToggle> {
        self.active().and_then(Entity::collapse_toggle)
    }

    // ─── Listener management ───

    pub fn add_event_listener(&self, event: RowEvent, listener: &RowListener) {
        for entity in &self.list {
            entity.add_listener(event, Rc::clone(listener));
        }
    }

    pub fn remove_event_listener(&self, event: RowEvent, listener: &RowListener) {
        for entity in &self.list {
            entity.remove_listener(event, listener);
        }
    }
}
