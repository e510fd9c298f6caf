//! Application loop.
//! Uses trait objects for storage and the activity API, generics for the
//! terminal (due to dyn-compatibility).

use crate::activity::{ActivityTrail, ListenerId, ToggleError, TrailEvent};
use crate::adapters::memory_page::{MemoryPage, MemoryRow, PageEvent};
use crate::domain::{ActivityKind, EntityKind, VoteDirection};
use crate::keyboard::{Dispatch, KeyboardStateMachine};
use crate::keymap::{build_default_keymap, Action};
use crate::ports::page::{ClickTarget, Page};
use crate::ports::{ActivitySnapshot, KeyValueStore, Terminal, TerminalEvent};
use crate::traversal::TraversalController;
use crate::ui::styles::Palette;
use crate::ui::{help, thread};
use anyhow::Result;
use ratatui::layout::{Constraint, Layout};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_millis(50);

/// Application state.
pub struct App {
    page: Rc<MemoryPage>,
    machine: KeyboardStateMachine,
    trail: Option<Rc<ActivityTrail>>,
    trail_listener: Option<ListenerId>,
    status: Rc<RefCell<Option<String>>>,
    opener: Box<dyn Fn(&str)>,
    palette: Palette,
    scroll: usize,
    /// Row to bring into view on the next draw.
    follow: Option<String>,
    hits: Vec<thread::Hit>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        page: Rc<MemoryPage>,
        store: Rc<dyn KeyValueStore>,
        trail: Option<Rc<ActivityTrail>>,
        palette: Palette,
        opener: Box<dyn Fn(&str)>,
    ) -> Self {
        let controller = if page.item_id().is_some() {
            TraversalController::comments(&*page, store)
        } else {
            TraversalController::stories(&*page, store)
        };
        let dyn_page: Rc<dyn Page> = page.clone();
        let mut machine = KeyboardStateMachine::new(dyn_page, controller, build_default_keymap());
        machine.attach();

        let trail_listener = trail.as_ref().map(|trail| {
            apply_snapshot(&page, &trail.snapshot());
            let badge_page = Rc::clone(&page);
            let weak: Weak<ActivityTrail> = Rc::downgrade(trail);
            trail.add_listener(Rc::new(move |event: &TrailEvent| match event {
                TrailEvent::Synced => {
                    if let Some(trail) = weak.upgrade() {
                        apply_snapshot(&badge_page, &trail.snapshot());
                    }
                }
                TrailEvent::Changed {
                    item_id,
                    kind,
                    state,
                    ..
                } => {
                    if let Some(row) = badge_page.row(item_id) {
                        set_badge(row, *kind, *state);
                    }
                }
            }))
        });

        let mut app = Self {
            page,
            machine,
            trail,
            trail_listener,
            status: Rc::new(RefCell::new(None)),
            opener,
            palette,
            scroll: 0,
            follow: None,
            hits: Vec::new(),
            should_quit: false,
        };
        app.process_page_events();
        app
    }

    /// Must run inside a `LocalSet`: activity requests are spawned as
    /// local tasks.
    pub async fn run<T: Terminal>(&mut self, terminal: &mut T) -> Result<()> {
        if let Some(trail) = self.trail.clone() {
            let status = Rc::clone(&self.status);
            tokio::task::spawn_local(async move {
                if let Err(e) = trail.sync().await {
                    warn!(error = %e, "activity sync failed");
                    *status.borrow_mut() = Some(format!("Activity sync failed: {e}"));
                }
            });
        }

        let result = self.event_loop(terminal).await;
        self.shutdown();
        result
    }

    async fn event_loop<T: Terminal>(&mut self, terminal: &mut T) -> Result<()> {
        while !self.should_quit {
            self.draw(terminal)?;

            match terminal.poll_event(Duration::ZERO)? {
                Some(event) => {
                    self.handle_event(event);
                    // Let spawned requests make progress between events.
                    tokio::task::yield_now().await;
                }
                None => tokio::time::sleep(TICK).await,
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.machine.detach();
        if let Some(trail) = &self.trail {
            if let Some(id) = self.trail_listener.take() {
                trail.remove_listener(id);
            }
            trail.teardown();
        }
        info!("app shut down");
    }

    pub fn status(&self) -> Option<String> {
        self.status.borrow().clone()
    }

    pub fn machine(&self) -> &KeyboardStateMachine {
        &self.machine
    }

    fn set_status(&self, message: impl Into<String>) {
        *self.status.borrow_mut() = Some(message.into());
    }

    fn title(&self) -> String {
        let location = match self.page.item_id() {
            Some(id) => format!("item {id}"),
            None => "front page".to_string(),
        };
        match &self.trail {
            Some(trail) => format!("hnav | {location} | {}", trail.username()),
            None => format!("hnav | {location}"),
        }
    }

    fn draw<T: Terminal>(&mut self, terminal: &mut T) -> Result<()> {
        let title = self.title();
        let page = &self.page;
        let palette = &self.palette;
        let active = self
            .machine
            .controller()
            .active()
            .map(|e| e.id().to_string());
        let help_entries = self
            .machine
            .help_open()
            .then(|| self.machine.keymap().help_entries());
        let status = self.status.borrow().clone();
        let follow = self.follow.take();
        let scroll = &mut self.scroll;
        let hits = &mut self.hits;

        terminal.draw(|frame| {
            let area = frame.area();
            let chunks = Layout::default()
                .direction(ratatui::layout::Direction::Vertical)
                .constraints([Constraint::Min(1), Constraint::Length(1)])
                .split(area);

            let rows: Vec<&Rc<MemoryRow>> = page.shown_rows().collect();
            // Borders plus horizontal padding.
            let inner_width = chunks[0].width.saturating_sub(4);
            let viewport = chunks[0].height.saturating_sub(2) as usize;

            if let Some(target) = follow
                .as_deref()
                .and_then(|id| rows.iter().position(|r| r.id() == id))
            {
                let heights: Vec<usize> = rows
                    .iter()
                    .map(|r| thread::row_height(r, inner_width, palette))
                    .collect();
                *scroll = thread::scroll_to_fit(&heights, *scroll, target, viewport);
            }
            *scroll = (*scroll).min(rows.len().saturating_sub(1));

            *hits = thread::render(
                frame,
                chunks[0],
                &title,
                &rows,
                *scroll,
                active.as_deref(),
                palette,
            );
            thread::render_status(frame, chunks[1], status.as_deref(), palette);

            if let Some(entries) = &help_entries {
                help::render(frame, area, entries, palette);
            }
        })
    }

    pub fn handle_event(&mut self, event: TerminalEvent) {
        match event {
            TerminalEvent::Key(key) => {
                self.status.borrow_mut().take();
                match self.machine.handle_key(&key) {
                    Dispatch::Handled(Action::Quit) => self.should_quit = true,
                    Dispatch::Handled(action) => debug!(?action, "handled"),
                    Dispatch::Suppressed | Dispatch::Unbound => {}
                }
            }
            TerminalEvent::Click { row, .. } => {
                let target = match self.hits.iter().find(|h| h.y == row) {
                    Some(hit) => ClickTarget {
                        row_id: Some(hit.row_id.clone()),
                        in_input: hit.in_input,
                    },
                    None => ClickTarget::default(),
                };
                self.machine.handle_click(&target);
            }
            TerminalEvent::Resize(_, _) => {}
        }
        self.process_page_events();
    }

    fn process_page_events(&mut self) {
        for event in self.page.drain_events() {
            match event {
                PageEvent::Favorite { row_id } => {
                    if let Some(kind) = self.activity_kind(&row_id, ActivityKind::favorite_for) {
                        self.spawn_toggle(row_id, kind);
                    }
                }
                PageEvent::Flag { row_id } => {
                    if let Some(kind) = self.activity_kind(&row_id, ActivityKind::flag_for) {
                        self.spawn_toggle(row_id, kind);
                    }
                }
                PageEvent::Voted { row_id, direction } => {
                    let message = match direction {
                        Some(VoteDirection::Up) => format!("Upvoted {row_id}"),
                        Some(VoteDirection::Down) => format!("Downvoted {row_id}"),
                        None => format!("Vote removed from {row_id}"),
                    };
                    self.set_status(message);
                }
                PageEvent::OpenUrl(url) => {
                    info!(%url, "opening");
                    (self.opener)(&url);
                    self.set_status(format!("Opened {url}"));
                }
                PageEvent::ScrollTo(Some(row_id)) => self.follow = Some(row_id),
                PageEvent::ScrollTo(None) => {
                    self.follow = None;
                    self.scroll = 0;
                }
                PageEvent::ReplyToggled { .. } | PageEvent::ThreadToggled { .. } => {}
            }
        }
    }

    fn activity_kind(
        &self,
        row_id: &str,
        for_kind: fn(EntityKind) -> ActivityKind,
    ) -> Option<ActivityKind> {
        self.page.row(row_id).map(|row| for_kind(row.data().kind))
    }

    fn spawn_toggle(&self, row_id: String, kind: ActivityKind) {
        let Some(trail) = self.trail.clone() else {
            self.set_status("Set a username to favorite or flag items");
            return;
        };
        let status = Rc::clone(&self.status);
        tokio::task::spawn_local(async move {
            match trail.toggle(&row_id, kind).await {
                Ok(outcome) => debug!(item = %row_id, %kind, ?outcome, "toggle settled"),
                Err(ToggleError::TornDown) => {}
                Err(e) => {
                    warn!(item = %row_id, %kind, error = %e, "toggle reverted");
                    *status.borrow_mut() = Some(format!("Could not update {kind} on {row_id}: {e}"));
                }
            }
        });
    }
}

fn set_badge(row: &MemoryRow, kind: ActivityKind, state: bool) {
    if kind.is_favorite() {
        row.set_favorited(state);
    } else {
        row.set_flagged(state);
    }
}

fn apply_snapshot(page: &MemoryPage, snapshot: &ActivitySnapshot) {
    for row in page.rows() {
        let kind = row.data().kind;
        row.set_favorited(snapshot.contains(row.id(), ActivityKind::favorite_for(kind)));
        row.set_flagged(snapshot.contains(row.id(), ActivityKind::flag_for(kind)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_page::RowData;
    use crate::backoff::BackoffOptions;
    use crate::ports::storage::memory::MemoryStore;
    use crate::ports::{ActivityApi, ApiError, KeyCode, KeyEvent, KeyModifiers};
    use crate::ui::styles::find_palette;
    use async_trait::async_trait;
    use ratatui::{backend::TestBackend, Frame, Terminal as RatatuiTerminal};
    use std::cell::Cell;
    use std::collections::VecDeque;
    use tokio::task::LocalSet;

    struct FakeApi {
        remote: RefCell<ActivitySnapshot>,
        fail_sets: Cell<bool>,
    }

    impl FakeApi {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                remote: RefCell::new(ActivitySnapshot::default()),
                fail_sets: Cell::new(false),
            })
        }
    }

    #[async_trait(?Send)]
    impl ActivityApi for FakeApi {
        async fn fetch(&self, _username: &str) -> Result<ActivitySnapshot, ApiError> {
            Ok(self.remote.borrow().clone())
        }

        async fn set(
            &self,
            item_id: &str,
            kind: ActivityKind,
            state: bool,
            _auth: &str,
        ) -> Result<(), ApiError> {
            if self.fail_sets.get() {
                return Err(ApiError::Server { status: 503 });
            }
            self.remote.borrow_mut().apply(item_id, kind, state);
            Ok(())
        }
    }

    /// Scripted terminal. `None` entries are idle polls; once the script
    /// runs out it answers `q`.
    struct TestTerminal {
        terminal: RatatuiTerminal<TestBackend>,
        script: RefCell<VecDeque<Option<TerminalEvent>>>,
    }

    impl TestTerminal {
        fn new(script: Vec<Option<TerminalEvent>>) -> Self {
            Self {
                terminal: RatatuiTerminal::new(TestBackend::new(60, 20)).unwrap(),
                script: RefCell::new(script.into()),
            }
        }
    }

    impl Terminal for TestTerminal {
        fn draw<F>(&mut self, f: F) -> Result<()>
        where
            F: FnOnce(&mut Frame),
        {
            self.terminal.draw(f)?;
            Ok(())
        }

        fn poll_event(&self, _timeout: Duration) -> Result<Option<TerminalEvent>> {
            Ok(self
                .script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Some(key('q'))))
        }

        fn size(&self) -> Result<(u16, u16)> {
            Ok((60, 20))
        }
    }

    fn key(c: char) -> TerminalEvent {
        TerminalEvent::Key(KeyEvent::plain(KeyCode::Char(c)))
    }

    fn thread_page() -> Rc<MemoryPage> {
        Rc::new(MemoryPage::new(
            Some("100".to_string()),
            vec![
                RowData::story("100", 1, "Story", Some("https://example.com/post")),
                RowData::comment("a", 0, "first"),
                RowData::comment("a1", 1, "reply"),
                RowData::comment("b", 0, "second"),
            ],
        ))
    }

    fn backoff() -> BackoffOptions {
        BackoffOptions {
            sleep_between_attempts_ms: 10,
            retries: Some(1),
            base_delay_ms: 10,
            max_delay_ms: 10,
            jitter: false,
        }
    }

    fn app_with(page: Rc<MemoryPage>, api: Rc<FakeApi>) -> (App, Rc<ActivityTrail>) {
        let store = Rc::new(MemoryStore::default());
        let trail = ActivityTrail::new("pg", Some("tok".to_string()), api, store.clone(), backoff());
        let app = App::new(
            page,
            store,
            Some(Rc::clone(&trail)),
            find_palette("dark").unwrap(),
            Box::new(|_| {}),
        );
        (app, trail)
    }

    #[tokio::test(start_paused = true)]
    async fn run_quits_and_tears_down() {
        LocalSet::new()
            .run_until(async {
                let page = thread_page();
                let (mut app, trail) = app_with(Rc::clone(&page), FakeApi::new());
                let mut terminal = TestTerminal::new(vec![Some(key('j')), None]);

                app.run(&mut terminal).await.unwrap();

                assert!(app.should_quit);
                assert!(!app.machine().is_attached());
                let err = trail.toggle("a", ActivityKind::FavoriteComment).await;
                assert_eq!(err, Err(ToggleError::TornDown));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn favorite_key_toggles_badge_through_trail() {
        LocalSet::new()
            .run_until(async {
                let page = thread_page();
                let api = FakeApi::new();
                let (mut app, trail) = app_with(Rc::clone(&page), Rc::clone(&api));

                app.handle_event(key('j'));
                app.handle_event(key('f'));
                tokio::time::sleep(Duration::from_secs(1)).await;

                assert!(page.row("a").unwrap().favorited());
                assert!(trail.is_set("a", ActivityKind::FavoriteComment));
                assert!(api.remote.borrow().contains("a", ActivityKind::FavoriteComment));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_toggle_reverts_badge_and_reports() {
        LocalSet::new()
            .run_until(async {
                let page = thread_page();
                let api = FakeApi::new();
                api.fail_sets.set(true);
                let (mut app, _trail) = app_with(Rc::clone(&page), api);

                app.handle_event(key('j'));
                app.handle_event(TerminalEvent::Key(KeyEvent {
                    code: KeyCode::Char('x'),
                    modifiers: KeyModifiers::CTRL,
                }));
                tokio::time::sleep(Duration::from_secs(1)).await;

                assert!(!page.row("a").unwrap().flagged());
                let status = app.status().unwrap();
                assert!(status.starts_with("Could not update flag_comment on a"), "{status}");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn clicks_activate_rows_and_blank_space_deactivates() {
        LocalSet::new()
            .run_until(async {
                let page = thread_page();
                let (mut app, _trail) = app_with(page, FakeApi::new());
                let mut terminal = TestTerminal::new(Vec::new());
                app.draw(&mut terminal).unwrap();

                let hit = app.hits.iter().find(|h| h.row_id == "b").unwrap().clone();
                app.handle_event(TerminalEvent::Click {
                    column: 5,
                    row: hit.y,
                });
                assert_eq!(app.machine().controller().active().map(|e| e.id()), Some("b"));

                app.handle_event(TerminalEvent::Click { column: 5, row: 18 });
                assert!(app.machine().controller().active().is_none());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn without_a_user_activity_keys_only_report() {
        LocalSet::new()
            .run_until(async {
                let page = thread_page();
                let mut app = App::new(
                    Rc::clone(&page),
                    Rc::new(MemoryStore::default()),
                    None,
                    find_palette("dark").unwrap(),
                    Box::new(|_| {}),
                );

                app.handle_event(key('j'));
                app.handle_event(key('f'));

                assert!(!page.row("a").unwrap().favorited());
                assert!(app.status().unwrap().contains("username"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn help_overlay_swallows_movement() {
        LocalSet::new()
            .run_until(async {
                let (mut app, _trail) = app_with(thread_page(), FakeApi::new());
                app.handle_event(TerminalEvent::Key(KeyEvent {
                    code: KeyCode::Char('?'),
                    modifiers: KeyModifiers::CTRL,
                }));
                assert!(app.machine().help_open());

                app.handle_event(key('j'));
                assert!(app.machine().controller().active().is_none());

                app.handle_event(TerminalEvent::Key(KeyEvent::plain(KeyCode::Esc)));
                assert!(!app.machine().help_open());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn story_list_opens_links_through_opener() {
        LocalSet::new()
            .run_until(async {
                let page = Rc::new(MemoryPage::new(
                    None,
                    vec![RowData::story("1", 1, "Launch", Some("https://example.com/a"))],
                ));
                let opened = Rc::new(RefCell::new(Vec::new()));
                let sink = Rc::clone(&opened);
                let mut app = App::new(
                    page,
                    Rc::new(MemoryStore::default()),
                    None,
                    find_palette("dark").unwrap(),
                    Box::new(move |url| sink.borrow_mut().push(url.to_string())),
                );

                app.handle_event(key('j'));
                app.handle_event(key('o'));

                assert_eq!(*opened.borrow(), vec!["https://example.com/a".to_string()]);
            })
            .await;
    }
}
