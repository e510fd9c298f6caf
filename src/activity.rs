//! Activity trail: a user's favorite/flag state, synchronized against the
//! remote activity API with optimistic local updates.
//!
//! The local snapshot is what UI renders from. A toggle runs in three
//! phases: [`ActivityTrail::apply`] flips the bit and notifies listeners,
//! the mutation is sent through the backoff executor, then
//! [`ActivityTrail::settle`] either confirms the bit or reverts it to its
//! prior value and notifies again.

use crate::backoff::{with_backoff_if, BackoffOptions};
use crate::domain::ActivityKind;
use crate::ports::{ActivityApi, ActivitySnapshot, ApiError, KeyValueStore};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToggleError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("activity trail was torn down")]
    TornDown,
}

/// Phase of a single-item change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TogglePhase {
    Applied,
    Confirmed,
    Reverted,
}

/// Notification delivered to trail listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailEvent {
    /// The whole snapshot was reconciled with the remote store.
    Synced,
    Changed {
        item_id: String,
        kind: ActivityKind,
        state: bool,
        phase: TogglePhase,
    },
}

impl TrailEvent {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            TrailEvent::Changed {
                phase: TogglePhase::Confirmed | TogglePhase::Reverted,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The item was already in the requested state.
    Unchanged,
    Confirmed,
}

/// An applied but not yet settled local flip.
#[derive(Debug)]
#[must_use = "a pending toggle must be settled"]
pub struct PendingToggle {
    item_id: String,
    kind: ActivityKind,
    prior: bool,
    target: bool,
}

impl PendingToggle {
    pub fn target(&self) -> bool {
        self.target
    }
}

pub type TrailListener = Rc<dyn Fn(&TrailEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct ActivityTrail {
    username: String,
    auth_token: Option<String>,
    api: Rc<dyn ActivityApi>,
    store: Rc<dyn KeyValueStore>,
    backoff: BackoffOptions,
    snapshot: RefCell<ActivitySnapshot>,
    in_flight: RefCell<HashMap<(ActivityKind, String), u32>>,
    listeners: RefCell<Vec<(ListenerId, TrailListener)>>,
    next_listener: Cell<u64>,
    torn_down: Cell<bool>,
}

impl ActivityTrail {
    /// Build a trail seeded from local storage. Call [`sync`](Self::sync)
    /// to reconcile with the remote store.
    pub fn new(
        username: &str,
        auth_token: Option<String>,
        api: Rc<dyn ActivityApi>,
        store: Rc<dyn KeyValueStore>,
        backoff: BackoffOptions,
    ) -> Rc<Self> {
        let trail = Self {
            username: username.to_string(),
            auth_token,
            api,
            store,
            backoff,
            snapshot: RefCell::new(ActivitySnapshot::default()),
            in_flight: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            torn_down: Cell::new(false),
        };
        if let Some(local) = trail.load_local() {
            *trail.snapshot.borrow_mut() = local;
        }
        Rc::new(trail)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn storage_key(&self) -> String {
        format!("trail:{}", self.username)
    }

    fn load_local(&self) -> Option<ActivitySnapshot> {
        let raw = match self.store.get_item(&self.storage_key()) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "could not read stored activity trail");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "stored activity trail is malformed, ignoring");
                None
            }
        }
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&*self.snapshot.borrow()) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "could not encode activity trail");
                return;
            }
        };
        if let Err(e) = self.store.set_item(&self.storage_key(), &json) {
            warn!(error = %e, "could not persist activity trail");
        }
    }

    pub fn is_set(&self, item_id: &str, kind: ActivityKind) -> bool {
        self.snapshot.borrow().contains(item_id, kind)
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        self.snapshot.borrow().clone()
    }

    /// Fetch the remote snapshot and merge it into local state.
    ///
    /// Remote wins on every conflict except for bits with a mutation still
    /// in flight, which keep their optimistic local value until they settle.
    pub async fn sync(&self) -> Result<(), ApiError> {
        let remote = with_backoff_if(
            || self.api.fetch(&self.username),
            &self.backoff,
            ApiError::is_retryable,
        )
        .await?;

        if self.torn_down.get() {
            return Ok(());
        }

        {
            let mut snapshot = self.snapshot.borrow_mut();
            let in_flight = self.in_flight.borrow();
            let mut merged = remote;
            for ((kind, item_id), _) in in_flight.iter() {
                let local = snapshot.contains(item_id, *kind);
                merged.apply(item_id, *kind, local);
            }
            *snapshot = merged;
        }
        self.persist();
        info!(user = %self.username, "activity trail synced");
        self.notify(&TrailEvent::Synced);
        Ok(())
    }

    pub fn add_listener(&self, listener: TrailListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Drop every listener. Later notifications are no-ops; in-flight
    /// mutations still settle local state.
    pub fn teardown(&self) {
        self.torn_down.set(true);
        self.listeners.borrow_mut().clear();
        debug!(user = %self.username, "activity trail torn down");
    }

    fn notify(&self, event: &TrailEvent) {
        if self.torn_down.get() {
            return;
        }
        // Snapshot so listeners may (un)subscribe while being notified.
        let listeners: Vec<TrailListener> =
            self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Phase one: flip the local bit to `target` and notify. Returns `None`
    /// when the bit is already `target`.
    pub fn apply(&self, item_id: &str, kind: ActivityKind, target: bool) -> Option<PendingToggle> {
        let prior = self.snapshot.borrow_mut().apply(item_id, kind, target);
        if prior == target {
            return None;
        }
        *self
            .in_flight
            .borrow_mut()
            .entry((kind, item_id.to_string()))
            .or_insert(0) += 1;
        self.persist();
        self.notify(&TrailEvent::Changed {
            item_id: item_id.to_string(),
            kind,
            state: target,
            phase: TogglePhase::Applied,
        });
        Some(PendingToggle {
            item_id: item_id.to_string(),
            kind,
            prior,
            target,
        })
    }

    /// Phase three: keep the flip on success, restore the prior value on
    /// failure. Listeners are notified either way.
    pub fn settle(
        &self,
        pending: PendingToggle,
        result: Result<(), ApiError>,
    ) -> Result<ToggleOutcome, ToggleError> {
        let PendingToggle {
            item_id,
            kind,
            prior,
            target,
        } = pending;

        {
            let mut in_flight = self.in_flight.borrow_mut();
            let key = (kind, item_id.clone());
            if let Some(count) = in_flight.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(&key);
                }
            }
        }

        match result {
            Ok(()) => {
                debug!(item_id = %item_id, %kind, state = target, "activity confirmed");
                let state = self.is_set(&item_id, kind);
                self.notify(&TrailEvent::Changed {
                    item_id,
                    kind,
                    state,
                    phase: TogglePhase::Confirmed,
                });
                Ok(ToggleOutcome::Confirmed)
            }
            Err(e) => {
                error!(item_id = %item_id, %kind, error = %e, "activity mutation failed, reverting");
                self.snapshot.borrow_mut().apply(&item_id, kind, prior);
                self.persist();
                self.notify(&TrailEvent::Changed {
                    item_id,
                    kind,
                    state: prior,
                    phase: TogglePhase::Reverted,
                });
                Err(ToggleError::Api(e))
            }
        }
    }

    /// Flip the bit for `(item_id, kind)`.
    pub async fn toggle(
        &self,
        item_id: &str,
        kind: ActivityKind,
    ) -> Result<ToggleOutcome, ToggleError> {
        let target = !self.is_set(item_id, kind);
        self.set_state(item_id, kind, target).await
    }

    /// Drive `(item_id, kind)` to `target`. Already being in `target` is a
    /// successful no-op.
    pub async fn set_state(
        &self,
        item_id: &str,
        kind: ActivityKind,
        target: bool,
    ) -> Result<ToggleOutcome, ToggleError> {
        if self.torn_down.get() {
            return Err(ToggleError::TornDown);
        }
        let Some(pending) = self.apply(item_id, kind, target) else {
            return Ok(ToggleOutcome::Unchanged);
        };
        let result = self.send(item_id, kind, target).await;
        self.settle(pending, result)
    }

    async fn send(&self, item_id: &str, kind: ActivityKind, state: bool) -> Result<(), ApiError> {
        let auth = self.auth_token.as_deref().ok_or(ApiError::MissingAuth)?;
        with_backoff_if(
            || self.api.set(item_id, kind, state, auth),
            &self.backoff,
            ApiError::is_retryable,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::storage::memory::MemoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeApi {
        remote: RefCell<ActivitySnapshot>,
        set_results: RefCell<VecDeque<Result<(), ApiError>>>,
        set_calls: Cell<u32>,
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
            self.set_calls.set(self.set_calls.get() + 1);
            let result = self.set_results.borrow_mut().pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                self.remote.borrow_mut().apply(item_id, kind, state);
            }
            result
        }
    }

    fn fast_backoff() -> BackoffOptions {
        BackoffOptions {
            sleep_between_attempts_ms: 0,
            retries: Some(2),
            base_delay_ms: 10,
            max_delay_ms: 10,
            jitter: false,
        }
    }

    fn trail_with(api: Rc<FakeApi>, store: Rc<MemoryStore>) -> Rc<ActivityTrail> {
        ActivityTrail::new("pg", Some("tok".to_string()), api, store, fast_backoff())
    }

    fn recorder(trail: &ActivityTrail) -> Rc<RefCell<Vec<TrailEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        trail.add_listener(Rc::new(move |e: &TrailEvent| sink.borrow_mut().push(e.clone())));
        events
    }

    const FAV: ActivityKind = ActivityKind::FavoriteComment;

    #[tokio::test(start_paused = true)]
    async fn double_toggle_returns_to_original_state() {
        let api = Rc::new(FakeApi::default());
        let trail = trail_with(api.clone(), Rc::new(MemoryStore::default()));
        let events = recorder(&trail);

        assert_eq!(trail.toggle("42", FAV).await, Ok(ToggleOutcome::Confirmed));
        assert!(trail.is_set("42", FAV));
        assert_eq!(trail.toggle("42", FAV).await, Ok(ToggleOutcome::Confirmed));
        assert!(!trail.is_set("42", FAV));

        let settled: Vec<bool> = events
            .borrow()
            .iter()
            .filter(|e| e.is_settled())
            .map(|e| match e {
                TrailEvent::Changed { state, .. } => *state,
                TrailEvent::Synced => unreachable!(),
            })
            .collect();
        assert_eq!(settled, vec![true, false]);
        assert_eq!(api.set_calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_mutation_rolls_back() {
        let api = Rc::new(FakeApi::default());
        api.set_results
            .borrow_mut()
            .extend([Err(ApiError::Client { status: 400 })]);
        let trail = trail_with(api.clone(), Rc::new(MemoryStore::default()));
        let events = recorder(&trail);

        let before = trail.is_set("7", FAV);
        let result = trail.toggle("7", FAV).await;

        assert_eq!(result, Err(ToggleError::Api(ApiError::Client { status: 400 })));
        assert_eq!(trail.is_set("7", FAV), before);
        assert_eq!(
            *events.borrow(),
            vec![
                TrailEvent::Changed {
                    item_id: "7".to_string(),
                    kind: FAV,
                    state: true,
                    phase: TogglePhase::Applied,
                },
                TrailEvent::Changed {
                    item_id: "7".to_string(),
                    kind: FAV,
                    state: false,
                    phase: TogglePhase::Reverted,
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let api = Rc::new(FakeApi::default());
        api.set_results.borrow_mut().extend([
            Err(ApiError::Network("reset".to_string())),
            Err(ApiError::Server { status: 503 }),
        ]);
        let trail = trail_with(api.clone(), Rc::new(MemoryStore::default()));

        assert_eq!(trail.toggle("7", FAV).await, Ok(ToggleOutcome::Confirmed));
        assert_eq!(api.set_calls.get(), 3);
        assert!(trail.is_set("7", FAV));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_roll_back() {
        let api = Rc::new(FakeApi::default());
        api.set_results
            .borrow_mut()
            .extend((0..3).map(|_| Err(ApiError::Server { status: 500 })));
        let trail = trail_with(api.clone(), Rc::new(MemoryStore::default()));

        let result = trail.toggle("7", FAV).await;
        assert!(matches!(result, Err(ToggleError::Api(ApiError::Server { .. }))));
        assert_eq!(api.set_calls.get(), 3);
        assert!(!trail.is_set("7", FAV));
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_is_not_retried() {
        let api = Rc::new(FakeApi::default());
        api.set_results
            .borrow_mut()
            .extend([Err(ApiError::Unauthorized), Ok(())]);
        let trail = trail_with(api.clone(), Rc::new(MemoryStore::default()));

        let result = trail.toggle("7", FAV).await;
        assert_eq!(result, Err(ToggleError::Api(ApiError::Unauthorized)));
        assert_eq!(api.set_calls.get(), 1);
        assert!(!trail.is_set("7", FAV));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_auth_fails_without_network() {
        let api = Rc::new(FakeApi::default());
        let trail = ActivityTrail::new(
            "pg",
            None,
            api.clone(),
            Rc::new(MemoryStore::default()),
            fast_backoff(),
        );

        let result = trail.toggle("7", FAV).await;
        assert_eq!(result, Err(ToggleError::Api(ApiError::MissingAuth)));
        assert_eq!(api.set_calls.get(), 0);
        assert!(!trail.is_set("7", FAV));
    }

    #[tokio::test(start_paused = true)]
    async fn setting_current_state_is_a_successful_noop() {
        let api = Rc::new(FakeApi::default());
        let trail = trail_with(api.clone(), Rc::new(MemoryStore::default()));
        let events = recorder(&trail);

        assert_eq!(
            trail.set_state("7", FAV, false).await,
            Ok(ToggleOutcome::Unchanged)
        );
        assert_eq!(api.set_calls.get(), 0);
        assert!(events.borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_prefers_remote_state() {
        let api = Rc::new(FakeApi::default());
        api.remote
            .borrow_mut()
            .flag_submission
            .insert("100".to_string());
        let store = Rc::new(MemoryStore::default());
        store.values.borrow_mut().insert(
            "trail:pg".to_string(),
            r#"{"favorite_comment":["5"]}"#.to_string(),
        );

        let trail = trail_with(api, store.clone());
        assert!(trail.is_set("5", FAV));
        let events = recorder(&trail);

        trail.sync().await.unwrap();
        assert!(!trail.is_set("5", FAV));
        assert!(trail.is_set("100", ActivityKind::FlagSubmission));
        assert_eq!(*events.borrow(), vec![TrailEvent::Synced]);

        let stored = store.values.borrow().get("trail:pg").cloned().unwrap();
        let persisted: ActivitySnapshot = serde_json::from_str(&stored).unwrap();
        assert_eq!(persisted, trail.snapshot());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_keeps_in_flight_local_bits() {
        let api = Rc::new(FakeApi::default());
        let trail = trail_with(api, Rc::new(MemoryStore::default()));

        let pending = trail.apply("9", FAV, true).unwrap();
        trail.sync().await.unwrap();
        assert!(trail.is_set("9", FAV));

        trail.settle(pending, Ok(())).unwrap();
        trail.sync().await.unwrap();
        assert!(!trail.is_set("9", FAV));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_local_state_is_ignored() {
        let store = Rc::new(MemoryStore::default());
        store
            .values
            .borrow_mut()
            .insert("trail:pg".to_string(), "not json".to_string());
        let trail = trail_with(Rc::new(FakeApi::default()), store);
        assert_eq!(trail.snapshot(), ActivitySnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_can_be_removed_independently() {
        let trail = trail_with(Rc::new(FakeApi::default()), Rc::new(MemoryStore::default()));
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        let (sink_a, sink_b) = (a.clone(), b.clone());
        let id_a = trail.add_listener(Rc::new(move |_: &TrailEvent| sink_a.set(sink_a.get() + 1)));
        trail.add_listener(Rc::new(move |_: &TrailEvent| sink_b.set(sink_b.get() + 1)));

        trail.toggle("1", FAV).await.unwrap();
        assert!(trail.remove_listener(id_a));
        assert!(!trail.remove_listener(id_a));
        trail.toggle("1", FAV).await.unwrap();

        assert_eq!(a.get(), 2);
        assert_eq!(b.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_silences_listeners_and_rejects_toggles() {
        let trail = trail_with(Rc::new(FakeApi::default()), Rc::new(MemoryStore::default()));
        let events = recorder(&trail);

        let pending = trail.apply("1", FAV, true).unwrap();
        trail.teardown();
        trail.settle(pending, Ok(())).unwrap();

        assert_eq!(events.borrow().len(), 1);
        assert_eq!(trail.toggle("2", FAV).await, Err(ToggleError::TornDown));
    }
}
