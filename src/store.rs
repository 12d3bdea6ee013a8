use std::sync::{Arc, Weak};

use crate::action_sender::{ActionSender, AnyActionSender};
use crate::combine::{CombinedReducer, Lens};
use crate::config::StoreConfig;
use crate::effect::{Effect, EffectValue};
use crate::engine::{Invariant, StoreEngine};
use crate::middleware::Middleware;
use crate::reducer::Reducer;
use crate::state_stream::StateStream;
use crate::subscription::Subscription;

/// Monotonic number of a committed state. The initial state is version 0.
pub type Version = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The action was reduced and published as this version.
    Committed(Version),
    /// A middleware dropped the action, or failed before it reached the reducer.
    Dropped,
    /// Dispatched from a subscriber callback; runs once the current notification completes.
    Queued,
    /// Nested dispatch exceeded `StoreConfig::max_dispatch_depth`.
    Rejected,
}

/// Handle to the single application state.
///
/// Cloning is cheap and every clone talks to the same store. The state is only changed through
/// [`Store::dispatch`].
pub struct Store<State, Action> {
    engine: Arc<StoreEngine<State, Action>>,
}

impl<State, Action> Clone for Store<State, Action> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<State, Action> Store<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: std::fmt::Debug + Send + 'static,
{
    pub fn new<R: Reducer<State, Action> + 'static>(state: State, reducer: R) -> Self {
        Self::builder(state).reducer(reducer).build()
    }

    pub fn builder(state: State) -> StoreBuilder<State, Action> {
        StoreBuilder::new(state)
    }

    pub(crate) fn from_engine(engine: Arc<StoreEngine<State, Action>>) -> Self {
        Self { engine }
    }

    pub(crate) fn engine(&self) -> &Arc<StoreEngine<State, Action>> {
        &self.engine
    }

    pub fn dispatch(&self, action: Action) -> DispatchOutcome {
        self.engine.dispatch(action)
    }

    /// Latest committed state.
    pub fn state(&self) -> Arc<State> {
        self.engine.state()
    }

    pub fn version(&self) -> Version {
        self.engine.version()
    }

    pub fn config(&self) -> &StoreConfig {
        self.engine.config()
    }

    /// Registers `observer` for every state committed from now on.
    ///
    /// The current state is not replayed; read [`Store::state`] for it.
    pub fn subscribe(&self, observer: impl Fn(&Arc<State>) + Send + Sync + 'static) -> Subscription {
        self.engine.subscribe(Box::new(observer))
    }

    pub fn watch(&self) -> StateStream<State> {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        let subscription = self.subscribe(move |state| {
            let _ = sender.send(state.clone());
        });
        StateStream::new(receiver, subscription)
    }

    pub fn subscriber_count(&self) -> usize {
        self.engine.subscriber_count()
    }

    pub fn downgrade(&self) -> WeakStore<State, Action> {
        WeakStore {
            engine: Arc::downgrade(&self.engine),
        }
    }

    /// A sender that does not keep the store alive.
    pub fn sender(&self) -> AnyActionSender<Action> {
        AnyActionSender::new(self.downgrade())
    }

    /// A sender for a feature-local action type, wrapped into `Action` by `map`.
    pub fn scope<ChildAction>(
        &self,
        map: impl Fn(ChildAction) -> Action + Send + Sync + 'static,
    ) -> AnyActionSender<ChildAction>
    where
        ChildAction: Send + 'static,
    {
        self.sender().scoped(map)
    }

    /// Carries out an effect. Async jobs are spawned on the current tokio runtime and never hold
    /// the dispatch lock; without a runtime they are discarded with a warning.
    pub fn perform(&self, effect: Effect<Action>) {
        match effect.value {
            EffectValue::None => {}
            EffectValue::Send(action) => {
                self.dispatch(action);
            }
            EffectValue::Async(job) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let task = handle.spawn(job(self.sender()));
                    self.engine.track(task.abort_handle());
                }
                Err(_) => log::warn!("no tokio runtime available, async effect discarded"),
            },
        }
    }
}

impl<State, Action> ActionSender for Store<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: std::fmt::Debug + Send + 'static,
{
    type SendableAction = Action;

    fn send(&self, action: Action) {
        self.dispatch(action);
    }
}

pub struct WeakStore<State, Action> {
    engine: Weak<StoreEngine<State, Action>>,
}

impl<State, Action> Clone for WeakStore<State, Action> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<State, Action> WeakStore<State, Action> {
    pub fn upgrade(&self) -> Option<Store<State, Action>> {
        self.engine.upgrade().map(|engine| Store { engine })
    }
}

impl<State, Action> ActionSender for WeakStore<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: std::fmt::Debug + Send + 'static,
{
    type SendableAction = Action;

    fn send(&self, action: Action) {
        match self.upgrade() {
            Some(store) => {
                store.dispatch(action);
            }
            None => log::debug!("store is gone, discarding {:?}", action),
        }
    }
}

/// Collects reducers, middleware and invariants; all of them are fixed once the store is built.
pub struct StoreBuilder<State, Action> {
    state: State,
    reducer: CombinedReducer<State, Action>,
    middleware: Vec<Box<dyn Middleware<State, Action>>>,
    invariants: Vec<Invariant<State>>,
    config: StoreConfig,
}

impl<State, Action> StoreBuilder<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: std::fmt::Debug + Send + 'static,
{
    pub fn new(state: State) -> Self {
        Self {
            state,
            reducer: CombinedReducer::new(),
            middleware: Vec::new(),
            invariants: Vec::new(),
            config: StoreConfig::default(),
        }
    }

    /// Adds a reducer over the whole state. Reducers run in registration order.
    pub fn reducer(mut self, reducer: impl Reducer<State, Action> + 'static) -> Self {
        self.reducer.push(reducer);
        self
    }

    /// Adds a reducer that owns the part of the state selected by `lens`.
    pub fn slice<Part, R>(mut self, lens: Lens<State, Part>, reducer: R) -> Self
    where
        Part: Default + 'static,
        R: Reducer<Part, Action> + 'static,
    {
        self.reducer = self.reducer.slice(lens, reducer);
        self
    }

    /// Adds a middleware. The first one registered sees actions first.
    pub fn middleware(mut self, middleware: impl Middleware<State, Action> + 'static) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Checked after every reduction; a violation is a programming error and panics the dispatch.
    pub fn invariant(
        mut self,
        check: impl Fn(&State) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.invariants.push(Box::new(check));
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Store<State, Action> {
        let mut config = self.config;
        if config.max_dispatch_depth == 0 {
            log::warn!("max_dispatch_depth of 0 would reject every dispatch, using 1");
            config.max_dispatch_depth = 1;
        }
        log::debug!(
            "building store with {} reducer(s), {} middleware",
            self.reducer.len(),
            self.middleware.len()
        );

        let engine = StoreEngine::new(
            self.state,
            Box::new(self.reducer),
            self.middleware,
            self.invariants,
            config,
        );
        Store::from_engine(Arc::new(engine))
    }
}

#[cfg(test)]
mod test {
    use std::panic::{self, AssertUnwindSafe};
    use std::time::Duration;

    use futures::StreamExt;
    use parking_lot::Mutex;

    use crate::engine::ReducerPanic;
    use crate::middleware::Next;

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct State {
        counter: i32,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Increment,
        Add(i32),
        Ignored,
        Twice,
        Secret,
        Fail,
        Later,
    }

    fn feature(mut state: State, action: &Action) -> State {
        match action {
            Action::Increment => state.counter += 1,
            Action::Add(n) => state.counter += n,
            _ => {}
        }
        state
    }

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records what it sees on the way in and out.
    struct Tap {
        name: &'static str,
        log: Log,
    }

    impl Middleware<State, Action> for Tap {
        fn handle(
            &self,
            store: &Store<State, Action>,
            action: Action,
            next: Next<'_, State, Action>,
        ) -> anyhow::Result<()> {
            self.log.lock().push(format!("{} in {:?}", self.name, action));
            let result = next.run(action);
            self.log
                .lock()
                .push(format!("{} out {}", self.name, store.state().counter));
            result
        }
    }

    /// Turns `Twice` into two increments, swallows `Secret`, fails on `Fail`.
    struct Rewrite;

    impl Middleware<State, Action> for Rewrite {
        fn handle(
            &self,
            store: &Store<State, Action>,
            action: Action,
            next: Next<'_, State, Action>,
        ) -> anyhow::Result<()> {
            match action {
                Action::Twice => {
                    store.dispatch(Action::Increment);
                    next.run(Action::Increment)
                }
                Action::Secret => Ok(()),
                Action::Fail => anyhow::bail!("refusing {:?}", action),
                Action::Later => {
                    store.perform(Effect::run(|sender| async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        sender.send(Action::Add(10));
                    }));
                    next.run(action)
                }
                other => next.run(other),
            }
        }
    }

    fn store_with(log: &Log) -> Store<State, Action> {
        Store::builder(State::default())
            .reducer(feature)
            .middleware(Tap {
                name: "outer",
                log: log.clone(),
            })
            .middleware(Rewrite)
            .middleware(Tap {
                name: "inner",
                log: log.clone(),
            })
            .build()
    }

    fn recorder(store: &Store<State, Action>) -> (Subscription, Arc<Mutex<Vec<i32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = store.subscribe(move |state| sink.lock().push(state.counter));
        (subscription, seen)
    }

    #[test]
    fn test_simple_action() {
        let store = Store::new(State::default(), feature);
        assert_eq!(store.version(), 0);
        assert_eq!(store.dispatch(Action::Increment), DispatchOutcome::Committed(1));
        assert_eq!(store.state().counter, 1);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_unrecognized_action_still_commits_unchanged_state() {
        let store = Store::new(State { counter: 4 }, feature);
        let before = store.state();
        assert_eq!(store.dispatch(Action::Ignored), DispatchOutcome::Committed(1));
        assert_eq!(*store.state(), *before);
    }

    #[test]
    fn test_middleware_runs_in_registration_order() {
        let log = Log::default();
        let store = store_with(&log);
        store.dispatch(Action::Increment);

        assert_eq!(
            *log.lock(),
            vec![
                "outer in Increment",
                "inner in Increment",
                "inner out 1",
                "outer out 1",
            ]
        );
    }

    #[test]
    fn test_nested_dispatch_completes_before_outer_resumes() {
        let log = Log::default();
        let store = store_with(&log);
        let (_subscription, seen) = recorder(&store);

        assert_eq!(store.dispatch(Action::Twice), DispatchOutcome::Committed(2));
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(
            *log.lock(),
            vec![
                "outer in Twice",
                "outer in Increment",
                "inner in Increment",
                "inner out 1",
                "outer out 1",
                "inner in Increment",
                "inner out 2",
                "outer out 2",
            ]
        );
    }

    #[test]
    fn test_dropped_action_does_not_reduce_or_notify() {
        let log = Log::default();
        let store = store_with(&log);
        let (_subscription, seen) = recorder(&store);

        assert_eq!(store.dispatch(Action::Secret), DispatchOutcome::Dropped);
        assert_eq!(store.version(), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_failing_middleware_drops_action() {
        let log = Log::default();
        let store = store_with(&log);
        let (_subscription, seen) = recorder(&store);

        assert_eq!(store.dispatch(Action::Fail), DispatchOutcome::Dropped);
        assert_eq!(store.dispatch(Action::Increment), DispatchOutcome::Committed(1));
        assert_eq!(*seen.lock(), vec![1]);
    }

    struct Explode;

    impl Middleware<State, Action> for Explode {
        fn handle(
            &self,
            _store: &Store<State, Action>,
            action: Action,
            next: Next<'_, State, Action>,
        ) -> anyhow::Result<()> {
            if action == Action::Secret {
                panic!("middleware bug");
            }
            next.run(action)
        }
    }

    #[test]
    fn test_panicking_middleware_is_isolated() {
        let store = Store::builder(State::default())
            .reducer(feature)
            .middleware(Explode)
            .build();

        assert_eq!(store.dispatch(Action::Secret), DispatchOutcome::Dropped);
        assert_eq!(store.dispatch(Action::Increment), DispatchOutcome::Committed(1));
    }

    #[test]
    fn test_reducer_panic_reaches_caller_through_middleware() {
        fn broken(state: State, action: &Action) -> State {
            if *action == Action::Ignored {
                panic!("broken reducer");
            }
            state
        }
        let store = Store::builder(State::default())
            .reducer(broken)
            .middleware(Explode)
            .build();

        let payload = panic::catch_unwind(AssertUnwindSafe(|| store.dispatch(Action::Ignored)))
            .unwrap_err();
        assert!(payload.is::<ReducerPanic>());
        assert_eq!(store.version(), 0);
        assert_eq!(store.dispatch(Action::Increment), DispatchOutcome::Committed(1));
    }

    #[test]
    fn test_invariant_violation_fails_fast() {
        let store = Store::builder(State::default())
            .reducer(feature)
            .invariant(|state: &State| {
                anyhow::ensure!(state.counter <= 1, "counter overflow: {}", state.counter);
                Ok(())
            })
            .build();

        assert_eq!(store.dispatch(Action::Increment), DispatchOutcome::Committed(1));
        let payload = panic::catch_unwind(AssertUnwindSafe(|| store.dispatch(Action::Increment)))
            .unwrap_err();
        assert!(payload.is::<ReducerPanic>());
        assert_eq!(store.state().counter, 1);
    }

    #[test]
    fn test_subscribers_see_every_version_in_order() {
        let store = Store::new(State::default(), feature);
        let recorders: Vec<_> = (0..3).map(|_| recorder(&store)).collect();

        store.dispatch(Action::Increment);
        store.dispatch(Action::Add(5));
        store.dispatch(Action::Increment);

        for (_, seen) in &recorders {
            assert_eq!(*seen.lock(), vec![1, 6, 7]);
        }
    }

    #[test]
    fn test_subscribe_does_not_replay() {
        let store = Store::new(State::default(), feature);
        store.dispatch(Action::Increment);
        let (_subscription, seen) = recorder(&store);
        assert!(seen.lock().is_empty());
        assert_eq!(store.state().counter, 1);
    }

    #[test]
    fn test_unsubscribe_inside_callback() {
        let store = Store::new(State::default(), feature);
        let calls = Arc::new(Mutex::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let subscription = {
            let calls = calls.clone();
            let slot = slot.clone();
            store.subscribe(move |_| {
                *calls.lock() += 1;
                if let Some(subscription) = slot.lock().as_ref() {
                    subscription.unsubscribe();
                    subscription.unsubscribe();
                }
            })
        };
        *slot.lock() = Some(subscription);
        let (_other, seen) = recorder(&store);

        store.dispatch(Action::Increment);
        store.dispatch(Action::Increment);

        assert_eq!(*calls.lock(), 1);
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn test_subscriber_unsubscribing_a_later_one_mid_notification() {
        let store = Store::new(State::default(), feature);
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let _killer = {
            let victim = victim.clone();
            store.subscribe(move |_| {
                if let Some(victim) = victim.lock().as_ref() {
                    victim.unsubscribe();
                }
            })
        };
        let (subscription, seen) = recorder(&store);
        *victim.lock() = Some(subscription);

        store.dispatch(Action::Increment);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let store = Store::new(State::default(), feature);
        let _bad = store.subscribe(|_| panic!("render failed"));
        let (_good, seen) = recorder(&store);

        assert_eq!(store.dispatch(Action::Increment), DispatchOutcome::Committed(1));
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn test_dispatch_from_subscriber_is_queued_after_notification() {
        let store = Store::new(State::default(), feature);
        let order = Arc::new(Mutex::new(Vec::new()));

        let _first = {
            let order = order.clone();
            let weak = store.downgrade();
            store.subscribe(move |state| {
                order.lock().push(format!("first {}", state.counter));
                if state.counter == 1 {
                    let store = weak.upgrade().unwrap();
                    assert_eq!(store.dispatch(Action::Add(10)), DispatchOutcome::Queued);
                }
            })
        };
        let _second = {
            let order = order.clone();
            store.subscribe(move |state| order.lock().push(format!("second {}", state.counter)))
        };

        store.dispatch(Action::Increment);
        assert_eq!(
            *order.lock(),
            vec!["first 1", "second 1", "first 11", "second 11"]
        );
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_runaway_dispatch_is_bounded() {
        let store = Store::builder(State::default())
            .reducer(feature)
            .config(StoreConfig {
                max_dispatch_depth: 4,
            })
            .build();
        let weak = store.downgrade();
        let _echo = store.subscribe(move |_| {
            if let Some(store) = weak.upgrade() {
                store.dispatch(Action::Increment);
            }
        });

        store.dispatch(Action::Increment);
        assert_eq!(store.state().counter, 4);
    }

    #[test]
    fn test_sibling_dispatches_from_many_subscribers_all_run() {
        let store = Store::new(State::default(), feature);
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let subscribers: Vec<_> = (0..40)
            .map(|_| {
                let weak = store.downgrade();
                let outcomes = outcomes.clone();
                store.subscribe(move |state| {
                    if state.counter == 1 {
                        if let Some(store) = weak.upgrade() {
                            outcomes.lock().push(store.dispatch(Action::Increment));
                        }
                    }
                })
            })
            .collect();

        store.dispatch(Action::Increment);

        assert_eq!(subscribers.len(), 40);
        assert_eq!(*outcomes.lock(), vec![DispatchOutcome::Queued; 40]);
        assert_eq!(store.state().counter, 41);
        assert_eq!(store.version(), 41);
    }

    #[test]
    fn test_queued_dispatch_from_nested_commit_runs_after_outer_dispatch() {
        let log = Log::default();
        let store = store_with(&log);
        let weak = store.downgrade();
        let _echo = store.subscribe(move |state| {
            if state.counter == 1 {
                if let Some(store) = weak.upgrade() {
                    store.dispatch(Action::Add(100));
                }
            }
        });
        let (_subscription, seen) = recorder(&store);

        assert_eq!(store.dispatch(Action::Twice), DispatchOutcome::Committed(2));
        assert_eq!(*seen.lock(), vec![1, 2, 102]);
    }

    #[test]
    fn test_concurrent_dispatch_is_serialized() {
        let store = Store::new(State::default(), feature);
        let (_subscription, seen) = recorder(&store);

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.dispatch(Action::Increment);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(store.state().counter, 200);
        assert_eq!(*seen.lock(), (1..=200).collect::<Vec<_>>());
    }

    #[test]
    fn test_scoped_sender_maps_child_action() {
        let store = Store::new(State::default(), feature);
        let sender = store.scope(Action::Add);
        sender.send(3);
        assert_eq!(store.state().counter, 3);
    }

    #[test]
    fn test_sender_outliving_store() {
        let store = Store::new(State::default(), feature);
        let sender = store.sender();
        drop(store);
        sender.send(Action::Increment);
    }

    #[test]
    fn test_perform_without_runtime_discards_async() {
        let log = Log::default();
        let store = store_with(&log);
        store.dispatch(Action::Later);
        assert_eq!(store.state().counter, 0);
    }

    #[tokio::test]
    async fn test_async_effect_dispatches_later() {
        let log = Log::default();
        let store = store_with(&log);
        let mut states = store.watch();

        assert_eq!(store.dispatch(Action::Later), DispatchOutcome::Committed(1));
        let first = states.recv().await.unwrap();
        assert_eq!(first.counter, 0);

        let second = tokio::time::timeout(Duration::from_secs(1), states.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.counter, 10);
    }

    #[tokio::test]
    async fn test_watch_stream_ends_after_close() {
        let store = Store::new(State::default(), feature);
        let mut states = store.watch();
        store.dispatch(Action::Increment);
        states.close();
        store.dispatch(Action::Increment);

        assert_eq!(states.next().await.map(|s| s.counter), Some(1));
        assert!(states.next().await.is_none());
        assert_eq!(store.subscriber_count(), 0);
    }
}
