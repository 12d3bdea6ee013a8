use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::task::AbortHandle;

use crate::config::StoreConfig;
use crate::middleware::{Middleware, Next};
use crate::reducer::Reducer;
use crate::subscription::{Observer, Subscribers, Subscription};
use crate::{DispatchOutcome, Store, Version};

pub(crate) type Invariant<State> = Box<dyn Fn(&State) -> anyhow::Result<()> + Send + Sync>;

/// Unwind payload for reducer and invariant failures.
///
/// Middleware isolation catches panics, but re-raises this one so a broken reducer still fails the
/// dispatch caller.
#[derive(Debug)]
pub(crate) struct ReducerPanic(pub(crate) String);

struct Committed<State> {
    version: Version,
    state: Arc<State>,
}

/// Per-store dispatch bookkeeping, only touched while the dispatch lock is held.
struct DispatchFrame<Action> {
    /// Middleware nesting of the dispatch in progress.
    depth: usize,
    /// How many subscriber-triggered hops led to the action being processed; 1 for a caller's.
    cascade: usize,
    notifying: bool,
    pending: VecDeque<QueuedAction<Action>>,
}

struct QueuedAction<Action> {
    cascade: usize,
    action: Action,
}

impl<Action> Default for DispatchFrame<Action> {
    fn default() -> Self {
        Self {
            depth: 0,
            cascade: 1,
            notifying: false,
            pending: VecDeque::new(),
        }
    }
}

pub(crate) struct StoreEngine<State, Action> {
    current: RwLock<Committed<State>>,
    reducer: Box<dyn Reducer<State, Action>>,
    middleware: Vec<Box<dyn Middleware<State, Action>>>,
    invariants: Vec<Invariant<State>>,
    subscribers: Arc<Subscribers<State>>,
    frame: ReentrantMutex<RefCell<DispatchFrame<Action>>>,
    config: StoreConfig,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl<State, Action> StoreEngine<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: std::fmt::Debug + Send + 'static,
{
    pub(crate) fn new(
        state: State,
        reducer: Box<dyn Reducer<State, Action>>,
        middleware: Vec<Box<dyn Middleware<State, Action>>>,
        invariants: Vec<Invariant<State>>,
        config: StoreConfig,
    ) -> Self {
        Self {
            current: RwLock::new(Committed {
                version: 0,
                state: Arc::new(state),
            }),
            reducer,
            middleware,
            invariants,
            subscribers: Arc::new(Subscribers::default()),
            frame: ReentrantMutex::new(RefCell::new(DispatchFrame::default())),
            config,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn state(&self) -> Arc<State> {
        self.current.read().state.clone()
    }

    pub(crate) fn version(&self) -> Version {
        self.current.read().version
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn subscribe(&self, observer: Observer<State>) -> Subscription {
        self.subscribers.subscribe(observer)
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn track(&self, task: AbortHandle) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    /// Runs one action through the middleware chain and, unless dropped, the root reducer.
    ///
    /// The dispatch lock is re-entrant: middleware dispatching on the same thread completes the
    /// nested dispatch before it resumes. Dispatches issued by subscribers during notification are
    /// queued and run one after another, in FIFO order, once the outermost dispatch is done.
    /// Other threads wait for the whole dispatch, queue included.
    pub(crate) fn dispatch(self: &Arc<Self>, action: Action) -> DispatchOutcome {
        let frame = self.frame.lock();
        let outermost = {
            let mut current = frame.borrow_mut();
            if current.notifying {
                log::trace!("queueing {:?} until notification completes", action);
                let cascade = current.cascade + 1;
                current.pending.push_back(QueuedAction { cascade, action });
                return DispatchOutcome::Queued;
            }
            if current.depth >= self.config.max_dispatch_depth {
                log::error!(
                    "dispatch depth limit {} reached, rejecting {:?}",
                    self.config.max_dispatch_depth,
                    action
                );
                return DispatchOutcome::Rejected;
            }
            current.depth += 1;
            if current.depth == 1 {
                current.cascade = 1;
            }
            current.depth == 1
        };
        let _depth = scopeguard::guard((), |_| {
            let mut current = frame.borrow_mut();
            current.depth -= 1;
            if current.depth == 0 && !current.pending.is_empty() {
                log::warn!(
                    "discarding {} queued action(s) after an aborted dispatch",
                    current.pending.len()
                );
                current.pending.clear();
            }
        });

        let outcome = self.run_chain(action);
        if outermost {
            self.drain(&frame);
        }
        outcome
    }

    /// Runs queued actions at the outermost level. Every action queued during one notification
    /// shares the same cascade level; only chains of subscribers re-triggering each other climb.
    fn drain(self: &Arc<Self>, frame: &RefCell<DispatchFrame<Action>>) {
        loop {
            let queued = frame.borrow_mut().pending.pop_front();
            let Some(QueuedAction { cascade, action }) = queued else {
                break;
            };
            if cascade > self.config.max_dispatch_depth {
                log::error!(
                    "subscriber dispatch cascade limit {} reached, rejecting {:?}",
                    self.config.max_dispatch_depth,
                    action
                );
                continue;
            }
            frame.borrow_mut().cascade = cascade;
            self.run_chain(action);
        }
    }

    fn run_chain(self: &Arc<Self>, action: Action) -> DispatchOutcome {
        let store = Store::from_engine(Arc::clone(self));
        let committed = Cell::new(None);
        let next = Next::new(&store, &self.middleware, &committed);

        let result = panic::catch_unwind(AssertUnwindSafe(|| next.run(action)));
        let committed = committed.get();
        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(format!("{:#}", err)),
            Err(payload) => {
                if payload.is::<ReducerPanic>() {
                    panic::resume_unwind(payload);
                }
                Some(format!("panic: {}", panic_message(&*payload)))
            }
        };

        match (committed, failure) {
            (Some(version), None) => DispatchOutcome::Committed(version),
            (None, None) => {
                log::trace!("action dropped by middleware");
                DispatchOutcome::Dropped
            }
            (Some(version), Some(failure)) => {
                log::error!(
                    "middleware failed after committing version {}: {}",
                    version,
                    failure
                );
                DispatchOutcome::Committed(version)
            }
            (None, Some(failure)) => {
                log::error!("middleware failed, action dropped: {}", failure);
                DispatchOutcome::Dropped
            }
        }
    }

    /// Terminal step of the chain: reduce, publish the new version, notify.
    pub(crate) fn commit(self: &Arc<Self>, action: Action) -> Version {
        let previous = self.state();
        let next = Arc::new(self.reduce(State::clone(&previous), &action));

        let version = {
            let mut current = self.current.write();
            current.version += 1;
            current.state = next.clone();
            current.version
        };
        log::debug!("committed version {} after {:?}", version, action);

        self.notify(&next, version);
        version
    }

    fn reduce(&self, state: State, action: &Action) -> State {
        let next = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.reducer.reduce(state, action)
        })) {
            Ok(next) => next,
            Err(payload) => {
                let message = format!(
                    "reducer panicked on {:?}: {}",
                    action,
                    panic_message(&*payload)
                );
                log::error!("{}", message);
                panic::resume_unwind(Box::new(ReducerPanic(message)));
            }
        };

        for invariant in &self.invariants {
            if let Err(err) = invariant(&next) {
                let message = format!("state invariant violated after {:?}: {:#}", action, err);
                log::error!("{}", message);
                panic::resume_unwind(Box::new(ReducerPanic(message)));
            }
        }
        next
    }

    fn notify(&self, state: &Arc<State>, version: Version) {
        let frame = self.frame.lock();
        frame.borrow_mut().notifying = true;
        let _notifying = scopeguard::guard((), |_| frame.borrow_mut().notifying = false);
        self.subscribers.notify(state, version);
    }
}

impl<State, Action> Drop for StoreEngine<State, Action> {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(ReducerPanic(message)) = payload.downcast_ref::<ReducerPanic>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
