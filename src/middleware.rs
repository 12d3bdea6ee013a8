use std::cell::Cell;

use crate::{Store, Version};

/// Interceptor between [`Store::dispatch`] and the root reducer.
///
/// A middleware receives the pending action and the rest of the chain as [`Next`]. It may pass the
/// action on unchanged, pass on a different action, dispatch more actions through `store` (they
/// re-enter the chain from the front and complete before `handle` continues), or return without
/// calling `next` to drop the action. Middleware is the only place side effects belong.
///
/// An `Err` is logged by the store and the action counts as dropped, unless `next` already
/// committed it.
pub trait Middleware<State, Action>: Send + Sync {
    fn handle(
        &self,
        store: &Store<State, Action>,
        action: Action,
        next: Next<'_, State, Action>,
    ) -> anyhow::Result<()>;
}

/// The remainder of the middleware chain, terminated by the root reducer.
///
/// `run` consumes the continuation, so each link can forward at most once and every non-dropped
/// dispatch reduces exactly once.
pub struct Next<'a, State, Action> {
    store: &'a Store<State, Action>,
    rest: &'a [Box<dyn Middleware<State, Action>>],
    committed: &'a Cell<Option<Version>>,
}

impl<'a, State, Action> Next<'a, State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: std::fmt::Debug + Send + 'static,
{
    pub(crate) fn new(
        store: &'a Store<State, Action>,
        chain: &'a [Box<dyn Middleware<State, Action>>],
        committed: &'a Cell<Option<Version>>,
    ) -> Self {
        Self {
            store,
            rest: chain,
            committed,
        }
    }

    pub fn run(self, action: Action) -> anyhow::Result<()> {
        match self.rest.split_first() {
            Some((head, rest)) => head.handle(
                self.store,
                action,
                Next {
                    store: self.store,
                    rest,
                    committed: self.committed,
                },
            ),
            None => {
                let version = self.store.engine().commit(action);
                self.committed.set(Some(version));
                Ok(())
            }
        }
    }

    /// Number of middleware still ahead of the reducer.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}
