/// A pure state transition.
///
/// Implementations consume the previous state and return the next one. Actions a reducer does not
/// recognise must come back as the unchanged input state; a reducer never fails and never performs
/// I/O. Side effects belong in [`Middleware`](crate::Middleware).
pub trait Reducer<State, Action>: Send + Sync {
    fn reduce(&self, state: State, action: &Action) -> State;
}

impl<State, Action, F> Reducer<State, Action> for F
where
    F: Fn(State, &Action) -> State + Send + Sync,
{
    fn reduce(&self, state: State, action: &Action) -> State {
        self(state, action)
    }
}
