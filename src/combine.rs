use crate::reducer::Reducer;

/// Focuses a reducer on one field of the aggregate state.
pub type Lens<State, Part> = fn(&mut State) -> &mut Part;

/// A slice reducer scoped to the part of `State` selected by its lens.
///
/// The slice is moved out of the aggregate, reduced by value, and written back. Other fields are
/// never touched, so slices registered side by side cannot interfere with each other.
pub struct Slice<State, Part, R> {
    lens: Lens<State, Part>,
    reducer: R,
}

impl<State, Part, R> Slice<State, Part, R> {
    pub fn new(lens: Lens<State, Part>, reducer: R) -> Self {
        Self { lens, reducer }
    }
}

impl<State, Part, Action, R> Reducer<State, Action> for Slice<State, Part, R>
where
    Part: Default,
    R: Reducer<Part, Action>,
{
    fn reduce(&self, mut state: State, action: &Action) -> State {
        let slot = (self.lens)(&mut state);
        let part = std::mem::take(slot);
        *slot = self.reducer.reduce(part, action);
        state
    }
}

/// Root reducer: runs every registered reducer, in registration order, against the same action.
pub struct CombinedReducer<State, Action> {
    reducers: Vec<Box<dyn Reducer<State, Action>>>,
}

impl<State, Action> Default for CombinedReducer<State, Action> {
    fn default() -> Self {
        Self {
            reducers: Vec::new(),
        }
    }
}

impl<State, Action> CombinedReducer<State, Action>
where
    State: 'static,
    Action: 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reducer: impl Reducer<State, Action> + 'static) {
        self.reducers.push(Box::new(reducer));
    }

    pub fn with(mut self, reducer: impl Reducer<State, Action> + 'static) -> Self {
        self.push(reducer);
        self
    }

    pub fn slice<Part, R>(self, lens: Lens<State, Part>, reducer: R) -> Self
    where
        Part: Default + 'static,
        R: Reducer<Part, Action> + 'static,
    {
        self.with(Slice::new(lens, reducer))
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<State, Action> Reducer<State, Action> for CombinedReducer<State, Action> {
    fn reduce(&self, state: State, action: &Action) -> State {
        self.reducers
            .iter()
            .fold(state, |state, reducer| reducer.reduce(state, action))
    }
}
