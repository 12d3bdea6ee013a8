use crate::action_sender::AnyActionSender;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

/// Follow-up work a middleware hands back to the store via [`Store::perform`](crate::Store::perform).
///
/// Async jobs run on the ambient tokio runtime, outside the dispatch lock. They report back only
/// by sending actions, which are dispatched as fresh top-level dispatches.
pub struct Effect<Action: Send + 'static> {
    pub value: EffectValue<Action>,
}

pub type AsyncActionJob<Action> =
    Box<dyn FnOnce(AnyActionSender<Action>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

pub enum EffectValue<Action: Send + 'static> {
    None,
    Send(Action),
    Async(AsyncActionJob<Action>),
}

impl<Action> Effect<Action>
where
    Action: Send + 'static,
{
    pub fn map<F, MappedAction>(self, map: F) -> Effect<MappedAction>
    where
        MappedAction: Send + 'static,
        F: Fn(Action) -> MappedAction + Send + Sync + 'static,
    {
        match self.value {
            EffectValue::None => Effect::none(),
            EffectValue::Send(a) => Effect::send(map(a)),
            EffectValue::Async(a) => {
                Effect::<MappedAction>::run(move |sender| a(sender.scoped(map)))
            }
        }
    }

    pub fn run<T, Fut>(job: T) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
        T: FnOnce(AnyActionSender<Action>) -> Fut + Send + 'static,
    {
        let boxed_job: AsyncActionJob<Action> =
            Box::new(move |sender: AnyActionSender<Action>| Box::pin(job(sender)));
        Self {
            value: EffectValue::Async(boxed_job),
        }
    }

    pub fn none() -> Self {
        Self {
            value: EffectValue::None,
        }
    }

    pub fn send(action: Action) -> Self {
        Self {
            value: EffectValue::Send(action),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self.value, EffectValue::None)
    }
}

impl<Action: Send> Debug for EffectValue<Action>
where
    Action: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Send(action) => write!(f, "Send {:?}", action),
            Self::Async(_) => f.write_str("Async"),
        }
    }
}
