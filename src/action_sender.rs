use std::marker::PhantomData;
use std::sync::Arc;

pub trait ActionSender: Send {
    type SendableAction;

    fn send(&self, action: Self::SendableAction);
}

/// Shared handle to some sender; clones feed the same target.
pub struct AnyActionSender<Action: Send + 'static> {
    target: Arc<dyn ActionSender<SendableAction = Action> + Sync>,
}

impl<Action: Send + 'static> AnyActionSender<Action> {
    pub fn new(target: impl ActionSender<SendableAction = Action> + Sync + 'static) -> Self {
        Self {
            target: Arc::new(target),
        }
    }

    pub fn scoped<Child, F>(&self, map: F) -> AnyActionSender<Child>
    where
        Child: Send + 'static,
        F: Fn(Child) -> Action + Send + Sync + 'static,
    {
        AnyActionSender::new(Scoped {
            parent: self.clone(),
            map,
            _child: PhantomData,
        })
    }
}

impl<Action: Send + 'static> Clone for AnyActionSender<Action> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}

impl<Action: Send + 'static> ActionSender for AnyActionSender<Action> {
    type SendableAction = Action;

    fn send(&self, action: Action) {
        self.target.send(action)
    }
}

struct Scoped<Child, Action: Send + 'static, F> {
    parent: AnyActionSender<Action>,
    map: F,
    _child: PhantomData<fn(Child)>,
}

impl<Child, Action, F> ActionSender for Scoped<Child, Action, F>
where
    Child: Send + 'static,
    Action: Send + 'static,
    F: Fn(Child) -> Action + Send + Sync + 'static,
{
    type SendableAction = Child;

    fn send(&self, action: Child) {
        self.parent.send((self.map)(action));
    }
}
