use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::subscription::Subscription;

/// Committed states as an async stream.
///
/// Every version committed after the stream was created is delivered, in commit order, with no
/// skipping; the buffer is unbounded so slow consumers never lose a version. Dropping the stream
/// unsubscribes.
pub struct StateStream<State> {
    receiver: UnboundedReceiver<Arc<State>>,
    subscription: Subscription,
}

impl<State> StateStream<State> {
    pub(crate) fn new(receiver: UnboundedReceiver<Arc<State>>, subscription: Subscription) -> Self {
        Self {
            receiver,
            subscription,
        }
    }

    pub async fn recv(&mut self) -> Option<Arc<State>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<State>> {
        self.receiver.try_recv().ok()
    }

    /// Stops receiving new versions; already buffered ones can still be read.
    pub fn close(&mut self) {
        self.subscription.unsubscribe();
        self.receiver.close();
    }
}

impl<State> Stream for StateStream<State> {
    type Item = Arc<State>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
