use futures::Future;
use tokio::sync::oneshot::{self, error::TryRecvError, Receiver};

/// A value computed by a spawned task, polled without blocking from the render loop.
#[derive(Debug)]
pub(crate) enum Promise<T> {
    Pending(Receiver<T>),
    Resolved(T),
    /// The task was dropped before producing a value.
    Lost,
}

impl<T> Promise<T> {
    /// Spawns `future` on the current runtime.
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            // the receiver is gone when the view was replaced
            let _ = tx.send(future.await);
        });

        Self::Pending(rx)
    }

    #[inline]
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns the value once resolved, checking the task if still pending.
    pub(crate) fn value(&mut self) -> Option<&T> {
        if let Self::Pending(rx) = self {
            match rx.try_recv() {
                Ok(v) => *self = Self::Resolved(v),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => *self = Self::Lost,
            }
        }

        match self {
            Self::Resolved(v) => Some(v),
            _ => None,
        }
    }
}
