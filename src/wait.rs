use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::deferred::{Shared, State};
use crate::{Deferred, Error, Outcome};

/// Future returned by [`Deferred::wait`]. Any number of them may wait on the
/// same deferred; each gets its own copy of the outcome.
pub struct Wait<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Wait<T, E> {
    pub(crate) fn new(shared: Arc<Shared<T, E>>) -> Self {
        Self { shared }
    }
}

impl<T: Clone, E: Clone> Future for Wait<T, E> {
    type Output = Result<Outcome<T, E>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.lock();
        match &mut *state {
            State::Settled(outcome) => Poll::Ready(Ok((**outcome).clone())),
            State::Abandoned => Poll::Ready(Err(Error::ProducerDropped)),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T: Clone, E: Clone> IntoFuture for Deferred<T, E> {
    type Output = Result<Outcome<T, E>, Error>;
    type IntoFuture = Wait<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Wait::new(self.shared)
    }
}
