use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Waker;

use tracing::trace;

use crate::resolver::pending;
use crate::wait::Wait;
use crate::{Outcome, Promise};

pub(crate) type Observer<T, E> = Box<dyn FnOnce(&Outcome<T, E>) + Send + 'static>;

pub(crate) enum State<T, E> {
    Pending {
        observers: Vec<Observer<T, E>>,
        wakers: Vec<Waker>,
        resolvers: usize,
    },
    Settled(Arc<Outcome<T, E>>),
    /// Every resolver went away before settling.
    Abandoned,
}

pub(crate) struct Shared<T, E> {
    state: Mutex<State<T, E>>,
}

impl<T, E> Shared<T, E> {
    pub(crate) fn pending() -> Self {
        Self {
            state: Mutex::new(State::Pending {
                observers: vec![],
                wakers: vec![],
                resolvers: 1,
            }),
        }
    }

    fn settled(outcome: Outcome<T, E>) -> Self {
        Self {
            state: Mutex::new(State::Settled(Arc::new(outcome))),
        }
    }

    /// Observers never run under this lock, so a poisoned mutex still holds
    /// a consistent state.
    pub(crate) fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The observe-only side of a deferred value.
///
/// A `Deferred` eventually holds exactly one [`Outcome`]. It can be cloned
/// and handed to any number of consumers, none of which can settle it: that
/// capability lives on the matching [`Resolver`](crate::Resolver).
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Outcome};
/// use std::sync::mpsc::channel;
///
/// let (tx, rx) = channel();
/// Deferred::<i32, String>::resolved(5)
///     .transformed(|x| Ok(x * 2))
///     .observe(move |outcome| tx.send(outcome.clone()).unwrap());
/// assert_eq!(rx.recv().unwrap(), Outcome::Success(10));
/// ```
pub struct Deferred<T, E> {
    pub(crate) shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        let mut out = f.debug_struct("Deferred");
        match &*state {
            State::Pending {
                observers,
                resolvers,
                ..
            } => out
                .field("observers", &observers.len())
                .field("resolvers", resolvers),
            State::Settled(outcome) => out.field("outcome", outcome),
            State::Abandoned => out.field("abandoned", &true),
        };
        out.finish()
    }
}

impl<T, E> Deferred<T, E> {
    pub(crate) fn from_shared(shared: Arc<Shared<T, E>>) -> Self {
        Self { shared }
    }

    /// An already settled deferred. Observers fire as soon as they register.
    pub fn settled(outcome: Outcome<T, E>) -> Self {
        Self::from_shared(Arc::new(Shared::settled(outcome)))
    }

    pub fn resolved(value: T) -> Self {
        Self::settled(Outcome::Success(value))
    }

    pub fn rejected(err: E) -> Self {
        Self::settled(Outcome::Failure(err))
    }

    /// Snapshot of the outcome, `None` while pending or abandoned.
    pub fn outcome(&self) -> Option<Arc<Outcome<T, E>>> {
        match &*self.shared.lock() {
            State::Settled(outcome) => Some(Arc::clone(outcome)),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.shared.lock(), State::Settled(_))
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(&*self.shared.lock(), State::Abandoned)
    }

    /// A future yielding the outcome, or [`Error::ProducerDropped`] once
    /// the deferred is abandoned.
    ///
    /// [`Error::ProducerDropped`]: crate::Error::ProducerDropped
    pub fn wait(&self) -> Wait<T, E> {
        Wait::new(Arc::clone(&self.shared))
    }
}

impl<T, E> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Registers `callback` to receive the outcome.
    ///
    /// If the deferred has already settled, `callback` runs right here on
    /// the calling thread before `observe` returns. Otherwise it is stored
    /// and runs exactly once, in registration order, on whichever thread
    /// settles the deferred. On an abandoned deferred the callback is dropped
    /// without running.
    pub fn observe<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome<T, E>) + Send + 'static,
    {
        let mut state = self.shared.lock();
        let settled = match &mut *state {
            State::Pending { observers, .. } => {
                observers.push(Box::new(callback));
                return;
            }
            State::Settled(outcome) => Some(Arc::clone(outcome)),
            State::Abandoned => None,
        };
        drop(state);

        match settled {
            Some(outcome) => callback(&*outcome),
            None => trace!("observer discarded, deferred was abandoned"),
        }
    }

    /// Sequences another deferred step after this one.
    ///
    /// On success `continuation` runs with the value and the returned
    /// deferred follows whatever deferred it produces. An `Err` from the
    /// continuation, or a failure of `self`, settles the returned deferred
    /// with that failure; in the latter case `continuation` never runs.
    pub fn chained<U, F>(&self, continuation: F) -> Deferred<U, E>
    where
        T: Clone,
        E: Clone,
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<Deferred<U, E>, E> + Send + 'static,
    {
        let (resolver, chained) = pending();
        self.observe(move |outcome| match outcome {
            Outcome::Success(value) => match continuation(value.clone()) {
                Ok(next) => next.observe(move |next| resolver.settle(next.clone())),
                Err(err) => resolver.reject(err),
            },
            Outcome::Failure(err) => resolver.reject(err.clone()),
        });
        chained
    }

    /// Maps the success value with a fallible function.
    pub fn transformed<U, F>(&self, map: F) -> Deferred<U, E>
    where
        T: Clone,
        E: Clone,
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.chained(move |value| map(value).map(Deferred::resolved))
    }
}
