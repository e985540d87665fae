use std::fmt;
use std::mem;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::deferred::{Shared, State};
use crate::drain;
use crate::{Deferred, Error, Outcome, Promise};

/// The producer side of a deferred value.
///
/// Only a `Resolver` can settle its [`Deferred`]. It may be cloned to hand
/// the capability to several producers; the first one to settle wins and
/// every later attempt is ignored. Dropping the last resolver of a pending
/// deferred abandons it.
///
/// # Examples
///
/// ```
/// use deferred::{Promise, Resolver};
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (resolver, deferred) = Resolver::<String, ()>::new();
/// let task = thread::spawn(move || resolver.resolve("Hi".into()));
/// let outcome = block_on(deferred.wait()).unwrap();
/// assert_eq!(outcome.success().as_deref(), Some("Hi"));
/// task.join().expect("The producer thread has panicked.");
/// ```
pub struct Resolver<T, E>
where
    T: 'static,
    E: 'static,
{
    shared: Arc<Shared<T, E>>,
}

/// Creates a linked resolver and deferred.
pub fn pending<T: 'static, E: 'static>() -> (Resolver<T, E>, Deferred<T, E>) {
    let shared = Arc::new(Shared::pending());
    let deferred = Deferred::from_shared(Arc::clone(&shared));
    (Resolver { shared }, deferred)
}

impl<T: 'static, E: 'static> Resolver<T, E> {
    /// Another consumer handle onto the deferred this resolver settles.
    pub fn deferred(&self) -> Deferred<T, E> {
        Deferred::from_shared(Arc::clone(&self.shared))
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.shared.lock(), State::Settled(_))
    }

    /// Settles the deferred, wakes every task waiting on it, then delivers
    /// `outcome` to every stored observer in registration order on the
    /// calling thread.
    ///
    /// When this runs inside another observer the delivery is queued and
    /// happens before the outermost settlement on this thread returns.
    ///
    /// Returns [`Error::AlreadySettled`] and changes nothing if another
    /// resolver got there first.
    pub fn try_settle(&self, outcome: Outcome<T, E>) -> Result<(), Error> {
        let outcome = Arc::new(outcome);
        let mut state = self.shared.lock();
        match mem::replace(&mut *state, State::Settled(Arc::clone(&outcome))) {
            State::Pending {
                observers, wakers, ..
            } => {
                drop(state);
                trace!(
                    observers = observers.len(),
                    waiters = wakers.len(),
                    "deferred settled"
                );
                for waker in wakers {
                    waker.wake();
                }
                drain::schedule(Box::new(move || {
                    for observer in observers {
                        observer(&*outcome);
                    }
                }));
                Ok(())
            }
            previous => {
                *state = previous;
                Err(Error::AlreadySettled)
            }
        }
    }

    pub fn try_resolve(&self, value: T) -> Result<(), Error> {
        self.try_settle(Outcome::Success(value))
    }

    pub fn try_reject(&self, err: E) -> Result<(), Error> {
        self.try_settle(Outcome::Failure(err))
    }

    /// Like [`try_settle`](Self::try_settle), but a repeated settlement is
    /// silently ignored.
    pub fn settle(self, outcome: Outcome<T, E>) {
        if self.try_settle(outcome).is_err() {
            debug!("ignoring settlement of an already settled deferred");
        }
    }

    /// Adapts a `(data?, error?)` completion handler: an error rejects,
    /// otherwise the data (or `T::default()` when absent) resolves.
    pub fn complete(self, data: Option<T>, error: Option<E>)
    where
        T: Default,
    {
        match error {
            Some(err) => self.settle(Outcome::Failure(err)),
            None => self.settle(Outcome::Success(data.unwrap_or_default())),
        }
    }
}

impl<T: 'static, E: 'static> Promise for Resolver<T, E> {
    type Output = T;
    type Error = E;
    type Waiter = Deferred<T, E>;

    fn new() -> (Self, Self::Waiter) {
        pending()
    }

    fn resolve(self, value: T) {
        self.settle(Outcome::Success(value))
    }

    fn reject(self, err: E) {
        self.settle(Outcome::Failure(err))
    }
}

impl<T: 'static, E: 'static> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        if let State::Pending { resolvers, .. } = &mut *self.shared.lock() {
            *resolvers += 1;
        }
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: 'static, E: 'static> Drop for Resolver<T, E> {
    /// If this was the last resolver of a pending deferred, abandon it.
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let State::Pending { resolvers, .. } = &mut *state else {
            return;
        };
        *resolvers -= 1;
        if *resolvers > 0 {
            return;
        }
        let abandoned = mem::replace(&mut *state, State::Abandoned);
        drop(state);
        if let State::Pending {
            observers, wakers, ..
        } = abandoned
        {
            debug!(
                observers = observers.len(),
                waiters = wakers.len(),
                "every resolver dropped before settlement, deferred abandoned"
            );
            for waker in wakers {
                waker.wake();
            }
            // Observers may own resolvers of derived deferreds; dropping them
            // abandons those too.
            drain::schedule(Box::new(move || drop(observers)));
        }
    }
}

impl<T: 'static, E: 'static> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.is_settled())
            .finish()
    }
}
