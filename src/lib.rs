//! Single-resolution deferred values.
//!
//! A [`Resolver`] and its [`Deferred`] share one slot that is written at most
//! once. Consumers register observers on the `Deferred` (or `.await` it);
//! the producer holding the `Resolver` settles it with a value or an error.
//! Deferreds compose with [`Deferred::chained`] and
//! [`Deferred::transformed`], which short-circuit on the first failure.
//!
//! ```
//! use deferred::{pending, Deferred, Outcome, Promise};
//! use std::sync::mpsc::channel;
//!
//! let (resolver, deferred) = pending::<i32, String>();
//! let (tx, rx) = channel();
//! deferred
//!     .chained(|x| Ok(Deferred::resolved(x * 2)))
//!     .observe(move |outcome| tx.send(outcome.clone()).unwrap());
//! resolver.resolve(5);
//! assert_eq!(rx.recv().unwrap(), Outcome::Success(10));
//! ```
mod deferred;
mod drain;
pub mod executor;
mod outcome;
mod resolver;
mod wait;

pub use crate::deferred::Deferred;
pub use executor::{Executor, Inline, NewThread};
pub use outcome::Outcome;
pub use resolver::{pending, Resolver};
pub use wait::Wait;

/// Errors reported by the deferred machinery itself, as opposed to the
/// failures carried in an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A `try_*` settlement found the value already written.
    #[error("the deferred value was already settled")]
    AlreadySettled,
    /// Every [`Resolver`] was dropped while the value was still pending.
    #[error("every resolver was dropped before the deferred value settled")]
    ProducerDropped,
}

/// The producer half of a promise pair.
pub trait Promise {
    type Output;
    type Error;
    type Waiter;

    /// Creates a linked producer and waiter.
    fn new() -> (Self, Self::Waiter)
    where
        Self: Sized;
    /// Settles with a value. Ignored if already settled.
    fn resolve(self, value: Self::Output);
    /// Settles with an error. Ignored if already settled.
    fn reject(self, err: Self::Error);
}
