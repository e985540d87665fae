//! Delivery contexts.
//!
//! By default observers run on whichever thread settles a deferred. An
//! [`Executor`] passed to [`Deferred::delivered_on`] moves that work
//! somewhere else.
use std::sync::Arc;
use std::thread;

use tracing::warn;

use crate::{pending, Deferred};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync + 'static {
    fn execute(&self, job: Job);
}

/// Runs each job immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) {
        job()
    }
}

/// Spawns a fresh OS thread for every job.
#[derive(Debug, Clone, Default)]
pub struct NewThread {
    name: Option<String>,
}

impl NewThread {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Executor for NewThread {
    fn execute(&self, job: Job) {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        // A job that never runs drops its resolver, which abandons the
        // delivered deferred.
        if let Err(err) = builder.spawn(job) {
            warn!(error = %err, "failed to spawn delivery thread");
        }
    }
}

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

#[cfg(feature = "thread-pool")]
impl Executor for futures::executor::ThreadPool {
    fn execute(&self, job: Job) {
        self.spawn_ok(async move { job() })
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// A deferred that settles with the same outcome, but on `executor`.
    ///
    /// Observers of the returned deferred registered before settlement run
    /// on the executor instead of the producer's thread.
    pub fn delivered_on<X: Executor>(&self, executor: X) -> Deferred<T, E> {
        let (resolver, delivered) = pending();
        self.observe(move |outcome| {
            let outcome = outcome.clone();
            executor.execute(Box::new(move || resolver.settle(outcome)));
        });
        delivered
    }
}
