//! Per-thread delivery queue.
//!
//! Settling one deferred usually settles the next one from inside an
//! observer, and abandoning one drops observers that own further resolvers.
//! Running that work through this queue keeps the stack flat however long
//! the chain is: a task scheduled while another task is running on the same
//! thread is queued, and the outermost [`schedule`] call runs the queue dry
//! before it returns.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::mem;
use std::thread;

pub(crate) type Task = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
    static DRAINING: Cell<bool> = Cell::new(false);
}

pub(crate) fn schedule(task: Task) {
    if DRAINING.with(|draining| draining.replace(true)) {
        let mut task = Some(task);
        let _ = QUEUE.try_with(|queue| queue.borrow_mut().extend(task.take()));
        // Thread-local storage is being torn down; nothing will drain it.
        if let Some(task) = task {
            task();
        }
        return;
    }

    let _draining = Draining;
    task();
    while let Some(next) = pop() {
        next();
    }
}

fn pop() -> Option<Task> {
    QUEUE
        .try_with(|queue| queue.borrow_mut().pop_front())
        .ok()
        .flatten()
}

/// Clears the draining flag on the way out, including when a task panics.
struct Draining;

impl Drop for Draining {
    fn drop(&mut self) {
        DRAINING.with(|draining| draining.set(false));
        if thread::panicking() {
            // Tasks behind the one that panicked never run. Dropping them
            // may schedule more work, which now drains normally.
            let stranded = QUEUE
                .try_with(|queue| mem::take(&mut *queue.borrow_mut()))
                .unwrap_or_default();
            drop(stranded);
        }
    }
}
