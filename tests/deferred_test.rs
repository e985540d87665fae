#[cfg(test)]
mod tests {
    use deferred::{pending, Deferred, Outcome, Promise, Resolver};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    type Log = Arc<Mutex<Vec<(usize, Outcome<i32, String>)>>>;

    fn register(deferred: &Deferred<i32, String>, log: &Log, id: usize) {
        let log = Arc::clone(log);
        deferred.observe(move |outcome| log.lock().unwrap().push((id, outcome.clone())));
    }

    proptest! {
        /// Property: every observer sees the first outcome exactly once, and
        /// early observers see it in registration order.
        #[test]
        fn prop_single_delivery_in_order(
            before in 0usize..16,
            after in 0usize..16,
            value in any::<i32>(),
            retries in prop::collection::vec(any::<bool>(), 0..4),
        ) {
            let (resolver, deferred) = pending::<i32, String>();
            let log: Log = Arc::new(Mutex::new(vec![]));
            for id in 0..before {
                register(&deferred, &log, id);
            }
            prop_assert!(log.lock().unwrap().is_empty());

            let spares: Vec<Resolver<i32, String>> = retries.iter().map(|_| resolver.clone()).collect();
            resolver.resolve(value);
            for (spare, reject) in spares.into_iter().zip(retries) {
                if reject {
                    spare.reject("late".to_string());
                } else {
                    spare.resolve(value.wrapping_add(1));
                }
            }
            prop_assert_eq!(log.lock().unwrap().len(), before);

            for id in before..before + after {
                register(&deferred, &log, id);
                // Late observers fire inside `observe`.
                prop_assert_eq!(log.lock().unwrap().len(), id + 1);
            }

            let log = log.lock().unwrap();
            let ids: Vec<usize> = log.iter().map(|(id, _)| *id).collect();
            prop_assert_eq!(ids, (0..before + after).collect::<Vec<_>>());
            prop_assert!(log.iter().all(|(_, outcome)| *outcome == Outcome::Success(value)));
        }

        /// Property: a failure anywhere in a chain is the only outcome seen
        /// at the end, and later steps never run.
        #[test]
        fn prop_chain_short_circuits(fail_at in 0usize..6, len in 1usize..6) {
            let (resolver, head) = pending::<usize, String>();
            let steps_run = Arc::new(AtomicUsize::new(0));
            let mut tail = head.clone();
            for step in 1..=len {
                let steps_run = Arc::clone(&steps_run);
                tail = tail.chained(move |x| {
                    steps_run.fetch_add(1, Ordering::SeqCst);
                    if step == fail_at {
                        Err(format!("step {step}"))
                    } else {
                        Ok(Deferred::resolved(x + 1))
                    }
                });
            }
            resolver.resolve(0);

            let outcome = tail.outcome().expect("chain should settle synchronously");
            if (1..=len).contains(&fail_at) {
                prop_assert_eq!(&*outcome, &Outcome::Failure(format!("step {fail_at}")));
                prop_assert_eq!(steps_run.load(Ordering::SeqCst), fail_at);
            } else {
                prop_assert_eq!(&*outcome, &Outcome::Success(len));
                prop_assert_eq!(steps_run.load(Ordering::SeqCst), len);
            }
        }
    }

    #[test]
    fn test_concurrent_observe_and_resolve_delivers_once() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 64;

        let (resolver, deferred) = Resolver::<u64, ()>::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS + 1));

        let observers: Vec<_> = (0..THREADS)
            .map(|_| {
                let deferred = deferred.clone();
                let delivered = Arc::clone(&delivered);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..PER_THREAD {
                        let delivered = Arc::clone(&delivered);
                        deferred.observe(move |_| {
                            delivered.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        let producer = thread::spawn(move || {
            barrier.wait();
            resolver.resolve(42);
        });

        producer.join().expect("The producer thread has panicked");
        for task in observers {
            task.join().expect("An observer thread has panicked");
        }
        assert_eq!(delivered.load(Ordering::SeqCst), THREADS * PER_THREAD);
        assert_eq!(deferred.outcome().as_deref(), Some(&Outcome::Success(42)));
    }

    #[test]
    fn test_racing_resolvers_settle_once() {
        let (resolver, deferred) = pending::<usize, ()>();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        deferred.observe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let resolver = resolver.clone();
                thread::spawn(move || resolver.try_resolve(n).is_ok())
            })
            .collect();
        drop(resolver);
        let winners = tasks
            .into_iter()
            .map(|task| task.join().expect("A resolver thread has panicked"))
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(deferred.is_settled());
    }

    const LONG_CHAIN: usize = 100_000;

    fn long_chain() -> (Resolver<usize, ()>, Deferred<usize, ()>) {
        let (resolver, head) = pending::<usize, ()>();
        let mut tail = head;
        for _ in 0..LONG_CHAIN {
            tail = tail.transformed(|x| Ok(x + 1));
        }
        (resolver, tail)
    }

    #[test]
    fn test_long_chain_settles() {
        let (resolver, tail) = long_chain();
        resolver.resolve(0);
        assert_eq!(tail.outcome().as_deref(), Some(&Outcome::Success(LONG_CHAIN)));
    }

    #[test]
    fn test_long_chain_abandons() {
        let (resolver, tail) = long_chain();
        drop(resolver);
        assert!(tail.is_abandoned());
    }

    #[test]
    fn test_nested_settlement_keeps_per_deferred_order() {
        let (first, a) = pending::<i32, ()>();
        let (second, b) = pending::<i32, ()>();
        let log = Arc::new(Mutex::new(vec![]));
        for id in ["b1", "b2"] {
            let log = Arc::clone(&log);
            b.observe(move |_| log.lock().unwrap().push(id));
        }
        {
            let log = Arc::clone(&log);
            a.observe(move |_| {
                second.resolve(2);
                log.lock().unwrap().push("a1");
            });
        }
        {
            let log = Arc::clone(&log);
            a.observe(move |_| log.lock().unwrap().push("a2"));
        }
        first.resolve(1);
        // Everything ran before the outer `resolve` returned.
        assert_eq!(*log.lock().unwrap(), vec!["a1", "a2", "b1", "b2"]);
    }
}
