//! Counting barrier joining the units of one pipeline stage.
//!
//! A barrier is created knowing how many units will report. Each unit
//! signals exactly once with its result; the continuation runs once, on
//! the thread that delivers the last signal, after the barrier's lock has
//! been released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, SpriteError};

type Continuation<T> = Box<dyn FnOnce(Result<Vec<T>>) + Send>;

/// Shared handle to a stage barrier. Clones refer to the same barrier.
pub struct StageBarrier<T> {
    stage: &'static str,
    inner: Arc<Mutex<State<T>>>,
}

struct State<T> {
    expected: usize,
    received: usize,
    values: Vec<T>,
    failures: Vec<SpriteError>,
    on_complete: Option<Continuation<T>>,
}

impl<T> Clone for StageBarrier<T> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> StageBarrier<T> {
    /// Create a barrier for `expected` units.
    ///
    /// With `expected == 0` the continuation runs immediately, before this
    /// returns, with an empty result.
    pub fn new<F>(stage: &'static str, expected: usize, on_complete: F) -> Self
    where
        F: FnOnce(Result<Vec<T>>) + Send + 'static,
    {
        let barrier = Self {
            stage,
            inner: Arc::new(Mutex::new(State {
                expected,
                received: 0,
                values: Vec::with_capacity(expected),
                failures: vec![],
                on_complete: Some(Box::new(on_complete)),
            })),
        };
        if expected == 0 {
            barrier.record(0, None);
        }
        barrier
    }

    /// Report one unit's result. Returns true if this signal completed the
    /// barrier.
    pub fn signal(&self, result: Result<T>) -> bool {
        self.record(1, Some(result))
    }

    /// Count `units` that will never run, e.g. because the unit that would
    /// have produced them failed.
    pub fn abandon(&self, units: usize) -> bool {
        self.record(units, None)
    }

    /// Units still outstanding.
    pub fn remaining(&self) -> usize {
        let state = self.lock();
        state.expected.saturating_sub(state.received)
    }

    pub fn is_complete(&self) -> bool {
        self.lock().on_complete.is_none()
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, units: usize, result: Option<Result<T>>) -> bool {
        let ready = {
            let mut state = self.lock();
            if state.on_complete.is_none() {
                log::warn!("{} barrier signalled after completion; ignored", self.stage);
                return false;
            }

            state.received += units;
            match result {
                Some(Ok(value)) => state.values.push(value),
                Some(Err(err)) => state.failures.push(err),
                None => {}
            }

            if state.received >= state.expected {
                let values = std::mem::take(&mut state.values);
                let failures = std::mem::take(&mut state.failures);
                state.on_complete.take().map(|f| (f, values, failures))
            } else {
                None
            }
        };

        match ready {
            Some((on_complete, values, failures)) => {
                log::debug!(
                    "{} barrier complete: {} ok, {} failed",
                    self.stage,
                    values.len(),
                    failures.len()
                );
                on_complete(outcome(self.stage, values, failures));
                true
            }
            None => false,
        }
    }
}

fn outcome<T>(stage: &str, values: Vec<T>, mut failures: Vec<SpriteError>) -> Result<Vec<T>> {
    match failures.len() {
        0 => Ok(values),
        1 => Err(failures.remove(0)),
        count => Err(SpriteError::Aborted {
            stage: stage.to_string(),
            count,
            errors: failures,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::thread;

    fn capture<T: Send + 'static>(
        stage: &'static str,
        expected: usize,
    ) -> (StageBarrier<T>, mpsc::Receiver<Result<Vec<T>>>) {
        let (tx, rx) = mpsc::channel();
        let barrier = StageBarrier::new(stage, expected, move |outcome| {
            tx.send(outcome).unwrap();
        });
        (barrier, rx)
    }

    fn failure(n: u32) -> SpriteError {
        SpriteError::SheetWrite {
            path: PathBuf::from(format!("{}.png", n)),
            message: "disk full".to_string(),
        }
    }

    #[test]
    fn test_fires_exactly_once_on_last_signal() {
        for order in [[0, 1, 2], [2, 0, 1], [1, 2, 0]] {
            let (barrier, rx) = capture::<u32>("test", 3);
            let mut fired = vec![];
            for n in order {
                fired.push(barrier.signal(Ok(n)));
            }
            assert_eq!(fired, vec![false, false, true]);

            let mut values = rx.try_recv().unwrap().unwrap();
            values.sort();
            assert_eq!(values, vec![0, 1, 2]);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_not_fired_before_expected() {
        let (barrier, rx) = capture::<u32>("test", 2);
        barrier.signal(Ok(1));
        assert!(rx.try_recv().is_err());
        assert_eq!(barrier.remaining(), 1);
        assert!(!barrier.is_complete());
    }

    #[test]
    fn test_zero_expected_fires_immediately() {
        let (barrier, rx) = capture::<u32>("test", 0);
        assert_eq!(rx.try_recv().unwrap().unwrap(), Vec::<u32>::new());
        assert!(barrier.is_complete());
    }

    #[test]
    fn test_late_signal_ignored() {
        let (barrier, rx) = capture::<u32>("test", 1);
        assert!(barrier.signal(Ok(1)));
        assert!(!barrier.signal(Ok(2)));
        assert_eq!(rx.try_recv().unwrap().unwrap(), vec![1]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_single_failure_passed_through() {
        let (barrier, rx) = capture::<u32>("pack", 2);
        barrier.signal(Ok(1));
        barrier.signal(Err(failure(1)));
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, SpriteError::SheetWrite { .. }));
    }

    #[test]
    fn test_multiple_failures_aggregate() {
        let (barrier, rx) = capture::<u32>("pack", 2);
        barrier.signal(Err(failure(1)));
        barrier.signal(Err(failure(2)));
        match rx.try_recv().unwrap().unwrap_err() {
            SpriteError::Aborted { stage, count, errors } => {
                assert_eq!(stage, "pack");
                assert_eq!(count, 2);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_abandon_counts_toward_completion() {
        let (barrier, rx) = capture::<u32>("pack", 4);
        barrier.signal(Err(failure(1)));
        assert!(!barrier.abandon(1));
        barrier.signal(Ok(5));
        assert!(barrier.abandon(1));
        assert!(rx.try_recv().unwrap().is_err());
    }

    #[test]
    fn test_continuation_may_touch_barrier() {
        // the lock is released before the continuation runs
        let (tx, rx) = mpsc::channel();
        let slot: Arc<Mutex<Option<StageBarrier<u32>>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let barrier = StageBarrier::new("test", 1, move |_| {
            let handle = inner.lock().unwrap().take().unwrap();
            tx.send(handle.remaining()).unwrap();
        });
        *slot.lock().unwrap() = Some(barrier.clone());

        barrier.signal(Ok(1));
        assert_eq!(rx.try_recv().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_signals() {
        let (barrier, rx) = capture::<usize>("test", 32);
        let handles: Vec<_> = (0..32)
            .map(|n| {
                let barrier = barrier.clone();
                thread::spawn(move || barrier.signal(Ok(n)))
            })
            .collect();
        let fired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&f| f)
            .count();

        assert_eq!(fired, 1);
        assert_eq!(rx.recv().unwrap().unwrap().len(), 32);
    }
}
