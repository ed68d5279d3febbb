//! Compensating transactions
//!
//! Records an ordered list of `(do, undo)` steps. `commit` runs every `do`
//! in order; the first failure, or a timeout, triggers the `undo`s
//! collected so far, run in reverse. Single-process only — there is no
//! distributed coordinator here, matching the "no distributed coordination"
//! contract the façade's `store_with_transaction` relies on for composing a
//! memory insert with an embedding attachment.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use crate::error::{MemoryError, Result};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type DoFn = Box<dyn FnOnce() -> BoxFuture<Result<()>> + Send>;
type UndoFn = Box<dyn FnOnce() -> BoxFuture<()> + Send>;

struct Step {
    do_fn: DoFn,
    undo_fn: UndoFn,
}

#[derive(Debug)]
struct TimedOut;

impl std::fmt::Display for TimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transaction timed out before all steps completed")
    }
}

impl std::error::Error for TimedOut {}

/// An ordered list of compensating steps.
#[derive(Default)]
pub struct Transaction {
    steps: Vec<Step>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction { steps: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Add a step: `do_fn` is run at `commit` time; if it (or a later step)
    /// fails, `undo_fn` runs as part of rollback. `undo_fn` is only invoked
    /// for steps whose `do_fn` already succeeded.
    pub fn step<D, DFut, U, UFut>(&mut self, do_fn: D, undo_fn: U)
    where
        D: FnOnce() -> DFut + Send + 'static,
        DFut: Future<Output = Result<()>> + Send + 'static,
        U: FnOnce() -> UFut + Send + 'static,
        UFut: Future<Output = ()> + Send + 'static,
    {
        self.steps.push(Step {
            do_fn: Box::new(move || Box::pin(do_fn())),
            undo_fn: Box::new(move || Box::pin(undo_fn())),
        });
    }

    /// Run every step's `do_fn` in order. Completed steps' `undo_fn`s are
    /// tracked outside the timed future so a timeout can still roll them
    /// back even though the in-flight step itself is abandoned.
    pub async fn commit(self, timeout: Duration) -> Result<()> {
        let completed: Arc<Mutex<Vec<UndoFn>>> = Arc::new(Mutex::new(Vec::new()));
        let steps = self.steps;
        let tracking = Arc::clone(&completed);

        let run = async move {
            for step in steps {
                (step.do_fn)().await?;
                tracking.lock().unwrap().push(step.undo_fn);
            }
            Ok(())
        };

        let result = match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                warn!("transaction commit timed out, rolling back completed steps");
                Err(MemoryError::transient("Transaction::commit", None, TimedOut))
            }
        };

        if result.is_err() {
            loop {
                let undo = completed.lock().unwrap().pop();
                match undo {
                    Some(undo) => (undo)().await,
                    None => break,
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn commits_steps_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tx = Transaction::new();
        for i in 0..3u32 {
            let order = Arc::clone(&order);
            tx.step(
                move || {
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().unwrap().push(i);
                        Ok(())
                    }
                },
                || async {},
            );
        }
        tx.commit(Duration::from_secs(1)).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn rolls_back_completed_steps_on_failure_in_reverse_order() {
        let undone = Arc::new(Mutex::new(Vec::new()));
        let mut tx = Transaction::new();

        let undone1 = Arc::clone(&undone);
        tx.step(
            || async { Ok(()) },
            move || {
                let undone1 = Arc::clone(&undone1);
                async move { undone1.lock().unwrap().push(1) }
            },
        );
        let undone2 = Arc::clone(&undone);
        tx.step(
            || async { Ok(()) },
            move || {
                let undone2 = Arc::clone(&undone2);
                async move { undone2.lock().unwrap().push(2) }
            },
        );
        tx.step(
            || async { Err(MemoryError::invalid("test", "boom")) },
            || async {},
        );

        let err = tx.commit(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, MemoryError::Invalid { .. }));
        assert_eq!(*undone.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rolls_back_completed_steps() {
        let undone = Arc::new(AtomicU32::new(0));
        let mut tx = Transaction::new();

        let undone1 = Arc::clone(&undone);
        tx.step(
            || async { Ok(()) },
            move || {
                let undone1 = Arc::clone(&undone1);
                async move {
                    undone1.fetch_add(1, Ordering::SeqCst);
                }
            },
        );
        tx.step(
            || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
            || async {},
        );

        let err = tx.commit(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, MemoryError::Transient { .. }));
        assert_eq!(undone.load(Ordering::SeqCst), 1);
    }
}
