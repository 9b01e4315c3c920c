//! Where result callbacks run
//!
//! Callbacks are never invoked while the loader holds a lock. Each completed
//! transfer hands one job to the configured executor; that job decodes the
//! body and calls every attached callback in attachment order.

use std::sync::Arc;
use tokio::runtime::Handle;

/// Unit of work handed to a [`CallbackExecutor`]
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs callback jobs
///
/// Implement this to deliver results on a thread or event loop of your own
/// such as a UI thread.
pub trait CallbackExecutor: Send + Sync {
    /// Run `job`, now or later, exactly once
    fn execute(&self, job: Job);
}

/// Spawns each job as a task on the runtime
impl CallbackExecutor for Handle {
    fn execute(&self, job: Job) {
        self.spawn(async move { job() });
    }
}

/// Runs each job immediately on the calling thread
///
/// Cache hits then complete inside `fetch` itself, and transfer results on the
/// transfer's own task.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Callback delivery context chosen when building a loader
#[derive(Clone, Default)]
pub enum Delivery {
    /// Spawn callbacks on the tokio runtime the loader was created on
    #[default]
    Ambient,
    /// Run callbacks synchronously wherever the result becomes available
    Inline,
    /// Hand callbacks to a caller-provided executor
    Executor(Arc<dyn CallbackExecutor>),
}

impl Delivery {
    /// Resolve to a concrete executor; `runtime` backs [`Delivery::Ambient`]
    pub(crate) fn into_executor(self, runtime: &Handle) -> Arc<dyn CallbackExecutor> {
        match self {
            Delivery::Ambient => Arc::new(runtime.clone()),
            Delivery::Inline => Arc::new(InlineExecutor),
            Delivery::Executor(executor) => executor,
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Ambient => f.write_str("Ambient"),
            Delivery::Inline => f.write_str("Inline"),
            Delivery::Executor(_) => f.write_str("Executor(..)"),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn inline_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let runtime = tokio_runtime();
        let executor = Delivery::Inline.into_executor(runtime.handle());

        executor.execute(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ambient_spawns_on_the_runtime() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let executor = Delivery::Ambient.into_executor(&Handle::current());

        executor.execute(Box::new(move || {
            tx.send(std::thread::current().name().map(str::to_owned)).ok();
        }));

        // Completes only if the job actually ran
        rx.await.unwrap();
    }

    #[test]
    fn custom_executor_is_used_as_is() {
        struct Counting(AtomicUsize);
        impl CallbackExecutor for Counting {
            fn execute(&self, job: Job) {
                self.0.fetch_add(1, Ordering::SeqCst);
                job();
            }
        }

        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let delivery = Delivery::Executor(counting.clone());
        assert_eq!(format!("{delivery:?}"), "Executor(..)");

        let runtime = tokio_runtime();
        let executor = delivery.into_executor(runtime.handle());
        executor.execute(Box::new(|| {}));
        executor.execute(Box::new(|| {}));

        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
    }

    fn tokio_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }
}
