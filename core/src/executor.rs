//! Execution queues the kernel can be enqueued on.
use std::cell::RefCell;
#[allow(unused_imports)]
use std::sync::{Arc, Mutex};

#[cfg(feature = "multithread")]
use rayon::{ThreadPool, ThreadPoolBuilder};

#[cfg(feature = "multithread")]
use crate::errors::RoiResult;

#[derive(Debug, Clone, Default)]
pub enum Executor {
    #[default]
    SingleThread,
    #[cfg(feature = "multithread")]
    MultiThread(Arc<ThreadPool>),
}

impl Executor {
    #[cfg(feature = "multithread")]
    pub fn multithread(n: usize) -> RoiResult<Executor> {
        let pool = ThreadPoolBuilder::new()
            .thread_name(|ix| format!("roialign-{ix}"))
            .num_threads(n)
            .build()?;
        Ok(Executor::MultiThread(Arc::new(pool)))
    }

    pub fn is_multithread(&self) -> bool {
        !matches!(self, Executor::SingleThread)
    }
}

static DEFAULT_EXECUTOR: Mutex<Executor> = Mutex::new(Executor::SingleThread);

thread_local! {
    static TLS_EXECUTOR_OVERRIDE: RefCell<Option<Executor>> = Default::default();
}

/// Executor used when the caller does not name one: the innermost
/// [`multithread_scope`] on this thread, else the process default.
pub fn current_executor() -> Executor {
    if let Some(over_ride) = TLS_EXECUTOR_OVERRIDE.with_borrow(|tls| tls.clone()) {
        over_ride
    } else {
        DEFAULT_EXECUTOR.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

pub fn set_default_executor(executor: Executor) {
    match DEFAULT_EXECUTOR.lock() {
        Ok(mut default) => *default = executor,
        Err(poisoned) => *poisoned.into_inner() = executor,
    }
}

pub fn multithread_scope<R, F: FnOnce() -> R>(pool: Executor, f: F) -> R {
    let previous = TLS_EXECUTOR_OVERRIDE.replace(Some(pool));
    let result = f();
    TLS_EXECUTOR_OVERRIDE.set(previous);
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scope_overrides_default() {
        assert!(!current_executor().is_multithread());
        #[cfg(feature = "multithread")]
        {
            let pool = Executor::multithread(2).unwrap();
            let inside = multithread_scope(pool, || current_executor().is_multithread());
            assert!(inside);
        }
        assert!(!current_executor().is_multithread());
    }
}
