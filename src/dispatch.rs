//! The pluggable hook deciding where a promise's completions actually run.

use std::fmt;
use std::sync::Arc;

/// A queued completion, ready to run.
pub type Job = Box<dyn FnOnce() + Send>;

/// Accepts a zero-argument job and arranges for its eventual execution.
///
/// Every [`Promise`](crate::Promise) owns one of these. The default,
/// [`Dispatcher::inline`], runs each job immediately on the calling thread;
/// [`Dispatcher::new`] plugs in any other execution context, such as a
/// serialized work queue:
///
/// ```
/// use promise_rail::{Dispatcher, Job, Promise};
/// use std::collections::VecDeque;
/// use std::sync::{Arc, Mutex};
///
/// let queue: Arc<Mutex<VecDeque<Job>>> = Arc::new(Mutex::new(VecDeque::new()));
/// let backlog = queue.clone();
/// let dispatcher = Dispatcher::new(move |job| backlog.lock().unwrap().push_back(job));
///
/// let promise = Promise::with_dispatcher(dispatcher);
/// promise.then(|n| println!("ran later: {n}"));
/// promise.fulfill(1);
///
/// // Settlement queued the completion instead of running it.
/// let job = queue.lock().unwrap().pop_front().unwrap();
/// job();
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    run: Arc<dyn Fn(Job) + Send + Sync>,
}

impl Dispatcher {
    /// Run each job immediately, on whichever thread triggered it.
    pub fn inline() -> Self {
        Self {
            run: Arc::new(|job: Job| job()),
        }
    }

    /// Hand each job to a caller-supplied execution context.
    pub fn new(run: impl Fn(Job) + Send + Sync + 'static) -> Self {
        Self { run: Arc::new(run) }
    }

    pub(crate) fn run(&self, job: Job) {
        (self.run)(job)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::inline()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dispatcher")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn inline_runs_immediately() {
        let ran = Arc::new(AtomicUsize::new(0));
        let seen = ran.clone();
        Dispatcher::inline().run(Box::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_dispatcher_defers_until_drained() {
        let jobs: Arc<std::sync::Mutex<Vec<Job>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let backlog = jobs.clone();
        let dispatcher = Dispatcher::new(move |job| backlog.lock().unwrap().push(job));

        let ran = Arc::new(AtomicUsize::new(0));
        let seen = ran.clone();
        dispatcher.run(Box::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        for job in jobs.lock().unwrap().drain(..) {
            job();
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
