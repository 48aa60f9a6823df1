//! The one-shot promise: a thread-safe asynchronous value container.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::dispatch::{Dispatcher, Job};
use crate::Failure;

/// A thread-safe, one-shot asynchronous value container.
///
/// A promise starts `Pending`, settles at most once via [`fulfill`] or
/// [`reject`], and stays settled forever. Completions registered with
/// [`then`]/[`catch`]/[`finally`] each fire exactly once, in registration
/// order within their branch, whether registered before or after
/// settlement. Invocation happens through the promise's [`Dispatcher`],
/// always after the internal lock is released, so a completion may
/// re-enter the same promise.
///
/// `Promise` is a cheap `Clone` handle; every clone refers to the same
/// settlement event.
///
/// # Examples
///
/// ```
/// use promise_rail::Promise;
/// use std::thread;
///
/// let promise: Promise<String> = Promise::new();
/// promise.then(|value| println!("received {value:?}"));
///
/// let producer = promise.clone();
/// let worker = thread::spawn(move || producer.fulfill(String::from("🍓")));
/// worker.join().expect("the worker thread has panicked");
/// ```
///
/// [`fulfill`]: Promise::fulfill
/// [`reject`]: Promise::reject
/// [`then`]: Promise::then
/// [`catch`]: Promise::catch
/// [`finally`]: Promise::finally
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
    dispatch: Dispatcher,
}

enum State<T> {
    Pending(Completions<T>),
    Fulfilled(Arc<T>),
    Rejected(Arc<Failure>),
}

type FulfillCallback<T> = Box<dyn FnOnce(Arc<T>) + Send>;
type RejectCallback = Box<dyn FnOnce(Arc<Failure>) + Send>;

/// Callbacks accumulated while a promise is pending, one ordered list per
/// branch. A never-settled promise retains these indefinitely; they are
/// reclaimed with the promise when the last handle drops.
struct Completions<T> {
    on_fulfill: Vec<FulfillCallback<T>>,
    on_reject: Vec<RejectCallback>,
}

impl<T> Completions<T> {
    fn new() -> Self {
        Self {
            on_fulfill: Vec::new(),
            on_reject: Vec::new(),
        }
    }
}

impl<T: Send + Sync + 'static> Promise<T> {
    /// A new pending promise with the inline dispatcher.
    pub fn new() -> Self {
        Self::with_dispatcher(Dispatcher::inline())
    }

    /// A new pending promise whose completions run through `dispatch`.
    pub fn with_dispatcher(dispatch: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending(Completions::new())),
                dispatch,
            }),
        }
    }

    /// An already-fulfilled promise.
    pub fn resolved(value: T) -> Self {
        let promise = Self::new();
        promise.fulfill(value);
        promise
    }

    /// An already-rejected promise.
    pub fn rejected(failure: Failure) -> Self {
        let promise = Self::new();
        promise.reject(failure);
        promise
    }

    /// A promise settled from a two-track result: fulfilled on `Ok`, rejected
    /// on `Err` with the failure lifted into a [`Failure`].
    pub fn from_result<E: Any + Send + Sync>(result: Result<T, E>) -> Self {
        let promise = Self::new();
        promise.complete(result);
        promise
    }

    /// Runs `factory` eagerly and returns its promise. A panic before a
    /// promise exists becomes an already-rejected promise.
    ///
    /// ```
    /// use promise_rail::{Panic, Promise};
    ///
    /// let promise = Promise::<u32>::attempt(|| panic!("no promise today"));
    /// let failure = promise.error().unwrap();
    /// assert_eq!(failure.downcast_ref::<Panic>().unwrap().message(), "no promise today");
    /// ```
    pub fn attempt(factory: impl FnOnce() -> Self) -> Self {
        match panic::catch_unwind(AssertUnwindSafe(factory)) {
            Ok(promise) => promise,
            Err(payload) => Self::rejected(Failure::from_panic(payload)),
        }
    }

    /// Settles the promise with a value. The first settlement wins; on an
    /// already-settled promise this is a no-op.
    ///
    /// Fulfillment completions registered so far run in registration order
    /// through the dispatcher, after the lock is released. Rejection
    /// completions are discarded.
    pub fn fulfill(&self, value: T) {
        self.settle_fulfilled(Arc::new(value));
    }

    /// Settles the promise with a failure. The first settlement wins; on an
    /// already-settled promise this is a no-op.
    pub fn reject(&self, failure: Failure) {
        self.settle_rejected(Arc::new(failure));
    }

    /// The bridge from the railway world: [`fulfill`](Promise::fulfill) on
    /// `Ok`, wrap the failure into a [`Failure`] and
    /// [`reject`](Promise::reject) on `Err`.
    pub fn complete<E: Any + Send + Sync>(&self, result: Result<T, E>) {
        match result {
            Ok(value) => self.fulfill(value),
            Err(error) => self.reject(Failure::new(error)),
        }
    }

    /// Registers a side-effecting completion on the fulfillment branch and
    /// returns a handle to the same promise.
    ///
    /// Pending: the completion is appended and fires on fulfillment.
    /// Fulfilled: it is scheduled now, through the dispatcher. Rejected: it
    /// is dropped, never invoked.
    pub fn then(&self, on_fulfilled: impl FnOnce(&T) + Send + 'static) -> Self {
        self.subscribe(
            Some(Box::new(move |value: Arc<T>| on_fulfilled(&value))),
            None,
        );
        self.clone()
    }

    /// Registers a side-effecting completion on the rejection branch and
    /// returns a handle to the same promise.
    ///
    /// Does not reopen the fulfillment branch: recovery to a new value
    /// means constructing a replacement promise yourself.
    pub fn catch(&self, on_rejected: impl FnOnce(&Failure) + Send + 'static) -> Self {
        self.subscribe(
            None,
            Some(Box::new(move |failure: Arc<Failure>| on_rejected(&failure))),
        );
        self.clone()
    }

    /// Registers `on_settled` on both branches; it fires exactly once total,
    /// on whichever branch settles, ignoring the carried value or failure.
    pub fn finally(&self, on_settled: impl FnOnce() + Send + 'static) -> Self {
        // Shared one-shot slot; only one branch ever settles.
        let slot = Arc::new(Mutex::new(Some(on_settled)));
        let on_fulfill = slot.clone();
        self.subscribe(
            Some(Box::new(move |_| {
                if let Some(callback) = on_fulfill.lock().unwrap().take() {
                    callback()
                }
            })),
            Some(Box::new(move |_| {
                if let Some(callback) = slot.lock().unwrap().take() {
                    callback()
                }
            })),
        );
        self.clone()
    }

    /// The transforming `then`: returns a fresh derived promise, fulfilled
    /// with `transform`'s return value or rejected with the panic it raised.
    /// A rejection of this promise passes through to the derived promise
    /// unchanged.
    ///
    /// ```
    /// use promise_rail::Promise;
    ///
    /// let promise = Promise::resolved(5);
    /// let incremented = promise.map(|n| n + 1);
    /// assert_eq!(incremented.value().as_deref(), Some(&6));
    /// ```
    pub fn map<U: Send + Sync + 'static>(
        &self,
        transform: impl FnOnce(&T) -> U + Send + 'static,
    ) -> Promise<U> {
        let derived = Promise::with_dispatcher(self.inner.dispatch.clone());
        let on_fulfill = derived.clone();
        let on_reject = derived.clone();
        self.subscribe(
            Some(Box::new(move |value: Arc<T>| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| transform(&value)))
                    .map_err(crate::Panic::from_payload);
                on_fulfill.complete(outcome);
            })),
            Some(Box::new(move |failure: Arc<Failure>| {
                on_reject.settle_rejected(failure)
            })),
        );
        derived
    }

    /// The flattening `then`: `transform` returns a promise, and the derived
    /// promise adopts that inner promise's eventual settlement. A panic in
    /// `transform` rejects the derived promise; a rejection of this promise
    /// passes through unchanged.
    pub fn and_then<U: Send + Sync + 'static>(
        &self,
        transform: impl FnOnce(&T) -> Promise<U> + Send + 'static,
    ) -> Promise<U> {
        let derived = Promise::with_dispatcher(self.inner.dispatch.clone());
        let on_fulfill = derived.clone();
        let on_reject = derived.clone();
        self.subscribe(
            Some(Box::new(move |value: Arc<T>| {
                match panic::catch_unwind(AssertUnwindSafe(|| transform(&value))) {
                    Ok(inner) => inner.forward_to(&on_fulfill),
                    Err(payload) => on_fulfill.reject(Failure::from_panic(payload)),
                }
            })),
            Some(Box::new(move |failure: Arc<Failure>| {
                on_reject.settle_rejected(failure)
            })),
        );
        derived
    }

    /// Crosses a dispatch boundary: returns a fresh promise owning
    /// `dispatch` that merely forwards this promise's settlement. This
    /// promise's own state, lock, and dispatcher are untouched.
    pub fn via(&self, dispatch: Dispatcher) -> Self {
        let derived = Promise::with_dispatcher(dispatch);
        self.forward_to(&derived);
        derived
    }

    /// Whether the promise has not settled yet.
    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.state.lock().unwrap(), State::Pending(_))
    }

    /// Whether the promise settled on the fulfillment branch.
    pub fn is_fulfilled(&self) -> bool {
        matches!(*self.inner.state.lock().unwrap(), State::Fulfilled(_))
    }

    /// Whether the promise settled on the rejection branch.
    pub fn is_rejected(&self) -> bool {
        matches!(*self.inner.state.lock().unwrap(), State::Rejected(_))
    }

    /// The fulfillment value, if the promise has fulfilled.
    pub fn value(&self) -> Option<Arc<T>> {
        match &*self.inner.state.lock().unwrap() {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection failure, if the promise has rejected.
    pub fn error(&self) -> Option<Arc<Failure>> {
        match &*self.inner.state.lock().unwrap() {
            State::Rejected(failure) => Some(failure.clone()),
            _ => None,
        }
    }

    fn settle_fulfilled(&self, value: Arc<T>) {
        // The whole pending list leaves the critical section: discarded
        // rejection callbacks may run arbitrary Drop code that re-enters
        // this promise.
        let completions = {
            let mut state = self.inner.state.lock().unwrap();
            match std::mem::replace(&mut *state, State::Fulfilled(value.clone())) {
                State::Pending(completions) => {
                    trace!(
                        completions = completions.on_fulfill.len(),
                        "promise fulfilled"
                    );
                    Some(completions)
                }
                settled => {
                    // Lost the settlement race; the first settlement stands.
                    *state = settled;
                    trace!("fulfill after settlement ignored");
                    None
                }
            }
        };
        if let Some(completions) = completions {
            for callback in completions.on_fulfill {
                let value = value.clone();
                self.inner.dispatch.run(Box::new(move || callback(value)));
            }
            drop(completions.on_reject);
        }
    }

    fn settle_rejected(&self, failure: Arc<Failure>) {
        let completions = {
            let mut state = self.inner.state.lock().unwrap();
            match std::mem::replace(&mut *state, State::Rejected(failure.clone())) {
                State::Pending(completions) => {
                    trace!(
                        completions = completions.on_reject.len(),
                        "promise rejected"
                    );
                    Some(completions)
                }
                settled => {
                    *state = settled;
                    trace!("reject after settlement ignored");
                    None
                }
            }
        };
        if let Some(completions) = completions {
            for callback in completions.on_reject {
                let failure = failure.clone();
                self.inner.dispatch.run(Box::new(move || callback(failure)));
            }
            drop(completions.on_fulfill);
        }
    }

    /// Internal registration used by every chaining operation.
    ///
    /// The critical section covers only the state inspection and list
    /// append; a completion that is already due runs through the dispatcher
    /// after the lock is released.
    fn subscribe(
        &self,
        on_fulfill: Option<FulfillCallback<T>>,
        on_reject: Option<RejectCallback>,
    ) {
        let due: Option<Job> = {
            let mut state = self.inner.state.lock().unwrap();
            match &mut *state {
                State::Pending(completions) => {
                    if let Some(callback) = on_fulfill {
                        completions.on_fulfill.push(callback);
                    }
                    if let Some(callback) = on_reject {
                        completions.on_reject.push(callback);
                    }
                    None
                }
                State::Fulfilled(value) => {
                    let value = value.clone();
                    on_fulfill.map(|callback| -> Job { Box::new(move || callback(value)) })
                }
                State::Rejected(failure) => {
                    let failure = failure.clone();
                    on_reject.map(|callback| -> Job { Box::new(move || callback(failure)) })
                }
            }
        };
        if let Some(job) = due {
            self.inner.dispatch.run(job);
        }
    }

    /// Forwards this promise's settlement to `target`, whichever branch it
    /// lands on.
    fn forward_to(&self, target: &Promise<T>) {
        let on_fulfill = target.clone();
        let on_reject = target.clone();
        self.subscribe(
            Some(Box::new(move |value| on_fulfill.settle_fulfilled(value))),
            Some(Box::new(move |failure| on_reject.settle_rejected(failure))),
        );
    }
}

impl<T: Send + Sync + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.state.lock().unwrap() {
            State::Pending(_) => "pending",
            State::Fulfilled(_) => "fulfilled",
            State::Rejected(_) => "rejected",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}
