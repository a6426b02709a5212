//! Single-settlement deferred values.
//!
//! A [`Deferred`] starts out pending and settles exactly once, either resolved
//! with a `T` or rejected with a [`Rejection<E>`]. Whoever settles it first
//! wins, later attempts are no-ops.
//!
//! ```text
//!                ┌──────────────────┐
//!         ┌──────│     Pending      │──────┐
//!         │      └──────────────────┘      │
//!   resolve()              │         reject() / timeout
//!         │                │               │
//!         ▼                │               ▼
//! ┌──────────────────┐     │     ┌──────────────────┐
//! │     Resolved     │─────┴────▶│     Rejected     │
//! └──────────────────┘ callback  └──────────────────┘
//!                      error, once
//! ```
//!
//! Callbacks registered with [`done`](Deferred::done),
//! [`fail`](Deferred::fail) and [`always`](Deferred::always) run in
//! registration order. Callbacks that are registered before settlement run
//! synchronously inside `resolve()`/`reject()`. Callbacks registered after
//! settlement are scheduled on the [`EventLoop`] and run on its next turn,
//! never inline with the registration.
//!
//! A callback that returns `Err` does not escape to the caller. The error is
//! logged and, once per deferred, turned into a forced rejection with
//! [`Rejection::CallbackError`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::event_loop::{EventLoop, Handle};

mod callback;
mod when;

#[cfg(test)]
mod test;

use self::callback::{Callback, CallbackFailure};
pub use self::callback::{CallbackError, CallbackOutcome};
pub use self::when::Joined;

/// Lifecycle state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// Not settled yet.
    Pending,
    /// Settled with a [`Rejection`].
    Rejected,
    /// Settled with a value.
    Resolved,
}

impl State {
    /// Human readable status, `"pending"`, `"rejected"` or `"resolved"`.
    pub fn status(&self) -> &'static str {
        match self {
            State::Pending => "pending",
            State::Rejected => "rejected",
            State::Resolved => "resolved",
        }
    }

    /// Tell if this is a terminal state.
    pub fn is_settled(&self) -> bool {
        *self != State::Pending
    }
}

/// Why a [`Deferred`] was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection<E> {
    /// Rejected by a call to [`Deferred::reject()`].
    Rejected(E),

    /// The deferred was still pending when its timeout ran out.
    TimedOut,

    /// A callback returned `Err` during delivery.
    CallbackError(CallbackError),
}

impl<E> Rejection<E> {
    /// The error type tag of rejections produced by the deferred itself.
    ///
    /// `"deferred_timed_out"` or `"deferred_callback_error"`. `None` for
    /// rejections passed to [`Deferred::reject()`].
    pub fn error_type(&self) -> Option<&'static str> {
        match self {
            Rejection::Rejected(_) => None,
            Rejection::TimedOut => Some("deferred_timed_out"),
            Rejection::CallbackError(_) => Some("deferred_callback_error"),
        }
    }

    /// The error passed to [`Deferred::reject()`], if that is what happened.
    pub fn rejected(&self) -> Option<&E> {
        match self {
            Rejection::Rejected(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the rejection, returning the error passed to `reject()`.
    pub fn into_rejected(self) -> Option<E> {
        match self {
            Rejection::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for Rejection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Rejected(e) => write!(f, "rejected: {}", e),
            Rejection::TimedOut => write!(f, "deferred timed out"),
            Rejection::CallbackError(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Rejection<E> {}

/// The settled value as seen by `always` callbacks.
pub type Settled<T, E> = Result<T, Rejection<E>>;

/// A promise-like value that settles exactly once.
///
/// Cloning gives another handle to the same deferred. Handles are not `Send`,
/// everything happens on the thread that turns the [`EventLoop`].
pub struct Deferred<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
    handle: Handle,
}

struct Inner<T, E> {
    id: Option<String>,
    state: State,
    value: Option<Rc<Settled<T, E>>>,
    on_done: Vec<Rc<Callback<T>>>,
    on_fail: Vec<Rc<Callback<Rejection<E>>>>,
    on_always: Vec<Rc<Callback<Settled<T, E>>>>,
    // One forced rejection per instance when a callback fails.
    retry_on_callback_error: bool,
}

impl<T, E> Inner<T, E> {
    fn settled_value(&self, wanted: Option<State>) -> Option<Rc<Settled<T, E>>> {
        let matches = match wanted {
            Some(state) => self.state == state,
            None => self.state.is_settled(),
        };
        if matches {
            self.value.clone()
        } else {
            None
        }
    }
}

/// Builder for a [`Deferred`] with initial callbacks, a timeout or an id.
pub struct Builder<T, E> {
    on_done: Option<Rc<Callback<T>>>,
    on_fail: Option<Rc<Callback<Rejection<E>>>>,
    timeout: Option<Duration>,
    id: Option<String>,
}

impl<T: 'static, E: 'static> Builder<T, E> {
    /// Initial success callback.
    pub fn on_done<F, R>(mut self, f: F) -> Self
    where
        F: FnMut(&T) -> R + 'static,
        R: CallbackOutcome,
    {
        self.on_done = Some(Rc::new(Callback::new(f)));
        self
    }

    /// Initial failure callback.
    pub fn on_fail<F, R>(mut self, f: F) -> Self
    where
        F: FnMut(&Rejection<E>) -> R + 'static,
        R: CallbackOutcome,
    {
        self.on_fail = Some(Rc::new(Callback::new(f)));
        self
    }

    /// Reject with [`Rejection::TimedOut`] if still pending after `timeout`.
    ///
    /// A zero timeout means no timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Opaque correlation id, only used for logging and [`Deferred::id()`].
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Creates the deferred, scheduling its timeout on `event_loop`.
    pub fn build(self, event_loop: &EventLoop) -> Deferred<T, E> {
        let deferred = Deferred {
            inner: Rc::new(RefCell::new(Inner {
                id: self.id,
                state: State::Pending,
                value: None,
                on_done: self.on_done.into_iter().collect(),
                on_fail: self.on_fail.into_iter().collect(),
                on_always: Vec::new(),
                retry_on_callback_error: true,
            })),
            handle: event_loop.handle(),
        };

        if let Some(timeout) = self.timeout.filter(|t| !t.is_zero()) {
            let this = deferred.clone();
            event_loop.set_timeout(timeout, move || {
                if this.is_pending() {
                    debug!("{:?} timed out after {:?}", this, timeout);
                    this.settle(State::Rejected, Err(Rejection::TimedOut));
                }
            });
        }

        deferred
    }
}

impl<T: 'static, E: 'static> Deferred<T, E> {
    /// Creates a pending deferred without timeout.
    pub fn new(event_loop: &EventLoop) -> Self {
        Self::builder().build(event_loop)
    }

    /// Builder for a deferred with initial callbacks, timeout or id.
    pub fn builder() -> Builder<T, E> {
        Builder {
            on_done: None,
            on_fail: None,
            timeout: None,
            id: None,
        }
    }

    /// Resolve with `value`.
    ///
    /// Does nothing if already settled. Callbacks registered so far run before
    /// this returns.
    pub fn resolve(&self, value: T) -> &Self {
        self.settle(State::Resolved, Ok(value))
    }

    /// Reject with `error`.
    ///
    /// Does nothing if already settled. Callbacks registered so far run before
    /// this returns.
    pub fn reject(&self, error: E) -> &Self {
        self.settle(State::Rejected, Err(Rejection::Rejected(error)))
    }

    fn settle(&self, state: State, value: Settled<T, E>) -> &Self {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_settled() {
                trace!(
                    "Ignore {} of already {} deferred",
                    state.status(),
                    inner.state.status()
                );
                return self;
            }
            inner.state = state;
        }

        debug!("{:?}", self);

        self.process(value);
        self
    }

    /// Stores the value and runs one delivery pass.
    fn process(&self, value: Settled<T, E>) {
        let value = Rc::new(value);

        let pass = {
            let mut inner = self.inner.borrow_mut();
            inner.value = Some(value.clone());
            Pass {
                done: inner.on_done.clone(),
                fail: inner.on_fail.clone(),
                always: inner.on_always.clone(),
            }
        };

        if let Err(failure) = pass.run(&value) {
            self.recover(failure);
        }
    }

    fn recover(&self, failure: CallbackFailure) {
        let retry = {
            let mut inner = self.inner.borrow_mut();
            warn!(
                "Deferred callback failed for state {}: {}",
                inner.state.status(),
                failure
            );
            let retry = inner.retry_on_callback_error;
            if retry {
                inner.retry_on_callback_error = false;
                inner.state = State::Rejected;
            }
            retry
        };

        if retry {
            self.process(Err(Rejection::CallbackError(failure.into_error())));
        } else {
            debug!("Callback error swallowed, deferred already rejected once for it");
        }
    }

    fn deliver_late<F>(&self, task: F)
    where
        F: FnOnce() -> Result<(), CallbackFailure> + 'static,
    {
        let this = self.clone();
        self.handle.next_tick(Box::new(move || {
            if let Err(failure) = task() {
                this.recover(failure);
            }
        }));
    }

    /// Register a callback for when the deferred is resolved.
    ///
    /// If already resolved, the callback runs on the next turn of the event
    /// loop with the settled value.
    pub fn done<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&T) -> R + 'static,
        R: CallbackOutcome,
    {
        let callback = Rc::new(Callback::new(f));

        let settled = {
            let mut inner = self.inner.borrow_mut();
            inner.on_done.push(callback.clone());
            inner.settled_value(Some(State::Resolved))
        };

        if let Some(value) = settled {
            self.deliver_late(move || match &*value {
                Ok(v) => callback.invoke(v),
                Err(_) => Ok(()),
            });
        }

        self
    }

    /// Register a callback for when the deferred is rejected.
    ///
    /// If already rejected, the callback runs on the next turn of the event
    /// loop with the rejection.
    pub fn fail<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&Rejection<E>) -> R + 'static,
        R: CallbackOutcome,
    {
        let callback = Rc::new(Callback::new(f));

        let settled = {
            let mut inner = self.inner.borrow_mut();
            inner.on_fail.push(callback.clone());
            inner.settled_value(Some(State::Rejected))
        };

        if let Some(value) = settled {
            self.deliver_late(move || match &*value {
                Err(r) => callback.invoke(r),
                Ok(_) => Ok(()),
            });
        }

        self
    }

    /// Alias of [`fail()`](Self::fail).
    pub fn catch<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&Rejection<E>) -> R + 'static,
        R: CallbackOutcome,
    {
        self.fail(f)
    }

    /// Register a callback for when the deferred settles either way.
    ///
    /// If already settled, the callback runs on the next turn of the event
    /// loop.
    pub fn always<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&Settled<T, E>) -> R + 'static,
        R: CallbackOutcome,
    {
        let callback = Rc::new(Callback::new(f));

        let settled = {
            let mut inner = self.inner.borrow_mut();
            inner.on_always.push(callback.clone());
            inner.settled_value(None)
        };

        if let Some(value) = settled {
            self.deliver_late(move || callback.invoke(&value));
        }

        self
    }

    /// Shorthand for `done(on_done)` followed by `fail(on_fail)`.
    ///
    /// Returns the same deferred, not a new chained one.
    pub fn then<F, R, G, S>(&self, on_done: F, on_fail: G) -> &Self
    where
        F: FnMut(&T) -> R + 'static,
        R: CallbackOutcome,
        G: FnMut(&Rejection<E>) -> S + 'static,
        S: CallbackOutcome,
    {
        self.done(on_done);
        self.fail(on_fail)
    }

    /// Another handle to this deferred.
    pub fn promise(&self) -> Self {
        self.clone()
    }
}

impl<T, E> Deferred<T, E> {
    /// Current state.
    pub fn state(&self) -> State {
        self.inner.borrow().state
    }

    /// Current state as `"pending"`, `"rejected"` or `"resolved"`.
    pub fn status(&self) -> &'static str {
        self.state().status()
    }

    /// Tell if resolved.
    pub fn is_resolved(&self) -> bool {
        self.state() == State::Resolved
    }

    /// Tell if rejected.
    pub fn is_rejected(&self) -> bool {
        self.state() == State::Rejected
    }

    /// Tell if not settled yet.
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// The correlation id given to the builder.
    pub fn id(&self) -> Option<String> {
        self.inner.borrow().id.clone()
    }

    /// The settled value, `None` while pending.
    pub fn value(&self) -> Option<Rc<Settled<T, E>>> {
        self.inner.borrow().value.clone()
    }
}

/// Callback lists as they were when a delivery pass started.
struct Pass<T, E> {
    done: Vec<Rc<Callback<T>>>,
    fail: Vec<Rc<Callback<Rejection<E>>>>,
    always: Vec<Rc<Callback<Settled<T, E>>>>,
}

impl<T, E> Pass<T, E> {
    fn run(&self, value: &Settled<T, E>) -> Result<(), CallbackFailure> {
        match value {
            Ok(v) => invoke_all(&self.done, v)?,
            Err(r) => invoke_all(&self.fail, r)?,
        }
        invoke_all(&self.always, value)
    }
}

fn invoke_all<A>(callbacks: &[Rc<Callback<A>>], arg: &A) -> Result<(), CallbackFailure> {
    for callback in callbacks {
        callback.invoke(arg)?;
    }
    Ok(())
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Deferred {
            inner: self.inner.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(inner) = self.inner.try_borrow() else {
            return write!(f, "Deferred<busy>");
        };
        match &inner.id {
            Some(id) => write!(f, "Deferred<{}>({})", inner.state.status(), id),
            None => write!(f, "Deferred<{}>", inner.state.status()),
        }
    }
}
