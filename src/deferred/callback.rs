use std::any::type_name;
use std::cell::RefCell;
use std::fmt;

/// What a callback may return.
///
/// Callbacks either return `()` or a `Result<(), E>`. An `Err` is how a
/// callback fails: the deferred logs it and turns it into a
/// [`Rejection::CallbackError`](super::Rejection::CallbackError).
pub trait CallbackOutcome {
    /// Normalizes the return value of a callback.
    fn into_outcome(self) -> Result<(), String>;
}

impl CallbackOutcome for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display> CallbackOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

/// Payload of a `deferred_callback_error` rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackError {
    /// The error the callback returned.
    pub error: String,
    /// Which callback failed.
    pub message: String,
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.error)
    }
}

type BoxedFn<A> = Box<dyn FnMut(&A) -> Result<(), String>>;

pub(crate) struct Callback<A> {
    // Closures have no source text, the type name is the closest we get.
    name: &'static str,
    f: RefCell<BoxedFn<A>>,
}

impl<A> Callback<A> {
    pub fn new<F, R>(mut f: F) -> Self
    where
        F: FnMut(&A) -> R + 'static,
        R: CallbackOutcome,
    {
        Callback {
            name: type_name::<F>(),
            f: RefCell::new(Box::new(move |arg: &A| f(arg).into_outcome())),
        }
    }

    pub fn invoke(&self, arg: &A) -> Result<(), CallbackFailure> {
        let Ok(mut f) = self.f.try_borrow_mut() else {
            warn!("Callback {} is already running, skipping reentrant call", self.name);
            return Ok(());
        };

        f(arg).map_err(|error| CallbackFailure {
            error,
            name: self.name,
        })
    }
}

/// A callback returned `Err` during delivery.
#[derive(Debug)]
pub(crate) struct CallbackFailure {
    pub error: String,
    pub name: &'static str,
}

impl CallbackFailure {
    pub fn into_error(self) -> CallbackError {
        CallbackError {
            message: format!("An error occurred in callback {}", self.name),
            error: self.error,
        }
    }
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.name)
    }
}
