use std::cell::RefCell;
use std::rc::Rc;

use crate::deferred::Settled;
use crate::{Deferred, EventLoop, Rejection};

mod timeout;

pub(crate) type TestDeferred = Deferred<u32, &'static str>;

pub(crate) fn deferred(ev: &EventLoop) -> TestDeferred {
    Deferred::new(ev)
}

/// Shared log that callbacks append to.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    log: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// Done callback recording `label:{value}`.
    pub fn record(&self, label: &'static str) -> impl FnMut(&u32) + 'static {
        let log = self.log.clone();
        move |v: &u32| log.borrow_mut().push(format!("{}:{}", label, v))
    }

    /// Always callback recording `label:{settled:?}`.
    pub fn record_always(
        &self,
        label: &'static str,
    ) -> impl FnMut(&Settled<u32, &'static str>) + 'static {
        let log = self.log.clone();
        move |v: &Settled<u32, &'static str>| log.borrow_mut().push(format!("{}:{:?}", label, v))
    }

    /// Fail callback recording `label:{kind}` with [`kind()`].
    pub fn record_kind(&self, label: &'static str) -> impl FnMut(&Rejection<&'static str>) + 'static {
        let log = self.log.clone();
        move |r: &Rejection<&'static str>| log.borrow_mut().push(format!("{}:{}", label, kind(r)))
    }
}

/// Short description of a rejection that doesn't depend on closure type names.
pub(crate) fn kind(r: &Rejection<&'static str>) -> String {
    match r {
        Rejection::Rejected(e) => format!("rejected {}", e),
        other => other.error_type().unwrap_or("unknown").to_string(),
    }
}

/// The rejection of a settled deferred.
pub(crate) fn rejection_of(d: &TestDeferred) -> Rejection<&'static str> {
    match &*d.value().expect("deferred to be settled") {
        Err(r) => r.clone(),
        Ok(v) => panic!("Expected rejection, got {}", v),
    }
}
