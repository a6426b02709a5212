use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::event_loop::EventLoop;

use super::Deferred;

/// The deferred returned by [`Deferred::when()`].
///
/// Both the resolved value and the rejection carry every joined deferred, in
/// the order they were given.
pub type Joined<T, E> = Deferred<Vec<Deferred<T, E>>, Vec<Deferred<T, E>>>;

type JoinCallback<T, E> = Box<dyn FnOnce(&[Deferred<T, E>])>;

impl<T: 'static, E: 'static> Deferred<T, E> {
    /// Join many deferreds into one.
    ///
    /// The returned deferred resolves once every deferred has resolved, in
    /// whatever order that happens, and rejects as soon as any of them is
    /// rejected. Either way the value is all the joined deferreds.
    ///
    /// Joining nothing gives a deferred that is already resolved with an
    /// empty list.
    pub fn when<I>(event_loop: &EventLoop, deferreds: I) -> Joined<T, E>
    where
        I: IntoIterator<Item = Deferred<T, E>>,
    {
        join(event_loop, deferreds.into_iter().collect(), None)
    }

    /// Like [`when()`](Self::when), calling `callback` with the joined
    /// deferreds right after the result settles.
    pub fn when_with<I, F>(event_loop: &EventLoop, deferreds: I, callback: F) -> Joined<T, E>
    where
        I: IntoIterator<Item = Deferred<T, E>>,
        F: FnOnce(&[Deferred<T, E>]) + 'static,
    {
        join(
            event_loop,
            deferreds.into_iter().collect(),
            Some(Box::new(callback)),
        )
    }
}

fn join<T: 'static, E: 'static>(
    event_loop: &EventLoop,
    members: Vec<Deferred<T, E>>,
    callback: Option<JoinCallback<T, E>>,
) -> Joined<T, E> {
    let joined = Deferred::new(event_loop);

    if members.is_empty() {
        debug!("Join of nothing, resolving at once");
        joined.resolve(Vec::new());
        return joined;
    }

    let join = Rc::new(Join {
        expected: members.len(),
        completed: Cell::new(0),
        state: RefCell::new(Some((joined.clone(), members.clone()))),
        callback: RefCell::new(callback),
    });

    for member in &members {
        let on_done = join.clone();
        let on_fail = join.clone();
        member.then(
            move |_| on_done.member_resolved(),
            move |_| on_fail.member_rejected(),
        );
    }

    joined
}

/// Shared state of one join.
///
/// `state` holds the joined deferred and its members until the join
/// terminates, then is taken. Taking it makes later settlements no-ops and
/// drops the references back to the joined deferred, whose value holds the
/// members, whose callbacks hold this `Join`.
struct Join<T, E> {
    expected: usize,
    completed: Cell<usize>,
    state: RefCell<Option<(Joined<T, E>, Vec<Deferred<T, E>>)>>,
    callback: RefCell<Option<JoinCallback<T, E>>>,
}

impl<T: 'static, E: 'static> Join<T, E> {
    fn member_resolved(&self) {
        if self.state.borrow().is_none() {
            trace!("Join already settled, ignoring member resolve");
            return;
        }

        let completed = self.completed.get() + 1;
        self.completed.set(completed);

        if completed < self.expected {
            return;
        }

        let state = self.state.borrow_mut().take();
        let Some((joined, members)) = state else {
            return;
        };

        debug!("Join resolved, all {} members done", completed);
        joined.resolve(members.clone());
        self.notify(&members);
    }

    fn member_rejected(&self) {
        let state = self.state.borrow_mut().take();
        let Some((joined, members)) = state else {
            trace!("Join already settled, ignoring member reject");
            return;
        };

        debug!(
            "Join rejected after {} of {} members",
            self.completed.get(),
            self.expected
        );
        joined.reject(members.clone());
        self.notify(&members);
    }

    fn notify(&self, members: &[Deferred<T, E>]) {
        let callback = self.callback.borrow_mut().take();
        if let Some(callback) = callback {
            callback(members);
        }
    }
}
