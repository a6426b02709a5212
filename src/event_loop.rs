//! Single-threaded task queue and timers.
//!
//! The loop owns no thread and reads no clock on its own. The caller turns it
//! by calling [`EventLoop::run_until_idle()`] and tells it what time it is via
//! [`EventLoop::handle_timeout()`]. [`EventLoop::poll_timeout()`] tells the
//! caller when the next timer is due.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce()>;

/// Cooperative event loop with an immediate queue and a timer queue.
///
/// Cloning gives another handle to the same loop.
#[derive(Clone)]
pub struct EventLoop {
    queue: Rc<RefCell<Queue>>,
}

struct Queue {
    now: Instant,
    ready: VecDeque<Task>,
    // (deadline, sequence) keeps timers with equal deadlines in scheduling order.
    timers: BTreeMap<(Instant, u64), Task>,
    seq: u64,
}

/// Weak handle used by deferreds, so pending tasks don't keep a dropped loop alive.
#[derive(Clone)]
pub(crate) struct Handle(Weak<RefCell<Queue>>);

impl EventLoop {
    /// Creates a loop whose clock starts at `Instant::now()`.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a loop whose clock starts at `now`.
    pub fn starting_at(now: Instant) -> Self {
        EventLoop {
            queue: Rc::new(RefCell::new(Queue {
                now,
                ready: VecDeque::new(),
                timers: BTreeMap::new(),
                seq: 0,
            })),
        }
    }

    /// Current time of the loop clock.
    pub fn now(&self) -> Instant {
        self.queue.borrow().now
    }

    /// Queue `task` for the soonest next turn.
    pub fn next_tick<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.queue.borrow_mut().ready.push_back(Box::new(task));
    }

    /// Run `task` once the clock has moved `delay` past the current time.
    pub fn set_timeout<F>(&self, delay: Duration, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.queue.borrow_mut().push_timer(delay, Box::new(task));
    }

    /// The deadline of the next timer, if there is one.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.queue
            .borrow()
            .timers
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// Tell if there is nothing queued and no timers left.
    pub fn is_idle(&self) -> bool {
        let q = self.queue.borrow();
        q.ready.is_empty() && q.timers.is_empty()
    }

    /// Run queued tasks until the immediate queue is empty.
    ///
    /// Tasks queued by running tasks are also run. Timers are not touched.
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;

        loop {
            // The borrow must end before the task runs, tasks queue more tasks.
            let task = self.queue.borrow_mut().ready.pop_front();
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }

        if ran > 0 {
            trace!("Ran {} queued tasks", ran);
        }

        ran
    }

    /// Move the clock to `now` and fire every timer that is due.
    ///
    /// The immediate queue is drained first and again after each timer, so
    /// anything a timer schedules for the next tick runs before the next timer.
    /// The clock never moves backwards. Returns the number of tasks run.
    pub fn handle_timeout(&self, now: Instant) -> usize {
        let mut ran = self.run_until_idle();

        loop {
            let due = {
                let mut q = self.queue.borrow_mut();
                match q.timers.keys().next().copied() {
                    Some(key) if key.0 <= now => {
                        if key.0 > q.now {
                            q.now = key.0;
                        }
                        q.timers.remove(&key)
                    }
                    _ => None,
                }
            };
            let Some(task) = due else {
                break;
            };
            task();
            ran += 1;
            ran += self.run_until_idle();
        }

        let mut q = self.queue.borrow_mut();
        if now > q.now {
            q.now = now;
        }

        ran
    }

    /// Shorthand for `handle_timeout(now() + by)`.
    pub fn advance(&self, by: Duration) -> usize {
        let now = self.now() + by;
        self.handle_timeout(now)
    }

    pub(crate) fn handle(&self) -> Handle {
        Handle(Rc::downgrade(&self.queue))
    }
}

impl Queue {
    fn push_timer(&mut self, delay: Duration, task: Task) {
        let deadline = self.now + delay;
        let seq = self.seq;
        self.seq += 1;
        self.timers.insert((deadline, seq), task);
    }
}

impl Handle {
    pub(crate) fn next_tick(&self, task: Task) {
        match self.0.upgrade() {
            Some(queue) => queue.borrow_mut().ready.push_back(task),
            None => warn!("Event loop is gone, dropping task"),
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.queue.try_borrow() {
            Ok(q) => f
                .debug_struct("EventLoop")
                .field("ready", &q.ready.len())
                .field("timers", &q.timers.len())
                .finish(),
            Err(_) => write!(f, "EventLoop {{ busy }}"),
        }
    }
}
