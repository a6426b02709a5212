//! Single-settlement deferreds and a sans-IO request wrapper built on them.
//!
//! The crate has two layers:
//!
//! * [`Deferred`] – a promise-like holder that settles exactly once, either
//!   resolved or rejected, and delivers its value to registered callbacks.
//!   [`Deferred::when`] joins many deferreds into one.
//! * [`transport`] – an HTTP request wrapper that drives a `Deferred` from
//!   transport events (response bytes, timeouts, aborts).
//!
//! Nothing in here owns a thread, a socket or a clock. Asynchronous delivery
//! goes through an [`EventLoop`] that the caller turns, and the transport hands
//! out requests for the caller to perform. This is what is commonly called
//! "Sans-IO".
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use deferred_xhr::{Deferred, EventLoop};
//!
//! let event_loop = EventLoop::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let a: Deferred<u32, String> = Deferred::new(&event_loop);
//! let b: Deferred<u32, String> = Deferred::builder()
//!     .timeout(Duration::from_millis(100))
//!     .build(&event_loop);
//!
//! let log = seen.clone();
//! Deferred::when(&event_loop, [a.clone(), b.clone()]).done(move |all| {
//!     log.borrow_mut().push(all.len());
//! });
//!
//! // Live settlement delivers synchronously.
//! a.resolve(1);
//! b.resolve(2);
//! assert_eq!(*seen.borrow(), vec![2]);
//!
//! // Subscribing after settlement delivers on the next turn.
//! let log = seen.clone();
//! a.done(move |v| log.borrow_mut().push(*v as usize));
//! assert_eq!(seen.borrow().len(), 1);
//!
//! event_loop.run_until_idle();
//! assert_eq!(*seen.borrow(), vec![2, 1]);
//! ```
//!
//! # The http crate
//!
//! Requests and responses of the transport layer are expressed with the
//! [http crate](https://crates.io/crates/http), re-exported as [`http`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

mod error;
mod event_loop;

#[cfg(feature = "transport")]
mod parser;
#[cfg(feature = "transport")]
mod util;

pub mod deferred;

#[cfg(feature = "transport")]
pub mod transport;

pub use deferred::{Deferred, Rejection, State};
pub use error::Error;
pub use event_loop::EventLoop;

pub use http;
