use std::time::{Duration, Instant};

use crate::{Deferred, EventLoop, Rejection};

use super::{rejection_of, Recorder, TestDeferred};

fn with_timeout(ev: &EventLoop, ms: u64) -> TestDeferred {
    Deferred::builder()
        .timeout(Duration::from_millis(ms))
        .build(ev)
}

#[test]
fn pending_deferred_times_out() {
    let start = Instant::now();
    let ev = EventLoop::starting_at(start);
    let d = with_timeout(&ev, 100);
    let rec = Recorder::new();

    d.fail(rec.record_kind("fail"));
    assert_eq!(ev.poll_timeout(), Some(start + Duration::from_millis(100)));

    ev.advance(Duration::from_millis(99));
    assert!(d.is_pending());

    ev.advance(Duration::from_millis(1));
    assert!(d.is_rejected());
    assert_eq!(rejection_of(&d), Rejection::TimedOut);
    assert_eq!(rejection_of(&d).error_type(), Some("deferred_timed_out"));
    assert_eq!(rec.entries(), vec!["fail:deferred_timed_out"]);
}

#[test]
fn settled_deferred_ignores_timeout() {
    let ev = EventLoop::new();
    let d = with_timeout(&ev, 100);
    let rec = Recorder::new();

    d.fail(rec.record_kind("fail"));
    d.resolve(1);

    ev.advance(Duration::from_millis(500));

    assert!(d.is_resolved());
    assert!(rec.is_empty());
    assert!(ev.is_idle());
}

#[test]
fn zero_timeout_schedules_nothing() {
    let ev = EventLoop::new();
    let d = with_timeout(&ev, 0);

    assert!(ev.is_idle());
    ev.advance(Duration::from_secs(60));
    assert!(d.is_pending());
}

#[test]
fn timeout_fires_without_handles() {
    let ev = EventLoop::new();
    let rec = Recorder::new();

    let d = with_timeout(&ev, 10);
    d.always(rec.record_always("always"));
    drop(d);

    ev.advance(Duration::from_millis(10));
    assert_eq!(rec.entries(), vec!["always:Err(TimedOut)"]);
}

#[test]
fn late_subscriber_after_timeout() {
    let ev = EventLoop::new();
    let d = with_timeout(&ev, 10);
    let rec = Recorder::new();

    ev.advance(Duration::from_millis(10));
    d.fail(rec.record_kind("late"));
    assert!(rec.is_empty());

    ev.run_until_idle();
    assert_eq!(rec.entries(), vec!["late:deferred_timed_out"]);
}
