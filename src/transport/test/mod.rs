use std::rc::Rc;

use crate::deferred::Settled;
use crate::EventLoop;

use super::{Attempt, Completed, RequestParams, RequestTransport, TransportFailure};


/// A transport and the loop it lives on.
pub(crate) struct Scenario {
    pub event_loop: EventLoop,
    pub transport: RequestTransport,
}

impl Scenario {
    pub fn new(params: RequestParams) -> Self {
        let event_loop = EventLoop::new();
        let transport = RequestTransport::new(&event_loop, params).unwrap();
        Scenario {
            event_loop,
            transport,
        }
    }

    pub fn attempt(&mut self) -> Attempt {
        self.transport.poll_attempt().expect("an attempt to be due")
    }

    /// Polls an attempt and answers it with `response`.
    pub fn respond(&mut self, response: &[u8]) {
        self.attempt();
        self.transport.handle_response(response).unwrap();
    }

    pub fn outcome(&self) -> Option<Rc<Settled<Completed, TransportFailure>>> {
        self.transport.promise().value()
    }

    pub fn completed(&self) -> Completed {
        match &*self.outcome().expect("transport to be settled") {
            Ok(c) => c.clone(),
            Err(r) => panic!("Expected success, got {}", r),
        }
    }

    pub fn failure(&self) -> TransportFailure {
        match &*self.outcome().expect("transport to be settled") {
            Ok(_) => panic!("Expected failure"),
            Err(r) => r.rejected().expect("a transport failure").clone(),
        }
    }
}

/// Raw response with a content-length matching `body`.
pub(crate) fn raw_response(status: &str, content_type: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
    .into_bytes()
}

#[test]
fn ensure_reasonable_stack_sizes() {
    macro_rules! ensure {
        ($type:ty, $size:tt) => {
            let sz = std::mem::size_of::<$type>();
            assert!(
                sz <= $size,
                "Stack size of {} is too big {} > {}",
                stringify!($type),
                sz,
                $size
            );
        };
    }

    ensure!(http::Request<Vec<u8>>, 350);
    ensure!(RequestTransport, 600);
    ensure!(Completed, 300);
}
