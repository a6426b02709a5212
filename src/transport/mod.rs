//! Sans-IO HTTP request wrapper driving a [`Deferred`].
//!
//! A [`RequestTransport`] assembles a request from [`RequestParams`] and hands
//! it to the caller as an [`Attempt`]. The caller performs the attempt however
//! it likes and reports back what happened: the response bytes, a timeout, an
//! abort or a network error. The outcome settles the transport's deferred.
//!
//! ```text
//!              poll_attempt()
//!   ┌───────┐ ───────────────▶ ┌──────────┐  handle_response()   ┌──────────┐
//!   │ Ready │                  │ InFlight │ ───────────────────▶ │ Finished │
//!   └───────┘ ◀─────────────── └──────────┘  abort/error/last    └──────────┘
//!              handle_timeout()                timeout
//!              (retry left)
//! ```
//!
//! Timed out attempts are retried with a growing timeout. With `retry`
//! starting at 0, a timeout while `retry <= max_retry` bumps `retry` by one
//! and the next attempt gets the previous timeout plus `retry` seconds.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use deferred_xhr::transport::{RequestParams, RequestTransport};
//! use deferred_xhr::EventLoop;
//!
//! let event_loop = EventLoop::new();
//!
//! let params = RequestParams::get("https://api.test/users").field("page", "2");
//! let mut transport = RequestTransport::new(&event_loop, params).unwrap();
//!
//! let seen = Rc::new(RefCell::new(None));
//! let s = seen.clone();
//! transport.done(move |res| *s.borrow_mut() = res.body.as_json().cloned());
//!
//! // The caller performs the attempt.
//! let attempt = transport.poll_attempt().unwrap();
//! assert_eq!(attempt.request.uri(), "https://api.test/users?page=2");
//!
//! // And reports the response.
//! let response = b"HTTP/1.1 200 OK\r\n\
//!     Content-Type: application/json\r\n\
//!     Content-Length: 11\r\n\
//!     \r\n\
//!     {\"id\": 42}\n";
//! transport.handle_response(response).unwrap();
//!
//! assert!(transport.is_finished());
//! assert_eq!(seen.borrow().as_ref().unwrap()["id"], 42);
//! ```

use std::fmt;
use std::time::Duration;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri};
use url::Url;

use crate::deferred::{CallbackOutcome, Settled};
use crate::parser::try_parse_response;
use crate::util::log_data;
use crate::{Deferred, Error, EventLoop, Rejection};

mod failure;
mod multipart;
mod params;
mod query;
mod response;

#[cfg(test)]
mod test;

pub use self::failure::{FailureKind, TransportFailure};
pub use self::multipart::{FilePart, MultipartForm};
pub use self::params::{DataType, RequestData, RequestParams};
pub use self::params::{DEFAULT_CONTENT_TYPE, DEFAULT_RETRY, DEFAULT_TIMEOUT};
pub use self::response::{Completed, ResponseBody};

use self::response::body_slice;

// ~4k on the stack for the header array
const MAX_RESPONSE_HEADERS: usize = 128;

/// Added to the timeout for each retry.
const RETRY_BACKOFF_STEP: Duration = Duration::from_secs(1);

/// The deferred a transport settles.
pub type Outcome = Deferred<Completed, TransportFailure>;

/// One request for the caller to perform.
#[derive(Debug)]
pub struct Attempt {
    /// The request to send.
    pub request: Request<Vec<u8>>,
    /// Report [`RequestTransport::handle_timeout()`] if no response arrived
    /// within this time.
    pub timeout: Duration,
    /// 1 for the first attempt, 2 for the first retry and so on.
    pub number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ready,
    InFlight,
    Finished,
}

/// Retry bookkeeping carried from attempt to attempt.
#[derive(Debug, Clone, Copy)]
struct Backoff {
    retry: u32,
    max_retry: u32,
    timeout: Duration,
}

impl Backoff {
    /// Moves to the next retry, `false` when no retry is left.
    fn next(&mut self) -> bool {
        if self.retry > self.max_retry {
            return false;
        }
        self.retry += 1;
        let step = RETRY_BACKOFF_STEP.saturating_mul(self.retry);
        self.timeout = self.timeout.saturating_add(step);
        true
    }
}

/// An HTTP request whose outcome is a [`Deferred`].
pub struct RequestTransport {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Vec<u8>,
    content_type: String,
    data_type: DataType,
    request_id: String,
    phase: Phase,
    backoff: Backoff,
    attempts: u32,
    status: Option<StatusCode>,
    deferred: Outcome,
}

impl RequestTransport {
    /// Assemble the request described by `params`.
    ///
    /// The `on_error`, `on_success` and `on_complete` hooks of the params are
    /// registered on the deferred in that order.
    pub fn new(event_loop: &EventLoop, mut params: RequestParams) -> Result<Self, Error> {
        let method = params.method.clone();
        let mut url = params.url.clone();
        let mut content_type = params
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let mut body = Vec::new();

        if params.is_multipart() {
            let Some(RequestData::Multipart(form)) = &params.data else {
                return Err(Error::MultipartWithoutForm);
            };
            warn!("Multipart support is incomplete, it may or may not work");
            let boundary = multipart::boundary();
            content_type = format!("{}; boundary={}", content_type, boundary);
            body = form.encode(&boundary);
        } else {
            let send_data = match &params.data {
                None => String::new(),
                Some(RequestData::Form(pairs)) => {
                    let skip_in = (method == Method::GET).then_some(url.as_str());
                    query::encode_form(pairs, skip_in)
                }
                Some(RequestData::Raw(raw)) => raw.clone(),
                Some(RequestData::Multipart(form)) => {
                    debug!("Multipart form without multipart content type, sending fields");
                    query::encode_form(form.fields(), None)
                }
            };

            if method == Method::GET {
                url = query::append_query(&url, &send_data);
            } else {
                body = send_data.into_bytes();
            }
        }

        let (uri, credentials) = split_userinfo(&url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &params.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::BadHeader(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::BadHeader(format!("{}: {}", name, e)))?;
            headers.append(name, value);
        }

        let caller_headers = !headers.is_empty();

        if !headers.contains_key(header::CONTENT_TYPE) {
            let value = HeaderValue::from_str(&content_type)
                .map_err(|e| Error::BadHeader(format!("content-type: {}", e)))?;
            headers.insert(header::CONTENT_TYPE, value);
        }

        if caller_headers && !headers.contains_key("x-requested-with") {
            headers.insert(
                HeaderName::from_static("x-requested-with"),
                HeaderValue::from_static("XMLHttpRequest"),
            );
        }

        if let Some(credentials) = credentials {
            if !headers.contains_key(header::AUTHORIZATION) {
                let value = format!("Basic {}", BASE64_STANDARD.encode(credentials));
                let value = HeaderValue::from_str(&value)
                    .map_err(|e| Error::BadHeader(format!("authorization: {}", e)))?;
                headers.insert(header::AUTHORIZATION, value);
            }
        }

        let request_id = params
            .request_type
            .clone()
            .unwrap_or_else(|| uri.to_string());

        let deferred: Outcome = Deferred::builder().id(request_id.clone()).build(event_loop);

        if let Some(f) = params.on_error.take() {
            deferred.fail(f);
        }
        if let Some(f) = params.on_success.take() {
            deferred.done(f);
        }
        if let Some(f) = params.on_complete.take() {
            deferred.always(f);
        }

        let transport = RequestTransport {
            method,
            uri,
            headers,
            body,
            content_type,
            data_type: params.effective_data_type(),
            request_id,
            phase: Phase::Ready,
            backoff: Backoff {
                retry: 0,
                max_retry: params.max_retry,
                timeout: params.timeout,
            },
            attempts: 0,
            status: None,
            deferred,
        };

        debug!("{:?}", transport);

        Ok(transport)
    }

    /// The next attempt to perform, if one is due.
    ///
    /// There is one after creation and one after each retried timeout.
    pub fn poll_attempt(&mut self) -> Option<Attempt> {
        if self.phase != Phase::Ready {
            return None;
        }

        let mut request = Request::new(self.body.clone());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();

        self.attempts += 1;
        self.phase = Phase::InFlight;

        debug!(
            "Attempt {} {} {} (timeout {:?})",
            self.attempts, self.method, self.uri, self.backoff.timeout
        );

        Some(Attempt {
            request,
            timeout: self.backoff.timeout,
            number: self.attempts,
        })
    }

    /// Feed the complete response of the attempt in flight.
    ///
    /// `200 OK` resolves the deferred, any other status rejects it. A response
    /// that fails to parse leaves the attempt in flight.
    pub fn handle_response(&mut self, input: &[u8]) -> Result<(), Error> {
        if self.phase != Phase::InFlight {
            return Err(Error::NoAttemptInFlight);
        }

        let (input_used, response) = match try_parse_response::<MAX_RESPONSE_HEADERS>(input)? {
            Some(v) => v,
            None => return Err(Error::IncompleteResponse),
        };

        log_data(&input[..input_used]);

        let body = body_slice(&response, &input[input_used..])?;
        let status = response.status();

        self.status = Some(status);
        self.phase = Phase::Finished;

        if status != StatusCode::OK {
            let kind = if status == StatusCode::NOT_FOUND {
                FailureKind::NotFound
            } else {
                FailureKind::Status
            };
            self.finish_failed(kind, Some(status));
            return Ok(());
        }

        let completed = Completed {
            body: ResponseBody::decode(self.data_type, body),
            status,
            version: response.version(),
            headers: response.headers().clone(),
            request_id: self.request_id.clone(),
        };

        debug!("{} completed after {} attempt(s)", self.request_id, self.attempts);
        self.deferred.resolve(completed);

        Ok(())
    }

    /// Report that the attempt in flight timed out.
    ///
    /// Schedules a retry with a longer timeout, or rejects the deferred with
    /// [`FailureKind::Timeout`] when no retry is left.
    pub fn handle_timeout(&mut self) {
        if self.phase != Phase::InFlight {
            trace!("Ignore timeout, no attempt in flight");
            return;
        }

        if self.backoff.next() {
            debug!(
                "{} timed out, retry {} of {} with timeout {:?}",
                self.request_id, self.backoff.retry, self.backoff.max_retry, self.backoff.timeout
            );
            self.phase = Phase::Ready;
        } else {
            self.finish_failed(FailureKind::Timeout, None);
        }
    }

    /// Report that the request was aborted.
    pub fn handle_abort(&mut self) {
        self.finish_failed(FailureKind::Abort, None);
    }

    /// Report a network error, with the status if one was received.
    pub fn handle_error(&mut self, status: Option<StatusCode>) {
        if status.is_some() && self.deferred.is_pending() {
            self.status = status;
        }
        self.finish_failed(FailureKind::Network, status);
    }

    fn finish_failed(&mut self, kind: FailureKind, status: Option<StatusCode>) {
        if !self.deferred.is_pending() {
            trace!("Ignore {:?}, already finished", kind);
            return;
        }
        self.phase = Phase::Finished;

        let failure = TransportFailure {
            kind,
            status,
            request_id: self.request_id.clone(),
            attempts: self.attempts,
        };

        debug!("{} failed: {}", self.request_id, failure);
        self.deferred.reject(failure);
    }

    /// Register a success callback.
    pub fn done<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&Completed) -> R + 'static,
        R: CallbackOutcome,
    {
        self.deferred.done(f);
        self
    }

    /// Alias of [`done()`](Self::done).
    pub fn success<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&Completed) -> R + 'static,
        R: CallbackOutcome,
    {
        self.done(f)
    }

    /// Register a failure callback.
    pub fn fail<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&Rejection<TransportFailure>) -> R + 'static,
        R: CallbackOutcome,
    {
        self.deferred.fail(f);
        self
    }

    /// Register a callback for either outcome.
    pub fn always<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&Settled<Completed, TransportFailure>) -> R + 'static,
        R: CallbackOutcome,
    {
        self.deferred.always(f);
        self
    }

    /// The deferred settled by this transport, e.g. to join with
    /// [`Deferred::when()`].
    pub fn promise(&self) -> Outcome {
        self.deferred.promise()
    }

    /// Status of the response, once one was received.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    /// The request type, or the request URL if none was given.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Number of attempts handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Content type sent with the request, including any multipart boundary.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Tell if the transport settled its deferred.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }
}

/// Parse `url`, moving any userinfo out of it.
///
/// Returns the URI without userinfo or fragment and the `user:password`
/// credentials, if there were any.
fn split_userinfo(url: &str) -> Result<(Uri, Option<String>), Error> {
    let mut parsed = Url::parse(url).map_err(|e| Error::BadUri(format!("{}: {}", url, e)))?;

    let credentials = if !parsed.username().is_empty() || parsed.password().is_some() {
        let credentials = format!("{}:{}", parsed.username(), parsed.password().unwrap_or(""));
        parsed
            .set_username("")
            .and_then(|_| parsed.set_password(None))
            .map_err(|_| Error::BadUri(format!("{}: cannot remove userinfo", url)))?;
        Some(credentials)
    } else {
        None
    };

    parsed.set_fragment(None);

    let uri = parsed
        .as_str()
        .parse::<Uri>()
        .map_err(|e| Error::BadUri(format!("{}: {}", url, e)))?;

    Ok((uri, credentials))
}

impl fmt::Debug for RequestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTransport")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("request_id", &self.request_id)
            .field("phase", &self.phase)
            .field("attempts", &self.attempts)
            .field("deferred", &self.deferred)
            .finish()
    }
}
