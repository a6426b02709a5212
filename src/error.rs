use std::fmt;

/// Error type for deferred-xhr
///
/// Deferred settlement never produces an `Error`: timeouts and failing
/// callbacks are delivered as [`Rejection`](crate::Rejection) payloads. This
/// type covers misuse and malformed input on the transport side.
#[derive(Debug, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    BadHeader(String),
    BadUri(String),
    UnsupportedVersion,
    HttpParseFail(String),
    HttpParseTooManyHeaders,
    IncompleteResponse,
    BadContentLengthHeader,
    NoAttemptInFlight,
    MultipartWithoutForm,
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        Error::HttpParseFail(value.to_string())
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadHeader(v) => write!(f, "bad header: {}", v),
            Error::BadUri(v) => write!(f, "bad uri: {}", v),
            Error::UnsupportedVersion => write!(f, "unsupported http version"),
            Error::HttpParseFail(v) => write!(f, "http parse fail: {}", v),
            Error::HttpParseTooManyHeaders => write!(f, "http parse resulted in too many headers"),
            Error::IncompleteResponse => write!(f, "response is not complete"),
            Error::BadContentLengthHeader => write!(f, "content-length header not a number"),
            Error::NoAttemptInFlight => write!(f, "no request attempt is in flight"),
            Error::MultipartWithoutForm => {
                write!(f, "multipart content type without a multipart form")
            }
        }
    }
}

#[cfg(all(test, feature = "transport"))]
mod tests {
    use super::*;
    use crate::transport::{RequestData, RequestParams, RequestTransport};
    use crate::EventLoop;

    /// Creates a transport for the params and polls the first attempt.
    fn in_flight(params: RequestParams) -> (EventLoop, RequestTransport) {
        let event_loop = EventLoop::new();
        let mut transport = RequestTransport::new(&event_loop, params).unwrap();
        transport.poll_attempt().unwrap();
        (event_loop, transport)
    }

    // BadHeader
    #[test]
    fn test_bad_header() {
        let event_loop = EventLoop::new();
        let params = RequestParams::get("http://example.com").header("Invalid\0Header", "value");

        let err = RequestTransport::new(&event_loop, params).unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));
    }

    // BadUri
    #[test]
    fn test_bad_uri() {
        let event_loop = EventLoop::new();
        let params = RequestParams::get("http://exa mple.com/");

        let err = RequestTransport::new(&event_loop, params).unwrap_err();
        assert!(matches!(err, Error::BadUri(_)));
    }

    // UnsupportedVersion is guarded in the parser, but httparse already
    // refuses anything that isn't HTTP/1.x.
    #[test]
    fn test_http2_status_line() {
        let (_ev, mut transport) = in_flight(RequestParams::get("http://example.com"));

        let err = transport.handle_response(b"HTTP/2.0 200 OK\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::HttpParseFail(_)));
    }

    // HttpParseFail
    #[test]
    fn test_http_parse_fail() {
        let (_ev, mut transport) = in_flight(RequestParams::get("http://example.com"));

        // Missing space after HTTP/1.1
        let err = transport.handle_response(b"HTTP/1.1200 OK\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::HttpParseFail(_)));
    }

    // HttpParseTooManyHeaders
    #[test]
    fn test_http_parse_too_many_headers() {
        let (_ev, mut transport) = in_flight(RequestParams::get("http://example.com"));

        let mut res = String::from("HTTP/1.1 200 OK\r\n");
        for i in 0..1000 {
            res.push_str(&format!("X-Header-{}: value\r\n", i));
        }
        res.push_str("\r\n");

        let err = transport.handle_response(res.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::HttpParseTooManyHeaders));
    }

    // IncompleteResponse
    #[test]
    fn test_incomplete_response() {
        let (_ev, mut transport) = in_flight(RequestParams::get("http://example.com"));

        let err = transport
            .handle_response(b"HTTP/1.1 200 OK\r\nContent-Len")
            .unwrap_err();
        assert_eq!(err, Error::IncompleteResponse);

        // Body shorter than content-length
        let err = transport
            .handle_response(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort")
            .unwrap_err();
        assert_eq!(err, Error::IncompleteResponse);
    }

    // BadContentLengthHeader
    #[test]
    fn test_bad_content_length_header() {
        let (_ev, mut transport) = in_flight(RequestParams::get("http://example.com"));

        let err = transport
            .handle_response(b"HTTP/1.1 200 OK\r\nContent-Length: nope\r\n\r\n{}")
            .unwrap_err();
        assert_eq!(err, Error::BadContentLengthHeader);
    }

    // NoAttemptInFlight
    #[test]
    fn test_no_attempt_in_flight() {
        let event_loop = EventLoop::new();
        let params = RequestParams::get("http://example.com");
        let mut transport = RequestTransport::new(&event_loop, params).unwrap();

        // Attempt not polled yet
        let err = transport
            .handle_response(b"HTTP/1.1 200 OK\r\n\r\n")
            .unwrap_err();
        assert_eq!(err, Error::NoAttemptInFlight);
    }

    // MultipartWithoutForm
    #[test]
    fn test_multipart_without_form() {
        let event_loop = EventLoop::new();
        let params = RequestParams::post("http://example.com/upload")
            .content_type("multipart/form-data")
            .data(RequestData::Raw("a=b".into()));

        let err = RequestTransport::new(&event_loop, params).unwrap_err();
        assert_eq!(err, Error::MultipartWithoutForm);
    }

    // Test the From<httparse::Error> implementation
    #[test]
    fn test_from_httparse_error() {
        let httparse_error = httparse::Error::HeaderName;
        let error: Error = httparse_error.into();
        let Error::HttpParseFail(msg) = error else {
            panic!("Not Error::HttpParseFail");
        };
        assert!(!msg.is_empty());
    }
}
