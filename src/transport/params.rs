use std::fmt;
use std::time::Duration;

use http::Method;

use crate::deferred::Settled;
use crate::Rejection;

use super::multipart::MultipartForm;
use super::{Completed, TransportFailure};

/// Timeout of the first attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// How many times a timed out request is retried.
pub const DEFAULT_RETRY: u32 = 5;

/// Content type used when the caller doesn't set one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// How to decode the body of a successful response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataType {
    /// Parse as JSON, keeping the text if that fails.
    #[default]
    Json,
    /// Keep the body as text.
    Text,
}

/// Data sent with the request.
#[derive(Debug, Clone)]
pub enum RequestData {
    /// Name/value pairs, form-urlencoded. Appended to the URL for GET, the
    /// body for POST.
    Form(Vec<(String, String)>),
    /// Sent as is.
    Raw(String),
    /// Multipart form. Requires a `multipart/*` content type.
    Multipart(MultipartForm),
}

type SuccessHook = Box<dyn FnMut(&Completed)>;
type ErrorHook = Box<dyn FnMut(&Rejection<TransportFailure>)>;
type CompleteHook = Box<dyn FnMut(&Settled<Completed, TransportFailure>)>;

/// Configuration of a [`RequestTransport`](super::RequestTransport).
///
/// ```
/// use std::time::Duration;
/// use deferred_xhr::transport::{DataType, RequestParams};
///
/// let params = RequestParams::post("https://api.test/items")
///     .field("name", "first item")
///     .header("x-api-key", "secret")
///     .data_type(DataType::Text)
///     .timeout(Duration::from_secs(5))
///     .max_retry(2)
///     .request_type("create-item");
/// ```
pub struct RequestParams {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) data: Option<RequestData>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) content_type: Option<String>,
    pub(crate) data_type: DataType,
    pub(crate) response_type: Option<DataType>,
    pub(crate) timeout: Duration,
    pub(crate) max_retry: u32,
    pub(crate) request_type: Option<String>,
    pub(crate) on_success: Option<SuccessHook>,
    pub(crate) on_error: Option<ErrorHook>,
    pub(crate) on_complete: Option<CompleteHook>,
}

impl RequestParams {
    /// Params for `method` to `url`.
    ///
    /// Only GET and POST are supported, any other method becomes GET.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let method = if method == Method::GET || method == Method::POST {
            method
        } else {
            debug!("Unsupported method {}, using GET", method);
            Method::GET
        };

        RequestParams {
            method,
            url: url.into(),
            data: None,
            headers: Vec::new(),
            content_type: None,
            data_type: DataType::default(),
            response_type: None,
            timeout: DEFAULT_TIMEOUT,
            max_retry: DEFAULT_RETRY,
            request_type: None,
            on_success: None,
            on_error: None,
            on_complete: None,
        }
    }

    /// GET `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST to `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a request header.
    ///
    /// Giving any header also adds `X-Requested-With: XMLHttpRequest`, unless
    /// that header is among those given.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request data, replacing anything set before.
    pub fn data(mut self, data: RequestData) -> Self {
        self.data = Some(data);
        self
    }

    /// Add one form field.
    ///
    /// Replaces data that isn't [`RequestData::Form`].
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let pair = (name.into(), value.into());
        match &mut self.data {
            Some(RequestData::Form(pairs)) => pairs.push(pair),
            _ => self.data = Some(RequestData::Form(vec![pair])),
        }
        self
    }

    /// Add many form fields, see [`field()`](Self::field).
    pub fn form<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self = self.field(k, v);
        }
        self
    }

    /// Content type of the request. Defaults to [`DEFAULT_CONTENT_TYPE`].
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// How to decode the response body.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Overrides [`data_type()`](Self::data_type) for the response.
    pub fn response_type(mut self, response_type: DataType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Timeout of the first attempt. Defaults to [`DEFAULT_TIMEOUT`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry bound for timed out attempts. Defaults to [`DEFAULT_RETRY`].
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Label identifying the request in results and failures. Defaults to
    /// the request URL.
    pub fn request_type(mut self, request_type: impl Into<String>) -> Self {
        self.request_type = Some(request_type.into());
        self
    }

    /// Called when the request succeeds.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Completed) + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Called when the request fails.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Rejection<TransportFailure>) + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called when the request finishes either way.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Settled<Completed, TransportFailure>) + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub(crate) fn is_multipart(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|c| c.contains("multipart"))
            .unwrap_or(false)
    }

    pub(crate) fn effective_data_type(&self) -> DataType {
        self.response_type.unwrap_or(self.data_type)
    }
}

impl fmt::Debug for RequestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestParams")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("data", &self.data)
            .field("headers", &self.headers)
            .field("content_type", &self.content_type)
            .field("data_type", &self.effective_data_type())
            .field("timeout", &self.timeout)
            .field("max_retry", &self.max_retry)
            .field("request_type", &self.request_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = RequestParams::get("http://a.test");
        assert_eq!(p.method, Method::GET);
        assert_eq!(p.timeout, Duration::from_secs(20));
        assert_eq!(p.max_retry, 5);
        assert_eq!(p.effective_data_type(), DataType::Json);
        assert!(p.content_type.is_none());
        assert!(!p.is_multipart());
    }

    #[test]
    fn unsupported_method_falls_back_to_get() {
        let p = RequestParams::new(Method::DELETE, "http://a.test");
        assert_eq!(p.method, Method::GET);

        let p = RequestParams::new(Method::POST, "http://a.test");
        assert_eq!(p.method, Method::POST);
    }

    #[test]
    fn fields_collect_into_form() {
        let p = RequestParams::get("http://a.test")
            .field("a", "1")
            .form([("b", "2"), ("c", "3")]);

        let Some(RequestData::Form(pairs)) = p.data else {
            panic!("Expected form data");
        };
        let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn field_replaces_raw_data() {
        let p = RequestParams::post("http://a.test")
            .data(RequestData::Raw("raw".into()))
            .field("a", "1");

        assert!(matches!(p.data, Some(RequestData::Form(_))));
    }

    #[test]
    fn response_type_wins_over_data_type() {
        let p = RequestParams::get("http://a.test")
            .data_type(DataType::Json)
            .response_type(DataType::Text);
        assert_eq!(p.effective_data_type(), DataType::Text);
    }
}
