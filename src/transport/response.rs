use http::{header, HeaderMap, Response, StatusCode, Version};
use serde_json::Value;

use crate::Error;

use super::DataType;

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The body parsed as JSON.
    Json(Value),
    /// The body as text, either asked for or because JSON parsing failed.
    Text(String),
}

impl ResponseBody {
    pub(crate) fn decode(data_type: DataType, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);

        match data_type {
            DataType::Text => ResponseBody::Text(text.into_owned()),
            DataType::Json => {
                let text: String = text.chars().filter(|c| *c != '\r' && *c != '\n').collect();
                match serde_json::from_str(&text) {
                    Ok(v) => ResponseBody::Json(v),
                    Err(e) => {
                        warn!("JSON parse failed ({}), keeping text: {}", e, text);
                        ResponseBody::Text(text)
                    }
                }
            }
        }
    }

    /// The JSON value, if the body was parsed as JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Text(_) => None,
        }
    }

    /// The text, if the body was kept as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(v) => Some(v),
            ResponseBody::Json(_) => None,
        }
    }
}

/// Value of a transport that resolved.
#[derive(Debug, Clone)]
pub struct Completed {
    /// The decoded body.
    pub body: ResponseBody,
    /// Always `200 OK`.
    pub status: StatusCode,
    /// HTTP version of the response.
    pub version: Version,
    /// Response headers.
    pub headers: HeaderMap,
    /// The request type, or the request URL if none was given.
    pub request_id: String,
}

/// The body bytes following the response head.
///
/// Honours `Content-Length` when present, otherwise takes all of `rest`.
pub(crate) fn body_slice<'a>(response: &Response<()>, rest: &'a [u8]) -> Result<&'a [u8], Error> {
    let Some(value) = response.headers().get(header::CONTENT_LENGTH) else {
        return Ok(rest);
    };

    let len: usize = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or(Error::BadContentLengthHeader)?;

    if rest.len() < len {
        return Err(Error::IncompleteResponse);
    }

    if rest.len() > len {
        trace!("Ignoring {} bytes after body", rest.len() - len);
    }

    Ok(&rest[..len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_with_newlines() {
        let body = ResponseBody::decode(DataType::Json, b"{\r\n  \"a\": 1,\n  \"b\": [true]\n}");
        assert_eq!(body, ResponseBody::Json(json!({"a": 1, "b": [true]})));
        assert_eq!(body.as_json().unwrap()["a"], 1);
    }

    #[test]
    fn bad_json_keeps_text() {
        let body = ResponseBody::decode(DataType::Json, b"not\njson");
        assert_eq!(body, ResponseBody::Text("notjson".into()));
    }

    #[test]
    fn text_is_untouched() {
        let body = ResponseBody::decode(DataType::Text, b"line 1\nline 2");
        assert_eq!(body.as_text(), Some("line 1\nline 2"));
        assert!(body.as_json().is_none());
    }

    fn head(content_length: Option<&str>) -> Response<()> {
        let mut b = Response::builder();
        if let Some(v) = content_length {
            b = b.header("content-length", v);
        }
        b.body(()).unwrap()
    }

    #[test]
    fn body_by_content_length() {
        assert_eq!(body_slice(&head(Some("3")), b"abcdef").unwrap(), b"abc");
        assert_eq!(body_slice(&head(None), b"abcdef").unwrap(), b"abcdef");
        assert_eq!(
            body_slice(&head(Some("10")), b"abc").unwrap_err(),
            Error::IncompleteResponse
        );
        assert_eq!(
            body_slice(&head(Some("x")), b"abc").unwrap_err(),
            Error::BadContentLengthHeader
        );
    }
}
