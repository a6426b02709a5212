use http::{HeaderName, HeaderValue, Response, StatusCode, Version};

use crate::Error;

/// Try to parse the head of an HTTP/1.x response.
///
/// Returns `None` until `input` holds the whole head. On success, the
/// `usize` is how many bytes of `input` the head used.
pub fn try_parse_response<const N: usize>(
    input: &[u8],
) -> Result<Option<(usize, Response<()>)>, Error> {
    let mut headers = [httparse::EMPTY_HEADER; N];
    let mut res = httparse::Response::new(&mut headers);

    let input_used = match res.parse(input) {
        Ok(httparse::Status::Complete(v)) => v,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => return Err(Error::HttpParseTooManyHeaders),
        Err(e) => return Err(e.into()),
    };

    let version = match res.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        _ => return Err(Error::UnsupportedVersion),
    };

    let status = res
        .code
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(|| Error::HttpParseFail("bad status code".into()))?;

    let mut builder = Response::builder().version(version).status(status);

    for h in res.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|e| Error::BadHeader(e.to_string()))?;
        let value =
            HeaderValue::from_bytes(h.value).map_err(|e| Error::BadHeader(e.to_string()))?;
        builder = builder.header(name, value);
    }

    let response = builder
        .body(())
        .map_err(|e| Error::HttpParseFail(e.to_string()))?;

    Ok(Some((input_used, response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: &[u8] = b"HTTP/1.1 404 Not Found\r\n\
        Content-Type: application/json\r\n\
        X-Request-Id: abc\r\n\
        \r\n";

    #[test]
    fn partial_head_is_none() {
        for i in 0..HEAD.len() {
            let r = try_parse_response::<16>(&HEAD[..i]).unwrap();
            assert!(r.is_none(), "parsed at {}", i);
        }
    }

    #[test]
    fn complete_head() {
        let mut input = HEAD.to_vec();
        input.extend_from_slice(b"{}");

        let (used, res) = try_parse_response::<16>(&input).unwrap().unwrap();

        assert_eq!(used, HEAD.len());
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.version(), Version::HTTP_11);
        assert_eq!(res.headers().get("x-request-id").unwrap(), "abc");
    }

    #[test]
    fn http10() {
        let (_, res) = try_parse_response::<4>(b"HTTP/1.0 200 OK\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(res.version(), Version::HTTP_10);
    }

    #[test]
    fn header_limit() {
        let err = try_parse_response::<1>(b"HTTP/1.1 200 OK\r\na: 1\r\nb: 2\r\n\r\n").unwrap_err();
        assert_eq!(err, Error::HttpParseTooManyHeaders);
    }
}
