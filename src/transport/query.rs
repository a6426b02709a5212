use url::form_urlencoded;

/// Form-urlencode `pairs` as `name=value&name=value`.
///
/// With `skip_in`, a pair whose encoded form already occurs in that string
/// (the request URL) is left out.
pub(crate) fn encode_form(pairs: &[(String, String)], skip_in: Option<&str>) -> String {
    let mut out = String::new();

    for (name, value) in pairs {
        let pair = form_urlencoded::Serializer::new(String::new())
            .append_pair(name, value)
            .finish();

        if skip_in.map(|url| in_url(url, &pair)).unwrap_or(false) {
            trace!("Skip {}, already in url", pair);
            continue;
        }

        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&pair);
    }

    out
}

// Spaces in a URL may be `+` or `%20`, a literal `+` is always `%2B`.
fn in_url(url: &str, pair: &str) -> bool {
    url.contains(pair) || (pair.contains('+') && url.contains(&pair.replace('+', "%20")))
}

/// Append `query` to `url` with `?` or `&`.
pub(crate) fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }

    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, sep, query)
}
