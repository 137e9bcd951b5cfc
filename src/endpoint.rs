//! Request descriptions.

use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// Data describing a single request, relative to a base URL.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// The HTTP method.
    pub method: Method,

    /// Path segments appended to the base URL, unescaped.
    pub segments: Vec<String>,

    /// Headers sent with this request.
    pub headers: HeaderMap,
}

impl Endpoint {
    /// Creates an endpoint with the given method and path and no headers.
    ///
    /// `path` is split on `/`; empty segments are dropped.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            segments: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            headers: HeaderMap::new(),
        }
    }

    /// The `GET /{id}` endpoint, with a JSON content type.
    ///
    /// `id` is kept as one segment, so `/`, `?` and `#` inside it are escaped.
    pub fn get(id: &str) -> Self {
        let mut endpoint = Self::new(Method::GET, "");
        endpoint.segments.push(id.to_string());
        endpoint.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        endpoint
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// The unescaped path, e.g. `/abc`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Resolves this endpoint against `base_url`.
    ///
    /// The segments are appended to the path of the base, so `"http://h/v2"` and
    /// `["abc"]` give `"http://h/v2/abc"`. Each segment is percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the base is not a valid URL or a segment is
    /// `.` or `..`.
    pub fn request(&self, base_url: &str) -> Result<RequestDescriptor> {
        if !is_valid_url(base_url) {
            return Err(Error::InvalidUrl(format!("{}{}", base_url, self.path())));
        }
        let mut url =
            Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;

        // `Url` drops dot segments on push instead of failing.
        if let Some(segment) = self.segments.iter().find(|s| matches!(s.as_str(), "." | "..")) {
            return Err(Error::InvalidUrl(format!(
                "{base_url}: path segment {segment:?} not allowed"
            )));
        }

        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(format!("{base_url}: cannot be a base")))?
            .pop_if_empty()
            .extend(&self.segments);

        Ok(RequestDescriptor {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
        })
    }
}

/// A fully resolved request, ready for the transport.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: Method,
    /// The absolute target URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Returns `true` if `candidate` is an absolute `http` or `https` URL with a host.
///
/// ```
/// assert!(hopguard::endpoint::is_valid_url("http://www.mocky.io/v2/abc"));
/// assert!(!hopguard::endpoint::is_valid_url("empty/abc"));
/// ```
pub fn is_valid_url(candidate: &str) -> bool {
    if candidate.trim() != candidate || candidate.is_empty() {
        return false;
    }
    match Url::parse(candidate) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_endpoint() {
        let endpoint = Endpoint::get("5e0af46b");

        assert_eq!(endpoint.method, Method::GET);
        assert_eq!(endpoint.segments, vec!["5e0af46b"]);
        assert_eq!(endpoint.path(), "/5e0af46b");
        assert_eq!(
            endpoint.headers.get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_request_appends_path_to_base() {
        let request = Endpoint::get("abc")
            .request("http://www.mocky.io/v2")
            .unwrap();

        assert_eq!(request.url.as_str(), "http://www.mocky.io/v2/abc");
        assert_eq!(request.method, Method::GET);
    }

    #[test]
    fn test_request_on_bare_host_and_trailing_slash() {
        let request = Endpoint::get("abc").request("http://redirect.test").unwrap();
        assert_eq!(request.url.as_str(), "http://redirect.test/abc");

        let request = Endpoint::get("abc").request("http://redirect.test/v2/").unwrap();
        assert_eq!(request.url.as_str(), "http://redirect.test/v2/abc");
    }

    #[test]
    fn test_request_escapes_reserved_characters_in_id() {
        let request = Endpoint::get("a?b#c").request("http://redirect.test/v2").unwrap();
        assert_eq!(request.url.as_str(), "http://redirect.test/v2/a%3Fb%23c");
        assert_eq!(request.url.query(), None);
        assert_eq!(request.url.fragment(), None);

        let request = Endpoint::get("a/b%").request("http://redirect.test").unwrap();
        assert_eq!(request.url.path(), "/a%2Fb%25");
    }

    #[test]
    fn test_request_rejects_dot_segments() {
        for id in [".", ".."] {
            match Endpoint::get(id).request("http://redirect.test/v2") {
                Err(Error::InvalidUrl(_)) => {}
                other => panic!("Expected InvalidUrl for {id:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_new_splits_path() {
        let endpoint = Endpoint::new(Method::GET, "/v2/items/");
        assert_eq!(endpoint.segments, vec!["v2", "items"]);
        assert_eq!(endpoint.path(), "/v2/items");
    }

    #[test]
    fn test_invalid_base_url() {
        for base in ["empty", "", "ftp://files.example.com", " http://example.com"] {
            match Endpoint::get("abc").request(base) {
                Err(Error::InvalidUrl(_)) => {}
                other => panic!("Expected InvalidUrl for {base:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_with_header_rejects_bad_name() {
        let result = Endpoint::get("abc").with_header("bad header", "x");
        assert!(matches!(result, Err(Error::ConfigurationError(_))));

        let endpoint = Endpoint::get("abc").with_header("x-trace", "1").unwrap();
        assert_eq!(endpoint.headers.get("x-trace").unwrap(), "1");
    }
}
