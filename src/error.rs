//! Error types for redirect-tracked fetches.
//!
//! [`Error`] carries everything that can end a call, including low-level transport
//! failures. Callers that only care about the closed, caller-facing failure kinds can
//! collapse it with [`Error::classify`] into a [`ClassifiedError`].

use http::StatusCode;
use url::Url;

/// The closed set of failure kinds surfaced to callers.
///
/// Transport-level problems (network errors, timeouts, bad bodies) are not part of
/// this set; see [`Error::classify`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifiedError {
    /// The base URL or the endpoint path did not form a valid URL.
    #[error("The provided URL is invalid.")]
    InvalidUrl,

    /// The server redirected more times than the configured budget allows.
    #[error("The number of redirects exceeded the configured maximum.")]
    MultipleRedirects,

    /// The server redirected to a URL already visited during the call.
    #[error("The server returned a circular redirect.")]
    CircularRedirect,
}

impl ClassifiedError {
    /// A stable snake_case identifier, suitable for log fields and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            ClassifiedError::InvalidUrl => "invalid_url",
            ClassifiedError::MultipleRedirects => "multiple_redirects",
            ClassifiedError::CircularRedirect => "circular_redirect",
        }
    }
}

/// The main error type for a fetch.
///
/// # Examples
///
/// ```no_run
/// use hopguard::{ClassifiedError, Repository};
///
/// # async fn example() -> Result<(), hopguard::Error> {
/// let repository = Repository::builder()
///     .base_url("https://api.example.com")
///     .max_redirects(3)
///     .build()?;
///
/// let outcome = repository.get("5e0af46b").outcome().await;
/// match outcome.result {
///     Ok(Some(data)) => println!("Got {} fields", data.len()),
///     Ok(None) => println!("No data"),
///     Err(e) => match e.classify() {
///         Some(ClassifiedError::CircularRedirect) => eprintln!("loop detected: {e}"),
///         Some(kind) => eprintln!("{kind}"),
///         None => eprintln!("transport failure: {e}"),
///     },
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The base URL joined with the endpoint path is not a valid URL.
    ///
    /// Detected before any network call is made.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The redirect budget was exhausted.
    ///
    /// A budget of `0` rejects the very first redirect and is still reported as
    /// `MultipleRedirects`, even though only one redirect was attempted.
    #[error("Redirect budget exhausted after {followed} redirects")]
    MultipleRedirects {
        /// Redirects followed before the rejected one.
        followed: u8,
    },

    /// A redirect pointed at a URL already visited during this call.
    #[error("Circular redirect to {url}")]
    CircularRedirect {
        /// The repeated redirect target.
        url: Url,
    },

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// A `301 Moved Permanently` reached the caller without passing through the
    /// redirect guard, typically because it carried no usable `Location` header.
    #[error("Unexpected redirect response (status {status})")]
    UnexpectedRedirect {
        /// The HTTP status code
        status: StatusCode,
    },

    /// A `200 OK` body was not valid JSON.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Invalid configuration was provided to the builder.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The fetch was aborted before it produced a terminal event.
    #[error("Fetch was cancelled")]
    Cancelled,
}

impl Error {
    /// Maps this error into the closed caller-facing taxonomy.
    ///
    /// Returns `None` for transport-level errors, which have no classified
    /// counterpart.
    ///
    /// # Examples
    ///
    /// ```
    /// use hopguard::{ClassifiedError, Error};
    ///
    /// let err = Error::MultipleRedirects { followed: 0 };
    /// assert_eq!(err.classify(), Some(ClassifiedError::MultipleRedirects));
    /// assert_eq!(Error::Timeout.classify(), None);
    /// ```
    pub fn classify(&self) -> Option<ClassifiedError> {
        match self {
            Error::InvalidUrl(_) => Some(ClassifiedError::InvalidUrl),
            Error::MultipleRedirects { .. } => Some(ClassifiedError::MultipleRedirects),
            Error::CircularRedirect { .. } => Some(ClassifiedError::CircularRedirect),
            Error::Network(_)
            | Error::Timeout
            | Error::UnexpectedRedirect { .. }
            | Error::DeserializationFailed { .. }
            | Error::ConfigurationError(_)
            | Error::Cancelled => None,
        }
    }

    /// Returns `true` if the redirect guard ended the call.
    pub fn is_redirect_rejection(&self) -> bool {
        matches!(
            self,
            Error::MultipleRedirects { .. } | Error::CircularRedirect { .. }
        )
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::UnexpectedRedirect { status } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for fetches.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_guard_errors() {
        let url = Url::parse("http://example.com/loop").unwrap();

        assert_eq!(
            Error::InvalidUrl("empty/1".to_string()).classify(),
            Some(ClassifiedError::InvalidUrl)
        );
        assert_eq!(
            Error::MultipleRedirects { followed: 2 }.classify(),
            Some(ClassifiedError::MultipleRedirects)
        );
        assert_eq!(
            Error::CircularRedirect { url }.classify(),
            Some(ClassifiedError::CircularRedirect)
        );
    }

    #[test]
    fn test_transport_errors_are_unclassified() {
        assert_eq!(Error::Timeout.classify(), None);
        assert_eq!(Error::Cancelled.classify(), None);
        assert_eq!(
            Error::UnexpectedRedirect {
                status: StatusCode::MOVED_PERMANENTLY
            }
            .classify(),
            None
        );
    }

    #[test]
    fn test_status_and_raw_response() {
        let err = Error::DeserializationFailed {
            raw_response: "not json".to_string(),
            serde_error: "expected value".to_string(),
            status: StatusCode::OK,
        };
        assert_eq!(err.status(), Some(StatusCode::OK));
        assert_eq!(err.raw_response(), Some("not json"));
        assert!(!err.is_redirect_rejection());
        assert!(Error::MultipleRedirects { followed: 0 }.is_redirect_rejection());
    }

    #[test]
    fn test_classified_messages() {
        assert_eq!(
            ClassifiedError::CircularRedirect.to_string(),
            "The server returned a circular redirect."
        );
        assert_eq!(ClassifiedError::MultipleRedirects.code(), "multiple_redirects");
    }
}
