//! The public entry point.
//!
//! A [`Repository`] fetches JSON objects by id from a base URL, following at most a
//! configured number of `301` redirects and refusing redirect loops. Use
//! [`RepositoryBuilder`] to configure and create one.

use crate::{
    endpoint::Endpoint,
    fetch::{self, Fetch},
    guard::{RedirectHook, RedirectSession},
    transport::HttpTransport,
    Error, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Default redirect budget.
pub const DEFAULT_MAX_REDIRECTS: u8 = u8::MAX;

/// Fetches JSON objects while tracking redirects.
///
/// The repository is cheap to clone and holds no per-call state: every
/// [`get`](Repository::get) creates its own [`RedirectSession`], so concurrent calls
/// never share redirect bookkeeping.
///
/// # Examples
///
/// ```no_run
/// use hopguard::Repository;
///
/// # async fn example() -> Result<(), hopguard::Error> {
/// let repository = Repository::builder()
///     .base_url("http://www.mocky.io/v2")
///     .max_redirects(2)
///     .build()?;
///
/// let outcome = repository.get("5e0af46b3300007e1120a7ef").outcome().await;
/// println!("followed {} redirects", outcome.redirects.len());
/// if let Some(data) = outcome.data() {
///     println!("hello = {:?}", data.get("hello"));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Repository {
    inner: Arc<RepositoryInner>,
}

#[derive(Clone)]
struct RepositoryInner {
    transport: HttpTransport,
    base_url: String,
    max_redirects: u8,
    executor: Handle,
}

impl Repository {
    /// Creates a new `RepositoryBuilder`.
    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::new()
    }

    /// The base URL every endpoint is appended to.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The redirect budget given to each call.
    pub fn max_redirects(&self) -> u8 {
        self.inner.max_redirects
    }

    /// Returns a repository that fetches from `base_url` instead.
    ///
    /// Everything else, including the HTTP client, is shared with `self`. Fetches
    /// already started keep the base URL they were started with.
    pub fn with_base_url(&self, base_url: impl Into<String>) -> Repository {
        let mut inner = RepositoryInner::clone(&self.inner);
        inner.base_url = base_url.into();
        Repository {
            inner: Arc::new(inner),
        }
    }

    /// Returns a repository whose calls follow at most `max_redirects` redirects.
    pub fn with_max_redirects(&self, max_redirects: u8) -> Repository {
        let mut inner = RepositoryInner::clone(&self.inner);
        inner.max_redirects = max_redirects;
        Repository {
            inner: Arc::new(inner),
        }
    }

    /// Fetches the object stored under `id`.
    ///
    /// The returned [`Fetch`] yields one [`Event::Redirected`](crate::Event::Redirected)
    /// per followed redirect, then a terminal event. An invalid base URL fails with
    /// [`Error::InvalidUrl`] without touching the network.
    pub fn get(&self, id: &str) -> Fetch {
        self.get_with_session(id, RedirectSession::new(self.inner.max_redirects))
    }

    /// Like [`get`](Repository::get), but with a caller-prepared session.
    ///
    /// Useful for pre-seeding URLs that must be reported as circular, e.g.
    /// `RedirectSession::new(3).with_seen([url])`.
    pub fn get_with_session(&self, id: &str, session: RedirectSession) -> Fetch {
        self.get_with_hook(id, session)
    }

    /// Like [`get`](Repository::get), but every redirect is decided by `hook`.
    ///
    /// The repository's own budget is not applied; the hook is the only guard.
    /// A hook that never rejects can follow a chain forever, so wrap a
    /// [`RedirectSession`] or set a [`timeout`](RepositoryBuilder::timeout).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hopguard::{RedirectDecision, RedirectHook, RedirectSession, Repository};
    /// use http::StatusCode;
    /// use url::Url;
    ///
    /// struct Logged(RedirectSession);
    ///
    /// impl RedirectHook for Logged {
    ///     fn on_redirect(&mut self, candidate: &Url, status: StatusCode) -> RedirectDecision {
    ///         println!("{} -> {}", status, candidate);
    ///         self.0.on_redirect(candidate, status)
    ///     }
    /// }
    ///
    /// # async fn example() -> Result<(), hopguard::Error> {
    /// let repository = Repository::builder()
    ///     .base_url("https://api.example.com")
    ///     .build()?;
    ///
    /// let outcome = repository
    ///     .get_with_hook("5e0af46b", Logged(RedirectSession::new(3)))
    ///     .outcome()
    ///     .await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn get_with_hook<H>(&self, id: &str, hook: H) -> Fetch
    where
        H: RedirectHook + 'static,
    {
        let (sink, rx) = fetch::channel();

        let request = match Endpoint::get(id).request(&self.inner.base_url) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    base_url = %self.inner.base_url,
                    id = %id,
                    "Rejected request before sending"
                );
                sink.finish(Err(e));
                return Fetch::new(rx, None);
            }
        };

        let inner = Arc::clone(&self.inner);
        let task = self.inner.executor.spawn(async move {
            let mut hook = hook;
            let result = inner.transport.send(&request, &mut hook, &sink).await;

            match &result {
                Ok(data) => tracing::debug!(
                    url = %request.url,
                    has_data = data.is_some(),
                    "Fetch completed"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    kind = e.classify().map(|kind| kind.code()),
                    url = %request.url,
                    "Fetch failed"
                ),
            }

            sink.finish(result);
        });

        Fetch::new(rx, Some(task))
    }
}

/// Builder for configuring and creating a [`Repository`].
///
/// The base URL is stored as given and validated on every call, so a bad URL
/// surfaces as [`Error::InvalidUrl`] from [`Repository::get`], never from `build`.
///
/// # Examples
///
/// ```no_run
/// use hopguard::RepositoryBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), hopguard::Error> {
/// let repository = RepositoryBuilder::new()
///     .base_url("https://api.example.com")
///     .max_redirects(5)
///     .timeout(Duration::from_secs(10))
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RepositoryBuilder {
    base_url: Option<String>,
    max_redirects: u8,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    executor: Option<Handle>,
}

impl RepositoryBuilder {
    /// Creates a new `RepositoryBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            default_headers: HeaderMap::new(),
            timeout: None,
            executor: None,
        }
    }

    /// Sets the base URL for all requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets how many redirects a single call may follow.
    ///
    /// `0` makes the first redirect fail with [`Error::MultipleRedirects`].
    pub fn max_redirects(mut self, max_redirects: u8) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the timeout for a whole call.
    ///
    /// The clock starts with the first request and covers every redirect hop and
    /// the final body. Expiry fails the call with [`Error::Timeout`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the runtime that fetches are spawned on.
    ///
    /// Defaults to the runtime current when [`build`](Self::build) is called.
    pub fn executor(mut self, handle: Handle) -> Self {
        self.executor = Some(handle);
        self
    }

    /// Builds the configured `Repository`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided, if no executor was given and
    /// no tokio runtime is running, or if the HTTP client cannot be built.
    pub fn build(self) -> Result<Repository> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let executor = match self.executor {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| {
                Error::ConfigurationError(format!("No tokio runtime available: {}", e))
            })?,
        };

        let transport = HttpTransport::new(self.default_headers, self.timeout)?;

        Ok(Repository {
            inner: Arc::new(RepositoryInner {
                transport,
                base_url,
                max_redirects: self.max_redirects,
                executor,
            }),
        })
    }
}

impl Default for RepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassifiedError, Event};

    #[tokio::test]
    async fn test_build_requires_base_url() {
        match Repository::builder().build() {
            Err(Error::ConfigurationError(msg)) => assert!(msg.contains("Base URL")),
            Err(e) => panic!("Expected ConfigurationError, got {:?}", e),
            Ok(_) => panic!("Expected ConfigurationError, got a repository"),
        }
    }

    #[test]
    fn test_build_outside_runtime_needs_executor() {
        let result = Repository::builder().base_url("http://localhost").build();
        assert!(matches!(result, Err(Error::ConfigurationError(_))));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let repository = Repository::builder()
            .base_url("http://localhost")
            .executor(runtime.handle().clone())
            .build()
            .unwrap();
        assert_eq!(repository.max_redirects(), DEFAULT_MAX_REDIRECTS);
        assert_eq!(repository.base_url(), "http://localhost");
    }

    #[tokio::test]
    async fn test_invalid_base_url_fails_without_task() {
        let repository = Repository::builder()
            .base_url("empty")
            .max_redirects(3)
            .build()
            .unwrap();

        let mut fetch = repository.get("abc");
        match fetch.next().await {
            Some(Event::Failed(e)) => assert_eq!(e.classify(), Some(ClassifiedError::InvalidUrl)),
            other => panic!("Expected InvalidUrl, got {:?}", other),
        }
        assert!(fetch.next().await.is_none());
    }

    #[tokio::test]
    async fn test_reconfigure_leaves_original_untouched() {
        let repository = Repository::builder()
            .base_url("http://redirect.test/v1")
            .max_redirects(3)
            .build()
            .unwrap();

        let tighter = repository.with_max_redirects(0);
        let moved = repository.with_base_url("http://redirect.test/v2");

        assert_eq!(tighter.max_redirects(), 0);
        assert_eq!(tighter.base_url(), "http://redirect.test/v1");
        assert_eq!(moved.max_redirects(), 3);
        assert_eq!(moved.base_url(), "http://redirect.test/v2");
        assert_eq!(repository.max_redirects(), 3);
        assert_eq!(repository.base_url(), "http://redirect.test/v1");
    }

    #[tokio::test]
    async fn test_reconfigured_base_url_is_validated_per_call() {
        let repository = Repository::builder()
            .base_url("http://redirect.test")
            .build()
            .unwrap()
            .with_base_url("empty");

        let outcome = repository.get("abc").outcome().await;
        assert_eq!(outcome.classified(), Some(ClassifiedError::InvalidUrl));
    }

    #[tokio::test]
    async fn test_default_header_validation() {
        let result = Repository::builder().default_header("bad header", "value");
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }
}
