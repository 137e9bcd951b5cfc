//! Per-call redirect bookkeeping.
//!
//! A [`RedirectSession`] decides, for every redirect the server sends, whether the
//! transport may follow it. It enforces the redirect budget and refuses to visit the
//! same target twice. One session belongs to exactly one fetch and is dropped with it.
//!
//! The transport talks to the session through the [`RedirectHook`] trait, which is
//! invoked before a redirect is followed and blocks the hop until it returns.

use http::StatusCode;
use std::collections::HashSet;
use url::Url;

/// The only status code treated as a followable redirect.
pub const FOLLOWED_REDIRECT: StatusCode = StatusCode::MOVED_PERMANENTLY;

/// What the transport should do with an intercepted redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Follow the redirect to the given URL.
    Allow(Url),

    /// The budget is spent. Do not follow; the call fails with
    /// [`Error::MultipleRedirects`](crate::Error::MultipleRedirects).
    RejectBudgetExceeded,

    /// The target was already visited. Do not follow; the call fails with
    /// [`Error::CircularRedirect`](crate::Error::CircularRedirect).
    RejectCycle,

    /// Not a redirect this guard handles. The transport keeps the response as-is.
    Ignore,
}

impl RedirectDecision {
    /// Returns `true` for the two rejecting decisions.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RedirectDecision::RejectBudgetExceeded | RedirectDecision::RejectCycle
        )
    }
}

/// Interception point invoked by the transport before following a redirect.
///
/// # Examples
///
/// ```
/// use hopguard::guard::{RedirectDecision, RedirectHook};
/// use http::StatusCode;
/// use url::Url;
///
/// // Never follow anything off the original host.
/// struct SameHost(String);
///
/// impl RedirectHook for SameHost {
///     fn on_redirect(&mut self, candidate: &Url, _status: StatusCode) -> RedirectDecision {
///         if candidate.host_str() == Some(self.0.as_str()) {
///             RedirectDecision::Allow(candidate.clone())
///         } else {
///             RedirectDecision::Ignore
///         }
///     }
/// }
/// ```
pub trait RedirectHook: Send {
    /// Decides what happens to a redirect to `candidate` answered with `status`.
    fn on_redirect(&mut self, candidate: &Url, status: StatusCode) -> RedirectDecision;
}

/// The mutable redirect state of a single fetch.
///
/// # Examples
///
/// ```
/// use hopguard::guard::{RedirectDecision, RedirectSession};
/// use http::StatusCode;
/// use url::Url;
///
/// let mut session = RedirectSession::new(1);
/// let a = Url::parse("http://example.com/a").unwrap();
/// let b = Url::parse("http://example.com/b").unwrap();
///
/// assert_eq!(
///     session.decide(&a, StatusCode::MOVED_PERMANENTLY),
///     RedirectDecision::Allow(a.clone())
/// );
/// assert_eq!(
///     session.decide(&b, StatusCode::MOVED_PERMANENTLY),
///     RedirectDecision::RejectBudgetExceeded
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RedirectSession {
    seen: HashSet<Url>,
    remaining: u8,
    max: u8,
    rejected: Option<RedirectDecision>,
}

impl RedirectSession {
    /// Creates a session that allows at most `max_redirects` redirects.
    pub fn new(max_redirects: u8) -> Self {
        Self {
            seen: HashSet::new(),
            remaining: max_redirects,
            max: max_redirects,
            rejected: None,
        }
    }

    /// Pre-seeds the set of visited URLs.
    ///
    /// A redirect to any of these URLs is reported as circular on first sight.
    pub fn with_seen(mut self, urls: impl IntoIterator<Item = Url>) -> Self {
        self.seen.extend(urls);
        self
    }

    /// Marks a single URL as visited.
    pub fn mark_seen(&mut self, url: Url) {
        self.seen.insert(url);
    }

    /// Applies the redirect rules to one intercepted redirect.
    ///
    /// Rules, first match wins:
    ///
    /// 1. a status other than `301` is ignored and the session is left untouched;
    /// 2. a target already seen is a cycle;
    /// 3. the target is recorded as seen;
    /// 4. with no budget left the redirect is rejected;
    /// 5. otherwise the budget shrinks by one and the redirect is allowed.
    ///
    /// Once a rejection has been returned the session is finished and repeats that
    /// rejection for every later candidate.
    pub fn decide(&mut self, candidate: &Url, status: StatusCode) -> RedirectDecision {
        if let Some(rejection) = &self.rejected {
            return rejection.clone();
        }

        if status != FOLLOWED_REDIRECT {
            return RedirectDecision::Ignore;
        }

        // Cycle check must precede the budget check.
        if self.seen.contains(candidate) {
            return self.reject(RedirectDecision::RejectCycle);
        }

        self.seen.insert(candidate.clone());

        if self.remaining == 0 {
            return self.reject(RedirectDecision::RejectBudgetExceeded);
        }

        self.remaining -= 1;
        RedirectDecision::Allow(candidate.clone())
    }

    fn reject(&mut self, decision: RedirectDecision) -> RedirectDecision {
        self.rejected = Some(decision.clone());
        decision
    }

    /// Redirects still allowed.
    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    /// The budget the session started with.
    pub fn max_redirects(&self) -> u8 {
        self.max
    }

    /// Redirects allowed so far.
    pub fn followed(&self) -> u8 {
        self.max - self.remaining
    }

    /// Returns `true` if `url` has been visited (or pre-seeded).
    pub fn has_seen(&self, url: &Url) -> bool {
        self.seen.contains(url)
    }

    /// Returns `true` once the session has rejected a redirect.
    pub fn is_finished(&self) -> bool {
        self.rejected.is_some()
    }
}

impl RedirectHook for RedirectSession {
    fn on_redirect(&mut self, candidate: &Url, status: StatusCode) -> RedirectDecision {
        let decision = self.decide(candidate, status);

        match &decision {
            RedirectDecision::Allow(url) => tracing::info!(
                url = %url,
                remaining = self.remaining,
                "Following redirect"
            ),
            RedirectDecision::RejectBudgetExceeded => tracing::warn!(
                url = %candidate,
                max_redirects = self.max,
                "Redirect budget exhausted"
            ),
            RedirectDecision::RejectCycle => tracing::warn!(
                url = %candidate,
                "Circular redirect detected"
            ),
            RedirectDecision::Ignore => tracing::debug!(
                url = %candidate,
                status = status.as_u16(),
                "Redirect status not followed"
            ),
        }

        decision
    }
}
