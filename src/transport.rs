//! HTTP transport with intercepted redirects.
//!
//! The underlying `reqwest` client never follows redirects on its own. Every 3xx
//! response with a `Location` header is handed to a [`RedirectHook`] first, and the
//! next hop is only sent once the hook has allowed it.

use crate::{
    endpoint::RequestDescriptor,
    fetch::{EventSink, JsonObject, RedirectInfo},
    guard::{RedirectDecision, RedirectHook, FOLLOWED_REDIRECT},
    Error, Result,
};
use http::{header::LOCATION, HeaderMap, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// Sends requests and walks redirect chains one hop at a time.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    http_client: reqwest::Client,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport with redirects disabled on the inner client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the client cannot be built.
    pub(crate) fn new(default_headers: HeaderMap, timeout: Option<Duration>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            default_headers,
            timeout,
        })
    }

    /// Performs `request`, consulting `hook` before following each redirect.
    ///
    /// Every allowed redirect is published on `events` before the next hop is sent.
    /// Returns the decoded body of the final response, or `None` when the final
    /// status is anything other than `200 OK`.
    ///
    /// The configured timeout bounds the whole chain, body included.
    pub(crate) async fn send<H>(
        &self,
        request: &RequestDescriptor,
        hook: &mut H,
        events: &EventSink,
    ) -> Result<Option<JsonObject>>
    where
        H: RedirectHook + ?Sized,
    {
        let Some(timeout) = self.timeout else {
            return self.follow(request, hook, events).await;
        };

        match tokio::time::timeout(timeout, self.follow(request, hook, events)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    url = %request.url,
                    timeout_ms = timeout.as_millis(),
                    "Call timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn follow<H>(
        &self,
        request: &RequestDescriptor,
        hook: &mut H,
        events: &EventSink,
    ) -> Result<Option<JsonObject>>
    where
        H: RedirectHook + ?Sized,
    {
        let start_time = Instant::now();
        let mut url = request.url.clone();
        let mut hop = 0usize;

        loop {
            let response = self.execute(request, &url, hop).await?;
            let status = response.status();

            tracing::info!(
                status = status.as_u16(),
                url = %url,
                hop = hop,
                latency_ms = start_time.elapsed().as_millis(),
                "Received HTTP response"
            );

            let Some(target) = redirect_target(&url, status, response.headers()) else {
                tracing::debug!(redirects = hop, "Redirect chain ended");
                return decode(response).await;
            };

            match hook.on_redirect(&target, status) {
                RedirectDecision::Allow(next) => {
                    events.redirected(RedirectInfo {
                        url: next.clone(),
                        method: request.method.clone(),
                        status,
                    });
                    url = next;
                    hop += 1;
                }
                RedirectDecision::RejectCycle => {
                    return Err(Error::CircularRedirect { url: target });
                }
                RedirectDecision::RejectBudgetExceeded => {
                    return Err(Error::MultipleRedirects {
                        followed: followed_count(hop),
                    });
                }
                RedirectDecision::Ignore => return decode(response).await,
            }
        }
    }

    /// Sends a single hop.
    async fn execute(
        &self,
        request: &RequestDescriptor,
        url: &Url,
        hop: usize,
    ) -> Result<reqwest::Response> {
        tracing::debug!(
            method = %request.method,
            url = %url,
            hop = hop,
            "Executing HTTP request"
        );

        let mut builder = self
            .http_client
            .request(request.method.clone(), url.clone());

        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder.send().await.map_err(map_reqwest_error)
    }
}

/// Every hop before the current one was an allowed redirect.
fn followed_count(hop: usize) -> u8 {
    u8::try_from(hop).unwrap_or(u8::MAX)
}

/// Resolves the `Location` of a 3xx response against the URL that produced it.
fn redirect_target(current: &Url, status: StatusCode, headers: &HeaderMap) -> Option<Url> {
    if !status.is_redirection() {
        return None;
    }
    let location = headers.get(LOCATION)?.to_str().ok()?;
    match current.join(location) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(
                location = %location,
                error = %e,
                "Unparsable Location header"
            );
            None
        }
    }
}

/// Turns a terminal response into data.
async fn decode(response: reqwest::Response) -> Result<Option<JsonObject>> {
    let status = response.status();

    if status == FOLLOWED_REDIRECT {
        tracing::warn!(status = status.as_u16(), "Redirect reached the caller");
        return Err(Error::UnexpectedRedirect { status });
    }

    if status != StatusCode::OK {
        tracing::debug!(status = status.as_u16(), "No data for status");
        return Ok(None);
    }

    let raw_body = response.text().await.map_err(map_reqwest_error)?;

    match serde_json::from_str::<Value>(&raw_body) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(other) => {
            tracing::debug!(kind = json_kind(&other), "Body is not a JSON object");
            Ok(None)
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                raw_response = %raw_body,
                "Failed to deserialize response"
            );

            Err(Error::DeserializationFailed {
                raw_response: raw_body,
                serde_error: e.to_string(),
                status,
            })
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn map_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(e)
    }
}
