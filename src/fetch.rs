//! The asynchronous handle returned by [`Repository::get`](crate::Repository::get).
//!
//! A fetch reports its progress as a sequence of [`Event`]s: zero or more
//! [`Event::Redirected`], then exactly one terminal [`Event::Data`] or
//! [`Event::Failed`]. After the terminal event the channel is closed.

use crate::{ClassifiedError, Error, Result};
use http::{Method, StatusCode};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// A decoded top-level JSON object.
pub type JsonObject = Map<String, Value>;

/// A redirect that the guard allowed and the transport followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectInfo {
    /// The new target URL.
    pub url: Url,
    /// The method used for the follow-up request.
    pub method: Method,
    /// The status of the redirect response.
    pub status: StatusCode,
}

/// One step in the life of a fetch.
#[derive(Debug)]
pub enum Event {
    /// A redirect was allowed and is being followed.
    Redirected(RedirectInfo),

    /// The call finished. Holds the decoded object for a `200 OK` JSON object
    /// body, `None` for any other terminal status.
    Data(Option<JsonObject>),

    /// The call failed.
    Failed(Error),
}

impl Event {
    /// Returns `true` for [`Event::Data`] and [`Event::Failed`].
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Redirected(_))
    }
}

/// Producer side of a fetch, used by the transport and the repository.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    pub(crate) fn redirected(&self, info: RedirectInfo) {
        self.publish(Event::Redirected(info));
    }

    pub(crate) fn finish(self, result: Result<Option<JsonObject>>) {
        match result {
            Ok(data) => self.publish(Event::Data(data)),
            Err(e) => self.publish(Event::Failed(e)),
        }
    }

    fn publish(&self, event: Event) {
        // A closed receiver means the caller dropped the handle; nothing to do.
        if self.tx.send(event).is_err() {
            tracing::trace!("Fetch handle dropped, event discarded");
        }
    }
}

pub(crate) fn channel() -> (EventSink, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

/// Handle to an in-flight fetch.
///
/// Dropping the handle aborts the fetch.
///
/// # Examples
///
/// ```no_run
/// use hopguard::{Event, Repository};
///
/// # async fn example() -> Result<(), hopguard::Error> {
/// let repository = Repository::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// let mut fetch = repository.get("5e0af46b");
/// while let Some(event) = fetch.next().await {
///     match event {
///         Event::Redirected(info) => println!("-> {}", info.url),
///         Event::Data(data) => println!("data: {:?}", data),
///         Event::Failed(e) => eprintln!("failed: {}", e),
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Fetch {
    events: mpsc::UnboundedReceiver<Event>,
    task: Option<JoinHandle<()>>,
    done: bool,
}

impl Fetch {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<Event>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            events,
            task,
            done: false,
        }
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the terminal event has been delivered, or if the fetch
    /// was aborted.
    pub async fn next(&mut self) -> Option<Event> {
        if self.done {
            return None;
        }
        let event = self.events.recv().await;
        if !matches!(event, Some(Event::Redirected(_))) {
            self.done = true;
        }
        event
    }

    /// Drains the fetch and collects every event into an [`Outcome`].
    ///
    /// An aborted fetch ends with [`Error::Cancelled`].
    pub async fn outcome(mut self) -> Outcome {
        let mut redirects = Vec::new();
        while let Some(event) = self.next().await {
            match event {
                Event::Redirected(info) => redirects.push(info),
                Event::Data(data) => {
                    return Outcome {
                        redirects,
                        result: Ok(data),
                    }
                }
                Event::Failed(e) => {
                    return Outcome {
                        redirects,
                        result: Err(e),
                    }
                }
            }
        }
        Outcome {
            redirects,
            result: Err(Error::Cancelled),
        }
    }

    /// Aborts the fetch. No further events are delivered.
    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.events.close();
        self.done = true;
    }

    /// Returns `true` once no further events will be delivered.
    pub fn is_finished(&self) -> bool {
        self.done
    }
}

impl Drop for Fetch {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Everything a fetch produced.
#[derive(Debug)]
pub struct Outcome {
    /// Redirects followed, in order.
    pub redirects: Vec<RedirectInfo>,
    /// The terminal result.
    pub result: Result<Option<JsonObject>>,
}

impl Outcome {
    /// The classified failure, if the fetch ended in one.
    pub fn classified(&self) -> Option<ClassifiedError> {
        self.result.as_ref().err().and_then(Error::classify)
    }

    /// The decoded object, if the fetch produced one.
    pub fn data(&self) -> Option<&JsonObject> {
        self.result.as_ref().ok().and_then(Option::as_ref)
    }

    /// Returns `true` if the fetch finished without an error.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(path: &str) -> RedirectInfo {
        RedirectInfo {
            url: Url::parse("http://redirect.test/").unwrap().join(path).unwrap(),
            method: Method::GET,
            status: StatusCode::MOVED_PERMANENTLY,
        }
    }

    #[tokio::test]
    async fn test_events_end_after_terminal() {
        let (sink, rx) = channel();
        sink.redirected(info("/a"));
        sink.clone().finish(Ok(None));
        // Published after the terminal event; must never be observed.
        sink.redirected(info("/b"));

        let mut fetch = Fetch::new(rx, None);
        assert!(matches!(fetch.next().await, Some(Event::Redirected(_))));
        assert!(matches!(fetch.next().await, Some(Event::Data(None))));
        assert!(fetch.is_finished());
        assert!(fetch.next().await.is_none());
    }

    #[tokio::test]
    async fn test_outcome_collects_redirects_and_failure() {
        let (sink, rx) = channel();
        sink.redirected(info("/a"));
        sink.redirected(info("/b"));
        sink.finish(Err(Error::MultipleRedirects { followed: 2 }));

        let outcome = Fetch::new(rx, None).outcome().await;
        assert_eq!(outcome.redirects, vec![info("/a"), info("/b")]);
        assert_eq!(outcome.classified(), Some(ClassifiedError::MultipleRedirects));
        assert!(outcome.data().is_none());
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_outcome_without_terminal_is_cancelled() {
        let (sink, rx) = channel();
        sink.redirected(info("/a"));
        drop(sink);

        let outcome = Fetch::new(rx, None).outcome().await;
        assert_eq!(outcome.redirects.len(), 1);
        assert!(matches!(outcome.result, Err(Error::Cancelled)));
        assert_eq!(outcome.classified(), None);
    }

    #[tokio::test]
    async fn test_abort_stops_delivery() {
        let (sink, rx) = channel();
        let mut fetch = Fetch::new(rx, None);
        fetch.abort();
        sink.finish(Ok(None));

        assert!(fetch.next().await.is_none());
    }
}
