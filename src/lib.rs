//! # Hopguard - bounded redirect-following JSON fetches
//!
//! Hopguard issues a GET request, intercepts every server redirect before it is
//! followed, enforces a per-call redirect budget, detects redirect cycles, and
//! delivers the final JSON object (or a classified failure) asynchronously.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hopguard::{Event, Repository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hopguard::Error> {
//!     let repository = Repository::builder()
//!         .base_url("http://www.mocky.io/v2")
//!         .max_redirects(3)
//!         .build()?;
//!
//!     let mut fetch = repository.get("5e0af46b3300007e1120a7ef");
//!     while let Some(event) = fetch.next().await {
//!         match event {
//!             Event::Redirected(info) => println!("redirected to {}", info.url),
//!             Event::Data(Some(data)) => println!("data: {:?}", data),
//!             Event::Data(None) => println!("no data"),
//!             Event::Failed(e) => eprintln!("failed: {}", e),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Redirect rules
//!
//! Only `301 Moved Permanently` is followed. For each one, in order:
//!
//! - a target already visited in this call fails with [`Error::CircularRedirect`],
//!   whatever budget is left;
//! - with the budget spent the call fails with [`Error::MultipleRedirects`];
//! - otherwise the redirect is followed and reported as [`Event::Redirected`].
//!
//! Any other 3xx status is not followed and ends the call without data.
//!
//! ## Error Handling
//!
//! [`Error`] covers every failure. [`Error::classify`] collapses it into the closed
//! [`ClassifiedError`] set (`InvalidUrl`, `MultipleRedirects`, `CircularRedirect`),
//! returning `None` for transport-level problems.
//!
//! ```no_run
//! use hopguard::{ClassifiedError, Repository};
//!
//! # async fn example() -> Result<(), hopguard::Error> {
//! # let repository = Repository::builder().base_url("https://api.example.com").build()?;
//! let outcome = repository.get("id").outcome().await;
//! match outcome.classified() {
//!     Some(ClassifiedError::CircularRedirect) => eprintln!("redirect loop"),
//!     Some(ClassifiedError::MultipleRedirects) => eprintln!("too many redirects"),
//!     Some(ClassifiedError::InvalidUrl) => eprintln!("bad base URL"),
//!     None => println!("{} redirects, data: {:?}", outcome.redirects.len(), outcome.data()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod endpoint;
mod error;
mod fetch;
pub mod guard;
mod repository;
mod transport;

pub use error::{ClassifiedError, Error, Result};
pub use fetch::{Event, Fetch, JsonObject, Outcome, RedirectInfo};
pub use guard::{RedirectDecision, RedirectHook, RedirectSession};
pub use repository::{Repository, RepositoryBuilder, DEFAULT_MAX_REDIRECTS};
