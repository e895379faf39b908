//! Typed response and error handling for the Xero accounting API.
//!
//! Pair this crate with your own HTTP client: materialize a failed response
//! into a [`Response`] snapshot, then translate it with
//! [`ApiError::from_response`] (or a per-status constructor) and match on
//! the variant.
//!
//! # Example
//!
//! ```rust,no_run
//! use xero::{ApiError, Response};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let http = reqwest::Client::new();
//! let raw = http
//!     .get("https://api.xero.com/api.xro/2.0/Invoices")
//!     .send()
//!     .await?;
//!
//! if !raw.status().is_success() {
//!     let rate_limited = raw.headers().contains_key("x-rate-limit-problem");
//!     let response = Response::from_reqwest(raw).await?;
//!
//!     match ApiError::from_response(response, rate_limited)? {
//!         ApiError::Unauthorized(details) => eprintln!("auth failed: {}", details.message()),
//!         ApiError::BadRequest(details) => {
//!             for error in details.errors() {
//!                 eprintln!("validation: {error}");
//!             }
//!         }
//!         ApiError::RateLimitExceeded(_) => eprintln!("back off and retry later"),
//!         other => return Err(other.into()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod body;
mod error;
mod response;

pub use body::DecodeError;
pub use error::{ApiError, Details};
pub use response::{RequestSummary, Response, DEFAULT_ENCODING};
