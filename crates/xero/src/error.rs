//! Typed errors for failed Xero API responses.

use tracing::{debug, warn};

use crate::body::{self, DecodeError};
use crate::response::Response;

/// Error raised when a request to the Xero API fails.
///
/// The HTTP layer picks the variant from the response status code (plus a
/// rate-limit signal for the two 503 conditions) and each constructor parses
/// the body according to the format that status is documented to carry.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An authenticated call was attempted before credential verification
    /// completed. Local precondition; no response exists.
    #[error("Credentials have not been verified")]
    NotVerified,

    /// HTTP 400: the request was malformed or failed validation.
    #[error("Bad request: {0}")]
    BadRequest(Details),

    /// HTTP 401: the OAuth credentials were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(Details),

    /// HTTP 403: the authenticated caller may not touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(Details),

    /// HTTP 404.
    #[error("Not found: {0}")]
    NotFound(Details),

    /// HTTP 415.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(Details),

    /// HTTP 500.
    #[error("Internal server error: {0}")]
    InternalError(Details),

    /// HTTP 501.
    #[error("Not implemented: {0}")]
    NotImplemented(Details),

    /// HTTP 503 with the rate-limit signal set.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(Details),

    /// HTTP 503 without the rate-limit signal.
    #[error("Service not available: {0}")]
    NotAvailable(Details),

    /// Any other failure status.
    #[error("Unexpected API error: {0}")]
    Unknown(Details),
}

impl ApiError {
    /// Translate a failed response into the matching error variant.
    ///
    /// `rate_limited` distinguishes the two HTTP 503 conditions; the HTTP
    /// layer derives it from the response (the `X-Rate-Limit-Problem`
    /// header on current API versions).
    pub fn from_response(response: Response, rate_limited: bool) -> Result<Self, DecodeError> {
        match response.status() {
            400 => Self::bad_request(response),
            401 => Self::unauthorized(response),
            403 => Ok(Self::forbidden(response)),
            404 => Ok(Self::not_found(response)),
            415 => Ok(Self::unsupported_media_type(response)),
            500 => Ok(Self::internal_error(response)),
            501 => Self::not_implemented(response),
            503 if rate_limited => Self::rate_limit_exceeded(response),
            503 => Ok(Self::not_available(response)),
            _ => Ok(Self::unknown(response)),
        }
    }

    /// HTTP 400. Dispatches on the declared content type: a JSON validation
    /// envelope, an urlencoded OAuth problem payload mislabelled as
    /// `text/html`, or an XML document.
    pub fn bad_request(response: Response) -> Result<Self, DecodeError> {
        if response.content_type().starts_with("application/json") {
            let (message, errors) = body::decode_validation_body(response.text())?;
            Ok(Self::BadRequest(Details {
                message,
                errors,
                problem: None,
                response,
            }))
        } else if response.content_type().starts_with("text/html") {
            // The legacy OAuth endpoints answer some bad requests with an
            // urlencoded problem payload labelled text/html.
            warn!(
                status = response.status(),
                "OAuth problem payload arrived as text/html"
            );
            debug!(
                body = %response.text(),
                request = ?response.request(),
                "unexpected text/html error body"
            );
            let oauth = body::decode_oauth_problem(response.text())?;
            Ok(Self::BadRequest(Details {
                message: oauth.advice,
                errors: vec![oauth.problem.clone()],
                problem: Some(oauth.problem),
                response,
            }))
        } else {
            let (message, errors) = body::decode_message_elements(response.text())?;
            let problem = errors.first().cloned();
            Ok(Self::BadRequest(Details {
                message,
                errors,
                problem,
                response,
            }))
        }
    }

    /// HTTP 401. The body is an urlencoded `oauth_problem` payload.
    pub fn unauthorized(response: Response) -> Result<Self, DecodeError> {
        let oauth = body::decode_oauth_problem(response.text())?;
        Ok(Self::Unauthorized(Details {
            message: oauth.advice,
            errors: vec![oauth.problem.clone()],
            problem: Some(oauth.problem),
            response,
        }))
    }

    /// HTTP 403. The body is reported as-is.
    pub fn forbidden(response: Response) -> Self {
        Self::Forbidden(Details::from_text(response))
    }

    /// HTTP 404. The body is reported as-is.
    pub fn not_found(response: Response) -> Self {
        Self::NotFound(Details::from_text(response))
    }

    /// HTTP 415. The body is reported as-is.
    pub fn unsupported_media_type(response: Response) -> Self {
        Self::UnsupportedMediaType(Details::from_text(response))
    }

    /// HTTP 500. The body is reported as-is.
    pub fn internal_error(response: Response) -> Self {
        Self::InternalError(Details::from_text(response))
    }

    /// HTTP 501. The message is the text of the first `Message` element of
    /// the XML body; further messages are not retained.
    pub fn not_implemented(response: Response) -> Result<Self, DecodeError> {
        let (message, _) = body::decode_message_elements(response.text())?;
        Ok(Self::NotImplemented(Details {
            message,
            errors: Vec::new(),
            problem: None,
            response,
        }))
    }

    /// HTTP 503 with the rate-limit signal set.
    ///
    /// A payload without the `oauth_problem` key falls back to the raw body
    /// text and leaves `problem` unset; a payload that has the key but no
    /// `oauth_problem_advice` is still a decode failure.
    pub fn rate_limit_exceeded(response: Response) -> Result<Self, DecodeError> {
        let Some(problem) = body::form_value(response.text(), "oauth_problem") else {
            return Ok(Self::RateLimitExceeded(Details::from_text(response)));
        };
        let advice = body::form_value(response.text(), "oauth_problem_advice")
            .ok_or(DecodeError::MissingOAuthField("oauth_problem_advice"))?;

        Ok(Self::RateLimitExceeded(Details {
            message: advice,
            errors: vec![problem.clone()],
            problem: Some(problem),
            response,
        }))
    }

    /// HTTP 503 without the rate-limit signal. The body is reported as-is.
    pub fn not_available(response: Response) -> Self {
        Self::NotAvailable(Details::from_text(response))
    }

    /// Catch-all for any other failure status. The body is reported as-is.
    pub fn unknown(response: Response) -> Self {
        Self::Unknown(Details::from_text(response))
    }

    /// Payload of the variant, if it carries one.
    pub fn details(&self) -> Option<&Details> {
        match self {
            Self::NotVerified => None,
            Self::BadRequest(details)
            | Self::Unauthorized(details)
            | Self::Forbidden(details)
            | Self::NotFound(details)
            | Self::UnsupportedMediaType(details)
            | Self::InternalError(details)
            | Self::NotImplemented(details)
            | Self::RateLimitExceeded(details)
            | Self::NotAvailable(details)
            | Self::Unknown(details) => Some(details),
        }
    }

    /// Human-readable summary, for variants derived from a response.
    pub fn message(&self) -> Option<&str> {
        self.details().map(Details::message)
    }

    /// Granular validation messages; empty unless the body carried them.
    pub fn validation_errors(&self) -> &[String] {
        self.details().map(Details::errors).unwrap_or_default()
    }

    /// Short machine-oriented problem code, where the body format has one.
    pub fn problem(&self) -> Option<&str> {
        self.details().and_then(Details::problem)
    }

    /// The originating response, for variants derived from one.
    pub fn response(&self) -> Option<&Response> {
        self.details().map(Details::response)
    }
}

/// Payload shared by every response-derived [`ApiError`] variant.
#[derive(Debug, Clone)]
pub struct Details {
    response: Response,
    message: String,
    errors: Vec<String>,
    problem: Option<String>,
}

impl Details {
    /// Payload for the variants that report the raw body text.
    fn from_text(response: Response) -> Self {
        Self {
            message: response.text().to_owned(),
            errors: Vec::new(),
            problem: None,
            response,
        }
    }

    /// The originating response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Human-readable summary.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Granular validation messages, in document order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Short machine-oriented problem code.
    pub fn problem(&self) -> Option<&str> {
        self.problem.as_deref()
    }
}

impl std::fmt::Display for Details {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
