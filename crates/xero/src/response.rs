//! Materialized response snapshot consumed by the error translators.

use reqwest::header::{HeaderMap, CONTENT_TYPE};

/// Encoding assumed when the response does not declare a charset.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// A fully materialized HTTP response.
///
/// The HTTP layer reads the body before handing the response over, so error
/// translation never performs I/O. The snapshot is immutable; errors built
/// from it keep it around for caller inspection.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    text: String,
    encoding: String,
    request: Option<RequestSummary>,
}

impl Response {
    /// Create a snapshot from already-materialized parts.
    pub fn new(status: u16, headers: HeaderMap, text: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            text: text.into(),
            encoding: DEFAULT_ENCODING.to_owned(),
            request: None,
        }
    }

    /// Snapshot a `reqwest` response, reading the whole body.
    ///
    /// The encoding is taken from the `charset` parameter of the
    /// `content-type` header when present. The originating request is not
    /// recoverable from a `reqwest::Response`; attach it with
    /// [`Response::with_request`] if diagnostics should carry it.
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let encoding = charset(&headers).unwrap_or_else(|| DEFAULT_ENCODING.to_owned());
        let text = response.text().await?;

        Ok(Self {
            status,
            headers,
            text,
            encoding,
            request: None,
        })
    }

    /// Set the declared byte encoding of the body.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Attach the originating request for diagnostic output.
    pub fn with_request(mut self, request: RequestSummary) -> Self {
        self.request = Some(request);
        self
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The `content-type` header value, or an empty string if absent or not
    /// valid ASCII.
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    /// Body decoded as text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Declared byte encoding of the body.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The originating request, if the HTTP layer attached it.
    pub fn request(&self) -> Option<&RequestSummary> {
        self.request.as_ref()
    }
}

/// The request that produced a failed response, kept for diagnostics only.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    method: String,
    url: String,
    body: Option<String>,
}

impl RequestSummary {
    /// Describe a request by method and URL.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: None,
        }
    }

    /// Attach the request body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request body, if attached.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Extract the `charset` parameter of the `content-type` header.
fn charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .next()
        .map(|value| value.trim_matches('"').to_ascii_lowercase())
}
