//! Client for the returns REST endpoints.
//!
//! Requests go through the [`Transport`] trait so the client can be driven by
//! the blocking `reqwest` transport in production and by an in-memory fake in
//! tests.  Error bodies are searched for a `detail` field to build the error
//! message, falling back to the HTTP status.

use std::fmt;

use log::error;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::model::{NewReturn, Recommendation, ReturnFilters, ReturnId, ReturnStatus, ReturnsPage};

/// Path of the returns collection.
pub const RETURNS_PATH: &str = "/api/v1/returns";

/// HTTP method of an [`ApiRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// A request handed to a [`Transport`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Raw response returned by a [`Transport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Creates a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors returned by the client.
#[derive(Debug)]
pub enum ApiError {
    /// The request never produced a response.
    Transport(Box<dyn std::error::Error + Send + Sync>),
    /// The backend answered with a non-success status.
    Status { status: u16, message: String },
    /// The response body was not the expected JSON.
    Decode(serde_json::Error),
    /// The filters could not be encoded as a query string.
    Query(serde_qs::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "Request failed: {err}"),
            Self::Status { message, .. } => f.write_str(message),
            Self::Decode(err) => write!(f, "Unexpected response body: {err}"),
            Self::Query(err) => write!(f, "Invalid filters: {err}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err.as_ref()),
            Self::Status { .. } => None,
            Self::Decode(err) => Some(err),
            Self::Query(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err)
    }
}

impl From<serde_qs::Error> for ApiError {
    fn from(err: serde_qs::Error) -> Self {
        Self::Query(err)
    }
}

/// Sends requests to the backend.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Builds a transport applying the timeout from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ApiError::Transport(Box::new(err)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder
            .send()
            .map_err(|err| ApiError::Transport(Box::new(err)))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|err| ApiError::Transport(Box::new(err)))?;
        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    status: ReturnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

/// Typed access to the returns endpoints.
#[derive(Clone, Debug)]
pub struct ReturnsClient<T = HttpTransport> {
    config: ClientConfig,
    transport: T,
}

impl ReturnsClient<HttpTransport> {
    /// Creates a client talking HTTP to the configured backend.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self { config, transport })
    }
}

impl<T: Transport> ReturnsClient<T> {
    /// Creates a client sending requests through `transport`.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches one page of returns matching `filters`.
    ///
    /// A bare JSON array is accepted as a single page; any other unexpected
    /// shape yields an empty page.
    pub fn get_returns(&self, filters: &ReturnFilters) -> Result<ReturnsPage, ApiError> {
        self.fetch_returns(filters).map_err(|err| {
            error!("Error fetching returns: {err}");
            err
        })
    }

    fn fetch_returns(&self, filters: &ReturnFilters) -> Result<ReturnsPage, ApiError> {
        let query = serde_qs::to_string(&filters.normalized())?;
        let url = with_query(self.config.url(RETURNS_PATH), &query);
        let body = self.execute(Method::Get, url, None)?;

        if body.get("data").map_or(false, Value::is_array) {
            return Ok(serde_json::from_value(body)?);
        }
        if body.is_array() {
            return Ok(ReturnsPage::single(serde_json::from_value(body)?));
        }
        Ok(ReturnsPage::default())
    }

    /// Creates a return and returns the backend's representation of it.
    pub fn create_return(&self, new_return: &NewReturn) -> Result<Value, ApiError> {
        let body = serde_json::to_value(new_return)?;
        self.execute(Method::Post, self.config.url(RETURNS_PATH), Some(body))
            .map_err(|err| {
                error!("Error creating return: {err}");
                err
            })
    }

    /// Moves return `id` to `status`, with optional reviewer notes.
    pub fn update_return_status(
        &self,
        id: &ReturnId,
        status: ReturnStatus,
        notes: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = self.config.url(&format!("{RETURNS_PATH}/{id}/status"));
        let body = serde_json::to_value(StatusUpdate { status, notes })?;
        self.execute(Method::Put, url, Some(body)).map_err(|err| {
            error!("Error updating return status: {err}");
            err
        })
    }

    /// Fetches AI recommendations, asking the backend to regenerate them when
    /// `force_refresh` is set.
    pub fn get_recommendations(&self, force_refresh: bool) -> Result<Vec<Recommendation>, ApiError> {
        let query = if force_refresh { "force_refresh=true" } else { "" };
        let url = with_query(self.config.url(&format!("{RETURNS_PATH}/recommendations")), query);

        let result = self.execute(Method::Get, url, None).and_then(|body| {
            match body.get("recommendations") {
                Some(list) if list.is_array() => Ok(serde_json::from_value(list.clone())?),
                _ => Ok(Vec::new()),
            }
        });
        result.map_err(|err| {
            error!("Error fetching recommendations: {err}");
            err
        })
    }

    fn execute(&self, method: Method, url: String, body: Option<Value>) -> Result<Value, ApiError> {
        let request = ApiRequest {
            method,
            url,
            headers: self.headers(),
            body,
        };
        let response = self.transport.send(&request)?;

        if !response.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                message: error_message(response.status, &response.body),
            });
        }

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_owned(), "application/json".to_owned())];
        if let Some(token) = &self.config.token {
            headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
        }
        headers
    }
}

fn with_query(url: String, query: &str) -> String {
    if query.is_empty() {
        url
    } else {
        format!("{url}?{query}")
    }
}

/// Message for a failed response: the body's `detail` when present, the status otherwise.
pub fn error_message(status: u16, body: &[u8]) -> String {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());

    match detail {
        Some(Value::String(text)) if !text.is_empty() => text,
        Some(Value::Null) | Some(Value::String(_)) | None => {
            format!("HTTP error! status: {status}")
        }
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_preferred() {
        assert_eq!(
            error_message(400, br#"{"detail":"Invalid status transition"}"#),
            "Invalid status transition"
        );
    }

    #[test]
    fn status_is_the_fallback() {
        assert_eq!(error_message(502, b"<html>Bad gateway</html>"), "HTTP error! status: 502");
        assert_eq!(error_message(404, br#"{"message":"nope"}"#), "HTTP error! status: 404");
        assert_eq!(error_message(500, b""), "HTTP error! status: 500");
    }

    #[test]
    fn structured_detail_is_serialized() {
        let message = error_message(422, br#"{"detail":[{"loc":["body","status"]}]}"#);
        assert!(message.contains("loc"));
    }

    #[test]
    fn query_is_appended_only_when_present() {
        assert_eq!(with_query("http://h/x".into(), ""), "http://h/x");
        assert_eq!(with_query("http://h/x".into(), "a=1"), "http://h/x?a=1");
    }
}
