//! Declared remote endpoints and their most recent probe outcome

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::redaction::display_header_value;

/// HTTP methods an endpoint may be probed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether requests with this method carry a body
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Health of an endpoint as of its most recent probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    /// Never probed
    #[default]
    Unknown,
    /// Last probe returned an acceptable outcome
    Working,
    /// Last probe errored or returned an unacceptable status
    Failed,
    /// Intentionally retired; never probed, never changes
    Deprecated,
}

impl EndpointStatus {
    /// Whether a probe (or retirement) has settled this status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EndpointStatus::Unknown)
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EndpointStatus::Unknown => "unknown",
            EndpointStatus::Working => "working",
            EndpointStatus::Failed => "failed",
            EndpointStatus::Deprecated => "deprecated",
        };
        f.write_str(label)
    }
}

/// The (latency, status, error) triple produced by one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointOutcome {
    pub status: EndpointStatus,
    pub latency: Duration,
    pub error: String,
}

impl EndpointOutcome {
    pub fn working(latency: Duration) -> Self {
        Self {
            status: EndpointStatus::Working,
            latency,
            error: String::new(),
        }
    }

    pub fn failed(latency: Duration, error: impl Into<String>) -> Self {
        Self {
            status: EndpointStatus::Failed,
            latency,
            error: error.into(),
        }
    }
}

/// A remote operation a provider exposes for health checking
///
/// `path` and `method` are fixed at construction. The outcome fields start at
/// `Unknown`/zero/empty and change only through a validation pass.
#[derive(Clone, PartialEq, Serialize)]
pub struct Endpoint {
    path: String,
    method: HttpMethod,
    description: String,
    #[serde(skip)]
    headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_params: Option<serde_json::Value>,
    status: EndpointStatus,
    latency: Duration,
    #[serde(skip_serializing_if = "String::is_empty")]
    error: String,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            description: String::new(),
            headers: Vec::new(),
            test_params: None,
            status: EndpointStatus::Unknown,
            latency: Duration::ZERO,
            error: String::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a static header; values may embed the credential
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Payload template sent when probing
    pub fn with_test_params(mut self, params: serde_json::Value) -> Self {
        self.test_params = Some(params);
        self
    }

    /// Mark the endpoint as retired
    pub fn deprecated(mut self) -> Self {
        self.status = EndpointStatus::Deprecated;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn test_params(&self) -> Option<&serde_json::Value> {
        self.test_params.as_ref()
    }

    pub fn status(&self) -> EndpointStatus {
        self.status
    }

    /// Duration of the most recent probe
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Failure reason of the most recent probe; empty unless failed
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn is_deprecated(&self) -> bool {
        self.status == EndpointStatus::Deprecated
    }

    /// Replace the previous outcome wholesale. Deprecated endpoints ignore outcomes.
    pub(crate) fn record(&mut self, outcome: EndpointOutcome) {
        if self.is_deprecated() {
            return;
        }
        self.latency = outcome.latency;
        self.status = outcome.status;
        self.error = outcome.error;
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, String)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                let shown = display_header_value(name, value).into_owned();
                (name.as_str(), shown)
            })
            .collect();

        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("description", &self.description)
            .field("headers", &headers)
            .field("test_params", &self.test_params)
            .field("status", &self.status)
            .field("latency", &self.latency)
            .field("error", &self.error)
            .finish()
    }
}

/// A provider's endpoint records, shared by handle
///
/// Clones point at the same records, so outcomes written by a validation pass
/// are visible through every handle the provider has given out.
#[derive(Clone, Default)]
pub struct EndpointList {
    inner: Arc<RwLock<Vec<Endpoint>>>,
}

impl EndpointList {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(endpoints)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Copy of the current records
    pub fn snapshot(&self) -> Vec<Endpoint> {
        self.inner.read().clone()
    }

    pub fn get(&self, index: usize) -> Option<Endpoint> {
        self.inner.read().get(index).cloned()
    }

    /// Status of every endpoint, in declaration order
    pub fn statuses(&self) -> Vec<EndpointStatus> {
        self.inner.read().iter().map(Endpoint::status).collect()
    }

    /// Whether both handles refer to the same underlying records
    pub fn ptr_eq(&self, other: &EndpointList) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Write a batch of outcomes back under a single write lock
    pub(crate) fn apply(&self, outcomes: Vec<(usize, EndpointOutcome)>) {
        let mut endpoints = self.inner.write();
        for (index, outcome) in outcomes {
            if let Some(endpoint) = endpoints.get_mut(index) {
                endpoint.record(outcome);
            }
        }
    }
}

impl fmt::Debug for EndpointList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.read().iter()).finish()
    }
}

/// Build-once holder for a provider's endpoint list
#[derive(Default)]
pub struct EndpointCache {
    cell: OnceCell<EndpointList>,
}

impl EndpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached list, building it on first use
    pub fn get_or_build<F>(&self, build: F) -> EndpointList
    where
        F: FnOnce() -> Vec<Endpoint>,
    {
        self.cell.get_or_init(|| EndpointList::new(build())).clone()
    }

    pub fn is_built(&self) -> bool {
        self.cell.get().is_some()
    }
}
