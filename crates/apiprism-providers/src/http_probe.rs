//! HTTP probing and JSON request helpers shared by the built-in adapters

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::context::ProbeContext;
use crate::error::ProviderError;
use crate::models::Endpoint;
use crate::redaction::redact;
use crate::validator::EndpointProbe;

const BODY_EXCERPT_CHARS: usize = 200;
const MAX_ERROR_BODY_BYTES: usize = 8 * 1024;

/// Which HTTP statuses a probe counts as "working"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusPolicy {
    /// Treat 400/422 on a request carrying a synthetic payload as proof the
    /// endpoint exists
    pub accept_bad_request: bool,
}

impl StatusPolicy {
    /// Only 2xx counts as working
    pub fn strict() -> Self {
        Self::default()
    }

    /// 2xx, or 400/422 in reply to a synthetic payload
    pub fn lenient() -> Self {
        Self {
            accept_bad_request: true,
        }
    }

    pub fn accepts(&self, status: StatusCode, sent_payload: bool) -> bool {
        if status.is_success() {
            return true;
        }
        self.accept_bad_request
            && sent_payload
            && matches!(
                status,
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
            )
    }
}

/// Probes an [`Endpoint`] by issuing the HTTP request it describes
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    base_url: String,
    policy: StatusPolicy,
}

impl HttpProbe {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            policy: StatusPolicy::strict(),
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Build the request an endpoint describes
    pub fn build_request(&self, endpoint: &Endpoint) -> Result<RequestBuilder, ProviderError> {
        let url = join_url(&self.base_url, endpoint.path())?;
        let mut request = self.client.request(endpoint.method().into(), url);

        for (name, value) in endpoint.headers() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ProviderError::Setup(format!("invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ProviderError::Setup(format!("invalid value for header '{}'", name.as_str()))
            })?;
            request = request.header(name, value);
        }

        if endpoint.method().has_body() {
            if let Some(params) = endpoint.test_params() {
                request = request.json(params);
            }
        }

        Ok(request)
    }
}

#[async_trait]
impl EndpointProbe for HttpProbe {
    async fn probe(&self, ctx: &ProbeContext, endpoint: &Endpoint) -> Result<(), ProviderError> {
        let request = self.build_request(endpoint)?;
        let sent_payload = endpoint.method().has_body() && endpoint.test_params().is_some();

        trace!(
            "Probing {} {}{}",
            endpoint.method(),
            self.base_url,
            endpoint.path()
        );
        let response = send(ctx, request).await?;
        let status = response.status();

        if self.policy.accepts(status, sent_payload) {
            if !status.is_success() {
                debug!(
                    "Accepting HTTP {} from {} {} as evidence the endpoint exists",
                    status.as_u16(),
                    endpoint.method(),
                    endpoint.path()
                );
            }
            return Ok(());
        }

        Err(status_error(ctx, status, response).await)
    }
}

/// Join a base URL and an endpoint path into a validated URL
pub fn join_url(base_url: &str, path: &str) -> Result<Url, ProviderError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| {
        let message = format!("invalid URL '{}': {}", joined, e);
        ProviderError::Setup(message)
    })
}

/// Send a request, aborting when the context stops
pub async fn send(ctx: &ProbeContext, request: RequestBuilder) -> Result<Response, ProviderError> {
    ctx.run(async { Ok(request.send().await?) }).await
}

/// Send a request and decode a successful JSON body
///
/// Non-success statuses become `Remote` errors; an unparseable body becomes a
/// `Decode` error.
pub async fn send_json<T>(ctx: &ProbeContext, request: RequestBuilder) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
{
    let response = send(ctx, request).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(status_error(ctx, status, response).await);
    }

    let body = ctx.run(async { Ok(response.text().await?) }).await?;
    serde_json::from_str(&body).map_err(|e| {
        let message = format!("unexpected response shape: {}", e);
        ProviderError::Decode(message)
    })
}

/// Send a request and require a success status, ignoring the body
pub async fn send_expect_success(
    ctx: &ProbeContext,
    request: RequestBuilder,
) -> Result<(), ProviderError> {
    let response = send(ctx, request).await?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(status_error(ctx, status, response).await)
    }
}

/// Classify a failure status, reading at most a bounded prefix of the body
///
/// The body read honours the context; a stalled body yields `Cancelled`.
async fn status_error(
    ctx: &ProbeContext,
    status: StatusCode,
    response: Response,
) -> ProviderError {
    let read = read_body_prefix(response, MAX_ERROR_BODY_BYTES);
    let body = match ctx.run(read).await {
        Ok(body) => body,
        Err(ProviderError::Cancelled(reason)) => return ProviderError::Cancelled(reason),
        Err(_) => String::new(),
    };
    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "authentication failed".to_string(),
        StatusCode::TOO_MANY_REQUESTS => "rate limited".to_string(),
        _ => {
            let excerpt = body_excerpt(&body);
            if excerpt.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            } else {
                excerpt
            }
        }
    };
    ProviderError::remote_status(status.as_u16(), message)
}

async fn read_body_prefix(mut response: Response, limit: usize) -> Result<String, ProviderError> {
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        buf.extend_from_slice(&chunk);
        if buf.len() >= limit {
            buf.truncate(limit);
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// First few hundred characters of a body, whitespace-collapsed and redacted
pub fn body_excerpt(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut excerpt: String = collapsed.chars().take(BODY_EXCERPT_CHARS).collect();
    if collapsed.chars().count() > BODY_EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    redact(&excerpt)
}
