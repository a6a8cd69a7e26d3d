// crates/bentham-surfaces/src/rest.rs
// ============================================================================
// Module: REST Surface Adapter
// Description: Chat-completion adapter for JSON HTTP surfaces.
// Purpose: Execute queries against REST APIs with strict limits.
// Dependencies: bentham-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! The REST adapter covers the API family of surfaces: one bounded POST
//! per query against a chat-completion style endpoint. It enforces scheme
//! restrictions, disables redirects, caps response bodies, and classifies
//! HTTP failures into the stable failure taxonomy. Response payloads are
//! untrusted; parsing fails closed into `UNKNOWN`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use bentham_core::AdapterFailure;
use bentham_core::AdapterResponse;
use bentham_core::CancellationToken;
use bentham_core::EvidenceLevel;
use bentham_core::FailureKind;
use bentham_core::QueryRequest;
use bentham_core::SurfaceAdapter;
use bentham_core::TokenUsage;
use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for a REST surface.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` endpoints.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RestSurfaceConfig {
    /// Chat-completion endpoint URL.
    pub endpoint: String,
    /// Default model requested when the query has no override.
    pub model: String,
    /// Bearer token sent in the `Authorization` header when set.
    pub bearer_token: Option<String>,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for RestSurfaceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: "default".to_string(),
            bearer_token: None,
            allow_http: false,
            timeout_ms: 30_000,
            max_response_bytes: 1024 * 1024,
            user_agent: "bentham/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// REST chat-completion surface adapter.
///
/// # Invariants
/// - Redirects are not followed.
/// - Responses exceeding configured limits fail closed.
pub struct RestSurfaceAdapter {
    /// Adapter configuration, including limits and policy.
    config: RestSurfaceConfig,
    /// Validated endpoint URL.
    endpoint: Url,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl RestSurfaceAdapter {
    /// Creates a new REST adapter with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterFailure`] when the endpoint is invalid or the HTTP
    /// client cannot be created.
    pub fn new(config: RestSurfaceConfig) -> Result<Self, AdapterFailure> {
        let endpoint = Url::parse(&config.endpoint).map_err(|_| {
            AdapterFailure::new(FailureKind::Unknown, "invalid endpoint url")
        })?;
        match endpoint.scheme() {
            "https" => {}
            "http" if config.allow_http => {}
            _ => {
                return Err(AdapterFailure::new(
                    FailureKind::Unknown,
                    "unsupported endpoint scheme",
                ));
            }
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| AdapterFailure::new(FailureKind::Unknown, "http client build failed"))?;
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    /// Sends one chat-completion request and parses the response.
    async fn send_query(&self, request: &QueryRequest) -> Result<AdapterResponse, AdapterFailure> {
        let started = Instant::now();
        let body = build_request_body(&self.config.model, request);
        let mut outbound = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.config.bearer_token {
            outbound = outbound.bearer_auth(token);
        }
        let response = outbound.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }
        let bytes = read_body_limited(response, self.config.max_response_bytes).await?;
        let elapsed = duration_millis(started);
        parse_completion(&bytes, elapsed, request.evidence_level)
    }
}

#[async_trait]
impl SurfaceAdapter for RestSurfaceAdapter {
    async fn query(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure> {
        tokio::select! {
            outcome = self.send_query(request) => outcome,
            () = cancel.cancelled() => {
                Err(AdapterFailure::new(FailureKind::Cancelled, "query cancelled"))
            }
        }
    }

    async fn health_check(&self) -> Result<(), AdapterFailure> {
        let probe = QueryRequest {
            query: "ping".to_string(),
            model: None,
            system_prompt: None,
            history: Vec::new(),
            temperature: Some(0.0),
            max_tokens: Some(1),
            location: None,
            evidence_level: EvidenceLevel::Metadata,
            session_id: bentham_core::SessionId::new("sess_health"),
            options: None,
        };
        self.send_query(&probe).await.map(|_| ())
    }

    async fn close(&self) {}
}

// ============================================================================
// SECTION: Request Body
// ============================================================================

/// Builds the chat-completion request body.
fn build_request_body(default_model: &str, request: &QueryRequest) -> Value {
    let mut messages = Vec::new();
    if let Some(system_prompt) = &request.system_prompt {
        messages.push(json!({"role": "system", "content": system_prompt}));
    }
    for turn in &request.history {
        messages.push(json!({"role": turn.role, "content": turn.content}));
    }
    messages.push(json!({"role": "user", "content": request.query}));
    let mut body = json!({
        "model": request.model.as_deref().unwrap_or(default_model),
        "messages": messages,
    });
    if let Some(temperature) = request.temperature
        && let Some(map) = body.as_object_mut()
    {
        map.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = request.max_tokens
        && let Some(map) = body.as_object_mut()
    {
        map.insert("max_tokens".to_string(), json!(max_tokens));
    }
    body
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classifies transport-level request failures.
fn classify_transport_error(err: reqwest::Error) -> AdapterFailure {
    if err.is_timeout() {
        return AdapterFailure::new(FailureKind::Timeout, "request timed out");
    }
    if err.is_connect() {
        return AdapterFailure::new(FailureKind::NetworkError, "connection failed");
    }
    AdapterFailure::new(FailureKind::NetworkError, "request failed")
}

/// Classifies non-success HTTP statuses.
fn classify_status(status: StatusCode) -> AdapterFailure {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            AdapterFailure::new(FailureKind::RateLimit, "surface rate limit")
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AdapterFailure::new(FailureKind::SessionExpired, "surface rejected credentials")
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            AdapterFailure::new(FailureKind::Timeout, "surface timed out")
        }
        status if status.is_server_error() => {
            AdapterFailure::new(FailureKind::NetworkError, "surface server error")
        }
        _ => AdapterFailure::new(FailureKind::Unknown, "unexpected surface status"),
    }
}

// ============================================================================
// SECTION: Response Handling
// ============================================================================

/// Reads the response body while enforcing a byte limit.
async fn read_body_limited(
    mut response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, AdapterFailure> {
    if let Some(expected) = response.content_length()
        && expected > u64::try_from(max_bytes).unwrap_or(u64::MAX)
    {
        return Err(AdapterFailure::new(
            FailureKind::Unknown,
            "response exceeds size limit",
        ));
    }
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|_| AdapterFailure::new(FailureKind::NetworkError, "failed to read response"))?
    {
        if body.len().saturating_add(chunk.len()) > max_bytes {
            return Err(AdapterFailure::new(
                FailureKind::Unknown,
                "response exceeds size limit",
            ));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Completion payload subset the adapter understands.
#[derive(Debug, Deserialize)]
struct CompletionPayload {
    /// Completion choices; the first is canonical.
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    /// Token usage block when the surface reports it.
    usage: Option<CompletionUsage>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
struct CompletionChoice {
    /// Assistant message for chat-style payloads.
    message: Option<CompletionMessage>,
    /// Plain text for legacy payloads.
    text: Option<String>,
}

/// Assistant message content.
#[derive(Debug, Deserialize)]
struct CompletionMessage {
    /// Message content.
    content: Option<String>,
}

/// Token usage block.
#[derive(Debug, Deserialize)]
struct CompletionUsage {
    /// Input tokens consumed.
    #[serde(default)]
    prompt_tokens: u64,
    /// Output tokens produced.
    #[serde(default)]
    completion_tokens: u64,
    /// Total tokens for the call.
    #[serde(default)]
    total_tokens: u64,
}

/// Parses a completion payload into an adapter response.
fn parse_completion(
    bytes: &[u8],
    duration_ms: u64,
    evidence_level: EvidenceLevel,
) -> Result<AdapterResponse, AdapterFailure> {
    let raw: Value = serde_json::from_slice(bytes)
        .map_err(|_| AdapterFailure::new(FailureKind::Unknown, "response is not json"))?;
    let payload: CompletionPayload = serde_json::from_value(raw.clone())
        .map_err(|_| AdapterFailure::new(FailureKind::Unknown, "unexpected response shape"))?;
    let text = payload
        .choices
        .first()
        .and_then(|choice| {
            choice
                .message
                .as_ref()
                .and_then(|message| message.content.clone())
                .or_else(|| choice.text.clone())
        })
        .ok_or_else(|| AdapterFailure::new(FailureKind::Unknown, "response has no content"))?;
    let token_usage = payload.usage.map(|usage| TokenUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        cost_estimate: 0.0,
    });
    let provenance = match evidence_level {
        EvidenceLevel::Metadata => None,
        EvidenceLevel::Screenshots | EvidenceLevel::Full => Some(raw),
    };
    Ok(AdapterResponse {
        text,
        citations: Vec::new(),
        duration_ms,
        ttfb_ms: None,
        token_usage,
        provenance,
    })
}

/// Returns elapsed milliseconds since the given instant.
fn duration_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests;
