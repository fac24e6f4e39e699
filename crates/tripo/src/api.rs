//! HTTP job client for the generation provider.
//!
//! Wraps the provider's task endpoints (job submission and status
//! lookup) using [`reqwest`]. The client holds no credential state: the
//! API key is an explicit argument on every call, so concurrent requests
//! for different users cannot cross-contaminate.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::task::{JobType, RemoteJob};

/// Errors from the provider client layer.
#[derive(Debug, thiserror::Error)]
pub enum TripoApiError {
    /// Missing or rejected API credential. Not retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Malformed request parameters (caller bug). Not retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The referenced task is unknown to the provider.
    #[error("Task not found: {0}")]
    NotFound(String),

    /// The provider returned a non-2xx status or a non-zero envelope code.
    #[error("Provider error ({status}): {body}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Raw response body (or envelope message) for debugging.
        body: String,
    },

    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Job requests
// ---------------------------------------------------------------------------

/// A typed job-creation request, serialized as the provider's
/// internally-tagged task body.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobRequest {
    /// Generate a draft mesh from a text prompt, optionally steered by a
    /// style reference image.
    TextToModel {
        prompt: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        style_image_url: Option<String>,
    },

    /// Check whether a generated mesh can be rigged.
    AnimatePrerigCheck { original_model_task_id: String },

    /// Rig a generated mesh.
    AnimateRig { original_model_task_id: String },

    /// Retarget one animation preset onto a rigged mesh.
    AnimateRetarget {
        original_model_task_id: String,
        animation: String,
    },
}

impl JobRequest {
    /// The job type this request creates.
    pub fn job_type(&self) -> JobType {
        match self {
            JobRequest::TextToModel { .. } => JobType::TextToModel,
            JobRequest::AnimatePrerigCheck { .. } => JobType::AnimatePrerigCheck,
            JobRequest::AnimateRig { .. } => JobType::AnimateRig,
            JobRequest::AnimateRetarget { .. } => JobType::AnimateRetarget,
        }
    }

    /// Reject requests the provider would bounce anyway: blank prompts,
    /// blank upstream task ids, blank animation names.
    fn validate(&self) -> Result<(), TripoApiError> {
        fn require(value: &str, what: &str) -> Result<(), TripoApiError> {
            if value.trim().is_empty() {
                Err(TripoApiError::Validation(format!(
                    "{what} must not be empty"
                )))
            } else {
                Ok(())
            }
        }

        match self {
            JobRequest::TextToModel { prompt, .. } => require(prompt, "prompt"),
            JobRequest::AnimatePrerigCheck {
                original_model_task_id,
            }
            | JobRequest::AnimateRig {
                original_model_task_id,
            } => require(original_model_task_id, "original_model_task_id"),
            JobRequest::AnimateRetarget {
                original_model_task_id,
                animation,
            } => {
                require(original_model_task_id, "original_model_task_id")?;
                require(animation, "animation")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JobClient trait
// ---------------------------------------------------------------------------

/// Object-safe seam over the provider's two operations.
///
/// [`TripoApi`] is the production implementation; orchestration tests
/// script their own.
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Create a remote job. Returns the job in the `Queued` state.
    async fn submit(
        &self,
        credential: &str,
        request: &JobRequest,
    ) -> Result<RemoteJob, TripoApiError>;

    /// Fetch the current state of a previously submitted job.
    async fn get_status(&self, credential: &str, task_id: &str)
        -> Result<RemoteJob, TripoApiError>;
}

// ---------------------------------------------------------------------------
// TripoApi
// ---------------------------------------------------------------------------

/// Every provider response is wrapped in `{code, message?, data?}`;
/// `code` 0 means success even on HTTP 200.
///
/// The optional fields deliberately carry no `#[serde(default)]`: serde
/// already treats a missing `Option` as `None`, and the attribute would
/// force a `T: Default` bound onto the derived `Deserialize` impl.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    task_id: String,
}

/// HTTP client for the provider's task API.
pub struct TripoApi {
    client: reqwest::Client,
    api_url: String,
}

impl TripoApi {
    /// Create a new client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://api.tripo3d.ai`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (connection pooling across callers).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    fn check_credential(credential: &str) -> Result<(), TripoApiError> {
        if credential.trim().is_empty() {
            return Err(TripoApiError::Auth("missing API credential".to_string()));
        }
        Ok(())
    }

    /// Map a non-2xx response onto the error taxonomy.
    async fn classify_failure(response: reqwest::Response) -> TripoApiError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        match status.as_u16() {
            401 | 403 => TripoApiError::Auth(body),
            400 => TripoApiError::Validation(body),
            404 => TripoApiError::NotFound(body),
            code => TripoApiError::Provider { status: code, body },
        }
    }

    /// Parse a response through the `{code, data}` envelope.
    async fn parse_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TripoApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_failure(response).await);
        }
        let envelope: Envelope<T> = response.json().await?;
        if envelope.code != 0 {
            return Err(TripoApiError::Provider {
                status: status.as_u16(),
                body: format!(
                    "provider code {}: {}",
                    envelope.code,
                    envelope.message.unwrap_or_default()
                ),
            });
        }
        envelope.data.ok_or_else(|| TripoApiError::Provider {
            status: status.as_u16(),
            body: "response envelope carried no data".to_string(),
        })
    }
}

#[async_trait]
impl JobClient for TripoApi {
    async fn submit(
        &self,
        credential: &str,
        request: &JobRequest,
    ) -> Result<RemoteJob, TripoApiError> {
        Self::check_credential(credential)?;
        request.validate()?;

        let response = self
            .client
            .post(format!("{}/v2/openapi/task", self.api_url))
            .bearer_auth(credential)
            .json(request)
            .send()
            .await?;

        let data: SubmitData = Self::parse_envelope(response).await?;
        tracing::info!(
            task_id = %data.task_id,
            job_type = %request.job_type(),
            "Submitted job to provider",
        );

        Ok(RemoteJob::queued(data.task_id, request.job_type()))
    }

    async fn get_status(
        &self,
        credential: &str,
        task_id: &str,
    ) -> Result<RemoteJob, TripoApiError> {
        Self::check_credential(credential)?;
        if task_id.trim().is_empty() {
            return Err(TripoApiError::Validation(
                "task_id must not be empty".to_string(),
            ));
        }

        let response = self
            .client
            .get(format!("{}/v2/openapi/task/{}", self.api_url, task_id))
            .bearer_auth(credential)
            .send()
            .await?;

        Self::parse_envelope(response).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
