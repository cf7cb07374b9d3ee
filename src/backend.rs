//! The LLM inference boundary.
//!
//! The engine only ever issues synchronous text-completion requests through
//! [`CompletionBackend`]; which model answers them is configuration. The
//! crate ships [`ScriptedBackend`] for tests and, behind the `http-backend`
//! feature, an OpenAI-compatible HTTP client.

use async_trait::async_trait;
use miette::Diagnostic;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::Mutex;

/// A text-completion request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    /// The fully rendered prompt.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sequences at which generation must stop.
    pub stop_sequences: Vec<String>,
}

/// A text-completion response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionResponse {
    /// The raw generated text, unparsed.
    pub text: String,
}

/// Errors surfaced by a completion backend.
///
/// All of these are fatal to the current run: the engine does not retry
/// backend failures (the only reasoner-level retry is the one-shot
/// correction re-prompt for unparsable output, which is not a backend
/// error).
#[derive(Debug, Error, Diagnostic)]
pub enum BackendError {
    /// The backend endpoint could not be reached.
    #[error("backend unreachable: {message}")]
    #[diagnostic(
        code(reagent::backend::unreachable),
        help("Check the backend endpoint configuration and that the model server is up.")
    )]
    Unreachable { message: String },

    /// The backend answered with something other than a completion.
    #[error("backend protocol error: {message}")]
    #[diagnostic(code(reagent::backend::protocol))]
    Protocol { message: String },

    /// A scripted backend ran out of queued responses.
    #[error("scripted backend has no more responses")]
    #[diagnostic(
        code(reagent::backend::script_exhausted),
        help("Queue one response per expected reasoner call when scripting a test.")
    )]
    ScriptExhausted,
}

/// Issues one completion request and returns the raw generated text.
///
/// Implementations must be safe for concurrent use; the engine may share one
/// backend across concurrent runs.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, BackendError>;
}

/// A backend that replays a fixed queue of responses.
///
/// The workhorse of the test suite: queue one canned reply per expected
/// reasoner call and the control loop becomes fully deterministic. Prompts
/// seen by the backend are recorded for assertions on rendering and
/// truncation.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Build a backend from a sequence of canned responses.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt this backend has been asked to complete, in order.
    pub async fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Number of canned responses not yet consumed.
    pub async fn remaining(&self) -> usize {
        self.responses.lock().await.len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        self.prompts.lock().await.push(request.prompt);
        let next = self.responses.lock().await.pop_front();
        match next {
            Some(text) => Ok(CompletionResponse { text }),
            None => Err(BackendError::ScriptExhausted),
        }
    }
}

/// A backend that always fails as unreachable; for exercising the fatal
/// reasoning-failure path in tests.
#[derive(Debug, Default)]
pub struct UnreachableBackend;

#[async_trait]
impl CompletionBackend for UnreachableBackend {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        Err(BackendError::Unreachable {
            message: "no backend configured".to_string(),
        })
    }
}

#[cfg(feature = "http-backend")]
pub use http::HttpCompletionBackend;

#[cfg(feature = "http-backend")]
mod http {
    //! OpenAI-compatible `/v1/completions` client.

    use super::{BackendError, CompletionBackend, CompletionRequest, CompletionResponse};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize)]
    struct ApiRequest<'a> {
        model: &'a str,
        prompt: &'a str,
        max_tokens: u32,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        stop: Vec<String>,
    }

    #[derive(Deserialize)]
    struct ApiResponse {
        choices: Vec<ApiChoice>,
    }

    #[derive(Deserialize)]
    struct ApiChoice {
        text: String,
    }

    /// HTTP completion client for OpenAI-compatible endpoints (vLLM,
    /// llama.cpp server, Ollama, hosted gateways).
    pub struct HttpCompletionBackend {
        client: reqwest::Client,
        base_url: String,
        model: String,
        api_key: Option<String>,
    }

    impl HttpCompletionBackend {
        /// Create a client for the given endpoint and model.
        pub fn new(
            base_url: impl Into<String>,
            model: impl Into<String>,
            api_key: Option<String>,
            request_timeout: Duration,
        ) -> Result<Self, BackendError> {
            let client = reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .map_err(|e| BackendError::Unreachable {
                    message: format!("failed to build HTTP client: {e}"),
                })?;
            Ok(Self {
                client,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                model: model.into(),
                api_key,
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for HttpCompletionBackend {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, BackendError> {
            let url = format!("{}/v1/completions", self.base_url);
            let body = ApiRequest {
                model: &self.model,
                prompt: &request.prompt,
                max_tokens: request.max_tokens,
                stop: request.stop_sequences.clone(),
            };

            let mut http_request = self.client.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                http_request = http_request.bearer_auth(key);
            }

            let response = http_request
                .send()
                .await
                .map_err(|e| BackendError::Unreachable {
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(BackendError::Protocol {
                    message: format!("{url} returned {status}: {detail}"),
                });
            }

            let parsed: ApiResponse =
                response.json().await.map_err(|e| BackendError::Protocol {
                    message: format!("malformed completion payload: {e}"),
                })?;
            let choice = parsed
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| BackendError::Protocol {
                    message: "completion payload had no choices".to_string(),
                })?;
            Ok(CompletionResponse { text: choice.text })
        }
    }
}
