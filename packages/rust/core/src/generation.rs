//! Structured-generation client.
//!
//! One call per record against an OpenAI-compatible chat-completions API,
//! with the model forced to call the `Structure` function whose parameters
//! are the analysis schema. Every call resolves to a [`GenerationOutcome`];
//! nothing here returns an error to the caller.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use paperlens_shared::{AnalysisResult, EnrichConfig, FUNCTION_NAME, PaperLensError, Result};

use crate::recovery::{ARGUMENTS_MARKER, TRAILING_MARKER};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("PaperLens/", env!("CARGO_PKG_VERSION"));

// Prompt templates loaded at compile time
const SYSTEM_PROMPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/system.txt"));
const USER_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/template.txt"));

// ---------------------------------------------------------------------------
// Adapter contract
// ---------------------------------------------------------------------------

/// Input for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Record identifier, used only for log correlation.
    pub record_id: String,
    /// Language the analysis should be written in.
    pub language: String,
    /// Source text to analyze.
    pub content: String,
}

/// What a single generation call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The service returned a schema-conformant analysis.
    Success(AnalysisResult),
    /// The service replied, but its arguments could not be coerced into the
    /// schema. Carries the raw error text, which embeds the arguments.
    SchemaViolation(String),
    /// Anything else: transport failure, timeout, bad status, no tool call.
    OtherFailure(String),
}

/// A structured-generation backend.
///
/// Implementations hold only read-only state and are shared by every worker.
pub trait StructuredGenerator: Send + Sync {
    /// Run one generation call.
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = GenerationOutcome> + Send;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible implementation
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("response carried no `Structure` tool call")]
    NoToolCall,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    /// Build the shared client handle.
    pub fn new(config: &EnrichConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PaperLensError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": render_prompt(USER_TEMPLATE, &request.language, &request.content) },
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": FUNCTION_NAME,
                    "description": "Record the structured analysis of the paper.",
                    "parameters": AnalysisResult::json_schema(),
                }
            }],
            "tool_choice": { "type": "function", "function": { "name": FUNCTION_NAME } },
        })
    }

    /// Send the request and return the raw function arguments.
    async fn call(&self, request: &GenerationRequest) -> std::result::Result<String, CallError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Status {
                status,
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .flat_map(|choice| choice.message.tool_calls)
            .find(|call| call.function.name == FUNCTION_NAME)
            .map(|call| call.function.arguments)
            .ok_or(CallError::NoToolCall)
    }
}

impl StructuredGenerator for OpenAiGenerator {
    async fn generate(&self, request: GenerationRequest) -> GenerationOutcome {
        let start = Instant::now();
        let outcome = match self.call(&request).await {
            Ok(arguments) => parse_arguments(&arguments),
            Err(e) => GenerationOutcome::OtherFailure(e.to_string()),
        };
        debug!(
            id = %request.record_id,
            latency_ms = start.elapsed().as_millis() as u64,
            ok = matches!(outcome, GenerationOutcome::Success(_)),
            "generation call finished"
        );
        outcome
    }
}

/// Coerce function arguments into the schema.
///
/// A failure is reported in the same text form the recovery decoder reads:
/// the raw arguments between the two markers.
pub fn parse_arguments(arguments: &str) -> GenerationOutcome {
    match serde_json::from_str::<AnalysisResult>(arguments) {
        Ok(result) => GenerationOutcome::Success(result),
        Err(e) => GenerationOutcome::SchemaViolation(format!(
            "{ARGUMENTS_MARKER}\n\n{arguments}\n\n{TRAILING_MARKER}. Received error: {e}"
        )),
    }
}

/// Fill the `{language}` and `{content}` placeholders.
///
/// Content goes in last so placeholder-like text inside a paper is left alone.
fn render_prompt(template: &str, language: &str, content: &str) -> String {
    template
        .replace("{language}", language)
        .replace("{content}", content)
}
