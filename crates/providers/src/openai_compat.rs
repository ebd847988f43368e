//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing a compatible
//! `/v1/chat/completions` route that speaks the legacy function-calling
//! protocol: functions advertised under `"functions"`, calls returned on
//! the assistant message as `"function_call"`, observations sent back as
//! `role: "function"` messages.
//!
//! Supports non-streaming and streaming (SSE) completions.

use async_trait::async_trait;
use futures::StreamExt;
use maestro_core::error::ProviderError;
use maestro_core::message::Message;
use maestro_core::provider::{
    BackendResponse, FragmentStream, FunctionSpec, Provider, RawFunctionCall, StreamFragment,
};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible chat-completion backend bound to one model.
#[derive(Debug)]
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body(
        &self,
        messages: &[Message],
        functions: &[FunctionSpec],
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": stream,
        });

        if !functions.is_empty() {
            body["functions"] = serde_json::json!(functions);
            body["function_call"] = serde_json::json!("auto");
        }

        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        sse: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if sse {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        functions: &[FunctionSpec],
    ) -> Result<BackendResponse, ProviderError> {
        let body = self.request_body(messages, functions, false);

        debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse("No choices in response".into())
        })?;

        let function_call = choice.message.function_call.map(|fc| RawFunctionCall {
            name: fc.name,
            arguments: fc.arguments,
        });

        let (prompt_tokens, completion_tokens) = match api_response.usage {
            Some(u) => (u.prompt_tokens, u.completion_tokens),
            None => (0, 0),
        };

        Ok(BackendResponse {
            content: choice.message.content,
            function_call,
            prompt_tokens,
            completion_tokens,
        })
    }

    async fn stream(
        &self,
        messages: &[Message],
        functions: &[FunctionSpec],
    ) -> Result<FragmentStream, ProviderError> {
        let body = self.request_body(messages, functions, true);

        debug!(provider = %self.name, model = %self.model, "Sending streaming request");

        let response = self.post(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and translate deltas into fragments.
        // A function call streams as the call-payload prefix (emitted when
        // the name delta arrives), the raw argument pieces, and a closing
        // brace once the stream finishes.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut in_function_call = false;

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        if in_function_call {
                            let _ = tx.send(Ok(StreamFragment::function_call("}"))).await;
                        }
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            let Some(choice) = stream_resp.choices.first() else {
                                continue;
                            };
                            let delta = &choice.delta;

                            if let Some(fc) = &delta.function_call {
                                if let Some(name) = &fc.name {
                                    in_function_call = true;
                                    let prefix = format!(
                                        "{{\"name\": {}, \"arguments\": ",
                                        serde_json::Value::String(name.clone())
                                    );
                                    if tx
                                        .send(Ok(StreamFragment::function_call(prefix)))
                                        .await
                                        .is_err()
                                    {
                                        return;
                                    }
                                }
                                if let Some(args) = &fc.arguments {
                                    if !args.is_empty()
                                        && tx
                                            .send(Ok(StreamFragment::function_call(args)))
                                            .await
                                            .is_err()
                                    {
                                        return;
                                    }
                                }
                            }

                            if let Some(content) = &delta.content {
                                if !content.is_empty()
                                    && tx
                                        .send(Ok(StreamFragment::content(content)))
                                        .await
                                        .is_err()
                                {
                                    return;
                                }
                            }

                            if choice.finish_reason.is_some() {
                                if in_function_call {
                                    let _ = tx
                                        .send(Ok(StreamFragment::function_call("}")))
                                        .await;
                                }
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            if in_function_call {
                let _ = tx.send(Ok(StreamFragment::function_call("}"))).await;
            }
        });

        Ok(rx)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<ApiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<StreamFunctionCallDelta>,
}

/// A function-call delta. The name arrives in the first delta, the
/// arguments text in pieces across the rest.
#[derive(Debug, Deserialize)]
struct StreamFunctionCallDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
