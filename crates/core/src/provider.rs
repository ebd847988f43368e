//! The model backend abstraction.
//!
//! A [`Provider`] turns a message log plus a function catalog into either
//! a final text or a function-call request, in batch or streaming form.
//! Implementations live in `maestro-providers`; tests use in-crate mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;

/// A function declaration advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the arguments object.
    pub parameters: Value,
}

/// A function call as the backend reports it: the arguments are still an
/// unparsed JSON text and may not be valid JSON at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// One full model completion.
///
/// Exactly one of `content` and `function_call` is populated.
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub content: Option<String>,
    pub function_call: Option<RawFunctionCall>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// What a streamed fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Part of the assistant's visible answer text.
    Content,
    /// Part of a function-call payload being assembled.
    FunctionCall,
}

/// An incremental piece of a streamed completion. All fragments of one
/// completion share the same kind; concatenating them in arrival order
/// reconstructs the full text or call payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl StreamFragment {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Content,
            text: text.into(),
        }
    }

    pub fn function_call(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::FunctionCall,
            text: text.into(),
        }
    }
}

/// Receiver half of a fragment stream.
pub type FragmentStream = mpsc::Receiver<Result<StreamFragment, ProviderError>>;

/// A chat-completion backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend identifier, for logs.
    fn name(&self) -> &str;

    /// The model this provider is bound to, used for pricing lookups.
    fn model(&self) -> &str;

    /// Run one completion over the message log, advertising `functions`
    /// to the model when non-empty.
    async fn complete(
        &self,
        messages: &[Message],
        functions: &[FunctionSpec],
    ) -> Result<BackendResponse, ProviderError>;

    /// Stream one completion as ordered fragments.
    ///
    /// The default implementation runs [`Provider::complete`] and replays
    /// the result as fragments, so non-streaming backends still satisfy
    /// the streaming surface. A function-call response is replayed as a
    /// call-payload prefix, the raw arguments, and the closing brace,
    /// matching what incremental backends emit.
    async fn stream(
        &self,
        messages: &[Message],
        functions: &[FunctionSpec],
    ) -> Result<FragmentStream, ProviderError> {
        let response = self.complete(messages, functions).await?;
        let (tx, rx) = mpsc::channel(8);
        if let Some(call) = response.function_call {
            let prefix = format!(
                "{{\"name\": {}, \"arguments\": ",
                Value::String(call.name)
            );
            let _ = tx.send(Ok(StreamFragment::function_call(prefix))).await;
            let _ = tx
                .send(Ok(StreamFragment::function_call(call.arguments)))
                .await;
            let _ = tx.send(Ok(StreamFragment::function_call("}"))).await;
        } else if let Some(content) = response.content {
            let _ = tx.send(Ok(StreamFragment::content(content))).await;
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned {
        response: BackendResponse,
    }

    #[async_trait]
    impl Provider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "test-model"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _functions: &[FunctionSpec],
        ) -> Result<BackendResponse, ProviderError> {
            Ok(self.response.clone())
        }
    }

    async fn drain(mut rx: FragmentStream) -> Vec<StreamFragment> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn default_stream_replays_content() {
        let provider = Canned {
            response: BackendResponse {
                content: Some("The answer is 2".into()),
                ..Default::default()
            },
        };
        let rx = provider.stream(&[], &[]).await.unwrap();
        let fragments = drain(rx).await;
        assert_eq!(fragments, vec![StreamFragment::content("The answer is 2")]);
    }

    #[tokio::test]
    async fn default_stream_replays_function_call_as_payload() {
        let provider = Canned {
            response: BackendResponse {
                function_call: Some(RawFunctionCall {
                    name: "calculator".into(),
                    arguments: r#"{"expression": "1 + 1"}"#.into(),
                }),
                ..Default::default()
            },
        };
        let rx = provider.stream(&[], &[]).await.unwrap();
        let fragments = drain(rx).await;
        assert!(fragments.iter().all(|f| f.kind == FragmentKind::FunctionCall));
        let payload: String = fragments.into_iter().map(|f| f.text).collect();
        let parsed: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["name"], "calculator");
    }

    #[tokio::test]
    async fn default_stream_json_encodes_the_name() {
        let provider = Canned {
            response: BackendResponse {
                function_call: Some(RawFunctionCall {
                    name: r#"we"ird\name"#.into(),
                    arguments: "{}".into(),
                }),
                ..Default::default()
            },
        };
        let rx = provider.stream(&[], &[]).await.unwrap();
        let payload: String = drain(rx).await.into_iter().map(|f| f.text).collect();
        let parsed: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["name"], r#"we"ird\name"#);
    }
}
