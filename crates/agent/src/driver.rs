//! Completion driving.
//!
//! Runs one model completion over the conversation (batch or streaming)
//! and classifies the result: either a final answer or a function call
//! with parsed arguments. The streaming path drains the fragment stream
//! completely before classification, forwarding answer text to the sink
//! as it arrives.

use maestro_core::error::{AgentError, ProviderError, Result};
use maestro_core::message::{FunctionCall, Message};
use maestro_core::output::OutputSink;
use maestro_core::provider::{FragmentKind, FunctionSpec, Provider};
use tracing::debug;

use crate::parse::{parse_arguments, parse_function_payload};

/// What one completion resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// The model answered in plain text; the run is over.
    Answer(String),
    /// The model wants a function invoked.
    Call(FunctionCall),
}

/// One classified completion plus its token usage. Streamed completions
/// report zero tokens; the wire protocol carries no usage for them.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverResult {
    pub outcome: CompletionOutcome,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Run one batch completion and classify it.
pub async fn complete(
    provider: &dyn Provider,
    messages: &[Message],
    functions: &[FunctionSpec],
) -> Result<DriverResult> {
    let response = provider.complete(messages, functions).await?;

    let outcome = if let Some(raw) = response.function_call {
        let arguments = parse_arguments(&raw.arguments)?;
        debug!(function = %raw.name, "model requested a function call");
        CompletionOutcome::Call(FunctionCall {
            name: raw.name,
            arguments,
        })
    } else if let Some(content) = response.content {
        CompletionOutcome::Answer(content)
    } else {
        return Err(AgentError::Provider(ProviderError::MalformedResponse(
            "completion carried neither content nor a function call".into(),
        )));
    };

    Ok(DriverResult {
        outcome,
        prompt_tokens: response.prompt_tokens,
        completion_tokens: response.completion_tokens,
    })
}

/// Run one streaming completion, forwarding answer text to `sink` as it
/// arrives, and classify the reassembled result.
///
/// The stream is drained fully before anything is parsed: a call payload
/// is only valid once its closing brace has arrived.
pub async fn stream_complete(
    provider: &dyn Provider,
    messages: &[Message],
    functions: &[FunctionSpec],
    sink: &dyn OutputSink,
) -> Result<DriverResult> {
    let mut rx = provider.stream(messages, functions).await?;

    let mut answer = String::new();
    let mut call_payload = String::new();

    while let Some(item) = rx.recv().await {
        let fragment = item?;
        match fragment.kind {
            FragmentKind::Content => {
                sink.panel_print(&fragment.text, Some("output"), true);
                answer.push_str(&fragment.text);
            }
            FragmentKind::FunctionCall => {
                sink.panel_print(&fragment.text, Some("function_call"), true);
                call_payload.push_str(&fragment.text);
            }
        }
    }

    let outcome = if call_payload.is_empty() {
        CompletionOutcome::Answer(answer)
    } else {
        CompletionOutcome::Call(parse_function_payload(&call_payload)?)
    };

    Ok(DriverResult {
        outcome,
        prompt_tokens: 0,
        completion_tokens: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use maestro_core::output::NoopSink;
    use maestro_core::provider::{BackendResponse, RawFunctionCall, StreamFragment};
    use serde_json::json;

    struct Scripted {
        response: BackendResponse,
        fragments: Vec<StreamFragment>,
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn model(&self) -> &str {
            "test-model"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _functions: &[FunctionSpec],
        ) -> std::result::Result<BackendResponse, ProviderError> {
            Ok(self.response.clone())
        }

        async fn stream(
            &self,
            _messages: &[Message],
            _functions: &[FunctionSpec],
        ) -> std::result::Result<maestro_core::provider::FragmentStream, ProviderError> {
            let (tx, rx) = tokio::sync::mpsc::channel(16);
            for fragment in self.fragments.clone() {
                let _ = tx.send(Ok(fragment)).await;
            }
            Ok(rx)
        }
    }

    fn text_provider(text: &str) -> Scripted {
        Scripted {
            response: BackendResponse {
                content: Some(text.into()),
                ..Default::default()
            },
            fragments: vec![],
        }
    }

    #[tokio::test]
    async fn batch_answer() {
        let provider = text_provider("The answer is 2");
        let result = complete(&provider, &[], &[]).await.unwrap();
        assert_eq!(
            result.outcome,
            CompletionOutcome::Answer("The answer is 2".into())
        );
    }

    #[tokio::test]
    async fn batch_call_with_parsed_arguments() {
        let provider = Scripted {
            response: BackendResponse {
                function_call: Some(RawFunctionCall {
                    name: "calculator".into(),
                    arguments: r#"{"expression": "1 + 1"}"#.into(),
                }),
                prompt_tokens: 40,
                completion_tokens: 12,
                ..Default::default()
            },
            fragments: vec![],
        };
        let result = complete(&provider, &[], &[]).await.unwrap();
        match result.outcome {
            CompletionOutcome::Call(call) => {
                assert_eq!(call.name, "calculator");
                assert_eq!(call.arguments["expression"], json!("1 + 1"));
            }
            other => panic!("expected call, got {other:?}"),
        }
        assert_eq!(result.prompt_tokens, 40);
    }

    #[tokio::test]
    async fn batch_call_with_sloppy_arguments() {
        let provider = Scripted {
            response: BackendResponse {
                function_call: Some(RawFunctionCall {
                    name: "calculator".into(),
                    arguments: "{'expression': '1 + 1'}".into(),
                }),
                ..Default::default()
            },
            fragments: vec![],
        };
        let result = complete(&provider, &[], &[]).await.unwrap();
        match result.outcome {
            CompletionOutcome::Call(call) => {
                assert_eq!(call.arguments["expression"], json!("1 + 1"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_garbage_arguments_are_malformed() {
        let provider = Scripted {
            response: BackendResponse {
                function_call: Some(RawFunctionCall {
                    name: "calculator".into(),
                    arguments: "???".into(),
                }),
                ..Default::default()
            },
            fragments: vec![],
        };
        let err = complete(&provider, &[], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedCall(_)));
    }

    #[tokio::test]
    async fn stream_answer_reassembles_in_order() {
        let provider = Scripted {
            response: BackendResponse::default(),
            fragments: vec![
                StreamFragment::content("The answer"),
                StreamFragment::content(" is"),
                StreamFragment::content(" 2"),
            ],
        };
        let result = stream_complete(&provider, &[], &[], &NoopSink).await.unwrap();
        assert_eq!(
            result.outcome,
            CompletionOutcome::Answer("The answer is 2".into())
        );
    }

    #[tokio::test]
    async fn stream_call_reassembles_payload() {
        let provider = Scripted {
            response: BackendResponse::default(),
            fragments: vec![
                StreamFragment::function_call("{\"name\": \"calculator\", \"arguments\": "),
                StreamFragment::function_call("{\"expres"),
                StreamFragment::function_call("sion\": \"1 + 1\"}"),
                StreamFragment::function_call("}"),
            ],
        };
        let result = stream_complete(&provider, &[], &[], &NoopSink).await.unwrap();
        match result.outcome {
            CompletionOutcome::Call(call) => {
                assert_eq!(call.name, "calculator");
                assert_eq!(call.arguments["expression"], json!("1 + 1"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_call_with_string_arguments() {
        // Some backends stream the arguments as an embedded JSON string
        let provider = Scripted {
            response: BackendResponse::default(),
            fragments: vec![
                StreamFragment::function_call("{\"name\": \"echo\", \"arguments\": "),
                StreamFragment::function_call("\"{\\\"__arg1\\\": \\\"hi\\\"}\""),
                StreamFragment::function_call("}"),
            ],
        };
        let result = stream_complete(&provider, &[], &[], &NoopSink).await.unwrap();
        match result.outcome {
            CompletionOutcome::Call(call) => {
                assert_eq!(call.name, "echo");
                assert_eq!(call.arguments["__arg1"], json!("hi"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_truncated_payload_is_malformed() {
        let provider = Scripted {
            response: BackendResponse::default(),
            fragments: vec![StreamFragment::function_call(
                "{\"name\": \"calculator\", \"arguments\": {\"expr",
            )],
        };
        let err = stream_complete(&provider, &[], &[], &NoopSink)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MalformedCall(_)));
    }
}
