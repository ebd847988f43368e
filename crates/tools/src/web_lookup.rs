//! Web lookup tool: fetches instant answers for a query.
//!
//! Backed by the DuckDuckGo instant-answer API. Keeps a one-entry cache
//! of the last query inside the tool instance, so repeated lookups for
//! the same query within a run skip the network and concurrent agents
//! never observe each other's results.

use async_trait::async_trait;
use maestro_core::tool::{ErrorPolicy, Tool, ToolFault, ToolInput};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

pub struct WebLookupTool {
    client: reqwest::Client,
    cache: Mutex<Option<(String, String)>>,
}

impl WebLookupTool {
    pub fn new() -> Result<Self, ToolFault> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ToolFault::new(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            cache: Mutex::new(None),
        })
    }

    async fn fetch(&self, query: &str) -> Result<String, ToolFault> {
        let response = self
            .client
            .get("https://api.duckduckgo.com/")
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| ToolFault::new(format!("Lookup request failed: {e}")))?;

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| ToolFault::new(format!("Malformed lookup response: {e}")))?;

        let mut lines = Vec::new();
        if !answer.abstract_text.is_empty() {
            lines.push(answer.abstract_text);
        }
        for topic in answer.related_topics.into_iter().take(3) {
            if !topic.text.is_empty() {
                lines.push(topic.text);
            }
        }

        if lines.is_empty() {
            return Ok(format!("No results found for '{query}'."));
        }
        Ok(lines.join("\n"))
    }
}

#[async_trait]
impl Tool for WebLookupTool {
    fn name(&self) -> &str {
        "web_lookup"
    }

    fn description(&self) -> &str {
        "Look up factual information on the web. Returns a short summary of the best matches."
    }

    fn args_schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        }))
    }

    /// Network failures go back to the model as observations.
    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Report
    }

    async fn call(&self, input: ToolInput) -> Result<String, ToolFault> {
        let query = match &input {
            ToolInput::Text(text) => text.clone(),
            ToolInput::Args(map) => map
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolFault::new("Missing 'query' argument"))?
                .to_owned(),
        };

        {
            let cache = self.cache.lock().await;
            if let Some((cached_query, cached_result)) = cache.as_ref() {
                if *cached_query == query {
                    debug!(%query, "lookup served from cache");
                    return Ok(cached_result.clone());
                }
            }
        }

        let result = self.fetch(&query).await?;
        *self.cache.lock().await = Some((query, result.clone()));
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: String,
}
