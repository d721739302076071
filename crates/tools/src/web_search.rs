//! Web search tool: DuckDuckGo Instant Answer API.
//!
//! Renders the abstract (when there is one) followed by related-topic
//! snippets, one per line. Grouped topics are flattened.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::tool::{ArgumentStyle, Tool, ToolResult};
use tracing::debug;

pub const NO_RESULT: &str = "No good search result found";

pub struct WebSearchTool {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
    Entry {
        #[serde(rename = "Text", default)]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
}

impl WebSearchTool {
    pub fn new(base_url: impl Into<String>, max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_results,
        }
    }

    fn render(&self, answer: InstantAnswer) -> String {
        let mut lines = Vec::new();
        if !answer.abstract_text.is_empty() {
            let mut line = if answer.heading.is_empty() {
                answer.abstract_text
            } else {
                format!("{}: {}", answer.heading, answer.abstract_text)
            };
            if !answer.abstract_url.is_empty() {
                line.push_str(&format!(" ({})", answer.abstract_url));
            }
            lines.push(line);
        }

        let mut snippets = Vec::new();
        flatten(answer.related_topics, &mut snippets);
        lines.extend(snippets.into_iter().take(self.max_results));

        if lines.is_empty() {
            NO_RESULT.to_string()
        } else {
            lines.join("\n")
        }
    }
}

fn flatten(topics: Vec<RelatedTopic>, out: &mut Vec<String>) {
    for topic in topics {
        match topic {
            RelatedTopic::Group { topics } => flatten(topics, out),
            RelatedTopic::Entry { text, first_url } if !text.is_empty() => {
                if first_url.is_empty() {
                    out.push(text);
                } else {
                    out.push(format!("{text} ({first_url})"));
                }
            }
            RelatedTopic::Entry { .. } => {}
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Input is a free-text search query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    fn argument_style(&self) -> ArgumentStyle {
        ArgumentStyle::FreeText
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        debug!(query, "Web search");
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Network(format!("search service returned HTTP {status}")));
        }

        let answer: InstantAnswer = response.json().await.map_err(|e| {
            ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: format!("undecodable search response: {e}"),
            }
        })?;

        Ok(ToolResult::text(self.render(answer)))
    }
}
