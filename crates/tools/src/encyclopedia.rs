//! Encyclopedia lookup: Wikipedia search plus page summaries.
//!
//! The top three search hits are expanded through the REST summary endpoint
//! and rendered as `Page: <title>\nSummary: <extract>` blocks.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::tool::{ArgumentStyle, Tool, ToolResult};
use tracing::{debug, warn};

pub const NO_RESULT: &str = "No good Wikipedia Search Result was found";

const TOP_K: usize = 3;

pub struct EncyclopediaTool {
    client: reqwest::Client,
    base_url: String,
    max_chars: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: String,
}

impl EncyclopediaTool {
    pub fn new(base_url: impl Into<String>, max_chars: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_chars,
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, ToolError> {
        let limit = TOP_K.to_string();
        let response = self
            .client
            .get(format!("{}/w/api.php", self.base_url))
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Network(format!(
                "encyclopedia search returned HTTP {status}"
            )));
        }

        let body: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "encyclopedia_lookup".into(),
                    reason: format!("undecodable search response: {e}"),
                })?;

        Ok(body
            .query
            .map(|q| q.search.into_iter().take(TOP_K).map(|h| h.title).collect())
            .unwrap_or_default())
    }

    /// Fetch one page summary. Pages that fail to load are skipped.
    async fn summary(&self, title: &str) -> Option<PageSummary> {
        let mut url = reqwest::Url::parse(&format!("{}/api/rest_v1/page/summary", self.base_url))
            .ok()?;
        url.path_segments_mut()
            .ok()?
            .push(&title.replace(' ', "_"));

        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(title, status = %r.status(), "Summary unavailable");
                return None;
            }
            Err(e) => {
                warn!(title, error = %e, "Summary request failed");
                return None;
            }
        };
        response.json::<PageSummary>().await.ok()
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[async_trait]
impl Tool for EncyclopediaTool {
    fn name(&self) -> &str {
        "encyclopedia_lookup"
    }

    fn description(&self) -> &str {
        "Look up a topic in Wikipedia and return summaries of the best matching articles. Input is a free-text query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The topic to look up"
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

        let titles = self.search(query).await?;
        debug!(query, hits = titles.len(), "Encyclopedia search");

        let mut blocks = Vec::new();
        for title in titles {
            if let Some(page) = self.summary(&title).await {
                let shown = page.title.unwrap_or(title);
                blocks.push(format!("Page: {shown}\nSummary: {}", page.extract));
            }
        }

        if blocks.is_empty() {
            return Ok(ToolResult::text(NO_RESULT));
        }
        Ok(ToolResult::text(truncate_chars(
            &blocks.join("\n\n"),
            self.max_chars,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_search(server: &MockServer, titles: &[&str]) {
        let hits: Vec<Value> = titles.iter().map(|t| json!({"title": t})).collect();
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"query": {"search": hits}})),
            )
            .mount(server)
            .await;
    }

    async fn mount_summary(server: &MockServer, slug: &str, title: &str, extract: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/api/rest_v1/page/summary/{slug}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"title": title, "extract": extract})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn renders_page_blocks() {
        let server = MockServer::start().await;
        mount_search(&server, &["Alan Turing", "Turing machine"]).await;
        mount_summary(&server, "Alan_Turing", "Alan Turing", "English mathematician.").await;
        mount_summary(&server, "Turing_machine", "Turing machine", "A model of computation.").await;

        let tool = EncyclopediaTool::new(server.uri(), 4000);
        let result = tool.execute(json!({"query": "turing"})).await.unwrap();

        assert!(result.success);
        assert_eq!(
            result.output,
            "Page: Alan Turing\nSummary: English mathematician.\n\n\
             Page: Turing machine\nSummary: A model of computation."
        );
    }

    #[tokio::test]
    async fn missing_summaries_are_skipped() {
        let server = MockServer::start().await;
        mount_search(&server, &["Gone", "Present"]).await;
        mount_summary(&server, "Present", "Present", "Still here.").await;

        let tool = EncyclopediaTool::new(server.uri(), 4000);
        let result = tool.execute(json!({"query": "x"})).await.unwrap();
        assert_eq!(result.output, "Page: Present\nSummary: Still here.");
    }

    #[tokio::test]
    async fn no_hits() {
        let server = MockServer::start().await;
        mount_search(&server, &[]).await;

        let tool = EncyclopediaTool::new(server.uri(), 4000);
        let result = tool.execute(json!({"query": "qwertyuiop"})).await.unwrap();
        assert_eq!(result.output, NO_RESULT);
    }

    #[tokio::test]
    async fn output_is_truncated() {
        let server = MockServer::start().await;
        mount_search(&server, &["Long"]).await;
        mount_summary(&server, "Long", "Long", &"é".repeat(500)).await;

        let tool = EncyclopediaTool::new(server.uri(), 50);
        let result = tool.execute(json!({"query": "long"})).await.unwrap();
        assert_eq!(result.output.chars().count(), 50);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
