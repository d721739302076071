//! The orchestration loop.
//!
//! `AWAITING_MODEL` asks the router for a decision; a final answer ends the
//! turn, tool calls move to `DISPATCHING_TOOLS`, which runs the round and
//! goes back to the model. Messages are persisted under the session's lock;
//! a tool-call request is written only together with its results, so a run
//! cut short never leaves an unanswered request in the store.

use std::sync::Arc;
use std::time::Duration;

use toolchat_config::AppConfig;
use toolchat_core::error::{AgentError, Error, ToolError};
use toolchat_core::message::{Conversation, ConversationId, Message, ToolCall};
use toolchat_core::provider::{Decision, Provider};
use toolchat_core::store::ConversationStore;
use toolchat_core::tool::ToolRegistry;
use toolchat_store::SessionLocks;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::router::ModelRouter;

/// What one chat request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub thread_id: ConversationId,
    /// The model's final answer
    pub response: String,
    /// Model invocations made
    pub rounds: u32,
    /// Tool calls executed across all rounds
    pub tool_calls: usize,
}

enum LoopState {
    AwaitingModel,
    /// Holds the unsaved request message and its calls.
    DispatchingTools(Message, Vec<ToolCall>),
    Done(String),
}

/// Ties the router, dispatcher, and store together.
pub struct AgentLoop {
    router: ModelRouter,
    dispatcher: Dispatcher,
    store: Arc<dyn ConversationStore>,
    locks: SessionLocks,
    max_rounds: u32,
}

impl AgentLoop {
    pub fn new(
        router: ModelRouter,
        dispatcher: Dispatcher,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            router,
            dispatcher,
            store,
            locks: SessionLocks::new(),
            max_rounds: 8,
        }
    }

    /// Wire the built-in tools, router, and dispatcher from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Self, ToolError> {
        let tools = Arc::new(toolchat_tools::default_registry(&config.tools)?);
        let router = ModelRouter::from_config(provider, tools.clone(), config);
        let dispatcher =
            Dispatcher::new(tools).with_timeout(Duration::from_secs(config.tools.timeout_secs));
        Ok(Self::new(router, dispatcher, store).with_max_rounds(config.agent.max_rounds))
    }

    /// Cap on model invocations per request.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        self.dispatcher.tools()
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Whether the model backend currently answers its health probe.
    pub async fn backend_reachable(&self) -> bool {
        self.router.backend_reachable().await
    }

    /// The persisted history of a session.
    pub async fn history(&self, thread_id: &ConversationId) -> Result<Conversation, Error> {
        Ok(self.store.load(thread_id).await?)
    }

    /// Handle one user message on `thread_id` and return the final answer.
    ///
    /// Requests on the same thread run one at a time; different threads
    /// run in parallel.
    pub async fn run(&self, thread_id: &ConversationId, user_message: &str) -> Result<Turn, Error> {
        if thread_id.as_str().trim().is_empty() {
            return Err(AgentError::InvalidRequest("thread_id must not be empty".into()).into());
        }

        let _guard = self.locks.lock(thread_id).await;
        let mut history = self.store.load(thread_id).await?.messages;
        info!(thread_id = %thread_id, history = history.len(), "Processing chat request");

        let user = Message::user(user_message);
        self.store.append(thread_id, &user).await?;
        history.push(user);

        let mut rounds = 0u32;
        let mut tool_calls = 0usize;
        let mut state = LoopState::AwaitingModel;

        let response = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if rounds >= self.max_rounds {
                        warn!(thread_id = %thread_id, rounds, "Round limit reached without an answer");
                        return Err(AgentError::RoundLimitExceeded {
                            max_rounds: self.max_rounds,
                        }
                        .into());
                    }
                    rounds += 1;
                    debug!(thread_id = %thread_id, round = rounds, "Awaiting model");

                    let decision = self.router.decide(&history).await;
                    let message = decision.to_message();

                    match decision {
                        Decision::FinalAnswer(text) => {
                            self.store.append(thread_id, &message).await?;
                            history.push(message);
                            LoopState::Done(text)
                        }
                        Decision::ToolCallsRequested(calls) => {
                            LoopState::DispatchingTools(message, calls)
                        }
                    }
                }
                LoopState::DispatchingTools(request, calls) => {
                    debug!(thread_id = %thread_id, count = calls.len(), "Dispatching tools");
                    let results = self.dispatcher.dispatch_all(&calls).await;
                    tool_calls += results.len();

                    let mut batch = Vec::with_capacity(results.len() + 1);
                    batch.push(request);
                    batch.extend(
                        results
                            .into_iter()
                            .map(|r| Message::tool_result(r.call_id, r.tool_name, r.output)),
                    );
                    self.store.append_all(thread_id, &batch).await?;
                    history.extend(batch);
                    LoopState::AwaitingModel
                }
                LoopState::Done(text) => break text,
            };
        };

        info!(thread_id = %thread_id, rounds, tool_calls, "Chat request complete");
        Ok(Turn {
            thread_id: thread_id.clone(),
            response,
            rounds,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use toolchat_core::error::ProviderError;
    use toolchat_core::message::Role;
    use toolchat_core::provider::{ProviderRequest, ProviderResponse};
    use toolchat_core::tool::{Tool, ToolResult};
    use toolchat_store::InMemoryStore;

    /// Replays queued messages and counts invocations.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Message>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Message>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let message = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Message::assistant("script exhausted"));
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "scripted".into(),
            })
        }
    }

    /// Echoes the last user message back, after a short pause.
    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            let last = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ProviderResponse {
                message: Message::assistant(format!("echo: {last}")),
                usage: None,
                model: "echo".into(),
            })
        }
    }

    fn agent(provider: Arc<dyn Provider>) -> (AgentLoop, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let mut config = AppConfig::default();
        config.agent.max_rounds = 4;
        let agent = AgentLoop::from_config(&config, provider, store.clone()).unwrap();
        (agent, store)
    }

    fn calc_call(id: &str, a: f64, b: f64, op: &str) -> ToolCall {
        ToolCall::new(
            id,
            "calculator",
            json!({"first_operand": a, "second_operand": b, "operation": op}),
        )
    }

    #[tokio::test]
    async fn direct_answer_takes_one_round() {
        let provider = ScriptedProvider::new(vec![Message::assistant("Hello!")]);
        let (agent, store) = agent(provider.clone());
        let id = ConversationId::from("t1");

        let turn = agent.run(&id, "Hi").await.unwrap();
        assert_eq!(turn.response, "Hello!");
        assert_eq!(turn.rounds, 1);
        assert_eq!(turn.tool_calls, 0);
        assert_eq!(provider.calls(), 1);

        let history = store.load(&id).await.unwrap().messages;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "Hello!");
    }

    #[tokio::test]
    async fn tool_round_appends_results_in_request_order() {
        let provider = ScriptedProvider::new(vec![
            Message::tool_request(vec![
                calc_call("a", 2.0, 3.0, "add"),
                ToolCall::new("b", "nonexistent", json!({})),
                calc_call("c", 12.0, 4.0, "div"),
            ]),
            Message::assistant("2+3=5 and 12/4=3"),
        ]);
        let (agent, store) = agent(provider.clone());
        let id = ConversationId::from("t1");

        let turn = agent.run(&id, "compute").await.unwrap();
        assert_eq!(turn.rounds, 2);
        assert_eq!(turn.tool_calls, 3);
        assert_eq!(provider.calls(), 2);

        let history = store.load(&id).await.unwrap().messages;
        // user, tool request, 3 results, final answer
        assert_eq!(history.len(), 6);
        assert!(history[1].has_tool_calls());
        let answered: Vec<_> = history[2..5]
            .iter()
            .map(|m| m.tool_call_id.as_deref().unwrap())
            .collect();
        assert_eq!(answered, vec!["a", "b", "c"]);
        assert!(history[3].content.starts_with("Unknown tool: nonexistent"));
        assert!(history[4].content.contains("\"result\":3.0"));
        assert_eq!(history[5].content, "2+3=5 and 12/4=3");
    }

    #[tokio::test]
    async fn history_is_sent_back_on_later_requests() {
        let provider = ScriptedProvider::new(vec![
            Message::assistant("first answer"),
            Message::assistant("second answer"),
        ]);
        let (agent, store) = agent(provider);
        let id = ConversationId::from("t1");

        agent.run(&id, "one").await.unwrap();
        agent.run(&id, "two").await.unwrap();

        let contents: Vec<_> = store
            .load(&id)
            .await
            .unwrap()
            .messages
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "first answer", "two", "second answer"]);
    }

    #[tokio::test]
    async fn round_limit_is_a_distinct_failure() {
        let looping: Vec<Message> = (0..10)
            .map(|i| Message::tool_request(vec![calc_call(&format!("c{i}"), 1.0, 1.0, "add")]))
            .collect();
        let provider = ScriptedProvider::new(looping);
        let (agent, store) = agent(provider.clone());
        let id = ConversationId::from("loop");

        let err = agent.run(&id, "never ends").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Agent(AgentError::RoundLimitExceeded { max_rounds: 4 })
        ));
        assert_eq!(provider.calls(), 4);

        // Everything produced before the cap is kept: user + 4 * (request + result).
        assert_eq!(store.count(&id).await.unwrap(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_leaves_no_unanswered_request() {
        struct Stall;

        #[async_trait]
        impl Tool for Stall {
            fn name(&self) -> &str {
                "stall"
            }
            fn description(&self) -> &str {
                "Never finishes in time"
            }
            fn parameters_schema(&self) -> serde_json::Value {
                json!({"type": "object"})
            }
            async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(ToolResult::text("done"))
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Stall)).unwrap();
        let tools = Arc::new(registry);
        let provider = ScriptedProvider::new(vec![
            Message::tool_request(vec![ToolCall::new("s1", "stall", json!({}))]),
            Message::tool_request(vec![ToolCall::new("s2", "stall", json!({}))]),
            Message::assistant("after the stall"),
        ]);
        let store = Arc::new(InMemoryStore::new());
        let agent = Arc::new(AgentLoop::new(
            ModelRouter::new(provider, tools.clone(), "scripted"),
            Dispatcher::new(tools),
            store.clone(),
        ));
        let id = ConversationId::from("cut");

        let handle = {
            let agent = agent.clone();
            let id = id.clone();
            tokio::spawn(async move { agent.run(&id, "go").await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let history = store.load(&id).await.unwrap().messages;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);

        // The thread stays usable: the next run pairs its request and results.
        let turn = agent.run(&id, "again").await.unwrap();
        assert_eq!(turn.response, "after the stall");
        let history = store.load(&id).await.unwrap().messages;
        assert_eq!(history.len(), 5);
        assert!(history[2].has_tool_calls());
        assert_eq!(history[3].tool_call_id.as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn empty_thread_id_is_rejected() {
        let (agent, store) = agent(ScriptedProvider::new(vec![]));
        let err = agent.run(&ConversationId::from(""), "hi").await.unwrap_err();
        assert!(matches!(err, Error::Agent(AgentError::InvalidRequest(_))));
        assert!(store.conversation_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_session_requests_do_not_interleave() {
        let (agent, store) = agent(Arc::new(EchoProvider));
        let agent = Arc::new(agent);
        let id = ConversationId::from("shared");

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let agent = agent.clone();
                let id = id.clone();
                tokio::spawn(async move { agent.run(&id, &format!("msg {i}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let history = store.load(&id).await.unwrap().messages;
        assert_eq!(history.len(), 12);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
        }
    }

    #[tokio::test]
    async fn backend_failure_still_completes() {
        struct Down;

        #[async_trait]
        impl Provider for Down {
            fn name(&self) -> &str {
                "down"
            }
            async fn complete(
                &self,
                _request: ProviderRequest,
            ) -> Result<ProviderResponse, ProviderError> {
                Err(ProviderError::AuthenticationFailed("invalid key".into()))
            }
        }

        let (agent, store) = agent(Arc::new(Down));
        let id = ConversationId::from("t1");
        let turn = agent.run(&id, "hi").await.unwrap();
        assert!(turn.response.starts_with("Error communicating with LLM"));
        assert_eq!(store.count(&id).await.unwrap(), 2);
    }
}
