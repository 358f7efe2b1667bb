//! Chat sessions and the generation façade
//!
//! Sessions are per-connection, addressed by id, and evicted after an idle
//! timeout. Each one holds its own conversation history seeded with the
//! system instruction; concurrent browsers never share context.

use crate::content::{to_content_parts, UiMessage};
use crate::llm::{Content, LlmProvider, Message};
use crate::tools::ToolRegistry;
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Generation state of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Awaiting a user turn
    Idle,
    /// A request is in flight, possibly including nested tool calls
    Generating,
}

/// One conversation: history plus generation state
pub struct ChatSession {
    pub id: String,
    pub messages: Vec<Message>,
    pub state: SessionState,
    pub last_active: Instant,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, system_instruction: &str) -> Self {
        Self {
            id: id.into(),
            messages: vec![Message::system(system_instruction)],
            state: SessionState::Idle,
            last_active: Instant::now(),
        }
    }

    /// User/model turns, excluding the system message
    pub fn turn_count(&self) -> usize {
        self.messages.len().saturating_sub(1)
    }
}

/// Façade that runs one user turn against the model, dispatching tool calls
/// the model requests along the way.
pub struct ChatAgent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    max_tool_turns: usize,
}

impl ChatAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            max_tool_turns: 8,
        }
    }

    pub fn with_max_tool_turns(mut self, max: usize) -> Self {
        self.max_tool_turns = max;
        self
    }

    /// Run one user turn. A blank message is not dispatched: no state
    /// transition, no history growth, `Ok(None)` back to the caller.
    ///
    /// Transport or model failures propagate after rolling the history
    /// back to the pre-turn state; the session does not retry.
    pub async fn send(
        &self,
        session: &mut ChatSession,
        message: &UiMessage,
    ) -> Result<Option<Content>> {
        if message.is_blank() {
            tracing::debug!(session = %session.id, "Skipping blank turn");
            return Ok(None);
        }

        let parts = to_content_parts(message)?;
        let checkpoint = session.messages.len();
        session.messages.push(Message::user(parts));
        session.state = SessionState::Generating;

        let result = self.generate(session).await;

        // A failed turn leaves no trace: the user message and any partial
        // tool exchange are rolled back so a retry starts clean.
        if result.is_err() {
            session.messages.truncate(checkpoint);
        }
        session.state = SessionState::Idle;
        session.last_active = Instant::now();
        result.map(Some)
    }

    async fn generate(&self, session: &mut ChatSession) -> Result<Content> {
        let definitions = self.tools.definitions();
        let tools = (!definitions.is_empty()).then_some(definitions.as_slice());
        let mut tool_turns = 0;

        loop {
            let response = self.provider.chat(&session.messages, tools).await?;

            if let Some(usage) = response.usage() {
                tracing::debug!(
                    session = %session.id,
                    input = usage.input_tokens,
                    output = usage.output_tokens,
                    "Generation round complete"
                );
            }

            let calls = response.tool_calls().to_vec();
            if calls.is_empty() {
                let content = response.content().cloned().unwrap_or_default();
                session.messages.push(Message::model(content.clone()));
                return Ok(content);
            }

            tool_turns += 1;
            if tool_turns > self.max_tool_turns {
                anyhow::bail!(
                    "Model requested tool calls in {} consecutive rounds; giving up",
                    self.max_tool_turns
                );
            }

            let content = response.content().cloned().unwrap_or_default();
            session
                .messages
                .push(Message::model_tool_calls(content, calls.clone()));

            // The model issues calls one round at a time; within a round we
            // execute sequentially in the order it gave them.
            for call in calls {
                let result = self.tools.execute(&call.name, call.arguments.clone()).await;
                session
                    .messages
                    .push(Message::tool_result(call.name, result.output));
            }
        }
    }
}

/// Session table: creation on first contact, lookup by id, idle eviction
pub struct SessionManager {
    sessions: DashMap<String, Arc<Mutex<ChatSession>>>,
    system_instruction: String,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(system_instruction: impl Into<String>, idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            system_instruction: system_instruction.into(),
            idle_timeout,
        }
    }

    /// Look up a session by id, creating one when the id is absent, unknown,
    /// or already evicted. Returns the effective id with the session.
    pub fn get_or_create(&self, id: Option<&str>) -> (String, Arc<Mutex<ChatSession>>) {
        if let Some(id) = id {
            if let Some(session) = self.sessions.get(id) {
                return (id.to_string(), session.clone());
            }
        }

        let id = id
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = Arc::new(Mutex::new(ChatSession::new(&id, &self.system_instruction)));
        self.sessions.insert(id.clone(), session.clone());
        tracing::info!(session = %id, "Created chat session");
        (id, session)
    }

    /// Drop sessions idle for longer than the timeout. Sessions currently
    /// locked by an in-flight turn are skipped.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => guard.last_active.elapsed() < self.idle_timeout,
            Err(_) => true,
        });
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::info!("Evicted {evicted} idle session(s)");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Periodic eviction sweep; runs for the life of the process.
pub fn spawn_eviction_sweep(manager: Arc<SessionManager>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            manager.evict_idle();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentPart, LlmResponse, Role, ToolDefinition};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Provider that replays a scripted sequence of replies
    struct ScriptedProvider {
        replies: StdMutex<VecDeque<LlmResponse>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<LlmResponse>) -> Self {
            Self {
                replies: StdMutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
        ) -> Result<LlmResponse> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    fn text_reply(text: &str) -> LlmResponse {
        LlmResponse::Content {
            content: Content::new(vec![ContentPart::text(text)]),
            usage: None,
        }
    }

    fn agent(replies: Vec<LlmResponse>) -> ChatAgent {
        ChatAgent::new(
            Arc::new(ScriptedProvider::new(replies)),
            Arc::new(ToolRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_blank_turn_is_not_dispatched() {
        let agent = agent(vec![]);
        let mut session = ChatSession::new("s1", "sys");

        let reply = agent
            .send(&mut session, &UiMessage::Text("   ".to_string()))
            .await
            .unwrap();

        assert!(reply.is_none());
        assert_eq!(session.turn_count(), 0);
        assert_eq!(session.state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_plain_turn_round_trip() {
        let agent = agent(vec![text_reply("hola, que necesitas?")]);
        let mut session = ChatSession::new("s1", "sys");

        let reply = agent
            .send(&mut session, &UiMessage::Text("hola".to_string()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reply.text(), "hola, que necesitas?");
        assert_eq!(session.state, SessionState::Idle);
        // user turn + model turn
        assert_eq!(session.turn_count(), 2);
        assert_eq!(session.messages.last().unwrap().role, Role::Model);
    }

    #[tokio::test]
    async fn test_tool_calls_are_dispatched_and_looped() {
        use crate::llm::ToolCall;
        use crate::tools::{Tool, ToolResult};
        use serde_json::{json, Value};

        struct EchoTool;

        #[async_trait]
        impl Tool for EchoTool {
            fn name(&self) -> &str {
                "echo"
            }
            fn description(&self) -> &str {
                "echoes"
            }
            fn parameters(&self) -> Value {
                json!({"type": "object", "properties": {}})
            }
            async fn execute(&self, params: Value) -> Result<ToolResult> {
                Ok(ToolResult::success(params.to_string()))
            }
        }

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool));

        let provider = ScriptedProvider::new(vec![
            LlmResponse::ToolCalls {
                calls: vec![ToolCall {
                    name: "echo".to_string(),
                    arguments: json!({"dni": "101"}),
                }],
                usage: None,
            },
            text_reply("listo"),
        ]);
        let agent = ChatAgent::new(Arc::new(provider), Arc::new(tools));
        let mut session = ChatSession::new("s1", "sys");

        let reply = agent
            .send(&mut session, &UiMessage::Text("busca 101".to_string()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reply.text(), "listo");
        // user, model(tool call), tool result, model(final)
        assert_eq!(session.turn_count(), 4);
        let tool_msg = &session.messages[3];
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content.text(), r#"{"dni":"101"}"#);
    }

    #[tokio::test]
    async fn test_generation_failure_propagates_and_resets_state() {
        let agent = agent(vec![]); // empty script: chat() fails
        let mut session = ChatSession::new("s1", "sys");

        let result = agent
            .send(&mut session, &UiMessage::Text("hola".to_string()))
            .await;

        assert!(result.is_err());
        assert_eq!(session.state, SessionState::Idle);
        // The failed turn is rolled back; the history holds only the
        // system instruction.
        assert_eq!(session.turn_count(), 0);
    }

    #[tokio::test]
    async fn test_tool_turn_limit() {
        use crate::llm::ToolCall;
        use serde_json::json;

        let looping_call = || LlmResponse::ToolCalls {
            calls: vec![ToolCall {
                name: "missing".to_string(),
                arguments: json!({}),
            }],
            usage: None,
        };
        let agent = agent(vec![looping_call(), looping_call(), looping_call()])
            .with_max_tool_turns(2);
        let mut session = ChatSession::new("s1", "sys");

        let result = agent
            .send(&mut session, &UiMessage::Text("loop".to_string()))
            .await;
        assert!(result.is_err());
        assert_eq!(session.turn_count(), 0);
    }

    #[tokio::test]
    async fn test_manager_creates_and_reuses_sessions() {
        let manager = SessionManager::new("sys", Duration::from_secs(60));

        let (id, _) = manager.get_or_create(None);
        let (same, _) = manager.get_or_create(Some(&id));
        assert_eq!(id, same);
        assert_eq!(manager.len(), 1);

        let (other, _) = manager.get_or_create(None);
        assert_ne!(id, other);
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_idle_eviction() {
        let manager = SessionManager::new("sys", Duration::from_millis(10));
        let (_, session) = manager.get_or_create(None);
        session.lock().await.last_active = Instant::now() - Duration::from_secs(1);

        assert_eq!(manager.evict_idle(), 1);
        assert!(manager.is_empty());
    }
}
