//! HTTP server: chat API plus the single-page chat widget

use crate::config::Config;
use crate::content::UiMessage;
use crate::llm::{GeminiProvider, LlmProvider};
use crate::prompt;
use crate::session::{spawn_eviction_sweep, ChatAgent, SessionManager};
use crate::tools::{hr, ToolRegistry};
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Chat page with the static side panels
const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Shared application state
pub struct AppState {
    agent: ChatAgent,
    sessions: Arc<SessionManager>,
    upload_dir: PathBuf,
}

impl AppState {
    pub fn new(agent: ChatAgent, sessions: Arc<SessionManager>, upload_dir: PathBuf) -> Self {
        Self {
            agent,
            sessions,
            upload_dir,
        }
    }
}

/// Request for one chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Session to address; a new session is created when absent or unknown
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub text: String,
    /// File attachments, base64-encoded
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct Attachment {
    pub name: String,
    /// Base64-encoded file contents
    pub data: String,
}

/// Response for one chat turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    /// Markdown-renderable reply; empty when the turn was blank
    pub reply: String,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    active_sessions: usize,
}

/// Run the HTTP server: one-time startup wiring, then serve until shutdown.
pub async fn run_http_server(config: Config) -> Result<()> {
    let client = reqwest::Client::new();

    // The system instruction is assembled once: static template plus the
    // live policy fetch. An unreachable policy service degrades to an
    // empty-valued policy, it does not block startup.
    let policy_json = hr::fetch_holiday_policy(&client, &config.endpoints.policy_url).await;
    let template = prompt::load_template(config.prompt.path.as_deref())?;
    let system_instruction = prompt::render_system_instruction(&template, &policy_json);

    let provider = GeminiProvider::new()?
        .with_model(&config.gemini.model)
        .with_max_output_tokens(config.gemini.max_output_tokens)
        .with_temperature(config.gemini.temperature);

    let tools = ToolRegistry::with_hr_tools(
        client,
        config.endpoints.employee_data_url.clone(),
        config.endpoints.policy_url.clone(),
    );

    let agent = ChatAgent::new(Arc::new(provider) as Arc<dyn LlmProvider>, Arc::new(tools))
        .with_max_tool_turns(config.session.max_tool_turns);

    let sessions = Arc::new(SessionManager::new(
        system_instruction,
        Duration::from_secs(config.session.idle_timeout_secs),
    ));
    spawn_eviction_sweep(
        sessions.clone(),
        Duration::from_secs(config.session.sweep_interval_secs),
    );

    let upload_dir = std::env::temp_dir().join(format!("hrbot-uploads-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&upload_dir)?;

    let state = Arc::new(AppState::new(agent, sessions, upload_dir));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("HTTP server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Separate from [`run_http_server`] so tests can serve
/// the same routes with a scripted provider.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/chat", post(handle_chat))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: format!(
            "{}{}",
            env!("CARGO_PKG_VERSION"),
            env!("HRBOT_VERSION_SUFFIX")
        ),
        active_sessions: state.sessions.len(),
    })
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let message = build_message(&state, &req).map_err(|e| {
        tracing::warn!("Rejecting chat request: {e:#}");
        (StatusCode::BAD_REQUEST, format!("{e:#}"))
    })?;

    let (session_id, session) = state.sessions.get_or_create(req.session_id.as_deref());
    let mut session = session.lock().await;

    let result = state.agent.send(&mut session, &message).await;

    // Attachments are read into inline data during the turn; the staged
    // files have no further use.
    if let UiMessage::Composite { files, .. } = &message {
        for file in files {
            if let Err(e) = std::fs::remove_file(file) {
                tracing::warn!("Failed to remove upload {}: {e}", file.display());
            }
        }
    }

    match result {
        Ok(Some(content)) => {
            let reply = crate::content::to_ui_values(Some(&content), true)
                .into_iter()
                .filter_map(|v| match v {
                    crate::content::UiValue::Text(text) => Some(text),
                    crate::content::UiValue::Image(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            tracing::info!(session = %session_id, chars = reply.len(), "Turn complete");
            Ok(Json(ChatResponse { session_id, reply }))
        }
        Ok(None) => Ok(Json(ChatResponse {
            session_id,
            reply: String::new(),
        })),
        Err(e) => {
            // Generation failures surface to the caller, never swallowed
            tracing::error!(session = %session_id, "Generation failed: {e:#}");
            Err((StatusCode::BAD_GATEWAY, format!("{e:#}")))
        }
    }
}

/// Persist attachments to the per-run upload dir and shape the UI message.
fn build_message(state: &AppState, req: &ChatRequest) -> Result<UiMessage> {
    if req.attachments.is_empty() {
        return Ok(UiMessage::Text(req.text.clone()));
    }

    let mut files = Vec::with_capacity(req.attachments.len());
    for attachment in &req.attachments {
        let data = BASE64
            .decode(&attachment.data)
            .map_err(|e| anyhow::anyhow!("Attachment '{}' is not valid base64: {e}", attachment.name))?;

        // Keep only the file name; clients do not control our paths
        let name = std::path::Path::new(&attachment.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment");
        let path = state
            .upload_dir
            .join(format!("{}-{}", Uuid::new_v4(), name));
        std::fs::write(&path, data)?;
        files.push(path);
    }

    Ok(UiMessage::Composite {
        text: req.text.clone(),
        files,
    })
}
