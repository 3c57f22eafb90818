//! HTTP adapter exposing conversations over a small JSON API
//!
//! Each conversation id owns its own [`ConversationSession`]; text and image
//! conversations live in separate maps because they use different session
//! options. All sessions share one provider. Requests are answered directly
//! with the model's reply.

use crate::attachments::ImageAttachment;
use crate::config::Config;
use crate::error::{GemmaChatError, Result};
use crate::providers::Provider;
use crate::session::{ConversationSession, Modality, SessionOptions};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Conversation id used when a request does not name one
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Which session map a request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// Text-only sessions used by `/api/text`
    #[default]
    Text,
    /// Multimodal sessions used by `/api/image`
    Image,
}

/// Conversations kept when no limit is configured
pub const DEFAULT_MAX_CONVERSATIONS: usize = 1000;

struct Conversation {
    session: Arc<ConversationSession>,
    last_used: u64,
}

/// Conversations of one kind, evicting the least recently used past `max`
#[derive(Default)]
struct ConversationMap {
    entries: HashMap<String, Conversation>,
    clock: u64,
}

impl ConversationMap {
    fn touch(&mut self, id: &str) -> Option<Arc<ConversationSession>> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(id).map(|conversation| {
            conversation.last_used = clock;
            Arc::clone(&conversation.session)
        })
    }

    fn insert(&mut self, id: &str, session: Arc<ConversationSession>, max: usize) {
        while self.entries.len() >= max {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, conversation)| conversation.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            self.entries.remove(&oldest);
            tracing::info!(conversation = %oldest, "Evicted least recently used conversation");
        }
        self.clock += 1;
        self.entries.insert(
            id.to_string(),
            Conversation {
                session,
                last_used: self.clock,
            },
        );
    }
}

type SessionMap = Mutex<ConversationMap>;

/// Shared state behind the router
pub struct AppState {
    provider: Arc<dyn Provider>,
    text_options: SessionOptions,
    image_options: SessionOptions,
    max_conversations: usize,
    text_sessions: SessionMap,
    image_sessions: SessionMap,
}

impl AppState {
    /// Create state for `provider`
    ///
    /// Text conversations use `options` as given but never accept images;
    /// image conversations use the same options with multimodal input.
    /// Each kind keeps at most [`DEFAULT_MAX_CONVERSATIONS`] conversations.
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Config` if `options` are invalid
    pub fn new(provider: Arc<dyn Provider>, options: SessionOptions) -> Result<Self> {
        options.validate()?;
        let text_options = SessionOptions {
            modality: Modality::TextOnly,
            ..options.clone()
        };
        let image_options = SessionOptions {
            modality: Modality::Multimodal,
            ..options
        };
        Ok(Self {
            provider,
            text_options,
            image_options,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            text_sessions: Mutex::new(ConversationMap::default()),
            image_sessions: Mutex::new(ConversationMap::default()),
        })
    }

    /// Limit each session map to `max` conversations
    ///
    /// When a new conversation would exceed the limit, the one used least
    /// recently is dropped. A value of 0 is treated as 1.
    pub fn with_max_conversations(mut self, max: usize) -> Self {
        self.max_conversations = max.max(1);
        self
    }

    fn sessions(&self, kind: ConversationKind) -> &SessionMap {
        match kind {
            ConversationKind::Text => &self.text_sessions,
            ConversationKind::Image => &self.image_sessions,
        }
    }

    fn session(&self, kind: ConversationKind, id: &str) -> Result<Arc<ConversationSession>> {
        let mut sessions = self
            .sessions(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.touch(id) {
            return Ok(session);
        }

        let options = match kind {
            ConversationKind::Text => self.text_options.clone(),
            ConversationKind::Image => self.image_options.clone(),
        };
        let session = Arc::new(ConversationSession::new(Arc::clone(&self.provider), options)?);
        tracing::info!(conversation = id, ?kind, session = %session.id(), "Started conversation");
        sessions.insert(id, Arc::clone(&session), self.max_conversations);
        Ok(session)
    }

    /// Reset and forget conversation `id`
    ///
    /// Unknown ids are ignored. A conversation with a call in flight is kept
    /// and the reset fails with `ConcurrentOperation`.
    fn remove_session(&self, kind: ConversationKind, id: &str) -> Result<()> {
        let mut sessions = self
            .sessions(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(conversation) = sessions.entries.get(id) {
            conversation.session.reset()?;
            sessions.entries.remove(id);
            tracing::info!(conversation = id, ?kind, "Removed conversation");
        }
        Ok(())
    }

    fn conversation_count(&self, kind: ConversationKind) -> usize {
        self.sessions(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

/// Body of `POST /api/text`
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    /// Message text
    pub prompt: String,
    /// Conversation to continue
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Body of `POST /api/image`
#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    /// Message text
    pub prompt: String,
    /// Base64 image, optionally as a `data:` URL
    pub image: String,
    /// Conversation to continue
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Body of `POST /api/reset`
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    /// Conversation to clear
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Session map the conversation lives in
    #[serde(rename = "type", default)]
    pub kind: ConversationKind,
}

/// Reply to a chat request
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Conversation the reply belongs to
    pub conversation_id: String,
    /// Model reply
    pub response: String,
}

/// Error wrapper translating the error taxonomy into HTTP statuses
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<GemmaChatError>() {
            Some(
                GemmaChatError::InvalidInput(_)
                | GemmaChatError::UnsupportedModality(_)
                | GemmaChatError::Image(_),
            ) => StatusCode::BAD_REQUEST,
            Some(GemmaChatError::ConcurrentOperation) => StatusCode::CONFLICT,
            Some(GemmaChatError::Generation { .. }) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.0);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self.0);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

fn conversation_id(id: Option<String>) -> String {
    id.filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONVERSATION_ID.to_string())
}

async fn text_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TextRequest>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let conversation_id = conversation_id(request.conversation_id);
    let session = state.session(ConversationKind::Text, &conversation_id)?;
    let response = session.send_message(request.prompt, Vec::new()).await?;
    Ok(Json(ChatResponse {
        conversation_id,
        response,
    }))
}

async fn image_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImageRequest>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let conversation_id = conversation_id(request.conversation_id);
    let image = ImageAttachment::from_base64(&request.image)?;
    let session = state.session(ConversationKind::Image, &conversation_id)?;
    let response = session.send_message(request.prompt, vec![image]).await?;
    Ok(Json(ChatResponse {
        conversation_id,
        response,
    }))
}

async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetRequest>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let conversation_id = conversation_id(request.conversation_id);
    state.remove_session(request.kind, &conversation_id)?;
    Ok(Json(serde_json::json!({
        "status": "reset",
        "conversation_id": conversation_id,
    })))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let model = state
        .provider
        .get_current_model()
        .unwrap_or_else(|_| "unknown".to_string());
    Json(serde_json::json!({
        "status": "ok",
        "model": model,
        "text_conversations": state.conversation_count(ConversationKind::Text),
        "image_conversations": state.conversation_count(ConversationKind::Image),
    }))
}

async fn models_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let models: Vec<String> = state
        .provider
        .list_models()
        .await?
        .into_iter()
        .map(|model| model.name)
        .filter(|name| name.to_lowercase().contains("gemma"))
        .collect();
    Ok(Json(serde_json::json!({ "models": models })))
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/text", post(text_handler))
        .route("/api/image", post(image_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/status", get(status_handler))
        .route("/api/models", get(models_handler))
        .with_state(state)
}

/// Bind `bind` and serve the API until the process is stopped
///
/// # Errors
///
/// Returns error if the address cannot be bound or the server fails
pub async fn serve(config: &Config, provider: Arc<dyn Provider>, bind: &str) -> Result<()> {
    let state = Arc::new(
        AppState::new(provider, config.session.to_options())?
            .with_max_conversations(config.server.max_conversations),
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await.map_err(|e| {
        GemmaChatError::Config(format!("Failed to bind {}: {}", bind, e))
    })?;
    tracing::info!("Serving gemma-chat API on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
