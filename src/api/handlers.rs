//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    BrowseRequest, ChatRequest, ErrorResponse, GenerateComponentRequest, VersionResponse,
};
use super::{AppState, Services};
use crate::conversation::Conversation;
use crate::orchestrator::EventSink;
use crate::tools::{
    BrowseOutput, BrowseTool, ComponentOutput, FetchError, GenerateComponentTool, ToolError,
};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Events buffered between the turn and a slow client
const EVENT_BUFFER: usize = 64;

const MISSING_CREDENTIALS: &str =
    "Missing GOOGLE_API_KEY – make sure to set it in the server environment";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/chat", post(chat))
        .route("/tool/browse", post(browse))
        .route("/tool/generate-component", post(generate_component))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_credentials,
        ));

    Router::new()
        .merge(api)
        .route("/version", get(get_version))
        .with_state(state)
}

/// Refuse every API call before any other processing when the credential is absent
async fn require_credentials(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.services.is_none() {
        tracing::warn!(path = %request.uri().path(), "Rejecting request: no model credential");
        return AppError::BadRequest(ErrorResponse::new(MISSING_CREDENTIALS)).into_response();
    }
    next.run(request).await
}

impl AppState {
    fn services(&self) -> Result<&Services, AppError> {
        self.services
            .as_deref()
            .ok_or_else(|| AppError::BadRequest(ErrorResponse::new(MISSING_CREDENTIALS)))
    }
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let services = state.services()?;
    let Json(req) = payload?;

    if req.messages.is_empty() {
        return Err(AppError::BadRequest(ErrorResponse::new(
            "Missing or empty messages in request body",
        )));
    }
    tracing::debug!(messages = req.messages.len(), "Chat request");

    // A turn can't start while an earlier call still waits for its result
    let conversation = Conversation::from_messages(req.messages)
        .and_then(|conversation| conversation.ensure_settled().map(|()| conversation))
        .map_err(|e| {
            AppError::BadRequest(
                ErrorResponse::new("Invalid conversation").with_details(e.to_string()),
            )
        })?;

    let (sink, events) = EventSink::channel(EVENT_BUFFER);
    let orchestrator = services.orchestrator.clone();

    // Detached so a client hanging up doesn't cancel running tools
    tokio::spawn(async move {
        // Failures are logged and reported as the stream's final event
        let _ = orchestrator.run_turn(conversation, sink).await;
    });

    Ok(sse_stream(events).into_response())
}

// ============================================================
// Tools
// ============================================================

async fn browse(
    State(state): State<AppState>,
    payload: Result<Json<BrowseRequest>, JsonRejection>,
) -> Result<Json<BrowseOutput>, AppError> {
    let services = state.services()?;
    let Json(req) = payload?;

    let url = req
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(ErrorResponse::new("URL is required")))?;

    let output = BrowseTool::browse(url.trim(), &services.tools)
        .await
        .map_err(browse_error)?;
    Ok(Json(output))
}

fn browse_error(error: ToolError) -> AppError {
    match error {
        ToolError::Fetch(FetchError::Status { status, reason }) => AppError::Upstream(
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            ErrorResponse::new(format!("Failed to fetch URL: {reason}")),
        ),
        ToolError::Fetch(e) => AppError::BadRequest(
            ErrorResponse::new("Failed to fetch URL").with_details(e.to_string()),
        ),
        ToolError::EmptyContent => AppError::BadRequest(ErrorResponse::new(
            "Could not extract text content from the URL.",
        )),
        other => {
            tracing::error!(error = %other, "Browse failed");
            AppError::Internal(
                ErrorResponse::new("Failed to browse URL").with_details(other.to_string()),
            )
        }
    }
}

async fn generate_component(
    State(state): State<AppState>,
    payload: Result<Json<GenerateComponentRequest>, JsonRejection>,
) -> Result<Json<ComponentOutput>, AppError> {
    let services = state.services()?;
    let Json(req) = payload?;

    let api_docs = req
        .api_docs
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(ErrorResponse::new("API documentation is required")))?;

    let output = GenerateComponentTool::generate(&api_docs, &services.tools)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Component generation failed");
            AppError::Internal(
                ErrorResponse::new("Failed to generate component").with_details(e.to_string()),
            )
        })?;
    Ok(Json(output))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(ErrorResponse),
    /// A fetched resource answered with a non-success status; relayed as is
    Upstream(StatusCode, ErrorResponse),
    Internal(ErrorResponse),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(
            ErrorResponse::new("Invalid request body").with_details(rejection.body_text()),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(body) => (StatusCode::BAD_REQUEST, body),
            AppError::Upstream(status, body) => (status, body),
            AppError::Internal(body) => (StatusCode::INTERNAL_SERVER_ERROR, body),
        };

        (status, Json(body)).into_response()
    }
}
