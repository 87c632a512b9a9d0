use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::editor::Editor;

use super::models::{
    CaptionRequest, CaptionResponse, ErrorResponse, GenerateRequest, GenerateResponse,
    PreviewResponse, RenderRequest, UploadRequest, UploadResponse,
};
use super::pipeline::{
    ServerError, caption_request, generate_request, render_request, upload_request,
};
use super::state::ServerState;

type HandlerResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

pub async fn run_server(editor: Editor, addr: String) -> Result<()> {
    let body_limit = editor.settings().request_body_limit();
    let state = Arc::new(ServerState {
        editor: Arc::new(editor),
    });
    let app = router(state, body_limit);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<ServerState>, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/render-preview", post(render_preview))
        .route("/api/generate", post(generate))
        .route("/api/generate-memes", post(generate_memes))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

/// Detection, inpainting and rendering are CPU bound, so every request runs
/// on the blocking pool and drives its async parts from there.
async fn run_blocking<T, F, Fut>(state: Arc<ServerState>, work: F) -> HandlerResult<T>
where
    T: Serialize + Send + 'static,
    F: FnOnce(Arc<Editor>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ServerError>>,
{
    let editor = Arc::clone(&state.editor);
    let handle = tokio::runtime::Handle::current();
    let result = tokio::task::spawn_blocking(move || handle.block_on(work(editor)))
        .await
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("server task failed: {}", err),
                }),
            )
        })?;

    match result {
        Ok(response) => Ok(Json(response)),
        Err(err) => Err((err.status, Json(ErrorResponse { error: err.message }))),
    }
}

async fn upload(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<UploadRequest>,
) -> HandlerResult<UploadResponse> {
    run_blocking(state, move |editor| async move {
        upload_request(&editor, payload)
    })
    .await
}

async fn render_preview(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<RenderRequest>,
) -> HandlerResult<PreviewResponse> {
    run_blocking(state, move |editor| async move {
        render_request(&editor, payload)
    })
    .await
}

async fn generate(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<GenerateRequest>,
) -> HandlerResult<GenerateResponse> {
    run_blocking(state, move |editor| async move {
        generate_request(&editor, payload).await
    })
    .await
}

async fn generate_memes(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<CaptionRequest>,
) -> HandlerResult<CaptionResponse> {
    run_blocking(state, move |editor| async move {
        caption_request(&editor, payload).await
    })
    .await
}
