use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use super::models::{ErrorResponse, RelayQuery};
use super::state::AppState;
use crate::pages::{self, EditorView};
use crate::relay::{self, RelayFailure};
use crate::settings::Settings;
use crate::templates::Template;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn run_server(settings: Settings, addr: String) -> Result<()> {
    let state = Arc::new(AppState::from_settings(settings)?);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("serving on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(gallery))
        .route("/editor/:template_id", get(editor))
        .route("/api/templates", get(list_templates))
        .route("/api/templates/:template_id", get(get_template))
        .route(relay::RELAY_PATH, get(image_proxy))
        .route("/sitemap.xml", get(sitemap))
        .with_state(state)
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
        HeaderValue::from_static("GET,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

fn html_page(status: StatusCode, rendered: Result<String>) -> Response<Body> {
    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            error!("failed to render page: {:#}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

async fn gallery(State(state): State<Arc<AppState>>) -> Response<Body> {
    let view = pages::load_gallery(&state.repository).await;
    html_page(
        StatusCode::OK,
        pages::render_gallery_page(&state.settings, &view),
    )
}

async fn editor(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> Response<Body> {
    match pages::load_editor(&state.repository, &template_id).await {
        EditorView::Ready { template } => html_page(
            StatusCode::OK,
            pages::render_editor_page(&state.settings, &template),
        ),
        EditorView::NotFound => html_page(
            StatusCode::NOT_FOUND,
            pages::render_not_found_page(&state.settings),
        ),
        EditorView::Error { message } => html_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            pages::render_error_page(&state.settings, &message),
        ),
        EditorView::Loading => html_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            pages::render_error_page(&state.settings, pages::EDITOR_ERROR),
        ),
    }
}

async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Template>>, ApiError> {
    let templates = state.repository.list_templates().await.map_err(|err| {
        error!("failed to fetch templates: {:#}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(pages::GALLERY_ERROR)),
        )
    })?;
    Ok(Json(templates))
}

async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> Result<Json<Template>, ApiError> {
    let template = state
        .repository
        .get_template(&template_id)
        .await
        .map_err(|err| {
            error!("failed to fetch template: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(pages::EDITOR_ERROR)),
            )
        })?;
    template.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(pages::NOT_FOUND_TITLE)),
        )
    })
}

async fn image_proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RelayQuery>,
) -> Result<Response<Body>, ApiError> {
    let url = state
        .relay
        .policy()
        .check(query.url.as_deref())
        .map_err(|rejection| {
            warn!("relay rejected {:?}: {}", query.url, rejection.message());
            (
                rejection.status(),
                Json(ErrorResponse::new(rejection.message())),
            )
        })?;
    let image = state.relay.fetch(url).await.map_err(|failure| match failure {
        RelayFailure::Upstream(status) => (
            status,
            Json(ErrorResponse::new("Failed to fetch image")),
        ),
        RelayFailure::TooLarge { limit } => {
            warn!("image proxy refused a body over {} bytes", limit);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new("Image too large")),
            )
        }
        RelayFailure::Transport(err) => {
            error!("image proxy error: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Proxy error")),
            )
        }
    })?;

    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(relay::DEFAULT_CONTENT_TYPE));
    let mut response = Response::new(Body::from(image.bytes));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(relay::CACHE_CONTROL));
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    Ok(response)
}

async fn sitemap(State(state): State<Arc<AppState>>) -> Response<Body> {
    let entries = pages::generate_sitemap(
        &state.repository,
        &state.settings.site_base_url,
        OffsetDateTime::now_utc(),
    )
    .await;
    match pages::render_sitemap(&entries) {
        Ok(xml) => ([(CONTENT_TYPE, "application/xml")], xml).into_response(),
        Err(err) => {
            error!("failed to render sitemap: {:#}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
