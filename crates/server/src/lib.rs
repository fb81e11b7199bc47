//! Server runtime: the save/load HTTP API plus served previews.

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use playground_core::{
    model::{format_timestamp, ProjectSource},
    traits::ProjectStore,
    validate::{require_sources, validate_project_name},
    CoreError, ValidationError,
};
use playground_preview::{render_document, SANDBOX_POLICY};
use playground_proto::{self as proto, LoadProjectResponse, MessageResponse, ProjectListItem, SaveProjectRequest};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(String),
}

/// Failure answered to the client as `{message}` with `status`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(MessageResponse::new(self.message))).into_response()
    }
}

pub struct Server<S> {
    storage: Arc<S>,
}

impl<S> Clone for Server<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S> Server<S>
where
    S: ProjectStore + Send + Sync + 'static,
{
    /// `storage` must already be initialized; the server never creates its root.
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(proto::ROUTE_SAVE_PROJECT, post(save_project::<S>))
            .route(proto::ROUTE_LIST_PROJECTS, get(list_projects::<S>))
            .route(proto::ROUTE_LOAD_PROJECT, get(load_project::<S>))
            .route(proto::ROUTE_DELETE_PROJECT, delete(delete_project::<S>))
            .route(proto::ROUTE_PREVIEW_PROJECT, get(preview_project::<S>))
            .route(proto::ROUTE_HEALTHZ, get(healthz))
            .layer(middleware::from_fn(cors))
            .with_state(self.clone())
    }

    /// Bind `addr` and serve until Ctrl-C.
    pub async fn run_http(&self, addr: &str) -> Result<(), ServerError> {
        let bind_addr: SocketAddr = addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ServerError::Io(e.to_string()))?;
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| ServerError::Io(e.to_string()))?;

        let shutdown_token = CancellationToken::new();
        let trigger = shutdown_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl_c received; shutting down http server");
                trigger.cancel();
            }
        });

        info!(%addr, "http server listening");
        self.serve(listener, shutdown_token).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await
            .map_err(|e| ServerError::Io(e.to_string()))?;
        info!("http server stopped");
        Ok(())
    }

    /// Run a store call on the blocking pool.
    async fn with_storage<T, F>(&self, op: F) -> Result<T, CoreError>
    where
        F: FnOnce(&S) -> Result<T, S::Error> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        match tokio::task::spawn_blocking(move || op(&storage)).await {
            Ok(res) => res.map_err(Into::into),
            Err(e) => Err(CoreError::Internal(e.to_string())),
        }
    }

    pub async fn handle_save(&self, req: SaveProjectRequest) -> Result<MessageResponse, ApiError> {
        let (name, source) = match validate_save_request(req) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(error = %e, "save rejected");
                return Err(ApiError::new(StatusCode::BAD_REQUEST, proto::MSG_MISSING_FIELDS));
            }
        };
        let name_for_save = name.clone();
        let res = self
            .with_storage(move |storage| storage.save(&name_for_save, &source))
            .await;
        match res {
            Ok(meta) => {
                info!(
                    project = %name,
                    last_modified = %format_timestamp(meta.last_modified),
                    "project saved"
                );
                Ok(MessageResponse::new(proto::saved_message(&name)))
            }
            Err(CoreError::Validation(e)) => {
                warn!(project = %name, error = %e, "save rejected");
                Err(ApiError::new(StatusCode::BAD_REQUEST, proto::MSG_MISSING_FIELDS))
            }
            Err(CoreError::Conflict(existing)) => {
                warn!(project = %name, existing = %existing, "save refused: storage key collision");
                Err(ApiError::new(
                    StatusCode::CONFLICT,
                    proto::conflict_message(&name, &existing),
                ))
            }
            Err(e) => {
                error!(project = %name, error = %e, "error saving project");
                Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, proto::MSG_SAVE_FAILED))
            }
        }
    }

    pub async fn handle_list(&self) -> Result<Vec<ProjectListItem>, ApiError> {
        match self.with_storage(|storage| storage.list()).await {
            Ok(projects) => {
                debug!(returned = projects.len(), "projects listed");
                Ok(projects
                    .into_iter()
                    .map(|p| ProjectListItem {
                        name: p.name,
                        last_modified: format_timestamp(p.last_modified),
                    })
                    .collect())
            }
            Err(e) => {
                error!(error = %e, "error listing projects");
                Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, proto::MSG_LIST_FAILED))
            }
        }
    }

    pub async fn handle_load(&self, name: String) -> Result<LoadProjectResponse, ApiError> {
        let source = self.load_source(name).await?;
        Ok(LoadProjectResponse {
            html: source.markup,
            css: source.style,
            js: source.script,
        })
    }

    pub async fn handle_delete(&self, name: String) -> Result<MessageResponse, ApiError> {
        let name_for_delete = name.clone();
        match self
            .with_storage(move |storage| storage.delete(&name_for_delete))
            .await
        {
            Ok(()) => {
                info!(project = %name, "project deleted");
                Ok(MessageResponse::new(proto::deleted_message(&name)))
            }
            Err(CoreError::Validation(e)) => {
                warn!(project = %name, error = %e, "delete rejected");
                Err(ApiError::new(StatusCode::BAD_REQUEST, proto::MSG_INVALID_NAME))
            }
            Err(e) => {
                error!(project = %name, error = %e, "error deleting project");
                Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, proto::MSG_DELETE_FAILED))
            }
        }
    }

    /// The saved project assembled into its standalone preview document.
    pub async fn handle_preview(&self, name: String) -> Result<String, ApiError> {
        let source = self.load_source(name).await?;
        Ok(render_document(&source))
    }

    async fn load_source(&self, name: String) -> Result<ProjectSource, ApiError> {
        let name_for_load = name.clone();
        match self
            .with_storage(move |storage| storage.load(&name_for_load))
            .await
        {
            Ok(source) => {
                debug!(project = %name, "project loaded");
                Ok(source)
            }
            Err(CoreError::NotFound(_)) => {
                debug!(project = %name, "project not found");
                Err(ApiError::new(StatusCode::NOT_FOUND, proto::MSG_NOT_FOUND))
            }
            Err(e) => {
                error!(project = %name, error = %e, "error loading project");
                Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, proto::MSG_LOAD_FAILED))
            }
        }
    }
}

fn validate_save_request(req: SaveProjectRequest) -> Result<(String, ProjectSource), ValidationError> {
    let SaveProjectRequest { name, html, css, js } = req;
    let name = name.ok_or(ValidationError::MissingField("name"))?;
    validate_project_name(&name)?;
    let source = require_sources(html, css, js)?;
    Ok((name, source))
}

async fn save_project<S>(
    State(srv): State<Server<S>>,
    body: Result<Json<SaveProjectRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    let Json(req) = body.map_err(|rejection| {
        warn!(error = %rejection, "unreadable save body");
        ApiError::new(StatusCode::BAD_REQUEST, proto::MSG_MISSING_FIELDS)
    })?;
    srv.handle_save(req).await.map(Json)
}

async fn list_projects<S>(
    State(srv): State<Server<S>>,
) -> Result<Json<Vec<ProjectListItem>>, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    srv.handle_list().await.map(Json)
}

async fn load_project<S>(
    State(srv): State<Server<S>>,
    Path(name): Path<String>,
) -> Result<Json<LoadProjectResponse>, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    srv.handle_load(name).await.map(Json)
}

async fn delete_project<S>(
    State(srv): State<Server<S>>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    srv.handle_delete(name).await.map(Json)
}

/// Served previews run under a CSP sandbox, which gives the document an
/// opaque origin just like the editor's sandboxed frame.
async fn preview_project<S>(
    State(srv): State<Server<S>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    let document = srv.handle_preview(name).await?;
    let headers = [
        (header::CONTENT_TYPE, HTML_CONTENT_TYPE.to_owned()),
        (header::CONTENT_SECURITY_POLICY, format!("sandbox {SANDBOX_POLICY}")),
    ];
    Ok((headers, document).into_response())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"ok": true}))
}

/// Open CORS for the editor page, which is served from a different origin.
async fn cors(req: Request, next: Next) -> Response {
    let mut res = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    let headers = res.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,HEAD,POST,DELETE,OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    res
}
