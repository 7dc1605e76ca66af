use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, patch, post},
    Json, Router,
};
use blueprint_diff::{GraphDiff, NodeBuildState};
use blueprint_model::FieldValue;
use blueprint_workspace::{
    spawn_document_watcher, AuthorityConfig, AuthorityError, GraphAuthority, Subscription,
    WriteOptions,
};
use clap::Parser;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blueprint-server")]
#[command(about = "Serve a blueprint graph and stream its snapshots", long_about = None)]
struct Args {
    /// Project directory holding the graph documents
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// HTTP port to listen on
    #[arg(short, long, default_value_t = 3030)]
    port: u16,

    /// Coalescing window for snapshot broadcasts, in milliseconds
    #[arg(long, default_value_t = 100)]
    broadcast_window_ms: u64,

    /// Updates a stream subscriber may fall behind by before it is dropped
    #[arg(long, default_value_t = 64)]
    buffer: usize,

    /// Do not pick up outside edits of the current document
    #[arg(long)]
    no_watch: bool,
}

impl Args {
    fn config(&self) -> AuthorityConfig {
        let config = AuthorityConfig::new(&self.root)
            .with_broadcast_window(Duration::from_millis(self.broadcast_window_ms))
            .with_subscriber_buffer(self.buffer);
        if self.no_watch {
            config.without_watch()
        } else {
            config
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config();
    tracing::info!(root = ?config.root, port = args.port, "starting blueprint server");

    let authority = GraphAuthority::new(config);

    let _watcher = if authority.config().watch {
        Some(spawn_document_watcher(authority.clone())?)
    } else {
        None
    };

    let app = router(authority);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(authority: GraphAuthority) -> Router {
    Router::new()
        .route("/api/graph", get(get_current).put(put_current))
        .route("/api/graph/base", get(get_base).put(put_base))
        .route("/api/graph/diff", get(get_diff))
        .route("/api/graph/props", get(get_projection))
        .route("/api/graph/build", post(post_build))
        .route(
            "/api/graph/nodes/:node/properties/:property",
            patch(patch_property),
        )
        .route("/api/graph/stream", get(stream_snapshots))
        .with_state(authority)
        .layer(CorsLayer::permissive())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ============================================================================
// Errors
// ============================================================================

struct ApiError(AuthorityError);

impl From<AuthorityError> for ApiError {
    fn from(e: AuthorityError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AuthorityError::Decode(_) => StatusCode::BAD_REQUEST,
            AuthorityError::UnknownNode(_) | AuthorityError::UnknownProperty { .. } => {
                StatusCode::NOT_FOUND
            }
            AuthorityError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::warn!(error = %self.0, "request rejected");
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
struct WriteQuery {
    /// Present only on interactive writes
    broadcast: Option<bool>,
}

impl WriteQuery {
    fn options(&self) -> WriteOptions {
        match self.broadcast {
            Some(broadcast) => WriteOptions::interactive(broadcast),
            None => WriteOptions::agent(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionResponse {
    version: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildResponse {
    base_version: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiffResponse {
    diff: GraphDiff,
    build_states: Vec<NodeBuildState>,
}

fn document_response(document: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], document).into_response()
}

async fn get_current(State(authority): State<GraphAuthority>) -> ApiResult<Response> {
    Ok(document_response(authority.current_document().await?))
}

async fn put_current(
    State(authority): State<GraphAuthority>,
    Query(query): Query<WriteQuery>,
    body: String,
) -> ApiResult<Json<VersionResponse>> {
    let version = authority.write_document(&body, query.options()).await?;
    Ok(Json(VersionResponse { version }))
}

async fn get_base(State(authority): State<GraphAuthority>) -> ApiResult<Response> {
    match authority.base().await? {
        Some(base) => Ok(document_response(blueprint_codec::encode(&base))),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn put_base(
    State(authority): State<GraphAuthority>,
    body: String,
) -> ApiResult<Json<BuildResponse>> {
    let graph = blueprint_codec::decode(&body).map_err(AuthorityError::from)?;
    let base_version = authority.record_build(Some(graph)).await?;
    Ok(Json(BuildResponse { base_version }))
}

async fn post_build(State(authority): State<GraphAuthority>) -> ApiResult<Json<BuildResponse>> {
    let base_version = authority.record_build(None).await?;
    Ok(Json(BuildResponse { base_version }))
}

async fn get_diff(State(authority): State<GraphAuthority>) -> ApiResult<Json<DiffResponse>> {
    let diff = authority.diff().await?;
    let build_states = authority.build_states().await?;
    Ok(Json(DiffResponse { diff, build_states }))
}

async fn get_projection(
    State(authority): State<GraphAuthority>,
) -> ApiResult<Json<std::collections::BTreeMap<String, FieldValue>>> {
    Ok(Json(authority.projection().await?))
}

async fn patch_property(
    State(authority): State<GraphAuthority>,
    Path((node, property)): Path<(String, String)>,
    Query(query): Query<WriteQuery>,
    Json(value): Json<FieldValue>,
) -> ApiResult<Json<VersionResponse>> {
    let version = authority
        .patch_property(&node, &property, value, query.options())
        .await?;
    Ok(Json(VersionResponse { version }))
}

/// Server-sent events: one `snapshot` event per update, id = version,
/// data = the encoded document
async fn stream_snapshots(
    State(authority): State<GraphAuthority>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let subscription = authority.subscribe().await?;

    let events = stream::unfold(subscription, |mut subscription: Subscription| async move {
        let update = subscription.next().await?;
        tracing::debug!(version = update.version, "[SSE] forwarding snapshot");
        let event = Event::default()
            .event("snapshot")
            .id(update.version.to_string())
            .data(update.document);
        Some((Ok(event), subscription))
    });

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
