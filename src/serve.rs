//! Purpose: Provide the HTTP/JSON server for the nodebook store protocol.
//! Exports: `ServeConfig`, `Server`, `init_tracing`.
//! Role: Axum router binding a `NodeStore` to a listening socket; all tree
//! semantics live in the wrapped store.
//! Invariants: Request/response bodies match the `core::wire` contract.
//! Invariants: One failing request never terminates the serving loop;
//! internal faults are logged and reported as opaque 500s.
//! Invariants: The listener is bound before `start` returns and released
//! when `shutdown` returns; in-flight requests drain on shutdown.

use axum::Json;
use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::core::error::{Error, ErrorKind};
use crate::core::node::NodeId;
use crate::core::store::{NodeStore, StoreResult};
use crate::core::wire::{self, CreatedBody, MatchesBody, MoveBody, RootBody, SearchBody};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub path_prefix: String,
}

impl ServeConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            path_prefix: "/".to_string(),
        }
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }
}

struct AppState<S> {
    store: S,
}

/// Handle owning the listening socket and the serving loop.
///
/// The loop runs on a dedicated runtime thread; `shutdown` consumes the
/// handle, signals the loop, and returns once the socket is released.
/// Dropping an un-shut-down handle signals the loop without waiting.
pub struct Server {
    local_addr: SocketAddr,
    path_prefix: String,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<thread::JoinHandle<Result<(), Error>>>,
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

impl Server {
    pub fn start<S>(config: ServeConfig, store: S) -> Result<Self, Error>
    where
        S: NodeStore + Send + Sync + 'static,
    {
        let path_prefix = normalize_prefix(&config.path_prefix);
        let listener = std::net::TcpListener::bind(config.bind).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
        listener.set_nonblocking(true).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to configure listener")
                .with_source(err)
        })?;
        let local_addr = listener.local_addr().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read bound address")
                .with_source(err)
        })?;

        let app = router(Arc::new(AppState { store }), &path_prefix);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let worker = thread::Builder::new()
            .name("nodebook-serve".to_string())
            .spawn(move || serve_loop(listener, app, shutdown_rx))
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to spawn server thread")
                    .with_source(err)
            })?;

        tracing::info!(addr = %local_addr, prefix = %path_prefix, "server listening");
        Ok(Self {
            local_addr,
            path_prefix,
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL clients should connect to, trailing slash included.
    pub fn base_url(&self) -> String {
        format!(
            "http://{}{}/",
            self.local_addr,
            self.path_prefix.trim_end_matches('/')
        )
    }

    /// Stop accepting connections, drain in-flight requests, and return
    /// once the serving loop has exited and the socket is released.
    pub fn shutdown(mut self) -> Result<(), Error> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or_else(|_| {
                Err(Error::new(ErrorKind::Internal).with_message("server worker panicked"))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn serve_loop(
    listener: std::net::TcpListener,
    app: axum::Router,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to build server runtime")
                .with_source(err)
        })?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to adopt listener")
                .with_source(err)
        })?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })
    })
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn router<S>(state: Arc<AppState<S>>, prefix: &str) -> axum::Router
where
    S: NodeStore + Send + Sync + 'static,
{
    let routes = axum::Router::new()
        .route("/", get(root_id::<S>))
        .route("/nodes", post(create_node::<S>))
        .route("/nodes/", post(create_node::<S>))
        .route(
            "/nodes/:id",
            get(get_node::<S>)
                .post(create_node_with_id::<S>)
                .put(set_attrs::<S>)
                .delete(delete_node::<S>),
        )
        .route("/nodes/:id/parent", put(move_node::<S>))
        .route("/search", post(search_title::<S>))
        .fallback(unknown_route)
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    if prefix == "/" {
        routes
    } else {
        axum::Router::new().nest(prefix, routes).fallback(unknown_route)
    }
}

async fn root_id<S>(State(state): State<Arc<AppState<S>>>) -> Response
where
    S: NodeStore + Send + Sync + 'static,
{
    respond(state.store.root_id().map(|rootid| RootBody { rootid }))
}

async fn get_node<S>(
    State(state): State<Arc<AppState<S>>>,
    AxumPath(id): AxumPath<String>,
) -> Response
where
    S: NodeStore + Send + Sync + 'static,
{
    let id = NodeId::new(id);
    respond(state.store.node(&id).map(|node| wire::encode_node(&node)))
}

async fn create_node<S>(State(state): State<Arc<AppState<S>>>, body: Bytes) -> Response
where
    S: NodeStore + Send + Sync + 'static,
{
    respond(create_inner(&state, None, &body))
}

async fn create_node_with_id<S>(
    State(state): State<Arc<AppState<S>>>,
    AxumPath(id): AxumPath<String>,
    body: Bytes,
) -> Response
where
    S: NodeStore + Send + Sync + 'static,
{
    respond(create_inner(&state, Some(NodeId::new(id)), &body))
}

fn create_inner<S>(
    state: &AppState<S>,
    id: Option<NodeId>,
    body: &[u8],
) -> StoreResult<CreatedBody>
where
    S: NodeStore + Send + Sync + 'static,
{
    let object = wire::parse_object(body)?;
    let (parent, attrs) = wire::split_create(object)?;
    let parent = match parent {
        Some(parent) => parent,
        None => state.store.root_id()?,
    };
    let nodeid = state.store.create_node(&parent, attrs, id)?;
    Ok(CreatedBody { nodeid })
}

async fn set_attrs<S>(
    State(state): State<Arc<AppState<S>>>,
    AxumPath(id): AxumPath<String>,
    body: Bytes,
) -> Response
where
    S: NodeStore + Send + Sync + 'static,
{
    let id = NodeId::new(id);
    let result = wire::parse_object(&body)
        .and_then(|attrs| wire::ensure_plain_attrs(&attrs).map(|()| attrs))
        .and_then(|attrs| state.store.set_attrs(&id, attrs))
        .map(|()| json!({}));
    respond(result)
}

async fn delete_node<S>(
    State(state): State<Arc<AppState<S>>>,
    AxumPath(id): AxumPath<String>,
) -> Response
where
    S: NodeStore + Send + Sync + 'static,
{
    let id = NodeId::new(id);
    respond(state.store.delete_node(&id).map(|()| json!({})))
}

async fn move_node<S>(
    State(state): State<Arc<AppState<S>>>,
    AxumPath(id): AxumPath<String>,
    body: Bytes,
) -> Response
where
    S: NodeStore + Send + Sync + 'static,
{
    let id = NodeId::new(id);
    let result = wire::parse_body::<MoveBody>(&body)
        .and_then(|body| state.store.move_node(&id, &body.parentid))
        .map(|()| json!({}));
    respond(result)
}

async fn search_title<S>(State(state): State<Arc<AppState<S>>>, body: Bytes) -> Response
where
    S: NodeStore + Send + Sync + 'static,
{
    let result = wire::parse_body::<SearchBody>(&body)
        .and_then(|body| state.store.search_title(&body.title))
        .map(|matches| MatchesBody { matches });
    respond(result)
}

async fn unknown_route(uri: Uri) -> Response {
    let err = Error::new(ErrorKind::Protocol)
        .with_message(format!("unknown route: {}", uri.path()));
    json_with_status(StatusCode::NOT_FOUND, &wire::envelope_for(&err))
}

fn respond<T: Serialize>(result: StoreResult<T>) -> Response {
    match result {
        Ok(body) => json_with_status(StatusCode::OK, &body),
        Err(err) => error_response(err),
    }
}

fn error_response(err: Error) -> Response {
    match err.kind() {
        ErrorKind::NodeNotFound
        | ErrorKind::DuplicateId
        | ErrorKind::CycleDetected
        | ErrorKind::InvalidOperation
        | ErrorKind::Protocol => envelope_response(&err),
        _ => {
            tracing::error!(error = %err, "internal server error");
            let opaque = Error::new(ErrorKind::Internal).with_message("internal error");
            envelope_response(&opaque)
        }
    }
}

fn envelope_response(err: &Error) -> Response {
    let status = StatusCode::from_u16(wire::status_for(err.kind()))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_with_status(status, &wire::envelope_for(err))
}

fn json_with_status<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let mut response = match serde_json::to_value(body) {
        Ok(value) => (status, Json(value)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": { "kind": "Internal", "message": "internal error" } })),
            )
                .into_response()
        }
    };
    response
        .headers_mut()
        .insert("nodebook-version", HeaderValue::from_static("0"));
    response
}

#[cfg(test)]
mod tests {
    use super::{ServeConfig, Server, normalize_prefix};
    use crate::core::memory::MemoryStore;

    #[test]
    fn prefix_normalization_is_forgiving() {
        assert_eq!(normalize_prefix("/"), "/");
        assert_eq!(normalize_prefix(""), "/");
        assert_eq!(normalize_prefix("notebook"), "/notebook");
        assert_eq!(normalize_prefix("/notebook/"), "/notebook");
        assert_eq!(normalize_prefix("/a/b/"), "/a/b");
    }

    #[test]
    fn base_url_always_ends_with_a_slash() {
        let server = Server::start(
            ServeConfig::new("127.0.0.1:0".parse().expect("bind")),
            MemoryStore::new(),
        )
        .expect("start");
        let url = server.base_url();
        assert!(url.starts_with("http://127.0.0.1:"));
        assert!(url.ends_with('/'));
        server.shutdown().expect("shutdown");
    }

    #[test]
    fn prefixed_base_url_nests_the_routes() {
        let server = Server::start(
            ServeConfig::new("127.0.0.1:0".parse().expect("bind")).with_path_prefix("/notebook"),
            MemoryStore::new(),
        )
        .expect("start");
        assert!(server.base_url().ends_with("/notebook/"));
        server.shutdown().expect("shutdown");
    }
}
