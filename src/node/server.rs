//! HTTP front end of a node.
//!
//! Every request is `PUT /{gid}/{service}/{method}` with a serialized argument
//! list as the body. The dispatcher resolves `(gid, service)` in the node's
//! routes, runs the method and answers with a serialized `{error, value}`
//! envelope.

use super::context::NodeContext;
use crate::codec;
use crate::comm::Envelope;
use crate::config::NodeConfig;
use crate::error::{Error, ErrorKind};
use crate::membership::types::Node;
use crate::routes::ServiceKey;

use axum::Router;
use axum::extract::Extension;
use axum::http::{Method, StatusCode, Uri};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            DispatchError::BadRequest(_) => ErrorKind::BadRequest,
            DispatchError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// A running node.
pub struct NodeHandle {
    ctx: Arc<NodeContext>,
    server: JoinHandle<()>,
}

impl NodeHandle {
    pub fn context(&self) -> &Arc<NodeContext> {
        &self.ctx
    }

    pub fn node(&self) -> &Node {
        self.ctx.node()
    }

    /// Stops the node and waits for the server task to finish.
    pub async fn stop(self) {
        self.ctx.stop();
        if let Err(e) = self.server.await {
            tracing::error!("Server task for {} ended abnormally: {}", self.ctx.node(), e);
        }
    }

    /// Waits until the node is stopped from elsewhere, e.g. by `status.stop`.
    pub async fn wait(self) {
        if let Err(e) = self.server.await {
            tracing::error!("Server task for {} ended abnormally: {}", self.ctx.node(), e);
        }
    }
}

/// Binds the configured address and starts serving.
///
/// With port 0 an ephemeral port is bound and the node's identity is taken
/// from the bound address.
pub async fn start(mut config: NodeConfig) -> std::io::Result<NodeHandle> {
    let listener = TcpListener::bind((config.node.ip.as_str(), config.node.port)).await?;
    let bound = listener.local_addr()?;
    config.node.port = bound.port();

    let ctx = NodeContext::new(config);
    let app = router(ctx.clone());
    tracing::info!(
        "Node {} listening on http://{}",
        ctx.node().sid(),
        bound
    );

    let shutdown_ctx = ctx.clone();
    let server = tokio::spawn(async move {
        let shutdown = async move { shutdown_ctx.stopped().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("Server error on {}: {}", bound, e);
        }
        tracing::info!("Node on {} stopped", bound);
    });

    Ok(NodeHandle { ctx, server })
}

pub fn router(ctx: Arc<NodeContext>) -> Router {
    Router::new().fallback(dispatch).layer(Extension(ctx))
}

async fn dispatch(
    Extension(ctx): Extension<Arc<NodeContext>>,
    method: Method,
    uri: Uri,
    body: String,
) -> (StatusCode, String) {
    match route(&ctx, &method, uri.path(), &body).await {
        Ok(envelope) => {
            let status = if envelope.is_failure() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            reply(status, &envelope)
        }
        Err(e) => {
            tracing::warn!("Rejected {} {}: {}", method, uri.path(), e);
            let status = e.status();
            reply(status, &Envelope::from_error(&e.into()))
        }
    }
}

async fn route(
    ctx: &Arc<NodeContext>,
    method: &Method,
    path: &str,
    body: &str,
) -> Result<Envelope, DispatchError> {
    if *method != Method::PUT {
        return Err(DispatchError::MethodNotAllowed(method.to_string()));
    }
    let (gid, service, method) = parse_path(path)?;
    let args = codec::deserialize(body)
        .map_err(|e| DispatchError::BadRequest(e.to_string()))?
        .items()
        .ok_or_else(|| DispatchError::BadRequest("body is not an argument list".to_string()))?;

    let object = ctx
        .routes
        .get(&ServiceKey::new(service, gid))
        .map_err(|e| DispatchError::NotFound(e.to_string()))?;
    let handler = object.method(method).ok_or_else(|| {
        DispatchError::NotFound(format!("method {} not found in service {}", method, service))
    })?;

    ctx.status.record_message();
    tracing::debug!("Dispatching /{}/{}/{} ({} args)", gid, service, method, args.len());
    Ok(handler(ctx.clone(), args).await)
}

/// Splits `/{gid}/{service}/{method}`. Anything but exactly three non-empty
/// segments is a bad request.
pub fn parse_path(path: &str) -> Result<(&str, &str, &str), DispatchError> {
    let mut segments = path.strip_prefix('/').unwrap_or(path).split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(gid), Some(service), Some(method), None)
            if !gid.is_empty() && !service.is_empty() && !method.is_empty() =>
        {
            Ok((gid, service, method))
        }
        _ => Err(DispatchError::BadRequest(format!(
            "expected /{{gid}}/{{service}}/{{method}}, got {path}"
        ))),
    }
}

fn reply(status: StatusCode, envelope: &Envelope) -> (StatusCode, String) {
    match codec::serialize(&envelope.to_value()) {
        Ok(body) => (status, body),
        Err(e) => {
            tracing::error!("Failed to serialize reply: {}", e);
            let fallback = Envelope::from_error(&Error::from(e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                codec::serialize(&fallback.to_value()).unwrap_or_default(),
            )
        }
    }
}
