//! HTTP interface of the queue.
//!
//! - `PATCH /{path}/{external_id}` enqueues the request body.
//! - `GET /{path}/{external_id}` dequeues the oldest message, whatever its id.
//!
//! Anything else is answered with 403.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{QueueError, SimpleQueue};

type AppState = Arc<SimpleQueue>;

/// Router serving `queue` under `/{path}`. An empty path serves at the root.
pub fn router(queue: AppState, path: &str) -> Router {
  let prefix = match path.trim_matches('/') {
    "" => String::new(),
    path => format!("/{}", path),
  };

  Router::new()
    .route(
      &format!("{}/{{external_id}}", prefix),
      get(dequeue).patch(enqueue).fallback(forbidden),
    )
    .route(&format!("{}/", prefix), patch(missing_id).fallback(forbidden))
    .fallback(forbidden)
    .with_state(queue)
}

async fn enqueue(State(queue): State<AppState>, Path(external_id): Path<String>, body: Bytes) -> Response {
  if external_id.is_empty() {
    return missing_id().await.into_response();
  }
  if body.is_empty() {
    return (StatusCode::UNPROCESSABLE_ENTITY, "body can not be empty").into_response();
  }

  debug!(external_id = %external_id, bytes = body.len(), "message enqueued");
  queue.enqueue(external_id, String::from_utf8_lossy(&body));
  StatusCode::OK.into_response()
}

async fn dequeue(State(queue): State<AppState>) -> Response {
  match queue.dequeue() {
    Some(message) => Json(message).into_response(),
    None => StatusCode::NOT_FOUND.into_response(),
  }
}

async fn missing_id() -> (StatusCode, &'static str) {
  (StatusCode::BAD_REQUEST, "external_id is mandatory")
}

async fn forbidden(uri: Uri) -> StatusCode {
  debug!(uri = %uri, "request to unknown route");
  StatusCode::FORBIDDEN
}

/// A running queue server.
pub struct QueueServer {
  addr: SocketAddr,
  queue: AppState,
  shutdown: oneshot::Sender<()>,
  task: JoinHandle<std::io::Result<()>>,
}

impl QueueServer {
  /// Bind `addr` and start serving in the background. Port 0 picks a free port.
  pub async fn start(addr: &str, path: &str) -> Result<Self, QueueError> {
    let listener = TcpListener::bind(addr).await.map_err(|source| QueueError::Bind {
      addr: addr.to_string(),
      source,
    })?;
    let local_addr = listener.local_addr().map_err(|source| QueueError::Bind {
      addr: addr.to_string(),
      source,
    })?;

    let queue = Arc::new(SimpleQueue::new());
    let app = router(Arc::clone(&queue), path);
    let (shutdown, signal) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
      axum::serve(listener, app)
        .with_graceful_shutdown(async move {
          // A dropped sender also stops the server.
          let _ = signal.await;
        })
        .await
    });

    info!(addr = %local_addr, path = %path, "queue listening");
    Ok(Self {
      addr: local_addr,
      queue,
      shutdown,
      task,
    })
  }

  pub fn addr(&self) -> SocketAddr {
    self.addr
  }

  /// Base URL, e.g. `http://127.0.0.1:38211`.
  pub fn url(&self) -> String {
    format!("http://{}", self.addr)
  }

  /// The queue behind the server, for direct access from tests.
  pub fn queue(&self) -> Arc<SimpleQueue> {
    Arc::clone(&self.queue)
  }

  /// Stop accepting requests and wait for in-flight ones to finish.
  pub async fn shutdown(self) -> Result<(), QueueError> {
    let _ = self.shutdown.send(());
    self.task.await?.map_err(|source| QueueError::Serve {
      addr: self.addr,
      source,
    })?;
    info!(addr = %self.addr, "queue stopped");
    Ok(())
  }
}
