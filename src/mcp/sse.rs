//! HTTP + Server-Sent Events transport
//!
//! A client opens an event stream on the SSE path and receives an `endpoint`
//! event naming the URL to POST its JSON-RPC messages to. Replies are pushed
//! back over the stream as `message` events.

use crate::config::ServerConfig;
use crate::mcp::protocol::JsonRpcMessage;
use crate::mcp::server::{McpServer, MessageHandler, parse_message};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SESSION_CHANNEL_CAPACITY: usize = 32;

type Sessions = Arc<RwLock<HashMap<Uuid, Session>>>;

/// One connected SSE client
#[derive(Clone)]
struct Session {
    handler: MessageHandler,
    sender: mpsc::Sender<JsonRpcMessage>,
}

/// Shared state of the SSE transport
#[derive(Clone)]
pub struct SseState {
    server: Arc<McpServer>,
    sessions: Sessions,
    sse_path: String,
    message_path: String,
    keep_alive: Duration,
}

/// Removes its session from the table once the event stream is dropped
struct SessionGuard {
    session_id: Uuid,
    sessions: Sessions,
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: Option<String>,
}

impl SseState {
    #[inline]
    pub fn new(server: Arc<McpServer>, config: &ServerConfig) -> Self {
        Self {
            server,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            sse_path: config.sse_path.clone(),
            message_path: config.message_path.clone(),
            keep_alive: config.keep_alive_interval(),
        }
    }

    /// Number of currently open SSE sessions
    #[inline]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session, ending their event streams
    async fn close_sessions(&self) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values() {
            session.handler.close().await;
        }
        sessions.clear();
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let sessions = Arc::clone(&self.sessions);
        let session_id = self.session_id;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let removed = sessions.write().await.remove(&session_id);
                if let Some(session) = removed {
                    session.handler.close().await;
                    info!("Closed SSE session {}", session_id);
                }
            });
        }
    }
}

/// Build the axum router serving the SSE and message endpoints
#[inline]
pub fn router(state: SseState) -> Router {
    Router::new()
        .route(&state.sse_path, get(open_stream))
        .route(&state.message_path, post(post_message))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
#[inline]
pub async fn serve(server: Arc<McpServer>, config: &ServerConfig) -> Result<()> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("MCP server listening on {}", config.sse_url());

    serve_with_shutdown(listener, SseState::new(server, config), ctrl_c()).await
}

/// Serve on an already bound listener until `signal` completes
///
/// Open sessions are closed once the signal fires, which ends their event
/// streams and lets in-flight connections drain.
#[inline]
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: SseState,
    signal: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            info!("Shutdown signal received, closing SSE sessions");
            state.close_sessions().await;
        })
        .await
        .context("HTTP server failed")?;

    info!("MCP server stopped");
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn open_stream(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4();
    let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_CAPACITY);

    let session = Session {
        handler: MessageHandler::new(Arc::clone(&state.server)),
        sender,
    };
    state.sessions.write().await.insert(session_id, session);
    info!("Opened SSE session {}", session_id);

    let endpoint = format!("{}?session_id={}", state.message_path, session_id.simple());
    let guard = SessionGuard {
        session_id,
        sessions: Arc::clone(&state.sessions),
    };

    let announce = stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint))
    });
    let replies = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        loop {
            let message = receiver.recv().await?;
            if let Some(event) = message_event(&message) {
                return Some((Ok::<_, Infallible>(event), (receiver, guard)));
            }
        }
    });

    Sse::new(announce.chain(replies)).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

async fn post_message(
    State(state): State<SseState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(raw_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "session_id is required").into_response();
    };

    let Ok(session_id) = Uuid::parse_str(&raw_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid session ID").into_response();
    };

    let session = state.sessions.read().await.get(&session_id).cloned();
    let Some(session) = session else {
        warn!("Message for unknown SSE session {}", session_id);
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };

    let message = match parse_message(&body) {
        Ok(message) => message,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, e.message).into_response();
        }
    };

    if let Some(reply) = session.handler.process_message(message).await
        && session.sender.send(reply).await.is_err()
    {
        warn!("SSE session {} closed before the reply was sent", session_id);
        state.sessions.write().await.remove(&session_id);
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

/// Encode a reply as a `message` event, dropping replies that fail to serialize
fn message_event(message: &JsonRpcMessage) -> Option<Event> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Event::default().event("message").data(json)),
        Err(e) => {
            error!("Dropping reply that failed to serialize: {}", e);
            None
        }
    }
}

/// Log every HTTP request and its response status at debug level
async fn log_requests(request: Request, next: Next) -> Response {
    debug!("Incoming request: {} {}", request.method(), request.uri());
    debug!("Headers: {:?}", request.headers());
    debug!("Query params: {}", request.uri().query().unwrap_or_default());

    let response = next.run(request).await;

    debug!("Response status: {}", response.status());
    response
}
