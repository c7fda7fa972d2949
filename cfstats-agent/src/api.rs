use crate::config::Listener;
use crate::dispatch::Dispatcher;
use crate::errors::AgentError;
use crate::filters::QueryFilterSet;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(state_handler))
        .route("/{endpoint}", get(endpoint_handler))
        .with_state(dispatcher)
}

pub async fn serve(listener: &Listener, dispatcher: Arc<Dispatcher>) -> Result<(), ApiError> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let tcp = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(tcp, router(dispatcher)).await?;
    Ok(())
}

async fn state_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
) -> Result<Json<Value>, AgentError> {
    dispatcher
        .handle("", &QueryFilterSet::default())
        .await
        .map(Json)
}

async fn endpoint_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(endpoint): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AgentError> {
    let filters = QueryFilterSet::from_pairs(params);
    dispatcher.handle(&endpoint, &filters).await.map(Json)
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = match self {
            AgentError::Validation { .. } => StatusCode::BAD_REQUEST,
            AgentError::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
            AgentError::Store(ref err) => {
                tracing::error!(error = %err, "Aggregation query failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ApiErrorResponse {
            error: ErrorBody {
                kind: self.kind(),
                message: self.to_string(),
            },
        });

        (status, body).into_response()
    }
}
