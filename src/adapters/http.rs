use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            error::BillingError,
            message::{Message, MessagePattern},
        },
        infra::postgres::message_repo::{self, MessageStatus},
    },
    axum::{
        Json, Router,
        body::Bytes,
        extract::{DefaultBodyLimit, Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    },
    serde_json::{Value, json},
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
    uuid::Uuid,
};

/// Client-chosen id that makes `POST /messages/{pattern}` idempotent.
pub const MESSAGE_ID_HEADER: &str = "x-message-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/rpc/{pattern}", post(rpc_handler))
        // POST takes a pattern, GET a message id
        .route(
            "/messages/{key}",
            post(enqueue_handler).get(message_status_handler),
        )
        .layer(DefaultBodyLimit::max(256 * 1024))
        .with_state(state)
}

/// [`router`] with request tracing and a whole-request time budget. Requests
/// over budget get `408 Request Timeout`.
pub fn app(state: AppState, request_budget: Duration) -> Router {
    router(state).layer((
        TraceLayer::new_for_http(),
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_budget),
    ))
}

/// Empty bodies stand for patterns without a payload (`getBalance`).
pub fn parse_payload(body: &[u8]) -> Result<Value, BillingError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| BillingError::ValidationFailed(format!("invalid JSON body: {e}")))
}

/// Synchronous request/reply.
pub async fn rpc_handler(
    State(state): State<AppState>,
    Path(pattern): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let pattern: MessagePattern = pattern.parse()?;
    let message = Message::decode(pattern, parse_payload(&body)?)?;
    let handled = state.billing.handle(message, None).await?;
    Ok(Json(handled.reply))
}

/// At-least-once delivery through the queue. The payload is decoded up front
/// so malformed messages are refused instead of parked.
pub async fn enqueue_handler(
    State(state): State<AppState>,
    Path(pattern): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let pattern: MessagePattern = pattern.parse()?;
    let payload = parse_payload(&body)?;
    Message::decode(pattern, payload.clone())?;

    let dedup_key = headers
        .get(MESSAGE_ID_HEADER)
        .map(|v| {
            v.to_str()
                .map_err(|_| BillingError::ValidationFailed(format!("{MESSAGE_ID_HEADER} is not ASCII")))
        })
        .transpose()?;

    let (id, inserted) = message_repo::enqueue(&state.pool, pattern, &payload, dedup_key).await?;
    if !inserted {
        tracing::info!(message_id = %id, "duplicate message, already enqueued");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message_id": id, "duplicate": !inserted })),
    ))
}

/// Reply correlation for queued messages.
pub async fn message_status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageStatus>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| BillingError::ValidationFailed(format!("invalid message id: {id}")))?;
    message_repo::get(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(BillingError::ResourceMissing(format!("message {id}"))))
}
