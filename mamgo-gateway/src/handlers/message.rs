use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use mamgo_core::{messages, orders};

use crate::auth::AuthActor;
use crate::error::ApiError;
use crate::models::*;

use super::{AppState, run_db, verify_order_access};

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/messages", get(list_order_messages))
        .route("/orders/{id}/messages/read", post(mark_messages_read))
}

#[utoipa::path(
    get,
    path = "/orders/{id}/messages",
    responses(
        (status = 200, description = "Chat history, newest first", body = [MessageResponse]),
        (status = 403, description = "Not a party to this order", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "messages"
)]
#[instrument(skip(state))]
pub async fn list_order_messages(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);
    let history = run_db(&state, move |conn| {
        let (order, _) = orders::get_order(conn, id)?;
        verify_order_access(conn, &actor, &order)?;
        messages::list_messages(conn, id, limit, offset)
    })
    .await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/messages/read",
    responses(
        (status = 200, description = "Unread messages addressed to the caller marked read", body = MarkReadResponse),
        (status = 403, description = "Not a party to this order", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "messages"
)]
#[instrument(skip(state))]
pub async fn mark_messages_read(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let marked = run_db(&state, move |conn| {
        let (order, _) = orders::get_order(conn, id)?;
        verify_order_access(conn, &actor, &order)?;
        messages::mark_read(conn, id, actor.user_id)
    })
    .await?;
    Ok(Json(MarkReadResponse { marked }))
}
