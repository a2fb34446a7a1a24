use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use tracing::instrument;

use mamgo_core::cart;
use mamgo_core::error::CoreError;
use mamgo_core::models::UserRole;

use crate::auth::AuthActor;
use crate::error::ApiError;
use crate::models::*;

use super::{AppState, run_db};

pub fn router() -> Router<AppState> {
    Router::new().route("/cart", get(get_cart)).route("/cart/items", post(add_cart_item))
}

fn require_customer(actor: &mamgo_core::models::Actor) -> Result<(), ApiError> {
    if actor.role == UserRole::Customer {
        Ok(())
    } else {
        Err(ApiError::Core(CoreError::Authorization(
            "only customers have a cart".to_string(),
        )))
    }
}

#[utoipa::path(
    post,
    path = "/cart/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Item added", body = CartResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 404, description = "Food not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "cart"
)]
#[instrument(skip(state))]
pub async fn add_cart_item(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    require_customer(&actor)?;
    let view = run_db(&state, move |conn| {
        cart::add_item(conn, actor.user_id, payload.food_id, payload.quantity)
    })
    .await?;
    Ok(Json(view.into()))
}

#[utoipa::path(
    get,
    path = "/cart",
    responses(
        (status = 200, description = "The caller's cart", body = CartResponse),
        (status = 404, description = "No cart yet", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "cart"
)]
#[instrument(skip(state))]
pub async fn get_cart(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> Result<Json<CartResponse>, ApiError> {
    require_customer(&actor)?;
    let view = run_db(&state, move |conn| {
        cart::get_cart(conn, actor.user_id)?.ok_or(CoreError::NotFound("cart"))
    })
    .await?;
    Ok(Json(view.into()))
}
