use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use mamgo_core::checkout::{Basket, CheckoutItem};
use mamgo_core::error::CoreError;
use mamgo_core::models::{OrderStatus, PaymentMethod, UserRole};
use mamgo_core::{assignment, checkout, orders, transition};

use crate::auth::AuthActor;
use crate::error::ApiError;
use crate::models::*;

use super::{AppState, run_db, verify_order_access};

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/bulk", post(create_bulk_orders))
        .route("/orders/claimable", get(list_claimable_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/claim", post(claim_order))
        .route("/orders/{id}/status", post(update_order_status))
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    match raw {
        "pending" => Ok(OrderStatus::Pending),
        "preparing" => Ok(OrderStatus::Preparing),
        "shipping" => Ok(OrderStatus::Shipping),
        "delivered" => Ok(OrderStatus::Delivered),
        "completed" => Ok(OrderStatus::Completed),
        "cancelled" => Ok(OrderStatus::Cancelled),
        other => Err(ApiError::Core(CoreError::Validation(format!(
            "unknown order status {other:?}"
        )))),
    }
}

fn parse_payment_method(raw: &str) -> Result<PaymentMethod, ApiError> {
    match raw {
        "cod" => Ok(PaymentMethod::Cod),
        "online" => Ok(PaymentMethod::Online),
        other => Err(ApiError::Core(CoreError::Validation(format!(
            "unknown payment method {other:?}"
        )))),
    }
}

fn require_role(actor: &mamgo_core::models::Actor, role: UserRole) -> Result<(), ApiError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(ApiError::Core(CoreError::Authorization(format!(
            "requires the {role} role"
        ))))
    }
}

fn into_basket(restaurant_id: Uuid, items: Vec<OrderItemRequest>) -> Basket {
    Basket {
        restaurant_id,
        items: items
            .into_iter()
            .map(|item| CheckoutItem {
                food_id: item.food_id,
                quantity: item.quantity,
            })
            .collect(),
    }
}

#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
        (status = 404, description = "Food not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state))]
pub async fn create_order(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    require_role(&actor, UserRole::Customer)?;
    let payment_method = parse_payment_method(&payload.payment_method)?;
    let basket = into_basket(payload.restaurant_id, payload.items);

    let placed = run_db(&state, move |conn| {
        checkout::checkout(
            conn,
            actor.user_id,
            basket,
            payment_method,
            &payload.shipping_address,
        )
    })
    .await?;
    Ok(Json(placed.into()))
}

#[utoipa::path(
    post,
    path = "/orders/bulk",
    request_body = CreateBulkOrderRequest,
    responses(
        (status = 200, description = "One order per basket", body = [OrderResponse]),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state))]
pub async fn create_bulk_orders(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(payload): Json<CreateBulkOrderRequest>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    require_role(&actor, UserRole::Customer)?;
    let payment_method = parse_payment_method(&payload.payment_method)?;
    let baskets: Vec<Basket> = payload
        .baskets
        .into_iter()
        .map(|b| into_basket(b.restaurant_id, b.items))
        .collect();

    let placed = run_db(&state, move |conn| {
        checkout::checkout_many(
            conn,
            actor.user_id,
            baskets,
            payment_method,
            &payload.shipping_address,
        )
    })
    .await?;
    Ok(Json(placed.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "Orders visible to the caller", body = [OrderResponse]),
        (status = 400, description = "Bad request", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let listed = run_db(&state, move |conn| {
        orders::list_for_actor(conn, &actor, status)
    })
    .await?;
    Ok(Json(
        listed.into_iter().map(OrderResponse::from_order).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/orders/claimable",
    responses(
        (status = 200, description = "Unassigned preparing orders, oldest first", body = [OrderResponse]),
        (status = 403, description = "Courier role required", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state))]
pub async fn list_claimable_orders(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    require_role(&actor, UserRole::Courier)?;
    let listed = run_db(&state, assignment::list_claimable).await?;
    Ok(Json(
        listed.into_iter().map(OrderResponse::from_order).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    responses(
        (status = 200, description = "The order with its line items", body = OrderResponse),
        (status = 403, description = "Not a party to this order", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let (order, items) = run_db(&state, move |conn| {
        let (order, items) = orders::get_order(conn, id)?;
        verify_order_access(conn, &actor, &order)?;
        Ok((order, items))
    })
    .await?;
    Ok(Json(OrderResponse::with_line_items(order, items)))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/claim",
    responses(
        (status = 200, description = "Order claimed by the caller", body = OrderResponse),
        (status = 403, description = "Courier role required", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
        (status = 409, description = "Order already claimed", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state))]
pub async fn claim_order(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    require_role(&actor, UserRole::Courier)?;
    let claimed = run_db(&state, move |conn| {
        assignment::claim_order(conn, id, actor.user_id)
    })
    .await?;
    Ok(Json(OrderResponse::from_order(claimed)))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/status",
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order moved to the requested status", body = OrderResponse),
        (status = 403, description = "Caller may not drive this transition", body = ApiErrorResponse),
        (status = 404, description = "Order not found", body = ApiErrorResponse),
        (status = 409, description = "Transition not legal from the current status", body = ApiErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "orders"
)]
#[instrument(skip(state))]
pub async fn update_order_status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let target = parse_status(&payload.status)?;
    let updated = run_db(&state, move |conn| {
        transition::transition_status(conn, &actor, id, target)
    })
    .await?;
    Ok(Json(OrderResponse::from_order(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_parse_to_their_variants() {
        assert!(matches!(parse_status("shipping"), Ok(OrderStatus::Shipping)));
        assert!(matches!(
            parse_status("cancelled"),
            Ok(OrderStatus::Cancelled)
        ));
        assert!(parse_status("SHIPPING").is_err());
        assert!(parse_status("refunded").is_err());
    }

    #[test]
    fn payment_method_strings_parse_to_their_variants() {
        assert!(matches!(parse_payment_method("cod"), Ok(PaymentMethod::Cod)));
        assert!(matches!(
            parse_payment_method("online"),
            Ok(PaymentMethod::Online)
        ));
        assert!(parse_payment_method("wallet").is_err());
    }
}
