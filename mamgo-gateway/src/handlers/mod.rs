pub mod cart;
pub mod message;
pub mod order;
pub mod payment;

// Re-export routers for easier importing
pub use cart::router as cart_router;
pub use message::router as message_router;
pub use order::router as order_router;
pub use payment::router as payment_router;

use diesel::PgConnection;
use jsonwebtoken::DecodingKey;
use utoipa::OpenApi;

use mamgo_core::error::CoreError;
use mamgo_core::models::{Actor, Order, UserRole};
use mamgo_core::{orders, DbPool};

use crate::error::ApiError;
use crate::rooms::Rooms;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub decoding_key: DecodingKey,
    pub payment_secret: String,
    pub rooms: Rooms,
}

/// Runs a blocking database closure off the async runtime.
pub(crate) async fn run_db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    let pool = state.pool.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ApiError::InternalError(e.to_string()))?;
    result.map_err(ApiError::from)
}

/// An order may be read by its customer, its courier, the restaurant's
/// owning account, or an admin.
pub(crate) fn verify_order_access(
    conn: &mut PgConnection,
    actor: &Actor,
    order: &Order,
) -> Result<(), CoreError> {
    let allowed = match actor.role {
        UserRole::Admin => true,
        UserRole::Customer => order.customer_id == actor.user_id,
        UserRole::Courier => order.courier_id == Some(actor.user_id),
        UserRole::Restaurant => {
            orders::restaurant_account(conn, order.restaurant_id)? == actor.user_id
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(CoreError::Authorization(
            "not a party to this order".to_string(),
        ))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        cart::add_cart_item,
        cart::get_cart,
        order::create_order,
        order::create_bulk_orders,
        order::list_orders,
        order::list_claimable_orders,
        order::get_order,
        order::claim_order,
        order::update_order_status,
        message::list_order_messages,
        message::mark_messages_read,
        payment::vnpay_return,
    ),
    components(
        schemas(
            crate::models::ApiErrorResponse,
            crate::models::AddCartItemRequest,
            crate::models::CartItemResponse,
            crate::models::CartResponse,
            crate::models::OrderItemRequest,
            crate::models::CreateOrderRequest,
            crate::models::BasketRequest,
            crate::models::CreateBulkOrderRequest,
            crate::models::UpdateOrderStatusRequest,
            crate::models::OrderLineItemResponse,
            crate::models::OrderResponse,
            crate::models::MessageResponse,
            crate::models::MarkReadResponse,
            crate::models::PaymentReturnResponse,
        )
    ),
    tags(
        (name = "cart", description = "Shopping cart"),
        (name = "orders", description = "Order placement and lifecycle"),
        (name = "messages", description = "Per-order chat history"),
        (name = "payment", description = "Payment provider callbacks"),
    )
)]
pub struct ApiDoc;
