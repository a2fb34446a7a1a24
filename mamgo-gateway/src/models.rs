use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mamgo_core::cart::CartView;
use mamgo_core::checkout::PlacedOrder;
use mamgo_core::models::{self, MessageType, PaymentMethod, PaymentStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Error message
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    /// Food to add
    pub food_id: Uuid,
    /// How many to add (merged into the existing line if present)
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub food_id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    /// Price snapshot taken when the item was added (as string)
    pub price: String,
    pub image: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    /// Sum of price times quantity over all items (as string)
    pub total_amount: String,
    pub items: Vec<CartItemResponse>,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        CartResponse {
            id: view.cart.id,
            total_amount: money(&view.cart.total_amount),
            items: view
                .items
                .into_iter()
                .map(|item| CartItemResponse {
                    food_id: item.food_id,
                    restaurant_id: item.restaurant_id,
                    name: item.name,
                    price: money(&item.price),
                    image: item.image,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub food_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Restaurant all items belong to
    pub restaurant_id: Uuid,
    pub items: Vec<OrderItemRequest>,
    /// "cod" or "online"
    pub payment_method: String,
    pub shipping_address: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BasketRequest {
    pub restaurant_id: Uuid,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateBulkOrderRequest {
    /// One basket per restaurant; each becomes its own order
    pub baskets: Vec<BasketRequest>,
    /// "cod" or "online"
    pub payment_method: String,
    pub shipping_address: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Target status: "preparing", "shipping", "delivered", "completed"
    /// or "cancelled"
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineItemResponse {
    pub food_id: Uuid,
    pub name: String,
    /// Price snapshot taken at checkout (as string)
    pub price: String,
    pub image: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
    /// Order total including nothing but the line items (as string)
    pub total_amount: String,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present on single-order reads, empty on listings
    pub line_items: Vec<OrderLineItemResponse>,
}

impl OrderResponse {
    pub fn from_order(order: models::Order) -> Self {
        Self::with_line_items(order, Vec::new())
    }

    pub fn with_line_items(order: models::Order, items: Vec<models::OrderLineItem>) -> Self {
        OrderResponse {
            id: order.id,
            customer_id: order.customer_id,
            restaurant_id: order.restaurant_id,
            courier_id: order.courier_id,
            status: order.status.as_str().to_string(),
            payment_method: payment_method_str(order.payment_method).to_string(),
            payment_status: payment_status_str(order.payment_status).to_string(),
            total_amount: money(&order.total_amount),
            shipping_address: order.shipping_address,
            created_at: order.created_at,
            updated_at: order.updated_at,
            line_items: items
                .into_iter()
                .map(|item| OrderLineItemResponse {
                    food_id: item.food_id,
                    name: item.name,
                    price: money(&item.price),
                    image: item.image,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

impl From<PlacedOrder> for OrderResponse {
    fn from(placed: PlacedOrder) -> Self {
        OrderResponse::with_line_items(placed.order, placed.line_items)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub message_type: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<models::Message> for MessageResponse {
    fn from(message: models::Message) -> Self {
        MessageResponse {
            id: message.id,
            order_id: message.order_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            message_type: match message.message_type {
                MessageType::Text => "text".to_string(),
                MessageType::System => "system".to_string(),
            },
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResponse {
    /// How many messages were newly marked as read
    pub marked: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentReturnResponse {
    /// "confirmed", "failed", "ignored" or "rejected"
    pub result: String,
    pub order_id: Option<Uuid>,
}

pub fn payment_method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cod => "cod",
        PaymentMethod::Online => "online",
    }
}

pub fn payment_status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Unpaid => "unpaid",
        PaymentStatus::Paid => "paid",
        PaymentStatus::Failed => "failed",
    }
}

fn money(amount: &BigDecimal) -> String {
    amount.normalized().to_string()
}
