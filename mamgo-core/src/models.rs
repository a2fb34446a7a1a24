use std::io::Write;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{cart_items, carts, foods, messages, order_line_items, orders, restaurants, users};

#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::OrderStatus)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Shipping,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<crate::schema::sql_types::OrderStatus, Pg> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::OrderStatus, Pg> for OrderStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"pending" => Ok(OrderStatus::Pending),
            b"preparing" => Ok(OrderStatus::Preparing),
            b"shipping" => Ok(OrderStatus::Shipping),
            b"delivered" => Ok(OrderStatus::Delivered),
            b"completed" => Ok(OrderStatus::Completed),
            b"cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::PaymentMethod)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Online,
}

impl ToSql<crate::schema::sql_types::PaymentMethod, Pg> for PaymentMethod {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            PaymentMethod::Cod => out.write_all(b"cod")?,
            PaymentMethod::Online => out.write_all(b"online")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::PaymentMethod, Pg> for PaymentMethod {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"cod" => Ok(PaymentMethod::Cod),
            b"online" => Ok(PaymentMethod::Online),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::PaymentStatus)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
}

impl ToSql<crate::schema::sql_types::PaymentStatus, Pg> for PaymentStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            PaymentStatus::Unpaid => out.write_all(b"unpaid")?,
            PaymentStatus::Paid => out.write_all(b"paid")?,
            PaymentStatus::Failed => out.write_all(b"failed")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::PaymentStatus, Pg> for PaymentStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"unpaid" => Ok(PaymentStatus::Unpaid),
            b"paid" => Ok(PaymentStatus::Paid),
            b"failed" => Ok(PaymentStatus::Failed),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::MessageType)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    System,
}

impl ToSql<crate::schema::sql_types::MessageType, Pg> for MessageType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            MessageType::Text => out.write_all(b"text")?,
            MessageType::System => out.write_all(b"system")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::MessageType, Pg> for MessageType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"text" => Ok(MessageType::Text),
            b"system" => Ok(MessageType::System),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(FromSqlRow, AsExpression, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::UserRole)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Restaurant,
    Courier,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Restaurant => "restaurant",
            UserRole::Courier => "courier",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<crate::schema::sql_types::UserRole, Pg> for UserRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::UserRole, Pg> for UserRole {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"customer" => Ok(UserRole::Customer),
            b"restaurant" => Ok(UserRole::Restaurant),
            b"courier" => Ok(UserRole::Courier),
            b"admin" => Ok(UserRole::Admin),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

/// Caller identity as decoded by the credential layer. Role-gated
/// operations check this before any state-machine guard.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar: Option<String>,
    pub wallet_balance: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq, Clone)]
#[diesel(table_name = restaurants)]
pub struct Restaurant {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub address: String,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq, Clone)]
#[diesel(table_name = foods)]
pub struct Food {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub image: Option<String>,
    pub available: bool,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq, Clone)]
#[diesel(table_name = carts)]
pub struct Cart {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub total_amount: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Debug, PartialEq, Clone)]
#[diesel(belongs_to(Cart))]
#[diesel(table_name = cart_items)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub food_id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub image: Option<String>,
    pub quantity: i32,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq, Clone)]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub total_amount: BigDecimal,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Debug, PartialEq, Clone)]
#[diesel(belongs_to(Order))]
#[diesel(table_name = order_line_items)]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub food_id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub image: Option<String>,
    pub quantity: i32,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Debug, PartialEq, Clone)]
#[diesel(belongs_to(Order))]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
