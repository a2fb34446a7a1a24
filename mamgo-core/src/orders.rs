use diesel::{prelude::*, PgConnection};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Actor, Order, OrderLineItem, OrderStatus, UserRole};
use crate::schema;

pub fn get_order(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<(Order, Vec<OrderLineItem>), CoreError> {
    let order = schema::orders::table
        .select(Order::as_select())
        .find(&order_id)
        .first::<Order>(conn)
        .optional()?
        .ok_or(CoreError::NotFound("order"))?;
    let line_items = schema::order_line_items::table
        .select(OrderLineItem::as_select())
        .filter(schema::order_line_items::order_id.eq(&order_id))
        .load::<OrderLineItem>(conn)?;
    Ok((order, line_items))
}

/// The user operating an order's restaurant; used for restaurant-gated
/// authorization checks.
pub fn restaurant_account(
    conn: &mut PgConnection,
    restaurant_id: Uuid,
) -> Result<Uuid, CoreError> {
    schema::restaurants::table
        .select(schema::restaurants::account_id)
        .find(&restaurant_id)
        .first::<Uuid>(conn)
        .optional()?
        .ok_or(CoreError::NotFound("restaurant"))
}

/// Orders visible to the caller: their own side of the ledger, or all
/// of it for admins. Newest first.
pub fn list_for_actor(
    conn: &mut PgConnection,
    actor: &Actor,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>, CoreError> {
    let mut query = schema::orders::table
        .select(Order::as_select())
        .into_boxed();

    match actor.role {
        UserRole::Customer => {
            query = query.filter(schema::orders::customer_id.eq(actor.user_id));
        }
        UserRole::Courier => {
            query = query.filter(schema::orders::courier_id.eq(actor.user_id));
        }
        UserRole::Restaurant => {
            let restaurant_ids = schema::restaurants::table
                .select(schema::restaurants::id)
                .filter(schema::restaurants::account_id.eq(actor.user_id))
                .load::<Uuid>(conn)?;
            query = query.filter(schema::orders::restaurant_id.eq_any(restaurant_ids));
        }
        UserRole::Admin => {}
    }

    if let Some(status) = status {
        query = query.filter(schema::orders::status.eq(status));
    }

    let orders = query
        .order(schema::orders::created_at.desc())
        .load::<Order>(conn)?;
    Ok(orders)
}
