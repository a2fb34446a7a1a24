use chrono::Utc;
use diesel::{insert_into, prelude::*, update, PgConnection};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Message, MessageType, Order};
use crate::schema;

/// Chat on an order is strictly between its customer and its courier;
/// the pair must match in either direction.
pub fn valid_pair(order: &Order, sender_id: Uuid, receiver_id: Uuid) -> bool {
    match order.courier_id {
        Some(courier_id) => {
            (sender_id == order.customer_id && receiver_id == courier_id)
                || (sender_id == courier_id && receiver_id == order.customer_id)
        }
        None => false,
    }
}

pub fn create_message(
    conn: &mut PgConnection,
    sender_id: Uuid,
    order_id: Uuid,
    receiver_id: Uuid,
    content: &str,
    message_type: MessageType,
) -> Result<Message, CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::Validation(
            "message content must not be empty".to_string(),
        ));
    }

    let order = schema::orders::table
        .select(Order::as_select())
        .find(&order_id)
        .first::<Order>(conn)
        .optional()?
        .ok_or(CoreError::NotFound("order"))?;

    if !valid_pair(&order, sender_id, receiver_id) {
        return Err(CoreError::Authorization(
            "sender and receiver do not match this order's parties".to_string(),
        ));
    }

    let message = Message {
        id: Uuid::new_v4(),
        order_id,
        sender_id,
        receiver_id,
        content: content.to_string(),
        message_type,
        is_read: false,
        created_at: Utc::now(),
    };
    insert_into(schema::messages::table)
        .values(&message)
        .execute(conn)?;
    Ok(message)
}

/// Newest-first history page for an order's chat.
pub fn list_messages(
    conn: &mut PgConnection,
    order_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>, CoreError> {
    let messages = schema::messages::table
        .select(Message::as_select())
        .filter(schema::messages::order_id.eq(&order_id))
        .order(schema::messages::created_at.desc())
        .limit(limit.clamp(1, 100))
        .offset(offset.max(0))
        .load::<Message>(conn)?;
    Ok(messages)
}

/// Flips the read flag on every unread message addressed to `receiver_id`
/// on this order. Returns how many were flipped.
pub fn mark_read(
    conn: &mut PgConnection,
    order_id: Uuid,
    receiver_id: Uuid,
) -> Result<usize, CoreError> {
    let flipped = update(schema::messages::table)
        .filter(schema::messages::order_id.eq(&order_id))
        .filter(schema::messages::receiver_id.eq(&receiver_id))
        .filter(schema::messages::is_read.eq(false))
        .set(schema::messages::is_read.eq(true))
        .execute(conn)?;
    Ok(flipped)
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::*;
    use crate::models::{OrderStatus, PaymentMethod, PaymentStatus};

    fn order(customer_id: Uuid, courier_id: Option<Uuid>) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_id,
            restaurant_id: Uuid::new_v4(),
            courier_id,
            status: OrderStatus::Shipping,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Unpaid,
            total_amount: BigDecimal::from(30_000),
            shipping_address: "3 Ta Hien".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pair_is_valid_in_both_directions() {
        let customer = Uuid::new_v4();
        let courier = Uuid::new_v4();
        let order = order(customer, Some(courier));
        assert!(valid_pair(&order, customer, courier));
        assert!(valid_pair(&order, courier, customer));
    }

    #[test]
    fn third_parties_are_rejected() {
        let customer = Uuid::new_v4();
        let courier = Uuid::new_v4();
        let order = order(customer, Some(courier));
        let stranger = Uuid::new_v4();
        assert!(!valid_pair(&order, stranger, courier));
        assert!(!valid_pair(&order, customer, stranger));
        assert!(!valid_pair(&order, customer, customer));
    }

    #[test]
    fn unassigned_order_has_no_valid_pair() {
        let customer = Uuid::new_v4();
        let order = order(customer, None);
        assert!(!valid_pair(&order, customer, Uuid::new_v4()));
    }
}
