use chrono::Utc;
use diesel::{prelude::*, update, PgConnection};
use uuid::Uuid;

use crate::error::CoreError;
use crate::{models, schema};

/// The claim guard: `preparing` and no courier yet. This is exactly
/// the predicate the claim UPDATE carries, so of two racing claims the
/// winner's write makes the loser's re-read fail it.
pub fn claimable(order: &models::Order) -> bool {
    order.status == models::OrderStatus::Preparing && order.courier_id.is_none()
}

/// Claims an unassigned `preparing` order for a courier.
///
/// The guard (status and vacancy) lives in the UPDATE's predicate, so
/// two couriers racing for the same order resolve inside Postgres:
/// exactly one statement matches a row, the other sees zero rows and
/// gets a conflict.
pub fn claim_order(
    conn: &mut PgConnection,
    order_id: Uuid,
    courier_id: Uuid,
) -> Result<models::Order, CoreError> {
    let claimed = update(schema::orders::table)
        .filter(schema::orders::id.eq(&order_id))
        .filter(schema::orders::status.eq(models::OrderStatus::Preparing))
        .filter(schema::orders::courier_id.is_null())
        .set((
            schema::orders::courier_id.eq(&courier_id),
            schema::orders::updated_at.eq(Utc::now()),
        ))
        .returning(models::Order::as_returning())
        .get_result::<models::Order>(conn)
        .optional()?;

    match claimed {
        Some(order) => {
            tracing::info!(order_id = %order.id, courier_id = %courier_id, "order claimed");
            Ok(order)
        }
        None => {
            let current = schema::orders::table
                .select(models::Order::as_select())
                .find(&order_id)
                .first::<models::Order>(conn)
                .optional()?;
            match current {
                Some(order) if !claimable(&order) => Err(CoreError::Conflict(
                    "order is no longer available".to_string(),
                )),
                // The UPDATE lost to a writer that has since rolled
                // back; the guard holds again, so a retry can win.
                Some(_) => Err(CoreError::Transient(
                    "order claim raced with another writer".to_string(),
                )),
                None => Err(CoreError::NotFound("order")),
            }
        }
    }
}

/// Orders a courier may still claim: `preparing` and unassigned.
pub fn list_claimable(conn: &mut PgConnection) -> Result<Vec<models::Order>, CoreError> {
    let orders = schema::orders::table
        .select(models::Order::as_select())
        .filter(schema::orders::status.eq(models::OrderStatus::Preparing))
        .filter(schema::orders::courier_id.is_null())
        .order(schema::orders::created_at.asc())
        .load::<models::Order>(conn)?;
    Ok(orders)
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::*;
    use crate::models::{Order, OrderStatus, PaymentMethod, PaymentStatus};

    fn preparing_order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            courier_id: None,
            status: OrderStatus::Preparing,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Unpaid,
            total_amount: BigDecimal::from(45_000),
            shipping_address: "12 Hang Bac".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn of_two_racing_claims_only_one_finds_the_order_claimable() {
        let mut order = preparing_order();
        assert!(claimable(&order));

        // The winner's UPDATE writes the courier; the loser re-reads
        // this row and its guard no longer holds.
        order.courier_id = Some(Uuid::new_v4());
        assert!(!claimable(&order));
    }

    #[test]
    fn only_unassigned_preparing_orders_are_claimable() {
        use OrderStatus::*;
        for status in [Pending, Shipping, Delivered, Completed, Cancelled] {
            let mut order = preparing_order();
            order.status = status;
            assert!(!claimable(&order), "{status}");
        }
    }
}
