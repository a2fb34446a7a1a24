//! The order state machine.
//!
//! Authorization (which actor may request a move) is checked first,
//! from a snapshot of the order; the state guard itself is enforced by
//! a single conditional UPDATE so concurrent callers cannot interleave
//! a stale read with a write. The delivery credit rides in the same
//! transaction as the shipping→delivered flip, keyed on the same
//! guard, which makes it exactly-once.

use chrono::Utc;
use diesel::{prelude::*, update, PgConnection};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Actor, Order, OrderStatus, PaymentStatus, UserRole};
use crate::{delivery_fee, schema, wallet};

/// The legal edges of the machine. Everything else is a conflict.
pub fn allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Preparing)
            | (Preparing, Shipping)
            | (Shipping, Delivered)
            | (Delivered, Completed)
            | (Pending, Cancelled)
            | (Preparing, Cancelled)
            | (Shipping, Cancelled)
    )
}

/// Guard for the delivered flip and the wallet credit riding on it:
/// out for delivery, with a courier on the order. The credit fires
/// only on the write that found this true, so a replayed delivery
/// cannot credit twice.
pub fn deliverable(order: &Order) -> bool {
    order.status == OrderStatus::Shipping && order.courier_id.is_some()
}

/// Role/ownership check for a requested target status, evaluated
/// before the state guard. `restaurant_account` is the user operating
/// the order's restaurant.
pub fn authorize(
    actor: &Actor,
    order: &Order,
    restaurant_account: Uuid,
    target: OrderStatus,
) -> Result<(), CoreError> {
    if actor.role == UserRole::Admin {
        return Ok(());
    }

    let is_customer = actor.role == UserRole::Customer && actor.user_id == order.customer_id;
    let is_restaurant = actor.role == UserRole::Restaurant && actor.user_id == restaurant_account;
    let is_courier = actor.role == UserRole::Courier && order.courier_id == Some(actor.user_id);

    let permitted = match target {
        OrderStatus::Preparing | OrderStatus::Shipping => is_restaurant,
        OrderStatus::Delivered => is_courier,
        OrderStatus::Completed => is_customer,
        // Any owning party may cancel; see DESIGN.md for the policy.
        OrderStatus::Cancelled => is_customer || is_restaurant || is_courier,
        OrderStatus::Pending => false,
    };

    if permitted {
        Ok(())
    } else {
        Err(CoreError::Authorization(format!(
            "{} is not allowed to move this order to {}",
            actor.role, target
        )))
    }
}

/// Moves an order to `target` on behalf of `actor`, crediting the
/// courier's wallet when the order first reaches `delivered`.
pub fn transition_status(
    conn: &mut PgConnection,
    actor: &Actor,
    order_id: Uuid,
    target: OrderStatus,
) -> Result<Order, CoreError> {
    conn.transaction(|conn| {
        let order = schema::orders::table
            .select(Order::as_select())
            .find(&order_id)
            .first::<Order>(conn)
            .optional()?
            .ok_or(CoreError::NotFound("order"))?;
        let restaurant_account = schema::restaurants::table
            .select(schema::restaurants::account_id)
            .find(&order.restaurant_id)
            .first::<Uuid>(conn)
            .optional()?
            .ok_or(CoreError::NotFound("restaurant"))?;

        authorize(actor, &order, restaurant_account, target)?;

        if !allowed(order.status, target) {
            return Err(CoreError::InvalidTransition {
                current: order.status,
                requested: target,
            });
        }

        let now = Utc::now();
        let updated: Option<Order> = match target {
            OrderStatus::Preparing => update(schema::orders::table)
                .filter(schema::orders::id.eq(&order_id))
                .filter(schema::orders::status.eq(OrderStatus::Pending))
                .set((
                    schema::orders::status.eq(OrderStatus::Preparing),
                    schema::orders::updated_at.eq(now),
                ))
                .returning(Order::as_returning())
                .get_result::<Order>(conn)
                .optional()?,

            OrderStatus::Shipping => {
                if order.courier_id.is_none() {
                    return Err(CoreError::Conflict(
                        "order has no courier assigned yet".to_string(),
                    ));
                }
                update(schema::orders::table)
                    .filter(schema::orders::id.eq(&order_id))
                    .filter(schema::orders::status.eq(OrderStatus::Preparing))
                    .filter(schema::orders::courier_id.is_not_null())
                    .set((
                        schema::orders::status.eq(OrderStatus::Shipping),
                        schema::orders::updated_at.eq(now),
                    ))
                    .returning(Order::as_returning())
                    .get_result::<Order>(conn)
                    .optional()?
            }

            OrderStatus::Delivered => {
                if !deliverable(&order) {
                    return Err(CoreError::Conflict(
                        "order has no courier assigned yet".to_string(),
                    ));
                }
                let delivered = update(schema::orders::table)
                    .filter(schema::orders::id.eq(&order_id))
                    .filter(schema::orders::status.eq(OrderStatus::Shipping))
                    .filter(schema::orders::courier_id.is_not_null())
                    .set((
                        schema::orders::status.eq(OrderStatus::Delivered),
                        schema::orders::payment_status.eq(PaymentStatus::Paid),
                        schema::orders::updated_at.eq(now),
                    ))
                    .returning(Order::as_returning())
                    .get_result::<Order>(conn)
                    .optional()?;
                if let Some(delivered) = &delivered {
                    // Only the statement that won the flip gets here, so
                    // replays cannot credit twice.
                    let courier = delivered.courier_id.ok_or_else(|| {
                        CoreError::Conflict("order has no courier assigned yet".to_string())
                    })?;
                    wallet::credit(conn, courier, &delivery_fee())?;
                    tracing::info!(
                        order_id = %delivered.id,
                        courier_id = %courier,
                        "delivery fee credited"
                    );
                }
                delivered
            }

            OrderStatus::Completed => update(schema::orders::table)
                .filter(schema::orders::id.eq(&order_id))
                .filter(schema::orders::status.eq(OrderStatus::Delivered))
                .set((
                    schema::orders::status.eq(OrderStatus::Completed),
                    schema::orders::updated_at.eq(now),
                ))
                .returning(Order::as_returning())
                .get_result::<Order>(conn)
                .optional()?,

            OrderStatus::Cancelled => update(schema::orders::table)
                .filter(schema::orders::id.eq(&order_id))
                .filter(schema::orders::status.eq_any([
                    OrderStatus::Pending,
                    OrderStatus::Preparing,
                    OrderStatus::Shipping,
                ]))
                .set((
                    schema::orders::status.eq(OrderStatus::Cancelled),
                    schema::orders::updated_at.eq(now),
                ))
                .returning(Order::as_returning())
                .get_result::<Order>(conn)
                .optional()?,

            OrderStatus::Pending => {
                return Err(CoreError::Validation(
                    "orders cannot be moved back to pending".to_string(),
                ))
            }
        };

        match updated {
            Some(order) => {
                tracing::info!(order_id = %order.id, status = %order.status, "order transitioned");
                Ok(order)
            }
            None => {
                // Someone else won the race; report where the order
                // actually is now.
                let current = schema::orders::table
                    .select(schema::orders::status)
                    .find(&order_id)
                    .first::<OrderStatus>(conn)?;
                Err(CoreError::InvalidTransition {
                    current,
                    requested: target,
                })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::*;
    use crate::models::PaymentMethod;

    fn order(status: OrderStatus, customer: Uuid, courier: Option<Uuid>) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_id: customer,
            restaurant_id: Uuid::new_v4(),
            courier_id: courier,
            status,
            payment_method: PaymentMethod::Cod,
            payment_status: crate::models::PaymentStatus::Unpaid,
            total_amount: BigDecimal::from(45_000),
            shipping_address: "12 Hang Bac".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn every_edge_outside_the_table_is_rejected() {
        use OrderStatus::*;
        let all = [Pending, Preparing, Shipping, Delivered, Completed, Cancelled];
        let legal = [
            (Pending, Preparing),
            (Preparing, Shipping),
            (Shipping, Delivered),
            (Delivered, Completed),
            (Pending, Cancelled),
            (Preparing, Cancelled),
            (Shipping, Cancelled),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    allowed(from, to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn second_delivery_attempt_fails_the_guard_so_the_fee_credits_once() {
        let mut shipping = order(OrderStatus::Shipping, Uuid::new_v4(), Some(Uuid::new_v4()));
        assert!(deliverable(&shipping));

        // The winning flip leaves the order delivered; neither the
        // guard nor the transition table lets it through again.
        shipping.status = OrderStatus::Delivered;
        assert!(!deliverable(&shipping));
        assert!(!allowed(OrderStatus::Delivered, OrderStatus::Delivered));

        let unassigned = order(OrderStatus::Shipping, Uuid::new_v4(), None);
        assert!(!deliverable(&unassigned));
    }

    #[test]
    fn restaurant_owner_may_start_preparing_but_customer_may_not() {
        let account = Uuid::new_v4();
        let order = order(OrderStatus::Pending, Uuid::new_v4(), None);
        let owner = Actor::new(account, UserRole::Restaurant);
        assert!(authorize(&owner, &order, account, OrderStatus::Preparing).is_ok());

        let customer = Actor::new(order.customer_id, UserRole::Customer);
        assert!(matches!(
            authorize(&customer, &order, account, OrderStatus::Preparing),
            Err(CoreError::Authorization(_))
        ));
    }

    #[test]
    fn only_the_assigned_courier_may_deliver() {
        let courier = Uuid::new_v4();
        let order = order(OrderStatus::Shipping, Uuid::new_v4(), Some(courier));
        let account = Uuid::new_v4();

        let assigned = Actor::new(courier, UserRole::Courier);
        assert!(authorize(&assigned, &order, account, OrderStatus::Delivered).is_ok());

        let stranger = Actor::new(Uuid::new_v4(), UserRole::Courier);
        assert!(matches!(
            authorize(&stranger, &order, account, OrderStatus::Delivered),
            Err(CoreError::Authorization(_))
        ));
    }

    #[test]
    fn only_the_customer_may_complete() {
        let customer = Uuid::new_v4();
        let order = order(OrderStatus::Delivered, customer, Some(Uuid::new_v4()));
        let account = Uuid::new_v4();

        assert!(authorize(
            &Actor::new(customer, UserRole::Customer),
            &order,
            account,
            OrderStatus::Completed
        )
        .is_ok());
        assert!(authorize(
            &Actor::new(account, UserRole::Restaurant),
            &order,
            account,
            OrderStatus::Completed
        )
        .is_err());
    }

    #[test]
    fn every_owning_party_may_cancel() {
        let customer = Uuid::new_v4();
        let courier = Uuid::new_v4();
        let account = Uuid::new_v4();
        let order = order(OrderStatus::Preparing, customer, Some(courier));

        for actor in [
            Actor::new(customer, UserRole::Customer),
            Actor::new(account, UserRole::Restaurant),
            Actor::new(courier, UserRole::Courier),
            Actor::new(Uuid::new_v4(), UserRole::Admin),
        ] {
            assert!(authorize(&actor, &order, account, OrderStatus::Cancelled).is_ok());
        }

        let outsider = Actor::new(Uuid::new_v4(), UserRole::Customer);
        assert!(authorize(&outsider, &order, account, OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn role_must_match_ownership_not_just_id() {
        // A courier id that happens to equal the customer id must not
        // unlock customer-only moves.
        let shared = Uuid::new_v4();
        let order = order(OrderStatus::Delivered, shared, Some(Uuid::new_v4()));
        let courier = Actor::new(shared, UserRole::Courier);
        assert!(authorize(&courier, &order, Uuid::new_v4(), OrderStatus::Completed).is_err());
    }
}
