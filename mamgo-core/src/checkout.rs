use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::{insert_into, prelude::*, PgConnection};
use uuid::Uuid;

use crate::error::CoreError;
use crate::{cart, models, schema};

#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub food_id: Uuid,
    pub quantity: i32,
}

/// One restaurant's worth of items to purchase.
#[derive(Debug, Clone)]
pub struct Basket {
    pub restaurant_id: Uuid,
    pub items: Vec<CheckoutItem>,
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: models::Order,
    pub line_items: Vec<models::OrderLineItem>,
}

/// Converts one restaurant basket into a `pending` order and removes
/// exactly the purchased foods from the customer's cart, all in one
/// transaction. Items from other restaurants survive the cleanup.
pub fn checkout(
    conn: &mut PgConnection,
    customer_id: Uuid,
    basket: Basket,
    payment_method: models::PaymentMethod,
    shipping_address: &str,
) -> Result<PlacedOrder, CoreError> {
    conn.transaction(|conn| {
        let placed = place_order(conn, customer_id, &basket, payment_method, shipping_address)?;
        let purchased: Vec<Uuid> = basket.items.iter().map(|i| i.food_id).collect();
        cart::remove_purchased(conn, customer_id, &purchased)?;
        Ok(placed)
    })
}

/// Bulk variant: one order per basket, with a single aggregated cart
/// cleanup pass at the end.
pub fn checkout_many(
    conn: &mut PgConnection,
    customer_id: Uuid,
    baskets: Vec<Basket>,
    payment_method: models::PaymentMethod,
    shipping_address: &str,
) -> Result<Vec<PlacedOrder>, CoreError> {
    if baskets.is_empty() {
        return Err(CoreError::Validation("no baskets to check out".to_string()));
    }
    conn.transaction(|conn| {
        let mut placed = Vec::with_capacity(baskets.len());
        let mut purchased: Vec<Uuid> = Vec::new();
        for basket in &baskets {
            placed.push(place_order(
                conn,
                customer_id,
                basket,
                payment_method,
                shipping_address,
            )?);
            purchased.extend(basket.items.iter().map(|i| i.food_id));
        }
        cart::remove_purchased(conn, customer_id, &purchased)?;
        Ok(placed)
    })
}

fn place_order(
    conn: &mut PgConnection,
    customer_id: Uuid,
    basket: &Basket,
    payment_method: models::PaymentMethod,
    shipping_address: &str,
) -> Result<PlacedOrder, CoreError> {
    if basket.items.is_empty() {
        return Err(CoreError::Validation("basket has no items".to_string()));
    }
    if basket.items.iter().any(|i| i.quantity <= 0) {
        return Err(CoreError::Validation(
            "quantity must be a positive integer".to_string(),
        ));
    }

    let food_ids: Vec<Uuid> = basket.items.iter().map(|i| i.food_id).collect();
    let foods = schema::foods::table
        .select(models::Food::as_select())
        .filter(schema::foods::id.eq_any(&food_ids))
        .load::<models::Food>(conn)?;

    let now = Utc::now();
    let order_id = Uuid::new_v4();
    let mut line_items = Vec::with_capacity(basket.items.len());
    for item in &basket.items {
        let food = foods
            .iter()
            .find(|f| f.id == item.food_id)
            .ok_or(CoreError::NotFound("food"))?;
        if food.restaurant_id != basket.restaurant_id {
            return Err(CoreError::Validation(format!(
                "{} does not belong to the selected restaurant",
                food.name
            )));
        }
        line_items.push(models::OrderLineItem {
            id: Uuid::new_v4(),
            order_id,
            food_id: food.id,
            name: food.name.clone(),
            price: food.price.clone(),
            image: food.image.clone(),
            quantity: item.quantity,
        });
    }

    let total: BigDecimal = line_items
        .iter()
        .map(|i| i.price.clone() * BigDecimal::from(i.quantity))
        .sum();

    // Online payments are settled by the provider before the callback
    // lands; cash stays unpaid until delivery.
    let payment_status = match payment_method {
        models::PaymentMethod::Online => models::PaymentStatus::Paid,
        models::PaymentMethod::Cod => models::PaymentStatus::Unpaid,
    };

    let order = models::Order {
        id: order_id,
        customer_id,
        restaurant_id: basket.restaurant_id,
        courier_id: None,
        status: models::OrderStatus::Pending,
        payment_method,
        payment_status,
        total_amount: total,
        shipping_address: shipping_address.to_string(),
        created_at: now,
        updated_at: now,
    };

    insert_into(schema::orders::table)
        .values(&order)
        .execute(conn)?;
    insert_into(schema::order_line_items::table)
        .values(&line_items)
        .execute(conn)?;

    Ok(PlacedOrder { order, line_items })
}
