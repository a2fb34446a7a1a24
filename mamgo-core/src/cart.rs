use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::{insert_into, prelude::*, update, PgConnection};
use uuid::Uuid;

use crate::error::CoreError;
use crate::{models, schema};

/// A customer's cart together with its current line items.
#[derive(Debug, PartialEq, Clone)]
pub struct CartView {
    pub cart: models::Cart,
    pub items: Vec<models::CartItem>,
}

pub fn items_total(items: &[models::CartItem]) -> BigDecimal {
    items
        .iter()
        .map(|i| i.price.clone() * BigDecimal::from(i.quantity))
        .sum()
}

/// Adds a food to the customer's cart, creating the cart lazily and
/// merging quantity when the same food is already present. The snapshot
/// (name/price/image) is taken from the live food record at add time.
pub fn add_item(
    conn: &mut PgConnection,
    customer_id: Uuid,
    food_id: Uuid,
    quantity: i32,
) -> Result<CartView, CoreError> {
    if quantity <= 0 {
        return Err(CoreError::Validation(
            "quantity must be a positive integer".to_string(),
        ));
    }

    conn.transaction(|conn| {
        let food = schema::foods::table
            .select(models::Food::as_select())
            .find(&food_id)
            .first::<models::Food>(conn)
            .optional()?
            .ok_or(CoreError::NotFound("food"))?;
        if !food.available {
            return Err(CoreError::Validation(format!(
                "{} is currently unavailable",
                food.name
            )));
        }

        let cart = get_or_create(conn, customer_id)?;

        let existing = schema::cart_items::table
            .select(models::CartItem::as_select())
            .filter(schema::cart_items::cart_id.eq(&cart.id))
            .filter(schema::cart_items::food_id.eq(&food.id))
            .first::<models::CartItem>(conn)
            .optional()?;

        match existing {
            Some(item) => {
                update(schema::cart_items::table)
                    .filter(schema::cart_items::id.eq(&item.id))
                    .set(schema::cart_items::quantity.eq(item.quantity + quantity))
                    .execute(conn)?;
            }
            None => {
                let item = models::CartItem {
                    id: Uuid::new_v4(),
                    cart_id: cart.id,
                    food_id: food.id,
                    restaurant_id: food.restaurant_id,
                    name: food.name.clone(),
                    price: food.price.clone(),
                    image: food.image.clone(),
                    quantity,
                };
                insert_into(schema::cart_items::table)
                    .values(&item)
                    .execute(conn)?;
            }
        }

        refresh_total(conn, cart.id)
    })
}

/// Returns the cart if one exists; customers without a cart have simply
/// never added anything.
pub fn get_cart(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> Result<Option<CartView>, CoreError> {
    let cart = schema::carts::table
        .select(models::Cart::as_select())
        .filter(schema::carts::customer_id.eq(&customer_id))
        .first::<models::Cart>(conn)
        .optional()?;
    match cart {
        Some(cart) => {
            let items = load_items(conn, cart.id)?;
            Ok(Some(CartView { cart, items }))
        }
        None => Ok(None),
    }
}

/// Removes exactly the given food ids from the customer's cart and
/// recomputes the total. Items from other restaurants stay untouched;
/// an emptied cart is kept, not deleted. Callers run this inside the
/// checkout transaction so concurrent add-to-cart calls cannot be lost.
pub fn remove_purchased(
    conn: &mut PgConnection,
    customer_id: Uuid,
    food_ids: &[Uuid],
) -> Result<(), CoreError> {
    if food_ids.is_empty() {
        return Ok(());
    }
    let cart = schema::carts::table
        .select(models::Cart::as_select())
        .filter(schema::carts::customer_id.eq(&customer_id))
        .first::<models::Cart>(conn)
        .optional()?;
    let Some(cart) = cart else {
        return Ok(());
    };

    diesel::delete(schema::cart_items::table)
        .filter(schema::cart_items::cart_id.eq(&cart.id))
        .filter(schema::cart_items::food_id.eq_any(food_ids))
        .execute(conn)?;
    refresh_total(conn, cart.id)?;
    Ok(())
}

fn get_or_create(conn: &mut PgConnection, customer_id: Uuid) -> Result<models::Cart, CoreError> {
    let existing = schema::carts::table
        .select(models::Cart::as_select())
        .filter(schema::carts::customer_id.eq(&customer_id))
        .first::<models::Cart>(conn)
        .optional()?;
    if let Some(cart) = existing {
        return Ok(cart);
    }

    let now = Utc::now();
    let cart = models::Cart {
        id: Uuid::new_v4(),
        customer_id,
        total_amount: BigDecimal::from(0),
        created_at: now,
        updated_at: now,
    };
    insert_into(schema::carts::table)
        .values(&cart)
        .execute(conn)?;
    Ok(cart)
}

fn load_items(conn: &mut PgConnection, cart_id: Uuid) -> Result<Vec<models::CartItem>, CoreError> {
    let items = schema::cart_items::table
        .select(models::CartItem::as_select())
        .filter(schema::cart_items::cart_id.eq(&cart_id))
        .load::<models::CartItem>(conn)?;
    Ok(items)
}

// Total is never stored independently of items: every mutation ends here.
fn refresh_total(conn: &mut PgConnection, cart_id: Uuid) -> Result<CartView, CoreError> {
    let items = load_items(conn, cart_id)?;
    let total = items_total(&items);
    let cart = update(schema::carts::table)
        .filter(schema::carts::id.eq(&cart_id))
        .set((
            schema::carts::total_amount.eq(&total),
            schema::carts::updated_at.eq(Utc::now()),
        ))
        .returning(models::Cart::as_returning())
        .get_result::<models::Cart>(conn)?;
    Ok(CartView { cart, items })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, quantity: i32) -> models::CartItem {
        models::CartItem {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            food_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            name: "pho bo".to_string(),
            price: BigDecimal::from(price),
            image: None,
            quantity,
        }
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let items = vec![item(10_000, 2), item(25_000, 1)];
        assert_eq!(items_total(&items), BigDecimal::from(45_000));
    }

    #[test]
    fn total_of_empty_cart_is_zero() {
        assert_eq!(items_total(&[]), BigDecimal::from(0));
    }
}
