use bigdecimal::BigDecimal;
use diesel::{prelude::*, update, PgConnection};
use uuid::Uuid;

use crate::error::CoreError;
use crate::schema;

/// Adds `amount` to a user's balance in one additive UPDATE. This is
/// the only balance mutation in the system; it is invoked exclusively
/// by the status transition engine's delivery side effect.
pub fn credit(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: &BigDecimal,
) -> Result<(), CoreError> {
    if amount <= &BigDecimal::from(0) {
        return Err(CoreError::Validation(
            "credit amount must be positive".to_string(),
        ));
    }

    let rows = update(schema::users::table)
        .filter(schema::users::id.eq(&user_id))
        .set(schema::users::wallet_balance.eq(schema::users::wallet_balance + amount.clone()))
        .execute(conn)?;
    if rows == 0 {
        return Err(CoreError::NotFound("user"));
    }
    Ok(())
}

pub fn balance(conn: &mut PgConnection, user_id: Uuid) -> Result<BigDecimal, CoreError> {
    schema::users::table
        .select(schema::users::wallet_balance)
        .find(&user_id)
        .first::<BigDecimal>(conn)
        .optional()?
        .ok_or(CoreError::NotFound("user"))
}
