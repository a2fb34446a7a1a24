//! VNPay return-callback verification.
//!
//! The provider redirects with a flat set of `vnp_*` query fields and a
//! detached HMAC-SHA512 signature over the sorted, URL-encoded fields.
//! Nothing in the payload is trusted until the signature checks out.

use std::collections::BTreeMap;

use chrono::Utc;
use diesel::{prelude::*, update, PgConnection};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Order, OrderStatus, PaymentStatus};
use crate::schema;

pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";
pub const RESPONSE_CODE_FIELD: &str = "vnp_ResponseCode";
pub const ORDER_REF_FIELD: &str = "vnp_TxnRef";
pub const SUCCESS_CODE: &str = "00";

type HmacSha512 = Hmac<Sha512>;

/// Canonical string the provider signed: the signature field removed,
/// remaining keys sorted, each pair URL-encoded and joined with `&`.
/// Every other field, `vnp_SecureHashType` included, stays in.
pub fn sign_data(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, _)| k.as_str() != SECURE_HASH_FIELD)
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn verify_signature(params: &BTreeMap<String, String>, secret: &str) -> bool {
    let Some(provided) = params.get(SECURE_HASH_FIELD) else {
        return false;
    };
    let Ok(signature) = hex::decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(sign_data(params).as_bytes());
    // verify_slice is constant-time
    mac.verify_slice(&signature).is_ok()
}

#[derive(Debug, PartialEq, Clone)]
pub enum CallbackOutcome {
    /// Signature mismatch: nothing changed, caller should render a
    /// rejection page.
    Rejected,
    /// Valid signature but the referenced order is missing or the
    /// reference is absent; acknowledged and ignored.
    Ignored,
    Confirmed(Order),
    Failed(Order),
}

/// Applies a verified provider callback to the order ledger.
///
/// A success code drives `paid`/`preparing` through a conditional
/// UPDATE guarded on `pending`, so provider retries of the same
/// callback are harmless. Any other code marks the payment failed and
/// leaves the status where it is.
pub fn handle_callback(
    conn: &mut PgConnection,
    params: &BTreeMap<String, String>,
    secret: &str,
) -> Result<CallbackOutcome, CoreError> {
    if !verify_signature(params, secret) {
        tracing::warn!("payment callback rejected: signature mismatch");
        return Ok(CallbackOutcome::Rejected);
    }

    let Some(order_id) = params
        .get(ORDER_REF_FIELD)
        .and_then(|r| r.parse::<Uuid>().ok())
    else {
        tracing::warn!("payment callback ignored: missing or malformed order reference");
        return Ok(CallbackOutcome::Ignored);
    };

    let code = params
        .get(RESPONSE_CODE_FIELD)
        .map(String::as_str)
        .unwrap_or_default();

    if code == SUCCESS_CODE {
        let confirmed = update(schema::orders::table)
            .filter(schema::orders::id.eq(&order_id))
            .filter(schema::orders::status.eq(OrderStatus::Pending))
            .set((
                schema::orders::payment_status.eq(PaymentStatus::Paid),
                schema::orders::status.eq(OrderStatus::Preparing),
                schema::orders::updated_at.eq(Utc::now()),
            ))
            .returning(Order::as_returning())
            .get_result::<Order>(conn)
            .optional()?;
        match confirmed {
            Some(order) => {
                tracing::info!(order_id = %order.id, "payment confirmed");
                Ok(CallbackOutcome::Confirmed(order))
            }
            // Replay after the order moved on, or an unknown order.
            None => Ok(replayed_outcome(load_order(conn, order_id)?)),
        }
    } else {
        let failed = update(schema::orders::table)
            .filter(schema::orders::id.eq(&order_id))
            .set((
                schema::orders::payment_status.eq(PaymentStatus::Failed),
                schema::orders::updated_at.eq(Utc::now()),
            ))
            .returning(Order::as_returning())
            .get_result::<Order>(conn)
            .optional()?;
        match failed {
            Some(order) => {
                tracing::warn!(order_id = %order.id, code, "payment failed");
                Ok(CallbackOutcome::Failed(order))
            }
            None => Ok(CallbackOutcome::Ignored),
        }
    }
}

/// Outcome for a success code whose guarded UPDATE matched nothing.
/// Only an order whose payment already went through is re-acknowledged
/// as confirmed; a cancelled or failed order is not.
fn replayed_outcome(order: Option<Order>) -> CallbackOutcome {
    match order {
        Some(order) if order.payment_status == PaymentStatus::Paid => {
            CallbackOutcome::Confirmed(order)
        }
        Some(_) | None => CallbackOutcome::Ignored,
    }
}

fn load_order(conn: &mut PgConnection, order_id: Uuid) -> Result<Option<Order>, CoreError> {
    let order = schema::orders::table
        .select(Order::as_select())
        .find(&order_id)
        .first::<Order>(conn)
        .optional()?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::*;
    use crate::models::PaymentMethod;

    const SECRET: &str = "vnpay-test-secret";

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            courier_id: None,
            status,
            payment_method: PaymentMethod::Online,
            payment_status,
            total_amount: BigDecimal::from(45_000),
            shipping_address: "12 Hang Bac".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn signed_params() -> BTreeMap<String, String> {
        let mut params = BTreeMap::from([
            ("vnp_Amount".to_string(), "4500000".to_string()),
            ("vnp_ResponseCode".to_string(), "00".to_string()),
            (
                "vnp_TxnRef".to_string(),
                "6b7f3f6e-8d87-4c4e-9a59-1df6f8f0a001".to_string(),
            ),
            ("vnp_OrderInfo".to_string(), "thanh toan don hang".to_string()),
        ]);
        let mut mac = HmacSha512::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(sign_data(&params).as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        params.insert(SECURE_HASH_FIELD.to_string(), signature);
        params
    }

    #[test]
    fn sign_data_sorts_and_encodes() {
        let params = BTreeMap::from([
            ("vnp_TxnRef".to_string(), "abc".to_string()),
            ("vnp_Amount".to_string(), "100".to_string()),
            ("vnp_OrderInfo".to_string(), "don hang #1".to_string()),
            (SECURE_HASH_FIELD.to_string(), "deadbeef".to_string()),
        ]);
        assert_eq!(
            sign_data(&params),
            "vnp_Amount=100&vnp_OrderInfo=don%20hang%20%231&vnp_TxnRef=abc"
        );
    }

    #[test]
    fn intact_signature_verifies() {
        assert!(verify_signature(&signed_params(), SECRET));
    }

    #[test]
    fn tampered_field_fails_verification() {
        let mut params = signed_params();
        params.insert("vnp_Amount".to_string(), "100".to_string());
        assert!(!verify_signature(&params, SECRET));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        assert!(!verify_signature(&signed_params(), "not-the-secret"));
    }

    #[test]
    fn missing_or_garbage_signature_fails_verification() {
        let mut params = signed_params();
        params.remove(SECURE_HASH_FIELD);
        assert!(!verify_signature(&params, SECRET));

        params.insert(SECURE_HASH_FIELD.to_string(), "zz-not-hex".to_string());
        assert!(!verify_signature(&params, SECRET));
    }

    #[test]
    fn hash_type_field_is_part_of_the_signed_data() {
        // A provider that sends vnp_SecureHashType signs over it too;
        // only vnp_SecureHash itself is detached.
        let mut params = BTreeMap::from([
            ("vnp_Amount".to_string(), "4500000".to_string()),
            ("vnp_ResponseCode".to_string(), "00".to_string()),
            ("vnp_SecureHashType".to_string(), "SHA512".to_string()),
            (
                "vnp_TxnRef".to_string(),
                "6b7f3f6e-8d87-4c4e-9a59-1df6f8f0a001".to_string(),
            ),
        ]);
        let mut mac = HmacSha512::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(sign_data(&params).as_bytes());
        params.insert(
            SECURE_HASH_FIELD.to_string(),
            hex::encode(mac.finalize().into_bytes()),
        );
        assert!(verify_signature(&params, SECRET));

        // Adding it after signing is a tamper like any other field.
        let mut extra = signed_params();
        extra.insert("vnp_SecureHashType".to_string(), "SHA512".to_string());
        assert!(!verify_signature(&extra, SECRET));
    }

    #[test]
    fn replayed_success_confirms_only_orders_that_actually_paid() {
        let paid = order(OrderStatus::Preparing, PaymentStatus::Paid);
        assert!(matches!(
            replayed_outcome(Some(paid)),
            CallbackOutcome::Confirmed(_)
        ));

        let cancelled = order(OrderStatus::Cancelled, PaymentStatus::Unpaid);
        assert_eq!(replayed_outcome(Some(cancelled)), CallbackOutcome::Ignored);

        let failed = order(OrderStatus::Pending, PaymentStatus::Failed);
        assert_eq!(replayed_outcome(Some(failed)), CallbackOutcome::Ignored);

        assert_eq!(replayed_outcome(None), CallbackOutcome::Ignored);
    }
}
