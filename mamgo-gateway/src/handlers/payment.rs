use std::collections::BTreeMap;

use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::get,
};
use tracing::instrument;

use mamgo_core::payment::{self, CallbackOutcome};

use crate::error::ApiError;
use crate::models::*;

use super::{AppState, run_db};

pub fn router() -> Router<AppState> {
    Router::new().route("/payment/vnpay/return", get(vnpay_return))
}

/// Provider return URL. Unauthenticated by design: the HMAC signature
/// over the query string is the credential.
#[utoipa::path(
    get,
    path = "/payment/vnpay/return",
    responses(
        (status = 200, description = "Callback processed", body = PaymentReturnResponse),
    ),
    tag = "payment"
)]
#[instrument(skip(state, params))]
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<PaymentReturnResponse>, ApiError> {
    let secret = state.payment_secret.clone();
    let outcome = run_db(&state, move |conn| {
        payment::handle_callback(conn, &params, &secret)
    })
    .await?;

    let response = match outcome {
        CallbackOutcome::Confirmed(order) => PaymentReturnResponse {
            result: "confirmed".to_string(),
            order_id: Some(order.id),
        },
        CallbackOutcome::Failed(order) => PaymentReturnResponse {
            result: "failed".to_string(),
            order_id: Some(order.id),
        },
        CallbackOutcome::Ignored => PaymentReturnResponse {
            result: "ignored".to_string(),
            order_id: None,
        },
        CallbackOutcome::Rejected => PaymentReturnResponse {
            result: "rejected".to_string(),
            order_id: None,
        },
    };
    Ok(Json(response))
}
