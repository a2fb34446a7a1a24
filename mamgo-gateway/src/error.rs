use axum::{http::StatusCode, response::Json};
use mamgo_core::error::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    AuthenticationRequired,
    #[error("Invalid token")]
    InvalidToken,
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match &self {
            ApiError::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Core(core) => {
                let status = match core {
                    CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    CoreError::Authorization(_) => StatusCode::FORBIDDEN,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::InvalidTransition { .. } | CoreError::Conflict(_) => {
                        StatusCode::CONFLICT
                    }
                    CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, core.to_string())
            }
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;
    use mamgo_core::models::OrderStatus;

    #[test]
    fn error_kinds_map_onto_distinct_status_codes() {
        let cases = [
            (
                ApiError::Core(CoreError::Validation("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Core(CoreError::Authorization("no".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::Core(CoreError::NotFound("order")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Core(CoreError::InvalidTransition {
                    current: OrderStatus::Delivered,
                    requested: OrderStatus::Delivered,
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Core(CoreError::Conflict("taken".into())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Core(CoreError::Transient("pool".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ApiError::InvalidToken, StatusCode::UNAUTHORIZED),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
