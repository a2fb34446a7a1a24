use axum::{Router, routing::get};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use dotenvy::dotenv;
use jsonwebtoken::DecodingKey;
use tower_http::cors::CorsLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod handlers;
mod models;
mod rooms;
mod ws;

use handlers::{ApiDoc, AppState, cart_router, message_router, order_router, payment_router};
use rooms::Rooms;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../mamgo-core/migrations");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET required");
    let payment_secret =
        std::env::var("VNPAY_HASH_SECRET").expect("VNPAY_HASH_SECRET required");

    let pool = mamgo_core::create_pool();
    {
        let mut conn = pool.get()?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| format!("failed to run migrations: {e}"))?;
    }

    let state = AppState {
        pool,
        decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
        payment_secret,
        rooms: Rooms::new(),
    };

    let app = Router::new()
        .merge(cart_router())
        .merge(order_router())
        .merge(message_router())
        .merge(payment_router())
        .route("/ws", get(ws::ws_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8100".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("gateway listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
