use std::env;
use std::time::Duration;

use bigdecimal::BigDecimal;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{Connection, PgConnection};
use dotenvy::dotenv;

pub mod assignment;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod messages;
pub mod models;
pub mod orders;
pub mod payment;
pub mod schema;
pub mod transition;
pub mod wallet;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Flat fee credited to the courier's wallet when an order reaches
/// `delivered`.
pub fn delivery_fee() -> BigDecimal {
    BigDecimal::from(15_000)
}

pub fn establish_connection() -> PgConnection {
    dotenv().ok();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgConnection::establish(&database_url)
        .unwrap_or_else(|_| panic!("Error connecting to {}", database_url))
}

pub fn create_pool() -> DbPool {
    dotenv().ok();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    Pool::builder()
        .max_size(16)
        .connection_timeout(Duration::from_secs(5))
        .build(ConnectionManager::new(database_url))
        .expect("Failed to create connection pool")
}
