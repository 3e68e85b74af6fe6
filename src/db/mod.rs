pub mod connection;
pub mod migrations;
pub mod users;
pub mod encounters;
pub mod requests;
pub mod connections;
pub mod conversations;

pub use connection::{DatabaseConfig, get_db_pool};
