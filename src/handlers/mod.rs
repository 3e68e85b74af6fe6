pub mod users;
pub mod encounters;
pub mod connections;
pub mod messages;

use crate::Config;
use sqlx::SqlitePool;

/// Shared state handed to every handler.
pub type AppState = (SqlitePool, Config);

pub use connections::{create_requests, list_connections, list_pending, respond_to_request};
pub use encounters::{check_requests, list_encounters, record_encounter};
pub use messages::{get_history, mark_read, send_message};
pub use users::{create_user, get_user, list_users, update_user};
