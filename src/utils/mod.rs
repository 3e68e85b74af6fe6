pub mod config;
pub mod logging;
pub mod pair;

pub use config::Config;
pub use logging::init_logging;
pub use pair::canonicalize;
