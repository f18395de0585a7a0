pub mod admin_cli;
pub mod auth;
pub mod core;
pub mod environment;
pub mod error;
pub mod matching;
pub mod pagination;
pub mod rate_limit;
pub mod web;

pub use environment::EnvironmentConfig;
pub use error::ApiError;
pub use web::{build_rocket, start_web_server, AppServices};

/// Log through `tracing` with the level given as the first token:
/// `app_log!(info, "Job {} created", id)`.
#[macro_export]
macro_rules! app_log {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::$level!($($arg)+)
    };
}
