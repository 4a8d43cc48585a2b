pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;
pub mod web;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use config::{AppConfig, LogFormat};
pub use utils::error::{BookingError, Result};
pub use web::AppState;
