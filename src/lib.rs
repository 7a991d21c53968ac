pub mod cache;
pub mod catalog;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod error_tracker;
pub mod handlers;
pub mod health;
pub mod key_generator;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod payment;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod state;
pub mod utils;
pub mod validation;

pub use config::Config;
pub use error::{AppError, Result};
pub use server::{create_app, Server};
pub use state::{AppState, SharedState};
