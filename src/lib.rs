mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod spd;
mod utils;

pub use config::{Config, MailConfig, PaymentConfig};
pub use error::Error;
pub use error::Result;
