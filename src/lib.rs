pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod highlight;
pub mod records;
pub mod search;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{AppError, StoreError, ValidationErrors};
