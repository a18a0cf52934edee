pub mod calendar;
pub mod cli;
pub mod error;
pub mod models;
pub mod report;
pub mod server;

pub use error::{Error, Result};
pub use models::*;

/// Application name, used for the config directory
pub const APP_NAME: &str = "gcal-extractor";

/// Where reports are written unless told otherwise
pub const DEFAULT_REPORTS_DIR: &str = "reports";

/// Default port of the local HTTP API
pub const DEFAULT_PORT: u16 = 8501;
