mod auth;
mod calendars;
mod report;

pub use auth::*;
pub use calendars::*;
pub use report::*;

use serde::Serialize;

use crate::calendar::GoogleCalendar;
use crate::models::{AppPaths, ClientCredentials, TokenStore};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn print<T: Serialize + std::fmt::Display>(&self, value: &T) {
        match self {
            OutputFormat::Human => println!("{}", value),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
            }
        }
    }
}

/// Success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SuccessResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Google Calendar client over the locally stored tokens
pub fn open_calendar(paths: &AppPaths) -> crate::Result<GoogleCalendar> {
    let credentials = match ClientCredentials::load(paths) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            tracing::debug!("no OAuth client configured: {}", e);
            None
        }
    };
    GoogleCalendar::new(credentials, TokenStore::new(paths.tokens_file()))
}
