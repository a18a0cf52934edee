use thiserror::Error;

/// Errors produced while fetching events and building reports
#[derive(Debug, Error)]
pub enum Error {
    /// No stored credentials at all
    #[error("Not connected to Google Calendar. Run 'gcal-extractor login' first.")]
    NotAuthenticated,

    /// Credentials exist but were rejected and could not be refreshed
    #[error("Authentication failed: {0}. Run 'gcal-extractor login' again.")]
    Authentication(String),

    /// Google returned a non-success status
    #[error("Google Calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid report period: {0}")]
    InvalidPeriod(String),

    #[error("No calendars selected. Run 'gcal-extractor calendars select <ID>...' first.")]
    NoCalendarsSelected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to write spreadsheet: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// True if the user has to go through the login flow again
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Error::NotAuthenticated | Error::Authentication(_))
    }

    /// True for transient upstream failures worth retrying by hand
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Message shown to the user, with a retry hint for transient failures
    pub fn user_message(&self) -> String {
        if self.is_retryable() {
            format!("{} Please try again in a moment.", self)
        } else {
            self.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
