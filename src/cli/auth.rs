use anyhow::{Context, Result};
use serde::Serialize;

use super::{open_calendar, OutputFormat, SuccessResponse};
use crate::calendar::{oauth, CalendarSource};
use crate::models::{AccountInfo, AppPaths, ClientCredentials, LocalConfig, SelectedCalendar, TokenStore};
use crate::Error;

/// Response from login command
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub token_file: String,
}

impl std::fmt::Display for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Connected to Google Calendar as {}", self.email)?;
        writeln!(f, "Tokens saved to {}", self.token_file)
    }
}

/// Run the installed-app OAuth flow and store the tokens
pub async fn run_login(paths: &AppPaths, format: OutputFormat) -> Result<()> {
    let credentials = ClientCredentials::load(paths)?;
    let tokens = oauth::run_loopback_flow(&credentials).await?;

    let store = TokenStore::new(paths.tokens_file());
    store.save(&tokens).context("Failed to save tokens")?;

    let account = open_calendar(paths)?
        .account()
        .await
        .context("Signed in, but failed to read the primary calendar")?;

    format.print(&LoginResponse {
        email: account.email,
        token_file: store.path().display().to_string(),
    });
    Ok(())
}

/// Remove stored tokens and the calendar selection
pub fn run_logout(paths: &AppPaths, format: OutputFormat) -> Result<()> {
    TokenStore::new(paths.tokens_file())
        .clear()
        .context("Failed to remove token file")?;
    LocalConfig::clear(&paths.config_file()).context("Failed to remove config file")?;

    format.print(&SuccessResponse::new("Logged out successfully"));
    Ok(())
}

/// Status command response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub authenticated: bool,
    pub account: Option<AccountInfo>,
    pub selected_calendars: Vec<SelectedCalendar>,
}

impl std::fmt::Display for StatusResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.authenticated, &self.account) {
            (true, Some(account)) => writeln!(f, "Connected to Google Calendar: {}", account.email)?,
            (true, None) => writeln!(f, "Connected to Google Calendar")?,
            (false, _) => writeln!(f, "Not connected to Google Calendar")?,
        }

        if self.selected_calendars.is_empty() {
            writeln!(f, "No calendars selected.")?;
        } else {
            writeln!(f, "Selected calendars:")?;
            for calendar in &self.selected_calendars {
                writeln!(f, "  - {}", calendar.name)?;
            }
            writeln!(f, "Total: {} calendar(s) selected", self.selected_calendars.len())?;
        }

        if self.authenticated && !self.selected_calendars.is_empty() {
            writeln!(f, "Ready to generate reports.")?;
        }
        Ok(())
    }
}

impl StatusResponse {
    /// Ask the calendar source who is signed in. Missing or rejected
    /// credentials read as "not authenticated" rather than an error.
    pub async fn check(source: &dyn CalendarSource, config: LocalConfig) -> crate::Result<Self> {
        let (authenticated, account) = match source.account().await {
            Ok(account) => (true, Some(account)),
            Err(e) if e.requires_reauth() => (false, None),
            Err(Error::Config(msg)) => {
                tracing::warn!("{}", msg);
                (false, None)
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            authenticated,
            account,
            selected_calendars: config.selected_calendars,
        })
    }
}

/// Show connection state and selection
pub async fn run_status(paths: &AppPaths, format: OutputFormat) -> Result<()> {
    let config = LocalConfig::load(&paths.config_file())?;
    let calendar = open_calendar(paths)?;

    format.print(&StatusResponse::check(&calendar, config).await?);
    Ok(())
}
