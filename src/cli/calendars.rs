use anyhow::{Context, Result};
use serde::Serialize;

use super::{open_calendar, OutputFormat, SuccessResponse};
use crate::calendar::CalendarSource;
use crate::models::{AppPaths, CalendarEntry, CalendarInfo, LocalConfig, SelectedCalendar};

#[derive(Debug, Serialize)]
pub struct CalendarListResponse {
    pub calendars: Vec<CalendarEntry>,
}

impl CalendarListResponse {
    pub fn new(available: Vec<CalendarInfo>, config: &LocalConfig) -> Self {
        Self {
            calendars: CalendarEntry::from_available(available, config),
        }
    }
}

impl std::fmt::Display for CalendarListResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.calendars.is_empty() {
            return writeln!(f, "No calendars found in your Google account.");
        }
        writeln!(f, "Available calendars:")?;
        for entry in &self.calendars {
            writeln!(
                f,
                "  [{}] {}{}",
                if entry.selected { "x" } else { " " },
                entry.calendar.name,
                if entry.calendar.primary { " (primary)" } else { "" }
            )?;
            writeln!(f, "      id: {}", entry.calendar.id)?;
        }
        Ok(())
    }
}

/// List the account's calendars, marking the selected ones
pub async fn run_calendars_list(paths: &AppPaths, format: OutputFormat) -> Result<()> {
    let config = LocalConfig::load(&paths.config_file())?;
    let available = open_calendar(paths)?
        .list_calendars()
        .await
        .context("Unable to fetch calendars")?;

    format.print(&CalendarListResponse::new(available, &config));
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub selected_calendars: Vec<SelectedCalendar>,
}

impl std::fmt::Display for SelectionResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.selected_calendars.is_empty() {
            return writeln!(f, "No calendars selected.");
        }
        writeln!(f, "Selected calendars:")?;
        for calendar in &self.selected_calendars {
            writeln!(f, "  - {} ({})", calendar.name, calendar.id)?;
        }
        Ok(())
    }
}

/// Replace the selection with the given calendar ids
pub async fn run_calendars_select(
    paths: &AppPaths,
    ids: &[String],
    format: OutputFormat,
) -> Result<()> {
    if ids.is_empty() {
        anyhow::bail!("Select at least one calendar id");
    }

    let available = open_calendar(paths)?
        .list_calendars()
        .await
        .context("Unable to fetch calendars")?;

    let selected = SelectedCalendar::resolve(ids, &available);
    for calendar in &selected {
        if calendar.name == SelectedCalendar::UNKNOWN_NAME {
            tracing::warn!("calendar {} is not visible on this account", calendar.id);
        }
    }

    let config = LocalConfig {
        selected_calendars: selected,
    };
    config
        .save(&paths.config_file())
        .context("Failed to save calendar selection")?;

    format.print(&SelectionResponse {
        selected_calendars: config.selected_calendars,
    });
    Ok(())
}

/// Show the persisted selection without contacting Google
pub fn run_calendars_show(paths: &AppPaths, format: OutputFormat) -> Result<()> {
    let config = LocalConfig::load(&paths.config_file())?;
    format.print(&SelectionResponse {
        selected_calendars: config.selected_calendars,
    });
    Ok(())
}

pub fn run_calendars_clear(paths: &AppPaths, format: OutputFormat) -> Result<()> {
    LocalConfig::clear(&paths.config_file()).context("Failed to clear calendar selection")?;
    format.print(&SuccessResponse::new("Calendar selection cleared"));
    Ok(())
}
