use anyhow::Result;
use std::path::Path;

use super::{open_calendar, OutputFormat};
use crate::models::{AppPaths, LocalConfig, ReportPeriod};
use crate::report::{generate_report, local_offset};
use crate::Error;

/// Generate the spreadsheet for one month
pub async fn run_report(
    paths: &AppPaths,
    year: i32,
    month: u32,
    out_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    // Fail on a bad date before touching config or the network
    ReportPeriod::new(year, month)?;

    let config = LocalConfig::load(&paths.config_file())?;
    if !config.has_selected_calendars() {
        return Err(Error::NoCalendarsSelected.into());
    }
    let calendar = open_calendar(paths)?;

    let report = generate_report(
        &calendar,
        &config.selected_calendars,
        year,
        month,
        out_dir,
        local_offset(),
    )
    .await?;

    format.print(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_report_needs_a_selection() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path().join("config"));
        let out_dir = dir.path().join("reports");

        let err = run_report(&paths, 2024, 1, &out_dir, OutputFormat::Human)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NoCalendarsSelected)
        ));
        assert!(!out_dir.exists());
    }

    #[tokio::test]
    async fn test_report_rejects_bad_month() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());

        let err = run_report(&paths, 2024, 0, dir.path(), OutputFormat::Human)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidPeriod(_))
        ));
    }
}
