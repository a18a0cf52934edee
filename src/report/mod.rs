mod aggregate;
pub mod normalize;
pub mod render;

pub use aggregate::*;
pub use normalize::{normalize_title, PatientKey};
pub use render::{format_date, is_report_file_name, save_report};

use chrono::{FixedOffset, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::calendar::{fetch_period_events, CalendarSource};
use crate::error::{Error, Result};
use crate::models::{ReportPeriod, SelectedCalendar};

/// A report written to disk
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub file_name: String,
    pub period: ReportPeriod,
    pub summary: ReportSummary,
}

impl std::fmt::Display for GeneratedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Report for {} saved to {}", self.period, self.path.display())?;
        if self.summary.total_sessions == 0 {
            writeln!(f, "No consultations found in this period.")?;
        }
        write!(f, "{}", self.summary)
    }
}

/// Fetch, aggregate and render one month of consultations.
///
/// The period and the selection are checked before any calendar request.
pub async fn generate_report(
    source: &dyn CalendarSource,
    selection: &[SelectedCalendar],
    year: i32,
    month: u32,
    reports_dir: &Path,
    offset: FixedOffset,
) -> Result<GeneratedReport> {
    let period = ReportPeriod::new(year, month)?;
    if selection.is_empty() {
        return Err(Error::NoCalendarsSelected);
    }

    tracing::info!(
        "generating report for {} from {} calendar(s)",
        period,
        selection.len()
    );
    let events = fetch_period_events(source, selection, period, offset).await?;
    let aggregation = aggregate(&events);
    let path = save_report(&aggregation, period, reports_dir, Local::now().naive_local())?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(GeneratedReport {
        path,
        file_name,
        period,
        summary: aggregation.summary(),
    })
}

/// UTC offset of the local timezone right now
pub fn local_offset() -> FixedOffset {
    *Local::now().offset()
}
