mod google;
pub mod oauth;

pub use google::*;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use std::collections::HashSet;

use crate::error::Result;
use crate::models::{AccountInfo, CalendarEvent, CalendarInfo, ReportPeriod, SelectedCalendar};

/// Read-only access to the calendars of the connected account
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Trait for calendar providers
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Calendars visible to the account
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>>;

    /// Titled events of one calendar overlapping `[time_min, time_max)`
    async fn list_events(
        &self,
        calendar: &SelectedCalendar,
        time_min: DateTime<FixedOffset>,
        time_max: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>>;

    /// Owner of the primary calendar
    async fn account(&self) -> Result<AccountInfo>;
}

/// Extra time queried on both sides of a month. `offset` is today's UTC
/// offset, which can differ from the one in force during the reported month.
const WINDOW_MARGIN_DAYS: i64 = 1;

/// Fetch every event starting inside `period` from the selected calendars.
///
/// The query window is widened by a day on each side, and the API also
/// returns events that merely overlap it, so the result is filtered on the
/// start date in each event's own offset.
pub async fn fetch_period_events(
    source: &dyn CalendarSource,
    selection: &[SelectedCalendar],
    period: ReportPeriod,
    offset: FixedOffset,
) -> Result<Vec<CalendarEvent>> {
    let (start, end) = period.time_range(offset);
    let margin = Duration::days(WINDOW_MARGIN_DAYS);
    let (time_min, time_max) = (start - margin, end + margin);
    let mut events = Vec::new();
    let mut fetched_ids = HashSet::new();

    for calendar in selection {
        if !fetched_ids.insert(calendar.id.as_str()) {
            tracing::debug!("calendar {} listed twice in selection, skipping", calendar.id);
            continue;
        }
        let fetched = source.list_events(calendar, time_min, time_max).await?;
        let fetched_count = fetched.len();
        let in_period: Vec<CalendarEvent> = fetched
            .into_iter()
            .filter(|e| period.contains(e.date))
            .collect();
        tracing::debug!(
            "calendar {}: {} event(s) in {}, {} outside",
            calendar.name,
            in_period.len(),
            period,
            fetched_count - in_period.len()
        );
        events.extend(in_period);
    }

    Ok(events)
}
