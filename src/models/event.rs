use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::LocalConfig;

/// A single calendar event, reduced to what reports need
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub calendar_id: String,
    pub calendar_name: String,
    /// Event title as typed in the calendar
    pub title: String,
    /// Start date in the event's own timezone
    pub date: NaiveDate,
}

impl CalendarEvent {
    pub fn new(
        calendar_id: impl Into<String>,
        calendar_name: impl Into<String>,
        title: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            calendar_name: calendar_name.into(),
            title: title.into(),
            date,
        }
    }
}

/// A calendar available on the connected account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub primary: bool,
    pub access_role: String,
}

/// A calendar included in reports, as persisted in the selection file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedCalendar {
    pub id: String,
    pub name: String,
}

impl SelectedCalendar {
    pub const UNKNOWN_NAME: &'static str = "Unknown Calendar";

    /// Resolve display names for the given ids from the account's calendars.
    ///
    /// Repeated ids are dropped, keeping the first occurrence.
    pub fn resolve(ids: &[String], available: &[CalendarInfo]) -> Vec<Self> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|&id| seen.insert(id.as_str()))
            .map(|id| Self {
                id: id.clone(),
                name: available
                    .iter()
                    .find(|cal| &cal.id == id)
                    .map(|cal| cal.name.clone())
                    .unwrap_or_else(|| Self::UNKNOWN_NAME.to_string()),
            })
            .collect()
    }
}

/// An available calendar and whether it goes into reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    #[serde(flatten)]
    pub calendar: CalendarInfo,
    pub selected: bool,
}

impl CalendarEntry {
    pub fn from_available(available: Vec<CalendarInfo>, config: &LocalConfig) -> Vec<Self> {
        available
            .into_iter()
            .map(|calendar| Self {
                selected: config.is_selected(&calendar.id),
                calendar,
            })
            .collect()
    }
}

/// Who the calendar account belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub email: String,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, name: &str) -> CalendarInfo {
        CalendarInfo {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            primary: false,
            access_role: "owner".to_string(),
        }
    }

    #[test]
    fn test_resolve_selected_names() {
        let available = vec![info("a@group", "Adults"), info("c@group", "Children")];
        let ids = vec!["c@group".to_string(), "gone@group".to_string()];

        let selected = SelectedCalendar::resolve(&ids, &available);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "Children");
        assert_eq!(selected[1].id, "gone@group");
        assert_eq!(selected[1].name, SelectedCalendar::UNKNOWN_NAME);
    }

    #[test]
    fn test_resolve_drops_repeated_ids() {
        let available = vec![info("a@group", "Adults"), info("c@group", "Children")];
        let ids: Vec<String> = ["c@group", "a@group", "c@group", "a@group"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let selected = SelectedCalendar::resolve(&ids, &available);

        let ids: Vec<&str> = selected.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c@group", "a@group"]);
    }
}
