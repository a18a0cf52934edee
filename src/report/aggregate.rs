use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::normalize::PatientKey;
use crate::models::CalendarEvent;

/// One row of the `totales` sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotalsRow {
    pub calendar_id: String,
    pub calendar: String,
    pub name: String,
    pub total: usize,
}

/// One column of the `detalle` sheet: a literal normalized title and its dates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailColumn {
    pub label: String,
    pub dates: Vec<NaiveDate>,
}

/// All detail columns of one calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailSection {
    pub calendar_id: String,
    pub calendar: String,
    pub columns: Vec<DetailColumn>,
}

/// Result of grouping a month of events by calendar and patient.
///
/// Calendars are ordered by display name, then id. Totals rows are ordered
/// by patient name and detail columns by label, both byte-wise. Dates within
/// a column are ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    pub totals: Vec<TotalsRow>,
    pub detail: Vec<DetailSection>,
    /// Events with a blank title, which have no patient to count against
    pub skipped_untitled: usize,
}

#[derive(Default)]
struct CalendarBucket {
    name: String,
    totals: BTreeMap<String, usize>,
    columns: BTreeMap<String, Vec<NaiveDate>>,
}

/// Group events into per-patient totals and per-title detail columns
pub fn aggregate(events: &[CalendarEvent]) -> Aggregation {
    let mut buckets: BTreeMap<&str, CalendarBucket> = BTreeMap::new();
    let mut skipped_untitled = 0;

    for event in events {
        let Some(key) = PatientKey::from_title(&event.title) else {
            tracing::warn!(
                "skipping untitled event on {} in calendar {}",
                event.date,
                event.calendar_name
            );
            skipped_untitled += 1;
            continue;
        };

        let bucket = buckets
            .entry(event.calendar_id.as_str())
            .or_insert_with(|| CalendarBucket {
                name: event.calendar_name.clone(),
                ..Default::default()
            });

        *bucket.totals.entry(key.patient).or_insert(0) += 1;
        bucket.columns.entry(key.label).or_default().push(event.date);
    }

    let mut calendars: Vec<(&str, CalendarBucket)> = buckets.into_iter().collect();
    calendars.sort_by(|(id_a, a), (id_b, b)| a.name.cmp(&b.name).then_with(|| id_a.cmp(id_b)));

    let mut aggregation = Aggregation {
        skipped_untitled,
        ..Default::default()
    };

    for (calendar_id, bucket) in calendars {
        for (name, total) in bucket.totals {
            aggregation.totals.push(TotalsRow {
                calendar_id: calendar_id.to_string(),
                calendar: bucket.name.clone(),
                name,
                total,
            });
        }

        let columns = bucket
            .columns
            .into_iter()
            .map(|(label, mut dates)| {
                dates.sort();
                DetailColumn { label, dates }
            })
            .collect();

        aggregation.detail.push(DetailSection {
            calendar_id: calendar_id.to_string(),
            calendar: bucket.name,
            columns,
        });
    }

    aggregation
}

/// Per-calendar figures for the report summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarStats {
    pub calendar: String,
    pub patients: usize,
    pub sessions: usize,
}

/// Headline numbers shown after a report is generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_patients: usize,
    pub total_sessions: usize,
    pub calendars_count: usize,
    pub calendar_stats: Vec<CalendarStats>,
    pub skipped_untitled: usize,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        let calendar_stats: Vec<CalendarStats> = self
            .detail
            .iter()
            .map(|section| CalendarStats {
                calendar: section.calendar.clone(),
                patients: self
                    .totals
                    .iter()
                    .filter(|row| row.calendar_id == section.calendar_id)
                    .count(),
                sessions: section.columns.iter().map(|c| c.dates.len()).sum(),
            })
            .collect();

        ReportSummary {
            total_patients: self.totals.len(),
            total_sessions: self.totals.iter().map(|row| row.total).sum(),
            calendars_count: self.detail.len(),
            calendar_stats,
            skipped_untitled: self.skipped_untitled,
        }
    }
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Patients: {}", self.total_patients)?;
        writeln!(f, "Sessions: {}", self.total_sessions)?;
        writeln!(f, "Calendars: {}", self.calendars_count)?;
        for stats in &self.calendar_stats {
            writeln!(
                f,
                "  {}: {} patient(s), {} session(s)",
                stats.calendar, stats.patients, stats.sessions
            )?;
        }
        if self.skipped_untitled > 0 {
            writeln!(f, "Skipped untitled events: {}", self.skipped_untitled)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(calendar: &str, title: &str, day: u32) -> CalendarEvent {
        CalendarEvent::new(
            format!("{}@group.calendar.google.com", calendar.to_lowercase()),
            calendar,
            title,
            date(2024, 1, day),
        )
    }

    fn sample_events() -> Vec<CalendarEvent> {
        vec![
            event("Adults", "Juan Perez", 3),
            event("Adults", "Juan Perez", 10),
            event("Children", "Padres de Sofia M", 5),
            event("Children", "Sofia M", 12),
        ]
    }

    #[test]
    fn test_reference_month() {
        let agg = aggregate(&sample_events());

        let totals: Vec<_> = agg
            .totals
            .iter()
            .map(|r| (r.calendar.as_str(), r.name.as_str(), r.total))
            .collect();
        assert_eq!(
            totals,
            vec![("Adults", "Juan Perez", 2), ("Children", "Sofia M", 2)]
        );

        assert_eq!(agg.detail.len(), 2);
        let adults = &agg.detail[0];
        assert_eq!(adults.calendar, "Adults");
        assert_eq!(adults.columns.len(), 1);
        assert_eq!(adults.columns[0].label, "Juan Perez");
        assert_eq!(adults.columns[0].dates, vec![date(2024, 1, 3), date(2024, 1, 10)]);

        let children = &agg.detail[1];
        let labels: Vec<_> = children.columns.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Padres de Sofia M", "Sofia M"]);
        assert_eq!(children.columns[0].dates, vec![date(2024, 1, 5)]);
        assert_eq!(children.columns[1].dates, vec![date(2024, 1, 12)]);
    }

    #[test]
    fn test_parent_sessions_fold_into_patient_total() {
        let events = vec![
            event("Children", "sofia m", 2),
            event("Children", "Padres de Sofia M", 9),
            event("Children", "padres de  sofia m", 16),
            event("Children", "Sofia M", 23),
        ];
        let agg = aggregate(&events);

        assert_eq!(agg.totals.len(), 1);
        assert_eq!(agg.totals[0].total, 4);

        let columns = &agg.detail[0].columns;
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].label, "Padres de Sofia M");
        assert_eq!(columns[0].dates.len(), 2);
        assert_eq!(columns[1].label, "Sofia M");
        assert_eq!(columns[1].dates.len(), 2);
    }

    #[test]
    fn test_every_event_counted_once() {
        let events = vec![
            event("Adults", "Juan Perez", 3),
            event("Children", "Padres de Juan Perez", 3),
            event("Adults", "Padres de Juan Perez", 4),
            event("Adults", "Ana", 5),
            event("Adults", "Ana", 5),
        ];
        let agg = aggregate(&events);

        let total: usize = agg.totals.iter().map(|r| r.total).sum();
        let in_columns: usize = agg
            .detail
            .iter()
            .flat_map(|s| &s.columns)
            .map(|c| c.dates.len())
            .sum();
        assert_eq!(total, events.len());
        assert_eq!(in_columns, events.len());

        // Same patient in two calendars stays in two buckets
        let juan: Vec<_> = agg.totals.iter().filter(|r| r.name == "Juan Perez").collect();
        assert_eq!(juan.len(), 2);

        // Same-day duplicates are both kept
        let ana = agg.detail[0]
            .columns
            .iter()
            .find(|c| c.label == "Ana")
            .unwrap();
        assert_eq!(ana.dates, vec![date(2024, 1, 5), date(2024, 1, 5)]);
    }

    #[test]
    fn test_dates_sorted_regardless_of_input_order() {
        let events = vec![
            event("Adults", "Juan Perez", 25),
            event("Adults", "Juan Perez", 4),
            event("Adults", "Juan Perez", 11),
        ];
        let agg = aggregate(&events);
        assert_eq!(
            agg.detail[0].columns[0].dates,
            vec![date(2024, 1, 4), date(2024, 1, 11), date(2024, 1, 25)]
        );
    }

    #[test]
    fn test_calendars_sorted_by_name_then_id() {
        let events = vec![
            CalendarEvent::new("z-id", "Zeta", "A", date(2024, 1, 1)),
            CalendarEvent::new("b-id", "Alpha", "A", date(2024, 1, 1)),
            CalendarEvent::new("a-id", "Alpha", "B", date(2024, 1, 1)),
        ];
        let agg = aggregate(&events);

        let order: Vec<_> = agg
            .detail
            .iter()
            .map(|s| s.calendar_id.as_str())
            .collect();
        assert_eq!(order, vec!["a-id", "b-id", "z-id"]);
    }

    #[test]
    fn test_empty_input_is_empty_report() {
        let agg = aggregate(&[]);
        assert!(agg.is_empty());
        assert!(agg.detail.is_empty());

        let summary = agg.summary();
        assert_eq!(summary.total_sessions, 0);
        assert_eq!(summary.calendars_count, 0);
    }

    #[test]
    fn test_untitled_events_are_reported_not_counted() {
        let events = vec![event("Adults", "   ", 3), event("Adults", "Ana", 4)];
        let agg = aggregate(&events);

        assert_eq!(agg.skipped_untitled, 1);
        assert_eq!(agg.totals.len(), 1);
        assert_eq!(agg.summary().skipped_untitled, 1);
    }

    #[test]
    fn test_summary() {
        let summary = aggregate(&sample_events()).summary();

        assert_eq!(summary.total_patients, 2);
        assert_eq!(summary.total_sessions, 4);
        assert_eq!(summary.calendars_count, 2);
        assert_eq!(
            summary.calendar_stats[1],
            CalendarStats {
                calendar: "Children".into(),
                patients: 1,
                sessions: 2
            }
        );
        assert!(summary.to_string().contains("Sessions: 4"));
    }
}
