use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::oauth::{TokenResponse, TOKEN_URL};
use super::CalendarSource;
use crate::error::{Error, Result};
use crate::models::{
    AccountInfo, CalendarEvent, CalendarInfo, ClientCredentials, SelectedCalendar, StoredTokens,
    TokenStore,
};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar implementation using direct API calls
pub struct GoogleCalendar {
    client: reqwest::Client,
    token_manager: Arc<RwLock<TokenManager>>,
}

/// Hands out access tokens, refreshing them from the stored refresh token.
///
/// The token file is the source of truth and is re-read on every call, so a
/// login or logout done elsewhere is picked up immediately.
struct TokenManager {
    credentials: Option<ClientCredentials>,
    store: TokenStore,
}

impl TokenManager {
    async fn get_access_token(
        &mut self,
        client: &reqwest::Client,
        force_refresh: bool,
    ) -> Result<String> {
        let mut tokens = self.store.load()?.ok_or(Error::NotAuthenticated)?;

        if !force_refresh && !tokens.is_expired() {
            return Ok(tokens.access_token);
        }

        self.refresh(client, &mut tokens).await?;
        self.store.save(&tokens)?;
        Ok(tokens.access_token)
    }

    async fn refresh(&self, client: &reqwest::Client, tokens: &mut StoredTokens) -> Result<()> {
        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            Error::Authentication("access token expired and no refresh token is stored".to_string())
        })?;
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            Error::config("Google OAuth client not configured; cannot refresh the access token")
        })?;

        let resp = client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let error = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication(format!("token refresh rejected: {}", error)));
        }
        if !status.is_success() {
            let error = resp.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), format!("token refresh failed: {}", error)));
        }

        let refreshed: TokenResponse = resp.json().await?;
        tokens.update_access_token(refreshed.access_token, refreshed.expires_in.unwrap_or(3600));
        if let Some(rotated) = refreshed.refresh_token {
            tokens.refresh_token = Some(rotated);
        }
        tracing::info!("refreshed Google access token");
        Ok(())
    }
}

impl GoogleCalendar {
    /// Create a client backed by the given token file.
    ///
    /// `credentials` are only needed to refresh expired access tokens.
    pub fn new(credentials: Option<ClientCredentials>, store: TokenStore) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let token_manager = Arc::new(RwLock::new(TokenManager { credentials, store }));

        Ok(Self {
            client,
            token_manager,
        })
    }

    async fn get_token(&self, force_refresh: bool) -> Result<String> {
        let mut manager = self.token_manager.write().await;
        manager.get_access_token(&self.client, force_refresh).await
    }

    async fn send_get(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?)
    }

    /// GET a JSON resource. A 401 triggers one forced token refresh and retry.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let token = self.get_token(false).await?;
        let mut resp = self.send_get(url, query, &token).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("access token rejected, refreshing");
            let token = self.get_token(true).await?;
            resp = self.send_get(url, query, &token).await?;
            if resp.status() == StatusCode::UNAUTHORIZED {
                return Err(Error::Authentication(
                    "Google rejected the refreshed access token".to_string(),
                ));
            }
        }

        let status = resp.status();
        if !status.is_success() {
            let error = resp.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), api_error_message(&error)));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::api(status.as_u16(), format!("unexpected response: {}", e)))
    }
}

/// Prefer the `error.message` field of a Google error body
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListEntry {
    id: String,
    summary: Option<String>,
    summary_override: Option<String>,
    description: Option<String>,
    primary: Option<bool>,
    access_role: Option<String>,
}

impl From<CalendarListEntry> for CalendarInfo {
    fn from(entry: CalendarListEntry) -> Self {
        Self {
            id: entry.id,
            name: entry
                .summary_override
                .or(entry.summary)
                .unwrap_or_else(|| "Unnamed Calendar".to_string()),
            description: entry.description.unwrap_or_default(),
            primary: entry.primary.unwrap_or(false),
            access_role: entry.access_role.unwrap_or_else(|| "reader".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
    summary: Option<String>,
    start: Option<ApiEventTime>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl ApiEventTime {
    /// Start date, in the event's own offset for timed events
    fn start_date(&self) -> Option<NaiveDate> {
        if let Some(date_time) = &self.date_time {
            return DateTime::parse_from_rfc3339(date_time)
                .ok()
                .map(|dt| dt.date_naive());
        }
        self.date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

fn convert_event(event: ApiEvent, calendar: &SelectedCalendar) -> Option<CalendarEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }
    // Untitled events are kept so the report can count them as skipped
    let title = event.summary.unwrap_or_default();
    let Some(date) = event.start.as_ref().and_then(ApiEventTime::start_date) else {
        tracing::warn!("skipping event '{}' without a valid start in {}", title, calendar.name);
        return None;
    };
    Some(CalendarEvent {
        calendar_id: calendar.id.clone(),
        calendar_name: calendar.name.clone(),
        title,
        date,
    })
}

#[async_trait]
impl CalendarSource for GoogleCalendar {
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        let url = format!("{}/users/me/calendarList", CALENDAR_API_BASE);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("maxResults", "250".to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: CalendarListResponse = self.get_json(&url, &query).await?;
            calendars.extend(page.items.into_iter().map(CalendarInfo::from));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("found {} calendar(s)", calendars.len());
        Ok(calendars)
    }

    async fn list_events(
        &self,
        calendar: &SelectedCalendar,
        time_min: DateTime<FixedOffset>,
        time_max: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(&calendar.id)
        );
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", "2500".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: EventListResponse = self.get_json(&url, &query).await?;
            events.extend(
                page.items
                    .into_iter()
                    .filter_map(|event| convert_event(event, calendar)),
            );

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("fetched {} event(s) from {}", events.len(), calendar.name);
        Ok(events)
    }

    async fn account(&self) -> Result<AccountInfo> {
        #[derive(Deserialize)]
        struct PrimaryCalendar {
            id: String,
            summary: Option<String>,
        }

        let url = format!("{}/calendars/primary", CALENDAR_API_BASE);
        let primary: PrimaryCalendar = self.get_json(&url, &[]).await?;
        Ok(AccountInfo {
            summary: primary
                .summary
                .unwrap_or_else(|| "Primary Calendar".to_string()),
            email: primary.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected() -> SelectedCalendar {
        SelectedCalendar {
            id: "children@group.calendar.google.com".to_string(),
            name: "Children".to_string(),
        }
    }

    fn parse_events(json: &str) -> Vec<CalendarEvent> {
        let page: EventListResponse = serde_json::from_str(json).unwrap();
        page.items
            .into_iter()
            .filter_map(|e| convert_event(e, &selected()))
            .collect()
    }

    #[test]
    fn test_convert_timed_and_all_day_events() {
        let events = parse_events(
            r#"{
                "items": [
                    {"summary": "Sofia M", "start": {"dateTime": "2024-01-12T16:00:00-03:00"}},
                    {"summary": "Padres de Sofia M", "start": {"date": "2024-01-05"}}
                ]
            }"#,
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Sofia M");
        assert_eq!(events[0].date, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
        assert_eq!(events[0].calendar_name, "Children");
        assert_eq!(events[1].date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn test_timed_event_uses_its_own_offset() {
        // 23:30 at -03:00 is already the next day in UTC
        let events = parse_events(
            r#"{"items": [{"summary": "Late", "start": {"dateTime": "2024-01-31T23:30:00-03:00"}}]}"#,
        );
        assert_eq!(events[0].date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_skips_undated_and_cancelled() {
        let events = parse_events(
            r#"{
                "items": [
                    {"start": {"date": "2024-01-05"}},
                    {"summary": "No start"},
                    {"summary": "Bad start", "start": {"dateTime": "yesterday"}},
                    {"summary": "Gone", "status": "cancelled", "start": {"date": "2024-01-05"}},
                    {"summary": "Kept", "status": "confirmed", "start": {"date": "2024-01-06"}}
                ],
                "nextPageToken": "abc"
            }"#,
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "");
        assert_eq!(events[1].title, "Kept");
    }

    #[test]
    fn test_calendar_list_entry_defaults() {
        let page: CalendarListResponse = serde_json::from_str(
            r#"{
                "items": [
                    {"id": "me@example.com", "summary": "me@example.com", "primary": true, "accessRole": "owner"},
                    {"id": "x@group.calendar.google.com", "summaryOverride": "Adults"},
                    {"id": "y@group.calendar.google.com"}
                ]
            }"#,
        )
        .unwrap();
        let calendars: Vec<CalendarInfo> = page.items.into_iter().map(CalendarInfo::from).collect();

        assert!(calendars[0].primary);
        assert_eq!(calendars[0].access_role, "owner");
        assert_eq!(calendars[1].name, "Adults");
        assert_eq!(calendars[2].name, "Unnamed Calendar");
        assert_eq!(calendars[2].access_role, "reader");
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 404, "message": "Not Found"}}"#;
        assert_eq!(api_error_message(body), "Not Found");
        assert_eq!(api_error_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_missing_token_file_is_not_authenticated() {
        let dir = tempfile::tempdir().unwrap();
        let calendar =
            GoogleCalendar::new(None, TokenStore::new(dir.path().join("tokens.json"))).unwrap();

        let err = calendar.list_calendars().await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
        assert!(err.requires_reauth());
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_token_needs_login() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store
            .save(&StoredTokens::new("stale", None, Some(0), vec![]))
            .unwrap();
        let calendar = GoogleCalendar::new(None, store).unwrap();

        let err = calendar.account().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }
}
