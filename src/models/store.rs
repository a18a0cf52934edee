use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::SelectedCalendar;
use crate::error::{Error, Result};

/// Environment variable overriding the configuration directory
pub const HOME_ENV: &str = "GCAL_EXTRACTOR_HOME";

/// Locations of the files kept on the local machine
#[derive(Debug, Clone)]
pub struct AppPaths {
    dir: PathBuf,
}

impl AppPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$GCAL_EXTRACTOR_HOME`, or `$HOME/.config/gcal-extractor`
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var(HOME_ENV) {
            return Self::new(dir);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(
            PathBuf::from(home)
                .join(".config")
                .join(crate::APP_NAME),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tokens_file(&self) -> PathBuf {
        self.dir.join("tokens.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.dir.join("credentials.json")
    }
}

/// Write via a temporary sibling and rename, so readers never see a partial file
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// OAuth tokens persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredTokens {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes,
        }
    }

    /// Expired or expiring within the next minute
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at - Duration::seconds(60),
            None => false,
        }
    }

    pub fn update_access_token(&mut self, access_token: impl Into<String>, expires_in_secs: i64) {
        self.access_token = access_token.into();
        self.expires_at = Some(Utc::now() + Duration::seconds(expires_in_secs));
    }
}

/// The on-disk token file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<StoredTokens>> {
        read_json(&self.path)
    }

    pub fn save(&self, tokens: &StoredTokens) -> Result<()> {
        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| Error::config(format!("failed to serialize tokens: {}", e)))?;
        write_atomic(&self.path, &content)?;
        tracing::debug!("saved tokens to {}", self.path.display());
        Ok(())
    }

    /// Remove stored tokens. Returns false if there were none.
    pub fn clear(&self) -> Result<bool> {
        remove_if_exists(&self.path)
    }
}

/// Configuration stored locally: which calendars go into reports
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LocalConfig {
    #[serde(default)]
    pub selected_calendars: Vec<SelectedCalendar>,
}

impl LocalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))?;
        write_atomic(path, &content)
    }

    pub fn clear(path: &Path) -> Result<bool> {
        remove_if_exists(path)
    }

    pub fn has_selected_calendars(&self) -> bool {
        !self.selected_calendars.is_empty()
    }

    pub fn is_selected(&self, calendar_id: &str) -> bool {
        self.selected_calendars.iter().any(|c| c.id == calendar_id)
    }
}

/// Google OAuth client registration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    /// `GOOGLE_CLIENT_ID`/`GOOGLE_CLIENT_SECRET`, falling back to `credentials.json`
    pub fn load(paths: &AppPaths) -> Result<Self> {
        if let (Ok(client_id), Ok(client_secret)) = (
            std::env::var("GOOGLE_CLIENT_ID"),
            std::env::var("GOOGLE_CLIENT_SECRET"),
        ) {
            if !client_id.is_empty() {
                return Ok(Self {
                    client_id,
                    client_secret,
                });
            }
        }
        Self::from_file(&paths.credentials_file())
    }

    /// Read a client secrets file as downloaded from the Google Cloud console
    pub fn from_file(path: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        struct SecretsFile {
            installed: Option<ClientCredentials>,
            web: Option<ClientCredentials>,
        }

        let file: SecretsFile = read_json(path)?.ok_or_else(|| {
            Error::config(format!(
                "Google OAuth client not configured. Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET or place the client secrets at {}",
                path.display()
            ))
        })?;

        file.installed
            .or(file.web)
            .ok_or_else(|| Error::config("credentials file has no 'installed' client"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());

        assert!(TokenStore::new(paths.tokens_file()).load().unwrap().is_none());
        assert_eq!(
            LocalConfig::load(&paths.config_file()).unwrap(),
            LocalConfig::default()
        );
    }

    #[test]
    fn test_token_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("tokens.json"));
        let tokens = StoredTokens::new(
            "access",
            Some("refresh".to_string()),
            Some(3600),
            vec![crate::calendar::CALENDAR_SCOPE.to_string()],
        );

        store.save(&tokens).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
        assert!(!loaded.is_expired());
        assert!(!store.path().with_extension("json.tmp").exists());

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_token_expiry_margin() {
        let mut tokens = StoredTokens::new("a", None, Some(30), vec![]);
        assert!(tokens.is_expired());

        tokens.update_access_token("b", 3600);
        assert!(!tokens.is_expired());
        assert_eq!(tokens.access_token, "b");

        let no_expiry = StoredTokens::new("a", None, None, vec![]);
        assert!(!no_expiry.is_expired());
    }

    #[test]
    fn test_selection_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = LocalConfig {
            selected_calendars: vec![SelectedCalendar {
                id: "a@group".to_string(),
                name: "Adults".to_string(),
            }],
        };

        config.save(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["selected_calendars"][0]["id"], "a@group");
        assert_eq!(raw["selected_calendars"][0]["name"], "Adults");

        let loaded = LocalConfig::load(&path).unwrap();
        assert!(loaded.is_selected("a@group"));
        assert!(!loaded.is_selected("b@group"));
    }

    #[test]
    fn test_corrupt_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(LocalConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_credentials_from_installed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(
            &path,
            r#"{"installed":{"client_id":"id.apps.googleusercontent.com","client_secret":"s3cret","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();

        let creds = ClientCredentials::from_file(&path).unwrap();
        assert_eq!(creds.client_id, "id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "s3cret");

        let missing = ClientCredentials::from_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
