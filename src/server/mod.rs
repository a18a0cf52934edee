mod handlers;
mod routes;

pub use routes::create_router;

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::calendar::oauth::AuthorizationRequest;
use crate::calendar::CalendarSource;
use crate::models::{AppPaths, ClientCredentials};

/// Shared application state
pub struct AppState {
    pub paths: AppPaths,
    pub source: Arc<dyn CalendarSource>,
    pub credentials: Option<ClientCredentials>,
    pub reports_dir: PathBuf,
    pub server_url: String,
    pub http: reqwest::Client,
    /// Sign-in started by `/auth/google`, completed by `/auth/callback`
    pub pending_auth: Mutex<Option<AuthorizationRequest>>,
}

impl AppState {
    pub fn new(
        paths: AppPaths,
        source: Arc<dyn CalendarSource>,
        credentials: Option<ClientCredentials>,
        reports_dir: PathBuf,
        server_url: String,
    ) -> Self {
        Self {
            paths,
            source,
            credentials,
            reports_dir,
            server_url,
            http: reqwest::Client::new(),
            pending_auth: Mutex::new(None),
        }
    }
}

/// Run the local HTTP API
pub async fn run_server(addr: SocketAddr, paths: AppPaths, reports_dir: PathBuf) -> Result<()> {
    let credentials = ClientCredentials::load(&paths).ok();
    if credentials.is_none() {
        tracing::warn!("Google OAuth client not configured; /auth/google will be unavailable");
    }

    let source = Arc::new(crate::cli::open_calendar(&paths)?);
    let server_url = format!("http://{}", addr);

    let state = Arc::new(AppState::new(
        paths,
        source,
        credentials,
        reports_dir,
        server_url,
    ));

    let app = create_router(state);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
