use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;

use super::{ApiResult, ErrorResponse};
use crate::calendar::oauth::{escape_html, exchange_code, AuthorizationRequest};
use crate::cli::{StatusResponse, SuccessResponse};
use crate::models::{LocalConfig, TokenStore};
use crate::server::AppState;

/// Redirect to Google OAuth
pub async fn google_redirect(State(state): State<Arc<AppState>>) -> Response {
    let Some(credentials) = &state.credentials else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Google OAuth not configured")),
        )
            .into_response();
    };

    let redirect_uri = format!("{}/auth/callback", state.server_url);
    match AuthorizationRequest::new(credentials, &redirect_uri) {
        Ok(request) => {
            let url = request.url.clone();
            *state.pending_auth.lock().await = Some(request);
            Redirect::temporary(&url).into_response()
        }
        Err(e) => super::ApiError(e).into_response(),
    }
}

/// Handle Google OAuth callback
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(credentials) = &state.credentials else {
        return (
            StatusCode::BAD_REQUEST,
            Html(result_page("Login Failed", "Google OAuth not configured.")),
        )
            .into_response();
    };

    // A callback with a foreign state must not cancel the sign-in in progress
    let request = {
        let mut pending = state.pending_auth.lock().await;
        let state_matches = pending
            .as_ref()
            .is_some_and(|request| params.get("state") == Some(&request.state));
        if state_matches {
            pending.take()
        } else {
            None
        }
    };
    let Some(request) = request else {
        return (
            StatusCode::BAD_REQUEST,
            Html(result_page("Login Failed", "No matching sign-in in progress.")),
        )
            .into_response();
    };

    let result = async {
        let code = request.code_from_callback(&params)?;
        let tokens = exchange_code(&state.http, credentials, &request, &code).await?;
        TokenStore::new(state.paths.tokens_file()).save(&tokens)?;
        state.source.account().await
    }
    .await;

    match result {
        Ok(account) => {
            tracing::info!("signed in as {}", account.email);
            Html(result_page(
                "Login Successful",
                &format!("Connected as {}. You can close this window.", account.email),
            ))
            .into_response()
        }
        Err(e) => {
            tracing::warn!("sign-in failed: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Html(result_page("Login Failed", &e.user_message())),
            )
                .into_response()
        }
    }
}

fn result_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>gcal-extractor - {title}</title>
    <style>
        body {{ font-family: -apple-system, system-ui, sans-serif; background: #f5f5f5; padding: 40px; text-align: center; }}
        .container {{ background: white; border-radius: 12px; padding: 40px; max-width: 500px; margin: 0 auto; box-shadow: 0 4px 20px rgba(0,0,0,0.1); }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{title}</h1>
        <p>{message}</p>
    </div>
</body>
</html>"#,
        title = escape_html(title),
        message = escape_html(message)
    )
}

/// Forget tokens and selection
pub async fn logout(State(state): State<Arc<AppState>>) -> ApiResult<Json<SuccessResponse>> {
    TokenStore::new(state.paths.tokens_file()).clear()?;
    LocalConfig::clear(&state.paths.config_file())?;
    Ok(Json(SuccessResponse::new("Logged out successfully")))
}

/// Connection state and current selection
pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatusResponse>> {
    let config = LocalConfig::load(&state.paths.config_file())?;

    Ok(Json(StatusResponse::check(state.source.as_ref(), config).await?))
}
