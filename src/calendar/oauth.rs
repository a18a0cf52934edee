//! Google OAuth2 installed-app flow.
//!
//! The user signs in in their browser; Google redirects back to a loopback
//! address with an authorization code, which is exchanged for tokens. A
//! `state` value and a PKCE (S256) challenge protect the exchange.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

use super::CALENDAR_SCOPE;
use crate::error::{Error, Result};
use crate::models::{ClientCredentials, StoredTokens};

pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// How long the loopback listener waits for the browser
const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// S256 code challenge for a PKCE verifier
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// A started authorization, to be completed by [`exchange_code`]
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

impl AuthorizationRequest {
    pub fn new(credentials: &ClientCredentials, redirect_uri: &str) -> Result<Self> {
        let state = random_string(32);
        let code_verifier = random_string(64);
        let challenge = pkce_challenge(&code_verifier);

        let url = url::Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| Error::config(format!("invalid authorization URL: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            state,
            code_verifier,
            redirect_uri: redirect_uri.to_string(),
        })
    }

    /// Pull the authorization code out of the redirect's query parameters
    pub fn code_from_callback(&self, params: &HashMap<String, String>) -> Result<String> {
        if let Some(error) = params.get("error") {
            return Err(Error::Authentication(format!("authorization denied: {}", error)));
        }
        if params.get("state") != Some(&self.state) {
            return Err(Error::Authentication(
                "state mismatch in OAuth callback".to_string(),
            ));
        }
        params
            .get("code")
            .cloned()
            .ok_or_else(|| Error::Authentication("no authorization code in callback".to_string()))
    }
}

/// Parse the query string of a request target like `/?code=...&state=...`
pub fn parse_query(target: &str) -> HashMap<String, String> {
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

/// Exchange an authorization code for tokens
pub async fn exchange_code(
    client: &reqwest::Client,
    credentials: &ClientCredentials,
    request: &AuthorizationRequest,
    code: &str,
) -> Result<StoredTokens> {
    let resp = client
        .post(TOKEN_URL)
        .form(&[
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("code_verifier", request.code_verifier.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?;

    if !resp.status().is_success() {
        let error = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication(format!("token exchange failed: {}", error)));
    }

    let tokens: TokenResponse = resp.json().await?;
    if tokens.refresh_token.is_none() {
        tracing::warn!("Google did not return a refresh token; you will need to log in again when the access token expires");
    }

    let scopes = tokens
        .scope
        .map(|s| s.split_whitespace().map(String::from).collect())
        .unwrap_or_else(|| vec![CALENDAR_SCOPE.to_string()]);

    Ok(StoredTokens::new(
        tokens.access_token,
        tokens.refresh_token,
        tokens.expires_in,
        scopes,
    ))
}

const CALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>gcal-extractor</title>
<style>
body { font-family: -apple-system, system-ui, sans-serif; text-align: center; padding: 50px; background: #f5f5f5; }
.container { background: white; border-radius: 8px; padding: 40px; max-width: 400px; margin: 0 auto; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
</style>
</head>
<body><div class="container"><h1>{title}</h1><p>{message}</p></div></body>
</html>"#;

/// Escape text for interpolation into HTML element content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn callback_page(title: &str, message: &str) -> String {
    CALLBACK_PAGE
        .replace("{title}", &escape_html(title))
        .replace("{message}", &escape_html(message))
}

/// Run the whole installed-app flow: loopback listener, browser, code exchange
pub async fn run_loopback_flow(credentials: &ClientCredentials) -> Result<StoredTokens> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://127.0.0.1:{}", port);
    let request = AuthorizationRequest::new(credentials, &redirect_uri)?;

    println!("Opening browser for Google sign-in...");
    if let Err(e) = open::that(&request.url) {
        tracing::debug!("failed to open browser: {}", e);
    }
    println!("If it doesn't open automatically, visit:\n{}", request.url);
    println!("Waiting for authentication...");

    let (mut socket, _) = tokio::time::timeout(LOGIN_TIMEOUT, listener.accept())
        .await
        .map_err(|_| Error::Authentication("timed out waiting for sign-in".to_string()))??;

    let mut reader = BufReader::new(&mut socket);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let result = request.code_from_callback(&parse_query(target));

    let (status, body) = match &result {
        Ok(_) => (
            "200 OK",
            callback_page("Login Successful", "You can close this window and return to the terminal."),
        ),
        Err(e) => ("400 Bad Request", callback_page("Login Failed", &e.to_string())),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.flush().await;

    let code = result?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    exchange_code(&client, credentials, &request, &code).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> ClientCredentials {
        ClientCredentials {
            client_id: "client-123.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_pkce_challenge_rfc7636_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_authorization_url() {
        let request = AuthorizationRequest::new(&credentials(), "http://127.0.0.1:4567").unwrap();
        let url = url::Url::parse(&request.url).unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:4567");
        assert_eq!(params["scope"], CALENDAR_SCOPE);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["state"], request.state);
        assert_eq!(params["code_challenge"], pkce_challenge(&request.code_verifier));
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(request.code_verifier.len(), 64);
    }

    #[test]
    fn test_callback_checks_state() {
        let request = AuthorizationRequest::new(&credentials(), "http://127.0.0.1:1").unwrap();

        let ok = parse_query(&format!("/?code=4%2F0abc&state={}", request.state));
        assert_eq!(request.code_from_callback(&ok).unwrap(), "4/0abc");

        let forged = parse_query("/?code=4%2F0abc&state=forged");
        assert!(matches!(
            request.code_from_callback(&forged),
            Err(Error::Authentication(_))
        ));

        let denied = parse_query("/?error=access_denied");
        let err = request.code_from_callback(&denied).unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_callback_page_escapes_message() {
        let page = callback_page("Login Failed", "denied: <img src=x onerror='x'> & more");

        assert!(!page.contains("<img"));
        assert!(page.contains("denied: &lt;img src=x onerror=&#39;x&#39;&gt; &amp; more"));
        assert_eq!(escape_html("Juan \"JP\" Perez"), "Juan &quot;JP&quot; Perez");
    }

    #[test]
    fn test_parse_query_without_query() {
        assert!(parse_query("/favicon.ico").is_empty());
    }
}
