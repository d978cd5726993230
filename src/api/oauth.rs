//! OAuth 2.0 authentication flow for the Google Sheets and Gmail APIs.
//!
//! This module handles the complete OAuth workflow including:
//! - Loading OAuth credentials from client_secret.json
//! - Managing access and refresh tokens in token.json
//! - Running the OAuth consent flow with a local callback server
//! - Automatic token refresh when expired

use crate::api::files::{SecretFile, TokenFile};
use crate::api::OAUTH_SCOPES;
use crate::Result;
use anyhow::{anyhow, ensure, Context};
use chrono::Utc;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info};

const OAUTH_CALLBACK_PORT: u16 = 3030;

/// Holds the OAuth client credentials and the current tokens, and hands out a valid access token
/// on demand, refreshing it first when it is at or near expiry.
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: TokenFile,
    token_path: PathBuf,
}

impl TokenProvider {
    /// Runs the complete OAuth consent flow.
    ///
    /// This function:
    /// 1. Loads OAuth credentials from client_secret.json
    /// 2. Starts a local HTTP server on localhost:3030
    /// 3. Prints the Google consent URL for the user to open
    /// 4. Waits for the OAuth callback with the authorization code
    /// 5. Exchanges the code for access and refresh tokens
    /// 6. Saves tokens to token.json
    ///
    /// # Errors
    /// Returns an error if any step fails (missing files, network errors, a state mismatch in
    /// the callback, or Google declining to issue a refresh token).
    pub(crate) async fn initialize(secret_path: &Path, token_path: &Path) -> Result<Self> {
        info!("Starting OAuth consent flow");

        info!("Loading OAuth credentials from {}", secret_path.display());
        let secret = SecretFile::load(secret_path).await?;
        let client = oauth_client(&secret)?;

        // access_type=offline and prompt=consent are required for Google to include a refresh
        // token in the response.
        let (auth_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new((*s).to_string())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        info!("Open this URL in your browser to authorize the application:");
        info!("{auth_url}");
        info!("Local callback server listening on http://localhost:{OAUTH_CALLBACK_PORT}");

        let code = receive_callback_code(csrf_state.secret()).await?;

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&http_client()?)
            .await
            .map_err(|e| anyhow!("Failed to exchange the authorization code: {e}"))?;

        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .context(
                "Google did not return a refresh token. Revoke the app's access at \
                https://myaccount.google.com/permissions and run 'dues auth' again",
            )?;
        let token = TokenFile::new(
            OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            response.access_token().secret().to_string(),
            refresh_token,
            expiry(response.expires_in()),
            None,
        );
        token.save(token_path).await?;

        info!("Authorization successful");
        info!("Tokens saved to {}", token_path.display());

        Ok(Self {
            secret,
            token,
            token_path: token_path.to_owned(),
        })
    }

    /// Loads previously saved credentials and tokens without any user interaction.
    ///
    /// # Errors
    /// Returns an error if either file is missing, unparseable, or the token is missing a
    /// required scope.
    pub(crate) async fn load(secret_path: &Path, token_path: &Path) -> Result<Self> {
        let secret = SecretFile::load(secret_path).await?;
        let token = TokenFile::load(token_path).await?;
        Ok(Self {
            secret,
            token,
            token_path: token_path.to_owned(),
        })
    }

    /// Returns a valid access token, refreshing it first if it is expired or about to expire.
    pub(crate) async fn token_with_refresh(&mut self) -> Result<&str> {
        if self.token.is_expired() {
            self.refresh().await?;
        }
        Ok(self.token.access_token())
    }

    /// Exchanges the refresh token for a new access token and persists the result.
    pub(crate) async fn refresh(&mut self) -> Result<()> {
        debug!("Refreshing the OAuth access token");
        let client = oauth_client(&self.secret)?;
        let refresh_token = RefreshToken::new(self.token.refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http_client()?)
            .await
            .map_err(|e| anyhow!("Failed to refresh the access token: {e}"))?;

        self.token.update(
            response.access_token().secret().to_string(),
            expiry(response.expires_in()),
            response.refresh_token().map(|t| t.secret().to_string()),
        );
        self.token.save(&self.token_path).await?;
        debug!("Token valid until {}", self.token.expires_at());
        Ok(())
    }
}

type OauthClient = BasicClient<
    oauth2::EndpointSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

fn oauth_client(secret: &SecretFile) -> Result<OauthClient> {
    let client = BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string())?)
        .set_token_uri(TokenUrl::new(secret.token_uri().to_string())?)
        .set_redirect_uri(RedirectUrl::new(format!(
            "http://localhost:{OAUTH_CALLBACK_PORT}"
        ))?);
    Ok(client)
}

/// The OAuth RFC requires that redirects are not followed during the token exchange.
fn http_client() -> Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the OAuth HTTP client")
}

fn expiry(expires_in: Option<std::time::Duration>) -> chrono::DateTime<Utc> {
    // Google access tokens last an hour; assume that if the response omits the lifetime.
    let lifetime = expires_in.unwrap_or(std::time::Duration::from_secs(3600));
    Utc::now() + chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::hours(1))
}

/// Runs a one-shot HTTP server on the loopback interface and waits for Google to redirect the
/// user's browser to it with the authorization code.
async fn receive_callback_code(expected_state: &str) -> Result<String> {
    let listener = TcpListener::bind(("127.0.0.1", OAUTH_CALLBACK_PORT))
        .await
        .with_context(|| {
            format!("Unable to listen on localhost:{OAUTH_CALLBACK_PORT} for the OAuth callback")
        })?;
    let (tx, mut rx) = mpsc::channel::<(String, String)>(1);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("Failed to accept the OAuth callback connection")?;
                let io = TokioIo::new(stream);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                        let tx = tx.clone();
                        async move {
                            let query = req.uri().query().unwrap_or_default().to_string();
                            let mut code = None;
                            let mut state = None;
                            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                                match key.as_ref() {
                                    "code" => code = Some(value.into_owned()),
                                    "state" => state = Some(value.into_owned()),
                                    _ => {}
                                }
                            }
                            let body = if let (Some(code), Some(state)) = (code, state) {
                                let _ = tx.send((code, state)).await;
                                "Authorization received. You can close this window."
                            } else {
                                "The authorization code is missing from the callback."
                            };
                            Ok::<_, std::convert::Infallible>(
                                hyper::Response::new(Full::new(Bytes::from(body))),
                            )
                        }
                    });
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
            received = rx.recv() => {
                let (code, state) = received.context("The OAuth callback channel closed unexpectedly")?;
                ensure!(
                    state == expected_state,
                    "OAuth state parameter mismatch. Aborting, this could be a CSRF attempt"
                );
                return Ok(code);
            }
        }
    }
}
