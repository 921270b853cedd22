//! Account creation and token issuance.

use crate::config::Endpoint;
use crate::error::{Action, Error, Result};
use crate::transport::{HttpTransport, Request, Response, Transport};
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Client for the auth service of one application.
#[derive(Clone)]
pub struct Auth {
    appname: String,
    api_key: String,
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("appname", &self.appname)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Auth {
    /// Creates an auth client against the default auth endpoint.
    pub fn new(appname: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let transport = HttpTransport::new().map_err(Error::Setup)?;
        Ok(Self::with_transport(
            appname,
            api_key,
            Endpoint::auth(),
            Arc::new(transport),
        ))
    }

    pub fn with_transport(
        appname: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: Endpoint,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            appname: appname.into(),
            api_key: api_key.into(),
            endpoint,
            transport,
        }
    }

    pub fn appname(&self) -> &str {
        &self.appname
    }

    /// Creates a new account and returns its access token.
    ///
    /// Best effort: any failure, whether transport, status, or body, yields
    /// `None` so the caller can retry or fall back to [`Auth::authorize`].
    pub async fn create(&self, username: &str, password: &str) -> Option<String> {
        match self.token_request(Action::CreateUser, "create/", username, password).await {
            Ok(token) => {
                info!("Created account for {}", username);
                Some(token)
            }
            Err(e) => {
                warn!("Account creation unavailable: {}", e);
                None
            }
        }
    }

    /// Exchanges credentials for an access token.
    pub async fn authorize(&self, username: &str, password: &str) -> Result<String> {
        self.token_request(Action::Authorize, "authorize/", username, password).await
    }

    async fn token_request(
        &self,
        action: Action,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> Result<String> {
        let url = self.endpoint.url(&format!("{}/{}", self.appname, endpoint));
        debug!("Requesting {} token for {}", action, username);

        let request = Request::new(Method::POST, url).form(vec![
            ("client_id".to_string(), self.api_key.clone()),
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ]);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|source| Error::Transport { action, source })?;

        extract_token(action, &response)
    }
}

fn extract_token(action: Action, response: &Response) -> Result<String> {
    if !response.is_success() {
        return Err(Error::Status {
            action,
            status: response.status.as_u16(),
            body: response.body.clone(),
        });
    }

    let parsed: TokenResponse = response
        .json()
        .map_err(|source| Error::Decode { action, source })?;

    parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(Error::MissingField {
            action,
            field: "access_token",
        })
}
