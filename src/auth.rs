//! Token acquisition against the identity endpoint.

use crate::clock::Clock;
use crate::credentials::Credentials;
use crate::error::AuthError;
use crate::protocol::{AuthProtocol, IssuedToken};
use crate::session::TokenStore;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Performs the authentication exchange for the configured protocol variant
#[derive(Debug, Clone)]
pub struct Authenticator {
    http: Client,
    auth_url: String,
    protocol: AuthProtocol,
    credentials: Credentials,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    pub fn new(
        http: Client,
        auth_url: impl Into<String>,
        protocol: AuthProtocol,
        credentials: Credentials,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            protocol,
            credentials,
            clock,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// Obtain a fresh token and record it in `store`.
    ///
    /// Exactly one HTTP exchange per call; failures are returned as-is.
    #[instrument(skip(self, store), fields(protocol = %self.protocol, user = %self.credentials.user()))]
    pub async fn authorize(&self, store: &TokenStore) -> Result<IssuedToken, AuthError> {
        let request = self.protocol.request(&self.credentials);
        let url = format!("{}{}", self.auth_url, request.path);
        debug!(%url, "Requesting token");

        let mut builder = self.http.request(request.method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(AuthError::Transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(AuthError::Transport)?;

        if !status.is_success() {
            return Err(AuthError::Rejected {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let issued = self.protocol.extract(&headers, &body, self.clock.now())?;
        store
            .set(issued.token.clone(), Some(issued.expires_at))
            .await;

        info!(expires_at = %issued.expires_at, "Authenticated");
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, Utc};
    use mockito::Server;

    #[tokio::test]
    async fn test_authorize_v1_updates_store() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/v1.0")
            .match_header("x-auth-user", "12345_alice")
            .match_header("x-auth-key", "secret")
            .with_status(204)
            .with_header("x-auth-token", "tok-v1")
            .with_header("x-expire-auth-token", "60")
            .create_async()
            .await;

        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let auth = Authenticator::new(
            Client::new(),
            server.url(),
            AuthProtocol::V1,
            Credentials::new("12345_alice", "secret"),
            clock,
        );
        let store = TokenStore::default();

        let issued = auth.authorize(&store).await.unwrap();

        mock.assert_async().await;
        assert_eq!(issued.token, "tok-v1");
        assert_eq!(issued.expires_at, now + Duration::seconds(60));
        assert_eq!(store.valid_token(now).await.as_deref(), Some("tok-v1"));
    }

    #[tokio::test]
    async fn test_authorize_rejected_leaves_store_untouched() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v3/auth/tokens")
            .with_status(401)
            .with_body("The request you have made requires authentication.")
            .create_async()
            .await;

        let auth = Authenticator::new(
            Client::new(),
            server.url(),
            AuthProtocol::V3,
            Credentials::new("12345_alice", "wrong"),
            Arc::new(crate::clock::SystemClock),
        );
        let store = TokenStore::default();

        let err = auth.authorize(&store).await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status, .. } if status.as_u16() == 401));
        assert!(!store.is_valid(Utc::now()).await);
    }
}
