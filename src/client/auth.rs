use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};

use super::{api::send, ClientError};
use crate::{
    auth::dto::AuthResponse,
    session::{AuthSource, Session, SessionEvent},
};

const EVENT_CAPACITY: usize = 16;

/// Session-holding client for the `/api/auth` routes. Publishes a
/// [`SessionEvent`] for every change of the current session.
pub struct AuthClient {
    base_url: String,
    http: Client,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            current: RwLock::new(None),
            events,
        }
    }

    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let response = self
            .post_credentials("/api/auth/register", email, password)
            .await?;
        info!(user_id = %response.user.id, "signed up");
        Ok(self.establish(response).await)
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let response = self
            .post_credentials("/api/auth/login", email, password)
            .await?;
        info!(user_id = %response.user.id, "signed in");
        Ok(self.establish(response).await)
    }

    /// Swaps the refresh token for a new pair. A rejected refresh token ends
    /// the session.
    pub async fn refresh_session(&self) -> Result<Session, ClientError> {
        let refresh_token = self
            .current
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(ClientError::MissingSession)?;

        let req = self
            .http
            .post(format!("{}/api/auth/refresh", self.base_url))
            .json(&json!({ "refresh_token": refresh_token }));
        let result: Result<AuthResponse, ClientError> = send(req).await;

        // The session may have ended or changed hands while the call was out;
        // only the session that sent `refresh_token` is touched.
        let mut current = self.current.write().await;
        if current.as_ref().map(|s| s.refresh_token.as_str()) != Some(refresh_token.as_str()) {
            debug!("session changed during refresh; dropping result");
            return Err(ClientError::MissingSession);
        }

        match result {
            Ok(response) => {
                let session = to_session(response);
                *current = Some(session.clone());
                self.publish(SessionEvent::Refreshed(session.clone()));
                Ok(session)
            }
            Err(ClientError::Unauthorized(body)) => {
                warn!("refresh token rejected; ending session");
                if let Some(s) = current.take() {
                    info!(user_id = %s.user_id, "signed out");
                    self.publish(SessionEvent::Ended);
                }
                Err(ClientError::Unauthorized(body))
            }
            Err(e) => Err(e),
        }
    }

    /// Refreshes the session when its access token has expired.
    pub async fn ensure_fresh(&self) -> Result<Session, ClientError> {
        let session = self
            .current
            .read()
            .await
            .clone()
            .ok_or(ClientError::MissingSession)?;
        if session.is_expired() {
            self.refresh_session().await
        } else {
            Ok(session)
        }
    }

    /// Tokens are stateless on the server, so signing out only drops the
    /// local session.
    pub async fn sign_out(&self) {
        let previous = self.current.write().await.take();
        if let Some(s) = previous {
            info!(user_id = %s.user_id, "signed out");
            self.publish(SessionEvent::Ended);
        }
    }

    async fn post_credentials(&self, endpoint: &str, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let req = self
            .http
            .post(format!("{}{}", self.base_url, endpoint))
            .json(&json!({ "email": email, "password": password }));
        send(req).await
    }

    async fn establish(&self, response: AuthResponse) -> Session {
        let session = to_session(response);
        *self.current.write().await = Some(session.clone());
        self.publish(SessionEvent::Established(session.clone()));
        session
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

fn to_session(r: AuthResponse) -> Session {
    Session::new(r.access_token, r.refresh_token, r.user.id, r.expires_in)
}

#[async_trait]
impl AuthSource for AuthClient {
    async fn get_session(&self) -> Result<Option<Session>, ClientError> {
        Ok(self.current.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::json;
    use uuid::Uuid;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn auth_body(user_id: Uuid) -> serde_json::Value {
        json!({
            "access_token": "acc",
            "refresh_token": "ref",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": { "id": user_id, "email": "a@b.co" }
        })
    }

    #[tokio::test]
    async fn sign_in_stores_session_and_emits_established() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"email": "a@b.co", "password": "password123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(user_id)))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri());
        let mut events = client.subscribe();
        let session = client.sign_in_with_password("a@b.co", "password123").await.unwrap();

        assert_eq!(session.user_id, user_id);
        assert_eq!(client.get_session().await.unwrap(), Some(session.clone()));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Established(session));
    }

    #[tokio::test]
    async fn rejected_login_keeps_no_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid credentials"))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri());
        let err = client.sign_in_with_password("a@b.co", "nope-nope").await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));
        assert_eq!(client.get_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn refresh_emits_refreshed_and_failed_refresh_ends_session() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(user_id)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(user_id)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri());
        let mut events = client.subscribe();
        client.sign_up("a@b.co", "password123").await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::Established(_)));

        client.refresh_session().await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::Refreshed(_)));

        assert!(client.refresh_session().await.is_err());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Ended);
        assert_eq!(client.get_session().await.unwrap(), None);
    }

    async fn signed_in_with_slow_refresh(user_id: Uuid) -> (MockServer, Arc<AuthClient>) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(user_id)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(auth_body(user_id))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let client = Arc::new(AuthClient::new(server.uri()));
        client.sign_in_with_password("a@b.co", "password123").await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn sign_out_during_refresh_is_not_undone() {
        let (_server, client) = signed_in_with_slow_refresh(Uuid::new_v4()).await;
        let mut events = client.subscribe();

        let refreshing = tokio::spawn({
            let client = client.clone();
            async move { client.refresh_session().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.sign_out().await;

        let res = refreshing.await.unwrap();
        assert!(matches!(res, Err(ClientError::MissingSession)));
        assert_eq!(client.get_session().await.unwrap(), None);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Ended);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresh_does_not_replace_a_newer_sign_in() {
        let first = Uuid::new_v4();
        let (server, client) = signed_in_with_slow_refresh(first).await;

        let refreshing = tokio::spawn({
            let client = client.clone();
            async move { client.refresh_session().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = Uuid::new_v4();
        let mut body = auth_body(second);
        body["refresh_token"] = json!("ref-2");
        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        client.sign_in_with_password("b@b.co", "password123").await.unwrap();

        assert!(refreshing.await.unwrap().is_err());
        let current = client.get_session().await.unwrap().unwrap();
        assert_eq!(current.user_id, second);
        assert_eq!(current.refresh_token, "ref-2");
    }

    #[tokio::test]
    async fn ensure_fresh_refreshes_only_expired_sessions() {
        let user_id = Uuid::new_v4();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(user_id)))
            .mount(&server)
            .await;
        let mut refreshed = auth_body(user_id);
        refreshed["access_token"] = json!("acc-2");
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(refreshed))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri());
        client.sign_in_with_password("a@b.co", "password123").await.unwrap();
        assert_eq!(client.ensure_fresh().await.unwrap().access_token, "acc");

        client.current.write().await.as_mut().unwrap().expires_at = 0;
        assert_eq!(client.ensure_fresh().await.unwrap().access_token, "acc-2");
    }

    #[tokio::test]
    async fn refresh_without_session_fails_fast() {
        let client = AuthClient::new("http://127.0.0.1:9");
        assert!(matches!(
            client.refresh_session().await,
            Err(ClientError::MissingSession)
        ));
    }
}
