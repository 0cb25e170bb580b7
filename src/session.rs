//! Session credentials and lifecycle events issued by the auth service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::client::ClientError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    /// Unix timestamp after which the access token is rejected.
    pub expires_at: i64,
}

impl Session {
    pub fn new(access_token: String, refresh_token: String, user_id: Uuid, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            user_id,
            token_type: "bearer".to_string(),
            expires_in,
            expires_at: OffsetDateTime::now_utc().unix_timestamp() + expires_in,
        }
    }

    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc().unix_timestamp() >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Established(Session),
    Refreshed(Session),
    Ended,
}

impl SessionEvent {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            SessionEvent::Established(s) | SessionEvent::Refreshed(s) => Some(s.user_id),
            SessionEvent::Ended => None,
        }
    }
}

/// The auth collaborator as seen by the session router.
#[async_trait]
pub trait AuthSource: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>, ClientError>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
