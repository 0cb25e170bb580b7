use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};

use super::{ApiClient, AuthClient, ClientError};
use crate::{
    config::ClientConfig,
    nutrition::DailyTargets,
    onboarding::{FileFlagStore, OnboardingError, OnboardingWizard, RouteState, SessionRouter},
    session::AuthSource,
};

/// Client-side wiring: auth, REST backend, local flag store and the router
/// that decides which screen group to show.
pub struct ClientApp {
    pub auth: Arc<AuthClient>,
    pub api: Arc<ApiClient>,
    pub flags: Arc<FileFlagStore>,
    pub router: Arc<SessionRouter>,
}

impl ClientApp {
    pub fn new(config: &ClientConfig) -> Self {
        let flags = Arc::new(FileFlagStore::new(&config.flag_store_path));
        Self {
            auth: Arc::new(AuthClient::new(&config.api_url)),
            api: Arc::new(ApiClient::new(&config.api_url)),
            router: Arc::new(SessionRouter::new(flags.clone())),
            flags,
        }
    }

    /// Configured from `AKILO_API_URL` and `AKILO_FLAG_STORE`.
    pub fn from_env() -> Self {
        Self::new(&ClientConfig::from_env())
    }

    /// Spawns the router loop. Abort the handle to stop it.
    pub fn start(&self) -> JoinHandle<()> {
        let auth: Arc<dyn AuthSource> = self.auth.clone();
        tokio::spawn(self.router.clone().run(auth))
    }

    pub fn route_state(&self) -> RouteState {
        self.router.state()
    }

    pub fn watch_route(&self) -> watch::Receiver<RouteState> {
        self.router.subscribe()
    }

    pub fn start_onboarding(&self) -> Option<OnboardingWizard> {
        (self.router.state() == RouteState::NeedsOnboarding).then(OnboardingWizard::new)
    }

    pub async fn finish_onboarding(&self, wizard: &OnboardingWizard) -> Result<DailyTargets, OnboardingError> {
        let session = self.auth.ensure_fresh().await.map_err(|e| match e {
            ClientError::MissingSession => OnboardingError::NoSession,
            other => OnboardingError::Save(other),
        })?;
        wizard
            .complete(&session, self.api.as_ref(), self.flags.as_ref(), &self.router)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use serde_json::json;
    use uuid::Uuid;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{
        nutrition::{ActivityLevel, GoalType},
        onboarding::FlagStore,
    };

    async fn wait_for(rx: &mut watch::Receiver<RouteState>, want: RouteState) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
            .await
            .expect("timed out waiting for route state")
            .expect("router dropped");
    }

    async fn mock_backend(user_id: Uuid) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "acc",
                "refresh_token": "ref",
                "token_type": "bearer",
                "expires_in": 3600,
                "user": { "id": user_id, "email": "a@b.co" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/profile/targets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn config(server: &MockServer, flags: PathBuf) -> ClientConfig {
        ClientConfig {
            api_url: server.uri(),
            flag_store_path: flags,
        }
    }

    #[tokio::test]
    async fn first_sign_in_goes_through_onboarding() {
        let dir = tempfile::tempdir().unwrap();
        let user_id = Uuid::new_v4();
        let server = mock_backend(user_id).await;
        let app = ClientApp::new(&config(&server, dir.path().join("flags.json")));
        let mut route = app.watch_route();
        let _task = app.start();

        wait_for(&mut route, RouteState::Unauthenticated).await;
        assert!(app.start_onboarding().is_none());

        app.auth.sign_in_with_password("a@b.co", "password123").await.unwrap();
        wait_for(&mut route, RouteState::NeedsOnboarding).await;

        let mut wizard = app.start_onboarding().expect("wizard offered");
        wizard.select_goal(GoalType::MuscleGain);
        wizard.set_stats("180", "80", "30");
        wizard.continue_to_activity().unwrap();
        wizard.select_activity(ActivityLevel::High);
        wizard.calculate().unwrap();

        let targets = app.finish_onboarding(&wizard).await.unwrap();
        assert_eq!(targets.water_ml, 2800);
        assert_eq!(app.route_state(), RouteState::Authenticated);
        assert!(app.flags.read_flag(user_id).await.unwrap());

        app.auth.sign_out().await;
        wait_for(&mut route, RouteState::Unauthenticated).await;
    }

    #[tokio::test]
    async fn finishing_without_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = ClientApp::new(&ClientConfig {
            api_url: "http://127.0.0.1:9".into(),
            flag_store_path: dir.path().join("flags.json"),
        });
        let err = app
            .finish_onboarding(&OnboardingWizard::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::NoSession));
    }
}
