use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument};

use super::ClientError;
use crate::{
    analytics::summary::DailyReport,
    nutrition::{DailyTargets, TargetRecord, TargetUpdate, UserProfile},
};

/// Where onboarding persists its results. Both calls are idempotent upserts
/// keyed by the user behind `token`.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn save_profile(&self, token: &str, profile: &UserProfile) -> Result<(), ClientError>;

    async fn save_targets(&self, token: &str, targets: &TargetUpdate) -> Result<(), ClientError>;
}

/// Thin JSON client for the REST service. Every call carries a bearer token.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        token: &str,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let req = self.http.get(self.url(endpoint)).query(query);
        send(req.bearer_auth(token)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        token: &str,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let req = self.http.put(self.url(endpoint)).json(body);
        send(req.bearer_auth(token)).await
    }

    /// `None` for users without a profile yet.
    pub async fn get_profile(&self, token: &str) -> Result<Option<UserProfile>, ClientError> {
        let profile: UserProfile = self.get(token, "/api/profile", &[]).await?;
        Ok((!profile.is_empty()).then_some(profile))
    }

    pub async fn get_targets(&self, token: &str) -> Result<DailyTargets, ClientError> {
        let record: TargetRecord = self.get(token, "/api/profile/targets", &[]).await?;
        Ok(record.into())
    }

    pub async fn daily_summary(&self, token: &str, date: &str) -> Result<DailyReport, ClientError> {
        self.get(token, "/api/analytics/daily", &[("date", date.to_string())])
            .await
    }
}

#[async_trait]
impl ProfileBackend for ApiClient {
    #[instrument(skip_all)]
    async fn save_profile(&self, token: &str, profile: &UserProfile) -> Result<(), ClientError> {
        let _: serde_json::Value = self.put(token, "/api/profile", profile).await?;
        debug!("profile saved");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn save_targets(&self, token: &str, targets: &TargetUpdate) -> Result<(), ClientError> {
        let _: serde_json::Value = self.put(token, "/api/profile/targets", targets).await?;
        debug!("targets saved");
        Ok(())
    }
}

pub(super) async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let response = req.send().await?;
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized(response.text().await?));
    }
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            body: response.text().await?,
        });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::nutrition::{ActivityLevel, GoalType};

    #[tokio::test]
    async fn save_profile_puts_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/profile"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({
                "age": 25,
                "height_cm": 170,
                "weight_kg": 70.5,
                "activity_level": "medium",
                "goal_type": "fat_loss"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/", server.uri()));
        let profile = UserProfile {
            age: Some(25),
            height_cm: Some(170),
            weight_kg: Some(70.5),
            activity_level: Some(ActivityLevel::Medium),
            goal_type: Some(GoalType::FatLoss),
            ..Default::default()
        };
        client.save_profile("tok", &profile).await.unwrap();
    }

    #[tokio::test]
    async fn save_targets_maps_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/profile/targets"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Failed to update targets"))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let err = client
            .save_targets("tok", &TargetUpdate::default())
            .await
            .unwrap_err();
        match err {
            ClientError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "Failed to update targets");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_its_own_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile/targets"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid or expired token"))
            .mount(&server)
            .await;

        let err = ApiClient::new(server.uri()).get_targets("bad").await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn empty_profile_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let profile = ApiClient::new(server.uri()).get_profile("tok").await.unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn daily_summary_passes_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/analytics/daily"))
            .and(query_param("date", "2025-01-02"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "summary": {"calories": 1200.5, "protein": 80.0, "carbs": 100.0, "fats": 40.0, "water": 1500},
                "targets": {
                    "calories_target": 2000, "protein_target_g": 120, "carbs_target_g": 250,
                    "fats_target_g": 60, "water_target_ml": 2500
                }
            })))
            .mount(&server)
            .await;

        let report = ApiClient::new(server.uri())
            .daily_summary("tok", "2025-01-02")
            .await
            .unwrap();
        assert_eq!(report.summary.water, 1500);
        assert_eq!(report.targets.calories_target, 2000);
    }
}
