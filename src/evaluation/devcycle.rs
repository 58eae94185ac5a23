use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{
    DevCycleUser, EvaluationContext, Feature, FeatureProvider, ProviderError, ProviderMetadata,
    Variable,
};

pub const DEFAULT_BUCKETING_API_URL: &str = "https://bucketing-api.devcycle.com";

/// Evaluates flags through the DevCycle Bucketing API.
/// Every lookup is a fresh request; nothing is cached.
#[derive(Debug, Clone)]
pub struct DevCycleProvider {
    http_client: Client,
    base_url: String,
    sdk_key: String,
}

impl DevCycleProvider {
    /// Create a new DevCycleProvider
    ///
    /// # Arguments
    ///
    /// * `sdk_key` - Server SDK key, sent as the Authorization header
    /// * `base_url` - Bucketing API root, without a trailing slash
    /// * `timeout` - Per-request timeout
    pub fn new(
        sdk_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sdk_key: sdk_key.into(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        context: &EvaluationContext,
    ) -> Result<T, ProviderError> {
        let user = DevCycleUser::try_from(context)?;
        let url = format!("{}{}", self.base_url, path);

        debug!(url = %url, user_id = %user.user_id, "Calling bucketing api");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", &self.sdk_key)
            .json(&user)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or("Failed to read response".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl FeatureProvider for DevCycleProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata { name: "devcycle" }
    }

    async fn resolve_variable(
        &self,
        key: &str,
        context: &EvaluationContext,
    ) -> Result<Variable, ProviderError> {
        let path = format!("/v1/variables/{}", key);

        match self.post(&path, context).await {
            Err(ProviderError::Status { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Err(ProviderError::FlagNotFound(key.to_string()))
            }
            result => result,
        }
    }

    async fn all_variables(
        &self,
        context: &EvaluationContext,
    ) -> Result<HashMap<String, Variable>, ProviderError> {
        self.post("/v1/variables", context).await
    }

    async fn all_features(
        &self,
        context: &EvaluationContext,
    ) -> Result<HashMap<String, Feature>, ProviderError> {
        self.post("/v1/features", context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn provider(url: &str) -> DevCycleProvider {
        DevCycleProvider::new("dvc_server_test", url, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_variable() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/variables/togglebot-speed")
            .match_header("authorization", "dvc_server_test")
            .match_body(Matcher::PartialJson(json!({ "user_id": "my-user" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "_id": "638680d6fcb67b96878d90e6",
                    "key": "togglebot-speed",
                    "type": "String",
                    "value": "surprise"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let variable = provider(&server.url())
            .resolve_variable("togglebot-speed", &EvaluationContext::new("my-user"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(variable.value, json!("surprise"));
        assert!(!variable.is_defaulted);
    }

    #[tokio::test]
    async fn test_user_body_keeps_custom_data_nested() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/variables/togglebot-speed")
            .match_body(Matcher::PartialJson(json!({
                "user_id": "my-user",
                "email": "real@devcycle.com",
                "customData": { "email": "spoof@evil.com" }
            })))
            .with_status(200)
            .with_body(json!({ "key": "togglebot-speed", "value": "slow" }).to_string())
            .create_async()
            .await;

        let mut user = DevCycleUser::new("my-user");
        user.email = Some("real@devcycle.com".to_string());
        user.custom_data
            .insert("email".to_string(), json!("spoof@evil.com"));

        let variable = provider(&server.url())
            .resolve_variable("togglebot-speed", &EvaluationContext::from(&user))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(variable.value, json!("slow"));
    }

    #[test]
    fn test_metadata() {
        assert_eq!(provider("http://localhost:1234").metadata().name, "devcycle");
    }

    #[tokio::test]
    async fn test_variable_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/variables/togglebot-wink")
            .with_status(404)
            .with_body(json!({ "message": "Variable not found" }).to_string())
            .create_async()
            .await;

        let result = provider(&server.url())
            .resolve_variable("togglebot-wink", &EvaluationContext::new("my-user"))
            .await;

        assert!(matches!(result, Err(ProviderError::FlagNotFound(key)) if key == "togglebot-wink"));
    }

    #[tokio::test]
    async fn test_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/features")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = provider(&server.url())
            .all_features(&EvaluationContext::new("my-user"))
            .await;

        match result {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_features() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/features")
            .with_status(200)
            .with_body(
                json!({
                    "hello-togglebot": {
                        "_id": "6216420c2ea68943c8833c09",
                        "key": "hello-togglebot",
                        "type": "release",
                        "_variation": "6216420c2ea68943c8833c0b",
                        "variationKey": "variation-on",
                        "variationName": "Variation On",
                        "evalReason": { "reason": "ALL_USERS" }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let features = provider(&server.url())
            .all_features(&EvaluationContext::new("my-user"))
            .await
            .unwrap();

        assert_eq!(features["hello-togglebot"].variation_name, "Variation On");
    }

    #[tokio::test]
    async fn test_bad_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/variables")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let result = provider(&server.url())
            .all_variables(&EvaluationContext::new("my-user"))
            .await;

        assert!(matches!(result, Err(ProviderError::Decode(_))));
    }

    #[tokio::test]
    async fn test_no_request_without_targeting_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = provider(&server.url())
            .resolve_variable("togglebot-speed", &EvaluationContext::default())
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ProviderError::TargetingKeyMissing)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let provider = provider("http://localhost:1234/");
        assert_eq!(provider.base_url, "http://localhost:1234");
    }
}
