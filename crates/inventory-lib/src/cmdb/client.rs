//! HTTP client for the CMDB generic interface

use super::{ConfigItemPayload, SearchRequest};
use crate::error::CmdbError;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Client bound to one CMDB web service.
///
/// Every operation is `<base>/<Operation>` with a JSON body; the service
/// credentials are merged into each body.
pub struct CmdbClient {
    client: Client,
    base_url: String,
    credentials: Map<String, Value>,
}

impl CmdbClient {
    pub fn new(base_url: &str, credentials: Map<String, Value>) -> Result<Self, CmdbError> {
        Url::parse(base_url)?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn endpoint(&self, operation: &str) -> Result<Url, CmdbError> {
        Ok(Url::parse(&format!("{}/{}", self.base_url, operation))?)
    }

    async fn call<B: Serialize>(&self, method: Method, operation: &str, body: &B) -> Result<Value, CmdbError> {
        let mut body = serde_json::to_value(body)?;
        if let Some(object) = body.as_object_mut() {
            object.extend(self.credentials.clone());
        }

        let url = self.endpoint(operation)?;
        debug!(operation = %operation, url = %url, "Calling CMDB");

        let response = self.client.request(method, url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CmdbError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    /// Exchange the service credentials for a session token
    pub async fn access_token(&self) -> Result<String, CmdbError> {
        let response = self.call(Method::POST, "AccessToken", &Map::new()).await?;
        let token = match &response {
            Value::String(token) => Some(token.clone()),
            Value::Object(object) => object
                .get("AccessToken")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };
        token.filter(|t| !t.is_empty()).ok_or(CmdbError::MissingToken)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Value, CmdbError> {
        self.call(Method::GET, "Search", request).await
    }

    /// Fetch one configuration item by id
    pub async fn get(&self, config_item_id: &str, access_token: Option<&str>) -> Result<Value, CmdbError> {
        let body = serde_json::json!({
            "AccessToken": access_token,
            "ConfigItemID": config_item_id,
        });
        self.call(Method::POST, "Get", &body).await
    }

    pub async fn create(&self, payload: &ConfigItemPayload) -> Result<Value, CmdbError> {
        self.call(Method::POST, "Create", payload).await
    }

    pub async fn update(&self, payload: &ConfigItemPayload) -> Result<Value, CmdbError> {
        self.call(Method::POST, "Update", payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshot;
    use mockito::Matcher;
    use serde_json::json;

    fn credentials() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("UserLogin".to_string(), json!("svc-inventory"));
        map.insert("Password".to_string(), json!("secret"));
        map
    }

    #[tokio::test]
    async fn test_access_token_merges_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ws/AccessToken")
            .match_body(Matcher::PartialJson(json!({"UserLogin": "svc-inventory"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"AccessToken": "abc123"}"#)
            .create_async()
            .await;

        let client = CmdbClient::new(&format!("{}/ws/", server.url()), credentials()).unwrap();
        let token = client.access_token().await.unwrap();

        assert_eq!(token, "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/ws/AccessToken")
            .with_status(200)
            .with_body(r#"{"Error": {"ErrorCode": "AccessToken.AuthFail"}}"#)
            .create_async()
            .await;

        let client = CmdbClient::new(&format!("{}/ws", server.url()), credentials()).unwrap();

        assert!(matches!(client.access_token().await, Err(CmdbError::MissingToken)));
    }

    #[tokio::test]
    async fn test_update_posts_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ws/Update")
            .match_body(Matcher::PartialJson(json!({
                "AccessToken": "tok",
                "Password": "secret",
                "ConfigItem": {"Name": "prd-app1", "DeplState": "Production"}
            })))
            .with_status(200)
            .with_body(r#"{"ConfigItemID": "42"}"#)
            .create_async()
            .await;

        let client = CmdbClient::new(&format!("{}/ws", server.url()), credentials()).unwrap();
        let payload = ConfigItemPayload::from_snapshot(
            &snapshot("2024-05-01", "i-1", Some("prd-app1")),
            Some("tok".to_string()),
        );
        let response = client.update(&payload).await.unwrap();

        assert_eq!(response["ConfigItemID"], "42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ws/Search")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = CmdbClient::new(&format!("{}/ws", server.url()), credentials()).unwrap();
        let result = client.search(&SearchRequest::by_name("prd-app1", None)).await;

        match result {
            Err(CmdbError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            CmdbClient::new("not a url", Map::new()),
            Err(CmdbError::InvalidUrl(_))
        ));
    }
}
