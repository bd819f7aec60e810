use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{
    AssociationBatch, AssociationResult, CrmObject, SearchPage, SearchRequest, TokenResponse,
};

const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";

#[derive(Debug, Clone)]
pub struct HubSpotConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub timeout_secs: u64,
    pub page_size: u32,
}

impl HubSpotConfig {
    /// Load HubSpot OAuth app config from environment.
    ///
    /// Returns `Ok(None)` if neither `HUBSPOT_CID` nor `HUBSPOT_CS` is set.
    /// Returns `Err` if only one of them is set.
    pub fn from_env() -> Result<Option<Self>, String> {
        let client_id = std::env::var("HUBSPOT_CID").ok();
        let client_secret = std::env::var("HUBSPOT_CS").ok();

        let (client_id, client_secret) = match (client_id, client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            (None, None) => return Ok(None),
            (Some(_), None) => {
                return Err("HUBSPOT_CS is required when HUBSPOT_CID is set".to_string())
            }
            (None, Some(_)) => {
                return Err("HUBSPOT_CID is required when HUBSPOT_CS is set".to_string())
            }
        };

        let base_url = std::env::var("HUBSPOT_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let max_attempts = std::env::var("HUBSPOT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);
        let retry_base_ms = std::env::var("HUBSPOT_RETRY_BASE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);
        let timeout_secs = std::env::var("HUBSPOT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let page_size = std::env::var("HUBSPOT_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        Ok(Some(Self {
            base_url,
            client_id,
            client_secret,
            max_attempts,
            retry_base_ms,
            timeout_secs,
            page_size,
        }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HubSpotClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
}

/// Thin HubSpot API client. Every call takes the bearer token explicitly;
/// retries and token refresh live in [`super::token::TokenManager`].
#[derive(Clone)]
pub struct HubSpotClient {
    client: Client,
    config: HubSpotConfig,
}

impl HubSpotClient {
    pub fn new(config: HubSpotConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn config(&self) -> &HubSpotConfig {
        &self.config
    }

    /// Exchange a refresh token for a fresh access token.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, HubSpotClientError> {
        let url = format!("{}/oauth/v1/token", self.config.base_url);
        let request = self.client.post(url).form(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ]);
        send_json(request).await
    }

    /// Run one page of `/crm/v3/objects/{object}/search`.
    pub async fn search(
        &self,
        object: &str,
        request: &SearchRequest,
        access_token: &str,
    ) -> Result<SearchPage, HubSpotClientError> {
        let url = format!("{}/crm/v3/objects/{}/search", self.config.base_url, object);
        let request = self.client.post(url).bearer_auth(access_token).json(request);
        send_json(request).await
    }

    /// Batch-read associations from `from_type` objects to `to_type` objects.
    pub async fn batch_read_associations(
        &self,
        from_type: &str,
        to_type: &str,
        ids: &[String],
        access_token: &str,
    ) -> Result<Vec<AssociationResult>, HubSpotClientError> {
        let url = format!(
            "{}/crm/v3/associations/{}/{}/batch/read",
            self.config.base_url, from_type, to_type
        );
        let inputs: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| serde_json::json!({ "id": id }))
            .collect();
        let request = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "inputs": inputs }));

        let batch: AssociationBatch = send_json(request).await?;
        Ok(batch.results)
    }

    /// Read a single contact's email address.
    pub async fn contact_email(
        &self,
        contact_id: &str,
        access_token: &str,
    ) -> Result<Option<String>, HubSpotClientError> {
        let url = format!(
            "{}/crm/v3/objects/contacts/{}",
            self.config.base_url, contact_id
        );
        let request = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(&[("properties", "email")]);

        let contact: CrmObject = send_json(request).await?;
        Ok(contact.property("email"))
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, HubSpotClientError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HubSpotClientError::HttpError { status, body });
    }

    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hubspot::query::build_search_request;
    use crate::hubspot::test_support::test_config;
    use chrono::Utc;
    use wiremock::matchers::{
        body_partial_json, body_string_contains, header, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HubSpotClient {
        HubSpotClient::new(test_config())
            .unwrap()
            .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn refresh_posts_refresh_token_form() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/v1/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .and(body_string_contains("client_id=cid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-new",
                "refresh_token": "rt-1",
                "expires_in": 1800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server)
            .refresh_access_token("rt-1")
            .await
            .unwrap();
        assert_eq!(token.access_token, "at-new");
        assert_eq!(token.expires_in, 1800);
    }

    #[tokio::test]
    async fn search_sends_bearer_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/companies/search"))
            .and(header("authorization", "Bearer at-1"))
            .and(body_partial_json(serde_json::json!({
                "limit": 100,
                "sorts": [{"propertyName": "hs_lastmodifieddate", "direction": "ASCENDING"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "id": "1",
                    "properties": {"domain": "acme.io"},
                    "createdAt": "2026-02-10T10:00:00.000Z",
                    "updatedAt": "2026-02-11T10:00:00.000Z"
                }]
            })))
            .mount(&server)
            .await;

        let req = build_search_request(
            "hs_lastmodifieddate",
            &["domain"],
            Utc::now() - chrono::Duration::days(1),
            Utc::now(),
            100,
            None,
        );
        let page = client_for(&server)
            .search("companies", &req, "at-1")
            .await
            .unwrap();
        assert_eq!(page.results.len(), 1);
        assert!(page.next_after().is_none());
    }

    #[tokio::test]
    async fn associations_batch_read() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/associations/CONTACTS/COMPANIES/batch/read"))
            .and(body_partial_json(serde_json::json!({
                "inputs": [{"id": "1"}, {"id": "2"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "COMPLETE",
                "results": [{"from": {"id": "1"}, "to": [{"id": "900", "type": "contact_to_company"}]}]
            })))
            .mount(&server)
            .await;

        let ids = vec!["1".to_string(), "2".to_string()];
        let results = client_for(&server)
            .batch_read_associations("CONTACTS", "COMPANIES", &ids, "at-1")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].from.id, "1");
        assert_eq!(results[0].to[0].id, "900");
    }

    #[tokio::test]
    async fn contact_email_reads_single_property() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts/42"))
            .and(query_param("properties", "email"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "42",
                "properties": {"email": "ada@example.com"},
                "createdAt": "2026-02-10T10:00:00Z",
                "updatedAt": "2026-02-10T10:00:00Z"
            })))
            .mount(&server)
            .await;

        let email = client_for(&server)
            .contact_email("42", "at-1")
            .await
            .unwrap();
        assert_eq!(email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts/7"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .contact_email("7", "stale")
            .await
            .unwrap_err();
        match err {
            HubSpotClientError::HttpError { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "expired");
            }
            other => panic!("expected HttpError, got: {other:?}"),
        }
    }

    // ── env config tests ─────────────────────────────────────────

    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "HUBSPOT_CID",
            "HUBSPOT_CS",
            "HUBSPOT_BASE_URL",
            "HUBSPOT_MAX_ATTEMPTS",
            "HUBSPOT_RETRY_BASE_MS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn from_env_returns_none_without_credentials() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        assert!(HubSpotConfig::from_env().unwrap().is_none());
    }

    #[test]
    fn from_env_fails_with_half_credentials() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("HUBSPOT_CID", "cid");
        let err = HubSpotConfig::from_env().unwrap_err();
        assert!(err.contains("HUBSPOT_CS"), "got: {err}");
        clear_env();
    }

    #[test]
    fn from_env_applies_defaults() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("HUBSPOT_CID", "cid");
        std::env::set_var("HUBSPOT_CS", "secret");
        std::env::set_var("HUBSPOT_MAX_ATTEMPTS", "6");

        let cfg = HubSpotConfig::from_env().unwrap().unwrap();
        assert_eq!(cfg.base_url, "https://api.hubapi.com");
        assert_eq!(cfg.max_attempts, 6);
        assert_eq!(cfg.retry_base_ms, 5000);
        assert_eq!(cfg.page_size, 100);
        clear_env();
    }
}
