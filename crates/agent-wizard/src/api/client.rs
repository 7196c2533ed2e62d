//! reqwest-based client for the agent backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::Backend;
use super::types::*;
use crate::error::{ApiError, GENERIC_FAILURE};
use crate::params::ProviderCatalog;
use crate::poll::{TicketSource, TicketStatus};

/// HTTP+JSON backend client. Attaches a bearer token when one is configured.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!("{} {}", method, url);
        let rb = self.client.request(method, url);
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        decode(checked(self.request(Method::GET, path).send().await?).await?).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.request(method, path).json(body).send().await?;
        decode(checked(resp).await?).await
    }

    /// Requests whose response body is ignored.
    async fn send_empty(&self, method: Method, path: &str) -> Result<(), ApiError> {
        checked(self.request(method, path).send().await?).await?;
        Ok(())
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentRecord>, ApiError> {
        self.get("agents").await
    }

    pub async fn delete_agent(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("agents/{id}")).await
    }

    pub async fn deploy_agent(&self, id: &str) -> Result<JsonValue, ApiError> {
        self.send_json(Method::POST, &format!("agents/{id}/deploy"), &serde_json::json!({}))
            .await
    }

    pub async fn undeploy_agent(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("agents/{id}/undeploy"))
            .await
    }

    pub async fn list_demos(&self) -> Result<Vec<JsonValue>, ApiError> {
        self.get("demos").await
    }

    pub async fn delete_demo(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("demos/{id}")).await
    }

    pub async fn me(&self) -> Result<JsonValue, ApiError> {
        self.get("users/me").await
    }

    pub async fn api_keys(&self) -> Result<JsonValue, ApiError> {
        self.get("users/me/api-keys").await
    }

    pub async fn set_api_key(&self, provider: &str, api_key: &str) -> Result<JsonValue, ApiError> {
        let body = UpdateApiKeyRequest {
            provider: provider.to_string(),
            api_key: api_key.to_string(),
        };
        self.send_json(Method::PUT, "users/me/api-keys", &body).await
    }

    pub async fn delete_api_key(&self, provider: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("users/me/api-keys/{provider}"))
            .await
    }
}

/// Turn a non-2xx response into [`ApiError::Http`].
async fn checked(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body);
    tracing::warn!("backend returned {}: {}", status, message);
    Err(ApiError::Http {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

/// The backend's `detail`, `error` or `message` field, else a generic message.
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<JsonValue>(body) else {
        return GENERIC_FAILURE.to_string();
    };
    ["detail", "error", "message"]
        .iter()
        .filter_map(|k| value.get(*k))
        .find_map(|v| match v {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
            JsonValue::Null | JsonValue::String(_) => None,
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

#[async_trait]
impl TicketSource for HttpBackend {
    async fn ticket_status(&self, ticket_id: &str) -> Result<TicketStatus, ApiError> {
        self.get(&format!("chat/{ticket_id}")).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn providers(&self) -> Result<ProviderCatalog, ApiError> {
        self.get("providers").await
    }

    async fn generate_code(
        &self,
        req: &GenerateCodeRequest,
    ) -> Result<GenerateCodeResponse, ApiError> {
        self.send_json(Method::POST, "agents/generate-code", req).await
    }

    async fn run_code(&self, req: &RunCodeRequest) -> Result<RunCodeResponse, ApiError> {
        self.send_json(Method::POST, "agents/run-code", req).await
    }

    async fn start_chat(&self, req: &ChatRequest) -> Result<ChatStart, ApiError> {
        let value: JsonValue = self.send_json(Method::POST, "chat", req).await?;
        Ok(ChatStart::from_value(value))
    }

    async fn get_agent(&self, id: &str) -> Result<AgentRecord, ApiError> {
        self.get(&format!("agents/{id}")).await
    }

    async fn create_agent(&self, req: &CreateAgentRequest) -> Result<AgentRecord, ApiError> {
        self.send_json(Method::POST, "agents", req).await
    }

    async fn update_agent(
        &self,
        id: &str,
        req: &CreateAgentRequest,
    ) -> Result<AgentRecord, ApiError> {
        self.send_json(Method::PUT, &format!("agents/{id}"), req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_detail_then_error_then_message() {
        assert_eq!(error_message(r#"{"detail":"Agent not found"}"#), "Agent not found");
        assert_eq!(error_message(r#"{"error":"quota exceeded"}"#), "quota exceeded");
        assert_eq!(error_message(r#"{"message":"nope","detail":null}"#), "nope");
        assert_eq!(
            error_message(r#"{"detail":[{"loc":["body","code"]}]}"#),
            r#"[{"loc":["body","code"]}]"#
        );
    }

    #[test]
    fn error_message_falls_back() {
        assert_eq!(error_message("<html>502</html>"), GENERIC_FAILURE);
        assert_eq!(error_message(r#"{"detail":""}"#), GENERIC_FAILURE);
        assert_eq!(error_message(""), GENERIC_FAILURE);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = HttpBackend::new("localhost:8000", None, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
        let ok = HttpBackend::new("http://localhost:8000/", Some(" ".into()), Duration::from_secs(5))
            .expect("client");
        assert_eq!(ok.base_url(), "http://localhost:8000");
        assert!(ok.token.is_none());
    }
}
