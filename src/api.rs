use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Serialize)]
struct CredentialsRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// The remote authentication service.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange credentials for a bearer token.
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError>;
    async fn register(&self, username: &str, password: &str) -> Result<(), ApiError>;
}

/// The remote chat service.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send_message(&self, token: &str, message: &str) -> Result<String, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_credentials(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&CredentialsRequest { username, password })
            .send()
            .await?;

        check_status(response).await
    }
}

/// Turn a non-2xx response into [`ApiError::Rejected`], keeping the `detail`
/// string the service sends with its errors.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(ApiError::Rejected {
        status: status.as_u16(),
        detail: parse_detail(&text),
    })
}

fn parse_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(detail) if !detail.is_empty() => Some(detail),
        _ => None,
    }
}

#[async_trait]
impl AuthService for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = self.post_credentials("/auth/login", username, password).await?;
        let body = response.text().await?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
        // The service also returns a token here; registering never logs in.
        self.post_credentials("/auth/register", username, password).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatService for ApiClient {
    async fn send_message(&self, token: &str, message: &str) -> Result<String, ApiError> {
        let url = format!("{}/chat/send_message", self.base_url);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&ChatRequest { message })
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        let chat: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(chat.response)
    }
}
