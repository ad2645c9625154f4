use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;

use crate::config::{ClientConfig, ConfigError, Endpoints};

/// Shared HTTP plumbing for the backend clients: one connection pool, the
/// resolved endpoints, and the auth headers every request carries.
#[derive(Debug, Clone)]
pub struct ApiHttp {
    client: Client,
    endpoints: Endpoints,
    auth_token: Option<String>,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiHttp {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(concat!("luna-job-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoints: config.endpoints()?,
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn has_token(&self) -> bool {
        self.auth_token.is_some()
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.authorize(self.client.get(url))
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.authorize(self.client.post(url))
    }

    pub fn delete(&self, url: Url) -> RequestBuilder {
        self.authorize(self.client.delete(url))
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }
        request
    }
}

/// Pull the backend's `{ "error": ... }` text out of a failed response,
/// falling back to a generic message.
pub async fn error_message(response: Response, fallback: &str) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) if !parsed.error.trim().is_empty() => parsed.error,
        _ => format!("{} (HTTP {})", fallback, status.as_u16()),
    }
}
