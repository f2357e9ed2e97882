use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use dms_navigator::{Credential, FetchError, FetchResult};
use dms_protocol::ServerErrorBody;
use log::debug;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

/// Shared reqwest client plus the normalised base URL.
#[derive(Debug, Clone)]
pub(crate) struct HttpCore {
    http: Client,
    base_url: String,
}

impl HttpCore {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.normalized_base_url()?;
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ClientError::Http)?;
        Ok(Self { http, base_url })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, path: &str, credential: &Credential) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{method} {url}");
        self.http
            .request(method, url)
            .header(AUTHORIZATION, credential.header_value())
    }

    /// Sends the request and decodes a JSON body.
    pub(crate) async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> FetchResult<T> {
        let response = self.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| FetchError::from(ClientError::Http(err)))?;
        serde_json::from_slice(&bytes).map_err(|err| FetchError::from(ClientError::Json(err)))
    }

    /// Sends the request and only checks the status; the body is ignored.
    pub(crate) async fn unit(&self, request: RequestBuilder) -> FetchResult<()> {
        self.send(request).await.map(drop)
    }

    async fn send(&self, request: RequestBuilder) -> FetchResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|err| FetchError::from(ClientError::Http(err)))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// Builds a status error from the server's `{error, details}` body, falling
/// back to the raw text and then to the canonical reason.
pub(crate) fn status_error(status: StatusCode, body: &str) -> FetchError {
    let parsed = serde_json::from_str::<ServerErrorBody>(body).unwrap_or_default();
    let message = match (parsed.error, parsed.details) {
        (Some(error), Some(details)) if !details.is_empty() => format!("{error} ({details})"),
        (Some(error), _) => error,
        (None, Some(details)) => details,
        (None, None) if !body.trim().is_empty() && !body.trim_start().starts_with('{') => {
            body.trim().to_string()
        }
        (None, None) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    FetchError::Status {
        status: status.as_u16(),
        message,
    }
}
