use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Thin JSON wrapper over `reqwest` for the backend REST API
///
/// Paths are resolved under `{host}/api`. Non-2xx responses become
/// [`Error::Api`]; client errors are logged at info level since they are
/// usually validation failures, server errors at error level.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub(crate) fn new(host: impl Into<String>) -> Self {
        Self::with_timeout(host, Self::DEFAULT_TIMEOUT)
    }

    pub(crate) fn with_timeout(host: impl Into<String>, timeout: Duration) -> Self {
        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    "Failed to build HTTP client with {:?} timeout, using defaults: {}",
                    timeout, e
                );
                Client::new()
            }
        };
        let host = host.into();
        Self {
            client,
            base_url: format!("{}/api", host.trim_end_matches('/')),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&[(&str, String)]>,
    ) -> Result<T> {
        let mut request = self.request(Method::GET, path);
        if let Some(query) = query {
            request = request.query(query);
        }
        Self::json(request.send().await?).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        Self::json(response).await
    }

    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.request(Method::PUT, path).json(body).send().await?;
        Self::json(response).await
    }

    /// DELETE, ignoring any response body
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let response = self.request(Method::DELETE, path).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("Making {} request to {}", method, path);
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            info!("API client error ({}): {}", status.as_u16(), message);
        } else {
            error!("API error ({}): {}", status.as_u16(), message);
        }
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}
