//! ApiClient: thin JSON-over-HTTP wrapper around the dashboard API

use crate::error::{ConnectError, ConnectResult};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Longest response body kept in a `ConnectError::Status`
const MAX_ERROR_BODY: usize = 512;

/// Shared HTTP client bound to one API base URL
///
/// Cheap to clone: the underlying connection pool is reference counted.
///
/// # Example
///
/// ```rust,no_run
/// use fusion_connect::ApiClient;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), fusion_connect::ConnectError> {
/// let client = ApiClient::new("http://localhost:8000", Duration::from_secs(10))?;
/// let health: serde_json::Value = client.get_json("api/health", &[]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a client for `base_url`.
    ///
    /// `request_timeout` applies to request/response calls only; the live
    /// stream is long-lived and never times out as a whole.
    pub fn new(base_url: &str, request_timeout: Duration) -> ConnectResult<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(concat!("fusion-connect/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            request_timeout,
        })
    }

    /// Base URL, always ending with `/`
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve an API path (`api/events`) against the base URL
    pub fn endpoint(&self, path: &str) -> ConnectResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// GET `path` with query parameters and decode the JSON body
    pub async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> ConnectResult<T>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await?;

        decode_response(path, response).await
    }

    /// POST a JSON body to `path` and decode the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ConnectResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);

        let response = self
            .http
            .post(url)
            .json(body)
            .timeout(self.request_timeout)
            .send()
            .await?;

        decode_response(path, response).await
    }

    /// Untimed GET request builder for long-lived streams
    pub fn stream_request(&self, path: &str) -> ConnectResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        Ok(self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache"))
    }
}

async fn decode_response<T>(endpoint: &str, response: Response) -> ConnectResult<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let mut body = body;
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(ConnectError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|source| ConnectError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_resolution_keeps_base_prefix() {
        let client = ApiClient::new("http://localhost:8000/dash", Duration::from_secs(1)).unwrap();

        assert_eq!(client.base_url().as_str(), "http://localhost:8000/dash/");
        assert_eq!(
            client.endpoint("/api/events").unwrap().as_str(),
            "http://localhost:8000/dash/api/events"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ApiClient::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(ConnectError::InvalidUrl(_))));
    }
}
