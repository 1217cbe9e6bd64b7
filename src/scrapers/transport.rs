use crate::config::ClientConfig;
use crate::scrapers::error::{RentError, Result};
use crate::scrapers::traits::HttpTransport;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Outgoing GET request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first header named `name` (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response as seen by the clients, body fully read
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// URL that produced this response
    pub url: Url,
    /// Raw `Set-Cookie` header values
    pub set_cookies: Vec<String>,
    /// Raw `Location` header, present on redirects
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Absolute target of a 3xx response, resolved against [`HttpResponse::url`]
    pub fn redirect_target(&self) -> Option<Url> {
        if !matches!(self.status, 301 | 302 | 303 | 307 | 308) {
            return None;
        }
        self.url.join(self.location.as_deref()?.trim()).ok()
    }

    /// Turn a non-2xx response into [`RentError::HttpStatus`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RentError::HttpStatus {
                status: self.status,
                url: self.url.to_string(),
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| RentError::Decode(format!("invalid JSON from {}: {}", self.url, e)))
    }
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
///
/// The client only pools connections: it keeps no cookie store and does not
/// follow redirects, so every hop's `Set-Cookie` reaches the session.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| RentError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RentError::Protocol(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RentError::Protocol(format!("invalid header value for {name}: {e}")))?;
            headers.append(name, value);
        }

        debug!("GET {}", request.url);

        let response = self
            .client
            .get(request.url.clone())
            .headers(headers)
            .send()
            .await?;

        let status = response.status().as_u16();
        let url = response.url().clone();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        debug!("{} -> {} ({} bytes)", url, status, body.len());

        Ok(HttpResponse {
            status,
            url,
            set_cookies,
            location,
            body,
        })
    }
}
