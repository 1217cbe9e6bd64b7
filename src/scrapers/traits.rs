use crate::scrapers::error::Result;
use crate::scrapers::transport::{HttpRequest, HttpResponse};
use async_trait::async_trait;

/// Minimal HTTP surface the clients need.
///
/// Implementations must not follow any session state of their own: cookies
/// and tokens travel in the request headers built by a `SessionContext`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET and return the response regardless of its status code
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse>;
}
