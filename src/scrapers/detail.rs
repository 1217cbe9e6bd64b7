use crate::config::ClientConfig;
use crate::models::{DetailEnvelope, ListingDetail};
use crate::scrapers::error::{RentError, Result};
use crate::scrapers::session::SessionProvider;
use crate::scrapers::traits::HttpTransport;
use crate::scrapers::types::QueryParams;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Device class the detail API expects
const DEVICE_CLASS: &str = "pc";

/// Single-listing lookups
pub struct DetailClient {
    transport: Arc<dyn HttpTransport>,
    sessions: SessionProvider,
    config: ClientConfig,
}

impl DetailClient {
    pub fn new(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self {
            sessions: SessionProvider::new(transport.clone(), &config),
            transport,
            config,
        }
    }

    /// Full record for `house_id`, or `None` if the detail API answered non-2xx.
    ///
    /// Session setup, transport and decode failures are still errors. Each
    /// call builds its own session from the listing's page.
    pub async fn get_detail(&self, house_id: &str) -> Result<Option<ListingDetail>> {
        match self.fetch_detail(house_id).await {
            Ok(detail) => Ok(Some(detail)),
            Err(RentError::HttpStatus { status, url }) => {
                warn!("Detail lookup for {} failed with HTTP {} ({})", house_id, status, url);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Like [`get_detail`](Self::get_detail) but a non-2xx answer is
    /// returned as [`RentError::HttpStatus`]
    pub async fn fetch_detail(&self, house_id: &str) -> Result<ListingDetail> {
        let page_url = self.config.detail_page_url(house_id)?;
        let mut ctx = self.sessions.establish_with_device_id(&page_url).await?;
        let device_id = ctx
            .device_id()
            .map(str::to_string)
            .ok_or_else(|| RentError::Protocol("session has no device id".to_string()))?;
        let url = QueryParams::new()
            .with("id", house_id)
            .to_url(&self.config.detail_api_url);

        debug!("Fetching detail for {}", house_id);

        let response = ctx
            .get(
                self.transport.as_ref(),
                url,
                &[("deviceid", device_id.as_str()), ("device", DEVICE_CLASS)],
            )
            .await?;
        let envelope: DetailEnvelope = response.error_for_status()?.json()?;

        Ok(ListingDetail {
            house_id: house_id.to_string(),
            data: envelope.data,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::{html_with_token, FakeTransport};
    use serde_json::json;

    const API: &str = "https://bff.591.com.tw/v1/house/rent/detail";

    fn detail_body() -> String {
        json!({
            "status": 1,
            "data": {
                "title": "Sunny studio near MRT",
                "price": "12,000",
                "favData": { "id": 15012345 },
            }
        })
        .to_string()
    }

    fn listing_page(transport: FakeTransport, id: &str, cookies: &[&str]) -> FakeTransport {
        transport.route(
            &format!("https://rent.591.com.tw/home/{id}"),
            200,
            &html_with_token(&format!("tok-{id}")),
            cookies,
        )
    }

    fn client(transport: Arc<FakeTransport>) -> DetailClient {
        DetailClient::new(transport, ClientConfig::default().without_pacing())
    }

    #[tokio::test]
    async fn returns_data_object() {
        let transport = listing_page(
            FakeTransport::new(),
            "15012345",
            &["T591_TOKEN=dev-1; domain=.591.com.tw; path=/"],
        )
        .route(API, 200, &detail_body(), &[])
        .shared();

        let detail = client(transport.clone())
            .get_detail("15012345")
            .await
            .unwrap()
            .expect("detail should be present");

        assert_eq!(detail.house_id, "15012345");
        assert_eq!(detail.get("title"), Some(&json!("Sunny studio near MRT")));

        let calls = transport.requests_to("/v1/house/rent/detail");
        assert_eq!(calls.len(), 1);
        let req = &calls[0];
        assert_eq!(req.url.query(), Some("id=15012345"));
        assert_eq!(req.header_value("x-csrf-token"), Some("tok-15012345"));
        assert_eq!(req.header_value("deviceid"), Some("dev-1"));
        assert_eq!(req.header_value("device"), Some("pc"));
        assert_eq!(req.header_value("cookie"), Some("T591_TOKEN=dev-1"));
    }

    #[tokio::test]
    async fn session_is_scoped_to_the_listing_page() {
        let transport = listing_page(FakeTransport::new(), "7", &["T591_TOKEN=d; domain=.591.com.tw"])
            .route(API, 200, &detail_body(), &[])
            .shared();

        client(transport.clone()).get_detail("7").await.unwrap();

        let first = &transport.requests()[0];
        assert_eq!(first.url.as_str(), "https://rent.591.com.tw/home/7");
    }

    #[tokio::test]
    async fn non_success_status_is_absence() {
        let transport = listing_page(FakeTransport::new(), "9", &["T591_TOKEN=d; domain=.591.com.tw"])
            .route(API, 404, r#"{"status":0,"msg":"not found"}"#, &[])
            .shared();
        let client = client(transport);

        assert!(client.get_detail("9").await.unwrap().is_none());
        assert!(matches!(
            client.fetch_detail("9").await,
            Err(RentError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn missing_device_cookie_aborts_before_api_call() {
        let transport = listing_page(FakeTransport::new(), "9", &["PHPSESSID=s"])
            .route(API, 200, &detail_body(), &[])
            .shared();

        let err = client(transport.clone()).get_detail("9").await.unwrap_err();

        assert!(matches!(err, RentError::Protocol(_)));
        assert!(transport.requests_to("/v1/house/rent/detail").is_empty());
    }

    #[tokio::test]
    async fn body_without_data_is_decode_error() {
        let transport = listing_page(FakeTransport::new(), "9", &["T591_TOKEN=d; domain=.591.com.tw"])
            .route(API, 200, r#"{"status":1}"#, &[])
            .shared();

        let err = client(transport).get_detail("9").await.unwrap_err();
        assert!(matches!(err, RentError::Decode(_)));
    }

    #[tokio::test]
    async fn bulk_loop_skips_failed_lookups() {
        let transport = listing_page(FakeTransport::new(), "1", &["T591_TOKEN=d; domain=.591.com.tw"])
            .route("https://rent.591.com.tw/home/2", 200, &html_with_token("t2"), &["T591_TOKEN=d; domain=.591.com.tw"])
            .route(API, 500, "", &[])
            .route(API, 200, &detail_body(), &[])
            .shared();
        let client = client(transport);

        let mut found = Vec::new();
        for id in ["1", "2"] {
            if let Some(detail) = client.get_detail(id).await.unwrap() {
                found.push(detail.house_id);
            }
        }
        assert_eq!(found, vec!["2".to_string()]);
    }
}
