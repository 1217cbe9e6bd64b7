// In-memory transport for tests
//
// Responses are keyed by URL without its query string. Each route holds a
// queue; the last queued response is repeated once the others are used up.

use crate::scrapers::error::{RentError, Result};
use crate::scrapers::traits::HttpTransport;
use crate::scrapers::transport::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct CannedResponse {
    status: u16,
    body: String,
    set_cookies: Vec<String>,
    location: Option<String>,
}

#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Vec<CannedResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`
    pub fn route(self, url: &str, status: u16, body: &str, set_cookies: &[&str]) -> Self {
        self.push(url, status, body, set_cookies, None)
    }

    /// Queue a redirect to `location` for `url`
    pub fn redirect(self, url: &str, status: u16, location: &str, set_cookies: &[&str]) -> Self {
        self.push(url, status, "", set_cookies, Some(location.to_string()))
    }

    fn push(
        self,
        url: &str,
        status: u16,
        body: &str,
        set_cookies: &[&str],
        location: Option<String>,
    ) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(route_key_str(url))
            .or_default()
            .push(CannedResponse {
                status,
                body: body.to_string(),
                set_cookies: set_cookies.iter().map(|s| s.to_string()).collect(),
                location,
            });
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose path equals `path`
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.path() == path)
            .collect()
    }
}

fn route_key(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    )
}

fn route_key_str(url: &str) -> String {
    route_key(&Url::parse(url).unwrap())
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&route_key(&request.url))
            .filter(|q| !q.is_empty())
            .ok_or_else(|| RentError::transport(request.url.as_str(), "connection refused"))?;

        let canned = if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        };

        Ok(HttpResponse {
            status: canned.status,
            url: request.url.clone(),
            set_cookies: canned.set_cookies,
            location: canned.location,
            body: canned.body,
        })
    }
}

pub fn html_with_token(token: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><meta name="csrf-token" content="{token}"><title>591</title></head><body></body></html>"#
    )
}

/// Search page body with `count` listings whose ids start at `first_id`
pub fn search_page(records: u64, first_id: u64, count: usize) -> String {
    let listings: Vec<serde_json::Value> = (0..count as u64)
        .map(|i| {
            let id = first_id + i;
            serde_json::json!({
                "post_id": id,
                "title": format!("Listing {id}"),
                "price": "12,000",
                "location": "Daan District",
                "photo_list": [format!("https://img.591.com.tw/{id}.jpg")],
                "refresh_time": "3小時內更新",
                "kind_name": "整層住家",
            })
        })
        .collect();

    serde_json::json!({
        "status": 1,
        "records": records,
        "data": { "data": listings },
    })
    .to_string()
}
