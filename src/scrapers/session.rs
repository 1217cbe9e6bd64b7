use crate::config::ClientConfig;
use crate::scrapers::error::{RentError, Result};
use crate::scrapers::traits::HttpTransport;
use crate::scrapers::transport::{HttpRequest, HttpResponse};
use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use cookie::Cookie;
use reqwest::Url;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cookie the site uses to identify the browsing device
pub const DEVICE_ID_COOKIE: &str = "T591_TOKEN";

const CSRF_META_SELECTOR: &str = r#"meta[name="csrf-token"]"#;

/// Hops followed before giving up on a redirect chain
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCookie {
    name: String,
    value: String,
    /// Lowercase, without a leading dot
    domain: String,
    /// Set without a Domain attribute: only sent back to the exact host
    host_only: bool,
}

impl StoredCookie {
    fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if self.host_only {
            return host == self.domain;
        }
        host == self.domain || host.ends_with(&format!(".{}", self.domain))
    }
}

/// Host-scoped cookie store belonging to a single session
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cookie valid for `domain` and all its subdomains
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>, domain: &str) {
        self.insert(StoredCookie {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(domain),
            host_only: false,
        });
    }

    /// Record a raw `Set-Cookie` header received from `origin`.
    ///
    /// An already expired cookie (`Max-Age<=0` or `Expires` in the past)
    /// removes the stored one.
    pub fn ingest_set_cookie(&mut self, origin: &Url, header: &str) {
        let parsed = match Cookie::parse(header) {
            Ok(c) if !c.name().is_empty() => c,
            Ok(_) => {
                debug!("Ignoring nameless Set-Cookie {:?}", header);
                return;
            }
            Err(e) => {
                debug!("Ignoring malformed Set-Cookie {:?}: {}", header, e);
                return;
            }
        };

        let (domain, host_only) = match parsed.domain().map(normalize_domain) {
            Some(domain) if !domain.is_empty() => (domain, false),
            _ => (
                origin.host_str().unwrap_or_default().to_ascii_lowercase(),
                true,
            ),
        };

        if is_expired(&parsed) {
            self.remove(parsed.name(), &domain);
            return;
        }

        self.insert(StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().trim_matches('"').to_string(),
            domain,
            host_only,
        });
    }

    /// Value of the cookie `name`, from any domain
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        let header = self
            .cookies
            .iter()
            .filter(|c| c.matches_host(host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        (!header.is_empty()).then_some(header)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    fn insert(&mut self, cookie: StoredCookie) {
        self.remove(&cookie.name, &cookie.domain);
        self.cookies.push(cookie);
    }

    fn remove(&mut self, name: &str, domain: &str) {
        self.cookies
            .retain(|c| !(c.name == name && c.domain == domain));
    }

    /// GET `url`, following redirects and storing every `Set-Cookie` seen
    /// along the way. `headers` are sent on every hop.
    async fn get_following_redirects(
        &mut self,
        transport: &dyn HttpTransport,
        url: Url,
        headers: &[(String, String)],
    ) -> Result<HttpResponse> {
        let start = url.clone();
        let mut url = url;

        for _ in 0..=MAX_REDIRECTS {
            let mut request = HttpRequest::new(url.clone());
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(cookies) = self.header_for(&url) {
                request = request.header("Cookie", cookies);
            }

            let response = transport.get(&request).await?;
            for header in &response.set_cookies {
                self.ingest_set_cookie(&response.url, header);
            }

            match response.redirect_target() {
                Some(next) => {
                    debug!("{} redirected ({}) to {}", url, response.status, next);
                    url = next;
                }
                None => return Ok(response),
            }
        }

        Err(RentError::Protocol(format!(
            "more than {MAX_REDIRECTS} redirects starting at {start}"
        )))
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn is_expired(cookie: &Cookie<'_>) -> bool {
    if let Some(max_age) = cookie.max_age() {
        return max_age <= CookieDuration::ZERO;
    }
    cookie
        .expires_datetime()
        .map_or(false, |expires| expires <= OffsetDateTime::now_utc())
}

/// Cookies, anti-forgery token and optional device id for one operation.
///
/// Built by [`SessionProvider`] and dropped when the operation ends. The
/// cookie jar keeps absorbing cookies from every response fetched through
/// [`SessionContext::get`].
#[derive(Debug, Clone)]
pub struct SessionContext {
    cookies: CookieJar,
    csrf_token: String,
    device_id: Option<String>,
    user_agent: String,
}

impl SessionContext {
    pub fn new(cookies: CookieJar, csrf_token: String, user_agent: String) -> Self {
        Self {
            cookies,
            csrf_token,
            device_id: None,
            user_agent,
        }
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// GET `url` with the user agent, csrf token, matching cookies and
    /// `extra_headers`. Cookies set by the response are kept for later calls.
    pub async fn get(
        &mut self,
        transport: &dyn HttpTransport,
        url: Url,
        extra_headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let mut headers = vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("X-CSRF-TOKEN".to_string(), self.csrf_token.clone()),
        ];
        headers.extend(
            extra_headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );

        self.cookies
            .get_following_redirects(transport, url, &headers)
            .await
    }

    fn with_device_id_from_cookie(mut self) -> Result<Self> {
        let device_id = self
            .cookies
            .get(DEVICE_ID_COOKIE)
            .map(str::to_string)
            .ok_or_else(|| {
                RentError::Protocol(format!("cookie {DEVICE_ID_COOKIE} was not set by the server"))
            })?;
        self.device_id = Some(device_id);
        Ok(self)
    }
}

/// Builds [`SessionContext`]s by loading a page of the site
pub struct SessionProvider {
    transport: Arc<dyn HttpTransport>,
    user_agent: String,
}

impl SessionProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            user_agent: config.user_agent.clone(),
        }
    }

    /// Fetch `target_url` and capture its cookies and csrf token
    pub async fn establish(&self, target_url: &Url) -> Result<SessionContext> {
        debug!("Establishing session against {}", target_url);

        let mut cookies = CookieJar::new();
        let headers = [("User-Agent".to_string(), self.user_agent.clone())];
        let response = cookies
            .get_following_redirects(self.transport.as_ref(), target_url.clone(), &headers)
            .await?;

        let token = match extract_csrf_token(&response.body) {
            Ok(token) => token,
            Err(err) => {
                warn!(
                    "No csrf token in {} (HTTP {}), site markup changed or request was blocked",
                    response.url, response.status
                );
                return Err(err);
            }
        };

        info!(
            "Session established for {} ({} cookies)",
            target_url,
            cookies.len()
        );

        Ok(SessionContext::new(cookies, token, self.user_agent.clone()))
    }

    /// Like [`establish`](Self::establish), additionally requiring the device id cookie
    pub async fn establish_with_device_id(&self, target_url: &Url) -> Result<SessionContext> {
        self.establish(target_url)
            .await?
            .with_device_id_from_cookie()
    }
}

/// Read the `content` of `<meta name="csrf-token">`
pub fn extract_csrf_token(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(CSRF_META_SELECTOR)
        .map_err(|e| RentError::Protocol(format!("invalid selector: {e}")))?;

    document
        .select(&selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RentError::Protocol("csrf-token meta tag not found".to_string()))
}
