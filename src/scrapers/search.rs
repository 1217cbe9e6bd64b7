use crate::config::ClientConfig;
use crate::models::{SearchPage, SearchResult, SearchStatus};
use crate::scrapers::error::{RentError, Result};
use crate::scrapers::pacing::Pacer;
use crate::scrapers::session::{SessionContext, SessionProvider};
use crate::scrapers::traits::HttpTransport;
use crate::scrapers::types::{FilterParams, QueryParams, SortParams};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Listings per result page, fixed by the server
pub const PAGE_SIZE: u32 = 30;

/// Region used when the caller gives no filters (Taipei)
pub const DEFAULT_REGION: &str = "1";
/// Kind used when the caller gives no filters (any)
pub const DEFAULT_KIND: &str = "0";

/// Cookie some server-side filters read the selected region from
pub const REGION_COOKIE: &str = "urlJumpIp";

/// Paginated listing search
pub struct SearchClient {
    transport: Arc<dyn HttpTransport>,
    sessions: SessionProvider,
    pacer: Pacer,
    config: ClientConfig,
}

impl SearchClient {
    pub fn new(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self {
            sessions: SessionProvider::new(transport.clone(), &config),
            pacer: Pacer::new(config.pacing),
            transport,
            config,
        }
    }

    /// Fetch up to `want_pages` pages of listings matching `filter`, ordered by `sort`
    pub async fn search(
        &self,
        filter: &FilterParams,
        sort: &SortParams,
        want_pages: u32,
    ) -> Result<SearchResult> {
        self.search_with_cancel(filter, sort, want_pages, &CancellationToken::new())
            .await
    }

    /// [`search`](Self::search) that stops early once `cancel` fires.
    ///
    /// A non-2xx page or a cancellation ends the run with what was collected
    /// so far; see [`SearchResult::status`]. Session, transport and decode
    /// failures are returned as errors.
    pub async fn search_with_cancel(
        &self,
        filter: &FilterParams,
        sort: &SortParams,
        want_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchResult> {
        let mut result = SearchResult::empty(want_pages);
        if want_pages == 0 {
            return Ok(result);
        }
        if cancel.is_cancelled() {
            result.status = SearchStatus::Cancelled;
            return Ok(result);
        }

        let mut ctx = self.sessions.establish(&self.config.search_root_url).await?;
        let region = region_for(filter);
        ctx.cookies_mut()
            .set(REGION_COOKIE, region, &self.config.cookie_domain);

        let base = base_query(filter, sort);
        info!(
            "Searching {} page(s), region {}, {} filter(s), {} sort key(s)",
            want_pages,
            region,
            filter.len(),
            sort.len()
        );

        for page in 0..want_pages {
            if page > 0 && (cancel.is_cancelled() || !self.pacer.pause(cancel).await) {
                result.status = SearchStatus::Cancelled;
                break;
            }
            if cancel.is_cancelled() {
                result.status = SearchStatus::Cancelled;
                break;
            }

            match self.fetch_page(&mut ctx, &base, page).await {
                Ok(body) => {
                    debug!(
                        "Page {} returned {} listings (records={})",
                        page,
                        body.data.data.len(),
                        body.records
                    );
                    result.total_count = body.records;
                    result.listings.extend(body.data.data);
                    result.pages_fetched += 1;
                }
                Err(RentError::HttpStatus { status, url }) => {
                    warn!("Search page {} failed with HTTP {} ({}), stopping", page, status, url);
                    result.status = SearchStatus::Truncated { status };
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        result.fetched_at = Utc::now();
        if result.status == SearchStatus::Cancelled {
            info!(
                "Search cancelled after {}/{} page(s)",
                result.pages_fetched, want_pages
            );
        } else {
            info!(
                "Fetched {} listings over {}/{} page(s), {} total on server",
                result.listings.len(),
                result.pages_fetched,
                want_pages,
                result.total_count
            );
        }

        Ok(result)
    }

    async fn fetch_page(
        &self,
        ctx: &mut SessionContext,
        base: &QueryParams,
        page: u32,
    ) -> Result<SearchPage> {
        let first_row = page * PAGE_SIZE;
        let url = base
            .clone()
            .with("firstRow", first_row.to_string())
            .to_url(&self.config.search_api_url);

        debug!("Requesting page {} (firstRow={})", page, first_row);

        let response = ctx.get(self.transport.as_ref(), url, &[]).await?;
        response.error_for_status()?.json()
    }
}

/// Region for the region cookie: the filter's `region`, else [`DEFAULT_REGION`]
pub fn region_for(filter: &FilterParams) -> &str {
    filter.get("region").unwrap_or(DEFAULT_REGION)
}

/// Query shared by every page of one search, without `firstRow`
pub fn base_query(filter: &FilterParams, sort: &SortParams) -> QueryParams {
    let mut query = QueryParams::new()
        .with("is_format_data", "1")
        .with("is_new_list", "1")
        .with("type", "1");

    if filter.is_empty() {
        query.push("region", DEFAULT_REGION);
        query.push("kind", DEFAULT_KIND);
    } else {
        query.extend_from(filter);
    }
    query.extend_from(sort);
    query
}
