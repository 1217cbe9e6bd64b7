use anyhow::{Context, Result};
use clap::Parser;
use rent_scout::notify::{notify_recent, LogSink};
use rent_scout::{
    ClientConfig, DetailClient, FilterParams, ReqwestTransport, SearchClient, SortParams,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Search 591 rental listings")]
struct Args {
    /// Number of result pages to fetch (30 listings each)
    #[arg(short, long, default_value_t = 1)]
    pages: u32,

    /// Filter as key=value, repeatable (e.g. --filter region=15)
    #[arg(short, long = "filter", value_parser = parse_pair)]
    filters: Vec<(String, String)>,

    /// Sort as key=value, repeatable, applied in order
    #[arg(short, long = "sort", value_parser = parse_pair)]
    sorts: Vec<(String, String)>,

    /// Also fetch the full record of every listing found
    #[arg(long)]
    details: bool,

    /// Forward recently updated listings to the log sink
    #[arg(long)]
    notify: bool,

    /// Print the search result as JSON
    #[arg(long)]
    json: bool,
}

fn parse_pair(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    let transport = Arc::new(ReqwestTransport::new(&config).context("Failed to create HTTP client")?);

    let filter = if args.filters.is_empty() {
        default_filter()
    } else {
        args.filters.into_iter().collect()
    };
    let sort = if args.sorts.is_empty() {
        default_sort()
    } else {
        args.sorts.into_iter().collect()
    };

    info!("🏠 Rent Scout - 591 search");

    let search = SearchClient::new(transport.clone(), config.clone());
    let result = search
        .search(&filter, &sort, args.pages)
        .await
        .context("Search failed")?;

    if !result.is_complete() {
        warn!(
            "Search incomplete: {}/{} page(s) fetched ({:?})",
            result.pages_fetched, result.pages_requested, result.status
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Total matching listings: {}", result.total_count);
        for (i, listing) in result.listings.iter().enumerate() {
            println!("{}. {} ({})", i + 1, listing.title, listing.price);
            println!("   {}", listing.location);
            println!("   Updated: {}", listing.freshness);
            println!("   URL: {}", listing.detail_url(&config.detail_page_base_url));
            println!();
        }
    }

    if args.details {
        let details = DetailClient::new(transport.clone(), config.clone());
        let mut fetched = 0;
        for listing in &result.listings {
            match details.get_detail(&listing.id).await {
                Ok(Some(detail)) => {
                    fetched += 1;
                    if args.json {
                        println!("{}", serde_json::to_string_pretty(&detail)?);
                    }
                }
                Ok(None) => warn!("No detail for {}, skipping", listing.id),
                Err(e) => warn!("Detail lookup for {} failed: {}", listing.id, e),
            }
        }
        info!("Fetched {}/{} listing details", fetched, result.listings.len());
    }

    if args.notify {
        notify_recent(&result.listings, &LogSink, &config.detail_page_base_url).await;
    }

    Ok(())
}

/// New Taipei query: 8000-20000 NTD, 2-3 rooms, cooking allowed
fn default_filter() -> FilterParams {
    FilterParams::new()
        .with("region", "15")
        .with("searchtype", "1")
        .with("section", "238")
        .with("rentprice", "8000,20000")
        .with("multiRoom", "1,2,3")
        .with("other", "cook")
        .with("showMore", "1")
        .with("option", "bed")
        .with("area", "7,25")
}

/// Highest rent first
fn default_sort() -> SortParams {
    SortParams::new().with("order", "money").with("orderType", "desc")
}
