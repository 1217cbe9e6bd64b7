//! Client for the 591 rental site's search and detail endpoints.
//!
//! [`SearchClient`] pages through search results behind a csrf-protected
//! session, [`DetailClient`] fetches one listing, and [`notify`] forwards
//! recently updated listings to a [`notify::NotificationSink`].

pub mod config;
pub mod models;
pub mod notify;
pub mod scrapers;

pub use config::{ClientConfig, PacingConfig};
pub use models::{ListingDetail, ListingSummary, SearchResult, SearchStatus};
pub use scrapers::{
    DetailClient, FilterParams, HttpTransport, QueryParams, RentError, ReqwestTransport, Result,
    SearchClient, SortParams,
};
