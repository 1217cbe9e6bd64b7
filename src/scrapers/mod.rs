pub mod detail;
pub mod error;
pub mod pacing;
pub mod search;
pub mod session;
pub mod traits;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use detail::DetailClient;
pub use error::{RentError, Result};
pub use search::SearchClient;
pub use session::{CookieJar, SessionContext, SessionProvider};
pub use traits::HttpTransport;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport};
pub use types::{FilterParams, QueryParams, SortParams};
