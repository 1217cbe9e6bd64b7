use thiserror::Error;

/// Errors raised while talking to the rental site
#[derive(Debug, Error)]
pub enum RentError {
    /// Network failure or timeout before a response was received
    #[error("transport error for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        timed_out: bool,
    },

    /// Expected markup, cookie or field was not present
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Response body was not the JSON shape we expect
    #[error("decode error: {0}")]
    Decode(String),

    #[error("config error: {0}")]
    Config(String),
}

impl RentError {
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: "request timed out".to_string(),
            timed_out: true,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { timed_out: true, .. })
    }
}

impl From<reqwest::Error> for RentError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_timeout() {
            Self::timeout(url)
        } else {
            Self::transport(url, err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RentError>;
