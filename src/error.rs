//! Errors returned by the session and its operations.
//!
//! `NeedOtp` and `DataDoesNotExist` are expected outcomes that callers are meant to branch on.
//! Everything else ends the operation in progress but leaves the session usable.

use crate::model::{Account, CategoryKey};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An authenticated operation was attempted before the login completed.
    #[error("The session is not logged in")]
    NotInitialized,

    #[error("Unable to reach the site: {0}")]
    Connection(#[from] TransportError),

    /// The credentials or the one-time passcode were rejected.
    #[error("Login failed")]
    LoginFailed,

    /// The site asked for a one-time passcode. Call `Session::submit_otp` to continue.
    #[error("A one-time passcode is required to finish logging in")]
    NeedOtp,

    /// A page did not have the structure this client expects, which usually means the site
    /// changed.
    #[error("Unexpected page structure: {0}")]
    Scrape(String),

    /// The requested month has no ledger data.
    #[error("No data exists for the requested month")]
    DataDoesNotExist,

    /// The site was still refreshing its data when the maximum wait elapsed.
    #[error("Timed out waiting for the site to finish refreshing")]
    FetchTimeout,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Account '{0}' was not found among the enabled accounts")]
    UnknownAccount(Account),

    #[error("Category '{0}' was not found")]
    UnknownCategory(CategoryKey),
}

impl Error {
    /// True for the outcomes that are signals rather than failures.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NeedOtp | Error::DataDoesNotExist)
    }

    pub(crate) fn scrape(what: impl Into<String>) -> Self {
        Error::Scrape(what.into())
    }
}

/// A failure in the HTTP layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed with HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(Error::NeedOtp.is_recoverable());
        assert!(Error::DataDoesNotExist.is_recoverable());
        assert!(!Error::FetchTimeout.is_recoverable());
        assert!(!Error::LoginFailed.is_recoverable());
    }

    #[test]
    fn test_connection_wraps_cause() {
        let e = Error::from(TransportError::Status {
            url: "https://example.com/cf".to_string(),
            status: 503,
        });
        assert!(matches!(e, Error::Connection(_)));
        assert!(e.to_string().contains("503"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
