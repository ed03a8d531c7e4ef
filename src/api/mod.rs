//! The HTTP seam between the session and the site.
//!
//! The session only ever talks to the site through the `Transport` trait. `HttpTransport` is the
//! real implementation. `TestTransport` serves an in-memory copy of the site so that the whole
//! program can run, top-to-bottom, without network access.

mod http;
mod test_transport;

pub use http::HttpTransport;
pub use test_transport::{Recorded, Reply, TestTransport};

#[cfg(test)]
pub(crate) use test_transport::ledger_script;

use crate::error::{Error, Result, TransportError};
use crate::Config;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// The production application host.
pub const APP_URL: &str = "https://moneyforward.com/";

/// The production identity (login) host.
pub const ID_URL: &str = "https://id.moneyforward.com/";

/// When this environment variable is set and non-empty, `Mode::Test` is used.
const TEST_MODE_ENV: &str = "MF_SYNC_IN_TEST_MODE";

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// An ordered list of `(name, value)` pairs used for request headers, form bodies and query
/// strings. Order is kept and repeated names are allowed.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.push((name.into(), value.to_string()));
    }

    /// Replaces every pair named `name` with a single pair, or appends it if there was none.
    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        self.0.retain(|(n, _)| *n != name);
        self.0.push((name, value.to_string()));
    }

    /// The value of the first pair named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A response body together with the URL it was finally served from, after redirects.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

/// Performs HTTP requests against the site. Implementations keep cookies between calls and fail
/// with a `TransportError` on timeouts and non-2xx responses.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, headers: &Params) -> TransportResult<Page>;

    /// Posts `form` as `application/x-www-form-urlencoded`.
    async fn post(&self, url: &Url, headers: &Params, form: &Params) -> TransportResult<Page>;

    /// Sends a PUT with `params` in the query string.
    async fn put(&self, url: &Url, headers: &Params, params: &Params) -> TransportResult<()>;

    async fn delete(&self, url: &Url, headers: &Params) -> TransportResult<()>;
}

/// The two hosts the client talks to.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Endpoints {
    app: Url,
    id: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            app: Url::parse(APP_URL).expect("hardcoded url should be valid"),
            id: Url::parse(ID_URL).expect("hardcoded url should be valid"),
        }
    }
}

impl Endpoints {
    pub fn new(app: Url, id: Url) -> Self {
        Self { app, id }
    }

    /// Resolves `path` against the application host. `path` may also be a link taken from a page.
    pub fn app(&self, path: &str) -> Result<Url> {
        join(&self.app, path)
    }

    /// Resolves `path` against the identity host.
    pub fn id(&self, path: &str) -> Result<Url> {
        join(&self.id, path)
    }

    /// True if `url` is the application root, which is where a successful login lands.
    pub fn is_app_root(&self, url: &Url) -> bool {
        url.as_str().trim_end_matches('/') == self.app.as_str().trim_end_matches('/')
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::scrape(format!("Unable to resolve link '{path}': {e}")))
}

/// Chooses between the real site and the in-memory one.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Live,
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

/// Creates the transport for `mode`.
pub fn transport(config: &Config, mode: Mode) -> Result<Box<dyn Transport>> {
    match mode {
        Mode::Live => {
            let timeout = Duration::from_secs(config.timeout_secs());
            Ok(Box::new(HttpTransport::new(timeout)?))
        }
        Mode::Test => {
            debug!("Using the in-memory test site");
            Ok(Box::new(TestTransport::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_set_replaces_all() {
        let mut p = Params::new().with("a", 1).with("b", 2).with("a", 3);
        p.set("a", "x");
        assert_eq!(p.get("a"), Some("x"));
        assert_eq!(p.pairs().len(), 2);
        assert_eq!(p.pairs()[1], ("a".to_string(), "x".to_string()));
    }

    #[test]
    fn test_endpoints_app_root() {
        let e = Endpoints::default();
        assert!(e.is_app_root(&Url::parse("https://moneyforward.com/").unwrap()));
        assert!(e.is_app_root(&Url::parse("https://moneyforward.com").unwrap()));
        assert!(!e.is_app_root(&Url::parse("https://moneyforward.com/cf").unwrap()));
        assert!(!e.is_app_root(
            &Url::parse("https://id.moneyforward.com/email_otp").unwrap()
        ));
    }

    #[test]
    fn test_endpoints_join_page_link() {
        let e = Endpoints::default();
        let url = e.app("/groups/edit/abc").unwrap();
        assert_eq!(url.as_str(), "https://moneyforward.com/groups/edit/abc");
        let url = e.id("email_otp").unwrap();
        assert_eq!(url.as_str(), "https://id.moneyforward.com/email_otp");
    }
}
