//! A logged-in conversation with the site.
//!
//! `Session` owns the transport (and with it the cookie jar), the login state and the reference
//! caches. Operations are spread over the submodules by concern:
//!
//! - `auth`: logging in, including the one-time passcode step
//! - `cache`: the account and category lists, fetched once per session
//! - `refresh`: asking linked institutions to re-sync and waiting for it to finish
//! - `ledger`: listing a month of transactions
//! - `mutate`: creating, editing and deleting transactions
//! - `holdings`: scheduled withdrawals and balances
//!
//! Login takes `&mut self` and everything else takes `&self`, so a login can never overlap with
//! another operation on the same session.

mod auth;
mod cache;
mod holdings;
mod ledger;
mod mutate;
mod refresh;

pub use auth::AuthState;
pub use mutate::TransferPartner;
pub use refresh::RefreshOptions;

use crate::api::{self, Endpoints, Mode, Params, Transport};
use crate::error::{Error, Result};
use crate::model::{AccountMap, CategoryMap};
use crate::Config;
use std::fmt::{Debug, Formatter};
use tokio::sync::OnceCell;
use tracing::trace;

const ROOT: &str = "/";
const SIGN_IN_PAGE: &str = "/sign_in/";
const SIGN_IN: &str = "/sign_in";
const EMAIL_OTP: &str = "/email_otp";
const POLLING: &str = "/accounts/polling";
const GROUPS: &str = "/groups";
const CF: &str = "/cf";
const CF_FETCH: &str = "/cf/fetch";
const CF_CREATE: &str = "/cf/create";
const CF_UPDATE: &str = "/cf/update";
const CF_UPDATE_JS: &str = "/cf/update.js";
const CF_ITEM: &str = "/cf/";
const ACCOUNT_DETAIL: &str = "/accounts/show/";

/// The login email and password.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

pub struct Session {
    transport: Box<dyn Transport>,
    endpoints: Endpoints,
    credentials: Credentials,
    auth: auth::Auth,
    accounts: OnceCell<AccountMap>,
    categories: OnceCell<CategoryMap>,
}

impl Session {
    /// Creates a session that has not logged in yet.
    pub fn new(
        transport: Box<dyn Transport>,
        endpoints: Endpoints,
        credentials: Credentials,
    ) -> Self {
        Self {
            transport,
            endpoints,
            credentials,
            auth: auth::Auth::default(),
            accounts: OnceCell::new(),
            categories: OnceCell::new(),
        }
    }

    /// Creates a session for the site described by `config`, using the transport for `mode`.
    pub fn open(config: &Config, mode: Mode, password: impl Into<String>) -> Result<Self> {
        let transport = api::transport(config, mode)?;
        let credentials = Credentials::new(config.email(), password);
        Ok(Self::new(transport, config.endpoints().clone(), credentials))
    }

    /// The headers every authenticated request carries, or `NotInitialized` before login.
    fn headers(&self) -> Result<&Params> {
        self.auth.headers().ok_or(Error::NotInitialized)
    }

    async fn http_get(&self, path: &str) -> Result<String> {
        let headers = self.headers()?;
        let url = self.endpoints.app(path)?;
        trace!("GET {path}");
        Ok(self.transport.get(&url, headers).await?.body)
    }

    async fn http_post(&self, path: &str, form: &Params) -> Result<String> {
        let headers = self.headers()?;
        let url = self.endpoints.app(path)?;
        trace!("POST {path}");
        Ok(self.transport.post(&url, headers, form).await?.body)
    }

    async fn http_put(&self, path: &str, params: &Params) -> Result<()> {
        let headers = self.headers()?;
        let url = self.endpoints.app(path)?;
        trace!("PUT {path}");
        Ok(self.transport.put(&url, headers, params).await?)
    }

    async fn http_delete(&self, path: &str) -> Result<()> {
        let headers = self.headers()?;
        let url = self.endpoints.app(path)?;
        trace!("DELETE {path}");
        Ok(self.transport.delete(&url, headers).await?)
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoints", &self.endpoints)
            .field("credentials", &self.credentials)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
