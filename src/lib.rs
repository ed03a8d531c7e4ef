//! A client for the Money Forward ME household ledger, which offers no public API. Everything is
//! done by driving the website the way a browser would: logging in, reading pages and posting the
//! same forms the site's own scripts post.
//!
//! Start with `Session`, log in, then list, change or inspect the ledger.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
mod html;
pub mod model;
mod session;
mod utils;

#[cfg(test)]
mod test;

pub use api::{
    Endpoints, HttpTransport, Mode, Page, Params, Recorded, Reply, TestTransport, Transport,
    TransportResult, APP_URL, ID_URL,
};
pub use config::Config;
pub use error::{Error, Result, TransportError};
pub use session::{AuthState, Credentials, RefreshOptions, Session, TransferPartner};
