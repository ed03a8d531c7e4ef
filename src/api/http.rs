//! Implements the `Transport` trait with a cookie-keeping `reqwest::Client`.

use crate::api::{Page, Params, Transport, TransportResult};
use crate::error::TransportError;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Talks to the real site. Cookies set by the site, including the login session, are kept for as
/// long as this value lives; dropping it ends the connection pool and the session with it.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose requests each fail with `TransportError::Timeout` after
    /// `timeout`.
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                source: Box::new(e),
            })?;
        Ok(Self { client })
    }

    /// Sends the request and returns the final URL and body, failing on non-2xx statuses.
    async fn send(&self, url: &Url, request: RequestBuilder) -> TransportResult<Page> {
        let response = request.send().await.map_err(|e| map_error(url, e))?;
        let response = response.error_for_status().map_err(|e| map_error(url, e))?;
        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| map_error(url, e))?;
        trace!("{} bytes from {final_url}", body.len());
        Ok(Page {
            url: final_url,
            body,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, headers: &Params) -> TransportResult<Page> {
        trace!("GET {url}");
        let request = with_headers(self.client.get(url.clone()), headers);
        self.send(url, request).await
    }

    async fn post(&self, url: &Url, headers: &Params, form: &Params) -> TransportResult<Page> {
        trace!("POST {url}");
        let request = with_headers(self.client.post(url.clone()), headers).form(form.pairs());
        self.send(url, request).await
    }

    async fn put(&self, url: &Url, headers: &Params, params: &Params) -> TransportResult<()> {
        trace!("PUT {url}");
        let request = with_headers(self.client.put(url.clone()), headers).query(params.pairs());
        self.send(url, request).await.map(|_| ())
    }

    async fn delete(&self, url: &Url, headers: &Params) -> TransportResult<()> {
        trace!("DELETE {url}");
        let request = with_headers(self.client.delete(url.clone()), headers);
        self.send(url, request).await.map(|_| ())
    }
}

fn with_headers(mut request: RequestBuilder, headers: &Params) -> RequestBuilder {
    for (name, value) in headers.pairs() {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn map_error(url: &Url, e: reqwest::Error) -> TransportError {
    let url = url.to_string();
    if e.is_timeout() {
        TransportError::Timeout { url }
    } else if let Some(status) = e.status() {
        TransportError::Status {
            url,
            status: status.as_u16(),
        }
    } else {
        TransportError::Request {
            url,
            source: Box::new(e),
        }
    }
}
