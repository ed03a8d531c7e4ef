//! Asks linked institutions to re-sync and waits for the site to finish.

use super::{Session, POLLING, ROOT};
use crate::api::Params;
use crate::error::{Error, Result};
use crate::html::{Document, ElementExt};
use crate::utils::jst_now;
use chrono::{DateTime, Datelike, FixedOffset, TimeZone};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const REFRESH_LINK: &str = r#"a[data-remote="true"]"#;
const UPDATED_MARKER: &str = ".date";
/// The refresh link sits three levels below the container that holds its "updated at" marker.
const MARKER_CONTAINER_DEPTH: usize = 3;

/// How `Session::refresh_and_wait` paces itself.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RefreshOptions {
    /// Time between two polls of the site's loading flag.
    pub poll_interval: Duration,
    /// Polling stops with `Error::FetchTimeout` once this much time was spent waiting.
    pub max_wait: Duration,
    /// Sources updated longer ago than this are refreshed.
    pub staleness: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
            staleness: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PollStatus {
    loading: bool,
}

impl Session {
    /// Requests a refresh of every stale source on the dashboard, then polls until the site
    /// reports it is no longer loading.
    pub async fn refresh_and_wait(&self, options: &RefreshOptions) -> Result<()> {
        self.refresh_and_wait_at(jst_now(), options).await
    }

    async fn refresh_and_wait_at(
        &self,
        now: DateTime<FixedOffset>,
        options: &RefreshOptions,
    ) -> Result<()> {
        if options.poll_interval.is_zero() {
            return Err(Error::InvalidArgument(
                "The poll interval must be greater than zero".to_string(),
            ));
        }
        let dashboard = self.http_get(ROOT).await?;
        let targets = stale_sources(&dashboard, now, options.staleness)?;
        for href in &targets {
            debug!("Requesting a refresh through {href}");
            self.http_post(href, &Params::new()).await?;
        }
        info!("Requested {} refreshes", targets.len());
        self.wait_until_loaded(options).await
    }

    async fn wait_until_loaded(&self, options: &RefreshOptions) -> Result<()> {
        let mut waited = Duration::ZERO;
        while waited < options.max_wait {
            tokio::time::sleep(options.poll_interval).await;
            waited += options.poll_interval;
            let body = self.http_get(POLLING).await?;
            let status: PollStatus = serde_json::from_str(&body)
                .map_err(|e| Error::scrape(format!("Unreadable polling response: {e}")))?;
            if !status.loading {
                debug!("The site finished loading after {}s", waited.as_secs());
                return Ok(());
            }
            trace!("Still loading after {}s", waited.as_secs());
        }
        Err(Error::FetchTimeout)
    }
}

/// The refresh links of every source whose "updated at" marker is older than `staleness` or, as a
/// sign that the marker belongs to last year, later than `now`. Links without a readable marker
/// are skipped.
fn stale_sources(
    body: &str,
    now: DateTime<FixedOffset>,
    staleness: Duration,
) -> Result<Vec<String>> {
    let staleness = chrono::Duration::from_std(staleness)
        .map_err(|e| Error::InvalidArgument(format!("Staleness is out of range: {e}")))?;
    let doc = Document::parse(body);
    let mut targets = Vec::new();
    for link in doc.select_all(REFRESH_LINK)? {
        let marker = match link.ancestor(MARKER_CONTAINER_DEPTH) {
            Some(container) => ElementExt::select_one(&container, UPDATED_MARKER)?,
            None => None,
        };
        let Some(marker) = marker else {
            warn!(
                "Skipping refresh link {:?} without an update marker",
                link.attr_value("href")
            );
            continue;
        };
        let Some(updated) = parse_marker(&marker.text_content(), now) else {
            warn!("Skipping unreadable update marker '{}'", marker.text_content());
            continue;
        };
        let stale = updated
            .checked_add_signed(staleness)
            .is_some_and(|fresh_until| now >= fresh_until);
        if updated > now || stale {
            targets.push(link.require_attr("href")?.to_string());
        }
    }
    Ok(targets)
}

/// Reads a marker like `取得日時(03/15 10:00)` as a time in the current year of `now`.
fn parse_marker(text: &str, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re =
        RE.get_or_init(|| Regex::new(r"\((.*)\)").expect("hardcoded regex should be valid"));
    let inner = re.captures(text)?.get(1)?.as_str();
    let (date, time) = inner.trim().split_once(' ')?;
    let (month, day) = date.split_once('/')?;
    let (hour, minute) = time.trim().split_once(':')?;
    now.timezone()
        .with_ymd_and_hms(
            now.year(),
            month.parse().ok()?,
            day.parse().ok()?,
            hour.parse().ok()?,
            minute.parse().ok()?,
            0,
        )
        .single()
}
