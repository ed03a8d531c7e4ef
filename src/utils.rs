use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// The site reports every time in Japan Standard Time, which has no daylight saving.
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Write a file.
pub(crate) async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .context(format!("Unable to write to {}", path.to_string_lossy()))
}

/// Read a file to a `String`.
pub(crate) async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
}

/// Deserialize a JSON file into type `T`.
pub(crate) async fn deserialize<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = read(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file at {}", path.display()))
}

/// Create a directory and its parents if they do not exist.
pub(crate) async fn make_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("Unable to create directory {}", path.display()))
}

pub(crate) async fn canonicalize(path: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("Unable to resolve path {}", path.display()))
}

pub(crate) fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).expect("hardcoded offset should be valid")
}

/// The current time on the site's clock.
pub(crate) fn jst_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&jst())
}

/// Today's date on the site's clock.
pub(crate) fn jst_today() -> NaiveDate {
    jst_now().date_naive()
}

/// Pages show dates without a year. This picks the most recent date with the given month and day
/// that is not after `today`: this year, or last year if that would be in the future. Returns
/// `None` when no such date exists, e.g. February 29 in a common year.
pub(crate) fn resolve_month_day(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date <= today => Some(date),
        Some(_) => NaiveDate::from_ymd_opt(today.year() - 1, month, day),
        None => None,
    }
}
