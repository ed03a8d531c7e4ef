use crate::commands::Out;
use crate::{RefreshOptions, Session};
use anyhow::Context;

/// Asks stale institutions to re-sync and waits until the site reports that it is done.
pub async fn refresh(session: &Session, options: RefreshOptions) -> anyhow::Result<Out<()>> {
    session
        .refresh_and_wait(&options)
        .await
        .context("Unable to refresh the linked institutions")?;
    Ok("All linked institutions are up to date".into())
}
