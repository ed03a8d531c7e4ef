use crate::commands::Out;
use crate::Config;
use anyhow::Context;
use std::path::Path;

/// Creates the data directory and an initial `config.json` that logs in as `email`.
///
/// # Arguments
/// - `mf_home` - The directory that will be the root of data directory, e.g. `$HOME/mf`
/// - `email` - The email address used to log in to Money Forward ME.
///
/// # Errors
/// - Returns an error if any file operations fail or if the directory was already initialized.
pub async fn init(mf_home: &Path, email: &str) -> anyhow::Result<Out<()>> {
    let config = Config::create(mf_home, email)
        .await
        .context("Unable to create the data directory and config")?;
    Ok(format!(
        "Successfully created the mf config at {}",
        config.config_path().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("mf");
        let out = init(&home, "user@example.com").await.unwrap();
        assert!(out.message().contains("config.json"));

        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.email(), "user@example.com");

        // A second init must not clobber the first.
        assert!(init(&home, "other@example.com").await.is_err());
    }
}
