//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::TestTransport;
use crate::{Config, Credentials, Session};
use tempfile::TempDir;

/// Test environment that sets up an mf home directory with a Config, plus an in-memory copy of
/// the site. Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
    site: TestTransport,
}

impl TestEnv {
    /// Creates a test environment with an initialized Config and the seed site.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("mf");
        let config = Config::create(&root, "user@example.com").await.unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
            site: TestTransport::default(),
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// The in-memory site. Clones share routes and the request log, so this can be used to
    /// change the site or inspect requests after sessions were created.
    pub fn site(&self) -> &TestTransport {
        &self.site
    }

    /// A session against the in-memory site that has not logged in yet.
    pub fn session(&self) -> Session {
        Session::new(
            Box::new(self.site.clone()),
            self.config.endpoints().clone(),
            Credentials::new(self.config.email(), "hunter2"),
        )
    }

    /// Like `session`, already logged in.
    pub async fn logged_in(&self) -> Session {
        let mut session = self.session();
        session.login().await.unwrap();
        session
    }
}
