use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::auth::FirebaseAuth;
use crate::FirebaseApp;

/// Environment variable read when the provider block leaves the key unset.
pub const SERVICE_ACCOUNT_KEY_ENV: &str = "FIREBASE_SERVICE_ACCOUNT_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("service_account_key must be set in the provider block or via FIREBASE_SERVICE_ACCOUNT_KEY")]
    MissingServiceAccountKey,
    #[error("failed to read service account key {path:?}: {source}")]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("service account key {0:?} has no project_id")]
    MissingProjectId(PathBuf),
}

/// How long the user resource waits for the directory to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub delete: Duration,
    pub delay: Duration,
    pub min_timeout: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(10 * 60),
            delete: Duration::from_secs(20 * 60),
            delay: Duration::from_secs(5),
            min_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub service_account_key: PathBuf,
    pub timeouts: Timeouts,
}

impl Config {
    /// Resolves the provider configuration, falling back to the environment.
    pub fn from_provider(service_account_key: Option<String>) -> Result<Self, ConfigError> {
        Self::resolve(service_account_key, std::env::var(SERVICE_ACCOUNT_KEY_ENV).ok())
    }

    fn resolve(configured: Option<String>, env: Option<String>) -> Result<Self, ConfigError> {
        let path = configured
            .filter(|v| !v.is_empty())
            .or_else(|| env.filter(|v| !v.is_empty()))
            .ok_or(ConfigError::MissingServiceAccountKey)?;

        Ok(Self {
            service_account_key: PathBuf::from(path),
            timeouts: Timeouts::default(),
        })
    }

    /// Builds an authenticated user-management client.
    pub async fn client(&self) -> Result<FirebaseAuth, ConfigError> {
        info!(
            path = %self.service_account_key.display(),
            "using service account key file"
        );

        let app = FirebaseApp::from_file(&self.service_account_key)
            .await
            .map_err(|source| ConfigError::ReadKey {
                path: self.service_account_key.clone(),
                source,
            })?;

        let project_id = app
            .project_id()
            .ok_or_else(|| ConfigError::MissingProjectId(self.service_account_key.clone()))?;

        info!(project_id, "getting auth client");
        Ok(app.auth())
    }
}
