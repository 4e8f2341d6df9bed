//! Terraform provider for Firebase Authentication users.
//!
//! The provider talks to the Identity Toolkit REST API with a service account
//! and exposes a single resource, `firebase_user`.

pub mod auth;
pub mod config;
pub mod core;
pub mod provider;
pub mod user;
pub mod validators;
pub mod wait;

use std::path::Path;

use crate::auth::FirebaseAuth;
use crate::core::middleware::AuthMiddleware;
use yup_oauth2::ServiceAccountKey;

pub struct FirebaseApp {
    key: ServiceAccountKey,
}

impl FirebaseApp {
    pub fn new(service_account_key: ServiceAccountKey) -> Self {
        Self {
            key: service_account_key,
        }
    }

    /// Loads the service account key JSON from `path`.
    pub async fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let key = yup_oauth2::read_service_account_key(path).await?;
        Ok(Self::new(key))
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    pub fn auth(&self) -> FirebaseAuth {
        FirebaseAuth::new(AuthMiddleware::new(self.key.clone()))
    }
}
