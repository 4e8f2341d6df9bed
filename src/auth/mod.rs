pub mod models;

use crate::auth::models::{
    CreateUserRequest, DeleteAccountRequest, GetAccountInfoRequest, GetAccountInfoResponse,
    UpdateUserRequest, UserRecord,
};
use crate::core::middleware::AuthMiddleware;
use crate::core::parse_error_response;
use async_trait::async_trait;
use reqwest::{header, Client};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Serialize;
use thiserror::Error;


const IDENTITY_TOOLKIT_V1_API: &str =
    "https://identitytoolkit.googleapis.com/v1/projects/{project_id}";

// Message prefix the Identity Toolkit uses when the UID is unknown.
const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("User not found")]
    UserNotFound,
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AuthError {
    fn from_api_message(message: String) -> Self {
        if message.starts_with(USER_NOT_FOUND) {
            AuthError::UserNotFound
        } else {
            AuthError::ApiError(message)
        }
    }
}

/// The user-management surface the `firebase_user` resource needs.
#[async_trait]
pub trait UserManager: Send + Sync {
    async fn create_user(&self, request: CreateUserRequest) -> Result<UserRecord, AuthError>;
    async fn get_user(&self, uid: &str) -> Result<UserRecord, AuthError>;
    async fn update_user(&self, request: UpdateUserRequest) -> Result<UserRecord, AuthError>;
    async fn delete_user(&self, uid: &str) -> Result<(), AuthError>;
}

#[derive(Clone)]
pub struct FirebaseAuth {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirebaseAuth {
    pub fn new(middleware: AuthMiddleware) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let project_id = middleware.key.project_id.clone().unwrap_or_default();

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(middleware)
            .build();

        let base_url = IDENTITY_TOOLKIT_V1_API.replace("{project_id}", &project_id);

        Self { client, base_url }
    }

    /// Creates a client against a custom base URL, e.g. a mock server or the auth emulator.
    pub fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        default_msg: &str,
    ) -> Result<reqwest::Response, AuthError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = parse_error_response(response, default_msg).await;
            return Err(AuthError::from_api_message(message));
        }

        Ok(response)
    }
}

#[async_trait]
impl UserManager for FirebaseAuth {
    async fn create_user(&self, request: CreateUserRequest) -> Result<UserRecord, AuthError> {
        let response = self.post("accounts", &request, "Create user failed").await?;
        let user: UserRecord = response.json().await?;
        Ok(user)
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord, AuthError> {
        let request = GetAccountInfoRequest {
            local_id: vec![uid.to_string()],
        };
        let response = self
            .post("accounts:lookup", &request, "Get user failed")
            .await?;

        let result: GetAccountInfoResponse = response.json().await?;

        result
            .users
            .and_then(|mut users| users.pop())
            .ok_or(AuthError::UserNotFound)
    }

    async fn update_user(&self, request: UpdateUserRequest) -> Result<UserRecord, AuthError> {
        let response = self
            .post("accounts:update", &request, "Update user failed")
            .await?;
        let user: UserRecord = response.json().await?;
        Ok(user)
    }

    async fn delete_user(&self, uid: &str) -> Result<(), AuthError> {
        let request = DeleteAccountRequest {
            local_id: uid.to_string(),
        };
        self.post("accounts:delete", &request, "Delete user failed")
            .await?;
        Ok(())
    }
}
