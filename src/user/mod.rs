//! Lifecycle handlers for the `firebase_user` resource.
//!
//! The handlers work on [`UserAttributes`], where `None` stands for an attribute
//! that is null in configuration or state. They are independent of the plugin
//! protocol; [`resource::UserResource`] adapts them to Terraform.

pub mod migrate;
pub mod resource;

use thiserror::Error;
use tracing::{debug, info};

use crate::auth::models::{
    CreateUserRequest, UpdateUserRequest, UserRecord, DELETE_ATTRIBUTE_DISPLAY_NAME,
    DELETE_ATTRIBUTE_PHOTO_URL, PHONE_PROVIDER_ID,
};
use crate::auth::{AuthError, UserManager};
use crate::config::Timeouts;
use crate::validators::{
    validate_e164_phone_number, validate_email, validate_len_between, validate_url,
    ValidationError,
};
use crate::wait::{StateChangeConf, WaitError};

/// Whether the directory currently knows a UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserState {
    Created,
    Deleted,
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("error waiting for user ({uid}) to be {action}: {source}")]
    Wait {
        uid: String,
        action: &'static str,
        /// What is known of a user that exists remotely despite the error.
        state: Option<Box<UserAttributes>>,
        #[source]
        source: WaitError<UserState, AuthError>,
    },
    #[error("email of user ({0}) cannot be removed, set a different address instead")]
    EmailRemoval(String),
}

impl UserError {
    /// State of a user that was created before the operation failed.
    pub fn created_state(&self) -> Option<&UserAttributes> {
        match self {
            UserError::Wait {
                state: Some(state), ..
            } => Some(state),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAttributes {
    pub uid: Option<String>,
    pub display_name: Option<String>,
    pub disabled: Option<bool>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub photo_url: Option<String>,
}

impl UserAttributes {
    /// Maps a directory record onto state.
    ///
    /// Empty remote values stay null where `prior` had them null, an email
    /// differing only in case keeps the configured spelling, and the password
    /// is carried over since the directory never returns it.
    pub fn from_record(record: &UserRecord, prior: &UserAttributes) -> Self {
        Self {
            uid: Some(record.local_id.clone()),
            display_name: keep_null(&record.display_name, &prior.display_name),
            disabled: keep_null_bool(record.disabled, prior.disabled),
            email: keep_email(&record.email, &prior.email),
            email_verified: keep_null_bool(record.email_verified, prior.email_verified),
            password: prior.password.clone(),
            phone_number: keep_null(&record.phone_number, &prior.phone_number),
            photo_url: keep_null(&record.photo_url, &prior.photo_url),
        }
    }

    fn create_request(&self) -> CreateUserRequest {
        CreateUserRequest {
            local_id: non_empty(&self.uid),
            email: non_empty(&self.email),
            email_verified: self.email_verified,
            password: non_empty(&self.password),
            display_name: non_empty(&self.display_name),
            photo_url: non_empty(&self.photo_url),
            disabled: self.disabled,
            phone_number: non_empty(&self.phone_number),
        }
    }

    /// Checks every known attribute, collecting all failures.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut checks = Vec::new();
        if let Some(uid) = &self.uid {
            checks.push(validate_len_between(uid, "uid", 1, 128));
        }
        if let Some(display_name) = &self.display_name {
            checks.push(validate_len_between(display_name, "display_name", 0, 128));
        }
        if let Some(email) = &self.email {
            checks.push(validate_email(email, "email"));
        }
        if let Some(password) = &self.password {
            checks.push(validate_len_between(password, "password", 6, 128));
        }
        if let Some(phone_number) = &self.phone_number {
            checks.push(validate_e164_phone_number(phone_number, "phone_number"));
        }
        if let Some(photo_url) = &self.photo_url {
            checks.push(validate_url(photo_url, "photo_url"));
        }
        checks.into_iter().filter_map(Result::err).collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

fn keep_null(remote: &Option<String>, prior: &Option<String>) -> Option<String> {
    match (remote.as_deref(), prior) {
        (None | Some(""), None) => None,
        (remote, _) => Some(remote.unwrap_or_default().to_string()),
    }
}

/// The directory stores emails lowercased.
fn keep_email(remote: &Option<String>, prior: &Option<String>) -> Option<String> {
    match (remote, prior) {
        (Some(remote), Some(prior)) if remote.to_lowercase() == prior.to_lowercase() => {
            Some(prior.clone())
        }
        _ => keep_null(remote, prior),
    }
}

fn keep_null_bool(remote: bool, prior: Option<bool>) -> Option<bool> {
    if !remote && prior.is_none() {
        None
    } else {
        Some(remote)
    }
}

/// Fails when `planned` drops the email `prior` had.
pub fn check_email_kept(
    uid: &str,
    prior: &Option<String>,
    planned: &Option<String>,
) -> Result<(), UserError> {
    let had_email = prior.as_deref().is_some_and(|e| !e.is_empty());
    let has_email = planned.as_deref().is_some_and(|e| !e.is_empty());
    if had_email && !has_email {
        return Err(UserError::EmailRemoval(uid.to_string()));
    }
    Ok(())
}

/// Builds the `accounts:update` call turning `prior` into `planned`.
///
/// Only changed attributes are sent. Clearing the display name or photo URL
/// deletes the attribute, clearing the phone number unlinks the phone provider.
/// A new email resets verification remotely, so `email_verified` goes with it.
pub fn update_request(
    uid: &str,
    prior: &UserAttributes,
    planned: &UserAttributes,
) -> Result<UpdateUserRequest, UserError> {
    fn changed(prior: &Option<String>, planned: &Option<String>) -> Option<String> {
        let planned = planned.as_deref().unwrap_or_default();
        (prior.as_deref().unwrap_or_default() != planned).then(|| planned.to_string())
    }
    fn changed_bool(prior: Option<bool>, planned: Option<bool>) -> Option<bool> {
        let planned = planned.unwrap_or_default();
        (prior.unwrap_or_default() != planned).then_some(planned)
    }

    let mut request = UpdateUserRequest::new(uid);
    let mut delete_attribute = Vec::new();

    match changed(&prior.display_name, &planned.display_name) {
        Some(name) if name.is_empty() => {
            delete_attribute.push(DELETE_ATTRIBUTE_DISPLAY_NAME.to_string())
        }
        name => request.display_name = name,
    }
    match changed(&prior.photo_url, &planned.photo_url) {
        Some(url) if url.is_empty() => {
            delete_attribute.push(DELETE_ATTRIBUTE_PHOTO_URL.to_string())
        }
        url => request.photo_url = url,
    }
    match changed(&prior.phone_number, &planned.phone_number) {
        Some(phone) if phone.is_empty() => {
            request.delete_provider = Some(vec![PHONE_PROVIDER_ID.to_string()])
        }
        phone => request.phone_number = phone,
    }
    check_email_kept(uid, &prior.email, &planned.email)?;
    request.email = changed(&prior.email, &planned.email);
    // A password can be replaced but never removed.
    request.password = changed(&prior.password, &planned.password).filter(|p| !p.is_empty());
    request.email_verified = match request.email {
        Some(_) => planned.email_verified,
        None => changed_bool(prior.email_verified, planned.email_verified),
    };
    request.disabled = changed_bool(prior.disabled, planned.disabled);

    if !delete_attribute.is_empty() {
        request.delete_attribute = Some(delete_attribute);
    }
    Ok(request)
}

async fn refresh_user_state<M: UserManager + ?Sized>(
    client: &M,
    uid: &str,
) -> Result<(Option<UserRecord>, UserState), AuthError> {
    debug!(uid, "checking user state");
    match client.get_user(uid).await {
        Ok(record) => {
            debug!(uid, "user exists (created)");
            Ok((Some(record), UserState::Created))
        }
        Err(AuthError::UserNotFound) => {
            debug!(uid, "user doesn't exist (deleted)");
            Ok((None, UserState::Deleted))
        }
        Err(e) => Err(e),
    }
}

pub async fn create<M: UserManager + ?Sized>(
    client: &M,
    planned: &UserAttributes,
    timeouts: &Timeouts,
) -> Result<UserAttributes, UserError> {
    let created = client.create_user(planned.create_request()).await?;
    debug!(?created, "user record");
    info!(uid = %created.local_id, "created user");

    let uid = created.local_id.as_str();
    debug!(uid, "waiting for user to become created");
    let created_state = UserAttributes::from_record(&created, planned);

    let conf = StateChangeConf {
        pending: vec![UserState::Deleted],
        target: vec![UserState::Created],
        delay: timeouts.delay,
        min_timeout: timeouts.min_timeout,
        timeout: timeouts.create,
    };
    let record = conf
        .wait_for_state(move || refresh_user_state(client, uid))
        .await
        .map_err(|source| UserError::Wait {
            uid: uid.to_string(),
            action: "created",
            state: Some(Box::new(created_state.clone())),
            source,
        })?;

    Ok(record.map_or(created_state, |record| {
        UserAttributes::from_record(&record, planned)
    }))
}

pub async fn read<M: UserManager + ?Sized>(
    client: &M,
    uid: &str,
    prior: &UserAttributes,
) -> Result<UserAttributes, UserError> {
    let record = client.get_user(uid).await?;
    Ok(UserAttributes::from_record(&record, prior))
}

pub async fn update<M: UserManager + ?Sized>(
    client: &M,
    uid: &str,
    prior: &UserAttributes,
    planned: &UserAttributes,
) -> Result<UserAttributes, UserError> {
    let request = update_request(uid, prior, planned)?;
    if request.is_empty() {
        debug!(uid, "no user attribute changed");
        return Ok(planned.clone());
    }

    info!(uid, "updating user");
    let updated = client.update_user(request).await?;
    debug!(?updated, "user record");

    read(client, uid, planned).await
}

pub async fn delete<M: UserManager + ?Sized>(
    client: &M,
    uid: &str,
    timeouts: &Timeouts,
) -> Result<(), UserError> {
    info!(uid, "deleting user");
    match client.delete_user(uid).await {
        Ok(()) => {}
        Err(AuthError::UserNotFound) => {
            info!(uid, "user already deleted");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    debug!(uid, "waiting for user to become deleted");
    let conf = StateChangeConf {
        pending: vec![UserState::Created],
        target: vec![UserState::Deleted],
        delay: timeouts.delay,
        min_timeout: timeouts.min_timeout,
        timeout: timeouts.delete,
    };
    conf.wait_for_state(move || refresh_user_state(client, uid))
        .await
        .map_err(|source| UserError::Wait {
            uid: uid.to_string(),
            action: "deleted",
            state: None,
            source,
        })?;

    Ok(())
}

/// Imports an existing user by UID.
pub async fn import<M: UserManager + ?Sized>(
    client: &M,
    uid: &str,
) -> Result<UserAttributes, UserError> {
    info!(uid, "importing user");
    read(client, uid, &UserAttributes::default()).await
}

#[cfg(test)]
mod tests;
