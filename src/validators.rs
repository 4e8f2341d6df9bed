//! Field validators run before any call reaches the Identity Toolkit.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

// https://en.wikipedia.org/wiki/E.164
static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[0-9]{7,15}$").expect("E.164 pattern is valid"));

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{key:?} should be an email: {value:?}")]
    Email { key: String, value: String },
    #[error("{key:?} should be an URL: {value:?}")]
    Url { key: String, value: String },
    #[error("{key:?} should be a E.164: {value:?}")]
    PhoneNumber { key: String, value: String },
    #[error("expected length of {key:?} to be in the range ({min} - {max}), got {value:?}")]
    Length {
        key: String,
        value: String,
        min: usize,
        max: usize,
    },
}

impl ValidationError {
    /// Attribute the error refers to.
    pub fn key(&self) -> &str {
        match self {
            ValidationError::Email { key, .. }
            | ValidationError::Url { key, .. }
            | ValidationError::PhoneNumber { key, .. }
            | ValidationError::Length { key, .. } => key,
        }
    }
}

/// Accepts a bare `local@domain` address, the only form Firebase stores.
pub fn validate_email(value: &str, key: &str) -> Result<(), ValidationError> {
    let err = || ValidationError::Email {
        key: key.to_string(),
        value: value.to_string(),
    };

    if value.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
        return Err(err());
    }

    let (local, domain) = value.split_once('@').ok_or_else(err)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(err());
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(err());
    }

    Ok(())
}

pub fn validate_url(value: &str, key: &str) -> Result<(), ValidationError> {
    Url::parse(value).map(|_| ()).map_err(|_| ValidationError::Url {
        key: key.to_string(),
        value: value.to_string(),
    })
}

pub fn validate_e164_phone_number(value: &str, key: &str) -> Result<(), ValidationError> {
    if E164.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::PhoneNumber {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Bounds are inclusive and counted in characters.
pub fn validate_len_between(
    value: &str,
    key: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if (min..=max).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::Length {
            key: key.to_string(),
            value: value.to_string(),
            min,
            max,
        })
    }
}
