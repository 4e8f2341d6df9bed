use serde_json::Value;
use thiserror::Error;
use tracing::info;

/// Schema version of the `firebase_user` resource.
pub const SCHEMA_VERSION: i64 = 0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MigrateError {
    #[error("Unexpected schema version: {0}")]
    UnexpectedVersion(i64),
}

/// Upgrades raw `firebase_user` state written under schema `version`.
pub fn migrate_state(version: i64, state: Value) -> Result<Value, MigrateError> {
    match version {
        0 => {
            info!("Found Firebase User State v0; migrating to v1");
            Ok(state)
        }
        v => Err(MigrateError::UnexpectedVersion(v)),
    }
}
