use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::raw::RawValue;
use tf_provider::{
    map, Attribute, AttributeConstraint, AttributePath, AttributeType, Block, Description,
    Diagnostics, Resource, Schema, Value, ValueBool, ValueEmpty, ValueString,
};
use tokio::sync::OnceCell;

use super::migrate::{migrate_state, SCHEMA_VERSION};
use super::{check_email_kept, UserAttributes, UserError};
use crate::provider::ProviderClient;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserResourceState<'a> {
    pub id: ValueString<'a>,
    pub uid: ValueString<'a>,
    pub display_name: ValueString<'a>,
    pub disabled: ValueBool,
    pub email: ValueString<'a>,
    pub email_verified: ValueBool,
    pub password: ValueString<'a>,
    pub phone_number: ValueString<'a>,
    pub photo_url: ValueString<'a>,
}

pub(crate) fn known_string(value: &ValueString<'_>) -> Option<String> {
    match value {
        Value::Value(s) => Some(s.to_string()),
        Value::Null | Value::Unknown => None,
    }
}

fn known_bool(value: &ValueBool) -> Option<bool> {
    match value {
        Value::Value(b) => Some(*b),
        Value::Null | Value::Unknown => None,
    }
}

fn string_value<'a>(value: Option<String>) -> ValueString<'a> {
    value.map_or(Value::Null, |s| Value::Value(Cow::Owned(s)))
}

fn bool_value(value: Option<bool>) -> ValueBool {
    value.map_or(Value::Null, Value::Value)
}

impl UserResourceState<'_> {
    pub fn to_attributes(&self) -> UserAttributes {
        UserAttributes {
            uid: known_string(&self.uid),
            display_name: known_string(&self.display_name),
            disabled: known_bool(&self.disabled),
            email: known_string(&self.email),
            email_verified: known_bool(&self.email_verified),
            password: known_string(&self.password),
            phone_number: known_string(&self.phone_number),
            photo_url: known_string(&self.photo_url),
        }
    }

    /// State for a user whose ID is its UID.
    pub fn from_attributes(attributes: UserAttributes) -> Self {
        Self {
            id: string_value(attributes.uid.clone()),
            uid: string_value(attributes.uid),
            display_name: string_value(attributes.display_name),
            disabled: bool_value(attributes.disabled),
            email: string_value(attributes.email),
            email_verified: bool_value(attributes.email_verified),
            password: string_value(attributes.password),
            phone_number: string_value(attributes.phone_number),
            photo_url: string_value(attributes.photo_url),
        }
    }
}

fn attribute(
    attr_type: AttributeType,
    description: &str,
    constraint: AttributeConstraint,
    sensitive: bool,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        sensitive,
        deprecated: false,
    }
}

pub fn user_schema() -> Schema {
    use AttributeConstraint::{Computed, Optional, OptionalComputed};

    Schema {
        version: SCHEMA_VERSION,
        block: Block {
            version: SCHEMA_VERSION,
            attributes: map! {
                "id" => attribute(
                    AttributeType::String,
                    "Identifier of the user, equal to its UID",
                    Computed,
                    false,
                ),
                "uid" => attribute(
                    AttributeType::String,
                    "UID of the user, generated when unset. Changing it replaces the user",
                    OptionalComputed,
                    false,
                ),
                "display_name" => attribute(
                    AttributeType::String,
                    "Display name of the user",
                    Optional,
                    false,
                ),
                "disabled" => attribute(
                    AttributeType::Bool,
                    "Whether the user account is disabled",
                    Optional,
                    false,
                ),
                "email" => attribute(
                    AttributeType::String,
                    "Primary email address of the user",
                    Optional,
                    false,
                ),
                "email_verified" => attribute(
                    AttributeType::Bool,
                    "Whether the primary email address is verified",
                    Optional,
                    false,
                ),
                "password" => attribute(
                    AttributeType::String,
                    "Password of the user, never read back",
                    Optional,
                    true,
                ),
                "phone_number" => attribute(
                    AttributeType::String,
                    "Primary phone number of the user, in E.164 format",
                    Optional,
                    false,
                ),
                "photo_url" => attribute(
                    AttributeType::String,
                    "Photo URL of the user",
                    Optional,
                    false,
                ),
            },
            description: Description::plain("Firebase User"),
            ..Default::default()
        },
    }
}

/// Attributes whose change cannot be applied in place.
fn requires_replace(
    prior: &UserResourceState<'_>,
    proposed: &UserResourceState<'_>,
) -> Vec<AttributePath> {
    let uid_changed = match &proposed.uid {
        Value::Unknown => true,
        uid => known_string(uid) != known_string(&prior.uid),
    };
    if uid_changed {
        vec![AttributePath::new("uid")]
    } else {
        Vec::new()
    }
}

/// The `firebase_user` resource.
pub struct UserResource {
    client: Arc<OnceCell<ProviderClient>>,
}

impl UserResource {
    pub fn new(client: Arc<OnceCell<ProviderClient>>) -> Self {
        Self { client }
    }

    fn client(&self, diags: &mut Diagnostics) -> Option<&ProviderClient> {
        let client = self.client.get();
        if client.is_none() {
            diags.root_error_short("provider is not configured");
        }
        client
    }
}

fn report<T>(diags: &mut Diagnostics, summary: &str, result: Result<T, UserError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            diags.root_error(summary, e.to_string());
            None
        }
    }
}

fn known_id(diags: &mut Diagnostics, state: &UserResourceState<'_>) -> Option<String> {
    let id = known_string(&state.id);
    if id.is_none() {
        diags.root_error_short("firebase_user has no id");
    }
    id
}

#[async_trait]
impl Resource for UserResource {
    type State<'a> = UserResourceState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(user_schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        let errors = config.to_attributes().validate();
        for e in &errors {
            diags.error_short(e.to_string(), AttributePath::new(e.key()));
        }
        errors.is_empty().then_some(())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client(diags)?;
        let id = known_id(diags, &state)?;

        let attributes = report(
            diags,
            "failed to read user",
            super::read(&*client.users, &id, &state.to_attributes()).await,
        )?;
        Some((UserResourceState::from_attributes(attributes), private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut planned = proposed_state;
        planned.id = Value::Unknown;
        if matches!(planned.uid, Value::Null) {
            planned.uid = Value::Unknown;
        }
        Some((planned, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let replace = requires_replace(&prior_state, &proposed_state);
        if replace.is_empty() && !matches!(proposed_state.email, Value::Unknown) {
            let uid = known_string(&prior_state.id).unwrap_or_default();
            let kept = check_email_kept(
                &uid,
                &known_string(&prior_state.email),
                &known_string(&proposed_state.email),
            );
            if let Err(e) = kept {
                diags.error_short(e.to_string(), AttributePath::new("email"));
                return None;
            }
        }
        let mut planned = proposed_state;
        if replace.is_empty() {
            planned.id = prior_state.id;
        } else {
            planned.id = Value::Unknown;
        }
        Some((planned, prior_private_state, replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        Some(())
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client(diags)?;

        let planned = planned_state.to_attributes();
        match super::create(&*client.users, &planned, &client.timeouts).await {
            Ok(attributes) => Some((
                UserResourceState::from_attributes(attributes),
                planned_private_state,
            )),
            Err(e) => {
                diags.root_error("failed to create user", e.to_string());
                // Keep a user that exists remotely so Terraform taints it.
                let created = e.created_state()?.clone();
                Some((UserResourceState::from_attributes(created), planned_private_state))
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client(diags)?;
        let id = known_id(diags, &prior_state)?;

        let attributes = report(
            diags,
            "failed to update user",
            super::update(
                &*client.users,
                &id,
                &prior_state.to_attributes(),
                &planned_state.to_attributes(),
            )
            .await,
        )?;
        Some((UserResourceState::from_attributes(attributes), planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = self.client(diags)?;
        let id = known_id(diags, &prior_state)?;

        report(
            diags,
            "failed to delete user",
            super::delete(&*client.users, &id, &client.timeouts).await,
        )
    }

    async fn upgrade<'a>(
        &self,
        diags: &mut Diagnostics,
        version: i64,
        prior_state: RawValue,
    ) -> Option<Self::State<'a>> {
        let RawValue::Json(bytes) = prior_state else {
            diags.root_error_short("firebase_user state is not JSON encoded");
            return None;
        };
        let state = match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                diags.root_error("failed to decode firebase_user state", e.to_string());
                return None;
            }
        };
        let state = match migrate_state(version, state) {
            Ok(state) => state,
            Err(e) => {
                diags.root_error_short(e.to_string());
                return None;
            }
        };
        match serde_json::from_value(state) {
            Ok(state) => Some(state),
            Err(e) => {
                diags.root_error("failed to decode firebase_user state", e.to_string());
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client(diags)?;

        let attributes = report(
            diags,
            "failed to import user",
            super::import(&*client.users, &id).await,
        )?;
        Some((UserResourceState::from_attributes(attributes), Default::default()))
    }
}
