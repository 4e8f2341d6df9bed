use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map, Attribute, AttributeConstraint, AttributeType, Block, Description, Diagnostics,
    Provider, Schema, ValueEmpty, ValueString,
};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::auth::UserManager;
use crate::config::{Config, Timeouts};
use crate::user::resource::{known_string, UserResource};

/// Client handed to resources once the provider is configured.
pub struct ProviderClient {
    pub users: Arc<dyn UserManager>,
    pub timeouts: Timeouts,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FirebaseProviderConfig<'a> {
    pub service_account_key: ValueString<'a>,
}

#[derive(Default, Clone)]
pub struct FirebaseProvider {
    client: Arc<OnceCell<ProviderClient>>,
}

#[async_trait]
impl Provider for FirebaseProvider {
    type Config<'a> = FirebaseProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "service_account_key" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain(
                            "Firebase Admin SDK Service Account Key File. Defaults to FIREBASE_SERVICE_ACCOUNT_KEY",
                        ),
                        constraint: AttributeConstraint::Optional,
                        sensitive: false,
                        deprecated: false,
                    },
                },
                description: Description::plain("firebase"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(
        &self,
        _diags: &mut Diagnostics,
        _config: Self::Config<'a>,
    ) -> Option<()> {
        Some(())
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        info!(%terraform_version, "configuring firebase provider");

        let config = match Config::from_provider(known_string(&config.service_account_key)) {
            Ok(config) => config,
            Err(e) => {
                diags.root_error_short(e.to_string());
                return None;
            }
        };
        let auth = match config.client().await {
            Ok(auth) => auth,
            Err(e) => {
                diags.root_error("failed to configure firebase client", e.to_string());
                return None;
            }
        };

        let client = ProviderClient {
            users: Arc::new(auth),
            timeouts: config.timeouts,
        };
        if self.client.set(client).is_err() {
            warn!("provider already configured, keeping the first client");
        }
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn tf_provider::resource::DynamicResource>>> {
        Some(map! {
            "firebase_user" => UserResource::new(self.client.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn tf_provider::data_source::DynamicDataSource>>> {
        Some(map! {})
    }
}
