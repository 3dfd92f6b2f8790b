//! Okta connector implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use idsync_connector::annotations::{Annotation, Annotations};
use idsync_connector::error::ConnectorResult;
use idsync_connector::resource::ResourceType;
use idsync_connector::traits::{
    AccountCreationField, AccountCreationSchema, AccountManager, Connector, ConnectorMetadata,
    FieldKind, ResourceChangeEvent, ResourceProvisioner, ResourceSyncer,
};

use crate::cache::RoleFlagCache;
use crate::client::OktaClient;
use crate::config::OktaConfig;
use crate::events::{self, LogEvent};
use crate::group::GroupSyncer;
use crate::role::RoleSyncer;
use crate::types::{group_resource_type, user_resource_type};
use crate::user::{UserSyncer, PASSWORD_CHANGE_REQUIRED_KEY};

const ORG_PATH: &str = "/api/v1/org";

/// Okta CIAM connector.
pub struct OktaConnector {
    config: Arc<OktaConfig>,
    client: Arc<OktaClient>,
    role_flags: Arc<RoleFlagCache>,
    users: UserSyncer,
    groups: GroupSyncer,
    roles: RoleSyncer,
}

impl std::fmt::Debug for OktaConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OktaConnector")
            .field("config", &self.config.redacted())
            .field("cached_role_flags", &self.role_flags.len())
            .finish_non_exhaustive()
    }
}

impl OktaConnector {
    /// Create a connector for the configured tenant.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: OktaConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let client = Arc::new(
            OktaClient::new(&config).map_err(|e| e.context("create Okta client"))?,
        );
        let config = Arc::new(config);
        let role_flags = Arc::new(RoleFlagCache::new());

        info!(
            domain = %config.domain,
            email_domains = config.ciam_email_domains.len(),
            provisioning = config.okta_provisioning,
            "Okta connector created"
        );

        Ok(Self {
            users: UserSyncer::new(Arc::clone(&client), Arc::clone(&config)),
            groups: GroupSyncer::new(Arc::clone(&client), Arc::clone(&config)),
            roles: RoleSyncer::new(
                Arc::clone(&client),
                Arc::clone(&config),
                Arc::clone(&role_flags),
            ),
            config,
            client,
            role_flags,
        })
    }

    pub fn config(&self) -> &OktaConfig {
        &self.config
    }

    /// Syncers for the advertised resource types, users first.
    pub fn resource_syncers(&self) -> Vec<&dyn ResourceSyncer> {
        vec![&self.users, &self.groups]
    }

    /// Syncer for a resource type id.
    pub fn resource_syncer(&self, resource_type_id: &str) -> Option<&dyn ResourceSyncer> {
        let syncers: [&dyn ResourceSyncer; 3] = [&self.users, &self.groups, &self.roles];
        syncers
            .into_iter()
            .find(|s| s.resource_type().id == resource_type_id)
    }

    pub fn user_syncer(&self) -> &UserSyncer {
        &self.users
    }

    pub fn group_syncer(&self) -> &GroupSyncer {
        &self.groups
    }

    /// Administrator role syncer. Roles are not advertised as a resource type.
    pub fn role_syncer(&self) -> &RoleSyncer {
        &self.roles
    }

    /// Group membership provisioning, when enabled.
    pub fn provisioner(&self) -> Option<&dyn ResourceProvisioner> {
        self.config
            .okta_provisioning
            .then_some(&self.groups as &dyn ResourceProvisioner)
    }

    /// Account creation, when provisioning is enabled.
    pub fn account_manager(&self) -> Option<&dyn AccountManager> {
        self.config
            .okta_provisioning
            .then_some(&self.users as &dyn AccountManager)
    }

    /// Role flags cached so far.
    pub fn role_flag_cache(&self) -> &RoleFlagCache {
        &self.role_flags
    }

    /// Map a system log event to a resource change.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a matching event lacks the expected targets.
    pub fn map_event(&self, event: &LogEvent) -> ConnectorResult<Option<ResourceChangeEvent>> {
        events::map_event(event)
    }

    fn account_creation_schema() -> AccountCreationSchema {
        let field = |name: &str, display_name: &str, placeholder: &str, required, order| {
            AccountCreationField {
                name: name.to_string(),
                display_name: display_name.to_string(),
                placeholder: placeholder.to_string(),
                required,
                kind: FieldKind::String,
                order,
            }
        };

        AccountCreationSchema {
            fields: vec![
                field("first_name", "First Name", "First name", true, 1),
                field("last_name", "Last Name", "Last name", true, 2),
                field("email", "Email", "Email", true, 3),
                field("login", "Login", "Login", false, 4),
                field(
                    PASSWORD_CHANGE_REQUIRED_KEY,
                    "Password Change Required on Login",
                    "True/False",
                    false,
                    5,
                ),
            ],
        }
    }
}

#[async_trait]
impl Connector for OktaConnector {
    #[instrument(skip(self))]
    async fn validate(&self) -> ConnectorResult<Annotations> {
        if !self.config.has_api_token() {
            debug!("no API token configured, skipping validation");
            return Ok(Annotations::new());
        }

        let (_, ctx): (Value, _) = self
            .client
            .get(ORG_PATH, &[])
            .await
            .map_err(|e| e.context("validate: fetch org settings"))?;

        info!(domain = %self.config.domain, "Okta connection validated");
        Ok(ctx.annotations())
    }

    async fn metadata(&self) -> ConnectorResult<ConnectorMetadata> {
        self.validate().await?;

        Ok(ConnectorMetadata {
            display_name: "Okta".to_string(),
            description: "The Okta connector syncs user, group, role, and app data from Okta"
                .to_string(),
            annotations: Annotations::new().with(Annotation::ExternalLink {
                url: self.config.domain.clone(),
            }),
            account_creation_schema: Some(Self::account_creation_schema()),
        })
    }

    fn resource_types(&self) -> Vec<ResourceType> {
        vec![user_resource_type(), group_resource_type()]
    }
}
