//! Connector capability traits
//!
//! A connector exposes one [`ResourceSyncer`] per resource type. Provisioning
//! and account creation are optional capabilities implemented on top.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::annotations::Annotations;
use crate::credentials::{AccountInfo, CreateAccountResult, CredentialDetails, CredentialOptions};
use crate::error::ConnectorResult;
use crate::pagination::{Page, Token};
use crate::profile::Profile;
use crate::resource::{Entitlement, Grant, Resource, ResourceId, ResourceType};

/// Description of a connector shown to the host platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorMetadata {
    pub display_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_creation_schema: Option<AccountCreationSchema>,
}

/// Ordered set of fields the caller may supply when creating an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreationSchema {
    pub fields: Vec<AccountCreationField>,
}

/// Value kind of an account creation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Bool,
}

/// One account creation field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreationField {
    pub name: String,
    pub display_name: String,
    pub placeholder: String,
    pub required: bool,
    pub kind: FieldKind,
    pub order: u32,
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Check that the configured credential can reach the upstream system.
    async fn validate(&self) -> ConnectorResult<Annotations>;

    /// Describe the connector.
    async fn metadata(&self) -> ConnectorResult<ConnectorMetadata>;

    /// Resource types advertised to the host platform.
    fn resource_types(&self) -> Vec<ResourceType>;
}

/// Per-resource-type sync capability.
#[async_trait]
pub trait ResourceSyncer: Send + Sync {
    /// The resource type this syncer produces.
    fn resource_type(&self) -> ResourceType;

    /// List resources, one page per call.
    async fn list(
        &self,
        parent: Option<&ResourceId>,
        token: &Token,
    ) -> ConnectorResult<Page<Resource>>;

    /// List entitlements of `resource`.
    async fn entitlements(
        &self,
        resource: &Resource,
        token: &Token,
    ) -> ConnectorResult<Page<Entitlement>>;

    /// List grants of `resource`'s entitlements.
    async fn grants(&self, resource: &Resource, token: &Token) -> ConnectorResult<Page<Grant>>;

    /// Fetch a single resource. `Ok(None)` when it is absent or out of scope.
    async fn get(
        &self,
        resource_id: &ResourceId,
        parent: Option<&ResourceId>,
    ) -> ConnectorResult<Option<Resource>>;
}

/// Capability for granting and revoking entitlements.
#[async_trait]
pub trait ResourceProvisioner: Send + Sync {
    /// Grant `entitlement` to `principal`.
    async fn grant(
        &self,
        principal: &Resource,
        entitlement: &Entitlement,
    ) -> ConnectorResult<Annotations>;

    /// Revoke an existing grant.
    async fn revoke(&self, grant: &Grant) -> ConnectorResult<Annotations>;
}

/// Capability for creating accounts.
#[async_trait]
pub trait AccountManager: Send + Sync {
    /// Create an account and return it with any generated secrets.
    async fn create_account(
        &self,
        account_info: &AccountInfo,
        credential_options: &CredentialOptions,
    ) -> ConnectorResult<CreateAccountResult>;

    /// Credential options supported by [`AccountManager::create_account`].
    fn create_account_capability_details(&self) -> CredentialDetails;
}

/// Resource-change notification derived from an upstream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChangeEvent {
    pub event_id: String,
    pub resource_id: ResourceId,
    #[serde(default)]
    pub details: Profile,
}
