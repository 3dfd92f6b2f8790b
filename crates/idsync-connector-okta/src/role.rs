//! Administrator roles.
//!
//! Okta's standard administrator roles are a fixed catalog; custom roles are
//! listed from the IAM API when enabled. Who holds a role is decided per user
//! from the administrator flags endpoint, cached for the connector lifetime.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use idsync_connector::annotations::{Annotation, Annotations};
use idsync_connector::error::{ConnectorError, ConnectorResult};
use idsync_connector::pagination::{Bag, Page, PageState, Token};
use idsync_connector::profile::Profile;
use idsync_connector::resource::{Entitlement, Grant, Resource, ResourceId, ResourceType};
use idsync_connector::traits::ResourceSyncer;

use crate::cache::RoleFlagCache;
use crate::client::OktaClient;
use crate::config::OktaConfig;
use crate::response::{after_param, ResponseContext};
use crate::types::{
    group_resource_type, role_resource_type, user_resource_type, ROLE_RESOURCE_TYPE,
    USER_RESOURCE_TYPE,
};

const ADMINISTRATORS_PATH: &str = "/api/internal/administrators";
const CUSTOM_ROLES_PATH: &str = "/api/v1/iam/roles";
const ROLE_ASSIGNEES_PATH: &str = "/api/v1/iam/assignees/users";

/// Role assignment status that never produces a grant.
pub const ROLE_STATUS_INACTIVE: &str = "INACTIVE";

/// Entitlement slug for holding a role.
pub const ROLE_ASSIGNED_SLUG: &str = "assigned";

const STANDARD_ROLES_PHASE: &str = "role";
const CUSTOM_ROLES_PHASE: &str = "custom_role";

/// A built-in administrator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardRole {
    pub role_type: &'static str,
    pub label: &'static str,
}

/// Roles that can only be assigned at the org-wide scope.
pub const STANDARD_ROLES: [StandardRole; 10] = [
    StandardRole {
        role_type: "API_ACCESS_MANAGEMENT_ADMIN",
        label: "API Access Management Administrator",
    },
    StandardRole {
        role_type: "MOBILE_ADMIN",
        label: "Mobile Administrator",
    },
    StandardRole {
        role_type: "ORG_ADMIN",
        label: "Organizational Administrator",
    },
    StandardRole {
        role_type: "READ_ONLY_ADMIN",
        label: "Read-Only Administrator",
    },
    StandardRole {
        role_type: "REPORT_ADMIN",
        label: "Report Administrator",
    },
    StandardRole {
        role_type: "SUPER_ADMIN",
        label: "Super Administrator",
    },
    // Okta's type name for the Group Administrator role.
    StandardRole {
        role_type: "USER_ADMIN",
        label: "Group Administrator",
    },
    StandardRole {
        role_type: "HELP_DESK_ADMIN",
        label: "Help Desk Administrator",
    },
    StandardRole {
        role_type: "APP_ADMIN",
        label: "Application Administrator",
    },
    StandardRole {
        role_type: "GROUP_MEMBERSHIP_ADMIN",
        label: "Group Membership Administrator",
    },
];

pub fn standard_role_from_type(role_type: &str) -> Option<&'static StandardRole> {
    STANDARD_ROLES.iter().find(|r| r.role_type == role_type)
}

pub fn standard_role_from_label(label: &str) -> Option<&'static StandardRole> {
    STANDARD_ROLES.iter().find(|r| r.label == label)
}

/// Role record as returned by Okta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OktaRole {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub role_type: String,
}

impl From<&StandardRole> for OktaRole {
    fn from(role: &StandardRole) -> Self {
        Self {
            id: String::new(),
            label: role.label.to_string(),
            role_type: role.role_type.to_string(),
        }
    }
}

/// Build a role resource, keyed by role type or by id for custom roles.
pub fn role_resource(role: &OktaRole) -> Resource {
    let object_id = if role.role_type.is_empty() && !role.id.is_empty() {
        role.id.as_str()
    } else {
        role.role_type.as_str()
    };

    let profile = Profile::new()
        .with("id", role.id.as_str())
        .with("label", role.label.as_str())
        .with("type", role.role_type.as_str());

    Resource::role(role.label.clone(), &role_resource_type(), object_id, profile)
}

/// The `assigned` entitlement of a role.
pub fn role_entitlement(resource: &Resource) -> Entitlement {
    Entitlement::assignment(resource, ROLE_ASSIGNED_SLUG)
        .with_display_name(format!("{} Role Member", resource.display_name))
        .with_description(format!("Has the {} role in Okta", resource.display_name))
        .with_grantable_to(&user_resource_type())
        .with_grantable_to(&group_resource_type())
}

/// Administrator role flags of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdministratorRoleFlags {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub super_admin: bool,
    #[serde(default)]
    pub org_admin: bool,
    #[serde(default)]
    pub read_only_admin: bool,
    #[serde(default)]
    pub mobile_admin: bool,
    #[serde(default)]
    pub app_admin: bool,
    #[serde(default)]
    pub help_desk_admin: bool,
    #[serde(default)]
    pub group_membership_admin: bool,
    #[serde(default)]
    pub api_access_management_admin: bool,
    #[serde(default)]
    pub user_admin: bool,
    #[serde(default)]
    pub report_admin: bool,
    #[serde(default)]
    pub for_all_apps: bool,
    #[serde(default)]
    pub for_all_user_admin_groups: bool,
    #[serde(default)]
    pub for_all_help_desk_admin_groups: bool,
    #[serde(default)]
    pub for_all_group_membership_admin_groups: bool,
    #[serde(default)]
    pub roles_from_individual_assignments: Vec<String>,
    #[serde(default)]
    pub roles_from_group: Vec<String>,
}

impl AdministratorRoleFlags {
    /// Flags for a user with no administrator roles.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// Whether `flags` grants the role identified by `role_id` (a role type such
/// as `SUPER_ADMIN`), either individually or through a group.
pub fn user_has_role_access(flags: &AdministratorRoleFlags, role_id: &str) -> bool {
    let role_name = role_id.to_lowercase().replace('_', "");
    flags
        .roles_from_individual_assignments
        .iter()
        .chain(flags.roles_from_group.iter())
        .any(|role| role.to_lowercase() == role_name)
}

/// Fetch administrator flags for `user_id`. A permission failure yields empty
/// flags.
///
/// # Errors
///
/// Returns any other upstream failure with context.
#[instrument(skip(client))]
pub async fn fetch_role_flags(
    client: &OktaClient,
    user_id: &str,
) -> ConnectorResult<AdministratorRoleFlags> {
    let result = client
        .get::<Vec<AdministratorRoleFlags>>(ADMINISTRATORS_PATH, &[("userId", user_id.to_string())])
        .await;

    let flags = match result {
        Ok((flags, _)) => flags,
        Err(e) if e.is_access_denied() => {
            debug!(user_id = %user_id, "missing permission to read administrator flags");
            return Ok(AdministratorRoleFlags::empty(user_id));
        }
        Err(e) => return Err(e.context(format!("list administrator flags for user {user_id}"))),
    };

    Ok(flags
        .iter()
        .find(|f| f.user_id == user_id)
        .or_else(|| flags.first())
        .cloned()
        .unwrap_or_else(|| AdministratorRoleFlags::empty(user_id)))
}

#[derive(Debug, Default, Deserialize)]
struct LinkHref {
    #[serde(default)]
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    next: Option<LinkHref>,
}

#[derive(Debug, Deserialize)]
struct CustomRolesPage {
    #[serde(default)]
    roles: Vec<OktaRole>,
    #[serde(default, rename = "_links")]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct RoleAssignee {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RoleAssigneesPage {
    #[serde(default)]
    value: Vec<RoleAssignee>,
    #[serde(default, rename = "_links")]
    links: Links,
}

/// Cursor from a `_links.next.href` body link, falling back to the `Link`
/// header.
fn body_link_cursor(links: &Links, ctx: &ResponseContext) -> String {
    links
        .next
        .as_ref()
        .and_then(|next| after_param(&next.href))
        .unwrap_or_else(|| ctx.next_cursor())
}

/// Syncer for administrator roles.
#[derive(Debug)]
pub struct RoleSyncer {
    client: Arc<OktaClient>,
    config: Arc<OktaConfig>,
    role_flags: Arc<RoleFlagCache>,
}

impl RoleSyncer {
    pub fn new(
        client: Arc<OktaClient>,
        config: Arc<OktaConfig>,
        role_flags: Arc<RoleFlagCache>,
    ) -> Self {
        Self {
            client,
            config,
            role_flags,
        }
    }

    #[instrument(skip(self))]
    async fn list_custom_roles(
        &self,
        cursor: &str,
    ) -> ConnectorResult<(Vec<OktaRole>, String, Annotations)> {
        let (page, ctx): (CustomRolesPage, _) = self
            .client
            .get(CUSTOM_ROLES_PATH, &[("after", cursor.to_string())])
            .await
            .map_err(|e| e.context("list custom roles"))?;
        let next = body_link_cursor(&page.links, &ctx);
        Ok((page.roles, next, ctx.annotations()))
    }

    #[instrument(skip(self))]
    async fn list_role_assignees(
        &self,
        limit: usize,
        cursor: &str,
    ) -> ConnectorResult<(Vec<String>, String, Annotations)> {
        let (page, ctx): (RoleAssigneesPage, _) = self
            .client
            .get(
                ROLE_ASSIGNEES_PATH,
                &[("limit", limit.to_string()), ("after", cursor.to_string())],
            )
            .await
            .map_err(|e| e.context("list users with role assignments"))?;
        let next = body_link_cursor(&page.links, &ctx);
        let ids = page.value.into_iter().map(|a| a.id).collect();
        Ok((ids, next, ctx.annotations()))
    }

    /// Role flags for `user_id`, through the shared cache.
    ///
    /// # Errors
    ///
    /// Returns upstream failures other than missing permissions.
    pub async fn user_role_flags(
        &self,
        user_id: &str,
    ) -> ConnectorResult<Arc<AdministratorRoleFlags>> {
        self.role_flags
            .get_or_fetch(user_id, || fetch_role_flags(&self.client, user_id))
            .await
    }
}

#[async_trait]
impl ResourceSyncer for RoleSyncer {
    fn resource_type(&self) -> ResourceType {
        role_resource_type()
    }

    async fn list(
        &self,
        _parent: Option<&ResourceId>,
        token: &Token,
    ) -> ConnectorResult<Page<Resource>> {
        let mut bag = Bag::unmarshal(&token.token)?;
        if bag.is_exhausted() {
            if self.config.sync_custom_roles {
                bag.seed(&[STANDARD_ROLES_PHASE, CUSTOM_ROLES_PHASE])?;
            } else {
                bag.seed(&[STANDARD_ROLES_PHASE])?;
            }
        }

        let phase = bag.resource_type_id().to_string();
        let (items, annotations) = match phase.as_str() {
            STANDARD_ROLES_PHASE => {
                bag.next("")?;
                let roles = STANDARD_ROLES
                    .iter()
                    .map(|r| role_resource(&OktaRole::from(r)))
                    .collect();
                (roles, Annotations::new())
            }
            CUSTOM_ROLES_PHASE => {
                let (roles, next, annos) = self.list_custom_roles(bag.page_token()).await?;
                bag.next(&next)?;
                (roles.iter().map(role_resource).collect(), annos)
            }
            other => {
                return Err(ConnectorError::invalid_token(format!(
                    "invalid role list phase: {other}"
                )))
            }
        };

        Ok(Page {
            items,
            next_token: bag.marshal()?,
            annotations,
        })
    }

    async fn entitlements(
        &self,
        resource: &Resource,
        _token: &Token,
    ) -> ConnectorResult<Page<Entitlement>> {
        Ok(Page {
            items: vec![role_entitlement(resource)],
            ..Page::empty()
        })
    }

    async fn grants(&self, resource: &Resource, token: &Token) -> ConnectorResult<Page<Grant>> {
        let mut bag = Bag::parse(&token.token, PageState::new(USER_RESOURCE_TYPE))?;
        let limit = self.config.page_limit(token);

        let (user_ids, next, annotations) =
            self.list_role_assignees(limit, bag.page_token()).await?;
        bag.next(&next)?;

        let mut grants = Vec::new();
        for user_id in user_ids {
            let flags = self.user_role_flags(&user_id).await?;
            if user_has_role_access(&flags, &resource.id.resource) {
                grants.push(Grant::new(
                    resource,
                    ROLE_ASSIGNED_SLUG,
                    ResourceId::new(USER_RESOURCE_TYPE, user_id),
                ));
            }
        }

        Ok(Page {
            items: grants,
            next_token: bag.marshal()?,
            annotations,
        })
    }

    async fn get(
        &self,
        resource_id: &ResourceId,
        _parent: Option<&ResourceId>,
    ) -> ConnectorResult<Option<Resource>> {
        if resource_id.resource_type != ROLE_RESOURCE_TYPE {
            return Ok(None);
        }

        if let Some(standard) = standard_role_from_type(&resource_id.resource) {
            return Ok(Some(role_resource(&OktaRole::from(standard))));
        }

        if !self.config.sync_custom_roles {
            return Ok(None);
        }

        let path = format!(
            "{CUSTOM_ROLES_PATH}/{}",
            urlencoding::encode(&resource_id.resource)
        );
        match self.client.get_cached::<OktaRole>(&path, "application/json").await {
            Ok((role, _)) => Ok(Some(role_resource(&role))),
            Err(e) if e.is_not_found() => {
                warn!(role_id = %resource_id.resource, "custom role not found");
                Ok(None)
            }
            Err(e) => Err(e.context(format!("get custom role {}", resource_id.resource))),
        }
    }
}

/// Expansion hint attached to a role grant held by a group.
pub fn group_role_expansion(member_entitlement_id: String) -> Annotation {
    Annotation::GrantExpandable {
        entitlement_ids: vec![member_entitlement_id],
        shallow: true,
    }
}
