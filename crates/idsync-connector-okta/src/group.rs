//! Okta groups: listing, membership entitlements, grant reconciliation and
//! membership provisioning.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use idsync_connector::annotations::{Annotation, Annotations};
use idsync_connector::error::{ConnectorError, ConnectorResult};
use idsync_connector::pagination::{Bag, Page, PageState, Token};
use idsync_connector::profile::Profile;
use idsync_connector::resource::{
    entitlement_id, Entitlement, Grant, Resource, ResourceId, ResourceType,
};
use idsync_connector::traits::{ResourceProvisioner, ResourceSyncer};

use crate::client::OktaClient;
use crate::config::OktaConfig;
use crate::role::{
    group_role_expansion, role_resource, OktaRole, ROLE_ASSIGNED_SLUG, ROLE_STATUS_INACTIVE,
};
use crate::types::{
    group_resource_type, user_resource_type, GROUP_RESOURCE_TYPE, ROLE_RESOURCE_TYPE,
    USER_RESOURCE_TYPE,
};

const GROUPS_PATH: &str = "/api/v1/groups";

/// Entitlement slug for group membership.
pub const GROUP_MEMBER_SLUG: &str = "member";

/// Profile key holding the member count reported by `expand=stats`.
pub const USERS_COUNT_PROFILE_KEY: &str = "users_count";

/// ETag metadata key for the last membership change.
pub const MEMBERSHIP_UPDATED_FIELD: &str = "lastMembershipUpdated";

/// Grant phases of a group, drained first to last.
pub const GROUP_GRANT_PHASES: [&str; 2] = [USER_RESOURCE_TYPE, ROLE_RESOURCE_TYPE];

const GROUP_ASSIGNMENT_TYPE: &str = "GROUP";

/// Group record as returned by Okta.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OktaGroup {
    pub id: String,
    #[serde(default)]
    pub profile: OktaGroupProfile,
    #[serde(default)]
    pub last_membership_updated: Option<DateTime<Utc>>,
    #[serde(default, rename = "_embedded")]
    pub embedded: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OktaGroupProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl OktaGroup {
    /// Member count from `_embedded.stats.usersCount`, when requested and
    /// present.
    pub fn users_count(&self) -> Option<i64> {
        let count = self.embedded.as_ref()?.get("stats")?.get("usersCount")?;
        count.as_i64().or_else(|| {
            count
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        })
    }
}

/// Role assignment of a group.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRoleAssignment {
    #[serde(default)]
    pub id: String,
    /// Role id, set for custom role assignments.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub role_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub assignment_type: String,
}

impl GroupRoleAssignment {
    /// Inactive and individually assigned roles never produce a group grant.
    pub fn is_active_group_assignment(&self) -> bool {
        self.status != ROLE_STATUS_INACTIVE && self.assignment_type == GROUP_ASSIGNMENT_TYPE
    }
}

#[derive(Debug, Deserialize)]
struct GroupMember {
    id: String,
}

/// Build a group resource.
pub fn group_resource(group: &OktaGroup) -> Resource {
    let mut profile = Profile::new()
        .with("name", group.profile.name.as_str())
        .with(
            "description",
            group.profile.description.clone().unwrap_or_default(),
        );
    if let Some(count) = group.users_count() {
        profile.set(USERS_COUNT_PROFILE_KEY, count);
    }

    let mut resource = Resource::group(
        group.profile.name.clone(),
        &group_resource_type(),
        group.id.clone(),
        profile,
    )
    .with_annotation(Annotation::RawId {
        id: group.id.clone(),
    });

    if let Some(updated) = group.last_membership_updated {
        resource = resource.with_annotation(Annotation::ETagMetadata {
            metadata: Profile::new().with(
                MEMBERSHIP_UPDATED_FIELD,
                updated.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
        });
    }

    resource
}

/// The `member` entitlement of a group.
pub fn group_member_entitlement(resource: &Resource) -> Entitlement {
    Entitlement::assignment(resource, GROUP_MEMBER_SLUG)
        .with_display_name(format!("{} Group Member", resource.display_name))
        .with_description(format!("Member of {} group in Okta", resource.display_name))
        .with_grantable_to(&user_resource_type())
}

fn member_grant(group: &Resource, user_id: &str) -> Grant {
    Grant::new(
        group,
        GROUP_MEMBER_SLUG,
        ResourceId::new(USER_RESOURCE_TYPE, user_id),
    )
}

fn group_path(group_id: &str) -> String {
    format!("{GROUPS_PATH}/{}", urlencoding::encode(group_id))
}

fn membership_path(group_id: &str, user_id: &str) -> String {
    format!(
        "{}/users/{}",
        group_path(group_id),
        urlencoding::encode(user_id)
    )
}

/// Syncer and provisioner for groups.
#[derive(Debug)]
pub struct GroupSyncer {
    client: Arc<OktaClient>,
    config: Arc<OktaConfig>,
}

impl GroupSyncer {
    pub fn new(client: Arc<OktaClient>, config: Arc<OktaConfig>) -> Self {
        Self { client, config }
    }

    /// User phase: one `member` grant per group member. Skipped without an
    /// upstream call when the group reports no members.
    #[instrument(skip(self, resource, bag), fields(group_id = %resource.id.resource))]
    async fn user_membership_grants(
        &self,
        resource: &Resource,
        users_count: Option<i64>,
        bag: &mut Bag,
        limit: usize,
    ) -> ConnectorResult<Page<Grant>> {
        let group_id = resource.id.resource.as_str();
        let mut grants = Vec::new();
        let mut annotations = Annotations::new();
        let mut next = String::new();

        match users_count {
            Some(count) if count <= 0 => {
                debug!("skipping list group users, group has no members");
            }
            _ => {
                if users_count.is_none() {
                    debug!("users_count not present, listing group users");
                }

                let (members, ctx): (Vec<GroupMember>, _) = self
                    .client
                    .get(
                        &format!("{}/users", group_path(group_id)),
                        &[
                            ("limit", limit.to_string()),
                            ("after", bag.page_token().to_string()),
                        ],
                    )
                    .await
                    .map_err(|e| e.context(format!("list users of group {group_id}")))?;

                next = ctx.next_cursor();
                annotations = ctx.annotations();
                grants = members
                    .iter()
                    .map(|m| member_grant(resource, &m.id))
                    .collect();
            }
        }

        bag.next(&next)?;
        if bag.resource_type_id() != USER_RESOURCE_TYPE {
            annotations.update(Annotation::ETag {
                value: Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
            });
        }

        Ok(Page {
            items: grants,
            next_token: bag.marshal()?,
            annotations,
        })
    }

    /// Role phase: one grant per active group role assignment, with the group
    /// as principal. Missing permission ends the phase without error.
    #[instrument(skip(self, resource, bag), fields(group_id = %resource.id.resource))]
    async fn role_assignment_grants(
        &self,
        resource: &Resource,
        users_count: Option<i64>,
        bag: &mut Bag,
        limit: usize,
    ) -> ConnectorResult<Page<Grant>> {
        let group_id = resource.id.resource.as_str();
        let path = format!("{}/roles", group_path(group_id));
        let query = [
            ("limit", limit.to_string()),
            ("after", bag.page_token().to_string()),
        ];

        let (assignments, ctx) = match self
            .client
            .get::<Vec<GroupRoleAssignment>>(&path, &query)
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_access_denied() => {
                debug!("missing permission to list group roles, skipping role grants");
                bag.next("")?;
                return Ok(Page {
                    items: Vec::new(),
                    next_token: bag.marshal()?,
                    annotations: Annotations::new(),
                });
            }
            Err(e) => return Err(e.context(format!("list roles of group {group_id}"))),
        };

        let expand = users_count.map_or(true, |count| count > 0);
        if !expand {
            debug!("group has no members, role grants are not expandable");
        }
        let member_entitlement_id = entitlement_id(&resource.id, GROUP_MEMBER_SLUG);

        let grants = assignments
            .iter()
            .filter(|a| a.is_active_group_assignment())
            .map(|a| {
                let role = role_resource(&OktaRole {
                    id: a.role.clone(),
                    label: a.label.clone(),
                    role_type: a.role_type.clone(),
                });
                let grant = Grant::new(&role, ROLE_ASSIGNED_SLUG, resource.id.clone());
                if expand {
                    grant.with_annotation(group_role_expansion(member_entitlement_id.clone()))
                } else {
                    grant
                }
            })
            .collect();

        bag.next(&ctx.next_cursor())?;

        Ok(Page {
            items: grants,
            next_token: bag.marshal()?,
            annotations: ctx.annotations(),
        })
    }
}

#[async_trait]
impl ResourceSyncer for GroupSyncer {
    fn resource_type(&self) -> ResourceType {
        group_resource_type()
    }

    async fn list(
        &self,
        _parent: Option<&ResourceId>,
        token: &Token,
    ) -> ConnectorResult<Page<Resource>> {
        let mut bag = Bag::parse(&token.token, PageState::new(GROUP_RESOURCE_TYPE))?;

        let (groups, ctx): (Vec<OktaGroup>, _) = self
            .client
            .get(
                GROUPS_PATH,
                &[
                    ("limit", self.config.page_limit(token).to_string()),
                    ("after", bag.page_token().to_string()),
                    ("expand", "stats".to_string()),
                ],
            )
            .await
            .map_err(|e| e.context("list groups"))?;

        bag.next(&ctx.next_cursor())?;

        Ok(Page {
            items: groups.iter().map(group_resource).collect(),
            next_token: bag.marshal()?,
            annotations: ctx.annotations(),
        })
    }

    async fn entitlements(
        &self,
        resource: &Resource,
        _token: &Token,
    ) -> ConnectorResult<Page<Entitlement>> {
        Ok(Page {
            items: vec![group_member_entitlement(resource)],
            ..Page::empty()
        })
    }

    async fn grants(&self, resource: &Resource, token: &Token) -> ConnectorResult<Page<Grant>> {
        let mut bag = Bag::unmarshal(&token.token)?;
        if bag.is_exhausted() {
            bag.seed(&GROUP_GRANT_PHASES)?;
        }

        let users_count = resource
            .group_trait()?
            .profile
            .get_int(USERS_COUNT_PROFILE_KEY);

        let limit = self.config.page_limit(token);
        let phase = bag.resource_type_id().to_string();
        match phase.as_str() {
            USER_RESOURCE_TYPE => {
                self.user_membership_grants(resource, users_count, &mut bag, limit)
                    .await
            }
            ROLE_RESOURCE_TYPE => {
                self.role_assignment_grants(resource, users_count, &mut bag, limit)
                    .await
            }
            other => Err(ConnectorError::invalid_token(format!(
                "invalid group grant phase: {other}"
            ))),
        }
    }

    async fn get(
        &self,
        resource_id: &ResourceId,
        _parent: Option<&ResourceId>,
    ) -> ConnectorResult<Option<Resource>> {
        debug!(group_id = %resource_id.resource, "getting group");

        match self
            .client
            .get_cached::<OktaGroup>(&group_path(&resource_id.resource), "application/json")
            .await
        {
            Ok((group, _)) => Ok(Some(group_resource(&group))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.context(format!("get group {}", resource_id.resource))),
        }
    }
}

#[async_trait]
impl ResourceProvisioner for GroupSyncer {
    async fn grant(
        &self,
        principal: &Resource,
        entitlement: &Entitlement,
    ) -> ConnectorResult<Annotations> {
        if principal.id.resource_type != USER_RESOURCE_TYPE {
            warn!(
                principal_type = %principal.id.resource_type,
                principal_id = %principal.id.resource,
                "only users can be granted group membership"
            );
            return Err(ConnectorError::policy_violation(
                "only users can be granted group membership",
            ));
        }

        let group_id = &entitlement.resource.resource;
        let user_id = &principal.id.resource;
        let ctx = self
            .client
            .put(&membership_path(group_id, user_id))
            .await
            .map_err(|e| e.context(format!("add user {user_id} to group {group_id}")))?;

        self.client.invalidate_cached(&group_path(group_id));
        info!(status = ctx.status, group_id = %group_id, user_id = %user_id, "membership has been created");
        Ok(ctx.annotations())
    }

    async fn revoke(&self, grant: &Grant) -> ConnectorResult<Annotations> {
        let principal = &grant.principal;
        if principal.resource_type != USER_RESOURCE_TYPE {
            warn!(
                principal_type = %principal.resource_type,
                principal_id = %principal.resource,
                "only users can have group membership revoked"
            );
            return Err(ConnectorError::policy_violation(
                "only users can have group membership revoked",
            ));
        }

        let group_id = &grant.entitlement.resource.resource;
        let user_id = &principal.resource;
        let ctx = self
            .client
            .delete(&membership_path(group_id, user_id))
            .await
            .map_err(|e| e.context(format!("remove user {user_id} from group {group_id}")))?;

        self.client.invalidate_cached(&group_path(group_id));
        info!(status = ctx.status, group_id = %group_id, user_id = %user_id, "membership has been revoked");
        Ok(ctx.annotations())
    }
}
