//! Catalog types: resource types, resources, entitlements and grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::annotations::{Annotation, Annotations};
use crate::error::{ConnectorError, ConnectorResult};
use crate::profile::Profile;

/// Trait a resource type advertises to the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTrait {
    User,
    Group,
    Role,
}

impl ResourceTrait {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTrait::User => "user",
            ResourceTrait::Group => "group",
            ResourceTrait::Role => "role",
        }
    }
}

impl fmt::Display for ResourceTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceTrait {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ResourceTrait::User),
            "group" => Ok(ResourceTrait::Group),
            "role" => Ok(ResourceTrait::Role),
            other => Err(ConnectorError::validation(format!(
                "unknown resource trait: {other}"
            ))),
        }
    }
}

/// A kind of resource the connector syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: String,
    pub display_name: String,
    pub traits: Vec<ResourceTrait>,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl ResourceType {
    /// Create a resource type with a single trait.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, t: ResourceTrait) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            traits: vec![t],
            annotations: Annotations::new(),
        }
    }

    /// Attach an annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.update(annotation);
        self
    }
}

/// Identity of a resource: `(resource type, upstream id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub resource_type: String,
    pub resource: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource)
    }
}

/// Normalized account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Unspecified,
    Enabled,
    Disabled,
    Deleted,
}

/// Status plus the raw upstream status string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedStatus {
    pub status: UserStatus,
    pub details: String,
}

/// An email address attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEmail {
    pub address: String,
    pub is_primary: bool,
}

/// User-specific attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserTrait {
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<UserEmail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub login_aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub employee_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DetailedStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserTrait {
    /// Primary email, if any.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.is_primary)
            .map(|e| e.address.as_str())
    }
}

/// Group-specific attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupTrait {
    pub profile: Profile,
}

/// Role-specific attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleTrait {
    pub profile: Profile,
}

/// Type-specific attributes of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trait", rename_all = "lowercase")]
pub enum ResourceTraits {
    User(UserTrait),
    Group(GroupTrait),
    Role(RoleTrait),
}

impl ResourceTraits {
    /// The profile of whichever trait is present.
    pub fn profile(&self) -> &Profile {
        match self {
            ResourceTraits::User(t) => &t.profile,
            ResourceTraits::Group(t) => &t.profile,
            ResourceTraits::Role(t) => &t.profile,
        }
    }
}

/// A normalized catalog entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceId>,
    pub traits: ResourceTraits,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl Resource {
    /// Create a user resource.
    pub fn user(
        display_name: impl Into<String>,
        resource_type: &ResourceType,
        id: impl Into<String>,
        user_trait: UserTrait,
    ) -> Self {
        Self::with_traits(display_name, resource_type, id, ResourceTraits::User(user_trait))
    }

    /// Create a group resource.
    pub fn group(
        display_name: impl Into<String>,
        resource_type: &ResourceType,
        id: impl Into<String>,
        profile: Profile,
    ) -> Self {
        Self::with_traits(
            display_name,
            resource_type,
            id,
            ResourceTraits::Group(GroupTrait { profile }),
        )
    }

    /// Create a role resource.
    pub fn role(
        display_name: impl Into<String>,
        resource_type: &ResourceType,
        id: impl Into<String>,
        profile: Profile,
    ) -> Self {
        Self::with_traits(
            display_name,
            resource_type,
            id,
            ResourceTraits::Role(RoleTrait { profile }),
        )
    }

    fn with_traits(
        display_name: impl Into<String>,
        resource_type: &ResourceType,
        id: impl Into<String>,
        traits: ResourceTraits,
    ) -> Self {
        Self {
            id: ResourceId::new(resource_type.id.clone(), id),
            display_name: display_name.into(),
            parent: None,
            traits,
            annotations: Annotations::new(),
        }
    }

    /// Attach an annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.update(annotation);
        self
    }

    /// The user trait.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the resource is not a user.
    pub fn user_trait(&self) -> ConnectorResult<&UserTrait> {
        match &self.traits {
            ResourceTraits::User(t) => Ok(t),
            _ => Err(ConnectorError::validation(format!(
                "resource {} has no user trait",
                self.id
            ))),
        }
    }

    /// The group trait.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the resource is not a group.
    pub fn group_trait(&self) -> ConnectorResult<&GroupTrait> {
        match &self.traits {
            ResourceTraits::Group(t) => Ok(t),
            _ => Err(ConnectorError::validation(format!(
                "resource {} has no group trait",
                self.id
            ))),
        }
    }

    /// The role trait.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the resource is not a role.
    pub fn role_trait(&self) -> ConnectorResult<&RoleTrait> {
        match &self.traits {
            ResourceTraits::Role(t) => Ok(t),
            _ => Err(ConnectorError::validation(format!(
                "resource {} has no role trait",
                self.id
            ))),
        }
    }
}

/// What an entitlement represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementPurpose {
    /// Membership-style access ("member", "assigned").
    #[default]
    Assignment,
    /// A permission on the resource.
    Permission,
}

/// A capability attached to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    /// `"{resource type}:{resource id}:{slug}"`.
    pub id: String,
    pub resource: ResourceId,
    pub slug: String,
    pub display_name: String,
    pub description: String,
    pub purpose: EntitlementPurpose,
    /// Resource type ids that may hold this entitlement.
    pub grantable_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl Entitlement {
    /// Create an assignment entitlement on `resource`.
    pub fn assignment(resource: &Resource, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            id: entitlement_id(&resource.id, &slug),
            resource: resource.id.clone(),
            display_name: slug.clone(),
            description: String::new(),
            slug,
            purpose: EntitlementPurpose::Assignment,
            grantable_to: Vec::new(),
            annotations: Annotations::new(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_grantable_to(mut self, resource_type: &ResourceType) -> Self {
        self.grantable_to.push(resource_type.id.clone());
        self
    }
}

/// Build an entitlement id from a resource id and slug.
pub fn entitlement_id(resource: &ResourceId, slug: &str) -> String {
    format!("{}:{}:{}", resource.resource_type, resource.resource, slug)
}

/// Assertion that `principal` holds `entitlement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// `"{entitlement id}:{principal type}:{principal id}"`.
    pub id: String,
    pub entitlement: Entitlement,
    pub principal: ResourceId,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl Grant {
    /// Create a grant of `resource`'s `slug` entitlement to `principal`.
    pub fn new(resource: &Resource, slug: &str, principal: ResourceId) -> Self {
        let entitlement = Entitlement::assignment(resource, slug);
        Self {
            id: format!(
                "{}:{}:{}",
                entitlement.id, principal.resource_type, principal.resource
            ),
            entitlement,
            principal,
            annotations: Annotations::new(),
        }
    }

    /// Attach an annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.update(annotation);
        self
    }

    /// Whether the grant carries an expansion hint.
    pub fn is_expandable(&self) -> bool {
        self.annotations.grant_expandable().is_some()
    }
}
