//! Resource types synced from Okta.

use idsync_connector::annotations::Annotation;
use idsync_connector::resource::{ResourceTrait, ResourceType};

pub const USER_RESOURCE_TYPE: &str = "user";
pub const GROUP_RESOURCE_TYPE: &str = "group";
pub const ROLE_RESOURCE_TYPE: &str = "role";

/// Users carry no entitlements of their own.
pub fn user_resource_type() -> ResourceType {
    ResourceType::new(USER_RESOURCE_TYPE, "User", ResourceTrait::User)
        .with_annotation(Annotation::SkipEntitlementsAndGrants)
}

pub fn group_resource_type() -> ResourceType {
    ResourceType::new(GROUP_RESOURCE_TYPE, "Group", ResourceTrait::Group)
}

pub fn role_resource_type() -> ResourceType {
    ResourceType::new(ROLE_RESOURCE_TYPE, "Role", ResourceTrait::Role)
}
