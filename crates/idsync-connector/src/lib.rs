//! # Identity Sync Connector Framework
//!
//! Core abstractions for syncing identity data from an upstream provider into
//! a normalized resource / entitlement / grant catalog.
//!
//! ## Architecture
//!
//! - [`ResourceSyncer`] - Lists resources, entitlements and grants of one type
//! - [`ResourceProvisioner`] - Grants and revokes entitlements
//! - [`AccountManager`] - Creates accounts
//! - [`Connector`] - Validation, metadata and advertised resource types
//!
//! Listings are paged. A page carries an opaque token the caller hands back
//! unchanged; multi-stage listings keep their progress in a [`Bag`].
//!
//! ## Crate Organization
//!
//! - [`resource`] - Resource types, resources, entitlements, grants
//! - [`profile`] - Typed key/value profile store
//! - [`annotations`] - Side-channel metadata (rate limits, etags, hints)
//! - [`pagination`] - Page tokens and the pagination bag
//! - [`credentials`] - Account creation inputs and password generation
//! - [`error`] - Error types with permanent/transient classification
//! - [`traits`] - Connector capability traits
//!
//! [`ResourceSyncer`]: traits::ResourceSyncer
//! [`ResourceProvisioner`]: traits::ResourceProvisioner
//! [`AccountManager`]: traits::AccountManager
//! [`Connector`]: traits::Connector
//! [`Bag`]: pagination::Bag

pub mod annotations;
pub mod credentials;
pub mod error;
pub mod pagination;
pub mod profile;
pub mod resource;
pub mod traits;

pub use async_trait::async_trait;

/// Prelude module for convenient imports.
///
/// ```
/// use idsync_connector::prelude::*;
/// ```
pub mod prelude {
    // Catalog
    pub use crate::resource::{
        entitlement_id, DetailedStatus, Entitlement, EntitlementPurpose, Grant, GroupTrait,
        Resource, ResourceId, ResourceTrait, ResourceTraits, ResourceType, RoleTrait, UserEmail,
        UserStatus, UserTrait,
    };

    // Profiles and annotations
    pub use crate::annotations::{Annotation, Annotations, RateLimitDescription};
    pub use crate::profile::{Profile, ProfileValue};

    // Pagination
    pub use crate::pagination::{Bag, Page, PageState, Token, DEFAULT_PAGE_SIZE};

    // Credentials
    pub use crate::credentials::{
        generate_random_password, AccountInfo, CreateAccountResult, CredentialDetails,
        CredentialOptions, PlaintextSecret,
    };

    // Error handling
    pub use crate::error::{ConnectorError, ConnectorResult};

    // Traits
    pub use crate::traits::{
        AccountCreationField, AccountCreationSchema, AccountManager, Connector,
        ConnectorMetadata, FieldKind, ResourceChangeEvent, ResourceProvisioner, ResourceSyncer,
    };
}
