//! Okta CIAM Connector for idsync
//!
//! This crate implements the idsync-connector traits for Okta, syncing
//! customer identities scoped by email domain, groups with their memberships
//! and role assignments, and administrator roles.
//!
//! # Features
//!
//! - CIAM user sync filtered by email domain (default-deny)
//! - Group sync with member counts and multi-phase grant reconciliation
//! - Standard and custom administrator roles with per-user role flags
//! - Group membership provisioning and account creation (opt-in)
//! - System log event mapping for incremental refresh
//!
//! # Example
//!
//! ```no_run
//! use idsync_connector::pagination::Token;
//! use idsync_connector::traits::{Connector, ResourceSyncer};
//! use idsync_connector_okta::{OktaConfig, OktaConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OktaConfig::new("acme.okta.com")
//!     .with_api_token("00abc...")
//!     .with_ciam_email_domains(["acme.com"]);
//!
//! let connector = OktaConnector::new(config)?;
//! connector.validate().await?;
//!
//! let page = connector
//!     .user_syncer()
//!     .list(None, &Token::first_page(100))
//!     .await?;
//! println!("{} users, more: {}", page.items.len(), !page.is_last());
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod config;
mod connector;
mod error;
mod response;

pub mod events;
pub mod filter;
pub mod group;
pub mod role;
pub mod types;
pub mod user;

// Re-exports
pub use cache::{ResponseCache, RoleFlagCache};
pub use client::{OktaClient, OMIT_CREDENTIALS_CONTENT_TYPE};
pub use config::{OktaConfig, MAX_PAGE_SIZE};
pub use connector::OktaConnector;
pub use error::{OktaError, OktaResult};
pub use events::{map_event, EventFilter, LogEvent, LogTarget, USER_LIFECYCLE_FILTER};
pub use group::{GroupSyncer, OktaGroup, GROUP_GRANT_PHASES};
pub use response::{
    after_param, next_cursor, rate_limit, ErrorCodeClass, OktaApiError, ResponseContext,
    ACCESS_DENIED_ERROR_CODE, ALREADY_ASSIGNED_ERROR_CODE, NOT_FOUND_ERROR_CODE,
    RATE_LIMIT_ERROR_CODE, RESOURCE_NOT_FOUND_ERROR_CODE,
};
pub use role::{AdministratorRoleFlags, OktaRole, RoleSyncer, StandardRole, STANDARD_ROLES};
pub use user::{OktaUser, UserSyncer};
