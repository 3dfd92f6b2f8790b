//! Okta users: CIAM-scoped listing, resource mapping and account creation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use idsync_connector::annotations::Annotation;
use idsync_connector::credentials::{
    generate_random_password, AccountInfo, CreateAccountResult, CredentialDetails,
    CredentialOptions, PlaintextSecret,
};
use idsync_connector::error::{ConnectorError, ConnectorResult};
use idsync_connector::pagination::{Bag, Page, PageState, Token};
use idsync_connector::profile::{Profile, ProfileValue};
use idsync_connector::resource::{
    DetailedStatus, Entitlement, Grant, Resource, ResourceId, ResourceType, UserEmail, UserTrait,
};
use idsync_connector::traits::{AccountManager, ResourceSyncer};

use crate::client::{OktaClient, OMIT_CREDENTIALS_CONTENT_TYPE};
use crate::config::OktaConfig;
use crate::filter;
use crate::types::{user_resource_type, USER_RESOURCE_TYPE};

const USERS_PATH: &str = "/api/v1/users";

/// Profile key holding the unmapped Okta status.
pub const RAW_STATUS_PROFILE_KEY: &str = "c1_okta_raw_user_status";

/// Account profile key for the force-password-change flag.
pub const PASSWORD_CHANGE_REQUIRED_KEY: &str = "password_change_on_login_required";

/// Name of the generated password in the create-account secrets.
pub const PASSWORD_SECRET_NAME: &str = "password";

/// User record as returned by Okta.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OktaUser {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profile: Value,
}

/// Build a user resource.
///
/// The resource profile is the Okta profile plus the raw status. With
/// `skip_secondary_emails` the secondary email is neither listed as an email
/// nor kept in the profile.
pub fn user_resource(user: &OktaUser, skip_secondary_emails: bool) -> Resource {
    let mut profile = Profile::from_json(&user.profile);
    profile.set(RAW_STATUS_PROFILE_KEY, user.status.as_str());

    let display_name = filter::display_name(&profile);

    let mut emails = Vec::new();
    if let Some(email) = profile.get_string("email").filter(|e| !e.is_empty()) {
        emails.push(UserEmail {
            address: email.to_string(),
            is_primary: true,
        });
    }
    if !skip_secondary_emails {
        if let Some(second) = profile.get_string("secondEmail").filter(|e| !e.is_empty()) {
            emails.push(UserEmail {
                address: second.to_string(),
                is_primary: false,
            });
        }
    }
    if skip_secondary_emails {
        profile.set("secondEmail", ProfileValue::Null);
    }

    let login = profile.get_string("login").map(str::to_string);
    let login_aliases = login
        .as_deref()
        .and_then(filter::login_alias)
        .map(|alias| vec![alias.to_string()])
        .unwrap_or_default();

    let user_trait = UserTrait {
        employee_ids: filter::employee_ids(&profile),
        status: Some(DetailedStatus {
            status: filter::map_status(&user.status),
            details: user.status.clone(),
        }),
        emails,
        login,
        login_aliases,
        created_at: user.created,
        last_login: user.last_login,
        profile,
    };

    Resource::user(display_name, &user_resource_type(), user.id.clone(), user_trait)
        .with_annotation(Annotation::RawId {
            id: user.id.clone(),
        })
}

/// Syncer for CIAM users, also handling account creation.
#[derive(Debug)]
pub struct UserSyncer {
    client: Arc<OktaClient>,
    config: Arc<OktaConfig>,
    email_domains: Vec<String>,
}

impl UserSyncer {
    pub fn new(client: Arc<OktaClient>, config: Arc<OktaConfig>) -> Self {
        let email_domains = config.lowered_email_domains();
        Self {
            client,
            config,
            email_domains,
        }
    }

    fn in_scope(&self, user: &OktaUser) -> bool {
        filter::is_in_scope(&Profile::from_json(&user.profile), &self.email_domains)
    }
}

#[async_trait]
impl ResourceSyncer for UserSyncer {
    fn resource_type(&self) -> ResourceType {
        user_resource_type()
    }

    #[instrument(skip(self, token))]
    async fn list(
        &self,
        _parent: Option<&ResourceId>,
        token: &Token,
    ) -> ConnectorResult<Page<Resource>> {
        if self.email_domains.is_empty() {
            debug!("no CIAM email domains configured, skipping user sync");
            return Ok(Page::empty());
        }

        let mut bag = Bag::parse(&token.token, PageState::new(USER_RESOURCE_TYPE))?;

        let (users, ctx): (Vec<OktaUser>, _) = self
            .client
            .get_users(
                USERS_PATH,
                &[
                    ("limit", self.config.page_limit(token).to_string()),
                    ("after", bag.page_token().to_string()),
                    ("search", "status pr".to_string()),
                ],
            )
            .await
            .map_err(|e| e.context("list users"))?;

        bag.next(&ctx.next_cursor())?;

        let total = users.len();
        let items: Vec<Resource> = users
            .iter()
            .filter(|u| self.in_scope(u))
            .map(|u| user_resource(u, self.config.skip_secondary_emails))
            .collect();
        debug!(total, in_scope = items.len(), "listed users");

        Ok(Page {
            items,
            next_token: bag.marshal()?,
            annotations: ctx.annotations(),
        })
    }

    async fn entitlements(
        &self,
        _resource: &Resource,
        _token: &Token,
    ) -> ConnectorResult<Page<Entitlement>> {
        Ok(Page::empty())
    }

    async fn grants(&self, _resource: &Resource, _token: &Token) -> ConnectorResult<Page<Grant>> {
        Ok(Page::empty())
    }

    #[instrument(skip(self, _parent), fields(user_id = %resource_id.resource))]
    async fn get(
        &self,
        resource_id: &ResourceId,
        _parent: Option<&ResourceId>,
    ) -> ConnectorResult<Option<Resource>> {
        if self.email_domains.is_empty() {
            return Ok(None);
        }

        let path = format!("{USERS_PATH}/{}", urlencoding::encode(&resource_id.resource));
        let user = match self
            .client
            .get_cached::<OktaUser>(&path, OMIT_CREDENTIALS_CONTENT_TYPE)
            .await
        {
            Ok((user, _)) => user,
            Err(e) if e.is_not_found() => {
                debug!("user not found");
                return Ok(None);
            }
            Err(e) => return Err(e.context(format!("get user {}", resource_id.resource))),
        };

        if !self.in_scope(&user) {
            debug!("user is outside the configured email domains");
            return Ok(None);
        }

        Ok(Some(user_resource(
            &user,
            self.config.skip_secondary_emails,
        )))
    }
}

/// Okta profile for a new account from the caller's account info.
fn new_user_profile(info: &AccountInfo) -> ConnectorResult<Value> {
    let required = |key: &str| {
        info.profile
            .get(key)
            .map(ProfileValue::to_json)
            .ok_or_else(|| ConnectorError::validation(format!("missing {key} in account info")))
    };

    let first_name = required("first_name")?;
    let last_name = required("last_name")?;
    let email = required("email")?;
    let login = info
        .profile
        .get("login")
        .map_or_else(|| email.clone(), ProfileValue::to_json);

    Ok(json!({
        "firstName": first_name,
        "lastName": last_name,
        "email": email,
        "login": login,
    }))
}

/// Boolean parsing with the spellings Okta integrations commonly send.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Whether the new account must change its password at first login.
fn password_change_required(info: &AccountInfo) -> ConnectorResult<bool> {
    match info.profile.get(PASSWORD_CHANGE_REQUIRED_KEY) {
        None | Some(ProfileValue::Null) => Ok(false),
        Some(ProfileValue::Bool(b)) => Ok(*b),
        Some(ProfileValue::String(s)) => parse_bool(s).ok_or_else(|| {
            ConnectorError::validation(format!(
                "invalid {PASSWORD_CHANGE_REQUIRED_KEY} value: {s:?}"
            ))
        }),
        Some(_) => Err(ConnectorError::validation(format!(
            "{PASSWORD_CHANGE_REQUIRED_KEY} must be a boolean or a string"
        ))),
    }
}

/// Query parameters of the create-user call. Only random-password accounts
/// consult the force-change flag.
fn account_creation_query(
    info: &AccountInfo,
    options: &CredentialOptions,
) -> ConnectorResult<Vec<(&'static str, String)>> {
    match options {
        CredentialOptions::NoPassword => Ok(Vec::new()),
        CredentialOptions::RandomPassword { .. } => {
            if password_change_required(info)? {
                Ok(vec![
                    ("nextLogin", "changePassword".to_string()),
                    ("activate", "true".to_string()),
                ])
            } else {
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl AccountManager for UserSyncer {
    #[instrument(skip(self, info), fields(credential_option = options.as_str()))]
    async fn create_account(
        &self,
        info: &AccountInfo,
        options: &CredentialOptions,
    ) -> ConnectorResult<CreateAccountResult> {
        let profile = new_user_profile(info)?;
        let query = account_creation_query(info, options)?;

        let password = match options {
            CredentialOptions::NoPassword => None,
            CredentialOptions::RandomPassword { length } => {
                Some(generate_random_password(*length)?)
            }
        };

        let mut body = Map::new();
        body.insert("profile".to_string(), profile);
        if let Some(password) = &password {
            body.insert(
                "credentials".to_string(),
                json!({ "password": { "value": password } }),
            );
        }

        let (user, ctx): (OktaUser, _) = self
            .client
            .post(USERS_PATH, &query, &Value::Object(body))
            .await
            .map_err(|e| e.context("create user"))?;

        info!(user_id = %user.id, status = ctx.status, "account has been created");

        Ok(CreateAccountResult {
            resource: user_resource(&user, self.config.skip_secondary_emails),
            secrets: password
                .map(|p| PlaintextSecret::new(PASSWORD_SECRET_NAME, p))
                .into_iter()
                .collect(),
        })
    }

    fn create_account_capability_details(&self) -> CredentialDetails {
        CredentialDetails {
            supported: vec![
                CredentialOptions::NoPassword.as_str().to_string(),
                CredentialOptions::RandomPassword { length: 0 }
                    .as_str()
                    .to_string(),
            ],
            preferred: CredentialOptions::NoPassword.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idsync_connector::resource::UserStatus;

    fn okta_user(value: Value) -> OktaUser {
        serde_json::from_value(value).unwrap()
    }

    fn jane() -> OktaUser {
        okta_user(json!({
            "id": "00u1",
            "status": "ACTIVE",
            "created": "2024-01-02T03:04:05.000Z",
            "lastLogin": null,
            "profile": {
                "firstName": "Jane",
                "lastName": "Doe",
                "email": "jane@acme.com",
                "secondEmail": "jd@personal.com",
                "login": "jane@acme.com",
                "employeeNumber": "E-7"
            }
        }))
    }

    #[test]
    fn test_user_resource_mapping() {
        let resource = user_resource(&jane(), false);
        assert_eq!(resource.id, ResourceId::new("user", "00u1"));
        assert_eq!(resource.display_name, "Jane Doe");

        let t = resource.user_trait().unwrap();
        assert_eq!(t.primary_email(), Some("jane@acme.com"));
        assert_eq!(t.emails.len(), 2);
        assert_eq!(t.login.as_deref(), Some("jane@acme.com"));
        assert_eq!(t.login_aliases, vec!["jane"]);
        assert_eq!(t.employee_ids, vec!["E-7"]);
        assert!(t.created_at.is_some());
        assert!(t.last_login.is_none());

        let status = t.status.as_ref().unwrap();
        assert_eq!(status.status, UserStatus::Enabled);
        assert_eq!(status.details, "ACTIVE");
        assert_eq!(t.profile.get_string(RAW_STATUS_PROFILE_KEY), Some("ACTIVE"));
        assert!(resource
            .annotations
            .contains(|a| matches!(a, Annotation::RawId { id } if id == "00u1")));
    }

    #[test]
    fn test_skip_secondary_emails_nulls_profile() {
        let resource = user_resource(&jane(), true);
        let t = resource.user_trait().unwrap();
        assert_eq!(t.emails.len(), 1);
        assert_eq!(t.profile.get("secondEmail"), Some(&ProfileValue::Null));
    }

    #[test]
    fn test_new_user_profile_defaults_login_to_email() {
        let info = AccountInfo::new(
            Profile::new()
                .with("first_name", "Jane")
                .with("last_name", "Doe")
                .with("email", "jane@acme.com"),
        );
        let profile = new_user_profile(&info).unwrap();
        assert_eq!(profile["login"], "jane@acme.com");
        assert_eq!(profile["firstName"], "Jane");
    }

    #[test]
    fn test_new_user_profile_names_missing_field() {
        let info = AccountInfo::new(Profile::new().with("first_name", "Jane"));
        let err = new_user_profile(&info).unwrap_err();
        assert!(matches!(err, ConnectorError::Validation { .. }));
        assert!(err.to_string().contains("last_name"));
    }

    #[test]
    fn test_password_change_flag_parsing() {
        let with = |v: ProfileValue| {
            AccountInfo::new(Profile::new().with(PASSWORD_CHANGE_REQUIRED_KEY, v))
        };

        assert!(password_change_required(&with(ProfileValue::Bool(true))).unwrap());
        assert!(password_change_required(&with("True".into())).unwrap());
        assert!(!password_change_required(&with("0".into())).unwrap());
        assert!(!password_change_required(&with(ProfileValue::Null)).unwrap());
        assert!(!password_change_required(&AccountInfo::default()).unwrap());
        assert!(password_change_required(&with("yes".into())).is_err());
        assert!(password_change_required(&with(ProfileValue::Int(1))).is_err());
    }

    #[test]
    fn test_query_only_for_random_password() {
        let info = AccountInfo::new(Profile::new().with(PASSWORD_CHANGE_REQUIRED_KEY, true));

        assert!(account_creation_query(&info, &CredentialOptions::NoPassword)
            .unwrap()
            .is_empty());

        let query =
            account_creation_query(&info, &CredentialOptions::RandomPassword { length: 12 })
                .unwrap();
        assert_eq!(
            query,
            vec![
                ("nextLogin", "changePassword".to_string()),
                ("activate", "true".to_string()),
            ]
        );

        let invalid = AccountInfo::new(Profile::new().with(PASSWORD_CHANGE_REQUIRED_KEY, 3_i64));
        assert!(account_creation_query(&invalid, &CredentialOptions::NoPassword).is_ok());
    }
}
