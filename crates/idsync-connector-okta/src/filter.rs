//! CIAM identity filter and derived user attributes.
//!
//! A user is in scope when one of its email-like profile values belongs to a
//! configured domain. With no domains configured nobody is in scope.

use std::collections::BTreeSet;

use idsync_connector::profile::Profile;
use idsync_connector::resource::UserStatus;

const UNKNOWN_PROFILE_VALUE: &str = "unknown";

const EMPLOYEE_ID_KEYS: [&str; 6] = [
    "employeenumber",
    "employeeid",
    "employeeidnumber",
    "employee_number",
    "employee_id",
    "employee_idnumber",
];

/// Email-like values considered for scoping: `email`, `secondEmail`, and
/// `login` when it looks like an address.
pub fn candidate_emails(profile: &Profile) -> Vec<&str> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(email) = profile.get_string("email") {
        candidates.push(email);
    }
    if let Some(second) = profile.get_string("secondEmail") {
        candidates.push(second);
    }
    if let Some(login) = profile.get_string("login") {
        if login.contains('@') {
            candidates.push(login);
        }
    }
    candidates
}

/// Whether any of `emails` belongs to one of `allowed_domains`.
///
/// `allowed_domains` must already be lowercased.
pub fn matches_domains(emails: &[&str], allowed_domains: &[String]) -> bool {
    allowed_domains.iter().any(|domain| {
        let suffix = format!("@{domain}");
        emails
            .iter()
            .any(|email| email.to_lowercase().ends_with(&suffix))
    })
}

/// Whether the user with `profile` is in CIAM scope.
pub fn is_in_scope(profile: &Profile, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return false;
    }
    matches_domains(&candidate_emails(profile), allowed_domains)
}

/// `(first, last)` name with "unknown" fallbacks.
pub fn user_name(profile: &Profile) -> (&str, &str) {
    (
        profile
            .get_string("firstName")
            .unwrap_or(UNKNOWN_PROFILE_VALUE),
        profile
            .get_string("lastName")
            .unwrap_or(UNKNOWN_PROFILE_VALUE),
    )
}

/// `displayName`, or "first last".
pub fn display_name(profile: &Profile) -> String {
    match profile.get_string("displayName") {
        Some(name) => name.to_string(),
        None => {
            let (first, last) = user_name(profile);
            format!("{first} {last}")
        }
    }
}

/// Short login alias: the local part when the login splits into exactly two
/// parts around `@`.
pub fn login_alias(login: &str) -> Option<&str> {
    let mut parts = login.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(_), None) => Some(local),
        _ => None,
    }
}

/// Employee ids found under any of the known key spellings, deduplicated and
/// sorted.
pub fn employee_ids(profile: &Profile) -> Vec<String> {
    profile
        .iter()
        .filter(|(key, _)| EMPLOYEE_ID_KEYS.contains(&key.to_lowercase().as_str()))
        .filter_map(|(_, value)| value.as_str())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Map a raw Okta user status.
pub fn map_status(raw: &str) -> UserStatus {
    match raw {
        "SUSPENDED" | "DEPROVISIONED" => UserStatus::Disabled,
        "ACTIVE" | "PROVISIONED" | "STAGED" | "PASSWORD_EXPIRED" | "RECOVERY" | "LOCKED_OUT" => {
            UserStatus::Enabled
        }
        _ => UserStatus::Unspecified,
    }
}
