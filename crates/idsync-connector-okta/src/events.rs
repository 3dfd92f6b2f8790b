//! System log event mapping.
//!
//! Okta system log events are matched against a fixed set of filters. A
//! matching event becomes a resource-change notification so the host can
//! refresh a single resource instead of running a full sync.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use idsync_connector::error::{ConnectorError, ConnectorResult};
use idsync_connector::profile::Profile;
use idsync_connector::resource::ResourceId;
use idsync_connector::traits::ResourceChangeEvent;

use crate::types::USER_RESOURCE_TYPE;

const USER_TARGET_TYPE: &str = "User";

/// One entry of the Okta system log.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub uuid: String,
    pub event_type: String,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub target: Vec<LogTarget>,
}

/// An entity an event acted on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogTarget {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub alternate_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<LogTarget>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<LogTarget>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Targets of an event grouped by target type.
pub type TargetMap<'a> = HashMap<&'a str, Vec<&'a LogTarget>>;

type EventHandler = fn(&LogEvent, &TargetMap<'_>) -> ConnectorResult<ResourceChangeEvent>;

/// Maps events of some types, acting on targets of some types.
#[derive(Clone, Copy)]
pub struct EventFilter {
    pub event_types: &'static [&'static str],
    pub target_types: &'static [&'static str],
    handler: EventHandler,
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFilter")
            .field("event_types", &self.event_types)
            .field("target_types", &self.target_types)
            .finish_non_exhaustive()
    }
}

impl EventFilter {
    /// Whether the filter applies to `event`.
    pub fn matches(&self, event: &LogEvent) -> bool {
        self.event_types.contains(&event.event_type.as_str())
            && event
                .target
                .iter()
                .any(|t| self.target_types.contains(&t.target_type.as_str()))
    }

    /// Map a matching event.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the event does not have the targets the
    /// filter expects.
    pub fn handle(&self, event: &LogEvent) -> ConnectorResult<ResourceChangeEvent> {
        let mut targets: TargetMap<'_> = HashMap::new();
        for target in &event.target {
            if self.target_types.contains(&target.target_type.as_str()) {
                targets
                    .entry(target.target_type.as_str())
                    .or_default()
                    .push(target);
            }
        }
        (self.handler)(event, &targets)
    }
}

fn event_details(event: &LogEvent) -> Profile {
    let mut details = Profile::new().with("event_type", event.event_type.as_str());
    if let Some(published) = event.published {
        details.set(
            "published",
            published.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    }
    details
}

fn user_lifecycle_event(
    event: &LogEvent,
    targets: &TargetMap<'_>,
) -> ConnectorResult<ResourceChangeEvent> {
    let users = targets.get(USER_TARGET_TYPE).map_or(&[][..], Vec::as_slice);
    let [user] = users else {
        return Err(ConnectorError::validation(format!(
            "expected 1 User target, got {}",
            users.len()
        )));
    };

    Ok(ResourceChangeEvent {
        event_id: event.uuid.clone(),
        resource_id: ResourceId::new(USER_RESOURCE_TYPE, user.id.as_str()),
        details: event_details(event),
    })
}

/// User creation, activation and profile updates.
pub const USER_LIFECYCLE_FILTER: EventFilter = EventFilter {
    event_types: &[
        "user.lifecycle.create",
        "user.lifecycle.activate",
        "user.account.update_profile",
    ],
    target_types: &[USER_TARGET_TYPE],
    handler: user_lifecycle_event,
};

/// Every filter, in evaluation order.
pub const EVENT_FILTERS: [EventFilter; 1] = [USER_LIFECYCLE_FILTER];

/// Map `event` through the first matching filter. Events no filter matches
/// map to `None`.
///
/// # Errors
///
/// Returns the matching filter's error.
pub fn map_event(event: &LogEvent) -> ConnectorResult<Option<ResourceChangeEvent>> {
    EVENT_FILTERS
        .iter()
        .find(|f| f.matches(event))
        .map(|f| f.handle(event))
        .transpose()
}
