//! Resumable multi-stage pagination.
//!
//! A [`Bag`] is a stack of [`PageState`] frames, one per upstream sub-listing.
//! The top frame is the active listing; it is popped once its cursor runs
//! out, handing control to the frame below. The whole stack travels to the
//! caller as an opaque string so no session state lives in the connector.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::annotations::Annotations;
use crate::error::{ConnectorError, ConnectorResult};

/// Default page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Page request handed in by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    /// Requested page size; 0 means "connector default".
    pub size: usize,
    /// Opaque token returned by the previous call, empty for the first page.
    pub token: String,
}

impl Token {
    /// Create a token for the first page.
    pub fn first_page(size: usize) -> Self {
        Self {
            size,
            token: String::new(),
        }
    }

    /// Create a token continuing from a previous page.
    pub fn resume(size: usize, token: impl Into<String>) -> Self {
        Self {
            size,
            token: token.into(),
        }
    }

    /// Effective page size, falling back to `default` when unset.
    pub fn size_or(&self, default: usize) -> usize {
        if self.size == 0 {
            default
        } else {
            self.size
        }
    }
}

/// One page of results plus the token for the next call.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Empty when the listing is complete.
    pub next_token: String,
    pub annotations: Annotations,
}

impl<T> Page<T> {
    /// A final page with no items.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_token: String::new(),
            annotations: Annotations::new(),
        }
    }

    /// Whether the caller should stop paging.
    pub fn is_last(&self) -> bool {
        self.next_token.is_empty()
    }
}

/// Continuation state for one sub-listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    /// Resource type this frame lists.
    #[serde(rename = "type")]
    pub resource_type_id: String,
    /// Upstream cursor; empty means "start" for a fresh frame.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Optional parent resource the listing is scoped to.
    #[serde(default, rename = "id", skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
}

impl PageState {
    /// A fresh frame for `resource_type_id`.
    pub fn new(resource_type_id: impl Into<String>) -> Self {
        Self {
            resource_type_id: resource_type_id.into(),
            token: String::new(),
            resource_id: String::new(),
        }
    }

    /// Scope the frame to a parent resource.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = resource_id.into();
        self
    }
}

/// Stack of page states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bag {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    states: Vec<PageState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current: Option<PageState>,
}

impl Bag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a token, starting at `initial` when the token carries no
    /// active frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the token cannot be decoded.
    pub fn parse(token: &str, initial: PageState) -> ConnectorResult<Self> {
        let mut bag = Self::unmarshal(token)?;
        if bag.current.is_none() {
            bag.push(initial)?;
        }
        Ok(bag)
    }

    /// Decode a token produced by [`Bag::marshal`]. Empty input is an empty bag.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` for corrupt, truncated or foreign tokens, and for
    /// tokens holding two frames of the same resource type.
    pub fn unmarshal(token: &str) -> ConnectorResult<Self> {
        if token.is_empty() {
            return Ok(Self::new());
        }

        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|e| {
            warn!(error = %e, "Rejected page token");
            ConnectorError::invalid_token(format!("not base64: {e}"))
        })?;
        let bag: Bag = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, "Rejected page token");
            ConnectorError::invalid_token(format!("bad page state: {e}"))
        })?;

        let mut seen: Vec<&str> = Vec::with_capacity(bag.states.len() + 1);
        for state in bag.states.iter().chain(bag.current.iter()) {
            if seen.contains(&state.resource_type_id.as_str()) {
                return Err(ConnectorError::invalid_token(format!(
                    "duplicate frame for resource type '{}'",
                    state.resource_type_id
                )));
            }
            seen.push(&state.resource_type_id);
        }

        Ok(bag)
    }

    /// Seed an empty bag from a priority list: `phases[0]` is drained first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if `phases` repeats a resource type.
    pub fn seed(&mut self, phases: &[&str]) -> ConnectorResult<()> {
        for phase in phases.iter().rev() {
            self.push(PageState::new(*phase))?;
        }
        Ok(())
    }

    /// The active frame.
    pub fn current(&self) -> Option<&PageState> {
        self.current.as_ref()
    }

    /// Resource type of the active frame, empty when exhausted.
    pub fn resource_type_id(&self) -> &str {
        self.current
            .as_ref()
            .map_or("", |s| s.resource_type_id.as_str())
    }

    /// Upstream cursor of the active frame, empty when starting or exhausted.
    pub fn page_token(&self) -> &str {
        self.current.as_ref().map_or("", |s| s.token.as_str())
    }

    /// Make `state` the active frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if a frame for the same resource type is already
    /// on the stack.
    pub fn push(&mut self, state: PageState) -> ConnectorResult<()> {
        let duplicate = self
            .states
            .iter()
            .chain(self.current.iter())
            .any(|s| s.resource_type_id == state.resource_type_id);
        if duplicate {
            return Err(ConnectorError::invalid_token(format!(
                "frame for resource type '{}' already active",
                state.resource_type_id
            )));
        }

        if let Some(current) = self.current.take() {
            self.states.push(current);
        }
        self.current = Some(state);
        Ok(())
    }

    /// Drop the active frame, returning it.
    pub fn pop(&mut self) -> Option<PageState> {
        let popped = self.current.take();
        self.current = self.states.pop();
        if let Some(state) = &popped {
            trace!(resource_type = %state.resource_type_id, "Page state drained");
        }
        popped
    }

    /// Advance the active frame: an empty cursor pops it, otherwise the
    /// cursor is stored in place.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if there is no active frame.
    pub fn next(&mut self, cursor: &str) -> ConnectorResult<()> {
        if self.current.is_none() {
            return Err(ConnectorError::invalid_token("no active page state"));
        }

        if cursor.is_empty() {
            self.pop();
        } else if let Some(current) = self.current.as_mut() {
            current.token = cursor.to_string();
        }
        Ok(())
    }

    /// Whether every frame has been drained.
    pub fn is_exhausted(&self) -> bool {
        self.current.is_none()
    }

    /// Encode the bag. An exhausted bag encodes to the empty string.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the state cannot be encoded.
    pub fn marshal(&self) -> ConnectorResult<String> {
        if self.current.is_none() {
            return Ok(String::new());
        }

        let json = serde_json::to_vec(self)
            .map_err(|e| ConnectorError::serialization(format!("page state: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_token_starts_at_initial() {
        let bag = Bag::parse("", PageState::new("user")).unwrap();
        assert_eq!(bag.resource_type_id(), "user");
        assert_eq!(bag.page_token(), "");
    }

    #[test]
    fn test_next_updates_then_pops() {
        let mut bag = Bag::parse("", PageState::new("group")).unwrap();

        bag.next("00gabc").unwrap();
        assert_eq!(bag.page_token(), "00gabc");

        bag.next("").unwrap();
        assert!(bag.is_exhausted());
        assert_eq!(bag.marshal().unwrap(), "");
    }

    #[test]
    fn test_round_trip_preserves_stack() {
        let mut bag = Bag::new();
        bag.seed(&["user", "role"]).unwrap();
        bag.next("00u42").unwrap();

        let token = bag.marshal().unwrap();
        let restored = Bag::unmarshal(&token).unwrap();
        assert_eq!(restored, bag);
        assert_eq!(restored.resource_type_id(), "user");
        assert_eq!(restored.page_token(), "00u42");
    }

    #[test]
    fn test_seed_drains_in_priority_order() {
        let mut bag = Bag::new();
        bag.seed(&["user", "role"]).unwrap();

        assert_eq!(bag.resource_type_id(), "user");
        bag.next("").unwrap();
        assert_eq!(bag.resource_type_id(), "role");
        bag.next("").unwrap();
        assert!(bag.is_exhausted());
    }

    #[test]
    fn test_push_rejects_duplicate_frame() {
        let mut bag = Bag::new();
        bag.push(PageState::new("role")).unwrap();
        bag.push(PageState::new("user")).unwrap();

        let err = bag.push(PageState::new("role")).unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidToken { .. }));
    }

    #[test]
    fn test_corrupt_tokens_are_invalid() {
        // "bm90IGpzb24" is base64 for "not json".
        for token in ["!!!not-base64", "bm90IGpzb24"] {
            assert!(matches!(
                Bag::unmarshal(token),
                Err(ConnectorError::InvalidToken { .. })
            ));
        }

        // "e30" is "{}": a valid, exhausted bag.
        assert!(Bag::unmarshal("e30").unwrap().is_exhausted());
    }

    #[test]
    fn test_truncated_token_is_invalid() {
        let mut bag = Bag::new();
        bag.seed(&["user", "role"]).unwrap();
        let token = bag.marshal().unwrap();

        let truncated = &token[..token.len() / 2];
        assert!(matches!(
            Bag::unmarshal(truncated),
            Err(ConnectorError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_unmarshal_rejects_duplicate_frames() {
        let json = r#"{"states":[{"type":"user"}],"current":{"type":"user","token":"x"}}"#;
        let token = URL_SAFE_NO_PAD.encode(json);
        assert!(matches!(
            Bag::unmarshal(&token),
            Err(ConnectorError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_next_on_exhausted_bag_fails() {
        let mut bag = Bag::new();
        assert!(bag.next("cursor").is_err());
    }

    #[test]
    fn test_token_size_default() {
        assert_eq!(Token::first_page(0).size_or(DEFAULT_PAGE_SIZE), 200);
        assert_eq!(Token::resume(50, "abc").size_or(DEFAULT_PAGE_SIZE), 50);
    }
}
