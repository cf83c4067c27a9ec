//! Identifier types for lights and events.
//!
//! Traffic lights carry human-assigned identifiers (`tl-001`) from the
//! dashboard seed data and persisted documents, so [`LightId`] wraps a
//! validated string. Controller-generated identifiers use UUID v7 so they
//! sort by creation time. Events use a plain [`Uuid`] wrapper.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Maximum length in bytes of a [`LightId`].
pub const MAX_LIGHT_ID_LEN: usize = 64;

/// Unique identifier for a traffic light (one per intersection).
///
/// Accepted characters are ASCII alphanumerics, `-`, `_` and `.`; the id
/// must be non-empty and at most [`MAX_LIGHT_ID_LEN`] bytes. The string is
/// used verbatim in store keys and URL paths.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(try_from = "String")]
#[ts(export, export_to = "bindings/")]
pub struct LightId(String);

/// Rejection returned when a string is not a valid [`LightId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLightId(pub String);

impl core::fmt::Display for InvalidLightId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid light id: {:?}", self.0)
    }
}

impl std::error::Error for InvalidLightId {}

impl LightId {
    /// Generate a fresh identifier from a UUID v7.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wrap `raw` if it is a well-formed light identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::is_well_formed(raw).then(|| Self(raw.to_owned()))
    }

    /// Check whether `raw` satisfies the identifier rules.
    pub fn is_well_formed(raw: &str) -> bool {
        !raw.is_empty()
            && raw.len() <= MAX_LIGHT_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for LightId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LightId {
    type Error = InvalidLightId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if Self::is_well_formed(&raw) {
            Ok(Self(raw))
        } else {
            Err(InvalidLightId(raw))
        }
    }
}

impl AsRef<str> for LightId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a [`LightEvent`](crate::LightEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_style_ids_are_accepted() {
        assert!(LightId::parse("tl-001").is_some());
        assert!(LightId::parse("north_gate.2").is_some());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(LightId::parse("").is_none());
        assert!(LightId::parse("main & 5th").is_none());
        assert!(LightId::parse("a/b").is_none());
        let long = "x".repeat(MAX_LIGHT_ID_LEN + 1);
        assert!(LightId::parse(&long).is_none());
    }

    #[test]
    fn generated_ids_are_well_formed_and_distinct() {
        let a = LightId::generate();
        let b = LightId::generate();
        assert!(LightId::is_well_formed(a.as_str()));
        assert_ne!(a, b);
    }

    #[test]
    fn deserialization_enforces_id_rules() {
        let ok: Result<LightId, _> = serde_json::from_str("\"tl-003\"");
        assert!(ok.is_ok());
        let bad: Result<LightId, _> = serde_json::from_str("\"has space\"");
        assert!(bad.is_err());
    }

    #[test]
    fn light_id_serializes_as_plain_string() {
        let id = LightId::parse("tl-002");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"tl-002\""));
    }
}
