//! # Identifier Newtypes
//!
//! Distinct types for the identifiers that flow through a validation run,
//! so a tenant id can never be passed where a session id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Identifier of a stored ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulesetId(pub Uuid);

/// Identifier of one validation run. Every audit event written for the run
/// carries it so events can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

/// Tenant (bank) identifier used to look up overlays and exceptions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl RulesetId {
    /// Generate a new random ruleset identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the hyphenated UUID form.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidUuid {
                kind: "ruleset id",
                value: s.to_string(),
            })
    }
}

impl Default for RulesetId {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionId {
    /// Generate a new random session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantId {
    /// Create a tenant identifier. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTenantId`] for empty input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidTenantId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RulesetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ruleset:{}", self.0)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_trims_and_rejects_empty() {
        assert_eq!(TenantId::new("  bank-a ").unwrap().as_str(), "bank-a");
        assert_eq!(TenantId::new("   "), Err(ValidationError::InvalidTenantId));
    }

    #[test]
    fn ruleset_id_parse_round_trip() {
        let id = RulesetId::new();
        let parsed = RulesetId::parse(&id.0.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(RulesetId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let tenant = TenantId::new("bank-a").unwrap();
        assert_eq!(serde_json::to_string(&tenant).unwrap(), "\"bank-a\"");
        let session = SessionId::new();
        let json = serde_json::to_string(&session).unwrap();
        assert_eq!(json, format!("\"{}\"", session.0));
    }

    #[test]
    fn display_prefixes() {
        let session = SessionId::new();
        assert!(session.to_string().starts_with("session:"));
        assert!(RulesetId::new().to_string().starts_with("ruleset:"));
    }
}
