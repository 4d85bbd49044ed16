//! # Policy Providers
//!
//! Where overlays and exceptions come from. The engine only needs the
//! active overlay and the exception list for one tenant; storage is the
//! provider's business.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tfcheck_core::TenantId;

use crate::error::PolicyError;
use crate::exception::PolicyException;
use crate::overlay::PolicyOverlay;

/// Lookup of tenant policy.
pub trait PolicyProvider: Send + Sync + std::fmt::Debug {
    /// The tenant's active overlay, if any.
    fn active_overlay(&self, tenant: &TenantId) -> Result<Option<PolicyOverlay>, PolicyError>;

    /// Every exception recorded for the tenant, expired ones included, in
    /// any order.
    fn exceptions(&self, tenant: &TenantId) -> Result<Vec<PolicyException>, PolicyError>;
}

/// Overlays and exceptions as a single document (YAML or JSON policy file).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub overlays: Vec<PolicyOverlay>,
    #[serde(default)]
    pub exceptions: Vec<PolicyException>,
}

#[derive(Debug, Default)]
struct TenantPolicy {
    overlays: Vec<PolicyOverlay>,
    exceptions: Vec<PolicyException>,
}

/// In-process provider.
///
/// Storing an active overlay deactivates the tenant's previous active
/// overlay, so at most one is ever active.
#[derive(Debug, Default)]
pub struct InMemoryPolicyProvider {
    tenants: RwLock<HashMap<TenantId, TenantPolicy>>,
}

impl InMemoryPolicyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every overlay and exception from a policy document, in order.
    pub fn from_document(doc: PolicyDocument) -> Self {
        let provider = Self::new();
        for overlay in doc.overlays {
            provider.put_overlay(overlay);
        }
        for exception in doc.exceptions {
            provider.add_exception(exception);
        }
        provider
    }

    pub fn put_overlay(&self, overlay: PolicyOverlay) {
        let mut tenants = self.tenants.write();
        let policy = tenants.entry(overlay.tenant_id.clone()).or_default();
        if overlay.active {
            for existing in policy.overlays.iter_mut().filter(|o| o.active) {
                tracing::info!(
                    tenant = %overlay.tenant_id,
                    previous = %existing.overlay_id,
                    current = %overlay.overlay_id,
                    "deactivating superseded overlay"
                );
                existing.active = false;
            }
        }
        policy.overlays.push(overlay);
    }

    pub fn add_exception(&self, exception: PolicyException) {
        self.tenants
            .write()
            .entry(exception.tenant_id.clone())
            .or_default()
            .exceptions
            .push(exception);
    }

    /// All overlays stored for a tenant, active or not.
    pub fn overlays(&self, tenant: &TenantId) -> Vec<PolicyOverlay> {
        self.tenants
            .read()
            .get(tenant)
            .map(|p| p.overlays.clone())
            .unwrap_or_default()
    }
}

impl PolicyProvider for InMemoryPolicyProvider {
    fn active_overlay(&self, tenant: &TenantId) -> Result<Option<PolicyOverlay>, PolicyError> {
        let tenants = self.tenants.read();
        let Some(policy) = tenants.get(tenant) else {
            return Ok(None);
        };
        let mut active = policy.overlays.iter().filter(|o| o.active);
        let first = active.next().cloned();
        let extra = active.count();
        if extra > 0 {
            return Err(PolicyError::ConflictingOverlays {
                tenant: tenant.clone(),
                count: extra + 1,
            });
        }
        Ok(first)
    }

    fn exceptions(&self, tenant: &TenantId) -> Result<Vec<PolicyException>, PolicyError> {
        Ok(self
            .tenants
            .read()
            .get(tenant)
            .map(|p| p.exceptions.clone())
            .unwrap_or_default())
    }
}
