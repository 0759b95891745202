//! Role and permission checks over an authenticated principal.
//!
//! The authorizer never touches tokens; it only evaluates predicates over
//! the principal produced by the verifier.

use crate::models::error::GatewayError;
use crate::models::principal::{permissions_for, Permission, Principal, Role};
use serde::{Deserialize, Serialize};

/// How multiple required permissions combine.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthLogic {
    Any,
    All,
}

impl Default for AuthLogic {
    fn default() -> Self {
        Self::Any
    }
}

/// Effective permissions of a principal: the union of role-derived and
/// directly granted permissions, deduplicated, in stable order.
pub fn effective_permissions(principal: &Principal) -> Vec<Permission> {
    let mut effective: Vec<Permission> = Vec::new();
    for role in &principal.roles {
        for permission in permissions_for(*role) {
            if !effective.contains(permission) {
                effective.push(*permission);
            }
        }
    }
    for permission in &principal.permissions {
        if !effective.contains(permission) {
            effective.push(*permission);
        }
    }
    effective
}

/// Enforces role and permission predicates.
///
/// Roles combine with ANY semantics; permissions follow `logic`. When both
/// sets are given, both predicates must pass. The forbidden error names the
/// predicate that failed.
pub fn authorize(
    principal: &Principal,
    required_roles: &[Role],
    required_permissions: &[Permission],
    logic: AuthLogic,
) -> Result<(), GatewayError> {
    if !required_roles.is_empty() {
        let satisfied = required_roles.iter().any(|r| principal.has_role(*r));
        if !satisfied {
            let wanted = required_roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(GatewayError::forbidden(format!("requires role {}", wanted)));
        }
    }

    if !required_permissions.is_empty() {
        let held = effective_permissions(principal);
        let satisfied = match logic {
            AuthLogic::Any => required_permissions.iter().any(|p| held.contains(p)),
            AuthLogic::All => required_permissions.iter().all(|p| held.contains(p)),
        };
        if !satisfied {
            let wanted = required_permissions
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(GatewayError::forbidden(format!(
                "requires permission {}",
                wanted
            )));
        }
    }

    Ok(())
}
