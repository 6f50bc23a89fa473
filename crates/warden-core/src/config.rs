// SPDX-License-Identifier: BUSL-1.1
//! # Role-Set Configuration
//!
//! Named, comma-separated role-id lists sourced from the process
//! environment: which roles *constitute* being banned or muted, and which
//! roles entitle a caller to issue each sanction or approval.
//!
//! Lists are resolved and re-parsed on every call rather than cached at
//! startup — operators can rotate role ids without a restart, and the
//! call frequency is low enough that the parse cost is irrelevant.

use std::collections::HashMap;

use crate::identity::RoleId;
use crate::sanction::SanctionKind;

/// Environment variable naming the roles that constitute a ban.
pub const BANNED_ROLES_VAR: &str = "BANNED_ROLES";
/// Environment variable naming the roles that constitute a mute.
pub const MUTED_ROLES_VAR: &str = "MUTED_ROLES";
/// Environment variable naming the roles allowed to ban/unban.
pub const ALLOW_BAN_ROLES_VAR: &str = "ALLOW_BAN_ROLES";
/// Environment variable naming the roles allowed to mute/unmute.
pub const ALLOW_MUTE_ROLES_VAR: &str = "ALLOW_MUTE_ROLES";

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Call-time resolver for configured role sets.
pub struct RoleConfig {
    lookup: Lookup,
}

impl std::fmt::Debug for RoleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleConfig").finish_non_exhaustive()
    }
}

impl RoleConfig {
    /// Resolve lists from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve lists from a fixed map. Test constructor.
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self::from_lookup(move |key| map.get(key).cloned())
    }

    /// Resolve lists through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    /// The roles that constitute the given sanction.
    pub fn sanction_roles(&self, kind: SanctionKind) -> Vec<RoleId> {
        match kind {
            SanctionKind::Ban => self.role_list(BANNED_ROLES_VAR),
            SanctionKind::Mute => self.role_list(MUTED_ROLES_VAR),
        }
    }

    /// The roles entitled to issue the given sanction.
    pub fn approval_roles(&self, kind: SanctionKind) -> Vec<RoleId> {
        match kind {
            SanctionKind::Ban => self.role_list(ALLOW_BAN_ROLES_VAR),
            SanctionKind::Mute => self.role_list(ALLOW_MUTE_ROLES_VAR),
        }
    }

    /// The roles entitled to grant a named approval category
    /// (`APPROVE_<CATEGORY>_ROLES`).
    pub fn approval_roles_for(&self, category: &str) -> Vec<RoleId> {
        let key = format!("APPROVE_{}_ROLES", category.to_uppercase());
        self.role_list(&key)
    }

    fn role_list(&self, key: &str) -> Vec<RoleId> {
        let Some(raw) = (self.lookup)(key) else {
            return Vec::new();
        };
        parse_role_list(key, &raw)
    }
}

/// Parse a comma-separated role-id list. Malformed entries are skipped
/// with a warning; an unset or empty list is simply empty.
fn parse_role_list(key: &str, raw: &str) -> Vec<RoleId> {
    raw.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| match segment.parse::<RoleId>() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::warn!(key, segment, "skipping malformed role id in configuration");
                None
            }
        })
        .collect()
}
