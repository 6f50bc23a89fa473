// SPDX-License-Identifier: BUSL-1.1
//! Membership views as observed by the platform adapter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_core::{RoleId, UserId};

/// One member of one guild: their role set and hierarchy position at the
/// time the adapter observed them. Views are snapshots, not live handles
/// — mutation goes through [`crate::GuildHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub role_ids: BTreeSet<RoleId>,
    /// Position of the member's highest role. Higher is more privileged;
    /// the everyone role sits at position 0.
    pub highest_role_position: i64,
}

impl Member {
    /// A member holding no roles beyond the implicit everyone role.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            role_ids: BTreeSet::new(),
            highest_role_position: 0,
        }
    }

    /// Builder-style role assignment for fixtures.
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.role_ids = roles.into_iter().collect();
        self
    }

    /// Builder-style position assignment for fixtures.
    pub fn with_highest_position(mut self, position: i64) -> Self {
        self.highest_role_position = position;
        self
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.role_ids.contains(&role)
    }

    /// Whether the member holds at least one of the given roles.
    pub fn has_any_role(&self, roles: &[RoleId]) -> bool {
        roles.iter().any(|role| self.role_ids.contains(role))
    }
}

/// One role defined in a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRole {
    pub id: RoleId,
    pub position: i64,
}
