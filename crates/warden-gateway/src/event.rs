// SPDX-License-Identifier: BUSL-1.1
//! Gateway event vocabulary.
//!
//! The platform adapter translates its wire events into this enum; the
//! engine's event router consumes it. Member payloads carry the role set
//! *at the time of the event* — for departures that is the set the
//! continuity engine snapshots.

use serde::{Deserialize, Serialize};

use warden_core::{GuildId, RoleId, UserId};

use crate::member::Member;

/// Events delivered by the gateway stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatewayEvent {
    MemberJoined {
        guild: GuildId,
        member: Member,
    },
    MemberLeft {
        guild: GuildId,
        member: Member,
    },
    /// A member's roles (or other attributes) changed.
    MemberUpdated {
        guild: GuildId,
        before: Member,
        after: Member,
    },
    RoleDeleted {
        guild: GuildId,
        role: RoleId,
    },
    /// The bot was removed from a guild.
    GuildLeft {
        guild: GuildId,
    },
    AuditLogEntry {
        guild: GuildId,
        entry: AuditLogEntry,
    },
}

/// The audit actions the engine distinguishes. Everything it does not
/// care about collapses to [`AuditAction::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    MemberRoleUpdate,
    Other,
}

/// One change inside an audit-log entry's change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleChange {
    Added(Vec<RoleId>),
    Removed(Vec<RoleId>),
}

/// A guild audit-log entry, reduced to the fields the engine inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Who performed the action, when the platform attributes one.
    pub actor: Option<UserId>,
    pub action: AuditAction,
    pub changes: Vec<RoleChange>,
    /// Who the action was performed on.
    pub target: Option<UserId>,
}

impl AuditLogEntry {
    /// If this entry's change set is exactly one removal of exactly one
    /// role, that role. This is the shape produced when an integration
    /// strips a single role from a member; anything else (bulk edits,
    /// additions, mixed changes) does not qualify.
    pub fn single_role_removal(&self) -> Option<RoleId> {
        match self.changes.as_slice() {
            [RoleChange::Removed(roles)] => match roles.as_slice() {
                [role] => Some(*role),
                _ => None,
            },
            _ => None,
        }
    }
}
