// SPDX-License-Identifier: BUSL-1.1
//! In-memory gateway double.
//!
//! Holds guild/member/role fixtures behind the same [`GuildHost`]
//! capability the production adapter implements, records every
//! grant/revoke call in a journal for assertions, and supports failure
//! injection per `(guild, user)` so tests can prove that per-guild
//! failures never abort sibling guilds.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use warden_core::{GuildId, RoleId, UserId};

use crate::member::{GuildRole, Member};
use crate::{GatewayError, GuildHost};

/// One recorded role mutation. Every [`GuildHost::add_role`] /
/// [`GuildHost::remove_role`] call is journaled, including no-ops, so
/// tests can assert how many calls an operation actually made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleOp {
    Grant {
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: String,
    },
    Revoke {
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: String,
    },
}

#[derive(Debug, Default)]
struct GuildState {
    /// Role id → hierarchy position.
    roles: HashMap<RoleId, i64>,
    members: HashMap<UserId, BTreeSet<RoleId>>,
}

/// Test double for [`GuildHost`].
pub struct InMemoryGateway {
    bot_user: UserId,
    guilds: DashMap<GuildId, GuildState>,
    journal: Mutex<Vec<RoleOp>>,
    denied: Mutex<HashSet<(GuildId, UserId)>>,
}

impl InMemoryGateway {
    pub fn new(bot_user: UserId) -> Self {
        Self {
            bot_user,
            guilds: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            denied: Mutex::new(HashSet::new()),
        }
    }

    /// Register an empty guild.
    pub fn add_guild(&self, guild: GuildId) {
        self.guilds.entry(guild).or_default();
    }

    /// Define a role (and its hierarchy position) in a guild.
    pub fn define_role(&self, guild: GuildId, role: RoleId, position: i64) {
        self.guilds.entry(guild).or_default().roles.insert(role, position);
    }

    /// Place a member in a guild with the given roles.
    pub fn place_member(&self, guild: GuildId, user: UserId, roles: &[RoleId]) {
        self.guilds
            .entry(guild)
            .or_default()
            .members
            .insert(user, roles.iter().copied().collect());
    }

    /// Remove a member from a guild.
    pub fn remove_member(&self, guild: GuildId, user: UserId) {
        if let Some(mut state) = self.guilds.get_mut(&guild) {
            state.members.remove(&user);
        }
    }

    /// Make every role mutation for this `(guild, user)` fail with
    /// [`GatewayError::PermissionDenied`].
    pub fn deny_role_changes(&self, guild: GuildId, user: UserId) {
        self.denied.lock().insert((guild, user));
    }

    /// A copy of all recorded role mutations, in call order.
    pub fn journal(&self) -> Vec<RoleOp> {
        self.journal.lock().clone()
    }

    fn member_view(state: &GuildState, user: UserId) -> Option<Member> {
        let roles = state.members.get(&user)?;
        let highest = roles
            .iter()
            .filter_map(|role| state.roles.get(role).copied())
            .max()
            .unwrap_or(0);
        Some(Member {
            user_id: user,
            role_ids: roles.clone(),
            highest_role_position: highest,
        })
    }

    fn check_denied(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<(), GatewayError> {
        if self.denied.lock().contains(&(guild, user)) {
            return Err(GatewayError::PermissionDenied { guild, role });
        }
        Ok(())
    }
}

#[async_trait]
impl GuildHost for InMemoryGateway {
    async fn guild_ids(&self) -> Vec<GuildId> {
        let mut ids: Vec<GuildId> = self.guilds.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    async fn member(&self, guild: GuildId, user: UserId) -> Result<Option<Member>, GatewayError> {
        let state = self.guilds.get(&guild).ok_or(GatewayError::UnknownGuild(guild))?;
        Ok(Self::member_view(&state, user))
    }

    async fn guild_roles(&self, guild: GuildId) -> Result<Vec<GuildRole>, GatewayError> {
        let state = self.guilds.get(&guild).ok_or(GatewayError::UnknownGuild(guild))?;
        let mut roles: Vec<GuildRole> = state
            .roles
            .iter()
            .map(|(id, position)| GuildRole {
                id: *id,
                position: *position,
            })
            .collect();
        roles.sort_by_key(|role| role.id);
        Ok(roles)
    }

    async fn bot_highest_position(&self, guild: GuildId) -> Result<i64, GatewayError> {
        let state = self.guilds.get(&guild).ok_or(GatewayError::UnknownGuild(guild))?;
        // A bot with no membership outranks nothing.
        Ok(Self::member_view(&state, self.bot_user)
            .map(|member| member.highest_role_position)
            .unwrap_or(0))
    }

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.check_denied(guild, user, role)?;
        let mut state = self.guilds.get_mut(&guild).ok_or(GatewayError::UnknownGuild(guild))?;
        let roles = state
            .members
            .get_mut(&user)
            .ok_or(GatewayError::MemberNotFound { guild, user })?;
        roles.insert(role);
        self.journal.lock().push(RoleOp::Grant {
            guild,
            user,
            role,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.check_denied(guild, user, role)?;
        let mut state = self.guilds.get_mut(&guild).ok_or(GatewayError::UnknownGuild(guild))?;
        let roles = state
            .members
            .get_mut(&user)
            .ok_or(GatewayError::MemberNotFound { guild, user })?;
        roles.remove(&role);
        self.journal.lock().push(RoleOp::Revoke {
            guild,
            user,
            role,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
