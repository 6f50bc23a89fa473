// SPDX-License-Identifier: BUSL-1.1
//! # warden-gateway — Live Guild Surface
//!
//! The engine's window onto remote, eventually-consistent guild state:
//!
//! - **Membership views** ([`member`]): a [`Member`]'s role set and
//!   hierarchy position as last observed by the platform adapter.
//!
//! - **Events** ([`event`]): the gateway event vocabulary the engine
//!   consumes — joins, departures, role updates, audit-log entries.
//!
//! - **[`GuildHost`]**: the capability trait through which all live role
//!   mutation flows. A production binding wraps the chat platform's API;
//!   tests use [`InMemoryGateway`].
//!
//! The persisted sanction record is the source of truth; everything
//! behind this crate is *actual* state that the engine reconciles toward
//! the record, so every operation here is written to be safely
//! retryable.

pub mod event;
pub mod member;
pub mod memory;

pub use event::{AuditAction, AuditLogEntry, GatewayEvent, RoleChange};
pub use member::{GuildRole, Member};
pub use memory::{InMemoryGateway, RoleOp};

use async_trait::async_trait;
use thiserror::Error;

use warden_core::{GuildId, RoleId, UserId};

/// Errors from the live guild surface.
///
/// Callers fanning out across guilds catch and log these per guild,
/// never aborting siblings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The guild is not visible to the bot.
    #[error("guild {0} is not visible")]
    UnknownGuild(GuildId),

    /// The user has no membership in the guild.
    #[error("user {user} is not a member of guild {guild}")]
    MemberNotFound { guild: GuildId, user: UserId },

    /// The bot lacks permission to manage the role.
    #[error("missing permission to manage role {role} in guild {guild}")]
    PermissionDenied { guild: GuildId, role: RoleId },

    /// Transport-level failure talking to the platform.
    #[error("gateway transport error: {0}")]
    Transport(String),
}

/// Capability over one bot session's view of its guilds.
///
/// ## Idempotency Contract
///
/// Granting a role the member already holds and revoking a role the
/// member does not hold MUST succeed as no-ops. The reconciliation loop
/// re-runs effects after partial failure, so every mutation here may be
/// executed more than once for the same logical change.
#[async_trait]
pub trait GuildHost: Send + Sync {
    /// All guilds currently visible to the bot session.
    async fn guild_ids(&self) -> Vec<GuildId>;

    /// Look up a member. `Ok(None)` means the guild is known but the
    /// user has no membership in it.
    async fn member(&self, guild: GuildId, user: UserId) -> Result<Option<Member>, GatewayError>;

    /// All roles defined in the guild, with their hierarchy positions.
    async fn guild_roles(&self, guild: GuildId) -> Result<Vec<GuildRole>, GatewayError>;

    /// The hierarchy position of the bot's own highest role in the
    /// guild. The bot cannot grant roles at or above this position.
    async fn bot_highest_position(&self, guild: GuildId) -> Result<i64, GatewayError>;

    /// Grant one role, with an audit reason.
    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<(), GatewayError>;

    /// Revoke one role, with an audit reason.
    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<(), GatewayError>;

    /// Grant a batch of roles with one audit reason. Stops at the first
    /// failure; already-granted roles stay granted (retry-safe per the
    /// idempotency contract).
    async fn add_roles(
        &self,
        guild: GuildId,
        user: UserId,
        roles: &[RoleId],
        reason: &str,
    ) -> Result<(), GatewayError> {
        for role in roles {
            self.add_role(guild, user, *role, reason).await?;
        }
        Ok(())
    }
}
