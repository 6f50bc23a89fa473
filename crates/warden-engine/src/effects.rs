// SPDX-License-Identifier: BUSL-1.1
//! Role effect application.
//!
//! [`RoleEffectApplier`] translates logical sanction state into concrete
//! role mutations against one guild membership. Both operations are
//! set-difference against the member's live role set — a role already in
//! the desired state is never touched — which makes repeated calls
//! idempotent and safe to retry after partial failure.

use std::sync::Arc;

use warden_core::{GuildId, RoleConfig, SanctionKind};
use warden_gateway::{GuildHost, Member};

use crate::EngineError;

/// Stateless applier of sanction role effects. The sole mutator of live
/// role membership in the engine. Cheap to clone.
pub struct RoleEffectApplier<G> {
    gateway: Arc<G>,
    config: Arc<RoleConfig>,
}

impl<G> Clone for RoleEffectApplier<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            config: Arc::clone(&self.config),
        }
    }
}

impl<G: GuildHost> RoleEffectApplier<G> {
    pub fn new(gateway: Arc<G>, config: Arc<RoleConfig>) -> Self {
        Self { gateway, config }
    }

    /// Grant every configured sanction role for `kind` that the member
    /// does not already hold. Returns the number of roles granted.
    pub async fn apply_sanction_roles(
        &self,
        kind: SanctionKind,
        guild: GuildId,
        member: &Member,
        reason: &str,
    ) -> Result<usize, EngineError> {
        let mut granted = 0;
        for role in self.config.sanction_roles(kind) {
            if member.has_role(role) {
                continue;
            }
            self.gateway.add_role(guild, member.user_id, role, reason).await?;
            granted += 1;
        }
        if granted > 0 {
            tracing::debug!(kind = %kind, guild = %guild, user = %member.user_id, granted, "applied sanction roles");
        }
        Ok(granted)
    }

    /// Revoke every configured sanction role for `kind` that the member
    /// holds. Returns the number of roles revoked.
    pub async fn remove_sanction_roles(
        &self,
        kind: SanctionKind,
        guild: GuildId,
        member: &Member,
        reason: &str,
    ) -> Result<usize, EngineError> {
        let mut revoked = 0;
        for role in self.config.sanction_roles(kind) {
            if !member.has_role(role) {
                continue;
            }
            self.gateway.remove_role(guild, member.user_id, role, reason).await?;
            revoked += 1;
        }
        if revoked > 0 {
            tracing::debug!(kind = %kind, guild = %guild, user = %member.user_id, revoked, "removed sanction roles");
        }
        Ok(revoked)
    }
}
