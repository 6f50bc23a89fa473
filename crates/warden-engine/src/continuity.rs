// SPDX-License-Identifier: BUSL-1.1
//! Membership continuity across a leave/rejoin cycle.
//!
//! On departure the engine records the member's sanction flags and
//! snapshots every role they held; on return it re-applies sanction
//! roles from the record and restores the snapshot, bounded by the bot's
//! own role ceiling.
//!
//! The snapshot set for a user is cleared *before* a new one is written,
//! so at most one set exists per user and it always reflects the most
//! recent departure — without that ordering, roles from two departures
//! ago would come back after a single rejoin.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use warden_core::{GuildId, RoleConfig, RoleId, RoleSnapshot, SanctionKind, SanctionRecord};
use warden_gateway::{GuildHost, Member};
use warden_store::SanctionStore;

use crate::effects::RoleEffectApplier;
use crate::EngineError;

const RESTORE_REASON: &str = "Restoring roles from previous membership";
const REJOIN_SANCTION_REASON: &str = "Active sanction on rejoin";

/// Handles member departure and return.
pub struct ContinuityEngine<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    effects: RoleEffectApplier<G>,
    config: Arc<RoleConfig>,
}

impl<S: SanctionStore, G: GuildHost> ContinuityEngine<S, G> {
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        effects: RoleEffectApplier<G>,
        config: Arc<RoleConfig>,
    ) -> Self {
        Self {
            store,
            gateway,
            effects,
            config,
        }
    }

    /// Departure: persist sanction flags and snapshot the member's roles.
    ///
    /// The record is authoritative — when one already exists its flags
    /// are left untouched. Only a member with no record at all gets
    /// flags derived from the sanction roles they currently hold, as a
    /// fallback signal (roles may have been changed out-of-band).
    pub async fn on_member_leave(
        &self,
        guild: GuildId,
        member: &Member,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.store.find_sanction(member.user_id).await?.is_none() {
            let mut record = SanctionRecord::new(member.user_id);
            record.banned = member.has_any_role(&self.config.sanction_roles(SanctionKind::Ban));
            record.muted = member.has_any_role(&self.config.sanction_roles(SanctionKind::Mute));
            self.store.upsert_sanction(&record).await?;
        }

        // Clear before snapshot: stale rows from a prior departure must
        // never survive into this one.
        self.store.delete_snapshots_for_user(member.user_id).await?;
        for role in &member.role_ids {
            self.store
                .upsert_snapshot(&RoleSnapshot {
                    guild_id: guild,
                    user_id: member.user_id,
                    role_id: *role,
                    saved_at: now,
                })
                .await?;
        }

        tracing::info!(
            guild = %guild,
            user = %member.user_id,
            roles = member.role_ids.len(),
            "saved departure snapshot"
        );
        Ok(())
    }

    /// Return: re-apply sanction roles per the record, then restore the
    /// snapshot filtered by the bot's role ceiling.
    pub async fn on_member_join(&self, guild: GuildId, member: &Member) -> Result<(), EngineError> {
        if let Some(record) = self.store.find_sanction(member.user_id).await? {
            for kind in [SanctionKind::Ban, SanctionKind::Mute] {
                if !record.is_active(kind) {
                    continue;
                }
                // A per-guild effect failure must not stop the restore.
                if let Err(err) = self
                    .effects
                    .apply_sanction_roles(kind, guild, member, REJOIN_SANCTION_REASON)
                    .await
                {
                    tracing::warn!(
                        kind = %kind,
                        guild = %guild,
                        user = %member.user_id,
                        error = %err,
                        "failed to re-apply sanction roles on rejoin"
                    );
                }
            }
        }

        let snapshots = self.store.snapshots_for(guild, member.user_id).await?;
        if snapshots.is_empty() {
            return Ok(());
        }

        let restorable = self.filter_restorable(guild, &snapshots).await?;
        if restorable.is_empty() {
            return Ok(());
        }

        match self
            .gateway
            .add_roles(guild, member.user_id, &restorable, RESTORE_REASON)
            .await
        {
            Ok(()) => tracing::info!(
                guild = %guild,
                user = %member.user_id,
                restored = restorable.len(),
                "restored roles on rejoin"
            ),
            Err(err) => tracing::error!(
                guild = %guild,
                user = %member.user_id,
                error = %err,
                "role restore failed"
            ),
        }
        Ok(())
    }

    /// Snapshot roles the bot can actually grant: below its own highest
    /// role, not the guild's everyone role, and still existing in the
    /// guild.
    async fn filter_restorable(
        &self,
        guild: GuildId,
        snapshots: &[RoleSnapshot],
    ) -> Result<Vec<RoleId>, EngineError> {
        let ceiling = self.gateway.bot_highest_position(guild).await?;
        let positions: HashMap<RoleId, i64> = self
            .gateway
            .guild_roles(guild)
            .await?
            .into_iter()
            .map(|role| (role.id, role.position))
            .collect();

        Ok(snapshots
            .iter()
            .map(|snapshot| snapshot.role_id)
            .filter(|role| !role.is_everyone(guild))
            .filter(|role| match positions.get(role) {
                Some(position) => *position < ceiling,
                // Deleted since the snapshot was taken.
                None => false,
            })
            .collect())
    }

    /// A role was deleted: drop any snapshot rows referencing it.
    pub async fn on_role_deleted(&self, role: RoleId) -> Result<(), EngineError> {
        self.store.delete_snapshots_for_role(role).await?;
        tracing::info!(role = %role, "dropped snapshots for deleted role");
        Ok(())
    }

    /// The bot left a guild: drop its snapshot rows.
    pub async fn on_guild_left(&self, guild: GuildId) -> Result<(), EngineError> {
        self.store.delete_snapshots_for_guild(guild).await?;
        tracing::info!(guild = %guild, "dropped snapshots for departed guild");
        Ok(())
    }

}
