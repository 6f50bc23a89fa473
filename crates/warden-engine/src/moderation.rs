// SPDX-License-Identifier: BUSL-1.1
//! Sanction state transitions and the audit trail.
//!
//! [`ModerationService`] owns every transition of the persisted sanction
//! record and writes one moderation log row per transition. It touches
//! state only — applying or removing the corresponding live roles is the
//! caller's job via [`crate::RoleEffectApplier`]. State and effect are
//! deliberately decoupled so the reconciliation loop can retry effect
//! application without re-deriving state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use warden_core::{
    GuildId, ModerationActionEntry, SanctionKind, SanctionRecord, SanctionWindow, UserId,
};
use warden_store::SanctionStore;

use crate::EngineError;

/// Owns sanction state transitions. Cheap to clone.
pub struct ModerationService<S> {
    store: Arc<S>,
}

impl<S> Clone for ModerationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SanctionStore> ModerationService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Apply a sanction: set the kind's flag, window, and reason on the
    /// user's record (creating it if absent) and append the audit row.
    pub async fn apply_sanction(
        &self,
        kind: SanctionKind,
        target: UserId,
        window: SanctionWindow,
        moderator: Option<UserId>,
        guild: Option<GuildId>,
        reason: &str,
    ) -> Result<(), EngineError> {
        let mut record = self
            .store
            .find_sanction(target)
            .await?
            .unwrap_or_else(|| SanctionRecord::new(target));
        record.apply(kind, window.clone(), reason);
        self.store.upsert_sanction(&record).await?;

        let entry =
            ModerationActionEntry::applied(kind, target, &window, moderator, guild, reason);
        self.store.append_action(&entry).await?;

        tracing::info!(
            kind = %kind,
            target = %target,
            permanent = window.is_permanent(),
            reason,
            "sanction applied"
        );
        Ok(())
    }

    /// Lift a sanction: clear the kind's flag, window, and reason, and
    /// append the audit row. Lifting an already-lifted sanction is a
    /// state no-op but is still audited — every lift attempt leaves a
    /// log row.
    pub async fn lift_sanction(
        &self,
        kind: SanctionKind,
        target: UserId,
        moderator: Option<UserId>,
        guild: Option<GuildId>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut record = self
            .store
            .find_sanction(target)
            .await?
            .unwrap_or_else(|| SanctionRecord::new(target));
        record.lift(kind);
        self.store.upsert_sanction(&record).await?;

        let entry = ModerationActionEntry::lifted(kind, target, moderator, guild, reason, now);
        self.store.append_action(&entry).await?;

        tracing::info!(kind = %kind, target = %target, reason, "sanction lifted");
        Ok(())
    }

    /// Whether the user's record currently flags the given kind active.
    pub async fn is_sanctioned(
        &self,
        kind: SanctionKind,
        user: UserId,
    ) -> Result<bool, EngineError> {
        Ok(self
            .store
            .find_sanction(user)
            .await?
            .map(|record| record.is_active(kind))
            .unwrap_or(false))
    }
}
