// SPDX-License-Identifier: BUSL-1.1
//! In-memory store implementation.
//!
//! Thread-safe via `DashMap`; the action log is a plain mutex-guarded
//! vector since it is append-only. Suitable for tests and for running
//! the engine without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use warden_core::{
    GuildId, ModerationActionEntry, RoleId, RoleSnapshot, SanctionKind, SanctionRecord, UserId,
};

use crate::{SanctionStore, StoreError};

/// DashMap-backed [`SanctionStore`].
#[derive(Default)]
pub struct MemoryStore {
    sanctions: DashMap<UserId, SanctionRecord>,
    actions: Mutex<Vec<ModerationActionEntry>>,
    snapshots: DashMap<(GuildId, UserId, RoleId), RoleSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of moderation log rows. Test helper.
    pub fn action_count(&self) -> usize {
        self.actions.lock().len()
    }
}

#[async_trait]
impl SanctionStore for MemoryStore {
    async fn find_sanction(&self, user: UserId) -> Result<Option<SanctionRecord>, StoreError> {
        Ok(self.sanctions.get(&user).map(|entry| entry.clone()))
    }

    async fn upsert_sanction(&self, record: &SanctionRecord) -> Result<(), StoreError> {
        self.sanctions.insert(record.user_id, record.clone());
        Ok(())
    }

    async fn delete_sanction(&self, user: UserId) -> Result<(), StoreError> {
        self.sanctions.remove(&user);
        Ok(())
    }

    async fn expired_sanctions(
        &self,
        kind: SanctionKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<SanctionRecord>, StoreError> {
        let mut expired: Vec<SanctionRecord> = self
            .sanctions
            .iter()
            .filter(|entry| {
                entry.is_active(kind)
                    && entry.window(kind).is_some_and(|window| window.is_expired(now))
            })
            .map(|entry| entry.clone())
            .collect();
        expired.sort_by_key(|record| record.user_id);
        Ok(expired)
    }

    async fn append_action(&self, entry: &ModerationActionEntry) -> Result<(), StoreError> {
        self.actions.lock().push(entry.clone());
        Ok(())
    }

    async fn actions_for_target(
        &self,
        user: UserId,
    ) -> Result<Vec<ModerationActionEntry>, StoreError> {
        let mut rows: Vec<ModerationActionEntry> = self
            .actions
            .lock()
            .iter()
            .filter(|entry| entry.target == user)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn upsert_snapshot(&self, snapshot: &RoleSnapshot) -> Result<(), StoreError> {
        self.snapshots.insert(
            (snapshot.guild_id, snapshot.user_id, snapshot.role_id),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn snapshots_for(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<RoleSnapshot>, StoreError> {
        let mut rows: Vec<RoleSnapshot> = self
            .snapshots
            .iter()
            .filter(|entry| {
                let (g, u, _) = *entry.key();
                g == guild && u == user
            })
            .map(|entry| entry.clone())
            .collect();
        rows.sort_by_key(|row| row.role_id);
        Ok(rows)
    }

    async fn delete_snapshots_for_user(&self, user: UserId) -> Result<(), StoreError> {
        self.snapshots.retain(|(_, u, _), _| *u != user);
        Ok(())
    }

    async fn delete_snapshots_for_role(&self, role: RoleId) -> Result<(), StoreError> {
        self.snapshots.retain(|(_, _, r), _| *r != role);
        Ok(())
    }

    async fn delete_snapshots_for_guild(&self, guild: GuildId) -> Result<(), StoreError> {
        self.snapshots.retain(|(g, _, _), _| *g != guild);
        Ok(())
    }
}
