// SPDX-License-Identifier: BUSL-1.1
//! # warden-store — Sanction Persistence
//!
//! The [`SanctionStore`] contract is everything the engine asks of its
//! persistence collaborator: sanction upsert/find/delete keyed by user,
//! an append-only moderation action log, and role snapshots keyed by
//! `(guild, user, role)`.
//!
//! Two implementations ship:
//!
//! - [`MemoryStore`] — DashMap-backed, for tests and for running without
//!   a database. State does not survive restarts.
//! - [`PgStore`] — PostgreSQL via SQLx, with embedded migrations. Used
//!   when `DATABASE_URL` is set; see [`postgres::init_pool`].
//!
//! The store holds no locking discipline beyond row-level upsert
//! idempotency. Concurrent external modification resolves last-write-wins
//! at the row level — an accepted, documented risk under the engine's
//! single-instance assumption.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{init_pool, PgStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use warden_core::{
    GuildId, ModerationActionEntry, RoleId, RoleSnapshot, SanctionKind, SanctionRecord, UserId,
};

/// Errors from the persistence layer. Not locally recoverable: callers
/// abort the current operation and report upward, never the process.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded into its domain type.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Transactional persistence contract for sanction state.
#[async_trait]
pub trait SanctionStore: Send + Sync {
    /// The sanction record for a user, if one exists.
    async fn find_sanction(&self, user: UserId) -> Result<Option<SanctionRecord>, StoreError>;

    /// Create or replace the sanction record for `record.user_id`.
    async fn upsert_sanction(&self, record: &SanctionRecord) -> Result<(), StoreError>;

    /// Remove a user's sanction record entirely.
    async fn delete_sanction(&self, user: UserId) -> Result<(), StoreError>;

    /// All records whose given sanction kind is active and whose window
    /// lapsed before `now`. Permanent sanctions never match.
    async fn expired_sanctions(
        &self,
        kind: SanctionKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<SanctionRecord>, StoreError>;

    /// Append one moderation log row. Rows are never updated or deleted.
    async fn append_action(&self, entry: &ModerationActionEntry) -> Result<(), StoreError>;

    /// The moderation log for a target user, newest first.
    async fn actions_for_target(
        &self,
        user: UserId,
    ) -> Result<Vec<ModerationActionEntry>, StoreError>;

    /// Record one role held at departure time.
    async fn upsert_snapshot(&self, snapshot: &RoleSnapshot) -> Result<(), StoreError>;

    /// The snapshot set for a user in a guild.
    async fn snapshots_for(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<RoleSnapshot>, StoreError>;

    /// Drop every snapshot row for a user, across all guilds. Runs
    /// before a fresh snapshot is taken so at most one snapshot set
    /// exists per user.
    async fn delete_snapshots_for_user(&self, user: UserId) -> Result<(), StoreError>;

    /// Drop every snapshot row referencing a role (the role was deleted).
    async fn delete_snapshots_for_role(&self, role: RoleId) -> Result<(), StoreError>;

    /// Drop every snapshot row for a guild (the bot left it).
    async fn delete_snapshots_for_guild(&self, guild: GuildId) -> Result<(), StoreError>;
}
