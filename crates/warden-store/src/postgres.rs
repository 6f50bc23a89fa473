// SPDX-License-Identifier: BUSL-1.1
//! PostgreSQL store implementation.
//!
//! Snowflake identifiers are stored as TEXT — they are decimal strings on
//! the platform's wire — and parsed back on load; a row whose id fails to
//! parse is surfaced as [`StoreError::CorruptRow`] rather than silently
//! dropped. Sanction windows are flattened into nullable columns on the
//! `sanctions` row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use warden_core::{
    GuildId, ModerationActionEntry, RoleId, RoleSnapshot, SanctionKind, SanctionRecord,
    SanctionWindow, UserId,
};

use crate::{SanctionStore, StoreError};

/// Initialize the connection pool and run embedded migrations.
///
/// Returns `None` if `DATABASE_URL` is not set — callers fall back to
/// [`crate::MemoryStore`] and sanction state will not survive restarts.
/// Returns `Err` if the URL is set but connection or migration fails;
/// that is a startup failure and the process should exit rather than run
/// degraded.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — sanction state is in-memory only and will not survive restarts"
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("connected to PostgreSQL, migrations applied");

    Ok(Some(pool))
}

/// SQLx-backed [`SanctionStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SanctionStore for PgStore {
    async fn find_sanction(&self, user: UserId) -> Result<Option<SanctionRecord>, StoreError> {
        let row = sqlx::query_as::<_, SanctionRow>(
            "SELECT user_id, banned, ban_duration_secs, ban_starts_at, ban_ends_at, ban_reason,
                    muted, mute_duration_secs, mute_starts_at, mute_ends_at, mute_reason
             FROM sanctions WHERE user_id = $1",
        )
        .bind(user.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SanctionRow::into_record).transpose()
    }

    async fn upsert_sanction(&self, record: &SanctionRecord) -> Result<(), StoreError> {
        let (ban_dur, ban_start, ban_end) = window_parts(record.ban_window.as_ref());
        let (mute_dur, mute_start, mute_end) = window_parts(record.mute_window.as_ref());

        sqlx::query(
            "INSERT INTO sanctions (user_id, banned, ban_duration_secs, ban_starts_at, ban_ends_at, ban_reason,
                                    muted, mute_duration_secs, mute_starts_at, mute_ends_at, mute_reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (user_id) DO UPDATE SET
                banned = EXCLUDED.banned,
                ban_duration_secs = EXCLUDED.ban_duration_secs,
                ban_starts_at = EXCLUDED.ban_starts_at,
                ban_ends_at = EXCLUDED.ban_ends_at,
                ban_reason = EXCLUDED.ban_reason,
                muted = EXCLUDED.muted,
                mute_duration_secs = EXCLUDED.mute_duration_secs,
                mute_starts_at = EXCLUDED.mute_starts_at,
                mute_ends_at = EXCLUDED.mute_ends_at,
                mute_reason = EXCLUDED.mute_reason",
        )
        .bind(record.user_id.to_string())
        .bind(record.banned)
        .bind(ban_dur)
        .bind(ban_start)
        .bind(ban_end)
        .bind(&record.ban_reason)
        .bind(record.muted)
        .bind(mute_dur)
        .bind(mute_start)
        .bind(mute_end)
        .bind(&record.mute_reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_sanction(&self, user: UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sanctions WHERE user_id = $1")
            .bind(user.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn expired_sanctions(
        &self,
        kind: SanctionKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<SanctionRecord>, StoreError> {
        let sql = match kind {
            SanctionKind::Ban => {
                "SELECT user_id, banned, ban_duration_secs, ban_starts_at, ban_ends_at, ban_reason,
                        muted, mute_duration_secs, mute_starts_at, mute_ends_at, mute_reason
                 FROM sanctions
                 WHERE banned AND ban_ends_at IS NOT NULL AND ban_ends_at < $1
                 ORDER BY user_id"
            }
            SanctionKind::Mute => {
                "SELECT user_id, banned, ban_duration_secs, ban_starts_at, ban_ends_at, ban_reason,
                        muted, mute_duration_secs, mute_starts_at, mute_ends_at, mute_reason
                 FROM sanctions
                 WHERE muted AND mute_ends_at IS NOT NULL AND mute_ends_at < $1
                 ORDER BY user_id"
            }
        };

        let rows = sqlx::query_as::<_, SanctionRow>(sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(SanctionRow::into_record).collect()
    }

    async fn append_action(&self, entry: &ModerationActionEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO moderation_actions (entry_id, action_type, target_user_id, moderator_id,
                                             guild_id, reason, duration_secs, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entry.entry_id)
        .bind(entry.action.to_string())
        .bind(entry.target.to_string())
        .bind(entry.moderator.map(|id| id.to_string()))
        .bind(entry.guild.map(|id| id.to_string()))
        .bind(&entry.reason)
        .bind(entry.duration_secs.map(clamp_secs))
        .bind(entry.created_at)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn actions_for_target(
        &self,
        user: UserId,
    ) -> Result<Vec<ModerationActionEntry>, StoreError> {
        let rows = sqlx::query_as::<_, ActionRow>(
            "SELECT entry_id, action_type, target_user_id, moderator_id, guild_id,
                    reason, duration_secs, created_at, expires_at
             FROM moderation_actions WHERE target_user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActionRow::into_entry).collect()
    }

    async fn upsert_snapshot(&self, snapshot: &RoleSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO role_snapshots (guild_id, user_id, role_id, saved_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (guild_id, user_id, role_id) DO UPDATE SET saved_at = EXCLUDED.saved_at",
        )
        .bind(snapshot.guild_id.to_string())
        .bind(snapshot.user_id.to_string())
        .bind(snapshot.role_id.to_string())
        .bind(snapshot.saved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn snapshots_for(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<RoleSnapshot>, StoreError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT guild_id, user_id, role_id, saved_at
             FROM role_snapshots WHERE guild_id = $1 AND user_id = $2
             ORDER BY role_id",
        )
        .bind(guild.to_string())
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }

    async fn delete_snapshots_for_user(&self, user: UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM role_snapshots WHERE user_id = $1")
            .bind(user.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_snapshots_for_role(&self, role: RoleId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM role_snapshots WHERE role_id = $1")
            .bind(role.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_snapshots_for_guild(&self, guild: GuildId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM role_snapshots WHERE guild_id = $1")
            .bind(guild.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct SanctionRow {
    user_id: String,
    banned: bool,
    ban_duration_secs: Option<i64>,
    ban_starts_at: Option<DateTime<Utc>>,
    ban_ends_at: Option<DateTime<Utc>>,
    ban_reason: Option<String>,
    muted: bool,
    mute_duration_secs: Option<i64>,
    mute_starts_at: Option<DateTime<Utc>>,
    mute_ends_at: Option<DateTime<Utc>>,
    mute_reason: Option<String>,
}

impl SanctionRow {
    fn into_record(self) -> Result<SanctionRecord, StoreError> {
        Ok(SanctionRecord {
            user_id: parse_id::<UserId>("sanctions.user_id", &self.user_id)?,
            banned: self.banned,
            ban_window: window_from_parts(
                self.ban_duration_secs,
                self.ban_starts_at,
                self.ban_ends_at,
            ),
            ban_reason: self.ban_reason,
            muted: self.muted,
            mute_window: window_from_parts(
                self.mute_duration_secs,
                self.mute_starts_at,
                self.mute_ends_at,
            ),
            mute_reason: self.mute_reason,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActionRow {
    entry_id: Uuid,
    action_type: String,
    target_user_id: String,
    moderator_id: Option<String>,
    guild_id: Option<String>,
    reason: String,
    duration_secs: Option<i64>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl ActionRow {
    fn into_entry(self) -> Result<ModerationActionEntry, StoreError> {
        // The action log refuses to load unknown kinds; an audit trail
        // that invents data is worse than one that errors.
        let action = self.action_type.parse().map_err(|_| {
            StoreError::CorruptRow(format!(
                "unknown action_type {:?} in moderation action {}",
                self.action_type, self.entry_id
            ))
        })?;
        Ok(ModerationActionEntry {
            entry_id: self.entry_id,
            action,
            target: parse_id::<UserId>("moderation_actions.target_user_id", &self.target_user_id)?,
            moderator: self
                .moderator_id
                .as_deref()
                .map(|raw| parse_id::<UserId>("moderation_actions.moderator_id", raw))
                .transpose()?,
            guild: self
                .guild_id
                .as_deref()
                .map(|raw| parse_id::<GuildId>("moderation_actions.guild_id", raw))
                .transpose()?,
            reason: self.reason,
            duration_secs: self.duration_secs.map(|secs| secs.max(0) as u64),
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    guild_id: String,
    user_id: String,
    role_id: String,
    saved_at: DateTime<Utc>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<RoleSnapshot, StoreError> {
        Ok(RoleSnapshot {
            guild_id: parse_id::<GuildId>("role_snapshots.guild_id", &self.guild_id)?,
            user_id: parse_id::<UserId>("role_snapshots.user_id", &self.user_id)?,
            role_id: parse_id::<RoleId>("role_snapshots.role_id", &self.role_id)?,
            saved_at: self.saved_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

fn parse_id<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::CorruptRow(format!("bad snowflake in {column}: {raw:?}")))
}

fn window_parts(
    window: Option<&SanctionWindow>,
) -> (Option<i64>, Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match window {
        Some(window) => (
            Some(clamp_secs(window.duration_secs)),
            Some(window.starts_at),
            window.ends_at,
        ),
        None => (None, None, None),
    }
}

fn window_from_parts(
    duration_secs: Option<i64>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) -> Option<SanctionWindow> {
    starts_at.map(|starts_at| SanctionWindow {
        duration_secs: duration_secs.unwrap_or(0).max(0) as u64,
        starts_at,
        ends_at,
    })
}

/// Second counts are u64 in the domain but BIGINT in the schema.
fn clamp_secs(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
