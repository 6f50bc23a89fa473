// SPDX-License-Identifier: BUSL-1.1
//! # Sanction Records & Audit Trail
//!
//! The per-user [`SanctionRecord`] is the authoritative sanction state:
//! live role membership across guilds is periodically reconciled *against*
//! it, never the other way around. Every state transition appends a
//! [`ModerationActionEntry`] to the moderation log; log rows are never
//! mutated.
//!
//! A sanction is either bounded by a [`SanctionWindow`] with an end time,
//! or permanent. Permanence has two equivalent encodings, both produced in
//! practice: a window whose `ends_at` is `None` (parsed from an empty
//! duration expression), or no window at all (flags derived from held
//! roles at departure time, where no duration was ever known).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::{GuildId, RoleId, UserId};

// ---------------------------------------------------------------------------
// Sanction kinds
// ---------------------------------------------------------------------------

/// The two kinds of sanction the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    Ban,
    Mute,
}

impl SanctionKind {
    /// The audit action written when this sanction is applied.
    pub const fn applied_action(&self) -> ModerationActionKind {
        match self {
            Self::Ban => ModerationActionKind::Ban,
            Self::Mute => ModerationActionKind::Mute,
        }
    }

    /// The audit action written when this sanction is lifted.
    pub const fn lifted_action(&self) -> ModerationActionKind {
        match self {
            Self::Ban => ModerationActionKind::Unban,
            Self::Mute => ModerationActionKind::Unmute,
        }
    }
}

impl std::fmt::Display for SanctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ban => write!(f, "ban"),
            Self::Mute => write!(f, "mute"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sanction window
// ---------------------------------------------------------------------------

/// The time range during which a sanction is active.
///
/// `duration_secs == 0` and `ends_at == None` together form the permanent
/// marker ("null means infinite").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanctionWindow {
    /// Total sanction length in seconds; `0` means permanent.
    pub duration_secs: u64,
    /// When the sanction took effect.
    pub starts_at: DateTime<Utc>,
    /// When the sanction lapses; `None` means it never does.
    pub ends_at: Option<DateTime<Utc>>,
}

impl SanctionWindow {
    /// The permanent marker: no end time, zero duration.
    pub fn permanent(now: DateTime<Utc>) -> Self {
        Self {
            duration_secs: 0,
            starts_at: now,
            ends_at: None,
        }
    }

    /// A bounded window of `duration_secs` starting at `now`.
    ///
    /// Durations past the representable time range degrade to the
    /// permanent marker rather than failing.
    pub fn bounded(duration_secs: u64, now: DateTime<Utc>) -> Self {
        let ends_at = i64::try_from(duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|delta| now.checked_add_signed(delta));
        match ends_at {
            Some(end) => Self {
                duration_secs,
                starts_at: now,
                ends_at: Some(end),
            },
            None => Self::permanent(now),
        }
    }

    /// Whether this window never lapses.
    pub fn is_permanent(&self) -> bool {
        self.ends_at.is_none()
    }

    /// Whether this window has lapsed as of `now`. Permanent windows
    /// never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|end| end < now)
    }
}

// ---------------------------------------------------------------------------
// Sanction record
// ---------------------------------------------------------------------------

/// Authoritative per-user sanction state, one row per user globally
/// (sanctions span all guilds the service can see).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanctionRecord {
    pub user_id: UserId,
    pub banned: bool,
    pub ban_window: Option<SanctionWindow>,
    pub ban_reason: Option<String>,
    pub muted: bool,
    pub mute_window: Option<SanctionWindow>,
    pub mute_reason: Option<String>,
}

impl SanctionRecord {
    /// A blank record with no active sanctions.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            banned: false,
            ban_window: None,
            ban_reason: None,
            muted: false,
            mute_window: None,
            mute_reason: None,
        }
    }

    /// Whether the given sanction kind is currently flagged active.
    pub fn is_active(&self, kind: SanctionKind) -> bool {
        match kind {
            SanctionKind::Ban => self.banned,
            SanctionKind::Mute => self.muted,
        }
    }

    /// The active window for the given kind, if one was recorded.
    pub fn window(&self, kind: SanctionKind) -> Option<&SanctionWindow> {
        match kind {
            SanctionKind::Ban => self.ban_window.as_ref(),
            SanctionKind::Mute => self.mute_window.as_ref(),
        }
    }

    /// The recorded reason for the given kind.
    pub fn reason(&self, kind: SanctionKind) -> Option<&str> {
        match kind {
            SanctionKind::Ban => self.ban_reason.as_deref(),
            SanctionKind::Mute => self.mute_reason.as_deref(),
        }
    }

    /// Mark the given sanction kind active with its window and reason.
    pub fn apply(&mut self, kind: SanctionKind, window: SanctionWindow, reason: &str) {
        match kind {
            SanctionKind::Ban => {
                self.banned = true;
                self.ban_window = Some(window);
                self.ban_reason = Some(reason.to_string());
            }
            SanctionKind::Mute => {
                self.muted = true;
                self.mute_window = Some(window);
                self.mute_reason = Some(reason.to_string());
            }
        }
    }

    /// Clear the given sanction kind: flag, window, and reason.
    pub fn lift(&mut self, kind: SanctionKind) {
        match kind {
            SanctionKind::Ban => {
                self.banned = false;
                self.ban_window = None;
                self.ban_reason = None;
            }
            SanctionKind::Mute => {
                self.muted = false;
                self.mute_window = None;
                self.mute_reason = None;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Moderation action log
// ---------------------------------------------------------------------------

/// The four audit action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationActionKind {
    Ban,
    Unban,
    Mute,
    Unmute,
}

impl std::fmt::Display for ModerationActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ban => write!(f, "BAN"),
            Self::Unban => write!(f, "UNBAN"),
            Self::Mute => write!(f, "MUTE"),
            Self::Unmute => write!(f, "UNMUTE"),
        }
    }
}

/// Error raised when an audit action kind fails to parse.
///
/// Unlike enum columns elsewhere, the action log never falls back to a
/// default on an unrecognized value — an audit trail that invents data
/// is worse than one that refuses to load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown moderation action kind: {value:?}")]
pub struct ActionKindParseError {
    pub value: String,
}

impl std::str::FromStr for ModerationActionKind {
    type Err = ActionKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BAN" => Ok(Self::Ban),
            "UNBAN" => Ok(Self::Unban),
            "MUTE" => Ok(Self::Mute),
            "UNMUTE" => Ok(Self::Unmute),
            other => Err(ActionKindParseError {
                value: other.to_string(),
            }),
        }
    }
}

/// One append-only moderation log row. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationActionEntry {
    pub entry_id: Uuid,
    pub action: ModerationActionKind,
    pub target: UserId,
    /// Absent for actions taken by the engine itself (e.g. expiry).
    pub moderator: Option<UserId>,
    /// The guild the action was issued from, when issued from one.
    pub guild: Option<GuildId>,
    pub reason: String,
    pub duration_secs: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ModerationActionEntry {
    /// The audit row for applying a sanction.
    pub fn applied(
        kind: SanctionKind,
        target: UserId,
        window: &SanctionWindow,
        moderator: Option<UserId>,
        guild: Option<GuildId>,
        reason: &str,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            action: kind.applied_action(),
            target,
            moderator,
            guild,
            reason: reason.to_string(),
            duration_secs: Some(window.duration_secs),
            created_at: window.starts_at,
            expires_at: window.ends_at,
        }
    }

    /// The audit row for lifting a sanction.
    pub fn lifted(
        kind: SanctionKind,
        target: UserId,
        moderator: Option<UserId>,
        guild: Option<GuildId>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            action: kind.lifted_action(),
            target,
            moderator,
            guild,
            reason: reason.to_string(),
            duration_secs: None,
            created_at: now,
            expires_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Role snapshots
// ---------------------------------------------------------------------------

/// One role held by a member at the moment they left a guild. Unique per
/// `(guild, user, role)`; the full set for a user is replaced wholesale
/// on each departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub saved_at: DateTime<Utc>,
}
