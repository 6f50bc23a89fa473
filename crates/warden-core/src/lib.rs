// SPDX-License-Identifier: BUSL-1.1
//! # warden-core — Sanction Domain Model
//!
//! Shared domain types for the warden moderation engine:
//!
//! - **Identity** ([`identity`]): Snowflake identifier newtypes. Each
//!   identifier kind is a distinct type — you cannot pass a [`UserId`]
//!   where a [`RoleId`] is expected.
//!
//! - **Sanctions** ([`sanction`]): The per-user [`SanctionRecord`] (the
//!   single source of truth for ban/mute state), the [`SanctionWindow`]
//!   time range, and the append-only [`ModerationActionEntry`] audit row.
//!
//! - **Durations** ([`duration`]): Parsing of human-entered duration
//!   expressions such as `"3mo 1d 2h"` into a canonical sanction window.
//!   Malformed input degrades to a permanent window, never an error.
//!
//! - **Configuration** ([`config`]): Named comma-separated role-id lists
//!   (sanction roles, approval roles) resolved at call time so operators
//!   can rotate them without a restart.
//!
//! This crate is synchronous and I/O-free; persistence and the live guild
//! surface live in `warden-store` and `warden-gateway`.

pub mod config;
pub mod duration;
pub mod identity;
pub mod sanction;

// Re-export primary types for ergonomic imports.

pub use config::RoleConfig;
pub use duration::{format_duration, parse_duration};
pub use identity::{GuildId, IdParseError, RoleId, UserId};
pub use sanction::{
    ActionKindParseError, ModerationActionEntry, ModerationActionKind, RoleSnapshot,
    SanctionKind, SanctionRecord, SanctionWindow,
};
