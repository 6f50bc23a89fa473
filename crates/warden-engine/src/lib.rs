// SPDX-License-Identifier: BUSL-1.1
//! # warden-engine — Punishment Lifecycle & Reconciliation
//!
//! The persisted sanction record is the single source of truth; live role
//! membership across an unbounded, changing set of guilds is the actual
//! state this engine continually reconciles toward it.
//!
//! - **Authorization** ([`authz`]): pure approval-role and hierarchy
//!   predicate, composed by the command layer before any mutation.
//!
//! - **Moderation** ([`moderation`]): sanction state transitions and the
//!   append-only audit trail. State only — no live role side effects.
//!
//! - **Effects** ([`effects`]): [`RoleEffectApplier`], the sole mutator
//!   of live role membership. Set-difference grant/revoke, idempotent and
//!   safe to retry.
//!
//! - **Reconciliation** ([`reconcile`]): the periodic control loop that
//!   lifts expired sanctions and reverses their role effects in every
//!   guild the bot can see.
//!
//! - **Continuity** ([`continuity`]): role snapshot on departure, restore
//!   on return, bounded by the bot's own role ceiling.
//!
//! - **Patreon guard** ([`patreon`]): debounced correction of role
//!   removals performed by one external integration, or mirror-mode role
//!   synchronization.
//!
//! - **Dispatch** ([`dispatch`]): routes gateway events to the handlers
//!   above; the never-fatal boundary for event processing.
//!
//! ## Concurrency
//!
//! All engine state lives in the store or in guard-owned keyed maps.
//! Every persistence call and every gateway call is a suspension point,
//! and no invariant is held across one — the design instead makes every
//! effect idempotent so overlapping or re-run passes converge.

pub mod authz;
pub mod continuity;
pub mod dispatch;
pub mod effects;
pub mod moderation;
pub mod patreon;
pub mod reconcile;

pub use authz::{authorize, AccessDenied};
pub use continuity::ContinuityEngine;
pub use dispatch::EventRouter;
pub use effects::RoleEffectApplier;
pub use moderation::ModerationService;
pub use patreon::{GuardConfig, GuardMode, PatreonRoleGuard, PATREON_ACTOR};
pub use reconcile::{ReconciliationLoop, TickReport, DEFAULT_RECONCILE_INTERVAL};

use thiserror::Error;

use warden_gateway::GatewayError;
use warden_store::StoreError;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Persistence failure. Aborts the current operation only.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Live guild surface failure. At fan-out sites these are caught
    /// and logged per guild rather than propagated.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}
