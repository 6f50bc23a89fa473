// SPDX-License-Identifier: BUSL-1.1
//! Countermeasures for the Patreon integration undoing role grants.
//!
//! The integration intermittently strips roles it believes it owns.
//! Two countermeasures exist, chosen by configuration:
//!
//! - **Debounce mode**: when the integration's bot removes exactly one
//!   role from a member, the removal is queued; after a short delay the
//!   whole queued batch is re-granted with an override reason. Removals
//!   arriving while the timer is pending merge into the same batch —
//!   the integration strips several roles in quick succession and each
//!   must be corrected exactly once per batch.
//!
//! - **Mirror mode**: a static trigger→synced mapping. When a member
//!   gains a trigger role, they are granted its synced roles. Simpler
//!   and free of timing assumptions; the recommended mode.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use warden_core::{GuildId, RoleId, UserId};
use warden_gateway::{AuditAction, AuditLogEntry, GuildHost, Member};

/// The Patreon integration's bot user.
pub const PATREON_ACTOR: UserId = UserId::new(216303189073461248);

/// Delay between the first queued removal and the corrective re-grant.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);

const OVERRIDE_REASON: &str = "Overriding Patreon bot removing roles.";
const SYNC_REASON: &str = "Custom Patreon Role Synchronization";

/// Which countermeasure is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardMode {
    Debounce,
    Mirror,
}

/// Guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    pub mode: GuardMode,
    /// The external actor whose removals are corrected (debounce mode).
    pub actor: UserId,
    pub debounce: Duration,
    /// Trigger role → roles to grant alongside it (mirror mode).
    pub sync_roles: BTreeMap<RoleId, Vec<RoleId>>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            mode: GuardMode::Mirror,
            actor: PATREON_ACTOR,
            debounce: DEFAULT_DEBOUNCE,
            sync_roles: BTreeMap::new(),
        }
    }
}

/// Debounced corrective loop for external role removals.
pub struct PatreonRoleGuard<G> {
    gateway: Arc<G>,
    config: GuardConfig,
    /// Roles awaiting re-application, keyed by the affected member.
    /// Created on the first qualifying removal, merged on repeats,
    /// evicted when the batch is re-granted.
    pending: Arc<DashMap<(GuildId, UserId), Vec<RoleId>>>,
}

impl<G: GuildHost + 'static> PatreonRoleGuard<G> {
    pub fn new(gateway: Arc<G>, config: GuardConfig) -> Self {
        Self {
            gateway,
            config,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Whether a corrective batch is pending for the member. Test hook.
    pub fn is_scheduled(&self, guild: GuildId, user: UserId) -> bool {
        self.pending.contains_key(&(guild, user))
    }

    /// Debounce mode: inspect an audit-log entry and queue a correction
    /// if it is the configured actor removing exactly one role.
    pub async fn on_audit_log_entry(&self, guild: GuildId, entry: &AuditLogEntry) {
        if self.config.mode != GuardMode::Debounce {
            return;
        }
        if entry.actor != Some(self.config.actor) {
            return;
        }
        if entry.action != AuditAction::MemberRoleUpdate {
            return;
        }
        let Some(role) = entry.single_role_removal() else {
            return;
        };
        let Some(user) = entry.target else {
            return;
        };

        let key = (guild, user);
        let first = {
            let mut batch = self.pending.entry(key).or_default();
            let first = batch.is_empty();
            batch.push(role);
            first
        };

        tracing::info!(guild = %guild, user = %user, role = %role, "queued corrective role re-grant");

        // Only the first entry arms the timer; later removals ride along
        // in the same batch instead of scheduling a second one.
        if first {
            self.arm(key);
        }
    }

    fn arm(&self, key: (GuildId, UserId)) {
        let gateway = Arc::clone(&self.gateway);
        let pending = Arc::clone(&self.pending);
        let debounce = self.config.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let Some((_, batch)) = pending.remove(&key) else {
                return;
            };
            let (guild, user) = key;
            for role in batch {
                if let Err(err) = gateway.add_role(guild, user, role, OVERRIDE_REASON).await {
                    tracing::warn!(
                        guild = %guild,
                        user = %user,
                        role = %role,
                        error = %err,
                        "corrective role re-grant failed"
                    );
                }
            }
            tracing::info!(guild = %guild, user = %user, "completed corrective role re-grant");
        });
    }

    /// Mirror mode: grant synced roles for each trigger role the member
    /// just gained. Failures are logged per member, never fatal.
    pub async fn on_member_update(&self, guild: GuildId, before: &Member, after: &Member) {
        if self.config.mode != GuardMode::Mirror {
            return;
        }
        for (trigger, synced) in &self.config.sync_roles {
            if before.has_role(*trigger) || !after.has_role(*trigger) {
                continue;
            }
            match self
                .gateway
                .add_roles(guild, after.user_id, synced, SYNC_REASON)
                .await
            {
                Ok(()) => tracing::info!(
                    guild = %guild,
                    user = %after.user_id,
                    trigger = %trigger,
                    synced = synced.len(),
                    "synchronized roles for gained trigger role"
                ),
                Err(err) => tracing::error!(
                    guild = %guild,
                    user = %after.user_id,
                    trigger = %trigger,
                    error = %err,
                    "failed to synchronize roles"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_gateway::{InMemoryGateway, RoleChange, RoleOp};

    const GUILD: GuildId = GuildId::new(1);
    const USER: UserId = UserId::new(2);

    fn removal_entry(actor: UserId, role: RoleId) -> AuditLogEntry {
        AuditLogEntry {
            actor: Some(actor),
            action: AuditAction::MemberRoleUpdate,
            changes: vec![RoleChange::Removed(vec![role])],
            target: Some(USER),
        }
    }

    fn debounce_guard(
        gateway: &Arc<InMemoryGateway>,
        debounce: Duration,
    ) -> PatreonRoleGuard<InMemoryGateway> {
        PatreonRoleGuard::new(
            Arc::clone(gateway),
            GuardConfig {
                mode: GuardMode::Debounce,
                actor: PATREON_ACTOR,
                debounce,
                sync_roles: BTreeMap::new(),
            },
        )
    }

    fn gateway_with_member() -> Arc<InMemoryGateway> {
        let gateway = Arc::new(InMemoryGateway::new(UserId::new(99)));
        gateway.add_guild(GUILD);
        gateway.place_member(GUILD, USER, &[]);
        gateway
    }

    #[tokio::test]
    async fn two_removals_in_the_window_produce_one_batch() {
        let gateway = gateway_with_member();
        let guard = debounce_guard(&gateway, Duration::from_millis(20));

        guard
            .on_audit_log_entry(GUILD, &removal_entry(PATREON_ACTOR, RoleId::new(10)))
            .await;
        guard
            .on_audit_log_entry(GUILD, &removal_entry(PATREON_ACTOR, RoleId::new(11)))
            .await;
        assert!(guard.is_scheduled(GUILD, USER));

        tokio::time::sleep(Duration::from_millis(60)).await;

        // Both roles re-granted, in one batch, exactly once each.
        let grants: Vec<RoleId> = gateway
            .journal()
            .into_iter()
            .map(|op| match op {
                RoleOp::Grant { role, reason, .. } => {
                    assert_eq!(reason, OVERRIDE_REASON);
                    role
                }
                other => panic!("unexpected op: {other:?}"),
            })
            .collect();
        assert_eq!(grants, vec![RoleId::new(10), RoleId::new(11)]);
        assert!(!guard.is_scheduled(GUILD, USER));
    }

    #[tokio::test]
    async fn non_qualifying_entries_are_ignored() {
        let gateway = gateway_with_member();
        let guard = debounce_guard(&gateway, Duration::from_millis(5));

        // Wrong actor.
        guard
            .on_audit_log_entry(GUILD, &removal_entry(UserId::new(3), RoleId::new(10)))
            .await;
        // Addition, not removal.
        guard
            .on_audit_log_entry(
                GUILD,
                &AuditLogEntry {
                    actor: Some(PATREON_ACTOR),
                    action: AuditAction::MemberRoleUpdate,
                    changes: vec![RoleChange::Added(vec![RoleId::new(10)])],
                    target: Some(USER),
                },
            )
            .await;
        // Wrong action kind.
        guard
            .on_audit_log_entry(
                GUILD,
                &AuditLogEntry {
                    actor: Some(PATREON_ACTOR),
                    action: AuditAction::Other,
                    changes: vec![RoleChange::Removed(vec![RoleId::new(10)])],
                    target: Some(USER),
                },
            )
            .await;

        assert!(!guard.is_scheduled(GUILD, USER));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(gateway.journal().is_empty());
    }

    #[tokio::test]
    async fn mirror_mode_grants_synced_roles_on_trigger_gain() {
        let gateway = gateway_with_member();
        let trigger = RoleId::new(100);
        let guard = PatreonRoleGuard::new(
            Arc::clone(&gateway),
            GuardConfig {
                mode: GuardMode::Mirror,
                sync_roles: BTreeMap::from([(
                    trigger,
                    vec![RoleId::new(200), RoleId::new(201)],
                )]),
                ..GuardConfig::default()
            },
        );

        let before = Member::new(USER);
        let after = Member::new(USER).with_roles([trigger]);
        guard.on_member_update(GUILD, &before, &after).await;

        let member = gateway.member(GUILD, USER).await.unwrap().unwrap();
        assert!(member.has_role(RoleId::new(200)) && member.has_role(RoleId::new(201)));
    }

    #[tokio::test]
    async fn mirror_mode_ignores_already_held_triggers() {
        let gateway = gateway_with_member();
        let trigger = RoleId::new(100);
        let guard = PatreonRoleGuard::new(
            Arc::clone(&gateway),
            GuardConfig {
                mode: GuardMode::Mirror,
                sync_roles: BTreeMap::from([(trigger, vec![RoleId::new(200)])]),
                ..GuardConfig::default()
            },
        );

        let before = Member::new(USER).with_roles([trigger]);
        let after = Member::new(USER).with_roles([trigger]);
        guard.on_member_update(GUILD, &before, &after).await;

        assert!(gateway.journal().is_empty());
    }
}
