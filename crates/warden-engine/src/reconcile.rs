// SPDX-License-Identifier: BUSL-1.1
//! The periodic reconciliation loop.
//!
//! Each tick scans the store for sanctions whose window lapsed, lifts
//! them (state + audit row), and fans out across every guild the bot can
//! see to strip the corresponding sanction roles. Desired state is
//! centralized in the store; actual state is distributed across an
//! unbounded, changing set of guilds — the loop only ever converges the
//! latter toward the former, so re-running a tick after a partial
//! failure is safe by construction (idempotent lift, idempotent role
//! removal).
//!
//! Per-guild failures are logged and skipped: the member may never have
//! been sanctioned in that particular guild, may have left it, or the
//! bot may lack permission there. None of that is the tick's concern.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use warden_core::{SanctionKind, SanctionRecord};
use warden_gateway::GuildHost;
use warden_store::SanctionStore;

use crate::effects::RoleEffectApplier;
use crate::moderation::ModerationService;
use crate::EngineError;

/// How often the loop runs when not otherwise configured.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// The audit reason written when a sanction lapses on its own.
const EXPIRED_REASON: &str = "Expired";

/// Summary of one tick, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub lifted_bans: usize,
    pub lifted_mutes: usize,
    /// Sanction roles actually revoked across all guilds.
    pub roles_removed: usize,
    /// Guild fan-out failures that were logged and skipped.
    pub guild_failures: usize,
}

impl TickReport {
    fn lifted(&self) -> usize {
        self.lifted_bans + self.lifted_mutes
    }
}

/// The reconciliation control loop.
pub struct ReconciliationLoop<S, G> {
    store: Arc<S>,
    moderation: ModerationService<S>,
    effects: RoleEffectApplier<G>,
    gateway: Arc<G>,
    interval: Duration,
}

impl<S: SanctionStore, G: GuildHost> ReconciliationLoop<S, G> {
    pub fn new(
        store: Arc<S>,
        moderation: ModerationService<S>,
        effects: RoleEffectApplier<G>,
        gateway: Arc<G>,
    ) -> Self {
        Self {
            store,
            moderation,
            effects,
            gateway,
            interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one reconciliation pass as of `now`.
    ///
    /// Persistence failures abort the tick and propagate; gateway
    /// failures are absorbed per guild and counted in the report.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        let mut report = TickReport::default();
        for kind in [SanctionKind::Ban, SanctionKind::Mute] {
            let expired = self.store.expired_sanctions(kind, now).await?;
            for record in expired {
                self.sweep(kind, &record, now, &mut report).await?;
            }
        }
        Ok(report)
    }

    async fn sweep(
        &self,
        kind: SanctionKind,
        record: &SanctionRecord,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        let user = record.user_id;
        self.moderation
            .lift_sanction(kind, user, None, None, EXPIRED_REASON, now)
            .await?;
        match kind {
            SanctionKind::Ban => report.lifted_bans += 1,
            SanctionKind::Mute => report.lifted_mutes += 1,
        }

        // A user with no presence in any known guild is still
        // unsanctioned at the state layer; cleanup is simply skipped.
        for guild in self.gateway.guild_ids().await {
            match self.cleanup_guild(kind, guild, user).await {
                Ok(revoked) => report.roles_removed += revoked,
                Err(err) => {
                    tracing::warn!(
                        kind = %kind,
                        guild = %guild,
                        user = %user,
                        error = %err,
                        "sanction role cleanup failed in guild, continuing"
                    );
                    report.guild_failures += 1;
                }
            }
        }

        tracing::info!(kind = %kind, user = %user, "expired sanction lifted");
        Ok(())
    }

    async fn cleanup_guild(
        &self,
        kind: SanctionKind,
        guild: warden_core::GuildId,
        user: warden_core::UserId,
    ) -> Result<usize, EngineError> {
        let Some(member) = self.gateway.member(guild, user).await? else {
            return Ok(0);
        };
        self.effects
            .remove_sanction_roles(kind, guild, &member, EXPIRED_REASON)
            .await
    }

    /// Drive [`Self::tick`] on a fixed interval until dropped.
    ///
    /// `MissedTickBehavior::Delay` serializes passes: a tick that runs
    /// longer than the interval delays the next one instead of
    /// overlapping it. A failed tick is logged and the loop keeps
    /// running — in-flight windows are simply re-evaluated next time.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.tick(Utc::now()).await {
                Ok(report) if report.lifted() > 0 => {
                    tracing::info!(
                        lifted_bans = report.lifted_bans,
                        lifted_mutes = report.lifted_mutes,
                        roles_removed = report.roles_removed,
                        guild_failures = report.guild_failures,
                        "reconciliation tick complete"
                    );
                }
                Ok(_) => tracing::debug!("reconciliation tick: nothing expired"),
                Err(err) => tracing::error!(error = %err, "reconciliation tick failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use warden_core::{
        config::{BANNED_ROLES_VAR, MUTED_ROLES_VAR},
        GuildId, RoleConfig, RoleId, SanctionWindow, UserId,
    };
    use warden_gateway::InMemoryGateway;
    use warden_store::MemoryStore;

    const GUILD: GuildId = GuildId::new(1);
    const USER: UserId = UserId::new(2);
    const BAN_ROLE: RoleId = RoleId::new(20);

    fn now() -> DateTime<Utc> {
        "2026-08-07T12:00:00Z".parse().unwrap()
    }

    fn fixture() -> (
        Arc<MemoryStore>,
        Arc<InMemoryGateway>,
        ReconciliationLoop<MemoryStore, InMemoryGateway>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(InMemoryGateway::new(UserId::new(99)));
        gateway.add_guild(GUILD);
        gateway.place_member(GUILD, USER, &[BAN_ROLE]);

        let config = Arc::new(RoleConfig::from_map(HashMap::from([
            (BANNED_ROLES_VAR.to_string(), BAN_ROLE.to_string()),
            (MUTED_ROLES_VAR.to_string(), "30".to_string()),
        ])));
        let moderation = ModerationService::new(Arc::clone(&store));
        let effects = RoleEffectApplier::new(Arc::clone(&gateway), config);
        let reconciler = ReconciliationLoop::new(
            Arc::clone(&store),
            moderation,
            effects,
            Arc::clone(&gateway),
        );
        (store, gateway, reconciler)
    }

    async fn ban_expiring(store: &MemoryStore, user: UserId, secs: u64) {
        let mut record = warden_core::SanctionRecord::new(user);
        record.apply(SanctionKind::Ban, SanctionWindow::bounded(secs, now()), "test");
        store.upsert_sanction(&record).await.unwrap();
    }

    #[tokio::test]
    async fn tick_lifts_expired_sanctions_and_strips_roles() {
        let (store, gateway, reconciler) = fixture();
        ban_expiring(&store, USER, 60).await;

        let report = reconciler.tick(now() + chrono::Duration::seconds(120)).await.unwrap();
        assert_eq!(report.lifted_bans, 1);
        assert_eq!(report.roles_removed, 1);
        assert_eq!(report.guild_failures, 0);

        let record = store.find_sanction(USER).await.unwrap().unwrap();
        assert!(!record.banned);
        let member = gateway.member(GUILD, USER).await.unwrap().unwrap();
        assert!(!member.has_role(BAN_ROLE));
    }

    #[tokio::test]
    async fn tick_ignores_running_sanctions() {
        let (store, _gateway, reconciler) = fixture();
        ban_expiring(&store, USER, 3600).await;

        let report = reconciler.tick(now() + chrono::Duration::seconds(60)).await.unwrap();
        assert_eq!(report, TickReport::default());
        assert!(store.find_sanction(USER).await.unwrap().unwrap().banned);
    }

    #[tokio::test]
    async fn member_absent_from_all_guilds_is_still_unsanctioned() {
        let (store, gateway, reconciler) = fixture();
        gateway.remove_member(GUILD, USER);
        ban_expiring(&store, USER, 60).await;

        let report = reconciler.tick(now() + chrono::Duration::seconds(120)).await.unwrap();
        assert_eq!(report.lifted_bans, 1);
        assert_eq!(report.roles_removed, 0);
        assert_eq!(report.guild_failures, 0);
        assert!(!store.find_sanction(USER).await.unwrap().unwrap().banned);
    }

    #[tokio::test]
    async fn second_tick_is_a_no_op() {
        let (store, gateway, reconciler) = fixture();
        ban_expiring(&store, USER, 60).await;
        let later = now() + chrono::Duration::seconds(120);

        reconciler.tick(later).await.unwrap();
        let journal_len = gateway.journal().len();
        let actions = store.action_count();

        let report = reconciler.tick(later).await.unwrap();
        assert_eq!(report, TickReport::default());
        assert_eq!(gateway.journal().len(), journal_len);
        assert_eq!(store.action_count(), actions);
    }
}
