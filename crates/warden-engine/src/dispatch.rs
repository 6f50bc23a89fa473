// SPDX-License-Identifier: BUSL-1.1
//! Gateway event routing.
//!
//! One entry point for the platform adapter's event stream. Handler
//! failures are logged and swallowed here — event processing is never
//! fatal to the process.

use chrono::Utc;

use warden_gateway::{GatewayEvent, GuildHost};
use warden_store::SanctionStore;

use crate::continuity::ContinuityEngine;
use crate::patreon::PatreonRoleGuard;

/// Routes gateway events to the continuity engine and the role guard.
pub struct EventRouter<S, G> {
    continuity: ContinuityEngine<S, G>,
    guard: PatreonRoleGuard<G>,
}

impl<S: SanctionStore, G: GuildHost + 'static> EventRouter<S, G> {
    pub fn new(continuity: ContinuityEngine<S, G>, guard: PatreonRoleGuard<G>) -> Self {
        Self { continuity, guard }
    }

    /// Handle one gateway event.
    pub async fn handle(&self, event: GatewayEvent) {
        let outcome = match event {
            GatewayEvent::MemberJoined { guild, member } => {
                self.continuity.on_member_join(guild, &member).await
            }
            GatewayEvent::MemberLeft { guild, member } => {
                self.continuity.on_member_leave(guild, &member, Utc::now()).await
            }
            GatewayEvent::MemberUpdated {
                guild,
                before,
                after,
            } => {
                self.guard.on_member_update(guild, &before, &after).await;
                Ok(())
            }
            GatewayEvent::RoleDeleted { role, .. } => self.continuity.on_role_deleted(role).await,
            GatewayEvent::GuildLeft { guild } => self.continuity.on_guild_left(guild).await,
            GatewayEvent::AuditLogEntry { guild, entry } => {
                self.guard.on_audit_log_entry(guild, &entry).await;
                Ok(())
            }
        };

        if let Err(err) = outcome {
            tracing::error!(error = %err, "gateway event handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use warden_core::{
        config::BANNED_ROLES_VAR, GuildId, RoleConfig, RoleId, UserId,
    };
    use warden_gateway::{InMemoryGateway, Member};
    use warden_store::{MemoryStore, SanctionStore};

    use crate::effects::RoleEffectApplier;
    use crate::patreon::GuardConfig;

    const GUILD: GuildId = GuildId::new(1);
    const USER: UserId = UserId::new(2);

    fn router() -> (Arc<MemoryStore>, EventRouter<MemoryStore, InMemoryGateway>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(InMemoryGateway::new(UserId::new(99)));
        gateway.add_guild(GUILD);
        gateway.place_member(GUILD, USER, &[]);

        let config = Arc::new(RoleConfig::from_map(HashMap::from([(
            BANNED_ROLES_VAR.to_string(),
            "20".to_string(),
        )])));
        let effects = RoleEffectApplier::new(Arc::clone(&gateway), Arc::clone(&config));
        let continuity = ContinuityEngine::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            effects,
            config,
        );
        let guard = PatreonRoleGuard::new(gateway, GuardConfig::default());
        (Arc::clone(&store), EventRouter::new(continuity, guard))
    }

    #[tokio::test]
    async fn departure_events_reach_the_continuity_engine() {
        let (store, router) = router();
        let member = Member::new(USER).with_roles([RoleId::new(30)]);
        router
            .handle(GatewayEvent::MemberLeft {
                guild: GUILD,
                member,
            })
            .await;

        assert_eq!(store.snapshots_for(GUILD, USER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn handler_failures_are_swallowed() {
        let (store, router) = router();
        // A banned member joining a guild the gateway has never seen:
        // the sanction role grant fails inside the handler; the router
        // must neither panic nor propagate.
        let mut record = warden_core::SanctionRecord::new(USER);
        record.banned = true;
        store.upsert_sanction(&record).await.unwrap();

        router
            .handle(GatewayEvent::MemberJoined {
                guild: GuildId::new(999),
                member: Member::new(USER),
            })
            .await;
    }
}
