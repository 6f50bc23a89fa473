// SPDX-License-Identifier: BUSL-1.1
//! Authorization and hierarchy checks.
//!
//! A pure predicate, evaluated by the command layer *before* any state
//! mutation: the caller must hold at least one role from the configured
//! approval set, and the target must sit strictly below the caller in
//! the role hierarchy. Rejections are typed values, not errors thrown
//! mid-mutation.

use thiserror::Error;

use warden_core::RoleId;
use warden_gateway::Member;

/// Typed rejection reasons. The `Display` text is the human-readable
/// message surfaced to the invoking caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    /// The caller holds none of the approval roles for this action.
    #[error("You do not have the required permissions to execute this command!")]
    MissingApprovalRole,

    /// The target's highest role position is at or above the caller's.
    #[error("The target user has greater or equal permissions to you!")]
    TargetNotBelow,
}

/// Authorize `caller` to act on `target`.
///
/// `target` is `None` when the target has no membership in the guild the
/// action was issued from — the hierarchy comparison is skipped (there is
/// no live hierarchy to compare against) and only the approval-role check
/// applies.
pub fn authorize(
    caller: &Member,
    target: Option<&Member>,
    approval_roles: &[RoleId],
) -> Result<(), AccessDenied> {
    if !caller.has_any_role(approval_roles) {
        return Err(AccessDenied::MissingApprovalRole);
    }

    if let Some(target) = target {
        // Equal-or-higher is rejected; only a strictly lower target passes.
        if target.highest_role_position >= caller.highest_role_position {
            return Err(AccessDenied::TargetNotBelow);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::UserId;

    const APPROVAL: &[RoleId] = &[RoleId::new(50)];

    fn member(id: u64, roles: &[u64], position: i64) -> Member {
        Member::new(UserId::new(id))
            .with_roles(roles.iter().copied().map(RoleId::new))
            .with_highest_position(position)
    }

    #[test]
    fn caller_without_approval_role_is_rejected() {
        let caller = member(1, &[51], 10);
        let target = member(2, &[], 1);
        assert_eq!(
            authorize(&caller, Some(&target), APPROVAL),
            Err(AccessDenied::MissingApprovalRole)
        );
    }

    #[test]
    fn equal_hierarchy_position_is_rejected() {
        let caller = member(1, &[50], 10);
        let target = member(2, &[], 10);
        assert_eq!(
            authorize(&caller, Some(&target), APPROVAL),
            Err(AccessDenied::TargetNotBelow)
        );
    }

    #[test]
    fn one_position_higher_is_accepted() {
        let caller = member(1, &[50], 11);
        let target = member(2, &[], 10);
        assert_eq!(authorize(&caller, Some(&target), APPROVAL), Ok(()));
    }

    #[test]
    fn absent_target_skips_the_hierarchy_check() {
        let caller = member(1, &[50], 0);
        assert_eq!(authorize(&caller, None, APPROVAL), Ok(()));
    }

    #[test]
    fn approval_check_runs_before_hierarchy_check() {
        // Both checks would fail; the approval rejection wins because it
        // is evaluated first.
        let caller = member(1, &[], 5);
        let target = member(2, &[], 10);
        assert_eq!(
            authorize(&caller, Some(&target), APPROVAL),
            Err(AccessDenied::MissingApprovalRole)
        );
    }
}
