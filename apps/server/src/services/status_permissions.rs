//! Which application status transitions each kind of user may perform.
//!
//! Workshops without competitive selection never use `AcceptedForSelection`;
//! workshops with it get the selection-specific transitions instead of the
//! direct ones. Every check is "some allow rule matches and no deny rule does".

use lazy_static::lazy_static;

use crate::models::{ApplicationStatus, Role};

use ApplicationStatus::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Actor {
    Admin,
    Parent,
    Provider,
}

impl Actor {
    fn of(role: Role) -> Self {
        match role {
            Role::Parent => Actor::Parent,
            Role::Provider => Actor::Provider,
            Role::TechAdmin | Role::MinistryAdmin | Role::RegionAdmin | Role::AreaAdmin => {
                Actor::Admin
            }
        }
    }
}

/// `None` matches anything.
#[derive(Debug, Clone, Copy)]
struct Rule {
    actor: Option<Actor>,
    from: Option<ApplicationStatus>,
    to: Option<ApplicationStatus>,
}

impl Rule {
    fn matches(&self, actor: Actor, from: ApplicationStatus, to: ApplicationStatus) -> bool {
        self.actor.map_or(true, |a| a == actor)
            && self.from.map_or(true, |f| f == from)
            && self.to.map_or(true, |t| t == to)
    }
}

#[derive(Debug, Default)]
struct StatusPermissions {
    allowed: Vec<Rule>,
    denied: Vec<Rule>,
}

impl StatusPermissions {
    fn allow(&mut self, actor: Actor, from: ApplicationStatus, to: &[ApplicationStatus]) {
        self.allowed.extend(to.iter().map(|&to| Rule {
            actor: Some(actor),
            from: Some(from),
            to: Some(to),
        }));
    }

    fn allow_to_any(&mut self, actor: Actor, from: ApplicationStatus) {
        self.allowed.push(Rule {
            actor: Some(actor),
            from: Some(from),
            to: None,
        });
    }

    fn deny_to(&mut self, to: ApplicationStatus) {
        self.denied.push(Rule {
            actor: None,
            from: None,
            to: Some(to),
        });
    }

    fn common() -> Self {
        let mut p = Self::default();

        p.allow_to_any(Actor::Admin, Pending);
        p.allow(Actor::Admin, Approved, &[StudyingForYears, Rejected]);
        p.allow(Actor::Admin, StudyingForYears, &[Completed]);

        p.allow(Actor::Parent, Pending, &[Left]);
        p.allow(Actor::Parent, Approved, &[Left]);
        p.allow(Actor::Parent, StudyingForYears, &[Left]);

        p.allow(Actor::Provider, Approved, &[Completed, Rejected]);
        p.allow(Actor::Provider, StudyingForYears, &[Completed, Rejected]);
        p.allow(
            Actor::Provider,
            Rejected,
            &[Approved, StudyingForYears, Completed],
        );
        p.allow(Actor::Provider, Left, &[StudyingForYears]);
        p
    }

    fn default_mode() -> Self {
        let mut p = Self::common();

        p.allow(Actor::Admin, Approved, &[Pending, Completed, Left]);
        p.allow(Actor::Admin, StudyingForYears, &[Rejected, Left]);

        p.allow(Actor::Parent, Rejected, &[Pending]);
        p.allow(Actor::Parent, Left, &[Pending]);

        p.allow(
            Actor::Provider,
            Pending,
            &[Approved, Completed, Rejected, StudyingForYears],
        );
        p.allow(Actor::Provider, Approved, &[StudyingForYears]);
        p.allow(Actor::Provider, Left, &[Approved, Completed, Rejected]);
        p.allow(Actor::Provider, StudyingForYears, &[Approved]);

        p.deny_to(AcceptedForSelection);
        p
    }

    fn competitive_mode() -> Self {
        let mut p = Self::common();

        p.allow(Actor::Admin, Rejected, &[Pending]);
        p.allow(
            Actor::Admin,
            AcceptedForSelection,
            &[Approved, StudyingForYears, Rejected],
        );

        p.allow(Actor::Parent, AcceptedForSelection, &[Left]);

        p.allow(Actor::Provider, Pending, &[AcceptedForSelection, Rejected]);
        p.allow(
            Actor::Provider,
            AcceptedForSelection,
            &[Approved, Completed, Rejected, StudyingForYears],
        );
        p.allow(Actor::Provider, Approved, &[StudyingForYears]);
        p.allow(Actor::Provider, Rejected, &[Pending, AcceptedForSelection]);
        p
    }

    fn permits(&self, actor: Actor, from: ApplicationStatus, to: ApplicationStatus) -> bool {
        self.allowed.iter().any(|r| r.matches(actor, from, to))
            && !self.denied.iter().any(|r| r.matches(actor, from, to))
    }
}

lazy_static! {
    static ref DEFAULT_MODE: StatusPermissions = StatusPermissions::default_mode();
    static ref COMPETITIVE_MODE: StatusPermissions = StatusPermissions::competitive_mode();
}

/// Whether a user with `role` may move an application from `from` to `to` in
/// a workshop with (or without) competitive selection.
pub fn can_change_status(
    competitive_selection: bool,
    role: Role,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> bool {
    let table: &StatusPermissions = if competitive_selection {
        &COMPETITIVE_MODE
    } else {
        &DEFAULT_MODE
    };
    table.permits(Actor::of(role), from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_may_move_pending_anywhere_except_selection_in_default_mode() {
        for &to in ApplicationStatus::ALL {
            let expected = to != AcceptedForSelection;
            assert_eq!(
                can_change_status(false, Role::RegionAdmin, Pending, to),
                expected,
                "Pending -> {to}"
            );
        }
        assert!(can_change_status(true, Role::TechAdmin, Pending, AcceptedForSelection));
    }

    #[test]
    fn parents_can_only_leave_or_reapply() {
        assert!(can_change_status(false, Role::Parent, Approved, Left));
        assert!(can_change_status(false, Role::Parent, Rejected, Pending));
        assert!(!can_change_status(false, Role::Parent, Pending, Approved));
        assert!(!can_change_status(true, Role::Parent, Rejected, Pending));
        assert!(can_change_status(true, Role::Parent, AcceptedForSelection, Left));
    }

    #[test]
    fn providers_follow_the_selection_mode() {
        assert!(can_change_status(false, Role::Provider, Pending, Approved));
        assert!(!can_change_status(true, Role::Provider, Pending, Approved));
        assert!(can_change_status(true, Role::Provider, Pending, AcceptedForSelection));
        assert!(!can_change_status(false, Role::Provider, Pending, AcceptedForSelection));
        assert!(can_change_status(true, Role::Provider, AcceptedForSelection, Approved));
        assert!(can_change_status(false, Role::Provider, Left, Completed));
        assert!(!can_change_status(true, Role::Provider, Left, Completed));
    }

    #[test]
    fn completed_is_final_for_everyone() {
        for role in [Role::TechAdmin, Role::Parent, Role::Provider] {
            for &to in ApplicationStatus::ALL {
                assert!(!can_change_status(false, role, Completed, to));
                assert!(!can_change_status(true, role, Completed, to));
            }
        }
    }
}
