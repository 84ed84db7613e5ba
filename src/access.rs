use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AcError, Result},
    query::FilterExpr,
    registry::AcKey,
};

/// Canonical AC id field conjoined into scoped queries.
pub const AC_ID_FIELD: &str = "aci_id";

/// The fixed role hierarchy. `Admin` and `Supervisor` are both
/// unrestricted tiers with identical AC visibility (the supervisor grant
/// is the current authoritative contract; see DESIGN.md before changing
/// it). `Agent` sees exactly its assigned constituency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    Agent,
}

impl Role {
    /// Role strings arrive from session payloads of several vintages; any
    /// string that is not a known role maps to `None` and therefore to
    /// scope `None`.
    pub fn parse(input: &str) -> Option<Role> {
        match input.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "supervisor" => Some(Role::Supervisor),
            "agent" => Some(Role::Agent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
            Role::Agent => "agent",
        }
    }
}

/// Caller identity as handed over by the (out-of-scope) session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub role: Option<Role>,
    pub assigned_ac: Option<AcKey>,
}

impl Caller {
    pub fn new(role: Option<Role>, assigned_ac: Option<AcKey>) -> Self {
        Self { role, assigned_ac }
    }

    pub fn scope(&self) -> AccessScope {
        scope_for(self.role, self.assigned_ac)
    }

    pub fn can_access(&self, requested: AcKey) -> bool {
        can_access(self.role, self.assigned_ac, requested)
    }
}

/// Per-request visibility over constituency partitions. Derived, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    All,
    Single(AcKey),
    None,
}

pub fn scope_for(role: Option<Role>, assigned_ac: Option<AcKey>) -> AccessScope {
    match role {
        Some(Role::Admin) | Some(Role::Supervisor) => AccessScope::All,
        Some(Role::Agent) => match assigned_ac {
            Some(ac) => AccessScope::Single(ac),
            None => AccessScope::None,
        },
        None => AccessScope::None,
    }
}

/// Rewrites `filter` to enforce `scope`. Purely additive: unrestricted
/// scopes leave the filter untouched, a single-AC scope conjoins an
/// equality clause, and scope `None` fails with `Unauthorized` before any
/// partition is touched rather than masquerading as an empty result set.
pub fn apply_scope(scope: AccessScope, filter: FilterExpr) -> Result<FilterExpr> {
    match scope {
        AccessScope::All => Ok(filter),
        AccessScope::Single(ac) => Ok(filter.and_with(FilterExpr::eq(AC_ID_FIELD, ac))),
        AccessScope::None => Err(AcError::Unauthorized),
    }
}

/// Point-decision form used by handlers that receive an explicit AC key.
/// Implemented through `scope_for` so the two entry points cannot drift.
pub fn can_access(role: Option<Role>, assigned_ac: Option<AcKey>, requested: AcKey) -> bool {
    match scope_for(role, assigned_ac) {
        AccessScope::All => true,
        AccessScope::Single(ac) => ac == requested,
        AccessScope::None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unrestricted_tiers_see_everything() {
        assert_eq!(scope_for(Some(Role::Admin), None), AccessScope::All);
        assert_eq!(
            scope_for(Some(Role::Supervisor), Some(119)),
            AccessScope::All
        );
        assert!(can_access(Some(Role::Admin), None, 127));
        assert!(can_access(Some(Role::Supervisor), Some(119), 121));
    }

    #[test]
    fn agents_see_exactly_their_assignment() {
        assert_eq!(
            scope_for(Some(Role::Agent), Some(119)),
            AccessScope::Single(119)
        );
        assert!(can_access(Some(Role::Agent), Some(119), 119));
        assert!(!can_access(Some(Role::Agent), Some(119), 101));
        assert_eq!(scope_for(Some(Role::Agent), None), AccessScope::None);
        assert!(!can_access(Some(Role::Agent), None, 119));

        let caller = Caller::new(Some(Role::Agent), Some(119));
        assert_eq!(caller.scope(), AccessScope::Single(119));
        assert!(caller.can_access(119));
        assert!(!caller.can_access(121));
    }

    #[test]
    fn unknown_roles_yield_no_scope() {
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(scope_for(None, Some(119)), AccessScope::None);
        assert!(!can_access(None, Some(119), 119));
    }

    #[test]
    fn apply_scope_is_additive() {
        let base = FilterExpr::eq("surveyed", true);
        assert_eq!(
            apply_scope(AccessScope::All, base.clone()).unwrap(),
            base.clone()
        );

        let scoped = apply_scope(AccessScope::Single(119), base).unwrap();
        let visible = json!({"surveyed": true, "aci_id": 119})
            .as_object()
            .cloned()
            .unwrap();
        let hidden = json!({"surveyed": true, "aci_id": 121})
            .as_object()
            .cloned()
            .unwrap();
        assert!(scoped.matches(&visible));
        assert!(!scoped.matches(&hidden));

        assert!(matches!(
            apply_scope(AccessScope::None, FilterExpr::All),
            Err(AcError::Unauthorized)
        ));
    }

    /// `can_access` and `apply_scope` must agree for every role/assignment/
    /// request combination.
    #[test]
    fn point_checks_agree_with_scoped_queries() {
        let roles = [
            None,
            Some(Role::Admin),
            Some(Role::Supervisor),
            Some(Role::Agent),
        ];
        let assignments = [None, Some(119), Some(121)];
        let requests = [113, 119, 121, 127];

        for role in roles {
            for assigned in assignments {
                for requested in requests {
                    let point = can_access(role, assigned, requested);
                    let scope = scope_for(role, assigned);
                    let via_query = match apply_scope(scope, FilterExpr::All) {
                        Err(_) => false,
                        Ok(filter) => {
                            let document = json!({AC_ID_FIELD: requested})
                                .as_object()
                                .cloned()
                                .unwrap();
                            filter.matches(&document)
                        }
                    };
                    assert_eq!(
                        point, via_query,
                        "drift for role={role:?} assigned={assigned:?} requested={requested}"
                    );
                }
            }
        }
    }
}
