//! Principal/role facts consumed by the scheduling engine
//!
//! Authentication and identity live outside this system. The engine only
//! ever asks one question: does this principal hold the Manager role?

use rsvp_util::PrincipalId;
use std::collections::HashSet;

/// Collaborator contract for role facts about acting principals.
pub trait PrincipalFacts: Send + Sync {
    fn has_manager_role(&self, principal: &PrincipalId) -> bool;
}

/// Role facts backed by a fixed set of manager principal IDs,
/// typically loaded from the service configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPrincipalFacts {
    managers: HashSet<PrincipalId>,
}

impl StaticPrincipalFacts {
    pub fn new(managers: impl IntoIterator<Item = PrincipalId>) -> Self {
        Self {
            managers: managers.into_iter().collect(),
        }
    }
}

impl PrincipalFacts for StaticPrincipalFacts {
    fn has_manager_role(&self, principal: &PrincipalId) -> bool {
        self.managers.contains(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_facts_answer_membership() {
        let facts = StaticPrincipalFacts::new([PrincipalId::new("alice")]);
        assert!(facts.has_manager_role(&PrincipalId::new("alice")));
        assert!(!facts.has_manager_role(&PrincipalId::new("bob")));
    }

    #[test]
    fn empty_facts_grant_nothing() {
        let facts = StaticPrincipalFacts::default();
        assert!(!facts.has_manager_role(&PrincipalId::new("alice")));
    }
}
