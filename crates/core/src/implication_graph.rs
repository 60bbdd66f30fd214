use crate::{clause::ClauseRef, lit::Var, storage::KeyedVec};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Reason {
    /// The literal was decided, or asserted at the root without an antecedent.
    #[default]
    Decision,
    /// The literal was propagated by the clause, where the literal is at position 0.
    Clause(ClauseRef),
}

impl From<ClauseRef> for Reason {
    fn from(clause_ref: ClauseRef) -> Self {
        Reason::Clause(clause_ref)
    }
}

/// Records for every assigned variable why, and at which decision level, it was assigned.
#[derive(Default)]
pub struct ImplicationGraph {
    reasons: KeyedVec<Var, Reason>,
    levels: KeyedVec<Var, usize>,
}

impl ImplicationGraph {
    pub fn grow_to(&mut self, var: Var) {
        self.reasons.grow_to(var);
        self.levels.grow_to(var);
    }

    /// Get the reason for the assignment of the given variable. In case the variable is not
    /// assigned, this will return stale data.
    pub fn reason(&self, var: Var) -> Reason {
        self.reasons[var]
    }

    /// Get the decision level at which the given variable was assigned. In case the variable is
    /// not assigned, this will return stale data.
    pub fn level(&self, var: Var) -> usize {
        self.levels[var]
    }

    pub fn add(&mut self, var: Var, reason: Reason, level: usize) {
        self.reasons[var] = reason;
        self.levels[var] = level;
    }
}
