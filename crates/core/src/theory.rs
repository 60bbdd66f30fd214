//! The interface between the CDCL search and a decision procedure for a background theory.
//!
//! The solver informs the theory of every literal it assigns, keeps it in sync with the decision
//! levels of the trail, and consults it for consistency at every propagation fixpoint. Theories
//! explain conflicts as sets of literals that are true on the trail but jointly inconsistent.

use crate::lit::{Lit, Var};

/// A set of true literals that the theory cannot satisfy together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TheoryConflict(pub Vec<Lit>);

/// The outcome of checking a complete propositional assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalCheck {
    /// The assignment has a model in the theory.
    Consistent,
    /// The assignment is inconsistent.
    Conflict(TheoryConflict),
    /// The theory needs the search to decide on a new atom. The solver creates a variable for it
    /// and hands it to [`Theory::bind_split`].
    Split,
    /// The theory cannot decide the assignment within its limits.
    GiveUp,
}

pub trait Theory {
    /// Called for every literal that becomes true on the trail, in trail order.
    fn assign(&mut self, lit: Lit) -> Result<(), TheoryConflict>;

    /// Called when boolean propagation reaches a fixpoint.
    fn propagate(&mut self) -> Result<(), TheoryConflict>;

    fn new_decision_level(&mut self);

    /// Undo all assignments made above the given decision level.
    fn backtrack_to(&mut self, decision_level: usize);

    /// Called when every variable is assigned and propagation is at a fixpoint.
    fn final_check(&mut self) -> FinalCheck;

    /// Bind the atom requested by the last [`FinalCheck::Split`] to the given variable.
    fn bind_split(&mut self, var: Var);
}

/// The empty theory, which turns the solver into a plain SAT solver.
#[derive(Default)]
pub struct NoTheory;

impl Theory for NoTheory {
    fn assign(&mut self, _: Lit) -> Result<(), TheoryConflict> {
        Ok(())
    }

    fn propagate(&mut self) -> Result<(), TheoryConflict> {
        Ok(())
    }

    fn new_decision_level(&mut self) {}

    fn backtrack_to(&mut self, _: usize) {}

    fn final_check(&mut self) -> FinalCheck {
        FinalCheck::Consistent
    }

    fn bind_split(&mut self, _: Var) {
        unreachable!("the empty theory never requests a split")
    }
}
