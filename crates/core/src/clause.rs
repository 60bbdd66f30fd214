use std::{
    fmt::Debug,
    ops::{Index, IndexMut},
};

use crate::lit::Lit;

pub struct Clause {
    lits: Box<[Lit]>,
    is_learned: bool,
}

impl Clause {
    pub fn iter(&self) -> impl Iterator<Item = &Lit> {
        self.lits.iter()
    }

    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.lits.len()
    }

    pub fn swap(&mut self, idx1: usize, idx2: usize) {
        self.lits.swap(idx1, idx2);
    }
}

impl Index<usize> for Clause {
    type Output = Lit;

    fn index(&self, index: usize) -> &Self::Output {
        &self.lits[index]
    }
}

impl Debug for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.lits.iter()).finish()
    }
}

/// Owns every clause of the solver. Problem clauses and learned clauses are watched by the
/// solver, explanation clauses only serve as the starting point of conflict analysis.
#[derive(Default)]
pub struct ClauseDb {
    clauses: Vec<Clause>,
    num_learned: usize,
}

impl ClauseDb {
    pub fn add_clause(&mut self, lits: impl AsRef<[Lit]>) -> ClauseRef {
        assert!(
            lits.as_ref().len() > 1,
            "The clause db cannot add the empty clause or a unit clause."
        );

        self.push(lits.as_ref(), false)
    }

    pub fn add_learned_clause(&mut self, lits: impl AsRef<[Lit]>) -> ClauseRef {
        assert!(lits.as_ref().len() > 1, "Learned unit clauses are not stored.");

        self.num_learned += 1;
        self.push(lits.as_ref(), true)
    }

    /// Store the negation of a theory explanation, so conflict analysis can treat it as any
    /// other conflicting clause.
    pub fn add_explanation_clause(&mut self, lits: impl AsRef<[Lit]>) -> ClauseRef {
        assert!(!lits.as_ref().is_empty(), "Explanations cannot be empty.");

        self.push(lits.as_ref(), false)
    }

    pub fn is_learned(&self, clause_ref: ClauseRef) -> bool {
        self[clause_ref].is_learned
    }

    pub fn num_learned(&self) -> usize {
        self.num_learned
    }

    fn push(&mut self, lits: &[Lit], is_learned: bool) -> ClauseRef {
        self.clauses.push(Clause {
            lits: lits.into(),
            is_learned,
        });

        ClauseRef(self.clauses.len() as u32 - 1)
    }
}

impl Index<ClauseRef> for ClauseDb {
    type Output = Clause;

    fn index(&self, index: ClauseRef) -> &Self::Output {
        &self.clauses[index.0 as usize]
    }
}

impl IndexMut<ClauseRef> for ClauseDb {
    fn index_mut(&mut self, index: ClauseRef) -> &mut Self::Output {
        &mut self.clauses[index.0 as usize]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct ClauseRef(u32);

#[cfg(test)]
mod tests {
    use crate::lit;

    use super::*;

    #[test]
    fn a_clause_is_correctly_iterated() {
        let lits = unsafe { [lit!(1), lit!(2), lit!(-3)] };
        let mut db = ClauseDb::default();
        let clause_ref = db.add_clause(lits);

        assert_eq!(lits.to_vec(), db[clause_ref].iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn learned_clauses_are_counted() {
        let mut db = ClauseDb::default();
        let problem = db.add_clause(unsafe { [lit!(1), lit!(2)] });
        let learned = db.add_learned_clause(unsafe { [lit!(-1), lit!(2)] });

        assert!(!db.is_learned(problem));
        assert!(db.is_learned(learned));
        assert_eq!(1, db.num_learned());
    }

    #[test]
    fn explanation_clauses_may_be_unit() {
        let mut db = ClauseDb::default();
        let explanation = db.add_explanation_clause(unsafe { [lit!(-4)] });

        assert_eq!(1, db[explanation].len());
    }
}
