use log::trace;

use crate::{assignment::Assignment, lit::Lit};

/// Performs pre-processing on clauses that are added to the solver at the root.
#[derive(Default)]
pub struct ClausePreProcessor {
    /// The buffer on which preprocessing operates.
    buffer: Vec<Lit>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PreProcessedClause<'a> {
    /// The clause is already satisfied. Either because it contained a literal already assigned to
    /// true, or because it contained literals of opposite polarity.
    Satisfiable,
    /// The remaining literals after preprocessing. Note: there might be 0 literals remaining, in
    /// which case the problem is unsatisfiable.
    Lits(&'a [Lit]),
}

impl ClausePreProcessor {
    /// Simplify the clause against a root-level assignment: duplicates and false literals are
    /// removed.
    pub fn preprocess(
        &mut self,
        lits: impl IntoIterator<Item = Lit>,
        assignment: &Assignment,
    ) -> PreProcessedClause<'_> {
        self.buffer.clear();
        self.buffer.extend(lits);

        let original_len = self.buffer.len();

        self.buffer.sort();
        self.buffer.dedup();

        for i in 0..self.buffer.len() {
            let x = self.buffer[i];

            if assignment.value(x) == Some(true) {
                trace!("preprocessing concluded trivially satisfiable");
                return PreProcessedClause::Satisfiable;
            }

            // Due to sorting, literals of opposite polarity are guaranteed to be next to each
            // other.
            if i + 1 < self.buffer.len() && x == !self.buffer[i + 1] {
                trace!("preprocessing concluded trivially satisfiable");
                return PreProcessedClause::Satisfiable;
            }
        }

        self.buffer.retain(|&lit| assignment.value(lit).is_none());

        trace!(
            "preprocessing removed {} lits",
            original_len - self.buffer.len()
        );

        PreProcessedClause::Lits(&self.buffer)
    }
}
