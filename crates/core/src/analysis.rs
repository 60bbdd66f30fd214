use bitvec::vec::BitVec;
use log::trace;

use crate::{
    brancher::Brancher,
    clause::{ClauseDb, ClauseRef},
    implication_graph::{ImplicationGraph, Reason},
    lit::{Lit, Var},
    trail::Trail,
};

/// Responsible for clause learning when a conflict is encountered. The analyzer uses the 1-UIP
/// learning strategy.
#[derive(Default)]
pub struct ConflictAnalyzer {
    /// The working buffer on which analysis is performed.
    buffer: Vec<Lit>,
    /// For every variable, indicate whether it has been encountered during the analysis.
    seen: BitVec,
    /// The variables marked in `seen`, so they can be cleared cheaply.
    to_clear: Vec<Var>,
}

/// The result of conflict analysis.
pub struct Analysis<'a> {
    /// The clause to learn. The asserting literal is at index 0, and if there are more literals,
    /// the literal at index 1 is one assigned at the backjump level.
    pub learned_clause: &'a [Lit],
    /// The decision level to backjump to.
    pub backjump_level: usize,
}

impl ConflictAnalyzer {
    pub fn grow_to(&mut self, var: Var) {
        let new_len = var.code() as usize + 1;
        if self.seen.len() < new_len {
            self.seen.resize(new_len, false);
        }
    }

    /// Derive the first unique implication point clause from a clause whose literals are all
    /// false. At least one literal of the conflict must be assigned at the current decision level.
    pub fn analyze(
        &mut self,
        conflict: ClauseRef,
        clauses: &ClauseDb,
        implication_graph: &ImplicationGraph,
        trail: &Trail,
        brancher: &mut impl Brancher,
    ) -> Analysis<'_> {
        trace!("analyzing...");

        for var in self.to_clear.drain(..) {
            self.seen.set(var.code() as usize, false);
        }
        self.buffer.clear();

        // Leave space for the asserting literal.
        self.buffer
            .push(Lit::positive(unsafe { Var::new_unchecked(0) }));

        let current_level = trail.decision_level();
        let mut backjump_level = 0;
        let mut counter = 0;
        let mut trail_idx = trail.len();
        let mut confl = conflict;
        let mut p: Option<Lit> = None;

        loop {
            for &lit in clauses[confl].iter() {
                if Some(lit) == p {
                    continue;
                }

                let var = lit.var();
                if self.seen[var.code() as usize] {
                    continue;
                }

                self.seen.set(var.code() as usize, true);
                self.to_clear.push(var);
                brancher.on_literal_activated(lit);

                let level = implication_graph.level(var);
                if level == current_level {
                    counter += 1;
                } else if level > 0 {
                    self.buffer.push(lit);
                    backjump_level = usize::max(backjump_level, level);
                }
            }

            let uip = loop {
                trail_idx -= 1;
                let lit = trail[trail_idx];

                if self.seen[lit.var().code() as usize] {
                    break lit;
                }
            };

            p = Some(uip);
            counter -= 1;

            if counter == 0 {
                break;
            }

            confl = match implication_graph.reason(uip.var()) {
                Reason::Clause(clause_ref) => clause_ref,
                Reason::Decision => unreachable!("only the UIP can be a decision"),
            };
        }

        self.buffer[0] = !p.expect("at least one literal at the current level");

        // Watch a literal from the backjump level as the second literal.
        if let Some(max_idx) = (1..self.buffer.len())
            .max_by_key(|&idx| implication_graph.level(self.buffer[idx].var()))
        {
            self.buffer.swap(1, max_idx);
        }

        trace!("learned clause = {:?}", self.buffer);

        Analysis {
            learned_clause: &self.buffer,
            backjump_level,
        }
    }
}
